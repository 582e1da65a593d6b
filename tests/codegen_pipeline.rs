//! End-to-end lowering scenarios.
//!
//! Each test drives the public pipeline: declare computations, bind
//! buffers, edit schedules, lower, then inspect the emitted statement
//! tree. These execute the real integer-set machinery, not string
//! comparisons on the inputs.

use polyir::{
    Buffer, ElementType, Expr, Library, LoopKind, StorageRole, Stmt,
};

fn access_names(expr: &Expr) -> Vec<String> {
    let mut names = Vec::new();
    expr.visit(&mut |e| {
        if let Expr::Access { name, .. } = e {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    });
    names
}

// ============================================================================
// Identity schedule, identity access
// ============================================================================

#[test]
fn identity_lowering_is_a_plain_nest() {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(Expr::float32(1.5), "{ S[i, j] : 0 <= i < 10 and 0 <= j < 20 }")
        .unwrap();
    f.add_buffer(
        Buffer::new("B", vec![10, 20], ElementType::Float32, StorageRole::Output, None).unwrap(),
    )
    .unwrap();
    f.add_argument("B").unwrap();
    f.computation_mut("S")
        .unwrap()
        .set_access("{ S[i, j] -> B[i, j] }")
        .unwrap();

    lib.lower().unwrap();

    let stmt = lib.function("f").unwrap().stmt().unwrap();
    assert_eq!(stmt.loop_depth(), 2);
    assert_eq!(stmt.loop_kinds(), vec![LoopKind::Serial, LoopKind::Serial]);

    let stores = stmt.stores();
    assert_eq!(stores.len(), 1);
    match stores[0] {
        Stmt::Store {
            buffer,
            indices,
            value,
        } => {
            assert_eq!(buffer, "B");
            assert_eq!(indices.len(), 2);
            assert!(indices.iter().all(|i| matches!(i, Expr::Var { .. })));
            assert_eq!(value, &Expr::float32(1.5));
        }
        other => panic!("expected a store, got {:?}", other),
    }
}

// ============================================================================
// Constant fill with tiling and a parallel tag
// ============================================================================

#[test]
fn tiled_constant_fill_produces_a_four_deep_nest() {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(
        Expr::uint8(3),
        "{ S0[i, j] : 0 <= i <= 1000 and 0 <= j <= 1000 }",
    )
    .unwrap();
    f.add_buffer(
        Buffer::new(
            "buf0",
            vec![1001, 1001],
            ElementType::UInt8,
            StorageRole::Output,
            None,
        )
        .unwrap(),
    )
    .unwrap();
    f.add_argument("buf0").unwrap();
    f.computation_mut("S0")
        .unwrap()
        .set_access("{ S0[i, j] -> buf0[i, j] }")
        .unwrap();

    lib.function_mut("f")
        .unwrap()
        .computation_mut("S0")
        .unwrap()
        .tile(0, 1, 32, 32)
        .unwrap();
    lib.add_parallel_dimension("S0", 1).unwrap();

    lib.lower().unwrap();

    let stmt = lib.function("f").unwrap().stmt().unwrap();
    let kinds = stmt.loop_kinds();
    assert_eq!(kinds.len(), 4, "tile(0,1,32,32) makes a 4-deep nest");
    assert_eq!(kinds[1], LoopKind::Parallel);
    assert_eq!(kinds[0], LoopKind::Serial);
    assert_eq!(kinds[2], LoopKind::Serial);
    assert_eq!(kinds[3], LoopKind::Serial);

    let stores = stmt.stores();
    assert_eq!(stores.len(), 1);
    match stores[0] {
        Stmt::Store { buffer, value, .. } => {
            assert_eq!(buffer, "buf0");
            assert_eq!(value, &Expr::uint8(3));
        }
        other => panic!("expected a store, got {:?}", other),
    }

    // The index expressions were derived and stored on the computation.
    let comp = lib.function("f").unwrap().computation("S0").unwrap();
    assert_eq!(comp.index_exprs().map(|e| e.len()), Some(2));
}

// ============================================================================
// Matrix multiply with an init statement and a recurrence
// ============================================================================

#[test]
fn matrix_multiply_lowers_to_the_textbook_accumulation() {
    let mut lib = Library::new("lib");
    let f = lib.add_function("matmul").unwrap();

    f.add_computation(
        Expr::float32(0.0),
        "{ C_init[i, j] : 0 <= i < 1000 and 0 <= j < 1000 }",
    )
    .unwrap();

    // C[i,j,k] = C[i,j,k-1] + A[i,k] * B[k,j]
    let c_expr = Expr::add(
        Expr::access(
            "C",
            vec![
                Expr::iter("i"),
                Expr::iter("j"),
                Expr::sub(Expr::iter("k"), Expr::int32(1)),
            ],
            ElementType::Float32,
        ),
        Expr::mul(
            Expr::access(
                "b_A",
                vec![Expr::iter("i"), Expr::iter("k")],
                ElementType::Float32,
            ),
            Expr::access(
                "b_B",
                vec![Expr::iter("k"), Expr::iter("j")],
                ElementType::Float32,
            ),
        ),
    );
    f.add_computation(
        c_expr,
        "{ C[i, j, k] : 0 <= i < 1000 and 0 <= j < 1000 and 0 <= k < 1000 }",
    )
    .unwrap();

    for (name, role) in [
        ("b_A", StorageRole::Input),
        ("b_B", StorageRole::Input),
        ("b_C", StorageRole::Output),
    ] {
        f.add_buffer(
            Buffer::new(name, vec![1000, 1000], ElementType::Float32, role, None).unwrap(),
        )
        .unwrap();
        f.add_argument(name).unwrap();
    }

    f.computation_mut("C_init")
        .unwrap()
        .set_access("{ C_init[i, j] -> b_C[i, j] }")
        .unwrap();
    f.computation_mut("C")
        .unwrap()
        .set_access("{ C[i, j, k] -> b_C[i, j] }")
        .unwrap();

    lib.lower().unwrap();

    let stmt = lib.function("matmul").unwrap().stmt().unwrap();
    assert!(stmt.loop_depth() >= 2);

    let stores = stmt.stores();
    assert_eq!(stores.len(), 2);

    // Declaration order breaks the tie at equal time points: the
    // initialization writes before the accumulation reads.
    match stores[0] {
        Stmt::Store { buffer, value, .. } => {
            assert_eq!(buffer, "b_C");
            assert_eq!(value, &Expr::float32(0.0));
        }
        other => panic!("expected the init store, got {:?}", other),
    }
    match stores[1] {
        Stmt::Store {
            buffer,
            indices,
            value,
        } => {
            assert_eq!(buffer, "b_C");
            assert_eq!(indices.len(), 2);
            // The recurrence reference C[i,j,k-1] resolved to its buffer.
            let names = access_names(value);
            assert!(names.contains(&"b_C".to_owned()));
            assert!(names.contains(&"b_A".to_owned()));
            assert!(names.contains(&"b_B".to_owned()));
            assert!(!names.contains(&"C".to_owned()));
        }
        other => panic!("expected the accumulation store, got {:?}", other),
    }
}

// ============================================================================
// Unroll metadata reaches the emitted loop kinds
// ============================================================================

#[test]
fn unroll_marks_the_inner_strip_loop() {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(Expr::uint8(1), "{ S[i] : 0 <= i < 64 }").unwrap();
    f.add_buffer(
        Buffer::new("out", vec![64], ElementType::UInt8, StorageRole::Output, None).unwrap(),
    )
    .unwrap();
    f.computation_mut("S")
        .unwrap()
        .set_access("{ S[i] -> out[i] }")
        .unwrap();

    lib.unroll("S", 0, 4).unwrap();
    lib.lower().unwrap();

    let stmt = lib.function("f").unwrap().stmt().unwrap();
    let kinds = stmt.loop_kinds();
    assert_eq!(kinds, vec![LoopKind::Serial, LoopKind::Unrolled]);
}
