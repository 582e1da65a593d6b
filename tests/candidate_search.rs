//! Candidate generation over the loop-nest syntax tree.
//!
//! Covers the exhaustive generator's counting rules, the fusion sibling
//! test, non-destructiveness, and the record application bridge back into
//! the schedule algebra.

use polyir::{
    apply_optimization, Expr, ExhaustiveGenerator, Library, OptimizationKind, SyntaxTree,
};

fn tree(lib: &Library) -> SyntaxTree {
    SyntaxTree::from_function(lib.function("f").unwrap(), lib).unwrap()
}

// ============================================================================
// Tiling candidate counts
// ============================================================================

#[test]
fn two_level_nest_with_two_factors_yields_four_tilings() {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(
        Expr::uint8(1),
        "{ S0[i, j] : 0 <= i < 100 and 0 <= j < 100 }",
    )
    .unwrap();

    let generator = ExhaustiveGenerator {
        tiling_factors: vec![2, 4],
        ..Default::default()
    };
    let states = generator.generate_states(&tree(&lib), OptimizationKind::Tiling);
    assert_eq!(states.len(), 4);

    let mut factor_pairs: Vec<(i64, i64)> = states
        .iter()
        .map(|s| {
            let info = &s.pending_optims[0];
            (info.l0_factor, info.l1_factor)
        })
        .collect();
    factor_pairs.sort_unstable();
    assert_eq!(factor_pairs, vec![(2, 2), (2, 4), (4, 2), (4, 4)]);
}

#[test]
fn three_level_nest_adds_the_cubic_product() {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(
        Expr::uint8(1),
        "{ S0[i, j, k] : 0 <= i < 64 and 0 <= j < 64 and 0 <= k < 64 }",
    )
    .unwrap();

    let generator = ExhaustiveGenerator {
        tiling_factors: vec![2],
        ..Default::default()
    };
    let states = generator.generate_states(&tree(&lib), OptimizationKind::Tiling);
    // Root: one 2-D tile plus one 3-D tile. Second level: one 2-D tile.
    assert_eq!(states.len(), 3);
    let three_d = states
        .iter()
        .filter(|s| s.pending_optims[0].nb_levels == 3)
        .count();
    assert_eq!(three_d, 1);
}

// ============================================================================
// Fusion sibling condition
// ============================================================================

fn fusion_library(second_bound: i64) -> Library {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(Expr::uint8(1), "{ A[i, j] : 0 <= i < 64 and 0 <= j < 64 }")
        .unwrap();
    f.add_computation(
        Expr::uint8(2),
        &format!("{{ B[i, j] : 0 <= i < {} and 0 <= j < 64 }}", second_bound),
    )
    .unwrap();
    lib
}

#[test]
fn identical_siblings_produce_a_fusion_candidate() {
    let lib = fusion_library(64);
    let generator = ExhaustiveGenerator::default();
    let states = generator.generate_states(&tree(&lib), OptimizationKind::Fusion);
    assert_eq!(states.len(), 1);

    let info = &states[0].pending_optims[0];
    assert_eq!(info.kind, OptimizationKind::Fusion);
    assert_eq!(info.comps, vec!["A".to_owned(), "B".to_owned()]);
    assert_eq!(info.depth, 0);
}

#[test]
fn siblings_with_different_bounds_do_not_fuse() {
    let lib = fusion_library(32);
    let generator = ExhaustiveGenerator::default();
    let states = generator.generate_states(&tree(&lib), OptimizationKind::Fusion);
    assert!(states.is_empty());
}

#[test]
fn unrolled_siblings_are_excluded_from_fusion() {
    let mut lib = fusion_library(64);
    lib.unroll("A", 1, 4).unwrap();
    let generator = ExhaustiveGenerator::default();
    let states = generator.generate_states(&tree(&lib), OptimizationKind::Fusion);
    // Unrolling changed A's nest shape as well, so the pair is gone.
    assert!(states.is_empty());
}

// ============================================================================
// Generation leaves the input tree untouched
// ============================================================================

#[test]
fn generation_is_deterministic_and_non_destructive() {
    let lib = fusion_library(64);
    let ast = tree(&lib);
    let snapshot = ast.clone();
    let generator = ExhaustiveGenerator::default();

    for kind in [
        OptimizationKind::Fusion,
        OptimizationKind::Tiling,
        OptimizationKind::Interchange,
        OptimizationKind::Unrolling,
    ] {
        let first = generator.generate_states(&ast, kind);
        let second = generator.generate_states(&ast, kind);
        assert_eq!(first, second);
    }
    assert_eq!(ast, snapshot);
}

// ============================================================================
// Records are journalable and executable
// ============================================================================

#[test]
fn a_journaled_record_replays_through_the_algebra() {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(
        Expr::uint8(1),
        "{ S0[i, j] : 0 <= i < 128 and 0 <= j < 128 }",
    )
    .unwrap();

    let generator = ExhaustiveGenerator {
        tiling_factors: vec![32],
        ..Default::default()
    };
    let states = generator.generate_states(&tree(&lib), OptimizationKind::Tiling);
    assert_eq!(states.len(), 1);

    // Journal the decision, then replay it from its serialized form.
    let journal = serde_json::to_string(&states[0].pending_optims[0]).unwrap();
    let replayed: polyir::OptimizationInfo = serde_json::from_str(&journal).unwrap();
    apply_optimization(&mut lib, "f", &replayed).unwrap();

    let c = lib.function("f").unwrap().computation("S0").unwrap();
    assert_eq!(c.schedule().dim(polyir::isl::DimType::Out), 4);

    // The rebuilt tree reflects the committed tiling.
    let after = tree(&lib);
    assert_eq!(after.loop_levels_chain_depth(after.roots[0]), 4);
}

#[test]
fn committed_fusion_record_shares_the_outer_band() {
    let mut lib = fusion_library(64);
    let generator = ExhaustiveGenerator::default();
    let states = generator.generate_states(&tree(&lib), OptimizationKind::Fusion);
    let info = states[0].pending_optims[0].clone();
    apply_optimization(&mut lib, "f", &info).unwrap();

    // After fusion the two nests share the outer level in one band.
    let after = tree(&lib);
    assert_eq!(after.roots.len(), 1);
    assert_eq!(after.node(after.roots[0]).children.len(), 2);
}
