//! Error taxonomy coverage through the public API.
//!
//! Every failure must surface at the operation that caused it and leave
//! the IR untouched.

use polyir::{Buffer, ElementType, Error, Expr, Library, StorageRole};

fn filled_library() -> Library {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(Expr::uint8(3), "{ S0[i, j] : 0 <= i < 64 and 0 <= j < 64 }")
        .unwrap();
    f.add_buffer(
        Buffer::new("buf", vec![64, 64], ElementType::UInt8, StorageRole::Output, None).unwrap(),
    )
    .unwrap();
    f.computation_mut("S0")
        .unwrap()
        .set_access("{ S0[i, j] -> buf[i, j] }")
        .unwrap();
    lib
}

#[test]
fn duplicate_computation_names_fail_on_the_second_declaration() {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(Expr::uint8(1), "{ S0[i, j] : 0 <= i < 10 and 0 <= j < 10 }")
        .unwrap();
    let err = f.add_computation(Expr::uint8(2), "{ S0[i] : 0 <= i < 10 }");
    assert!(matches!(err, Err(Error::DuplicateName(name)) if name == "S0"));
    assert_eq!(f.computations().len(), 1);
}

#[test]
fn malformed_strings_are_parse_errors() {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    assert!(matches!(
        f.add_computation(Expr::uint8(1), "definitely not a set"),
        Err(Error::Parse(_))
    ));

    f.add_computation(Expr::uint8(1), "{ S[i] : 0 <= i < 4 }").unwrap();
    assert!(matches!(
        f.computation_mut("S").unwrap().set_access("nope"),
        Err(Error::Parse(_))
    ));
}

#[test]
fn schedule_tuple_mismatch_is_detected() {
    let mut lib = filled_library();
    let c = lib.function_mut("f").unwrap().computation_mut("S0").unwrap();
    let err = c.set_schedule_str("{ T[i, j] -> T[i, j] }");
    assert!(matches!(err, Err(Error::ScheduleTupleMismatch { .. })));
    // Output tuple must match as well.
    let err = c.set_schedule_str("{ S0[i, j] -> T[i, j] }");
    assert!(matches!(err, Err(Error::ScheduleTupleMismatch { .. })));
}

#[test]
fn bad_factors_and_levels_leave_the_schedule_alone() {
    let mut lib = filled_library();
    let c = lib.function_mut("f").unwrap().computation_mut("S0").unwrap();

    assert!(matches!(
        c.split(0, 0),
        Err(Error::InvalidFactor { factor: 0, .. })
    ));
    assert!(matches!(
        c.split(1, -8),
        Err(Error::InvalidFactor { factor: -8, .. })
    ));
    assert!(matches!(c.split(5, 4), Err(Error::TilingArity(_))));
    assert!(matches!(c.tile(0, 2, 8, 8), Err(Error::TilingArity(_))));
    assert!(matches!(c.interchange(0, 9), Err(Error::TilingArity(_))));

    assert_eq!(c.schedule().dim(polyir::isl::DimType::Out), 2);
}

#[test]
fn expressions_referencing_unknown_names_fail_at_lowering() {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(
        Expr::access("ghost", vec![Expr::iter("i")], ElementType::UInt8),
        "{ S[i] : 0 <= i < 4 }",
    )
    .unwrap();
    f.add_buffer(
        Buffer::new("out", vec![4], ElementType::UInt8, StorageRole::Output, None).unwrap(),
    )
    .unwrap();
    f.computation_mut("S")
        .unwrap()
        .set_access("{ S[i] -> out[i] }")
        .unwrap();

    let err = lib.lower();
    assert!(matches!(err, Err(Error::UnboundReference(name)) if name == "ghost"));
}

#[test]
fn free_variables_outside_the_domain_fail_at_lowering() {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(Expr::iter("q"), "{ S[i] : 0 <= i < 4 }").unwrap();
    f.add_buffer(
        Buffer::new("out", vec![4], ElementType::Int32, StorageRole::Output, None).unwrap(),
    )
    .unwrap();
    f.computation_mut("S")
        .unwrap()
        .set_access("{ S[i] -> out[i] }")
        .unwrap();

    let err = lib.lower();
    assert!(matches!(err, Err(Error::UnboundReference(name)) if name == "q"));
}

#[test]
fn lowering_without_an_access_is_rejected() {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(Expr::uint8(1), "{ S[i] : 0 <= i < 4 }").unwrap();
    assert!(matches!(lib.lower(), Err(Error::Backend(_))));
}

#[test]
fn manual_data_mapping_requires_a_fresh_access_after_edits() {
    let mut lib = filled_library();
    lib.set_auto_data_mapping(false);

    let c = lib.function_mut("f").unwrap().computation_mut("S0").unwrap();
    c.tile(0, 1, 8, 8).unwrap();
    // The edit invalidated the stored access.
    assert!(c.access().is_none());
    assert!(matches!(lib.lower(), Err(Error::Backend(_))));

    lib.function_mut("f")
        .unwrap()
        .computation_mut("S0")
        .unwrap()
        .set_access("{ S0[i, j] -> buf[i, j] }")
        .unwrap();
    lib.lower().unwrap();
    assert!(lib.function("f").unwrap().stmt().is_some());
}

#[test]
fn access_arity_must_match_the_buffer() {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(Expr::uint8(1), "{ S[i, j] : 0 <= i < 4 and 0 <= j < 4 }")
        .unwrap();
    f.add_buffer(
        Buffer::new("out", vec![4], ElementType::UInt8, StorageRole::Output, None).unwrap(),
    )
    .unwrap();
    f.computation_mut("S")
        .unwrap()
        .set_access("{ S[i, j] -> out[i, j] }")
        .unwrap();

    assert!(matches!(lib.lower(), Err(Error::Backend(_))));
}
