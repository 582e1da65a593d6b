//! Schedule algebra equivalences and invariants.
//!
//! These tests compare schedule relations through the solver's own
//! equality, never through string matching, so constraint re-ordering and
//! whitespace cannot produce false negatives.

use polyir::isl::{DimType, Map, Set};
use polyir::{Expr, Library};

fn library_1001() -> Library {
    let mut lib = Library::new("lib");
    let f = lib.add_function("f").unwrap();
    f.add_computation(
        Expr::uint8(3),
        "{ S0[i, j] : 0 <= i <= 1000 and 0 <= j <= 1000 }",
    )
    .unwrap();
    lib
}

// ============================================================================
// Invariant: tuple names survive every transformation
// ============================================================================

#[test]
fn tuple_names_equal_the_computation_name_throughout() {
    let mut lib = library_1001();
    let c = lib.function_mut("f").unwrap().computation_mut("S0").unwrap();

    let check = |c: &polyir::Computation| {
        assert_eq!(c.domain().tuple_name().as_deref(), Some(c.name()));
        assert_eq!(
            c.schedule().tuple_name(DimType::In).as_deref(),
            Some(c.name())
        );
        assert_eq!(
            c.schedule().tuple_name(DimType::Out).as_deref(),
            Some(c.name())
        );
    };

    check(c);
    c.split(0, 32).unwrap();
    check(c);
    c.interchange(0, 1).unwrap();
    check(c);
    c.tile(0, 1, 4, 4).unwrap();
    check(c);
}

// ============================================================================
// Invariant: the schedule image is non-empty iff the domain is
// ============================================================================

#[test]
fn schedule_image_tracks_domain_emptiness() {
    let mut lib = library_1001();
    let c = lib.function_mut("f").unwrap().computation_mut("S0").unwrap();
    c.tile(0, 1, 32, 32).unwrap();
    c.interchange(1, 3).unwrap();
    assert_eq!(
        c.time_processor().unwrap().is_empty().unwrap(),
        c.domain().is_empty().unwrap()
    );

    let mut empty_lib = Library::new("lib2");
    let f = empty_lib.add_function("f").unwrap();
    f.add_computation(Expr::uint8(0), "{ E[i] : 0 <= i < 0 }").unwrap();
    let e = f.computation_mut("E").unwrap();
    e.split(0, 8).unwrap();
    assert!(e.domain().is_empty().unwrap());
    assert!(e.time_processor().unwrap().is_empty().unwrap());
}

// ============================================================================
// Tile equals split; split; interchange
// ============================================================================

#[test]
fn tile_is_the_split_split_interchange_composition() {
    let mut tiled = library_1001();
    tiled
        .function_mut("f")
        .unwrap()
        .computation_mut("S0")
        .unwrap()
        .tile(0, 1, 32, 32)
        .unwrap();

    let mut composed = library_1001();
    {
        let c = composed
            .function_mut("f")
            .unwrap()
            .computation_mut("S0")
            .unwrap();
        c.split(0, 32).unwrap();
        c.split(2, 32).unwrap();
        c.interchange(1, 2).unwrap();
    }

    let a = tiled.function("f").unwrap().computation("S0").unwrap();
    let b = composed.function("f").unwrap().computation("S0").unwrap();
    assert!(a.schedule().is_equal(b.schedule()).unwrap());

    // Both paths also agree on the time-processor image.
    assert!(a
        .time_processor()
        .unwrap()
        .is_equal(&b.time_processor().unwrap())
        .unwrap());
}

// ============================================================================
// Interchange is an involution
// ============================================================================

#[test]
fn interchange_twice_restores_the_schedule() {
    let mut lib = library_1001();
    let c = lib.function_mut("f").unwrap().computation_mut("S0").unwrap();
    c.tile(0, 1, 32, 32).unwrap();
    let before = c.schedule().copy();
    c.interchange(0, 3).unwrap();
    c.interchange(0, 3).unwrap();
    assert!(c.schedule().is_equal(&before).unwrap());
}

// ============================================================================
// Textual round-trips
// ============================================================================

#[test]
fn parse_then_print_round_trips_sets_and_maps() {
    let lib = Library::new("rt");
    let ctx = lib.ctx();

    for text in [
        "{ S0[i, j] : 0 <= i <= 1000 and 0 <= j <= 1000 }",
        "{ S[i, j, k] : 0 <= i < 8 and i <= j < 16 and 0 <= k < 4 }",
        "[N] -> { S[i] : 0 <= i < N }",
    ] {
        let set = Set::read_from_str(ctx, text).unwrap();
        let reparsed = Set::read_from_str(ctx, &set.to_str().unwrap()).unwrap();
        assert!(set.is_equal(&reparsed).unwrap(), "set `{}`", text);
    }

    for text in [
        "{ S0[i, j] -> S0[i, j] : 0 <= i < 10 and 0 <= j < 10 }",
        "{ S0[i, j] -> buf0[j, i] }",
        "{ C[i, j, k] -> b_C[i, j] : 0 <= i, j, k < 100 }",
    ] {
        let map = Map::read_from_str(ctx, text).unwrap();
        let reparsed = Map::read_from_str(ctx, &map.to_str().unwrap()).unwrap();
        assert!(map.is_equal(&reparsed).unwrap(), "map `{}`", text);
    }
}
