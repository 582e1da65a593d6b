//! Thin facade over the external integer-set solver.
//!
//! The `isl-rs` crate builds and links ISL and provides the shared
//! [`Context`], but it does not cover the set/map entry points this crate
//! needs, so those are bound directly here. Every handle is wrapped in a
//! move-only value type: consuming operations take `self`, `copy()` is the
//! only way to duplicate a handle, and `Drop` releases it. A null return
//! from the solver surfaces as [`SolverError`].

use isl_rs::Context;
use libc::uintptr_t;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_long, c_uint, c_void};
use thiserror::Error;

/// Errors raised by the solver facade.
#[derive(Error, Debug)]
pub enum SolverError {
    /// The underlying call returned null.
    #[error("integer-set solver returned null in `{0}`")]
    NullResult(&'static str),

    /// The underlying call returned an error value.
    #[error("integer-set solver signalled an error in `{0}`")]
    ErrorValue(&'static str),

    /// A string argument could not cross the FFI boundary.
    #[error("string `{0}` cannot be passed to the solver")]
    InvalidString(String),
}

/// Dimension classes of a relation, mirroring the solver's `isl_dim_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum DimType {
    Param = 1,
    In = 2,
    Out = 3,
    /// Set dimensions share the numeric value of `Out`.
    Div = 4,
}

impl DimType {
    /// Set tuples use the `out` slot internally.
    pub const SET: DimType = DimType::Out;
}

extern "C" {
    // Sets
    fn isl_set_read_from_str(ctx: uintptr_t, str: *const c_char) -> uintptr_t;
    fn isl_set_free(set: uintptr_t) -> uintptr_t;
    fn isl_set_copy(set: uintptr_t) -> uintptr_t;
    fn isl_set_to_str(set: uintptr_t) -> *mut c_char;
    fn isl_set_get_tuple_name(set: uintptr_t) -> *const c_char;
    fn isl_set_set_tuple_name(set: uintptr_t, s: *const c_char) -> uintptr_t;
    fn isl_set_dim(set: uintptr_t, dim_type: c_int) -> c_int;
    fn isl_set_get_dim_name(set: uintptr_t, dim_type: c_int, pos: c_uint) -> *const c_char;
    fn isl_set_apply(set: uintptr_t, map: uintptr_t) -> uintptr_t;
    fn isl_set_is_empty(set: uintptr_t) -> c_int;
    fn isl_set_is_equal(set1: uintptr_t, set2: uintptr_t) -> c_int;
    fn isl_set_dim_min_val(set: uintptr_t, pos: c_int) -> uintptr_t;
    fn isl_set_dim_max_val(set: uintptr_t, pos: c_int) -> uintptr_t;
    fn isl_set_get_space(set: uintptr_t) -> uintptr_t;

    // Spaces
    fn isl_space_free(space: uintptr_t) -> uintptr_t;
    fn isl_space_map_from_set(space: uintptr_t) -> uintptr_t;

    // Values
    fn isl_val_free(val: uintptr_t) -> uintptr_t;
    fn isl_val_is_int(val: uintptr_t) -> c_int;
    fn isl_val_get_num_si(val: uintptr_t) -> c_long;

    // Maps
    fn isl_map_read_from_str(ctx: uintptr_t, str: *const c_char) -> uintptr_t;
    fn isl_map_free(map: uintptr_t) -> uintptr_t;
    fn isl_map_copy(map: uintptr_t) -> uintptr_t;
    fn isl_map_to_str(map: uintptr_t) -> *mut c_char;
    fn isl_map_identity(space: uintptr_t) -> uintptr_t;
    fn isl_map_get_tuple_name(map: uintptr_t, dim_type: c_int) -> *const c_char;
    fn isl_map_set_tuple_name(map: uintptr_t, dim_type: c_int, s: *const c_char) -> uintptr_t;
    fn isl_map_dim(map: uintptr_t, dim_type: c_int) -> c_int;
    fn isl_map_get_dim_name(map: uintptr_t, dim_type: c_int, pos: c_uint) -> *const c_char;
    fn isl_map_set_dim_name(
        map: uintptr_t,
        dim_type: c_int,
        pos: c_uint,
        s: *const c_char,
    ) -> uintptr_t;
    fn isl_map_add_dims(map: uintptr_t, dim_type: c_int, n: c_uint) -> uintptr_t;
    fn isl_map_move_dims(
        map: uintptr_t,
        dst_type: c_int,
        dst_pos: c_uint,
        src_type: c_int,
        src_pos: c_uint,
        n: c_uint,
    ) -> uintptr_t;
    fn isl_map_fix_si(map: uintptr_t, dim_type: c_int, pos: c_uint, value: c_int) -> uintptr_t;
    fn isl_map_apply_range(map1: uintptr_t, map2: uintptr_t) -> uintptr_t;
    fn isl_map_intersect_domain(map: uintptr_t, set: uintptr_t) -> uintptr_t;
    fn isl_map_reverse(map: uintptr_t) -> uintptr_t;
    fn isl_map_is_empty(map: uintptr_t) -> c_int;
    fn isl_map_is_equal(map1: uintptr_t, map2: uintptr_t) -> c_int;
    fn isl_map_from_union_map(umap: uintptr_t) -> uintptr_t;

    // Piecewise multi-affine functions
    fn isl_pw_multi_aff_from_map(map: uintptr_t) -> uintptr_t;
    fn isl_pw_multi_aff_free(pma: uintptr_t) -> uintptr_t;
    fn isl_pw_multi_aff_copy(pma: uintptr_t) -> uintptr_t;
    fn isl_pw_multi_aff_dim(pma: uintptr_t, dim_type: c_int) -> c_int;
    fn isl_pw_multi_aff_get_pw_aff(pma: uintptr_t, pos: c_int) -> uintptr_t;
    fn isl_pw_multi_aff_pullback_pw_multi_aff(pma1: uintptr_t, pma2: uintptr_t) -> uintptr_t;
    fn isl_pw_aff_free(pa: uintptr_t) -> uintptr_t;

    // Unions
    fn isl_union_set_from_set(set: uintptr_t) -> uintptr_t;
    fn isl_union_set_union(uset1: uintptr_t, uset2: uintptr_t) -> uintptr_t;
    fn isl_union_set_free(uset: uintptr_t) -> uintptr_t;
    fn isl_union_set_copy(uset: uintptr_t) -> uintptr_t;
    fn isl_union_set_to_str(uset: uintptr_t) -> *mut c_char;
    fn isl_union_map_from_map(map: uintptr_t) -> uintptr_t;
    fn isl_union_map_union(umap1: uintptr_t, umap2: uintptr_t) -> uintptr_t;
    fn isl_union_map_intersect_domain(umap: uintptr_t, uset: uintptr_t) -> uintptr_t;
    fn isl_union_map_free(umap: uintptr_t) -> uintptr_t;
    fn isl_union_map_copy(umap: uintptr_t) -> uintptr_t;
    fn isl_union_map_to_str(umap: uintptr_t) -> *mut c_char;
}

pub(crate) fn ctx_raw(ctx: &Context) -> uintptr_t {
    ctx.ptr
}

fn to_cstring(s: &str) -> Result<CString, SolverError> {
    CString::new(s).map_err(|_| SolverError::InvalidString(s.to_owned()))
}

/// Copies a solver-owned `char *` into a `String` and releases it.
unsafe fn take_isl_string(ptr: *mut c_char, op: &'static str) -> Result<String, SolverError> {
    if ptr.is_null() {
        return Err(SolverError::NullResult(op));
    }
    let out = CStr::from_ptr(ptr).to_string_lossy().into_owned();
    libc::free(ptr as *mut c_void);
    Ok(out)
}

unsafe fn borrow_isl_name(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

fn check_bool(value: c_int, op: &'static str) -> Result<bool, SolverError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(SolverError::ErrorValue(op)),
    }
}

/// Declares a move-only handle wrapper with the shared ownership plumbing.
macro_rules! isl_handle {
    ($name:ident, $free:ident) => {
        pub struct $name {
            ptr: uintptr_t,
            should_free_on_drop: bool,
        }

        impl $name {
            pub(crate) fn from_raw(ptr: uintptr_t, op: &'static str) -> Result<Self, SolverError> {
                if ptr == 0 {
                    Err(SolverError::NullResult(op))
                } else {
                    Ok(Self {
                        ptr,
                        should_free_on_drop: true,
                    })
                }
            }

            /// Transfers ownership of the handle to the solver.
            pub(crate) fn take(mut self) -> uintptr_t {
                self.should_free_on_drop = false;
                self.ptr
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                if self.should_free_on_drop {
                    unsafe {
                        $free(self.ptr);
                    }
                }
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.ptr)
            }
        }
    };
}

isl_handle!(Set, isl_set_free);
isl_handle!(Map, isl_map_free);
isl_handle!(UnionSet, isl_union_set_free);
isl_handle!(UnionMap, isl_union_map_free);
isl_handle!(PwMultiAff, isl_pw_multi_aff_free);
isl_handle!(PwAff, isl_pw_aff_free);

// ============================================================================
// Sets
// ============================================================================

impl Set {
    /// Parses a set from the solver's textual format.
    pub fn read_from_str(ctx: &Context, text: &str) -> Result<Set, SolverError> {
        let cstr = to_cstring(text)?;
        let ptr = unsafe { isl_set_read_from_str(ctx_raw(ctx), cstr.as_ptr()) };
        Set::from_raw(ptr, "isl_set_read_from_str")
    }

    pub fn copy(&self) -> Set {
        Set {
            ptr: unsafe { isl_set_copy(self.ptr) },
            should_free_on_drop: true,
        }
    }

    pub fn to_str(&self) -> Result<String, SolverError> {
        unsafe { take_isl_string(isl_set_to_str(self.ptr), "isl_set_to_str") }
    }

    /// The tuple name of the set, if any.
    pub fn tuple_name(&self) -> Option<String> {
        unsafe { borrow_isl_name(isl_set_get_tuple_name(self.ptr)) }
    }

    pub fn set_tuple_name(self, name: &str) -> Result<Set, SolverError> {
        let cstr = to_cstring(name)?;
        let ptr = unsafe { isl_set_set_tuple_name(self.take(), cstr.as_ptr()) };
        Set::from_raw(ptr, "isl_set_set_tuple_name")
    }

    /// Number of set dimensions.
    pub fn dim(&self) -> usize {
        let n = unsafe { isl_set_dim(self.ptr, DimType::SET as c_int) };
        n.max(0) as usize
    }

    pub fn param_dim(&self) -> usize {
        let n = unsafe { isl_set_dim(self.ptr, DimType::Param as c_int) };
        n.max(0) as usize
    }

    pub fn dim_name(&self, pos: usize) -> Option<String> {
        unsafe {
            borrow_isl_name(isl_set_get_dim_name(
                self.ptr,
                DimType::SET as c_int,
                pos as c_uint,
            ))
        }
    }

    pub fn param_name(&self, pos: usize) -> Option<String> {
        unsafe {
            borrow_isl_name(isl_set_get_dim_name(
                self.ptr,
                DimType::Param as c_int,
                pos as c_uint,
            ))
        }
    }

    /// Applies a map to the set, yielding its image.
    pub fn apply(self, map: Map) -> Result<Set, SolverError> {
        let ptr = unsafe { isl_set_apply(self.take(), map.take()) };
        Set::from_raw(ptr, "isl_set_apply")
    }

    pub fn is_empty(&self) -> Result<bool, SolverError> {
        check_bool(unsafe { isl_set_is_empty(self.ptr) }, "isl_set_is_empty")
    }

    pub fn is_equal(&self, other: &Set) -> Result<bool, SolverError> {
        check_bool(
            unsafe { isl_set_is_equal(self.ptr, other.ptr) },
            "isl_set_is_equal",
        )
    }

    /// Minimum value of a set dimension, or `None` when it is not a fixed
    /// integer over the whole set.
    pub fn dim_min_value(&self, pos: usize) -> Result<Option<i64>, SolverError> {
        let val = unsafe { isl_set_dim_min_val(isl_set_copy(self.ptr), pos as c_int) };
        extract_int_val(val, "isl_set_dim_min_val")
    }

    /// Maximum value of a set dimension, or `None` when unbounded or
    /// parametric.
    pub fn dim_max_value(&self, pos: usize) -> Result<Option<i64>, SolverError> {
        let val = unsafe { isl_set_dim_max_val(isl_set_copy(self.ptr), pos as c_int) };
        extract_int_val(val, "isl_set_dim_max_val")
    }

    /// The identity map over this set's space, `T[..] -> T[..]`, without
    /// constraints. Intersect with a domain to restrict it.
    pub fn identity_map(&self) -> Result<Map, SolverError> {
        let space = unsafe { isl_space_map_from_set(isl_set_get_space(self.ptr)) };
        if space == 0 {
            return Err(SolverError::NullResult("isl_space_map_from_set"));
        }
        let ptr = unsafe { isl_map_identity(space) };
        Map::from_raw(ptr, "isl_map_identity")
    }
}

fn extract_int_val(val: uintptr_t, op: &'static str) -> Result<Option<i64>, SolverError> {
    if val == 0 {
        return Err(SolverError::NullResult(op));
    }
    let out = match unsafe { isl_val_is_int(val) } {
        1 => Some(unsafe { isl_val_get_num_si(val) }),
        0 => None,
        _ => {
            unsafe { isl_val_free(val) };
            return Err(SolverError::ErrorValue(op));
        }
    };
    unsafe { isl_val_free(val) };
    Ok(out)
}

// ============================================================================
// Maps
// ============================================================================

impl Map {
    pub fn read_from_str(ctx: &Context, text: &str) -> Result<Map, SolverError> {
        let cstr = to_cstring(text)?;
        let ptr = unsafe { isl_map_read_from_str(ctx_raw(ctx), cstr.as_ptr()) };
        Map::from_raw(ptr, "isl_map_read_from_str")
    }

    pub fn copy(&self) -> Map {
        Map {
            ptr: unsafe { isl_map_copy(self.ptr) },
            should_free_on_drop: true,
        }
    }

    pub fn to_str(&self) -> Result<String, SolverError> {
        unsafe { take_isl_string(isl_map_to_str(self.ptr), "isl_map_to_str") }
    }

    pub fn tuple_name(&self, dim_type: DimType) -> Option<String> {
        unsafe { borrow_isl_name(isl_map_get_tuple_name(self.ptr, dim_type as c_int)) }
    }

    pub fn set_tuple_name(self, dim_type: DimType, name: &str) -> Result<Map, SolverError> {
        let cstr = to_cstring(name)?;
        let ptr = unsafe { isl_map_set_tuple_name(self.take(), dim_type as c_int, cstr.as_ptr()) };
        Map::from_raw(ptr, "isl_map_set_tuple_name")
    }

    /// Drops the tuple name of one side of the map.
    pub fn clear_tuple_name(self, dim_type: DimType) -> Result<Map, SolverError> {
        let ptr =
            unsafe { isl_map_set_tuple_name(self.take(), dim_type as c_int, std::ptr::null()) };
        Map::from_raw(ptr, "isl_map_set_tuple_name")
    }

    pub fn dim(&self, dim_type: DimType) -> usize {
        let n = unsafe { isl_map_dim(self.ptr, dim_type as c_int) };
        n.max(0) as usize
    }

    pub fn dim_name(&self, dim_type: DimType, pos: usize) -> Option<String> {
        unsafe {
            borrow_isl_name(isl_map_get_dim_name(
                self.ptr,
                dim_type as c_int,
                pos as c_uint,
            ))
        }
    }

    /// Names one dimension of the map. A dimension that only references
    /// another (as the range of a parsed identity relation does) carries no
    /// name of its own until one is set.
    pub fn set_dim_name(
        self,
        dim_type: DimType,
        pos: usize,
        name: &str,
    ) -> Result<Map, SolverError> {
        let cstr = to_cstring(name)?;
        let ptr = unsafe {
            isl_map_set_dim_name(self.take(), dim_type as c_int, pos as c_uint, cstr.as_ptr())
        };
        Map::from_raw(ptr, "isl_map_set_dim_name")
    }

    /// Appends `n` unconstrained dimensions to one side of the map.
    pub fn add_dims(self, dim_type: DimType, n: usize) -> Result<Map, SolverError> {
        let ptr = unsafe { isl_map_add_dims(self.take(), dim_type as c_int, n as c_uint) };
        Map::from_raw(ptr, "isl_map_add_dims")
    }

    /// Moves `n` dimensions from one tuple of the map to another.
    pub fn move_dims(
        self,
        dst_type: DimType,
        dst_pos: usize,
        src_type: DimType,
        src_pos: usize,
        n: usize,
    ) -> Result<Map, SolverError> {
        let ptr = unsafe {
            isl_map_move_dims(
                self.take(),
                dst_type as c_int,
                dst_pos as c_uint,
                src_type as c_int,
                src_pos as c_uint,
                n as c_uint,
            )
        };
        Map::from_raw(ptr, "isl_map_move_dims")
    }

    /// Fixes a dimension to a constant integer value.
    pub fn fix_dim(self, dim_type: DimType, pos: usize, value: i32) -> Result<Map, SolverError> {
        let ptr =
            unsafe { isl_map_fix_si(self.take(), dim_type as c_int, pos as c_uint, value) };
        Map::from_raw(ptr, "isl_map_fix_si")
    }

    /// Composes two maps: the result maps `x` to `other(self(x))`.
    pub fn apply_range(self, other: Map) -> Result<Map, SolverError> {
        let ptr = unsafe { isl_map_apply_range(self.take(), other.take()) };
        Map::from_raw(ptr, "isl_map_apply_range")
    }

    pub fn intersect_domain(self, set: Set) -> Result<Map, SolverError> {
        let ptr = unsafe { isl_map_intersect_domain(self.take(), set.take()) };
        Map::from_raw(ptr, "isl_map_intersect_domain")
    }

    pub fn reverse(self) -> Result<Map, SolverError> {
        let ptr = unsafe { isl_map_reverse(self.take()) };
        Map::from_raw(ptr, "isl_map_reverse")
    }

    pub fn is_empty(&self) -> Result<bool, SolverError> {
        check_bool(unsafe { isl_map_is_empty(self.ptr) }, "isl_map_is_empty")
    }

    pub fn is_equal(&self, other: &Map) -> Result<bool, SolverError> {
        check_bool(
            unsafe { isl_map_is_equal(self.ptr, other.ptr) },
            "isl_map_is_equal",
        )
    }

    /// Extracts the single map of a union map.
    pub fn from_union_map(umap: UnionMap) -> Result<Map, SolverError> {
        let ptr = unsafe { isl_map_from_union_map(umap.take()) };
        Map::from_raw(ptr, "isl_map_from_union_map")
    }
}

// ============================================================================
// Piecewise multi-affine functions
// ============================================================================

impl PwMultiAff {
    pub fn from_map(map: Map) -> Result<PwMultiAff, SolverError> {
        let ptr = unsafe { isl_pw_multi_aff_from_map(map.take()) };
        PwMultiAff::from_raw(ptr, "isl_pw_multi_aff_from_map")
    }

    pub fn copy(&self) -> PwMultiAff {
        PwMultiAff {
            ptr: unsafe { isl_pw_multi_aff_copy(self.ptr) },
            should_free_on_drop: true,
        }
    }

    pub fn out_dim(&self) -> usize {
        let n = unsafe { isl_pw_multi_aff_dim(self.ptr, DimType::Out as c_int) };
        n.max(0) as usize
    }

    pub fn pw_aff(&self, pos: usize) -> Result<PwAff, SolverError> {
        let ptr = unsafe { isl_pw_multi_aff_get_pw_aff(self.ptr, pos as c_int) };
        PwAff::from_raw(ptr, "isl_pw_multi_aff_get_pw_aff")
    }

    /// Composition: the result computes `self(other(x))`.
    pub fn pullback(self, other: PwMultiAff) -> Result<PwMultiAff, SolverError> {
        let ptr = unsafe { isl_pw_multi_aff_pullback_pw_multi_aff(self.take(), other.take()) };
        PwMultiAff::from_raw(ptr, "isl_pw_multi_aff_pullback_pw_multi_aff")
    }
}

// ============================================================================
// Unions
// ============================================================================

impl UnionSet {
    pub fn from_set(set: Set) -> Result<UnionSet, SolverError> {
        let ptr = unsafe { isl_union_set_from_set(set.take()) };
        UnionSet::from_raw(ptr, "isl_union_set_from_set")
    }

    pub fn copy(&self) -> UnionSet {
        UnionSet {
            ptr: unsafe { isl_union_set_copy(self.ptr) },
            should_free_on_drop: true,
        }
    }

    pub fn union(self, other: UnionSet) -> Result<UnionSet, SolverError> {
        let ptr = unsafe { isl_union_set_union(self.take(), other.take()) };
        UnionSet::from_raw(ptr, "isl_union_set_union")
    }

    pub fn to_str(&self) -> Result<String, SolverError> {
        unsafe { take_isl_string(isl_union_set_to_str(self.ptr), "isl_union_set_to_str") }
    }
}

impl UnionMap {
    pub fn from_map(map: Map) -> Result<UnionMap, SolverError> {
        let ptr = unsafe { isl_union_map_from_map(map.take()) };
        UnionMap::from_raw(ptr, "isl_union_map_from_map")
    }

    pub fn copy(&self) -> UnionMap {
        UnionMap {
            ptr: unsafe { isl_union_map_copy(self.ptr) },
            should_free_on_drop: true,
        }
    }

    pub fn union(self, other: UnionMap) -> Result<UnionMap, SolverError> {
        let ptr = unsafe { isl_union_map_union(self.take(), other.take()) };
        UnionMap::from_raw(ptr, "isl_union_map_union")
    }

    pub fn intersect_domain(self, uset: UnionSet) -> Result<UnionMap, SolverError> {
        let ptr = unsafe { isl_union_map_intersect_domain(self.take(), uset.take()) };
        UnionMap::from_raw(ptr, "isl_union_map_intersect_domain")
    }

    pub fn to_str(&self) -> Result<String, SolverError> {
        unsafe { take_isl_string(isl_union_map_to_str(self.ptr), "isl_union_map_to_str") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ctx() -> Arc<Context> {
        Arc::new(Context::alloc())
    }

    #[test]
    fn set_parse_and_print_round_trips() {
        let ctx = ctx();
        let set = Set::read_from_str(&ctx, "{ S0[i, j] : 0 <= i < 10 and 0 <= j < 20 }").unwrap();
        assert_eq!(set.tuple_name().as_deref(), Some("S0"));
        assert_eq!(set.dim(), 2);
        assert_eq!(set.dim_name(0).as_deref(), Some("i"));

        // Round-trip up to constraint re-ordering.
        let reparsed = Set::read_from_str(&ctx, &set.to_str().unwrap()).unwrap();
        assert!(set.is_equal(&reparsed).unwrap());
    }

    #[test]
    fn dim_bounds_are_extracted() {
        let ctx = ctx();
        let set = Set::read_from_str(&ctx, "{ S[i] : 5 <= i <= 99 }").unwrap();
        assert_eq!(set.dim_min_value(0).unwrap(), Some(5));
        assert_eq!(set.dim_max_value(0).unwrap(), Some(99));
    }

    #[test]
    fn parametric_bound_is_not_fixed() {
        let ctx = ctx();
        let set = Set::read_from_str(&ctx, "[N] -> { S[i] : 0 <= i < N and N > 0 }").unwrap();
        assert_eq!(set.dim_min_value(0).unwrap(), Some(0));
        assert_eq!(set.dim_max_value(0).unwrap(), None);
    }

    #[test]
    fn apply_maps_a_set_through_a_relation() {
        let ctx = ctx();
        let set = Set::read_from_str(&ctx, "{ S[i] : 0 <= i < 4 }").unwrap();
        let map = Map::read_from_str(&ctx, "{ S[i] -> S[i + 10] }").unwrap();
        let image = set.apply(map).unwrap();
        let expected = Set::read_from_str(&ctx, "{ S[i] : 10 <= i < 14 }").unwrap();
        assert!(image.is_equal(&expected).unwrap());
    }

    #[test]
    fn bad_string_reports_solver_error() {
        let ctx = ctx();
        assert!(Set::read_from_str(&ctx, "this is not a set").is_err());
    }
}
