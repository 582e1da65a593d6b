//! AST construction bindings.
//!
//! The binding crate stops short of `isl_ast_build`, so the AST entry
//! points are bound directly, following the same opaque-handle pattern as
//! the set/map facade. The build object is configured with atomic upper
//! bounds and two callbacks: a per-domain callback invoked at every leaf
//! and an after-for callback invoked when a loop has been generated. Both
//! receive a user pointer that the code generator uses to thread its state
//! through the solver.

use crate::isl::{SolverError, UnionMap};
use isl_rs::Context;
use libc::uintptr_t;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_long, c_void};

extern "C" {
    fn isl_options_set_ast_build_atomic_upper_bound(ctx: uintptr_t, val: c_int) -> c_int;

    fn isl_ast_build_alloc(ctx: uintptr_t) -> uintptr_t;
    fn isl_ast_build_free(build: uintptr_t) -> uintptr_t;
    fn isl_ast_build_set_at_each_domain(
        build: uintptr_t,
        callback: AstNodeCallback,
        user: *mut c_void,
    ) -> uintptr_t;
    fn isl_ast_build_set_after_each_for(
        build: uintptr_t,
        callback: AstNodeCallback,
        user: *mut c_void,
    ) -> uintptr_t;
    fn isl_ast_build_node_from_schedule_map(build: uintptr_t, schedule: uintptr_t) -> uintptr_t;
    fn isl_ast_build_get_schedule(build: uintptr_t) -> uintptr_t;
    fn isl_ast_build_expr_from_pw_aff(build: uintptr_t, pa: uintptr_t) -> uintptr_t;
    fn isl_ast_build_access_from_pw_multi_aff(build: uintptr_t, pma: uintptr_t) -> uintptr_t;

    fn isl_ast_node_free(node: uintptr_t) -> uintptr_t;
    fn isl_ast_node_copy(node: uintptr_t) -> uintptr_t;
    fn isl_ast_node_get_type(node: uintptr_t) -> c_int;
    fn isl_ast_node_for_get_iterator(node: uintptr_t) -> uintptr_t;
    fn isl_ast_node_for_get_init(node: uintptr_t) -> uintptr_t;
    fn isl_ast_node_for_get_cond(node: uintptr_t) -> uintptr_t;
    fn isl_ast_node_for_get_inc(node: uintptr_t) -> uintptr_t;
    fn isl_ast_node_for_get_body(node: uintptr_t) -> uintptr_t;
    fn isl_ast_node_if_get_cond(node: uintptr_t) -> uintptr_t;
    fn isl_ast_node_if_get_then(node: uintptr_t) -> uintptr_t;
    fn isl_ast_node_if_get_else(node: uintptr_t) -> uintptr_t;
    fn isl_ast_node_if_has_else(node: uintptr_t) -> c_int;
    fn isl_ast_node_block_get_children(node: uintptr_t) -> uintptr_t;
    fn isl_ast_node_mark_get_node(node: uintptr_t) -> uintptr_t;
    fn isl_ast_node_user_get_expr(node: uintptr_t) -> uintptr_t;

    fn isl_ast_node_list_free(list: uintptr_t) -> uintptr_t;
    fn isl_ast_node_list_n_ast_node(list: uintptr_t) -> c_int;
    fn isl_ast_node_list_get_ast_node(list: uintptr_t, index: c_int) -> uintptr_t;

    fn isl_ast_expr_free(expr: uintptr_t) -> uintptr_t;
    fn isl_ast_expr_get_type(expr: uintptr_t) -> c_int;
    fn isl_ast_expr_get_op_type(expr: uintptr_t) -> c_int;
    fn isl_ast_expr_get_op_n_arg(expr: uintptr_t) -> c_int;
    fn isl_ast_expr_get_op_arg(expr: uintptr_t, pos: c_int) -> uintptr_t;
    fn isl_ast_expr_get_id(expr: uintptr_t) -> uintptr_t;
    fn isl_ast_expr_get_val(expr: uintptr_t) -> uintptr_t;

    fn isl_id_free(id: uintptr_t) -> uintptr_t;
    fn isl_id_get_name(id: uintptr_t) -> *const c_char;

    fn isl_val_free(val: uintptr_t) -> uintptr_t;
    fn isl_val_get_num_si(val: uintptr_t) -> c_long;
}

/// Callback shape shared by `at_each_domain` and `after_each_for`. The node
/// is handed over to the callback, which must return a node (usually the
/// same one) that the builder takes back.
pub type AstNodeCallback =
    unsafe extern "C" fn(node: uintptr_t, build: uintptr_t, user: *mut c_void) -> uintptr_t;

/// Requests atomic upper bounds on generated loops for the whole context.
pub fn set_atomic_upper_bound(ctx: &Context) -> Result<(), SolverError> {
    let status = unsafe { isl_options_set_ast_build_atomic_upper_bound(ctx.ptr, 1) };
    if status < 0 {
        Err(SolverError::ErrorValue(
            "isl_options_set_ast_build_atomic_upper_bound",
        ))
    } else {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AstNodeType {
    For,
    If,
    Block,
    Mark,
    User,
    Error,
}

/// Operation codes of AST expressions, mirroring the solver's numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum AstOpType {
    And = 0,
    AndThen = 1,
    Or = 2,
    OrElse = 3,
    Max = 4,
    Min = 5,
    Minus = 6,
    Add = 7,
    Sub = 8,
    Mul = 9,
    Div = 10,
    FdivQ = 11,
    PdivQ = 12,
    PdivR = 13,
    ZdivR = 14,
    Cond = 15,
    Select = 16,
    Eq = 17,
    Le = 18,
    Lt = 19,
    Ge = 20,
    Gt = 21,
    Call = 22,
    Access = 23,
    Member = 24,
    AddressOf = 25,
}

impl AstOpType {
    fn from_raw(raw: c_int) -> Option<AstOpType> {
        use AstOpType::*;
        Some(match raw {
            0 => And,
            1 => AndThen,
            2 => Or,
            3 => OrElse,
            4 => Max,
            5 => Min,
            6 => Minus,
            7 => Add,
            8 => Sub,
            9 => Mul,
            10 => Div,
            11 => FdivQ,
            12 => PdivQ,
            13 => PdivR,
            14 => ZdivR,
            15 => Cond,
            16 => Select,
            17 => Eq,
            18 => Le,
            19 => Lt,
            20 => Ge,
            21 => Gt,
            22 => Call,
            23 => Access,
            24 => Member,
            25 => AddressOf,
            _ => return None,
        })
    }
}

// ============================================================================
// Build object
// ============================================================================

/// The AST builder. Allocated per lowering run and freed when it ends.
pub struct AstBuild {
    ptr: uintptr_t,
    should_free_on_drop: bool,
}

impl AstBuild {
    pub fn alloc(ctx: &Context) -> Result<AstBuild, SolverError> {
        let ptr = unsafe { isl_ast_build_alloc(ctx.ptr) };
        if ptr == 0 {
            return Err(SolverError::NullResult("isl_ast_build_alloc"));
        }
        Ok(AstBuild {
            ptr,
            should_free_on_drop: true,
        })
    }

    /// Wraps the borrowed build handle passed to a callback.
    pub(crate) fn borrowed(ptr: uintptr_t) -> AstBuild {
        AstBuild {
            ptr,
            should_free_on_drop: false,
        }
    }

    pub fn set_at_each_domain(self, callback: AstNodeCallback, user: *mut c_void) -> AstBuild {
        let mut build = self;
        build.should_free_on_drop = false;
        let ptr = unsafe { isl_ast_build_set_at_each_domain(build.ptr, callback, user) };
        AstBuild {
            ptr,
            should_free_on_drop: true,
        }
    }

    pub fn set_after_each_for(self, callback: AstNodeCallback, user: *mut c_void) -> AstBuild {
        let mut build = self;
        build.should_free_on_drop = false;
        let ptr = unsafe { isl_ast_build_set_after_each_for(build.ptr, callback, user) };
        AstBuild {
            ptr,
            should_free_on_drop: true,
        }
    }

    /// Builds the polyhedral AST from a schedule map.
    pub fn node_from_schedule_map(&self, schedule: UnionMap) -> Result<AstNode, SolverError> {
        let ptr = unsafe { isl_ast_build_node_from_schedule_map(self.ptr, schedule.take()) };
        AstNode::from_raw(ptr, "isl_ast_build_node_from_schedule_map")
    }

    /// The schedule active at the current point of the build. Only
    /// meaningful inside a callback.
    pub fn schedule(&self) -> Result<UnionMap, SolverError> {
        let ptr = unsafe { isl_ast_build_get_schedule(self.ptr) };
        UnionMap::from_raw(ptr, "isl_ast_build_get_schedule")
    }

    pub fn expr_from_pw_aff(&self, pa: crate::isl::PwAff) -> Result<AstExpr, SolverError> {
        let ptr = unsafe { isl_ast_build_expr_from_pw_aff(self.ptr, pa.take()) };
        AstExpr::from_raw(ptr, "isl_ast_build_expr_from_pw_aff")
    }

    pub fn access_from_pw_multi_aff(
        &self,
        pma: crate::isl::PwMultiAff,
    ) -> Result<AstExpr, SolverError> {
        let ptr = unsafe { isl_ast_build_access_from_pw_multi_aff(self.ptr, pma.take()) };
        AstExpr::from_raw(ptr, "isl_ast_build_access_from_pw_multi_aff")
    }
}

impl Drop for AstBuild {
    fn drop(&mut self) {
        if self.should_free_on_drop {
            unsafe {
                isl_ast_build_free(self.ptr);
            }
        }
    }
}

// ============================================================================
// AST nodes
// ============================================================================

pub struct AstNode {
    ptr: uintptr_t,
    should_free_on_drop: bool,
}

impl AstNode {
    pub(crate) fn from_raw(ptr: uintptr_t, op: &'static str) -> Result<AstNode, SolverError> {
        if ptr == 0 {
            Err(SolverError::NullResult(op))
        } else {
            Ok(AstNode {
                ptr,
                should_free_on_drop: true,
            })
        }
    }

    /// Wraps a node owned by someone else, for inspection inside callbacks.
    pub(crate) fn borrowed(ptr: uintptr_t) -> AstNode {
        AstNode {
            ptr,
            should_free_on_drop: false,
        }
    }

    pub fn copy(&self) -> AstNode {
        AstNode {
            ptr: unsafe { isl_ast_node_copy(self.ptr) },
            should_free_on_drop: true,
        }
    }

    pub fn node_type(&self) -> AstNodeType {
        match unsafe { isl_ast_node_get_type(self.ptr) } {
            1 => AstNodeType::For,
            2 => AstNodeType::If,
            3 => AstNodeType::Block,
            4 => AstNodeType::Mark,
            5 => AstNodeType::User,
            _ => AstNodeType::Error,
        }
    }

    pub fn for_iterator(&self) -> Result<AstExpr, SolverError> {
        AstExpr::from_raw(
            unsafe { isl_ast_node_for_get_iterator(self.ptr) },
            "isl_ast_node_for_get_iterator",
        )
    }

    pub fn for_init(&self) -> Result<AstExpr, SolverError> {
        AstExpr::from_raw(
            unsafe { isl_ast_node_for_get_init(self.ptr) },
            "isl_ast_node_for_get_init",
        )
    }

    pub fn for_cond(&self) -> Result<AstExpr, SolverError> {
        AstExpr::from_raw(
            unsafe { isl_ast_node_for_get_cond(self.ptr) },
            "isl_ast_node_for_get_cond",
        )
    }

    pub fn for_inc(&self) -> Result<AstExpr, SolverError> {
        AstExpr::from_raw(
            unsafe { isl_ast_node_for_get_inc(self.ptr) },
            "isl_ast_node_for_get_inc",
        )
    }

    pub fn for_body(&self) -> Result<AstNode, SolverError> {
        AstNode::from_raw(
            unsafe { isl_ast_node_for_get_body(self.ptr) },
            "isl_ast_node_for_get_body",
        )
    }

    pub fn if_cond(&self) -> Result<AstExpr, SolverError> {
        AstExpr::from_raw(
            unsafe { isl_ast_node_if_get_cond(self.ptr) },
            "isl_ast_node_if_get_cond",
        )
    }

    pub fn if_then(&self) -> Result<AstNode, SolverError> {
        AstNode::from_raw(
            unsafe { isl_ast_node_if_get_then(self.ptr) },
            "isl_ast_node_if_get_then",
        )
    }

    pub fn if_has_else(&self) -> bool {
        unsafe { isl_ast_node_if_has_else(self.ptr) == 1 }
    }

    pub fn if_else(&self) -> Result<AstNode, SolverError> {
        AstNode::from_raw(
            unsafe { isl_ast_node_if_get_else(self.ptr) },
            "isl_ast_node_if_get_else",
        )
    }

    pub fn block_children(&self) -> Result<Vec<AstNode>, SolverError> {
        let list = unsafe { isl_ast_node_block_get_children(self.ptr) };
        if list == 0 {
            return Err(SolverError::NullResult("isl_ast_node_block_get_children"));
        }
        let n = unsafe { isl_ast_node_list_n_ast_node(list) };
        let mut children = Vec::with_capacity(n.max(0) as usize);
        for i in 0..n.max(0) {
            let child = unsafe { isl_ast_node_list_get_ast_node(list, i) };
            match AstNode::from_raw(child, "isl_ast_node_list_get_ast_node") {
                Ok(node) => children.push(node),
                Err(e) => {
                    unsafe { isl_ast_node_list_free(list) };
                    return Err(e);
                }
            }
        }
        unsafe { isl_ast_node_list_free(list) };
        Ok(children)
    }

    pub fn mark_body(&self) -> Result<AstNode, SolverError> {
        AstNode::from_raw(
            unsafe { isl_ast_node_mark_get_node(self.ptr) },
            "isl_ast_node_mark_get_node",
        )
    }

    pub fn user_expr(&self) -> Result<AstExpr, SolverError> {
        AstExpr::from_raw(
            unsafe { isl_ast_node_user_get_expr(self.ptr) },
            "isl_ast_node_user_get_expr",
        )
    }
}

impl Drop for AstNode {
    fn drop(&mut self) {
        if self.should_free_on_drop {
            unsafe {
                isl_ast_node_free(self.ptr);
            }
        }
    }
}

// ============================================================================
// AST expressions
// ============================================================================

pub struct AstExpr {
    ptr: uintptr_t,
    should_free_on_drop: bool,
}

/// The discriminated view of one AST expression node.
#[derive(Debug)]
pub enum AstExprKind {
    /// An identifier, such as a loop iterator or a buffer name.
    Id(String),
    /// An integer constant.
    Int(i64),
    /// An operation over arguments.
    Op(AstOpType, Vec<AstExpr>),
}

impl AstExpr {
    pub(crate) fn from_raw(ptr: uintptr_t, op: &'static str) -> Result<AstExpr, SolverError> {
        if ptr == 0 {
            Err(SolverError::NullResult(op))
        } else {
            Ok(AstExpr {
                ptr,
                should_free_on_drop: true,
            })
        }
    }

    /// Decomposes the expression one level deep.
    pub fn kind(&self) -> Result<AstExprKind, SolverError> {
        match unsafe { isl_ast_expr_get_type(self.ptr) } {
            1 => {
                let id = unsafe { isl_ast_expr_get_id(self.ptr) };
                if id == 0 {
                    return Err(SolverError::NullResult("isl_ast_expr_get_id"));
                }
                let name_ptr = unsafe { isl_id_get_name(id) };
                let name = if name_ptr.is_null() {
                    String::new()
                } else {
                    unsafe { CStr::from_ptr(name_ptr) }
                        .to_string_lossy()
                        .into_owned()
                };
                unsafe { isl_id_free(id) };
                Ok(AstExprKind::Id(name))
            }
            2 => {
                let val = unsafe { isl_ast_expr_get_val(self.ptr) };
                if val == 0 {
                    return Err(SolverError::NullResult("isl_ast_expr_get_val"));
                }
                let v = unsafe { isl_val_get_num_si(val) };
                unsafe { isl_val_free(val) };
                Ok(AstExprKind::Int(v))
            }
            0 => {
                let op = AstOpType::from_raw(unsafe { isl_ast_expr_get_op_type(self.ptr) })
                    .ok_or(SolverError::ErrorValue("isl_ast_expr_get_op_type"))?;
                let n = unsafe { isl_ast_expr_get_op_n_arg(self.ptr) };
                let mut args = Vec::with_capacity(n.max(0) as usize);
                for i in 0..n.max(0) {
                    let arg = unsafe { isl_ast_expr_get_op_arg(self.ptr, i) };
                    args.push(AstExpr::from_raw(arg, "isl_ast_expr_get_op_arg")?);
                }
                Ok(AstExprKind::Op(op, args))
            }
            _ => Err(SolverError::ErrorValue("isl_ast_expr_get_type")),
        }
    }

    /// Convenience accessor for identifier expressions.
    pub fn id_name(&self) -> Result<String, SolverError> {
        match self.kind()? {
            AstExprKind::Id(name) => Ok(name),
            _ => Err(SolverError::ErrorValue("isl_ast_expr_get_id")),
        }
    }
}

impl Drop for AstExpr {
    fn drop(&mut self) {
        if self.should_free_on_drop {
            unsafe {
                isl_ast_expr_free(self.ptr);
            }
        }
    }
}

impl std::fmt::Debug for AstExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AstExpr({:#x})", self.ptr)
    }
}
