//! Lowering: from schedules to a typed statement tree.
//!
//! Two phases.
//!
//! Phase 1 builds the polyhedral AST for the whole library. Every schedule
//! is padded to a common output arity plus one trailing static dimension
//! carrying the computation's declaration index, so statements scheduled
//! at the same time point lower in program order. The padded
//! time-processor sets are unioned, intersected with the union of the
//! per-computation identity relations, and handed to the AST builder,
//! which is configured with atomic upper bounds and two callbacks. The
//! per-domain callback fires at every leaf: it recovers the computation
//! from the tuple name, composes its access relation with the inverse of
//! the builder's current schedule, and keeps both the resulting buffer
//! index expressions and the AST expression of every original domain
//! iterator. The after-for callback only counts generated loops.
//!
//! Phase 2 walks the AST per function with an iterator stack, wrapping
//! bodies in typed loops whose kind comes from the library tag maps, and
//! emitting one store per leaf: the computation's expression with
//! computation references resolved through their access relations and all
//! iterators replaced by the AST expressions captured in phase 1.

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::isl::{DimType, Map, PwMultiAff, UnionMap, UnionSet};
use crate::isl_ast::{
    self, AstBuild, AstExpr, AstExprKind, AstNode, AstNodeType, AstOpType,
};
use crate::library::Library;
use crate::map_parser::{parse_affine, MapTokens};
use crate::stmt::{LoopKind, Stmt};
use libc::uintptr_t;
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};
use std::os::raw::c_void;

/// Everything a leaf needs to become a store statement: the target buffer,
/// the buffer index expressions, and the AST expression of each original
/// domain iterator, by domain position.
#[derive(Clone, Debug)]
pub(crate) struct LeafLowering {
    pub buffer: String,
    pub indices: Vec<Expr>,
    pub iterators: Vec<Expr>,
}

// ============================================================================
// Phase 1: polyhedral AST construction
// ============================================================================

struct BuildContext {
    /// Access relations by computation name, copied before the build.
    accesses: HashMap<String, Map>,
    /// Inverse padded schedules (time to domain) by computation name.
    inverse_schedules: HashMap<String, Map>,
    results: HashMap<String, VecDeque<LeafLowering>>,
    for_nodes: usize,
    error: Option<Error>,
}

unsafe extern "C" fn at_each_domain_cb(
    node: uintptr_t,
    build: uintptr_t,
    user: *mut c_void,
) -> uintptr_t {
    let ctx = &mut *(user as *mut BuildContext);
    if ctx.error.is_none() {
        let node_ref = AstNode::borrowed(node);
        let build_ref = AstBuild::borrowed(build);
        if let Err(e) = lower_leaf(&node_ref, &build_ref, ctx) {
            ctx.error = Some(e);
        }
    }
    node
}

unsafe extern "C" fn after_each_for_cb(
    node: uintptr_t,
    _build: uintptr_t,
    user: *mut c_void,
) -> uintptr_t {
    let ctx = &mut *(user as *mut BuildContext);
    ctx.for_nodes += 1;
    node
}

fn lower_leaf(node: &AstNode, build: &AstBuild, ctx: &mut BuildContext) -> Result<()> {
    let name = leaf_computation_name(node)?;

    let inverse = ctx
        .inverse_schedules
        .get(&name)
        .ok_or_else(|| Error::UnboundReference(name.clone()))?;

    // The builder's schedule maps statement instances to AST coordinates;
    // reversed and composed with the inverse schedule it expresses every
    // original domain iterator in AST terms.
    let stmt_to_ast = Map::from_union_map(build.schedule()?)?;
    let ast_to_time = PwMultiAff::from_map(stmt_to_ast.reverse()?)?;
    let time_to_domain = PwMultiAff::from_map(inverse.copy())?;
    let ast_to_domain = time_to_domain.pullback(ast_to_time)?;

    let mut iterators = Vec::with_capacity(ast_to_domain.out_dim());
    for pos in 0..ast_to_domain.out_dim() {
        let pa = ast_to_domain.pw_aff(pos)?;
        let ast_expr = build.expr_from_pw_aff(pa)?;
        iterators.push(ast_expr_to_expr(&ast_expr)?);
    }

    let access = ctx.accesses.get(&name).ok_or_else(|| {
        Error::Backend(format!(
            "computation `{}` reached lowering without an access relation",
            name
        ))
    })?;
    let index_fn = PwMultiAff::from_map(access.copy())?.pullback(ast_to_domain)?;
    let access_expr = build.access_from_pw_multi_aff(index_fn)?;
    let (buffer, indices) = match access_expr.kind().map_err(Error::Solver)? {
        AstExprKind::Op(AstOpType::Access, args) | AstExprKind::Op(AstOpType::Call, args) => {
            let buffer = args
                .first()
                .ok_or_else(|| Error::Backend("empty access expression".to_owned()))?
                .id_name()
                .map_err(Error::Solver)?;
            let mut indices = Vec::with_capacity(args.len().saturating_sub(1));
            for arg in &args[1..] {
                indices.push(ast_expr_to_expr(arg)?);
            }
            (buffer, indices)
        }
        other => {
            return Err(Error::Backend(format!(
                "unexpected index expression shape: {:?}",
                other
            )))
        }
    };

    ctx.results
        .entry(name)
        .or_default()
        .push_back(LeafLowering {
            buffer,
            indices,
            iterators,
        });
    Ok(())
}

/// The computation name at a user node: the callee of the leaf call
/// expression.
fn leaf_computation_name(node: &AstNode) -> Result<String> {
    let expr = node.user_expr().map_err(Error::Solver)?;
    match expr.kind().map_err(Error::Solver)? {
        AstExprKind::Op(AstOpType::Call, args) | AstExprKind::Op(AstOpType::Access, args) => args
            .first()
            .ok_or_else(|| Error::Backend("leaf call has no callee".to_owned()))?
            .id_name()
            .map_err(Error::Solver),
        other => Err(Error::Backend(format!(
            "leaf expression is not a call: {:?}",
            other
        ))),
    }
}

/// Converts an AST expression into a typed symbolic expression.
fn ast_expr_to_expr(expr: &AstExpr) -> Result<Expr> {
    use crate::expr::{BinOp, CmpOp, LogicalOp};

    Ok(match expr.kind().map_err(Error::Solver)? {
        AstExprKind::Id(name) => Expr::iter(&name),
        AstExprKind::Int(v) => match i32::try_from(v) {
            Ok(v) => Expr::int32(v),
            Err(_) => Expr::Const(crate::expr::Literal::Int64(v)),
        },
        AstExprKind::Op(op, args) => {
            let mut converted = Vec::with_capacity(args.len());
            for arg in &args {
                converted.push(ast_expr_to_expr(arg)?);
            }
            let binary = |op: BinOp, mut args: Vec<Expr>| -> Result<Expr> {
                if args.len() < 2 {
                    return Err(Error::Backend(format!(
                        "operator {:?} with {} arguments",
                        op,
                        args.len()
                    )));
                }
                let mut out = args.remove(0);
                for arg in args {
                    out = Expr::binary(op, out, arg);
                }
                Ok(out)
            };
            let compare = |op: CmpOp, mut args: Vec<Expr>| -> Result<Expr> {
                if args.len() != 2 {
                    return Err(Error::Backend("comparison needs two arguments".to_owned()));
                }
                let rhs = args.pop().expect("two args");
                let lhs = args.pop().expect("two args");
                Ok(Expr::cmp(op, lhs, rhs))
            };
            match op {
                AstOpType::Add => binary(BinOp::Add, converted)?,
                AstOpType::Sub => binary(BinOp::Sub, converted)?,
                AstOpType::Mul => binary(BinOp::Mul, converted)?,
                AstOpType::Div | AstOpType::FdivQ | AstOpType::PdivQ => {
                    binary(BinOp::Div, converted)?
                }
                AstOpType::PdivR | AstOpType::ZdivR => binary(BinOp::Mod, converted)?,
                AstOpType::Min => binary(BinOp::Min, converted)?,
                AstOpType::Max => binary(BinOp::Max, converted)?,
                AstOpType::Minus => {
                    let operand = converted
                        .into_iter()
                        .next()
                        .ok_or_else(|| Error::Backend("negation without operand".to_owned()))?;
                    Expr::neg(operand)
                }
                AstOpType::And | AstOpType::AndThen => {
                    logical(LogicalOp::And, converted)?
                }
                AstOpType::Or | AstOpType::OrElse => logical(LogicalOp::Or, converted)?,
                AstOpType::Eq => compare(CmpOp::Eq, converted)?,
                AstOpType::Le => compare(CmpOp::Le, converted)?,
                AstOpType::Lt => compare(CmpOp::Lt, converted)?,
                AstOpType::Ge => compare(CmpOp::Ge, converted)?,
                AstOpType::Gt => compare(CmpOp::Gt, converted)?,
                AstOpType::Cond | AstOpType::Select => {
                    if converted.len() != 3 {
                        return Err(Error::Backend("select needs three arguments".to_owned()));
                    }
                    let mut it = converted.into_iter();
                    let cond = it.next().expect("three args");
                    let if_true = it.next().expect("three args");
                    let if_false = it.next().expect("three args");
                    Expr::select(cond, if_true, if_false)
                }
                AstOpType::Call | AstOpType::Access => {
                    let mut it = converted.into_iter();
                    let callee = match args.first().map(|a| a.kind()) {
                        Some(Ok(AstExprKind::Id(name))) => name,
                        _ => {
                            return Err(Error::Backend(
                                "access without an identifier base".to_owned(),
                            ))
                        }
                    };
                    it.next();
                    Expr::access(
                        &callee,
                        it.collect(),
                        crate::expr::ElementType::Int32,
                    )
                }
                AstOpType::Member | AstOpType::AddressOf => {
                    return Err(Error::Backend(format!(
                        "unsupported ast operator {:?}",
                        op
                    )))
                }
            }
        }
    })
}

fn logical(op: crate::expr::LogicalOp, args: Vec<Expr>) -> Result<Expr> {
    let mut it = args.into_iter();
    let first = it
        .next()
        .ok_or_else(|| Error::Backend("logical operator without operands".to_owned()))?;
    Ok(it.fold(first, |acc, e| Expr::Logical {
        op,
        lhs: Box::new(acc),
        rhs: Box::new(e),
    }))
}

impl Library {
    /// Phase 1: builds the polyhedral AST for the whole library and stores
    /// the per-leaf index expressions on the computations.
    pub fn gen_isl_ast(&mut self) -> Result<()> {
        isl_ast::set_atomic_upper_bound(self.ctx())?;

        let max_arity = self
            .functions()
            .iter()
            .flat_map(|f| f.computations())
            .map(|c| c.schedule().dim(DimType::Out))
            .max()
            .ok_or_else(|| Error::Backend("library has no computations".to_owned()))?;

        let mut union_tp: Option<UnionSet> = None;
        let mut union_identity: Option<UnionMap> = None;
        let mut build_ctx = BuildContext {
            accesses: HashMap::new(),
            inverse_schedules: HashMap::new(),
            results: HashMap::new(),
            for_nodes: 0,
            error: None,
        };

        for function in self.functions() {
            for (order, computation) in function.computations().iter().enumerate() {
                let padded = pad_schedule(computation, max_arity, order)?;
                let tp = computation.domain().copy().apply(padded.copy())?;
                let identity = tp
                    .identity_map()?
                    .clear_tuple_name(DimType::Out)?;

                union_tp = Some(match union_tp {
                    Some(acc) => acc.union(UnionSet::from_set(tp)?)?,
                    None => UnionSet::from_set(tp)?,
                });
                union_identity = Some(match union_identity {
                    Some(acc) => acc.union(UnionMap::from_map(identity)?)?,
                    None => UnionMap::from_map(identity)?,
                });

                if let Some(access) = computation.access() {
                    build_ctx
                        .accesses
                        .insert(computation.name().to_owned(), access.copy());
                }
                build_ctx
                    .inverse_schedules
                    .insert(computation.name().to_owned(), padded.reverse()?);
            }
        }

        let schedule = union_identity
            .expect("at least one computation")
            .intersect_domain(union_tp.expect("at least one computation"))?;
        debug!(
            "ast schedule map: {}",
            schedule.to_str().unwrap_or_default()
        );

        let user = &mut build_ctx as *mut BuildContext as *mut c_void;
        let build = AstBuild::alloc(self.ctx())?
            .set_at_each_domain(at_each_domain_cb, user)
            .set_after_each_for(after_each_for_cb, user);
        let ast = build.node_from_schedule_map(schedule)?;
        if let Some(e) = build_ctx.error.take() {
            return Err(e);
        }
        debug!("ast built: {} loops generated", build_ctx.for_nodes);

        for function in self.functions_mut() {
            for computation in function.computations_mut() {
                let name = computation.name().to_owned();
                match build_ctx.results.remove(&name) {
                    Some(leaves) => {
                        if let Some(first) = leaves.front() {
                            computation.set_index_exprs(first.indices.clone());
                        }
                        computation.leaf_lowerings = leaves;
                    }
                    None => computation.leaf_lowerings.clear(),
                }
            }
        }

        self.set_ast(ast);
        Ok(())
    }

    /// Phase 2: lowers the AST into one typed statement tree per function.
    pub fn gen_statements(&mut self) -> Result<()> {
        let ast = match self.ast() {
            Some(ast) => ast.copy(),
            None => {
                return Err(Error::Backend(
                    "generate the polyhedral AST before emitting statements".to_owned(),
                ))
            }
        };

        for index in 0..self.functions().len() {
            let mut env = FunctionLowering::for_function(self, index)?;
            let mut iterators = Vec::new();
            let stmt = lower_node(&ast, &mut env, &mut iterators, 0)?
                .unwrap_or_else(|| Stmt::Block(Vec::new()));
            self.functions_mut()[index].set_stmt(stmt);
        }
        Ok(())
    }

    /// Runs both lowering phases.
    pub fn lower(&mut self) -> Result<()> {
        self.gen_isl_ast()?;
        self.gen_statements()
    }
}

/// Appends zero dimensions up to the library-wide arity, plus one trailing
/// static dimension holding the computation's declaration index.
fn pad_schedule(
    computation: &crate::computation::Computation,
    max_arity: usize,
    order: usize,
) -> Result<Map> {
    let schedule = computation.schedule().copy();
    let arity = schedule.dim(DimType::Out);
    let extra = max_arity - arity;
    let mut map = schedule.add_dims(DimType::Out, extra + 1)?;
    for k in 0..extra {
        map = map.fix_dim(DimType::Out, arity + k, 0)?;
    }
    map = map.fix_dim(DimType::Out, arity + extra, order as i32)?;
    map = map.set_tuple_name(DimType::Out, computation.name())?;
    Ok(map)
}

// ============================================================================
// Phase 2: statement emission
// ============================================================================

/// Per-computation data phase 2 needs, detached from the solver handles.
struct CompMeta {
    expression: Expr,
    domain_dims: Vec<String>,
    params: Vec<String>,
    /// Target buffer and range expressions of the access relation, used to
    /// resolve references from other computations.
    access_target: Option<(String, Vec<String>, Vec<Expr>)>,
}

struct FunctionLowering {
    comps: HashMap<String, CompMeta>,
    leaves: HashMap<String, VecDeque<LeafLowering>>,
    buffer_dims: HashMap<String, usize>,
    parallel: HashMap<String, usize>,
    vector: HashMap<String, usize>,
    unroll: HashMap<String, usize>,
}

impl FunctionLowering {
    fn for_function(library: &mut Library, index: usize) -> Result<FunctionLowering> {
        let mut comps = HashMap::new();
        let mut leaves = HashMap::new();
        let mut parallel = HashMap::new();
        let mut vector = HashMap::new();
        let mut unroll = HashMap::new();

        let names: Vec<String> = {
            let function = &library.functions()[index];
            function
                .computations()
                .iter()
                .map(|c| c.name().to_owned())
                .collect()
        };
        for name in &names {
            if let Some(level) = library.parallel_level(name) {
                parallel.insert(name.clone(), level);
            }
            if let Some(level) = library.vector_level(name) {
                vector.insert(name.clone(), level);
            }
            if let Some(level) = library.unroll_level(name) {
                unroll.insert(name.clone(), level);
            }
        }

        let buffer_dims = {
            let function = &library.functions()[index];
            function
                .buffers()
                .iter()
                .map(|(name, buffer)| (name.clone(), buffer.n_dims()))
                .collect()
        };

        let function = &mut library.functions_mut()[index];
        for computation in function.computations_mut() {
            let name = computation.name().to_owned();

            let access_target = match computation.access() {
                Some(access) => {
                    let tokens = MapTokens::parse(&access.to_str().map_err(Error::Solver)?)?;
                    let mut range_exprs = Vec::with_capacity(tokens.range.dims.len());
                    for token in &tokens.range.dims {
                        range_exprs.push(parse_affine(token)?);
                    }
                    Some((tokens.range_name, tokens.domain.dims, range_exprs))
                }
                None => None,
            };

            let domain_dims = (0..computation.domain().dim())
                .map(|p| {
                    computation
                        .domain()
                        .dim_name(p)
                        .unwrap_or_else(|| format!("d{}", p))
                })
                .collect();
            let params = (0..computation.domain().param_dim())
                .filter_map(|p| computation.domain().param_name(p))
                .collect();

            leaves.insert(name.clone(), std::mem::take(&mut computation.leaf_lowerings));
            comps.insert(
                name,
                CompMeta {
                    expression: computation.expression().clone(),
                    domain_dims,
                    params,
                    access_target,
                },
            );
        }

        Ok(FunctionLowering {
            comps,
            leaves,
            buffer_dims,
            parallel,
            vector,
            unroll,
        })
    }
}

fn lower_node(
    node: &AstNode,
    env: &mut FunctionLowering,
    iterators: &mut Vec<String>,
    level: usize,
) -> Result<Option<Stmt>> {
    match node.node_type() {
        AstNodeType::For => {
            let iterator = node
                .for_iterator()
                .map_err(Error::Solver)?
                .id_name()
                .map_err(Error::Solver)?;
            let init = ast_expr_to_expr(&node.for_init().map_err(Error::Solver)?)?;
            let cond = ast_expr_to_expr(&node.for_cond().map_err(Error::Solver)?)?;
            let inc = ast_expr_to_expr(&node.for_inc().map_err(Error::Solver)?)?;

            iterators.push(iterator.clone());
            let body = lower_node(&node.for_body().map_err(Error::Solver)?, env, iterators, level + 1)?;
            iterators.pop();

            let body = match body {
                Some(body) => body,
                None => return Ok(None),
            };

            let kind = loop_kind(node, env, level)?;
            Ok(Some(Stmt::For {
                iterator,
                init,
                cond,
                inc,
                kind,
                body: Box::new(body),
            }))
        }
        AstNodeType::If => {
            let cond = ast_expr_to_expr(&node.if_cond().map_err(Error::Solver)?)?;
            let then_case =
                lower_node(&node.if_then().map_err(Error::Solver)?, env, iterators, level)?;
            let else_case = if node.if_has_else() {
                lower_node(&node.if_else().map_err(Error::Solver)?, env, iterators, level)?
            } else {
                None
            };
            Ok(match (then_case, else_case) {
                (None, None) => None,
                (then_case, else_case) => Some(Stmt::If {
                    cond,
                    then_case: Box::new(then_case.unwrap_or_else(|| Stmt::Block(Vec::new()))),
                    else_case: else_case.map(Box::new),
                }),
            })
        }
        AstNodeType::Block => {
            let mut lowered = Vec::new();
            for child in node.block_children().map_err(Error::Solver)? {
                if let Some(stmt) = lower_node(&child, env, iterators, level)? {
                    lowered.push(stmt);
                }
            }
            Ok(match lowered.len() {
                0 => None,
                1 => Some(lowered.pop().expect("one element")),
                _ => Some(Stmt::Block(lowered)),
            })
        }
        AstNodeType::Mark => {
            lower_node(&node.mark_body().map_err(Error::Solver)?, env, iterators, level)
        }
        AstNodeType::User => {
            let name = leaf_computation_name(node)?;
            if !env.comps.contains_key(&name) {
                // The leaf belongs to another function of the library.
                return Ok(None);
            }
            let leaf = env
                .leaves
                .get_mut(&name)
                .and_then(VecDeque::pop_front)
                .ok_or_else(|| {
                    Error::Backend(format!("no index expression recorded for `{}`", name))
                })?;

            match env.buffer_dims.get(&leaf.buffer) {
                Some(&dims) if dims == leaf.indices.len() => {}
                Some(&dims) => {
                    return Err(Error::Backend(format!(
                        "access of `{}` has {} indices, buffer `{}` has {} dimensions",
                        name,
                        leaf.indices.len(),
                        leaf.buffer,
                        dims
                    )))
                }
                None => return Err(Error::UnboundReference(leaf.buffer.clone())),
            }

            let value = rewrite_expression(env, &name, &leaf)?;
            Ok(Some(Stmt::Store {
                buffer: leaf.buffer,
                indices: leaf.indices,
                value,
            }))
        }
        AstNodeType::Error => Err(Error::Backend("malformed polyhedral AST node".to_owned())),
    }
}

/// Loop kind at `level`: parallel wins over vector, vector over unrolled.
fn loop_kind(node: &AstNode, env: &FunctionLowering, level: usize) -> Result<LoopKind> {
    let mut names = HashSet::new();
    collect_leaf_names(node, &mut names)?;
    let relevant: Vec<&String> = names.iter().filter(|n| env.comps.contains_key(*n)).collect();
    if relevant
        .iter()
        .any(|n| env.parallel.get(*n) == Some(&level))
    {
        return Ok(LoopKind::Parallel);
    }
    if relevant.iter().any(|n| env.vector.get(*n) == Some(&level)) {
        return Ok(LoopKind::Vector);
    }
    if relevant.iter().any(|n| env.unroll.get(*n) == Some(&level)) {
        return Ok(LoopKind::Unrolled);
    }
    Ok(LoopKind::Serial)
}

fn collect_leaf_names(node: &AstNode, out: &mut HashSet<String>) -> Result<()> {
    match node.node_type() {
        AstNodeType::User => {
            out.insert(leaf_computation_name(node)?);
        }
        AstNodeType::For => {
            collect_leaf_names(&node.for_body().map_err(Error::Solver)?, out)?;
        }
        AstNodeType::If => {
            collect_leaf_names(&node.if_then().map_err(Error::Solver)?, out)?;
            if node.if_has_else() {
                collect_leaf_names(&node.if_else().map_err(Error::Solver)?, out)?;
            }
        }
        AstNodeType::Block => {
            for child in node.block_children().map_err(Error::Solver)? {
                collect_leaf_names(&child, out)?;
            }
        }
        AstNodeType::Mark => {
            collect_leaf_names(&node.mark_body().map_err(Error::Solver)?, out)?;
        }
        AstNodeType::Error => {}
    }
    Ok(())
}

/// Produces the stored value: computation references become buffer
/// references through the target's access relation, then every domain
/// iterator is replaced by its AST expression.
fn rewrite_expression(
    env: &FunctionLowering,
    name: &str,
    leaf: &LeafLowering,
) -> Result<Expr> {
    let meta = &env.comps[name];

    // Free variables must be iterators or domain parameters.
    for var in meta.expression.free_vars() {
        if !meta.domain_dims.contains(&var) && !meta.params.contains(&var) {
            return Err(Error::UnboundReference(var));
        }
    }

    let resolved = resolve_computation_refs(&meta.expression, env)?;

    if leaf.iterators.len() != meta.domain_dims.len() {
        return Err(Error::Backend(format!(
            "`{}`: {} iterator expressions for {} domain dimensions",
            name,
            leaf.iterators.len(),
            meta.domain_dims.len()
        )));
    }
    let mapping: HashMap<String, Expr> = meta
        .domain_dims
        .iter()
        .cloned()
        .zip(leaf.iterators.iter().cloned())
        .collect();
    Ok(resolved.substitute(&mapping))
}

/// Rewrites `Access` leaves naming a computation into accesses of that
/// computation's buffer, mapping the index list through its access
/// relation.
fn resolve_computation_refs(expr: &Expr, env: &FunctionLowering) -> Result<Expr> {
    Ok(match expr {
        Expr::Access { name, indices, ty } => {
            let mut resolved_indices = Vec::with_capacity(indices.len());
            for index in indices {
                resolved_indices.push(resolve_computation_refs(index, env)?);
            }
            if let Some(target) = env.comps.get(name) {
                let (buffer, domain_dims, range_exprs) =
                    target.access_target.as_ref().ok_or_else(|| {
                        Error::Backend(format!(
                            "referenced computation `{}` has no access relation",
                            name
                        ))
                    })?;
                if resolved_indices.len() != domain_dims.len() {
                    return Err(Error::Backend(format!(
                        "reference to `{}` has {} indices for {} iterators",
                        name,
                        resolved_indices.len(),
                        domain_dims.len()
                    )));
                }
                let mapping: HashMap<String, Expr> = domain_dims
                    .iter()
                    .cloned()
                    .zip(resolved_indices.into_iter())
                    .collect();
                Expr::Access {
                    name: buffer.clone(),
                    indices: range_exprs.iter().map(|r| r.substitute(&mapping)).collect(),
                    ty: *ty,
                }
            } else if env.buffer_dims.contains_key(name) {
                Expr::Access {
                    name: name.clone(),
                    indices: resolved_indices,
                    ty: *ty,
                }
            } else {
                return Err(Error::UnboundReference(name.clone()));
            }
        }
        Expr::Binary { op, lhs, rhs } => Expr::binary(
            *op,
            resolve_computation_refs(lhs, env)?,
            resolve_computation_refs(rhs, env)?,
        ),
        Expr::Unary { op, operand } => Expr::Unary {
            op: *op,
            operand: Box::new(resolve_computation_refs(operand, env)?),
        },
        Expr::Cmp { op, lhs, rhs } => Expr::cmp(
            *op,
            resolve_computation_refs(lhs, env)?,
            resolve_computation_refs(rhs, env)?,
        ),
        Expr::Logical { op, lhs, rhs } => Expr::Logical {
            op: *op,
            lhs: Box::new(resolve_computation_refs(lhs, env)?),
            rhs: Box::new(resolve_computation_refs(rhs, env)?),
        },
        Expr::Cast { ty, value } => Expr::cast(*ty, resolve_computation_refs(value, env)?),
        Expr::Select {
            cond,
            if_true,
            if_false,
        } => Expr::select(
            resolve_computation_refs(cond, env)?,
            resolve_computation_refs(if_true, env)?,
            resolve_computation_refs(if_false, env)?,
        ),
        Expr::Const(_) | Expr::Var { .. } => expr.clone(),
    })
}
