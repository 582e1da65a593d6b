//! polyir: a polyhedral lowering library.
//!
//! Users describe numeric computations as named statements over integer
//! iteration domains, attach an independent schedule and memory mapping to
//! each, and lower the whole library to a typed imperative statement tree
//! through an integer-set abstract machine.
//!
//! # Core Pipeline Flow
//! ```text
//! expressions + iteration-space strings
//!        |
//!   Computation IR (domain, schedule, access)
//!        |                      \
//!   schedule algebra      candidate generator (syntax tree states)
//!        |                      /
//!   polyhedral AST construction (ISL)
//!        |
//!   typed statement tree per function -> native backend
//! ```
//!
//! # Module Organization
//!
//! ## Leaves
//! - [`expr`]: symbolic expression trees with typed leaves
//! - [`isl`]: move-only facade over the integer-set solver
//! - [`isl_ast`]: AST construction bindings (build object, callbacks)
//! - [`map_parser`]: tokenized view of set/map strings
//! - [`buffer`]: memory objects bound to computations
//!
//! ## IR and containers
//! - [`computation`]: named statements with domain, schedule and access
//! - [`function`]: computation arenas, buffers, arguments
//! - [`library`]: functions, shared solver context, loop tag maps
//!
//! ## Transformations and search
//! - [`scheduling`]: tile/split/interchange/fuse/unroll as schedule rewrites
//! - [`syntax_tree`]: loop-nest view of the current schedules
//! - [`states_generator`]: exhaustive candidate enumeration with
//!   serializable records
//!
//! ## Lowering
//! - [`codegen`]: polyhedral AST build and statement emission
//! - [`stmt`]: the typed statement tree handed to backends

pub mod buffer;
pub mod codegen;
pub mod computation;
pub mod error;
pub mod expr;
pub mod function;
pub mod isl;
pub mod isl_ast;
pub mod library;
pub mod map_parser;
pub mod scheduling;
pub mod states_generator;
pub mod stmt;
pub mod syntax_tree;

pub use buffer::{Buffer, StorageRole};
pub use computation::Computation;
pub use error::{Error, Result};
pub use expr::{BinOp, CmpOp, ElementType, Expr, Literal, LogicalOp, UnOp};
pub use function::Function;
pub use isl::SolverError;
pub use library::Library;
pub use scheduling::can_split_iterator;
pub use states_generator::{
    apply_optimization, default_fusion_legality, ExhaustiveGenerator, OptimizationInfo,
    OptimizationKind,
};
pub use stmt::{LoopKind, Stmt};
pub use syntax_tree::{Bound, LoopNode, NodeId, SyntaxTree};
