//! Library containers.
//!
//! A library groups functions and owns the solver context they all share.
//! It also carries the loop-level tag maps: a computation can have at most
//! one parallel level, one vector level and one unrolled level, recorded as
//! `name -> level` and consulted during statement emission.

use crate::error::{Error, Result};
use crate::function::Function;
use crate::isl::{UnionMap, UnionSet};
use crate::isl_ast::AstNode;
use isl_rs::Context;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Library {
    name: String,
    ctx: Arc<Context>,
    functions: Vec<Function>,
    parallel_dims: HashMap<String, usize>,
    vector_dims: HashMap<String, usize>,
    unroll_dims: HashMap<String, usize>,
    auto_data_mapping: bool,
    ast: Option<AstNode>,
}

impl Library {
    /// Creates a library and allocates the solver context shared by all of
    /// its functions.
    pub fn new(name: &str) -> Library {
        debug_assert!(!name.is_empty(), "library name empty");
        Library {
            name: name.to_owned(),
            ctx: Arc::new(Context::alloc()),
            functions: Vec::new(),
            parallel_dims: HashMap::new(),
            vector_dims: HashMap::new(),
            unroll_dims: HashMap::new(),
            auto_data_mapping: true,
            ast: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ctx(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn add_function(&mut self, name: &str) -> Result<&mut Function> {
        if self.functions.iter().any(|f| f.name() == name) {
            return Err(Error::DuplicateName(name.to_owned()));
        }
        self.functions
            .push(Function::new(name, self.ctx.clone(), self.auto_data_mapping));
        Ok(self.functions.last_mut().expect("just pushed"))
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name() == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name() == name)
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub(crate) fn functions_mut(&mut self) -> &mut [Function] {
        &mut self.functions
    }

    /// Looks a computation up across all functions of the library.
    pub(crate) fn find_computation_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut crate::computation::Computation> {
        for function in &mut self.functions {
            if function.directory_index(name).is_some() {
                return function.computation_mut(name);
            }
        }
        None
    }

    fn contains_computation(&self, name: &str) -> bool {
        self.functions
            .iter()
            .any(|f| f.directory_index(name).is_some())
    }

    /// Tags a loop level of a computation for parallel execution. Level 0
    /// is the outermost loop.
    pub fn add_parallel_dimension(&mut self, computation: &str, level: usize) -> Result<()> {
        if !self.contains_computation(computation) {
            return Err(Error::UnboundReference(computation.to_owned()));
        }
        self.parallel_dims.insert(computation.to_owned(), level);
        Ok(())
    }

    /// Tags a loop level of a computation for vector execution.
    pub fn add_vector_dimension(&mut self, computation: &str, level: usize) -> Result<()> {
        if !self.contains_computation(computation) {
            return Err(Error::UnboundReference(computation.to_owned()));
        }
        self.vector_dims.insert(computation.to_owned(), level);
        Ok(())
    }

    pub(crate) fn add_unroll_dimension(&mut self, computation: &str, level: usize) {
        self.unroll_dims.insert(computation.to_owned(), level);
    }

    /// True iff `computation` should be parallelized at loop level `level`.
    pub fn parallelize(&self, computation: &str, level: usize) -> bool {
        self.parallel_dims.get(computation) == Some(&level)
    }

    /// True iff `computation` should be vectorized at loop level `level`.
    pub fn vectorize(&self, computation: &str, level: usize) -> bool {
        self.vector_dims.get(computation) == Some(&level)
    }

    /// True iff `computation` carries an unroll mark at loop level `level`.
    pub fn unrolled(&self, computation: &str, level: usize) -> bool {
        self.unroll_dims.get(computation) == Some(&level)
    }

    pub(crate) fn parallel_level(&self, computation: &str) -> Option<usize> {
        self.parallel_dims.get(computation).copied()
    }

    pub(crate) fn vector_level(&self, computation: &str) -> Option<usize> {
        self.vector_dims.get(computation).copied()
    }

    pub(crate) fn unroll_level(&self, computation: &str) -> Option<usize> {
        self.unroll_dims.get(computation).copied()
    }

    /// When enabled (the default), schedule edits keep each computation's
    /// data mapping consistent automatically; when disabled, the user must
    /// call `set_access` after every schedule edit.
    pub fn set_auto_data_mapping(&mut self, value: bool) {
        self.auto_data_mapping = value;
        for function in &mut self.functions {
            function.set_auto_data_mapping(value);
        }
    }

    pub fn auto_data_mapping(&self) -> bool {
        self.auto_data_mapping
    }

    /// Union of all iteration domains in the library.
    pub fn iteration_spaces(&self) -> Result<UnionSet> {
        let mut out: Option<UnionSet> = None;
        for function in &self.functions {
            for computation in function.computations() {
                let piece = UnionSet::from_set(computation.domain().copy())?;
                out = Some(match out {
                    Some(acc) => acc.union(piece)?,
                    None => piece,
                });
            }
        }
        out.ok_or_else(|| Error::Backend("library has no computations".to_owned()))
    }

    /// Union of all schedule relations in the library.
    pub fn schedule_map(&self) -> Result<UnionMap> {
        let mut out: Option<UnionMap> = None;
        for function in &self.functions {
            for computation in function.computations() {
                let piece = UnionMap::from_map(computation.schedule().copy())?;
                out = Some(match out {
                    Some(acc) => acc.union(piece)?,
                    None => piece,
                });
            }
        }
        out.ok_or_else(|| Error::Backend("library has no computations".to_owned()))
    }

    /// Union of all time-processor representations in the library.
    pub fn time_processor_representation(&self) -> Result<UnionSet> {
        let mut out: Option<UnionSet> = None;
        for function in &self.functions {
            for computation in function.computations() {
                let piece = UnionSet::from_set(computation.time_processor()?)?;
                out = Some(match out {
                    Some(acc) => acc.union(piece)?,
                    None => piece,
                });
            }
        }
        out.ok_or_else(|| Error::Backend("library has no computations".to_owned()))
    }

    /// The polyhedral AST of the last lowering run.
    pub fn ast(&self) -> Option<&AstNode> {
        self.ast.as_ref()
    }

    pub(crate) fn set_ast(&mut self, ast: AstNode) {
        self.ast = Some(ast);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;

    #[test]
    fn tag_queries_match_exact_levels_only() {
        let mut lib = Library::new("lib");
        let f = lib.add_function("f").unwrap();
        f.add_computation(Expr::uint8(3), "{ S0[i, j] : 0 <= i < 4 and 0 <= j < 4 }")
            .unwrap();

        lib.add_parallel_dimension("S0", 1).unwrap();
        assert!(lib.parallelize("S0", 1));
        assert!(!lib.parallelize("S0", 0));
        assert!(!lib.vectorize("S0", 1));
        assert!(!lib.parallelize("S1", 1));
    }

    #[test]
    fn tagging_unknown_computation_fails() {
        let mut lib = Library::new("lib");
        lib.add_function("f").unwrap();
        assert!(matches!(
            lib.add_parallel_dimension("missing", 0),
            Err(Error::UnboundReference(_))
        ));
    }

    #[test]
    fn duplicate_function_name_is_rejected() {
        let mut lib = Library::new("lib");
        lib.add_function("f").unwrap();
        assert!(matches!(
            lib.add_function("f"),
            Err(Error::DuplicateName(_))
        ));
    }
}
