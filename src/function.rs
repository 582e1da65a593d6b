//! Function containers.
//!
//! A function owns an unordered multiset of computations, the buffers they
//! store into, and an ordered argument list. The order computations are
//! added carries no execution meaning; execution order is entirely the
//! schedules' business. Computations are stored in an arena and looked up
//! through a flat name directory, which is the only way expressions refer
//! to other computations.

use crate::buffer::Buffer;
use crate::computation::Computation;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::stmt::Stmt;
use isl_rs::Context;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Function {
    name: String,
    ctx: Arc<Context>,
    auto_data_mapping: bool,
    computations: Vec<Computation>,
    directory: HashMap<String, usize>,
    buffers: HashMap<String, Buffer>,
    arguments: Vec<String>,
    stmt: Option<Stmt>,
}

impl Function {
    pub(crate) fn new(name: &str, ctx: Arc<Context>, auto_data_mapping: bool) -> Function {
        Function {
            name: name.to_owned(),
            ctx,
            auto_data_mapping,
            computations: Vec::new(),
            directory: HashMap::new(),
            buffers: HashMap::new(),
            arguments: Vec::new(),
            stmt: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares a computation from an expression and an iteration-space
    /// string, registering it under its tuple name.
    ///
    /// # Errors
    /// `Parse` for a malformed iteration space, `DuplicateName` when the
    /// tuple name is already registered in this function.
    pub fn add_computation(
        &mut self,
        expression: Expr,
        iteration_space: &str,
    ) -> Result<&mut Computation> {
        let computation = Computation::new(
            expression,
            iteration_space,
            self.ctx.clone(),
            self.auto_data_mapping,
        )?;
        let name = computation.name().to_owned();
        if self.directory.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }
        self.directory.insert(name, self.computations.len());
        self.computations.push(computation);
        Ok(self.computations.last_mut().expect("just pushed"))
    }

    pub fn computation(&self, name: &str) -> Option<&Computation> {
        self.directory.get(name).map(|&i| &self.computations[i])
    }

    pub fn computation_mut(&mut self, name: &str) -> Option<&mut Computation> {
        match self.directory.get(name) {
            Some(&i) => Some(&mut self.computations[i]),
            None => None,
        }
    }

    /// Computations in declaration order.
    pub fn computations(&self) -> &[Computation] {
        &self.computations
    }

    pub(crate) fn computations_mut(&mut self) -> &mut [Computation] {
        &mut self.computations
    }

    pub(crate) fn directory_index(&self, name: &str) -> Option<usize> {
        self.directory.get(name).copied()
    }

    /// Registers a buffer with the function.
    pub fn add_buffer(&mut self, buffer: Buffer) -> Result<()> {
        if self.buffers.contains_key(buffer.name()) {
            return Err(Error::DuplicateName(buffer.name().to_owned()));
        }
        self.buffers.insert(buffer.name().to_owned(), buffer);
        Ok(())
    }

    /// Appends a buffer to the ordered argument list. The first added
    /// argument is the first function argument.
    pub fn add_argument(&mut self, buffer_name: &str) -> Result<()> {
        if !self.buffers.contains_key(buffer_name) {
            return Err(Error::UnboundReference(buffer_name.to_owned()));
        }
        if self.arguments.iter().any(|a| a == buffer_name) {
            return Err(Error::DuplicateName(buffer_name.to_owned()));
        }
        self.arguments.push(buffer_name.to_owned());
        Ok(())
    }

    pub fn buffer(&self, name: &str) -> Option<&Buffer> {
        self.buffers.get(name)
    }

    pub fn buffers(&self) -> &HashMap<String, Buffer> {
        &self.buffers
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// The statement tree produced by lowering, if lowering has run.
    pub fn stmt(&self) -> Option<&Stmt> {
        self.stmt.as_ref()
    }

    pub(crate) fn set_stmt(&mut self, stmt: Stmt) {
        self.stmt = Some(stmt);
    }

    pub(crate) fn ctx(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub(crate) fn set_auto_data_mapping(&mut self, value: bool) {
        self.auto_data_mapping = value;
        for computation in &mut self.computations {
            computation.set_auto_data_mapping(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function() -> Function {
        Function::new("f", Arc::new(Context::alloc()), true)
    }

    #[test]
    fn duplicate_computation_name_is_rejected() {
        let mut f = function();
        f.add_computation(Expr::uint8(1), "{ S0[i] : 0 <= i < 4 }")
            .unwrap();
        let err = f.add_computation(Expr::uint8(2), "{ S0[i] : 0 <= i < 4 }");
        assert!(matches!(err, Err(Error::DuplicateName(name)) if name == "S0"));
    }

    #[test]
    fn arguments_keep_insertion_order_and_must_exist() {
        let mut f = function();
        for name in ["a", "b"] {
            f.add_buffer(
                Buffer::new(
                    name,
                    vec![4],
                    crate::expr::ElementType::Float32,
                    crate::buffer::StorageRole::Input,
                    None,
                )
                .unwrap(),
            )
            .unwrap();
        }
        f.add_argument("b").unwrap();
        f.add_argument("a").unwrap();
        assert_eq!(f.arguments(), &["b".to_owned(), "a".to_owned()]);
        assert!(matches!(
            f.add_argument("missing"),
            Err(Error::UnboundReference(_))
        ));
    }
}
