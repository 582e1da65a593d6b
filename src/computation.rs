//! The computation IR.
//!
//! A computation is a named statement: an iteration domain (an integer set
//! whose tuple name is the computation's identity), a symbolic expression
//! producing the value at each domain point, a schedule relation ordering
//! those points in time, and an access relation mapping them to a buffer.
//! Domain, schedule and access are independent: schedule transformations
//! never touch the domain or the expression.

use crate::codegen::LeafLowering;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::isl::{DimType, Map, Set};
use crate::map_parser::SetTokens;
use isl_rs::Context;
use log::debug;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

pub struct Computation {
    name: String,
    ctx: Arc<Context>,
    domain: Set,
    expression: Expr,
    schedule: Map,
    access: Option<Map>,
    auto_data_mapping: bool,
    /// Lazily derived image of the domain under the schedule.
    time_processor: RefCell<Option<Set>>,
    /// Per-leaf lowering data produced during AST construction.
    pub(crate) leaf_lowerings: VecDeque<LeafLowering>,
    /// Buffer index expressions of the first lowered leaf.
    index_exprs: Option<Vec<Expr>>,
}

impl Computation {
    /// Parses the iteration-space string, derives the computation name from
    /// its tuple, and installs the identity schedule over the domain.
    pub(crate) fn new(
        expression: Expr,
        iteration_space: &str,
        ctx: Arc<Context>,
        auto_data_mapping: bool,
    ) -> Result<Computation> {
        if iteration_space.trim().is_empty() {
            return Err(Error::Parse("empty iteration space".to_owned()));
        }
        let domain = Set::read_from_str(&ctx, iteration_space)
            .map_err(|_| Error::Parse(iteration_space.to_owned()))?;
        let name = domain
            .tuple_name()
            .ok_or_else(|| Error::Parse(format!("iteration space `{}` has no tuple name", iteration_space)))?;

        let schedule = identity_schedule(&domain, &ctx)?;
        debug!(
            "computation `{}`: identity schedule {}",
            name,
            schedule.to_str().unwrap_or_default()
        );

        Ok(Computation {
            name,
            ctx,
            domain,
            expression,
            schedule,
            access: None,
            auto_data_mapping,
            time_processor: RefCell::new(None),
            leaf_lowerings: VecDeque::new(),
            index_exprs: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &Set {
        &self.domain
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    pub fn schedule(&self) -> &Map {
        &self.schedule
    }

    pub fn access(&self) -> Option<&Map> {
        self.access.as_ref()
    }

    /// Buffer index expressions derived at AST-build time, once lowering
    /// has run.
    pub fn index_exprs(&self) -> Option<&[Expr]> {
        self.index_exprs.as_deref()
    }

    /// Replaces the access relation. The access maps the iteration domain
    /// to buffer coordinates and its input tuple must carry the
    /// computation's name.
    pub fn set_access(&mut self, access_str: &str) -> Result<()> {
        let access = Map::read_from_str(&self.ctx, access_str)
            .map_err(|_| Error::Parse(access_str.to_owned()))?;
        match access.tuple_name(DimType::In) {
            Some(ref n) if n == &self.name => {}
            other => {
                return Err(Error::Parse(format!(
                    "access domain tuple `{}` does not match computation `{}`",
                    other.unwrap_or_default(),
                    self.name
                )))
            }
        }
        self.access = Some(access);
        Ok(())
    }

    /// Replaces the schedule with a parsed map, after validating that both
    /// tuple names equal the computation name.
    pub fn set_schedule(&mut self, schedule: Map) -> Result<()> {
        for side in [DimType::In, DimType::Out] {
            match schedule.tuple_name(side) {
                Some(ref n) if n == &self.name => {}
                other => {
                    return Err(Error::ScheduleTupleMismatch {
                        expected: self.name.clone(),
                        found: other.unwrap_or_default(),
                    })
                }
            }
        }
        self.commit_schedule(schedule);
        Ok(())
    }

    /// Replaces the schedule from its textual form.
    pub fn set_schedule_str(&mut self, map_str: &str) -> Result<()> {
        let map =
            Map::read_from_str(&self.ctx, map_str).map_err(|_| Error::Parse(map_str.to_owned()))?;
        self.set_schedule(map)
    }

    pub(crate) fn ctx(&self) -> &Context {
        &self.ctx
    }

    /// The time-processor representation: the image of the domain under the
    /// current schedule. Cached until the schedule changes.
    pub fn time_processor(&self) -> Result<Set> {
        if let Some(tp) = &*self.time_processor.borrow() {
            return Ok(tp.copy());
        }
        let tp = self.domain.copy().apply(self.schedule.copy())?;
        *self.time_processor.borrow_mut() = Some(tp.copy());
        Ok(tp)
    }

    /// Names of the schedule output dimensions, with stable fallbacks for
    /// anonymous dimensions.
    pub fn schedule_dim_names(&self) -> Vec<String> {
        (0..self.schedule.dim(DimType::Out))
            .map(|i| {
                self.schedule
                    .dim_name(DimType::Out, i)
                    .unwrap_or_else(|| format!("t{}", i))
            })
            .collect()
    }

    /// The static extent of one schedule output dimension, when the bounds
    /// are fixed integers.
    pub fn schedule_dim_extent(&self, level: usize) -> Result<Option<i64>> {
        let tp = self.time_processor()?;
        if level >= tp.dim() {
            return Ok(None);
        }
        let low = tp.dim_min_value(level)?;
        let up = tp.dim_max_value(level)?;
        Ok(match (low, up) {
            (Some(l), Some(u)) => Some(u - l + 1),
            _ => None,
        })
    }

    pub(crate) fn auto_data_mapping(&self) -> bool {
        self.auto_data_mapping
    }

    pub(crate) fn set_auto_data_mapping(&mut self, value: bool) {
        self.auto_data_mapping = value;
    }

    /// Installs an already validated schedule. With automatic data mapping
    /// the access stays anchored on the domain and is recomposed at
    /// lowering; without it the stored access is stale and cleared, and the
    /// caller must provide a fresh one before lowering.
    pub(crate) fn commit_schedule(&mut self, schedule: Map) {
        self.schedule = schedule;
        *self.time_processor.borrow_mut() = None;
        self.leaf_lowerings.clear();
        self.index_exprs = None;
        if !self.auto_data_mapping && self.access.take().is_some() {
            debug!(
                "computation `{}`: access cleared after schedule edit",
                self.name
            );
        }
    }

    pub(crate) fn set_index_exprs(&mut self, exprs: Vec<Expr>) {
        self.index_exprs = Some(exprs);
    }

    /// Saves schedule and access so a multi-step transformation can roll
    /// back without observable effects.
    pub(crate) fn snapshot(&self) -> (Map, Option<Map>) {
        (self.schedule.copy(), self.access.as_ref().map(Map::copy))
    }

    pub(crate) fn restore(&mut self, snapshot: (Map, Option<Map>)) {
        self.schedule = snapshot.0;
        self.access = snapshot.1;
        *self.time_processor.borrow_mut() = None;
    }
}

/// Derives the identity schedule from a domain: same tuple name on both
/// sides, same dimensions, same constraints. The output dimensions are
/// named after the domain iterators so the schedule keeps its iterator
/// names through later rewrites.
fn identity_schedule(domain: &Set, ctx: &Context) -> Result<Map> {
    let tokens = SetTokens::parse(&domain.to_str()?)?;
    let map_str = tokens.identity_map_str();
    let mut map = Map::read_from_str(ctx, &map_str).map_err(|_| Error::Parse(map_str))?;
    for pos in 0..domain.dim() {
        if let Some(name) = domain.dim_name(pos) {
            map = map.set_dim_name(DimType::Out, pos, &name)?;
        }
    }
    Ok(map)
}
