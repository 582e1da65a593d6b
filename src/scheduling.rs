//! The schedule transformation algebra.
//!
//! Every transformation is a pure rewrite of the targeted computation's
//! schedule relation: the domain, the expression and the other
//! computations are never touched. A transformation builds its candidate
//! map on a copy, verifies that the transformed schedule still covers the
//! domain, and only then commits, so a failure leaves the IR exactly as it
//! was.
//!
//! Level numbering follows the schedule's output dimensions: level 0 is
//! the outermost loop. `split` grows the output arity by one; `tile` is
//! literally `split; split; interchange`.

use crate::computation::Computation;
use crate::error::{Error, Result};
use crate::function::Function;
use crate::isl::{DimType, Map};
use crate::library::Library;
use log::debug;

/// Whether a loop of statically known `extent` can be split by `factor`
/// without a remainder. Extents that are unknown or symbolic never qualify.
/// A factor equal to the extent is allowed as a degenerate split.
pub fn can_split_iterator(extent: Option<i64>, factor: i64) -> bool {
    match extent {
        Some(extent) if factor >= 1 && extent >= factor => {
            extent == factor || extent % factor == 0
        }
        _ => false,
    }
}

impl Computation {
    /// Splits schedule output dimension `level` into an outer and an inner
    /// dimension such that `old = outer * factor + inner` with
    /// `0 <= inner < factor`. The output arity grows by one.
    ///
    /// # Errors
    /// `TilingArity` when `level` is out of range, `InvalidFactor` when the
    /// factor is not positive.
    pub fn split(&mut self, level: usize, factor: i64) -> Result<()> {
        let arity = self.schedule().dim(DimType::Out);
        if level >= arity {
            return Err(Error::TilingArity(format!(
                "split level {} out of range for schedule of arity {}",
                level, arity
            )));
        }
        if factor < 1 {
            return Err(Error::InvalidFactor { level, factor });
        }

        let (transform, range_names) = split_transform(self, level, factor)?;
        let mut new_schedule = self.schedule().copy().apply_range(transform)?;
        // Pass-through range positions of the transform only reference the
        // old dimensions, so the composed map needs its names put back.
        for (pos, dim_name) in range_names.iter().enumerate() {
            new_schedule = new_schedule.set_dim_name(DimType::Out, pos, dim_name)?;
        }
        verify_schedule(self, &new_schedule)?;
        debug!(
            "`{}`: split level {} by {} -> {}",
            self.name(),
            level,
            factor,
            new_schedule.to_str().unwrap_or_default()
        );
        self.commit_schedule(new_schedule);
        Ok(())
    }

    /// Swaps schedule output dimensions `level_a` and `level_b` by moving
    /// both through the input tuple and back in exchanged positions.
    pub fn interchange(&mut self, level_a: usize, level_b: usize) -> Result<()> {
        let arity = self.schedule().dim(DimType::Out);
        if level_a >= arity || level_b >= arity {
            return Err(Error::TilingArity(format!(
                "interchange levels {} and {} out of range for schedule of arity {}",
                level_a, level_b, arity
            )));
        }
        if level_a == level_b {
            return Ok(());
        }
        let (lo, hi) = if level_a < level_b {
            (level_a, level_b)
        } else {
            (level_b, level_a)
        };

        let n_in = self.schedule().dim(DimType::In);
        let name = self.name().to_owned();
        let new_schedule = self
            .schedule()
            .copy()
            .move_dims(DimType::In, n_in, DimType::Out, lo, 1)?
            .move_dims(DimType::In, n_in + 1, DimType::Out, hi - 1, 1)?
            .move_dims(DimType::Out, lo, DimType::In, n_in + 1, 1)?
            .move_dims(DimType::Out, hi, DimType::In, n_in, 1)?
            .set_tuple_name(DimType::In, &name)?
            .set_tuple_name(DimType::Out, &name)?;
        verify_schedule(self, &new_schedule)?;
        debug!("`{}`: interchange levels {} and {}", name, lo, hi);
        self.commit_schedule(new_schedule);
        Ok(())
    }

    /// Rectangular tiling of two consecutive levels: the blocked loops end
    /// up outermost, the intra-tile loops innermost.
    ///
    /// # Errors
    /// `TilingArity` unless `level1 == level0 + 1` and both levels exist.
    pub fn tile(&mut self, level0: usize, level1: usize, size_x: i64, size_y: i64) -> Result<()> {
        if level1 != level0 + 1 {
            return Err(Error::TilingArity(format!(
                "tile levels {} and {} must be consecutive",
                level0, level1
            )));
        }
        let snapshot = self.snapshot();
        let result = self.tile_steps(level0, size_x, size_y);
        if result.is_err() {
            self.restore(snapshot);
        }
        result
    }

    fn tile_steps(&mut self, level0: usize, size_x: i64, size_y: i64) -> Result<()> {
        self.split(level0, size_x)?;
        self.split(level0 + 2, size_y)?;
        self.interchange(level0 + 1, level0 + 2)
    }

    /// Three-dimensional tiling of three consecutive levels.
    pub fn tile_3d(
        &mut self,
        level0: usize,
        level1: usize,
        level2: usize,
        size_x: i64,
        size_y: i64,
        size_z: i64,
    ) -> Result<()> {
        if level1 != level0 + 1 || level2 != level0 + 2 {
            return Err(Error::TilingArity(format!(
                "tile levels {}, {} and {} must be consecutive",
                level0, level1, level2
            )));
        }
        let snapshot = self.snapshot();
        let result = self.tile_3d_steps(level0, size_x, size_y, size_z);
        if result.is_err() {
            self.restore(snapshot);
        }
        result
    }

    // After the three splits the range reads [a0, a1, b0, b1, c0, c1]; the
    // interchanges gather the three block dimensions in front of the three
    // intra-tile dimensions.
    fn tile_3d_steps(
        &mut self,
        level0: usize,
        size_x: i64,
        size_y: i64,
        size_z: i64,
    ) -> Result<()> {
        self.split(level0, size_x)?;
        self.split(level0 + 2, size_y)?;
        self.split(level0 + 4, size_z)?;
        self.interchange(level0 + 1, level0 + 2)?;
        self.interchange(level0 + 2, level0 + 4)?;
        self.interchange(level0 + 3, level0 + 4)
    }
}

impl Function {
    /// Fuses two computations that share their first `depth` loop levels:
    /// a static ordering dimension is inserted at position `depth` into
    /// both schedules, placing `lhs` before `rhs` inside the fused band.
    ///
    /// # Errors
    /// `UnboundReference` for unknown computations; `TilingArity` when the
    /// leading levels differ in iterator name or extent.
    pub fn fuse(&mut self, lhs: &str, rhs: &str, depth: usize) -> Result<()> {
        if lhs == rhs {
            return Err(Error::TilingArity(
                "cannot fuse a computation with itself".to_owned(),
            ));
        }
        if depth == 0 {
            return Err(Error::TilingArity("fusion depth must be at least 1".to_owned()));
        }
        let lhs_idx = self
            .directory_index(lhs)
            .ok_or_else(|| Error::UnboundReference(lhs.to_owned()))?;
        let rhs_idx = self
            .directory_index(rhs)
            .ok_or_else(|| Error::UnboundReference(rhs.to_owned()))?;

        {
            let left = &self.computations()[lhs_idx];
            let right = &self.computations()[rhs_idx];
            let left_arity = left.schedule().dim(DimType::Out);
            let right_arity = right.schedule().dim(DimType::Out);
            if depth > left_arity || depth > right_arity {
                return Err(Error::TilingArity(format!(
                    "fusion depth {} exceeds schedule arities {} and {}",
                    depth, left_arity, right_arity
                )));
            }
            let left_names = left.schedule_dim_names();
            let right_names = right.schedule_dim_names();
            for level in 0..depth {
                if left_names[level] != right_names[level] {
                    return Err(Error::TilingArity(format!(
                        "fusion level {} iterates `{}` versus `{}`",
                        level, left_names[level], right_names[level]
                    )));
                }
                let left_extent = left.schedule_dim_extent(level)?;
                let right_extent = right.schedule_dim_extent(level)?;
                if left_extent.is_none() || left_extent != right_extent {
                    return Err(Error::TilingArity(format!(
                        "fusion level {} extents differ: {:?} versus {:?}",
                        level, left_extent, right_extent
                    )));
                }
            }
        }

        let left_schedule = order_transform(&self.computations()[lhs_idx], depth, 0)?;
        let right_schedule = order_transform(&self.computations()[rhs_idx], depth, 1)?;

        // Verify both rewrites before committing either.
        let comps = self.computations_mut();
        verify_schedule(&comps[lhs_idx], &left_schedule)?;
        verify_schedule(&comps[rhs_idx], &right_schedule)?;
        comps[lhs_idx].commit_schedule(left_schedule);
        comps[rhs_idx].commit_schedule(right_schedule);
        debug!("fused `{}` before `{}` at depth {}", lhs, rhs, depth);
        Ok(())
    }
}

impl Library {
    /// Unrolls a loop level of a computation: splits the level by `factor`
    /// and marks the resulting inner level as unrolled in the metadata
    /// map. The schedule relation changes only through the split.
    pub fn unroll(&mut self, computation: &str, level: usize, factor: i64) -> Result<()> {
        let comp = self
            .find_computation_mut(computation)
            .ok_or_else(|| Error::UnboundReference(computation.to_owned()))?;
        comp.split(level, factor)?;
        self.add_unroll_dimension(computation, level + 1);
        Ok(())
    }

    /// Records a parallel tag and returns whether the level was in range
    /// of the computation's current schedule.
    pub fn tag_parallel_dimension(&mut self, computation: &str, level: usize) -> Result<()> {
        self.add_parallel_dimension(computation, level)
    }

    /// Records a vector tag.
    pub fn tag_vector_dimension(&mut self, computation: &str, level: usize) -> Result<()> {
        self.add_vector_dimension(computation, level)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds the relation that splits range dimension `level` of the
/// computation's schedule, along with the names of the resulting range
/// dimensions. The relation maps the current range space onto the same
/// space with the target dimension replaced by an outer/inner pair.
fn split_transform(
    comp: &Computation,
    level: usize,
    factor: i64,
) -> Result<(Map, Vec<String>)> {
    let names = comp.schedule_dim_names();
    let target = names[level].clone();
    let (outer, inner) = fresh_split_names(&names, &target);

    let mut range_names = names.clone();
    range_names.splice(level..level + 1, [outer.clone(), inner.clone()]);

    let map_str = format!(
        "{{ {name}[{domain}] -> {name}[{range}] : {target} = {outer} * {factor} + {inner} and 0 <= {inner} < {factor} }}",
        name = comp.name(),
        domain = names.join(", "),
        range = range_names.join(", "),
        target = target,
        outer = outer,
        inner = inner,
        factor = factor,
    );
    let map = Map::read_from_str(comp.ctx(), &map_str).map_err(|_| Error::Parse(map_str))?;
    Ok((map, range_names))
}

/// Picks names for the two dimensions a split introduces, avoiding every
/// name already present in the schedule range.
fn fresh_split_names(existing: &[String], base: &str) -> (String, String) {
    let mut suffix = String::new();
    loop {
        let outer = format!("{}{}0", base, suffix);
        let inner = format!("{}{}1", base, suffix);
        if !existing.contains(&outer) && !existing.contains(&inner) {
            return (outer, inner);
        }
        suffix.push('_');
    }
}

/// Inserts a static dimension with the given constant value at `position`
/// into the schedule's range.
fn order_transform(comp: &Computation, position: usize, value: i32) -> Result<Map> {
    let schedule = comp.schedule().copy();
    let arity = schedule.dim(DimType::Out);
    let n_in = schedule.dim(DimType::In);
    let name = comp.name().to_owned();
    let m = schedule
        .add_dims(DimType::Out, 1)?
        .fix_dim(DimType::Out, arity, value)?
        .move_dims(DimType::In, n_in, DimType::Out, arity, 1)?
        .move_dims(DimType::Out, position, DimType::In, n_in, 1)?
        .set_tuple_name(DimType::In, &name)?
        .set_tuple_name(DimType::Out, &name)?;
    Ok(m)
}

/// A transformed schedule must cover the domain exactly when the domain is
/// non-empty. A violation means the rewrite lost iterations.
fn verify_schedule(comp: &Computation, schedule: &Map) -> Result<()> {
    let image = comp.domain().copy().apply(schedule.copy())?;
    if image.is_empty()? != comp.domain().is_empty()? {
        return Err(Error::TilingArity(format!(
            "transformed schedule of `{}` no longer covers its domain",
            comp.name()
        )));
    }
    Ok(())
}
