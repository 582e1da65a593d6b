//! Exhaustive candidate generation over the loop-nest syntax tree.
//!
//! Given the current tree and an optimization selector, the generator
//! enumerates every legal single transformation and returns one candidate
//! tree per transformation. Candidates are promissory: each carries exactly
//! one [`OptimizationInfo`] record describing what to do, and nothing is
//! applied until a search driver commits a record through
//! [`apply_optimization`]. Generation is read-only over its input and every
//! candidate is an independent deep copy, so a driver may score and drop
//! candidates freely.
//!
//! Records are serializable so a driver can journal decisions and replay
//! them later.

use crate::error::{Error, Result};
use crate::library::Library;
use crate::scheduling::can_split_iterator;
use crate::syntax_tree::{LoopNode, NodeId, SyntaxTree};
use serde::{Deserialize, Serialize};

/// Which family of transformations to enumerate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationKind {
    Fusion,
    Tiling,
    Interchange,
    Unrolling,
}

/// A pending transformation. Levels are schedule output dimensions; the
/// factor fields are used by tiling and unrolling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationInfo {
    pub kind: OptimizationKind,
    /// Node of the candidate tree the transformation anchors at.
    pub node: NodeId,
    /// Target computations. For fusion: the left band's rightmost
    /// computation followed by the right band's leftmost one.
    pub comps: Vec<String>,
    pub nb_levels: usize,
    pub l0: usize,
    pub l1: usize,
    pub l2: usize,
    pub l0_factor: i64,
    pub l1_factor: i64,
    pub l2_factor: i64,
    /// Tree depth of the fused siblings; the fused band spans levels
    /// `0..=depth`.
    pub depth: usize,
}

impl OptimizationInfo {
    fn new(kind: OptimizationKind, node: NodeId) -> OptimizationInfo {
        OptimizationInfo {
            kind,
            node,
            comps: Vec::new(),
            nb_levels: 0,
            l0: 0,
            l1: 0,
            l2: 0,
            l0_factor: 0,
            l1_factor: 0,
            l2_factor: 0,
            depth: 0,
        }
    }
}

/// Sibling-fusion legality predicate. The default test accepts siblings
/// with identical iterator name and bounds; a dependence-aware driver can
/// swap in something stricter.
pub type FusionLegality = fn(&LoopNode, &LoopNode) -> bool;

pub fn default_fusion_legality(a: &LoopNode, b: &LoopNode) -> bool {
    a.name == b.name && a.low_bound == b.low_bound && a.up_bound == b.up_bound
}

/// Enumerates transformation candidates over a syntax tree.
pub struct ExhaustiveGenerator {
    /// Factors tried for each tiled dimension.
    pub tiling_factors: Vec<i64>,
    /// Factors tried for unrolling.
    pub unrolling_factors: Vec<i64>,
    pub fusion_legality: FusionLegality,
}

impl Default for ExhaustiveGenerator {
    fn default() -> Self {
        ExhaustiveGenerator {
            tiling_factors: vec![32, 64, 128],
            unrolling_factors: vec![4, 8, 16],
            fusion_legality: default_fusion_legality,
        }
    }
}

impl ExhaustiveGenerator {
    /// Returns the finite set of successor trees for one optimization
    /// family. The input tree is left untouched.
    pub fn generate_states(&self, ast: &SyntaxTree, optim: OptimizationKind) -> Vec<SyntaxTree> {
        let mut states = Vec::new();
        match optim {
            OptimizationKind::Fusion => {
                self.generate_fusions(&ast.roots.clone(), &mut states, ast)
            }
            OptimizationKind::Tiling => {
                for &root in &ast.roots {
                    self.generate_tilings(root, &mut states, ast);
                }
            }
            OptimizationKind::Interchange => {
                for &root in &ast.roots {
                    self.generate_interchanges(root, &mut states, ast);
                }
            }
            OptimizationKind::Unrolling => {
                for &root in &ast.roots {
                    self.generate_unrollings(root, &mut states, ast);
                }
            }
        }
        states
    }

    fn generate_fusions(
        &self,
        tree_level: &[NodeId],
        states: &mut Vec<SyntaxTree>,
        ast: &SyntaxTree,
    ) {
        for (i, &left) in tree_level.iter().enumerate() {
            if ast.node(left).unrolled {
                continue;
            }
            for (j, &right) in tree_level.iter().enumerate().skip(i + 1) {
                if ast.node(right).unrolled {
                    continue;
                }
                if !(self.fusion_legality)(ast.node(left), ast.node(right)) {
                    continue;
                }
                let (lhs, rhs) = match (
                    ast.rightmost_computation(left),
                    ast.leftmost_computation(right),
                ) {
                    (Some(lhs), Some(rhs)) => (lhs, rhs),
                    _ => continue,
                };

                let (mut new_ast, new_node) = ast.copy_and_return_node(left);
                let mut info = OptimizationInfo::new(OptimizationKind::Fusion, new_node);
                info.comps = vec![lhs, rhs];
                info.nb_levels = 2;
                info.l0 = i;
                info.l1 = j;
                info.depth = ast.node(left).depth;
                new_ast.pending_optims.push(info);
                states.push(new_ast);
            }
        }

        for &node in tree_level {
            self.generate_fusions(&ast.node(node).children.clone(), states, ast);
        }
    }

    fn generate_tilings(&self, node: NodeId, states: &mut Vec<SyntaxTree>, ast: &SyntaxTree) {
        let branch_depth = ast.loop_levels_chain_depth(node);
        let depth = ast.node(node).depth;

        // Two-dimensional tiles need one more chained level below.
        if depth + 1 < branch_depth {
            for &size_x in &self.tiling_factors {
                if !can_split_iterator(ast.extent(node), size_x) {
                    continue;
                }
                let node2 = ast.node(node).children[0];
                for &size_y in &self.tiling_factors {
                    if !can_split_iterator(ast.extent(node2), size_y) {
                        continue;
                    }

                    let (mut new_ast, new_node) = ast.copy_and_return_node(node);
                    let mut info = OptimizationInfo::new(OptimizationKind::Tiling, new_node);
                    info.nb_levels = 2;
                    info.l0 = depth;
                    info.l1 = depth + 1;
                    info.l0_factor = size_x;
                    info.l1_factor = size_y;
                    info.comps = ast.collect_computations(node);
                    new_ast.pending_optims.push(info);
                    states.push(new_ast);

                    // Three-dimensional tiles extend the pair downward.
                    if depth + 2 < branch_depth {
                        let node3 = ast.node(node2).children[0];
                        for &size_z in &self.tiling_factors {
                            if !can_split_iterator(ast.extent(node3), size_z) {
                                continue;
                            }

                            let (mut new_ast, new_node) = ast.copy_and_return_node(node);
                            let mut info =
                                OptimizationInfo::new(OptimizationKind::Tiling, new_node);
                            info.nb_levels = 3;
                            info.l0 = depth;
                            info.l1 = depth + 1;
                            info.l2 = depth + 2;
                            info.l0_factor = size_x;
                            info.l1_factor = size_y;
                            info.l2_factor = size_z;
                            info.comps = ast.collect_computations(node);
                            new_ast.pending_optims.push(info);
                            states.push(new_ast);
                        }
                    }
                }
            }
        }

        for &child in &ast.node(node).children.clone() {
            self.generate_tilings(child, states, ast);
        }
    }

    fn generate_interchanges(&self, node: NodeId, states: &mut Vec<SyntaxTree>, ast: &SyntaxTree) {
        if !ast.node(node).unrolled {
            let branch_depth = ast.loop_levels_chain_depth(node);
            let depth = ast.node(node).depth;
            for inner in depth + 1..branch_depth {
                let (mut new_ast, new_node) = ast.copy_and_return_node(node);
                let mut info = OptimizationInfo::new(OptimizationKind::Interchange, new_node);
                info.nb_levels = 2;
                info.l0 = depth;
                info.l1 = inner;
                info.comps = ast.collect_computations(node);
                new_ast.pending_optims.push(info);
                states.push(new_ast);
            }
        }

        for &child in &ast.node(node).children.clone() {
            self.generate_interchanges(child, states, ast);
        }
    }

    fn generate_unrollings(&self, node: NodeId, states: &mut Vec<SyntaxTree>, ast: &SyntaxTree) {
        if !ast.node(node).unrolled {
            let extent = ast.extent(node);
            for &factor in &self.unrolling_factors {
                if extent != Some(factor) && !can_split_iterator(extent, factor) {
                    continue;
                }

                let (mut new_ast, new_node) = ast.copy_and_return_node(node);
                let mut info = OptimizationInfo::new(OptimizationKind::Unrolling, new_node);
                info.nb_levels = 1;
                info.l0 = ast.node(node).depth;
                info.l0_factor = factor;
                info.comps = ast.collect_computations(node);
                new_ast.pending_optims.push(info);
                states.push(new_ast);
            }
        }

        for &child in &ast.node(node).children.clone() {
            self.generate_unrollings(child, states, ast);
        }
    }
}

/// Executes one committed record through the schedule algebra.
pub fn apply_optimization(
    library: &mut Library,
    function: &str,
    info: &OptimizationInfo,
) -> Result<()> {
    match info.kind {
        OptimizationKind::Fusion => {
            if info.comps.len() != 2 {
                return Err(Error::TilingArity(
                    "fusion record needs exactly two computations".to_owned(),
                ));
            }
            let f = library
                .function_mut(function)
                .ok_or_else(|| Error::UnboundReference(function.to_owned()))?;
            f.fuse(&info.comps[0], &info.comps[1], info.depth + 1)
        }
        OptimizationKind::Tiling => {
            for name in &info.comps {
                let comp = library
                    .find_computation_mut(name)
                    .ok_or_else(|| Error::UnboundReference(name.clone()))?;
                if info.nb_levels == 3 {
                    comp.tile_3d(
                        info.l0,
                        info.l1,
                        info.l2,
                        info.l0_factor,
                        info.l1_factor,
                        info.l2_factor,
                    )?;
                } else {
                    comp.tile(info.l0, info.l1, info.l0_factor, info.l1_factor)?;
                }
            }
            Ok(())
        }
        OptimizationKind::Interchange => {
            for name in &info.comps {
                let comp = library
                    .find_computation_mut(name)
                    .ok_or_else(|| Error::UnboundReference(name.clone()))?;
                comp.interchange(info.l0, info.l1)?;
            }
            Ok(())
        }
        OptimizationKind::Unrolling => {
            for name in &info.comps {
                library.unroll(name, info.l0, info.l0_factor)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::syntax_tree::SyntaxTree;

    fn nest_2d() -> Library {
        let mut lib = Library::new("lib");
        let f = lib.add_function("f").unwrap();
        f.add_computation(
            Expr::uint8(1),
            "{ S0[i, j] : 0 <= i < 100 and 0 <= j < 100 }",
        )
        .unwrap();
        lib
    }

    fn tree(lib: &Library) -> SyntaxTree {
        SyntaxTree::from_function(lib.function("f").unwrap(), lib).unwrap()
    }

    #[test]
    fn tiling_candidates_are_the_factor_product() {
        let lib = nest_2d();
        let ast = tree(&lib);
        let generator = ExhaustiveGenerator {
            tiling_factors: vec![2, 4],
            ..Default::default()
        };
        let states = generator.generate_states(&ast, OptimizationKind::Tiling);
        assert_eq!(states.len(), 4);
        for state in &states {
            assert_eq!(state.pending_optims.len(), 1);
            let info = &state.pending_optims[0];
            assert_eq!(info.kind, OptimizationKind::Tiling);
            assert_eq!(info.nb_levels, 2);
            assert_eq!((info.l0, info.l1), (0, 1));
            assert_eq!(info.comps, vec!["S0".to_owned()]);
        }
    }

    #[test]
    fn non_divisible_factors_are_skipped() {
        let lib = nest_2d();
        let ast = tree(&lib);
        let generator = ExhaustiveGenerator {
            tiling_factors: vec![3, 100],
            ..Default::default()
        };
        // 100 is not divisible by 3; 100 equals the extent and is allowed.
        let states = generator.generate_states(&ast, OptimizationKind::Tiling);
        assert_eq!(states.len(), 1);
    }

    #[test]
    fn generation_is_non_destructive() {
        let lib = nest_2d();
        let ast = tree(&lib);
        let snapshot = ast.clone();
        let generator = ExhaustiveGenerator::default();
        for kind in [
            OptimizationKind::Fusion,
            OptimizationKind::Tiling,
            OptimizationKind::Interchange,
            OptimizationKind::Unrolling,
        ] {
            let _ = generator.generate_states(&ast, kind);
        }
        assert_eq!(ast, snapshot);
    }

    #[test]
    fn interchange_candidates_cover_the_chain() {
        let mut lib = Library::new("lib");
        let f = lib.add_function("f").unwrap();
        f.add_computation(
            Expr::uint8(1),
            "{ S0[i, j, k] : 0 <= i < 8 and 0 <= j < 8 and 0 <= k < 8 }",
        )
        .unwrap();
        let ast = tree(&lib);
        let generator = ExhaustiveGenerator::default();
        let states = generator.generate_states(&ast, OptimizationKind::Interchange);
        // (0,1), (0,2) from the root and (1,2) from its child.
        assert_eq!(states.len(), 3);
    }

    #[test]
    fn records_round_trip_through_serde() {
        let lib = nest_2d();
        let ast = tree(&lib);
        let generator = ExhaustiveGenerator {
            tiling_factors: vec![4],
            ..Default::default()
        };
        let states = generator.generate_states(&ast, OptimizationKind::Tiling);
        let info = &states[0].pending_optims[0];
        let json = serde_json::to_string(info).unwrap();
        let back: OptimizationInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, info);
    }

    #[test]
    fn committed_tiling_record_rewrites_the_schedule() {
        let mut lib = nest_2d();
        let ast = tree(&lib);
        let generator = ExhaustiveGenerator {
            tiling_factors: vec![4],
            ..Default::default()
        };
        let states = generator.generate_states(&ast, OptimizationKind::Tiling);
        let info = states[0].pending_optims[0].clone();
        apply_optimization(&mut lib, "f", &info).unwrap();
        let c = lib.function("f").unwrap().computation("S0").unwrap();
        assert_eq!(c.schedule().dim(crate::isl::DimType::Out), 4);
    }
}
