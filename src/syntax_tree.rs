//! The loop-nest syntax tree.
//!
//! A derived, rebuildable view of the current schedules of one function:
//! every computation's schedule is projected onto its output dimensions and
//! chains sharing iterator name and bounds are merged into common prefixes.
//! The candidate generator explores this tree instead of the schedule
//! relations themselves, which keeps enumeration cheap.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Deep-copying a
//! tree preserves node ids, so a candidate can point into its own twin
//! without sharing any mutable state with the original.

use crate::error::Result;
use crate::function::Function;
use crate::library::Library;
use crate::states_generator::OptimizationInfo;

pub type NodeId = usize;

/// A loop bound. Bounds that are not fixed integers (parametric domains,
/// unbounded dimensions) stay symbolic and disqualify the loop from
/// factor-based candidates.
#[derive(Clone, Debug, PartialEq)]
pub enum Bound {
    Fixed(i64),
    Symbolic(String),
}

impl Bound {
    pub fn value(&self) -> Option<i64> {
        match self {
            Bound::Fixed(v) => Some(*v),
            Bound::Symbolic(_) => None,
        }
    }
}

/// One loop level of the nest.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopNode {
    pub name: String,
    pub low_bound: Bound,
    pub up_bound: Bound,
    pub depth: usize,
    pub children: Vec<NodeId>,
    /// Computations whose innermost loop level this node is.
    pub computations: Vec<String>,
    pub unrolled: bool,
    pub parallelized: bool,
    pub vectorized: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyntaxTree {
    nodes: Vec<LoopNode>,
    pub roots: Vec<NodeId>,
    /// Transformations this tree is a candidate for. Promissory records:
    /// nothing is applied until the search driver commits.
    pub pending_optims: Vec<OptimizationInfo>,
}

struct LevelInfo {
    name: String,
    low: Bound,
    up: Bound,
    unrolled: bool,
    parallelized: bool,
    vectorized: bool,
}

impl SyntaxTree {
    /// Builds the tree for one function from its current schedules, with
    /// unroll/parallel/vector flags seeded from the library tag maps.
    pub fn from_function(function: &Function, library: &Library) -> Result<SyntaxTree> {
        let mut tree = SyntaxTree::default();
        for computation in function.computations() {
            let tp = computation.time_processor()?;
            let names = computation.schedule_dim_names();
            let mut levels = Vec::with_capacity(names.len());
            for (level, name) in names.iter().enumerate() {
                let low = match tp.dim_min_value(level)? {
                    Some(v) => Bound::Fixed(v),
                    None => Bound::Symbolic(name.clone()),
                };
                let up = match tp.dim_max_value(level)? {
                    Some(v) => Bound::Fixed(v),
                    None => Bound::Symbolic(name.clone()),
                };
                levels.push(LevelInfo {
                    name: name.clone(),
                    low,
                    up,
                    unrolled: library.unrolled(computation.name(), level),
                    parallelized: library.parallelize(computation.name(), level),
                    vectorized: library.vectorize(computation.name(), level),
                });
            }
            tree.insert_chain(computation.name(), &levels);
        }
        Ok(tree)
    }

    fn insert_chain(&mut self, computation: &str, levels: &[LevelInfo]) {
        // A chain identical to an existing one stays a separate branch:
        // the two nests are unordered duplicates, which is exactly what
        // the fusion rule looks for. Partial overlaps merge their shared
        // prefix (an ordered band).
        let merge = !self.has_identical_chain(levels);
        let mut parent: Option<NodeId> = None;
        for (depth, level) in levels.iter().enumerate() {
            let siblings: Vec<NodeId> = match (merge, parent) {
                (false, _) => Vec::new(),
                (true, None) => self.roots.clone(),
                (true, Some(p)) => self.nodes[p].children.clone(),
            };
            let matched = siblings.into_iter().find(|&id| {
                let node = &self.nodes[id];
                node.name == level.name
                    && node.low_bound == level.low
                    && node.up_bound == level.up
            });
            let id = match matched {
                Some(id) => {
                    let node = &mut self.nodes[id];
                    node.unrolled |= level.unrolled;
                    node.parallelized |= level.parallelized;
                    node.vectorized |= level.vectorized;
                    id
                }
                None => {
                    let id = self.nodes.len();
                    self.nodes.push(LoopNode {
                        name: level.name.clone(),
                        low_bound: level.low.clone(),
                        up_bound: level.up.clone(),
                        depth,
                        children: Vec::new(),
                        computations: Vec::new(),
                        unrolled: level.unrolled,
                        parallelized: level.parallelized,
                        vectorized: level.vectorized,
                    });
                    match parent {
                        None => self.roots.push(id),
                        Some(p) => self.nodes[p].children.push(id),
                    }
                    id
                }
            };
            parent = Some(id);
        }
        if let Some(id) = parent {
            self.nodes[id].computations.push(computation.to_owned());
        }
    }

    /// True when an existing branch matches every level and already ends in
    /// a computation.
    fn has_identical_chain(&self, levels: &[LevelInfo]) -> bool {
        let mut parent: Option<NodeId> = None;
        for level in levels {
            let siblings = match parent {
                None => &self.roots,
                Some(p) => &self.nodes[p].children,
            };
            let matched = siblings.iter().copied().find(|&id| {
                let node = &self.nodes[id];
                node.name == level.name
                    && node.low_bound == level.low
                    && node.up_bound == level.up
            });
            match matched {
                Some(id) => parent = Some(id),
                None => return false,
            }
        }
        parent.map_or(false, |id| !self.nodes[id].computations.is_empty())
    }

    pub fn node(&self, id: NodeId) -> &LoopNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut LoopNode {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deep-copies the tree and returns the twin together with the id of
    /// the node corresponding to `node` in the copy. Arena ids survive the
    /// copy, so the returned id is valid in the twin and the two trees
    /// share nothing.
    pub fn copy_and_return_node(&self, node: NodeId) -> (SyntaxTree, NodeId) {
        (self.clone(), node)
    }

    /// Static trip count of the loop, when both bounds are fixed.
    pub fn extent(&self, id: NodeId) -> Option<i64> {
        let node = &self.nodes[id];
        match (node.low_bound.value(), node.up_bound.value()) {
            (Some(low), Some(up)) => Some(up - low + 1),
            _ => None,
        }
    }

    /// Absolute depth of the end of the single-child chain starting at
    /// `id`: the first branch point or computation stops the chain.
    pub fn loop_levels_chain_depth(&self, id: NodeId) -> usize {
        let mut depth = self.nodes[id].depth + 1;
        let mut current = id;
        while self.nodes[current].children.len() == 1
            && self.nodes[current].computations.is_empty()
        {
            current = self.nodes[current].children[0];
            depth += 1;
        }
        depth
    }

    /// All computations in the subtree, left to right, a node's own
    /// computations before its children's.
    pub fn collect_computations(&self, id: NodeId) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_rec(id, &mut out);
        out
    }

    fn collect_rec(&self, id: NodeId, out: &mut Vec<String>) {
        let node = &self.nodes[id];
        out.extend(node.computations.iter().cloned());
        for &child in &node.children {
            self.collect_rec(child, out);
        }
    }

    pub fn leftmost_computation(&self, id: NodeId) -> Option<String> {
        self.collect_computations(id).into_iter().next()
    }

    pub fn rightmost_computation(&self, id: NodeId) -> Option<String> {
        self.collect_computations(id).into_iter().last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;

    fn two_level_library() -> Library {
        let mut lib = Library::new("lib");
        let f = lib.add_function("f").unwrap();
        f.add_computation(
            Expr::uint8(1),
            "{ S0[i, j] : 0 <= i < 100 and 0 <= j < 100 }",
        )
        .unwrap();
        lib
    }

    #[test]
    fn perfect_nest_builds_a_chain() {
        let lib = two_level_library();
        let tree = SyntaxTree::from_function(lib.function("f").unwrap(), &lib).unwrap();
        assert_eq!(tree.roots.len(), 1);
        let root = tree.node(tree.roots[0]);
        assert_eq!(root.name, "i");
        assert_eq!(root.low_bound, Bound::Fixed(0));
        assert_eq!(root.up_bound, Bound::Fixed(99));
        assert_eq!(root.children.len(), 1);
        assert_eq!(tree.extent(tree.roots[0]), Some(100));
        assert_eq!(tree.loop_levels_chain_depth(tree.roots[0]), 2);
        let inner = tree.node(root.children[0]);
        assert_eq!(inner.computations, vec!["S0".to_owned()]);
    }

    #[test]
    fn shared_prefixes_are_merged() {
        let mut lib = Library::new("lib");
        let f = lib.add_function("f").unwrap();
        f.add_computation(Expr::uint8(1), "{ A[i, j] : 0 <= i < 10 and 0 <= j < 10 }")
            .unwrap();
        f.add_computation(Expr::uint8(2), "{ B[i, k] : 0 <= i < 10 and 0 <= k < 5 }")
            .unwrap();
        let tree = SyntaxTree::from_function(lib.function("f").unwrap(), &lib).unwrap();
        // The `i` levels merge, the inner levels do not.
        assert_eq!(tree.roots.len(), 1);
        let root = tree.node(tree.roots[0]);
        assert_eq!(root.children.len(), 2);
        assert_eq!(tree.leftmost_computation(tree.roots[0]), Some("A".to_owned()));
        assert_eq!(
            tree.rightmost_computation(tree.roots[0]),
            Some("B".to_owned())
        );
    }

    #[test]
    fn copy_and_return_node_shares_nothing() {
        let lib = two_level_library();
        let tree = SyntaxTree::from_function(lib.function("f").unwrap(), &lib).unwrap();
        let root = tree.roots[0];
        let (mut twin, node) = tree.copy_and_return_node(root);
        assert_eq!(twin, tree);
        twin.node_mut(node).unrolled = true;
        assert!(!tree.node(root).unrolled);
    }

    #[test]
    fn identical_nests_stay_separate_branches() {
        let mut lib = Library::new("lib");
        let f = lib.add_function("f").unwrap();
        f.add_computation(Expr::uint8(1), "{ A[i, j] : 0 <= i < 10 and 0 <= j < 10 }")
            .unwrap();
        f.add_computation(Expr::uint8(2), "{ B[i, j] : 0 <= i < 10 and 0 <= j < 10 }")
            .unwrap();
        let tree = SyntaxTree::from_function(lib.function("f").unwrap(), &lib).unwrap();
        // Unordered duplicates are fusion material, not one band.
        assert_eq!(tree.roots.len(), 2);
        let a = tree.node(tree.roots[0]);
        let b = tree.node(tree.roots[1]);
        assert_eq!(a.name, b.name);
        assert_eq!(a.up_bound, b.up_bound);
    }

    #[test]
    fn tags_show_up_as_flags() {
        let mut lib = two_level_library();
        lib.add_parallel_dimension("S0", 0).unwrap();
        let tree = SyntaxTree::from_function(lib.function("f").unwrap(), &lib).unwrap();
        assert!(tree.node(tree.roots[0]).parallelized);
    }
}
