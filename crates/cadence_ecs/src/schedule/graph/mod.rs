//! The weighted precedence graph systems are ordered by
//!
//! Nodes are systems; a positive edge `a -> b` means "a runs before b", a
//! negative edge is a *denial*: it records that `a` must **not** be ordered
//! before `b`, and exists to override weaker inherited constraints. Once
//! every constraint has been inserted the graph is [sealed](PrecedenceGraph::seal):
//! cycles are rejected, denials are dropped, redundant transitive edges are
//! removed, and the graph becomes immutable

mod cycles;

use alloc::{
    boxed::Box,
    format,
    string::String,
    vec,
    vec::Vec,
};
use core::fmt;
use fixedbitset::FixedBitSet;

/// Separator used when rendering a cycle as its member names
const CYCLE_SEPARATOR: &str = "\u{2014}";

/// The positive-edge subgraph contains at least one directed cycle, so no
/// execution order exists. Every elementary cycle is reported, shortest
/// first
#[derive(Debug)]
pub struct CycleError {
    /// Each cycle rendered as its node names joined by a separator
    pub cycles: Vec<String>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "systems cannot be ordered:")?;
        for cycle in &self.cycles {
            write!(f, "\n  precedence cycle: {cycle}")?;
        }
        Ok(())
    }
}

impl core::error::Error for CycleError {}

/// Converts a 2D row-major pair of indices into a 1D array index
#[inline]
pub(crate) fn index(row: usize, col: usize, num_cols: usize) -> usize {
    debug_assert!(col < num_cols);
    (row * num_cols) + col
}

/// A directed graph over system nodes with signed integer edge weights,
/// stored as a dense n x n matrix. Zero means no edge
pub struct PrecedenceGraph {
    names: Vec<Box<str>>,
    weights: Vec<i32>,
    sealed: bool,
}

impl PrecedenceGraph {
    /// Creates a graph with one node per name. Node ids are the positions in
    /// `names`
    pub fn new(names: Vec<Box<str>>) -> Self {
        let n = names.len();
        Self {
            names,
            weights: vec![0; n * n],
            sealed: false,
        }
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn name(&self, node: usize) -> &str {
        &self.names[node]
    }

    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// The signed weight of the edge `from -> to`; zero if absent
    #[inline]
    pub fn weight(&self, from: usize, to: usize) -> i32 {
        self.weights[index(from, to, self.node_count())]
    }

    /// Inserts the precedence constraint "`before` runs before `after`" with
    /// the given strength
    pub fn add(&mut self, before: usize, after: usize, weight: i32) {
        debug_assert!(weight > 0);
        self.insert(before, after, weight);
    }

    /// Inserts the denial "`before` must not be ordered before `after`",
    /// suppressing positive constraints of the same or lower strength
    pub fn deny(&mut self, before: usize, after: usize, weight: i32) {
        debug_assert!(weight > 0);
        self.insert(before, after, -weight);
    }

    /// Shared insertion rule: a constraint weaker than what is already known
    /// about the pair (in either direction) is ignored; otherwise it lands,
    /// and if it is strictly stronger than the opposing edge it also clears
    /// that edge. Equal-strength edges in both directions may coexist; the
    /// cycle check at seal time surfaces them
    fn insert(&mut self, a: usize, b: usize, weight: i32) {
        debug_assert!(!self.sealed, "edges inserted after seal");
        if a == b {
            return;
        }
        let n = self.node_count();
        let forward = self.weights[index(a, b, n)];
        let reverse = self.weights[index(b, a, n)];
        if weight.abs() < forward.abs().max(reverse.abs()) {
            return;
        }
        self.weights[index(a, b, n)] = weight;
        if weight.abs() > reverse.abs() {
            self.weights[index(b, a, n)] = 0;
        }
    }

    /// Adjacency lists of the positive-edge subgraph
    fn positive_adjacency(&self) -> Vec<Vec<usize>> {
        let n = self.node_count();
        let mut adjacency = vec![Vec::new(); n];
        for from in 0..n {
            for to in 0..n {
                if self.weights[index(from, to, n)] > 0 {
                    adjacency[from].push(to);
                }
            }
        }
        adjacency
    }

    /// Seals the graph: rejects cycles among positive edges, then discards
    /// denial edges and performs a transitive reduction. After sealing the
    /// graph is immutable and [`PrecedenceGraph::topological_order`] may be
    /// taken
    pub fn seal(&mut self) -> Result<(), CycleError> {
        debug_assert!(!self.sealed, "graph sealed twice");
        let n = self.node_count();

        let mut cycles = cycles::elementary_cycles(&self.positive_adjacency());
        if !cycles.is_empty() {
            cycles.sort_by_key(|cycle| cycle.len());
            let cycles = cycles
                .iter()
                .map(|cycle| {
                    let names: Vec<&str> =
                        cycle.iter().map(|&node| self.name(node)).collect();
                    names.join(CYCLE_SEPARATOR)
                })
                .collect();
            return Err(CycleError { cycles });
        }

        // Denials have done their work during insertion
        for weight in &mut self.weights {
            if *weight < 0 {
                *weight = 0;
            }
        }

        // Reachability over the remaining positive edges
        let mut paths = FixedBitSet::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                if self.weights[index(i, j, n)] > 0 {
                    paths.insert(index(i, j, n));
                }
            }
        }
        for k in 0..n {
            for i in 0..n {
                if !paths.contains(index(i, k, n)) {
                    continue;
                }
                for j in 0..n {
                    if paths.contains(index(k, j, n)) {
                        paths.insert(index(i, j, n));
                    }
                }
            }
        }

        // Transitive reduction: an edge subsumed by a longer path goes away
        for i in 0..n {
            for j in 0..n {
                if self.weights[index(i, j, n)] <= 0 {
                    continue;
                }
                let redundant = (0..n).any(|k| {
                    k != i
                        && k != j
                        && paths.contains(index(i, k, n))
                        && paths.contains(index(k, j, n))
                });
                if redundant {
                    self.weights[index(i, j, n)] = 0;
                }
            }
        }

        self.sealed = true;
        Ok(())
    }

    /// Kahn's algorithm over the reduced positive-edge graph. Ties break by
    /// ascending node id, so the order is deterministic
    ///
    /// # Panics
    ///
    /// Panics if no progress can be made; after a successful seal that
    /// indicates a bug in the graph itself
    pub fn topological_order(&self) -> Vec<usize> {
        debug_assert!(self.sealed, "topological order taken before seal");
        let n = self.node_count();
        let mut in_degree = vec![0usize; n];
        for from in 0..n {
            for to in 0..n {
                if self.weights[index(from, to, n)] > 0 {
                    in_degree[to] += 1;
                }
            }
        }

        let mut order = Vec::with_capacity(n);
        let mut emitted = FixedBitSet::with_capacity(n);
        while order.len() < n {
            let mut progressed = false;
            for node in 0..n {
                if emitted.contains(node) || in_degree[node] != 0 {
                    continue;
                }
                emitted.insert(node);
                order.push(node);
                progressed = true;
                for to in 0..n {
                    if self.weights[index(node, to, n)] > 0 {
                        in_degree[to] -= 1;
                    }
                }
            }
            assert!(
                progressed,
                "no topological progress over a sealed graph; this is a bug"
            );
        }
        order
    }

    /// Builds a new graph over `vertices`, keeping every edge (denials
    /// included) whose endpoints both survive. A sealed parent yields a
    /// sealed subgraph
    pub fn induce_subgraph(&self, vertices: &[usize]) -> PrecedenceGraph {
        let n = self.node_count();
        let names = vertices
            .iter()
            .map(|&vertex| self.names[vertex].clone())
            .collect();
        let mut induced = PrecedenceGraph::new(names);
        let m = vertices.len();
        for (i, &from) in vertices.iter().enumerate() {
            for (j, &to) in vertices.iter().enumerate() {
                induced.weights[index(i, j, m)] = self.weights[index(from, to, n)];
            }
        }
        induced.sealed = self.sealed;
        induced
    }
}

impl fmt::Debug for PrecedenceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.node_count();
        let mut map = f.debug_map();
        for from in 0..n {
            for to in 0..n {
                let weight = self.weights[index(from, to, n)];
                if weight != 0 {
                    map.entry(
                        &format!("{} -> {}", self.name(from), self.name(to)),
                        &weight,
                    );
                }
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn graph(names: &[&str]) -> PrecedenceGraph {
        PrecedenceGraph::new(names.iter().map(|name| Box::from(*name)).collect())
    }

    #[test]
    fn self_edges_are_ignored() {
        let mut g = graph(&["a", "b"]);
        g.add(0, 0, 5);
        assert_eq!(g.weight(0, 0), 0);
    }

    #[test]
    fn weaker_constraints_are_ignored() {
        let mut g = graph(&["a", "b"]);
        g.add(0, 1, 5);
        g.add(0, 1, 3);
        assert_eq!(g.weight(0, 1), 5);
    }

    #[test]
    fn stronger_direction_wins() {
        // Weight dominance: after add(a,b,5); add(b,a,10) only b->a survives
        let mut g = graph(&["a", "b"]);
        g.add(0, 1, 5);
        g.add(1, 0, 10);
        assert_eq!(g.weight(0, 1), 0);
        assert_eq!(g.weight(1, 0), 10);
    }

    #[test]
    fn denial_suppresses_weaker_adds() {
        // Denial idempotence: deny then a weaker add leaves no edge a -> b
        let mut g = graph(&["a", "b"]);
        g.deny(0, 1, 2);
        g.add(0, 1, 1);
        assert_eq!(g.weight(0, 1), -2);
        g.seal().unwrap();
        assert_eq!(g.weight(0, 1), 0);
        assert_eq!(g.weight(1, 0), 0);
    }

    #[test]
    fn denial_overrides_an_equal_weight_edge() {
        let mut g = graph(&["a", "b"]);
        g.add(0, 1, 1);
        g.deny(0, 1, 2);
        assert_eq!(g.weight(0, 1), -2);
        g.seal().unwrap();
        assert_eq!(g.weight(0, 1), 0);
        // Order is unconstrained between the two
        assert_eq!(g.topological_order(), [0, 1]);
    }

    #[test]
    fn equal_magnitude_opposing_edges_surface_as_a_cycle() {
        let mut g = graph(&["a", "b"]);
        g.add(0, 1, 3);
        g.add(1, 0, 3);
        let error = g.seal().unwrap_err();
        assert_eq!(error.cycles, ["a\u{2014}b"]);
    }

    #[test]
    fn cycle_error_names_the_members_in_order() {
        let mut g = graph(&["a", "b", "c"]);
        g.add(0, 1, 4);
        g.add(1, 2, 4);
        g.add(2, 0, 4);
        let error = g.seal().unwrap_err();
        assert_eq!(error.cycles, ["a\u{2014}b\u{2014}c"]);
        assert!(error.to_string().contains("precedence cycle: a\u{2014}b\u{2014}c"));
    }

    #[test]
    fn shortest_cycles_are_reported_first() {
        let mut g = graph(&["a", "b", "c", "d", "e"]);
        // Long cycle a -> b -> c -> a, short cycle d -> e -> d
        g.add(0, 1, 4);
        g.add(1, 2, 4);
        g.add(2, 0, 4);
        g.add(3, 4, 4);
        g.add(4, 3, 4);
        let error = g.seal().unwrap_err();
        assert_eq!(error.cycles, ["d\u{2014}e", "a\u{2014}b\u{2014}c"]);
    }

    #[test]
    fn transitive_reduction_drops_the_shortcut() {
        let mut g = graph(&["a", "b", "c"]);
        g.add(0, 1, 4);
        g.add(1, 2, 4);
        g.add(0, 2, 4);
        g.seal().unwrap();
        assert!(g.weight(0, 1) > 0);
        assert!(g.weight(1, 2) > 0);
        assert_eq!(g.weight(0, 2), 0);
        assert_eq!(g.topological_order(), [0, 1, 2]);
    }

    #[test]
    fn reduction_is_minimal() {
        // After sealing, no surviving edge i -> j has an intermediate k with
        // paths i ~> k and k ~> j
        let mut g = graph(&["a", "b", "c", "d"]);
        g.add(0, 1, 4);
        g.add(1, 2, 4);
        g.add(2, 3, 4);
        g.add(0, 2, 4);
        g.add(0, 3, 4);
        g.add(1, 3, 4);
        g.seal().unwrap();
        let n = g.node_count();
        for i in 0..n {
            for j in 0..n {
                if g.weight(i, j) <= 0 {
                    continue;
                }
                for k in 0..n {
                    if k == i || k == j {
                        continue;
                    }
                    assert!(
                        !(g.weight(i, k) > 0 && g.weight(k, j) > 0),
                        "edge {i} -> {j} is subsumed via {k}"
                    );
                }
            }
        }
        assert_eq!(g.topological_order(), [0, 1, 2, 3]);
    }

    #[test]
    fn topological_order_respects_every_surviving_edge() {
        let mut g = graph(&["a", "b", "c", "d", "e"]);
        g.add(3, 1, 4);
        g.add(1, 0, 4);
        g.add(4, 2, 4);
        g.add(0, 2, 4);
        g.seal().unwrap();
        let order = g.topological_order();
        let position = |node: usize| order.iter().position(|&o| o == node).unwrap();
        for from in 0..g.node_count() {
            for to in 0..g.node_count() {
                if g.weight(from, to) > 0 {
                    assert!(position(from) < position(to));
                }
            }
        }
    }

    #[test]
    fn unordered_nodes_come_out_in_id_order() {
        let mut g = graph(&["a", "b", "c"]);
        g.seal().unwrap();
        assert_eq!(g.topological_order(), [0, 1, 2]);
    }

    #[test]
    fn induced_subgraph_keeps_edges_and_signs() {
        let mut g = graph(&["a", "b", "c", "d"]);
        g.add(0, 2, 4);
        g.add(2, 3, 4);
        g.deny(0, 3, 2);
        let induced = g.induce_subgraph(&[0, 2, 3]);
        assert_eq!(induced.node_count(), 3);
        assert_eq!(induced.name(1), "c");
        assert_eq!(induced.weight(0, 1), 4);
        assert_eq!(induced.weight(1, 2), 4);
        assert_eq!(induced.weight(0, 2), -2);
        assert!(!induced.is_sealed());
    }

    #[test]
    fn induced_subgraph_of_a_sealed_graph_is_sealed() {
        let mut g = graph(&["a", "b", "c"]);
        g.add(0, 1, 4);
        g.seal().unwrap();
        let induced = g.induce_subgraph(&[0, 1]);
        assert!(induced.is_sealed());
        assert_eq!(induced.topological_order(), [0, 1]);
    }
}
