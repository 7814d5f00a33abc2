//! Elementary-cycle enumeration over the positive-edge subgraph
//!
//! Johnson's algorithm, driven by a path-based strongly-connected-component
//! pass. Both the SCC search and the circuit routine are formulated with
//! explicit stacks instead of recursion, so deep graphs cannot overflow the
//! call stack

use alloc::{vec, vec::Vec};
use fixedbitset::FixedBitSet;
use smallvec::SmallVec;

/// Enumerates every elementary cycle of the graph given as adjacency lists.
/// Each cycle is reported as its vertex sequence, starting from the cycle's
/// least vertex; vertices are not repeated
pub(crate) fn elementary_cycles(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let mut cycles = Vec::new();
    let mut start = 0;
    while start < n {
        // Least-vertex nontrivial SCC of the subgraph on vertices >= start.
        // Self-loops cannot occur, so single-vertex components are trivial
        let components = path_based_sccs(adjacency, start);
        let Some(least) = components
            .iter()
            .filter(|component| component.len() > 1)
            .map(|component| *component.iter().min().unwrap())
            .min()
        else {
            break;
        };
        let component = components
            .iter()
            .find(|component| component.contains(&least))
            .unwrap();
        let mut in_component = FixedBitSet::with_capacity(n);
        for &vertex in component {
            in_component.insert(vertex);
        }
        circuits_through(least, adjacency, &in_component, &mut cycles);
        start = least + 1;
    }
    cycles
}

/// Johnson's `circuit` routine: records every elementary cycle through
/// `start` that stays inside `in_component`
fn circuits_through(
    start: usize,
    adjacency: &[Vec<usize>],
    in_component: &FixedBitSet,
    cycles: &mut Vec<Vec<usize>>,
) {
    struct Frame {
        vertex: usize,
        next: usize,
        found: bool,
    }

    let n = adjacency.len();
    let mut blocked = FixedBitSet::with_capacity(n);
    let mut blocked_by: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); n];
    let mut path: Vec<usize> = Vec::new();
    let mut frames = vec![Frame {
        vertex: start,
        next: 0,
        found: false,
    }];

    while !frames.is_empty() {
        let top = frames.len() - 1;
        let vertex = frames[top].vertex;
        if frames[top].next == 0 {
            blocked.insert(vertex);
            path.push(vertex);
        }

        let neighbors = &adjacency[vertex];
        let mut cursor = frames[top].next;
        let mut descended = false;
        while cursor < neighbors.len() {
            let next = neighbors[cursor];
            cursor += 1;
            if !in_component.contains(next) {
                continue;
            }
            if next == start {
                cycles.push(path.clone());
                frames[top].found = true;
            } else if !blocked.contains(next) {
                frames[top].next = cursor;
                frames.push(Frame {
                    vertex: next,
                    next: 0,
                    found: false,
                });
                descended = true;
                break;
            }
        }
        if descended {
            continue;
        }

        // All neighbors handled: retire this vertex
        let found = frames[top].found;
        if found {
            unblock(vertex, &mut blocked, &mut blocked_by);
        } else {
            for &next in neighbors {
                if in_component.contains(next) && !blocked_by[next].contains(&vertex) {
                    blocked_by[next].push(vertex);
                }
            }
        }
        path.pop();
        frames.pop();
        if found && let Some(parent) = frames.last_mut() {
            parent.found = true;
        }
    }
}

/// Worklist form of Johnson's recursive unblock
fn unblock(vertex: usize, blocked: &mut FixedBitSet, blocked_by: &mut [SmallVec<[usize; 4]>]) {
    let mut work = vec![vertex];
    while let Some(current) = work.pop() {
        blocked.set(current, false);
        for dependent in blocked_by[current].drain(..) {
            if blocked.contains(dependent) {
                work.push(dependent);
            }
        }
    }
}

/// Path-based strongly-connected-component search (Gabow's two-stack
/// variant) restricted to vertices `>= lo`. Components come out in reverse
/// topological order
pub(crate) fn path_based_sccs(adjacency: &[Vec<usize>], lo: usize) -> Vec<SmallVec<[usize; 4]>> {
    const UNVISITED: usize = usize::MAX;

    struct Frame {
        vertex: usize,
        next: usize,
    }

    let n = adjacency.len();
    let mut preorder = vec![UNVISITED; n];
    let mut assigned = FixedBitSet::with_capacity(n);
    let mut counter = 0usize;
    let mut vertex_stack: Vec<usize> = Vec::new();
    let mut boundary_stack: Vec<usize> = Vec::new();
    let mut components = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();

    for root in lo..n {
        if preorder[root] != UNVISITED {
            continue;
        }
        frames.push(Frame {
            vertex: root,
            next: 0,
        });
        while !frames.is_empty() {
            let top = frames.len() - 1;
            let vertex = frames[top].vertex;
            if frames[top].next == 0 {
                preorder[vertex] = counter;
                counter += 1;
                vertex_stack.push(vertex);
                boundary_stack.push(vertex);
            }

            let neighbors = &adjacency[vertex];
            let mut cursor = frames[top].next;
            let mut descended = false;
            while cursor < neighbors.len() {
                let next = neighbors[cursor];
                cursor += 1;
                if next < lo {
                    continue;
                }
                if preorder[next] == UNVISITED {
                    frames[top].next = cursor;
                    frames.push(Frame {
                        vertex: next,
                        next: 0,
                    });
                    descended = true;
                    break;
                }
                if !assigned.contains(next) {
                    // Contract the path: pop boundaries younger than `next`
                    while preorder[*boundary_stack.last().unwrap()] > preorder[next] {
                        boundary_stack.pop();
                    }
                }
            }
            if descended {
                continue;
            }
            frames[top].next = cursor;

            if boundary_stack.last() == Some(&vertex) {
                boundary_stack.pop();
                let mut component = SmallVec::new();
                loop {
                    let member = vertex_stack.pop().unwrap();
                    assigned.insert(member);
                    component.push(member);
                    if member == vertex {
                        break;
                    }
                }
                components.push(component);
            }
            frames.pop();
        }
    }
    components
}
