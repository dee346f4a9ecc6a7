//! Pure dependency-graph algorithms over task and subtask ids.
//!
//! Every function here operates on a plain slice of tasks and performs no
//! I/O, so the same code runs against a checked-out tag and against
//! in-memory fixtures. The id space covers top-level task ids and dotted
//! subtask ids uniformly; a bare numeric dependency written on a subtask
//! resolves to a sibling subtask when one exists, otherwise to the
//! top-level task of that id.
//!
//! Mutating operations check their rules *before* touching anything: a
//! rejected [`DependencyGraph::add_dependency`] leaves the task list
//! completely unchanged.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::errors::{GraphError, Result};
use crate::ids::TaskRef;
use crate::types::Task;

/// One defect found by [`DependencyGraph::validate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum DependencyIssue {
    /// An id depends on itself.
    SelfReference {
        /// The offending node.
        id: String,
    },
    /// A dependency id resolves to nothing in the id space.
    Missing {
        /// The node carrying the dangling edge.
        id: String,
        /// The dependency as written.
        dependency: String,
    },
    /// The id lies on a dependency cycle. Every participant of a cycle is
    /// reported, not just the node where the traversal entered it.
    Circular {
        /// A cycle participant.
        id: String,
    },
}

/// Outcome of [`DependencyGraph::validate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// True when no issues were found.
    pub valid: bool,
    /// All defects, in document order (cycle participants last, sorted).
    pub issues: Vec<DependencyIssue>,
}

/// Outcome of [`DependencyGraph::fix`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixReport {
    /// Self edges and dangling edges removed.
    pub removed_count: usize,
    /// Duplicate edges removed (first occurrence kept).
    pub duplicates_removed: usize,
}

impl FixReport {
    /// True when the pass changed nothing.
    pub fn is_noop(self) -> bool {
        self.removed_count == 0 && self.duplicates_removed == 0
    }
}

/// Pure dependency-graph operations. No I/O, no state.
pub struct DependencyGraph;

impl DependencyGraph {
    /// Check the full dependency relation for self references, dangling
    /// references, and cycles, across tasks and subtasks alike.
    pub fn validate(tasks: &[Task]) -> ValidationReport {
        let space = id_space(tasks);
        let mut issues = Vec::new();

        for task in tasks {
            check_edges(&task.id, None, &task.dependencies, &space, &mut issues);
            for sub in &task.subtasks {
                let own = TaskRef::dotted(&task.id, sub.id);
                check_edges(&own, Some(&task.id), &sub.dependencies, &space, &mut issues);
            }
        }

        for id in cycle_participants(&adjacency(tasks, &space)) {
            issues.push(DependencyIssue::Circular { id });
        }

        ValidationReport {
            valid: issues.is_empty(),
            issues,
        }
    }

    /// Would adding the edge `from -> to` close a cycle? True exactly when
    /// `to` can already reach `from` through existing edges.
    pub fn would_create_cycle(from: &str, to: &str, tasks: &[Task]) -> bool {
        let space = id_space(tasks);
        let adjacency = adjacency(tasks, &space);
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        queue.push_back(to);
        while let Some(node) = queue.pop_front() {
            if node == from {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(targets) = adjacency.get(node) {
                for target in targets {
                    queue.push_back(target.as_str());
                }
            }
        }
        false
    }

    /// Add the edge `from -> to`.
    ///
    /// Rejects unknown endpoints, self edges, and cycle-closing edges before
    /// any mutation. Adding an edge that already exists is a no-op.
    pub fn add_dependency(from: &str, to: &str, tasks: &mut [Task]) -> Result<()> {
        let space = id_space(tasks);
        if !space.contains(from) {
            return Err(GraphError::UnknownId {
                id: from.to_string(),
            });
        }
        if !space.contains(to) {
            return Err(GraphError::UnknownId { id: to.to_string() });
        }
        if from == to {
            return Err(GraphError::SelfDependency {
                id: from.to_string(),
            });
        }
        if Self::would_create_cycle(from, to, tasks) {
            return Err(GraphError::CircularDependency {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let deps = deps_mut(from, tasks).ok_or_else(|| GraphError::UnknownId {
            id: from.to_string(),
        })?;
        if !deps.iter().any(|d| d == to) {
            deps.push(to.to_string());
        }
        Ok(())
    }

    /// Remove the edge `from -> to`. Removing an absent edge is not an
    /// error; the return value reports whether anything changed.
    pub fn remove_dependency(from: &str, to: &str, tasks: &mut [Task]) -> bool {
        let Some(deps) = deps_mut(from, tasks) else {
            return false;
        };
        let before = deps.len();
        deps.retain(|d| d != to);
        deps.len() != before
    }

    /// The dependency list of `id`, or `None` if the id resolves to nothing.
    pub fn dependencies_of(id: &str, tasks: &[Task]) -> Option<Vec<String>> {
        deps_of(id, tasks).cloned()
    }

    /// All node ids (tasks and dotted subtasks) whose dependency list
    /// resolves to `id`.
    pub fn dependents_of(id: &str, tasks: &[Task]) -> Vec<String> {
        let space = id_space(tasks);
        let mut out = Vec::new();
        for task in tasks {
            if task
                .dependencies
                .iter()
                .any(|d| normalize(d, None, &space) == id)
            {
                out.push(task.id.clone());
            }
            for sub in &task.subtasks {
                if sub
                    .dependencies
                    .iter()
                    .any(|d| normalize(d, Some(&task.id), &space) == id)
                {
                    out.push(TaskRef::dotted(&task.id, sub.id));
                }
            }
        }
        out
    }

    /// One deterministic repair pass: drop self edges, edges to nonexistent
    /// ids, and duplicate edges (keeping the first occurrence), over tasks
    /// and subtasks alike.
    ///
    /// Cycles are deliberately left alone — choosing which edge of a cycle
    /// to drop needs caller intent — so [`DependencyGraph::validate`] can
    /// still report `Circular` issues afterwards.
    pub fn fix(tasks: &mut [Task]) -> FixReport {
        let space = id_space(tasks);
        let mut report = FixReport::default();
        for task in tasks.iter_mut() {
            let own = task.id.clone();
            scrub(&mut task.dependencies, &own, None, &space, &mut report);
            let parent = own;
            for sub in &mut task.subtasks {
                let own = TaskRef::dotted(&parent, sub.id);
                scrub(&mut sub.dependencies, &own, Some(&parent), &space, &mut report);
            }
        }
        report
    }

    /// Resolve a dependency string as written on a node into the full id it
    /// addresses, or `None` if it addresses nothing. `owner_parent` is the
    /// parent task id when the edge is written on a subtask.
    pub fn resolve_dependency(
        dep: &str,
        owner_parent: Option<&str>,
        tasks: &[Task],
    ) -> Option<String> {
        let space = id_space(tasks);
        let norm = normalize(dep, owner_parent, &space);
        space.contains(&norm).then_some(norm)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ─────────────────────────────────────────────────────────────────────────────

/// All addressable ids: top-level task ids plus dotted subtask ids.
fn id_space(tasks: &[Task]) -> BTreeSet<String> {
    let mut space = BTreeSet::new();
    for task in tasks {
        let _ = space.insert(task.id.clone());
        for sub in &task.subtasks {
            let _ = space.insert(TaskRef::dotted(&task.id, sub.id));
        }
    }
    space
}

/// Normalize a dependency as written into the id it addresses. A bare
/// numeric dependency on a subtask prefers a sibling subtask of the same
/// parent; everything else is taken verbatim.
fn normalize(dep: &str, owner_parent: Option<&str>, space: &BTreeSet<String>) -> String {
    if let Some(parent) = owner_parent {
        if !dep.contains('.') && dep.parse::<u64>().is_ok() {
            let sibling = format!("{parent}.{dep}");
            if space.contains(&sibling) {
                return sibling;
            }
        }
    }
    dep.to_string()
}

fn check_edges(
    own: &str,
    parent: Option<&str>,
    deps: &[String],
    space: &BTreeSet<String>,
    issues: &mut Vec<DependencyIssue>,
) {
    for dep in deps {
        let norm = normalize(dep, parent, space);
        if norm == own {
            issues.push(DependencyIssue::SelfReference {
                id: own.to_string(),
            });
        } else if !space.contains(&norm) {
            issues.push(DependencyIssue::Missing {
                id: own.to_string(),
                dependency: dep.clone(),
            });
        }
    }
}

fn scrub(
    deps: &mut Vec<String>,
    own: &str,
    parent: Option<&str>,
    space: &BTreeSet<String>,
    report: &mut FixReport,
) {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    deps.retain(|dep| {
        let norm = normalize(dep, parent, space);
        if norm == own || !space.contains(&norm) {
            report.removed_count += 1;
            return false;
        }
        if !seen.insert(norm) {
            report.duplicates_removed += 1;
            return false;
        }
        true
    });
}

fn deps_of<'a>(id: &str, tasks: &'a [Task]) -> Option<&'a Vec<String>> {
    match TaskRef::parse(id)? {
        TaskRef::Top(i) => tasks.iter().find(|t| t.id == i).map(|t| &t.dependencies),
        TaskRef::Sub(p, s) => tasks
            .iter()
            .find(|t| t.id == p)?
            .subtasks
            .iter()
            .find(|st| st.id == s)
            .map(|st| &st.dependencies),
    }
}

fn deps_mut<'a>(id: &str, tasks: &'a mut [Task]) -> Option<&'a mut Vec<String>> {
    match TaskRef::parse(id)? {
        TaskRef::Top(i) => tasks
            .iter_mut()
            .find(|t| t.id == i)
            .map(|t| &mut t.dependencies),
        TaskRef::Sub(p, s) => tasks
            .iter_mut()
            .find(|t| t.id == p)?
            .subtasks
            .iter_mut()
            .find(|st| st.id == s)
            .map(|st| &mut st.dependencies),
    }
}

/// Edges over the id space: normalized, resolvable targets only, self loops
/// excluded (those surface as `SelfReference`, not `Circular`).
fn adjacency(tasks: &[Task], space: &BTreeSet<String>) -> BTreeMap<String, Vec<String>> {
    let mut adjacency: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for task in tasks {
        let targets = edge_targets(&task.id, None, &task.dependencies, space);
        let _ = adjacency.insert(task.id.clone(), targets);
        for sub in &task.subtasks {
            let node = TaskRef::dotted(&task.id, sub.id);
            let targets = edge_targets(&node, Some(&task.id), &sub.dependencies, space);
            let _ = adjacency.insert(node, targets);
        }
    }
    adjacency
}

fn edge_targets(
    node: &str,
    parent: Option<&str>,
    deps: &[String],
    space: &BTreeSet<String>,
) -> Vec<String> {
    deps.iter()
        .map(|d| normalize(d, parent, space))
        .filter(|t| t.as_str() != node && space.contains(t))
        .collect()
}

/// Every node lying on a dependency cycle: members of strongly-connected
/// components of size > 1 (iterative Tarjan, so deep chains cannot overflow
/// the stack). Sorted for deterministic reporting.
fn cycle_participants(adjacency: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    let nodes: Vec<&String> = adjacency.keys().collect();
    let index_of: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let edges: Vec<Vec<usize>> = nodes
        .iter()
        .map(|n| {
            adjacency[*n]
                .iter()
                .filter_map(|t| index_of.get(t.as_str()).copied())
                .collect()
        })
        .collect();

    let n = nodes.len();
    let mut index = vec![usize::MAX; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut participants: Vec<usize> = Vec::new();

    for start in 0..n {
        if index[start] != usize::MAX {
            continue;
        }
        index[start] = next_index;
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;
        let mut frames: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some(top) = frames.last_mut() {
            let (node, cursor) = *top;
            if let Some(&next) = edges[node].get(cursor) {
                top.1 += 1;
                if index[next] == usize::MAX {
                    index[next] = next_index;
                    lowlink[next] = next_index;
                    next_index += 1;
                    stack.push(next);
                    on_stack[next] = true;
                    frames.push((next, 0));
                } else if on_stack[next] {
                    lowlink[node] = lowlink[node].min(index[next]);
                }
            } else {
                let _ = frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[node]);
                }
                if lowlink[node] == index[node] {
                    let mut component = Vec::new();
                    while let Some(member) = stack.pop() {
                        on_stack[member] = false;
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    if component.len() > 1 {
                        participants.extend(component);
                    }
                }
            }
        }
    }

    let mut out: Vec<String> = participants.into_iter().map(|i| nodes[i].clone()).collect();
    out.sort();
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
