// src/plan/validate.rs

//! Structural validation of a [`Plan`].
//!
//! Validation runs before anything is scheduled and resolves the *effective*
//! dependency edges of every task: the declared `dependencies` plus one edge
//! to each producer of an artifact listed in `reads`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::dag::TaskStatus;
use crate::errors::ValidationError;
use crate::plan::model::Plan;

static TASK_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("task id pattern is valid"));

/// Effective dependency edges, indexed by declaration position.
///
/// `deps[i]` lists the positions task `i` waits for, deduplicated, in the
/// order they were first mentioned.
pub type ResolvedEdges = Vec<Vec<usize>>;

/// Validate `plan` and return its effective dependency edges.
pub fn validate_plan(plan: &Plan) -> Result<ResolvedEdges, ValidationError> {
    let index = index_task_ids(plan)?;
    validate_initial_statuses(plan)?;
    let edges = resolve_edges(plan, &index)?;
    detect_cycle(plan, &edges)?;

    debug!(
        tasks = plan.tasks.len(),
        edges = edges.iter().map(Vec::len).sum::<usize>(),
        "plan validated"
    );
    Ok(edges)
}

fn index_task_ids(plan: &Plan) -> Result<HashMap<&str, usize>, ValidationError> {
    let mut index = HashMap::with_capacity(plan.tasks.len());
    for (pos, task) in plan.tasks.iter().enumerate() {
        // Ids name workspace directories, so `.` and `..` are out.
        if !TASK_ID_RE.is_match(&task.id) || task.id.chars().all(|c| c == '.') {
            return Err(ValidationError::InvalidId(task.id.clone()));
        }
        if index.insert(task.id.as_str(), pos).is_some() {
            return Err(ValidationError::DuplicateId(task.id.clone()));
        }
    }
    Ok(index)
}

fn validate_initial_statuses(plan: &Plan) -> Result<(), ValidationError> {
    for task in &plan.tasks {
        if !matches!(task.status, TaskStatus::Pending | TaskStatus::Completed) {
            return Err(ValidationError::InvalidInitialStatus {
                task: task.id.clone(),
                status: task.status,
            });
        }
    }
    Ok(())
}

fn resolve_edges(
    plan: &Plan,
    index: &HashMap<&str, usize>,
) -> Result<ResolvedEdges, ValidationError> {
    let mut producers: HashMap<&str, Vec<usize>> = HashMap::new();
    for (pos, task) in plan.tasks.iter().enumerate() {
        for name in &task.produces {
            producers.entry(name.as_str()).or_default().push(pos);
        }
    }

    let mut edges = Vec::with_capacity(plan.tasks.len());
    for (pos, task) in plan.tasks.iter().enumerate() {
        let mut deps: Vec<usize> = Vec::new();

        for dep in &task.dependencies {
            let &dep_pos =
                index
                    .get(dep.as_str())
                    .ok_or_else(|| ValidationError::DanglingDependency {
                        task: task.id.clone(),
                        dependency: dep.clone(),
                    })?;
            if !deps.contains(&dep_pos) {
                deps.push(dep_pos);
            }
        }

        for artifact in &task.reads {
            let sources =
                producers
                    .get(artifact.as_str())
                    .ok_or_else(|| ValidationError::UnknownArtifact {
                        task: task.id.clone(),
                        artifact: artifact.clone(),
                    })?;
            // A task re-reading its own output does not wait on itself.
            for &src in sources.iter().filter(|&&src| src != pos) {
                if !deps.contains(&src) {
                    deps.push(src);
                }
            }
        }

        edges.push(deps);
    }

    Ok(edges)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Depth-first search with recursion-stack marking. Any edge back into a
/// node that is still on the stack closes a cycle; the reported path starts
/// and ends at that node.
///
/// The walk keeps its own stack of `(node, next edge)` frames so that long
/// dependency chains cannot exhaust the thread stack.
fn detect_cycle(plan: &Plan, edges: &ResolvedEdges) -> Result<(), ValidationError> {
    let mut marks = vec![Mark::Unvisited; plan.tasks.len()];

    for start in 0..plan.tasks.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        if let Some(cycle) = visit(start, edges, &mut marks) {
            return Err(ValidationError::Cycle(
                cycle.into_iter().map(|i| plan.tasks[i].id.clone()).collect(),
            ));
        }
    }
    Ok(())
}

fn visit(start: usize, edges: &ResolvedEdges, marks: &mut [Mark]) -> Option<Vec<usize>> {
    // The nodes of `stack` are exactly the current DFS path.
    let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
    marks[start] = Mark::OnStack;

    while let Some(frame) = stack.last_mut() {
        let (node, edge) = *frame;
        let Some(&next) = edges[node].get(edge) else {
            marks[node] = Mark::Done;
            stack.pop();
            continue;
        };
        frame.1 += 1;

        match marks[next] {
            Mark::OnStack => {
                let from = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                let mut cycle: Vec<usize> = stack[from..].iter().map(|&(n, _)| n).collect();
                cycle.push(next);
                return Some(cycle);
            }
            Mark::Unvisited => {
                marks[next] = Mark::OnStack;
                stack.push((next, 0));
            }
            Mark::Done => {}
        }
    }
    None
}
