// src/dag/graph.rs

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, info};

use crate::engine::TaskName;
use crate::errors::{Result, SitepipeError};

/// Internal node structure: immediate deps plus the task's action.
#[derive(Debug, Clone)]
struct TaskNode<A> {
    /// Direct dependencies, in declared order.
    deps: Vec<TaskName>,
    action: A,
}

/// Executes the action of a single planned task.
///
/// `TaskGraph::run` calls this once per task of the plan, in plan order. The
/// production implementation lives in `lib.rs`; tests provide recorders.
pub trait TaskRunner<A>: Send {
    fn run_task<'a>(
        &'a mut self,
        name: &'a str,
        action: &'a A,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Checked before each task; `true` ends the run early (without error)
    /// once the current task has finished.
    fn should_stop(&self) -> bool {
        false
    }
}

/// Named tasks with explicit dependency lists.
///
/// Registration order is remembered and used to break ties when planning, so
/// a plan is fully deterministic for a given registration sequence.
#[derive(Debug, Clone)]
pub struct TaskGraph<A> {
    order: Vec<TaskName>,
    nodes: HashMap<TaskName, TaskNode<A>>,
}

impl<A> Default for TaskGraph<A> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            nodes: HashMap::new(),
        }
    }
}

impl<A> TaskGraph<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Dependencies may name tasks registered later; they are
    /// only checked by [`TaskGraph::validate`].
    pub fn register<N, D>(&mut self, name: N, deps: D, action: A) -> Result<()>
    where
        N: Into<TaskName>,
        D: IntoIterator,
        D::Item: Into<TaskName>,
    {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(SitepipeError::ConfigError(format!(
                "task '{name}' is registered more than once"
            )));
        }

        let deps: Vec<TaskName> = deps.into_iter().map(Into::into).collect();
        debug!(task = %name, ?deps, "registered task");

        self.order.push(name.clone());
        self.nodes.insert(name, TaskNode { deps, action });
        Ok(())
    }

    /// Task names in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn action(&self, name: &str) -> Option<&A> {
        self.nodes.get(name).map(|n| &n.action)
    }

    /// Check the whole graph: every dependency registered, no task depending
    /// on itself, no cycles.
    pub fn validate(&self) -> Result<()> {
        for name in &self.order {
            for dep in self.dependencies_of(name) {
                if dep == name {
                    return Err(SitepipeError::ConfigError(format!(
                        "task '{name}' cannot depend on itself in `after`"
                    )));
                }
                if !self.nodes.contains_key(dep) {
                    return Err(SitepipeError::UnknownDependency {
                        task: name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        // Edge direction: dep -> task.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in &self.order {
            graph.add_node(name.as_str());
        }
        for name in &self.order {
            for dep in self.dependencies_of(name) {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(SitepipeError::DagCycle(format!(
                "cycle detected in task graph involving task '{}'",
                cycle.node_id()
            ))),
        }
    }

    /// Execution plan for `target`: its transitive dependency closure, each
    /// task once, dependencies first, ties in declared order, `target` last.
    pub fn plan(&self, target: &str) -> Result<Vec<TaskName>> {
        if !self.nodes.contains_key(target) {
            return Err(SitepipeError::TaskNotFound(target.to_string()));
        }
        self.validate()?;

        let mut visited: HashSet<&str> = HashSet::new();
        let mut plan = Vec::new();
        self.visit(target, &mut visited, &mut plan);

        debug!(target, ?plan, "resolved execution plan");
        Ok(plan)
    }

    // Post-order DFS; only called on a validated (acyclic) graph.
    fn visit<'g>(&'g self, name: &'g str, visited: &mut HashSet<&'g str>, plan: &mut Vec<TaskName>) {
        if !visited.insert(name) {
            return;
        }
        for dep in self.dependencies_of(name) {
            self.visit(dep, visited, plan);
        }
        plan.push(name.to_string());
    }
}

impl<A: Sync> TaskGraph<A> {
    /// Run `target` and its dependency closure through `runner`.
    ///
    /// The plan is computed (and the graph validated) before any action runs,
    /// so a cyclic or dangling graph has no side effects. The first fatal
    /// error aborts the run, and [`TaskRunner::should_stop`] ends it early.
    /// Returns the tasks that ran, in order.
    pub async fn run<R>(&self, target: &str, runner: &mut R) -> Result<Vec<TaskName>>
    where
        R: TaskRunner<A>,
    {
        let plan = self.plan(target)?;
        info!(target, tasks = plan.len(), "running task graph");

        let mut ran = Vec::with_capacity(plan.len());
        for name in plan {
            if runner.should_stop() {
                info!(done = ran.len(), "stop requested; skipping the rest of the plan");
                break;
            }
            let action = match self.action(&name) {
                Some(a) => a,
                None => return Err(SitepipeError::TaskNotFound(name)),
            };
            debug!(task = %name, "starting planned task");
            runner.run_task(&name, action).await?;
            ran.push(name);
        }

        Ok(ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(spec: &[(&str, &[&str])]) -> TaskGraph<()> {
        let mut g = TaskGraph::new();
        for (name, deps) in spec {
            g.register(*name, deps.iter().copied(), ()).unwrap();
        }
        g
    }

    #[test]
    fn plan_orders_dependencies_first_in_declared_order() {
        let g = graph(&[
            ("html", &[]),
            ("scss", &[]),
            ("js", &["lint"]),
            ("lint", &[]),
            ("build", &["html", "scss", "js"]),
        ]);

        let plan = g.plan("build").unwrap();
        assert_eq!(plan, vec!["html", "scss", "lint", "js", "build"]);
    }

    #[test]
    fn shared_dependency_appears_once() {
        let g = graph(&[
            ("base", &[]),
            ("a", &["base"]),
            ("b", &["base"]),
            ("all", &["a", "b"]),
        ]);

        let plan = g.plan("all").unwrap();
        assert_eq!(plan, vec!["base", "a", "b", "all"]);
    }

    #[test]
    fn plan_excludes_unrelated_tasks() {
        let g = graph(&[("a", &[]), ("b", &[]), ("c", &["a"])]);
        assert_eq!(g.plan("c").unwrap(), vec!["a", "c"]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut g: TaskGraph<()> = TaskGraph::new();
        g.register("a", Vec::<String>::new(), ()).unwrap();
        let err = g.register("a", Vec::<String>::new(), ()).unwrap_err();
        assert!(matches!(err, SitepipeError::ConfigError(_)));
    }

    #[test]
    fn unknown_dependency_is_reported() {
        let g = graph(&[("a", &["missing"])]);
        match g.validate() {
            Err(SitepipeError::UnknownDependency { task, dependency }) => {
                assert_eq!(task, "a");
                assert_eq!(dependency, "missing");
            }
            other => panic!("expected UnknownDependency, got {other:?}"),
        }
    }

    #[test]
    fn cycle_is_reported_by_plan() {
        let g = graph(&[("a", &["c"]), ("b", &["a"]), ("c", &["b"]), ("top", &["a"])]);
        assert!(matches!(g.plan("top"), Err(SitepipeError::DagCycle(_))));
    }

    #[test]
    fn self_dependency_is_a_config_error() {
        let g = graph(&[("a", &["a"])]);
        assert!(matches!(g.validate(), Err(SitepipeError::ConfigError(_))));
    }

    #[test]
    fn unknown_target_is_task_not_found() {
        let g = graph(&[("a", &[])]);
        assert!(matches!(g.plan("nope"), Err(SitepipeError::TaskNotFound(_))));
    }
}
