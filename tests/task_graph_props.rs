// tests/task_graph_props.rs

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;
use sitepipe::dag::TaskGraph;
use sitepipe::errors::SitepipeError;

// Acyclic by construction: task i may only depend on tasks 0..i.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        if i == 0 {
                            return Vec::new();
                        }
                        let set: BTreeSet<usize> = deps.into_iter().map(|d| d % i).collect();
                        set.into_iter().collect()
                    })
                    .collect()
            },
        )
    })
}

fn name(i: usize) -> String {
    format!("task_{i}")
}

fn build_graph(deps: &[Vec<usize>]) -> TaskGraph<()> {
    let mut g = TaskGraph::new();
    for (i, ds) in deps.iter().enumerate() {
        g.register(name(i), ds.iter().map(|d| name(*d)), ()).unwrap();
    }
    g
}

proptest! {
    #[test]
    fn plan_respects_dependencies_and_runs_each_task_once(
        deps in dag_strategy(12),
        target_seed in any::<usize>(),
    ) {
        let g = build_graph(&deps);
        let target = name(target_seed % deps.len());
        let plan = g.plan(&target).unwrap();

        let position: HashMap<&str, usize> =
            plan.iter().enumerate().map(|(i, t)| (t.as_str(), i)).collect();

        prop_assert_eq!(position.len(), plan.len(), "duplicate task in plan");
        prop_assert_eq!(plan.last(), Some(&target));

        for task in &plan {
            for dep in g.dependencies_of(task) {
                let dep_pos = position.get(dep.as_str());
                prop_assert!(dep_pos.is_some(), "dependency {} missing from plan", dep);
                prop_assert!(dep_pos < position.get(task.as_str()));
            }
        }
    }

    #[test]
    fn adding_a_back_edge_is_always_rejected(
        deps in dag_strategy(8).prop_filter("needs an edge", |d| d.iter().any(|ds| !ds.is_empty())),
    ) {
        // Pick the first edge dep -> task and add task -> dep.
        let (task, dep) = deps
            .iter()
            .enumerate()
            .find_map(|(i, ds)| ds.first().map(|d| (i, *d)))
            .unwrap();

        let mut cyclic = deps.clone();
        cyclic[dep].push(task);
        let g = build_graph(&cyclic);

        prop_assert!(matches!(g.validate(), Err(SitepipeError::DagCycle(_))));
    }
}
