// tests/task_graph.rs

use std::error::Error;
use std::future::Future;
use std::pin::Pin;

use sitepipe::dag::{TaskGraph, TaskRunner};
use sitepipe::errors::SitepipeError;
use sitepipe_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// Runner that records every task it is asked to run.
#[derive(Default)]
struct RecordingRunner {
    ran: Vec<String>,
    fail_on: Option<&'static str>,
    // Ask to stop once this many tasks have run.
    stop_after: Option<usize>,
}

impl TaskRunner<&'static str> for RecordingRunner {
    fn run_task<'a>(
        &'a mut self,
        name: &'a str,
        action: &'a &'static str,
    ) -> Pin<Box<dyn Future<Output = sitepipe::errors::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail_on == Some(name) {
                return Err(SitepipeError::ConfigError(format!("{name} failed")));
            }
            self.ran.push(format!("{name}:{action}"));
            Ok(())
        })
    }

    fn should_stop(&self) -> bool {
        self.stop_after.is_some_and(|n| self.ran.len() >= n)
    }
}

fn site_graph() -> TaskGraph<&'static str> {
    let mut g = TaskGraph::new();
    g.register("html:build", Vec::<String>::new(), "html").unwrap();
    g.register("scss:build", Vec::<String>::new(), "scss").unwrap();
    g.register("js:build", Vec::<String>::new(), "js").unwrap();
    g.register("img:build", Vec::<String>::new(), "img").unwrap();
    g.register(
        "build",
        ["html:build", "scss:build", "js:build", "img:build"],
        "serve",
    )
    .unwrap();
    g
}

#[tokio::test]
async fn build_runs_every_dependency_once_before_the_target() -> TestResult {
    init_tracing();

    let g = site_graph();
    let mut runner = RecordingRunner::default();
    let plan = with_timeout(g.run("build", &mut runner)).await?;

    assert_eq!(
        plan,
        vec!["html:build", "scss:build", "js:build", "img:build", "build"]
    );
    assert_eq!(
        runner.ran,
        vec![
            "html:build:html",
            "scss:build:scss",
            "js:build:js",
            "img:build:img",
            "build:serve"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn running_a_leaf_runs_only_the_leaf() -> TestResult {
    let g = site_graph();
    let mut runner = RecordingRunner::default();
    g.run("scss:build", &mut runner).await?;
    assert_eq!(runner.ran, vec!["scss:build:scss"]);
    Ok(())
}

#[tokio::test]
async fn cyclic_graph_runs_nothing() -> TestResult {
    let mut g = TaskGraph::new();
    g.register("a", ["c"], "a")?;
    g.register("b", ["a"], "b")?;
    g.register("c", ["b"], "c")?;
    g.register("free", Vec::<String>::new(), "free")?;

    let mut runner = RecordingRunner::default();
    let result = g.run("free", &mut runner).await;

    assert!(matches!(result, Err(SitepipeError::DagCycle(_))));
    assert!(runner.ran.is_empty(), "no task may run in a cyclic graph");
    Ok(())
}

#[tokio::test]
async fn unknown_dependency_runs_nothing() -> TestResult {
    let mut g = TaskGraph::new();
    g.register("build", ["html:build"], "serve")?;

    let mut runner = RecordingRunner::default();
    match g.run("build", &mut runner).await {
        Err(SitepipeError::UnknownDependency { task, dependency }) => {
            assert_eq!(task, "build");
            assert_eq!(dependency, "html:build");
        }
        other => panic!("expected UnknownDependency, got {other:?}"),
    }
    assert!(runner.ran.is_empty());
    Ok(())
}

#[tokio::test]
async fn fatal_task_error_aborts_the_rest_of_the_plan() -> TestResult {
    let g = site_graph();
    let mut runner = RecordingRunner {
        fail_on: Some("js:build"),
        ..RecordingRunner::default()
    };

    let result = g.run("build", &mut runner).await;
    assert!(result.is_err());
    assert_eq!(runner.ran, vec!["html:build:html", "scss:build:scss"]);
    Ok(())
}

#[tokio::test]
async fn stop_request_ends_the_plan_between_tasks() -> TestResult {
    let g = site_graph();
    let mut runner = RecordingRunner {
        stop_after: Some(2),
        ..RecordingRunner::default()
    };

    let ran = with_timeout(g.run("build", &mut runner)).await?;
    assert_eq!(ran, vec!["html:build", "scss:build"]);
    assert_eq!(runner.ran, vec!["html:build:html", "scss:build:scss"]);
    Ok(())
}

#[tokio::test]
async fn stop_before_the_first_task_runs_nothing() -> TestResult {
    let g = site_graph();
    let mut runner = RecordingRunner {
        stop_after: Some(0),
        ..RecordingRunner::default()
    };

    let ran = g.run("build", &mut runner).await?;
    assert!(ran.is_empty());
    assert!(runner.ran.is_empty());
    Ok(())
}
