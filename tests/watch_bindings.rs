// tests/watch_bindings.rs

use std::path::PathBuf;
use std::sync::Arc;

use sitepipe::config::{ConfigFile, StageKind};
use sitepipe::fs::mock::MockFileSystem;
use sitepipe::types::BuildMode;
use sitepipe::watch::{build_watch_bindings, tasks_for_path, WatchDispatcher};
use sitepipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use sitepipe_test_utils::init_tracing;

fn site_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_task(
            TaskConfigBuilder::new("html:build")
                .src(&["app/*.html"])
                .stage(StageKind::Include {
                    basepath: Some("app/_sections".into()),
                })
                .build(),
        )
        .with_task(
            TaskConfigBuilder::new("scss:build")
                .src(&["app/scss/**/*.scss"])
                .exclude(&["app/scss/**/_*.scss"])
                .dest("css")
                .build(),
        )
        .with_task(
            TaskConfigBuilder::new("js:build")
                .src(&["app/js/*.js"])
                .dest("js")
                .stage_only(StageKind::MinifyJs, BuildMode::Production)
                .build(),
        )
        .with_task(
            TaskConfigBuilder::new("plugins:build")
                .src(&["app/plugins/**/*.*"])
                .dest("plugins")
                .watch(&[])
                .build(),
        )
        .with_task(
            TaskConfigBuilder::new("build")
                .after(&["html:build", "scss:build", "js:build", "plugins:build"])
                .serve()
                .build(),
        )
        .with_watch(&["app/_sections/**/*.htm"], &["html:build"])
        .with_watch(&["app/scss/**/_*.scss"], &["scss:build"])
        .build()
}

#[test]
fn every_source_pattern_and_extra_binding_is_watched() {
    init_tracing();
    let cfg = site_config();
    let bindings = build_watch_bindings(&cfg).unwrap();

    // html, scss, js from src; plugins opted out; build has no sources; two
    // [[watch]] entries.
    assert_eq!(bindings.len(), 5);

    assert_eq!(tasks_for_path(&bindings, "app/index.html"), vec!["html:build"]);
    assert_eq!(
        tasks_for_path(&bindings, "app/_sections/nav/menu.htm"),
        vec!["html:build"]
    );
    assert_eq!(tasks_for_path(&bindings, "app/js/main.js"), vec!["js:build"]);
    assert_eq!(
        tasks_for_path(&bindings, "app/scss/_variables.scss"),
        vec!["scss:build"]
    );
    assert!(tasks_for_path(&bindings, "app/plugins/slider/slider.css").is_empty());
    // `*` does not cross directories.
    assert!(tasks_for_path(&bindings, "app/js/vendor/lib.js").is_empty());
}

#[test]
fn dispatcher_maps_a_batch_to_distinct_tasks() {
    let cfg = site_config();
    let fs = MockFileSystem::new();
    let mut dispatcher = WatchDispatcher::new(
        Arc::new(fs),
        "/site",
        "/site/builds/development",
        build_watch_bindings(&cfg).unwrap(),
        false,
    );

    let tasks = dispatcher.dispatch(&[
        PathBuf::from("/site/app/_sections/footer.htm"),
        PathBuf::from("/site/app/js/main.js"),
        PathBuf::from("/site/app/index.html"),
        PathBuf::from("/site/builds/development/index.html"),
        PathBuf::from("/site/README.md"),
    ]);

    assert_eq!(tasks, vec!["html:build", "js:build"]);
}

#[test]
fn unchanged_content_does_not_retrigger_with_hashing() {
    let cfg = site_config();
    let fs = MockFileSystem::new();
    fs.add_file("/site/app/js/main.js", "var a = 1;");

    let mut dispatcher = WatchDispatcher::new(
        Arc::new(fs.clone()),
        "/site",
        "/site/builds/development",
        build_watch_bindings(&cfg).unwrap(),
        true,
    );
    dispatcher.prime(&PathBuf::from("/site/app/js/main.js"));

    let changed = [PathBuf::from("/site/app/js/main.js")];
    assert!(dispatcher.dispatch(&changed).is_empty(), "touch without edit");

    fs.add_file("/site/app/js/main.js", "var a = 2;");
    assert_eq!(dispatcher.dispatch(&changed), vec!["js:build"]);
    assert!(dispatcher.dispatch(&changed).is_empty());
}
