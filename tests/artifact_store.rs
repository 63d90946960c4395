// tests/artifact_store.rs

mod common;
use crate::common::{PlanBuilder, TaskBuilder};

use std::error::Error;
use std::sync::Arc;

use plandag::agent::Capability;
use plandag::artifact::ArtifactStore;
use plandag::errors::ArtifactError;
use plandag::plan::Plan;

type TestResult = Result<(), Box<dyn Error>>;

fn plan() -> Plan {
    PlanBuilder::new("docs")
        .with_task(TaskBuilder::new("draft", Capability::Writer).produces("doc.md").build())
        .with_task(TaskBuilder::new("edit", Capability::Reviewer).produces("doc.md").reads("doc.md").build())
        .build()
}

#[test]
fn unknown_artifact_is_not_found() {
    let store = ArtifactStore::new();
    store.declare_producers(&plan());

    assert_eq!(
        store.read("missing.md"),
        Err(ArtifactError::NotFound("missing.md".to_string()))
    );
}

#[test]
fn declared_but_unwritten_artifact_is_not_ready() {
    let store = ArtifactStore::new();
    store.declare_producers(&plan());

    assert_eq!(
        store.read("doc.md"),
        Err(ArtifactError::NotReady {
            name: "doc.md".to_string(),
            producer: "draft".to_string(),
        })
    );
}

#[test]
fn writes_stay_invisible_until_the_producer_commits() -> TestResult {
    let store = ArtifactStore::new();
    store.declare_producers(&plan());

    let written = store.write("doc.md", "first draft", "draft");
    assert_eq!(written.version, 1);
    assert!(matches!(
        store.read("doc.md"),
        Err(ArtifactError::NotReady { .. })
    ));
    assert!(store.available().is_empty());

    store.commit("draft");
    let read = store.read("doc.md")?;
    assert_eq!(read.content, "first draft");
    assert_eq!(read.producing_task_id, "draft");
    Ok(())
}

#[test]
fn every_write_appends_a_new_version() -> TestResult {
    let store = ArtifactStore::new();
    store.declare_producers(&plan());

    store.write("doc.md", "first draft", "draft");
    store.commit("draft");
    let edited = store.write("doc.md", "edited", "edit");
    assert_eq!(edited.version, 2);

    // The edit is not committed yet: readers still see v1.
    assert_eq!(store.read("doc.md")?.version, 1);

    store.commit("edit");
    assert_eq!(store.read("doc.md")?.content, "edited");
    assert_eq!(store.read_version("doc.md", 1)?.content, "first draft");

    let history: Vec<u64> = store.history("doc.md").iter().map(|a| a.version).collect();
    assert_eq!(history, vec![1, 2]);

    assert_eq!(
        store.read_version("doc.md", 7),
        Err(ArtifactError::VersionNotFound {
            name: "doc.md".to_string(),
            version: 7,
        })
    );
    Ok(())
}

#[test]
fn identical_rewrite_by_the_same_task_is_idempotent() -> TestResult {
    let store = ArtifactStore::new();
    let first = store.write("notes.txt", "same", "t");
    let second = store.write("notes.txt", "same", "t");
    assert_eq!(first, second);

    let changed = store.write("notes.txt", "different", "t");
    assert_eq!(changed.version, 2);
    Ok(())
}

#[test]
fn names_and_available_list_only_committed_artifacts() {
    let store = ArtifactStore::new();
    store.write("b.txt", "b", "producer-b");
    store.write("a.txt", "a", "producer-a");
    store.commit("producer-a");

    assert_eq!(store.names(), vec!["a.txt".to_string()]);
    let available: Vec<String> = store.available().into_iter().map(|a| a.name).collect();
    assert_eq!(available, vec!["a.txt".to_string()]);
}

#[test]
fn seeded_completed_producers_count_as_committed() -> TestResult {
    let plan = PlanBuilder::new("resume")
        .with_task(
            TaskBuilder::new("draft", Capability::Writer)
                .produces("doc.md")
                .completed()
                .build(),
        )
        .build();
    let store = ArtifactStore::new();
    store.declare_producers(&plan);

    store.write("doc.md", "from an earlier run", "draft");
    assert_eq!(store.read("doc.md")?.content, "from an earlier run");
    Ok(())
}

#[test]
fn concurrent_writers_get_distinct_versions() -> TestResult {
    let store = Arc::new(ArtifactStore::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let producer = format!("writer-{i}");
                let artifact = store.write("log.txt", format!("line {i}"), &producer);
                store.commit(&producer);
                artifact.version
            })
        })
        .collect();

    let mut versions: Vec<u64> = handles
        .into_iter()
        .map(|h| h.join().expect("writer thread panicked"))
        .collect();
    versions.sort_unstable();

    assert_eq!(versions, (1..=8).collect::<Vec<u64>>());
    assert_eq!(store.history("log.txt").len(), 8);
    Ok(())
}
