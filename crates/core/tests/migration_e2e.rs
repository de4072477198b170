//! End-to-end migration tests.
//!
//! These tests run the migration runner against real archives on disk with
//! a recording mock procedure:
//! - Version ordering and one invocation per archive
//! - Cleanup of every staging directory
//! - Abort on a staging failure without touching later versions
//! - Procedure failures that do not stop the run

use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use tokio::sync::mpsc;

use massupdate_core::{
    testing::{fixtures, MockProcedure},
    Config, MigrationError, MigrationProgress, MigrationRunner, StagingConfig,
};

struct TestHarness {
    source: TempDir,
    scratch: TempDir,
    procedure: MockProcedure,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            source: TempDir::new().unwrap(),
            scratch: TempDir::new().unwrap(),
            procedure: MockProcedure::new(),
        }
    }

    fn config(&self) -> Config {
        Config {
            staging: StagingConfig::default().with_scratch_dir(self.scratch.path().to_path_buf()),
            ..Config::default()
        }
    }

    fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }

    fn source(&self) -> &Path {
        self.source.path()
    }
}

#[tokio::test]
async fn test_migrates_versions_in_order() {
    let h = TestHarness::new();
    fixtures::write_release_archive(h.source(), "FoundryVTT-9.280.zip", "9.280");
    fixtures::write_release_archive(h.source(), "FoundryVTT-10.290.zip", "10.290");
    fixtures::write_release_archive(h.source(), "FoundryVTT-Linux-11.300.zip", "11.300");
    std::fs::write(h.source().join("notes.txt"), b"ignored").unwrap();

    let runner = MigrationRunner::new(h.procedure.clone());
    let summary = assert_ok!(runner.run(h.source(), &h.config()).await);

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded(), 3);
    assert!(summary.is_clean());

    let calls = h.procedure.invocations().await;
    let versions: Vec<_> = calls
        .iter()
        .map(|c| c.staged_version.clone().unwrap())
        .collect();
    assert_eq!(versions, vec!["9.280", "10.290", "11.300"]);

    // Each version was staged in its own directory.
    assert_ne!(calls[0].payload, calls[1].payload);
    assert_ne!(calls[1].payload, calls[2].payload);
    for call in &calls {
        assert_eq!(call.payload.file_name().unwrap(), fixtures::PAYLOAD_DIR);
        assert!(!call.payload.exists());
    }
    assert_eq!(h.scratch_entries(), 0);
}

#[tokio::test]
async fn test_empty_source_completes_without_invocations() {
    let h = TestHarness::new();

    let summary = MigrationRunner::new(h.procedure.clone())
        .run(h.source(), &h.config())
        .await
        .unwrap();

    assert_eq!(summary.total, 0);
    assert!(h.procedure.invocations().await.is_empty());
    assert_eq!(h.scratch_entries(), 0);
}

#[tokio::test]
async fn test_staging_failure_aborts_before_later_versions() {
    let h = TestHarness::new();
    fixtures::write_release_set(h.source(), &["9.280", "11.300"]);
    fixtures::write_corrupt_archive(h.source(), "FoundryVTT-10.290.zip");

    let err = assert_err!(
        MigrationRunner::new(h.procedure.clone())
            .run(h.source(), &h.config())
            .await
    );

    assert_eq!(err.version().map(|v| v.to_string()).as_deref(), Some("10.290"));
    assert!(err.to_string().contains("10.290"));
    match &err {
        MigrationError::Aborted { summary, .. } => {
            assert_eq!(summary.reports.len(), 1);
            assert_eq!(summary.reports[0].version.to_string(), "9.280");
        }
        other => panic!("unexpected error: {other}"),
    }

    let calls = h.procedure.invocations().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].staged_version.as_deref(), Some("9.280"));
    assert_eq!(h.scratch_entries(), 0);
}

#[tokio::test]
async fn test_procedure_failure_does_not_stop_run() {
    let h = TestHarness::new();
    fixtures::write_release_set(h.source(), &["9.280", "10.290", "11.300"]);
    h.procedure.fail_call(1, 3).await;

    let summary = MigrationRunner::new(h.procedure.clone())
        .run(h.source(), &h.config())
        .await
        .unwrap();

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert!(!summary.is_clean());
    assert_eq!(summary.reports[1].outcome.label(), "failed");
    assert_eq!(h.procedure.invocations().await.len(), 3);
    assert_eq!(h.scratch_entries(), 0);
}

#[tokio::test]
async fn test_multi_root_archive_is_skipped() {
    let h = TestHarness::new();
    fixtures::write_release_set(h.source(), &["9.280", "11.300"]);
    fixtures::write_multi_root_archive(h.source(), "FoundryVTT-10.290.zip");

    let summary = MigrationRunner::new(h.procedure.clone())
        .run(h.source(), &h.config())
        .await
        .unwrap();

    assert_eq!(summary.skipped(), 1);
    assert_eq!(summary.reports[1].outcome.label(), "skipped");
    assert_eq!(h.procedure.invocations().await.len(), 2);
}

#[tokio::test]
async fn test_at_most_two_staging_directories_exist() {
    let h = TestHarness::new();
    fixtures::write_release_set(h.source(), &["1.0", "1.1", "1.2", "1.3", "1.4"]);
    h.procedure.set_delay(Duration::from_millis(50)).await;
    h.procedure.observe_dir(h.scratch.path()).await;

    MigrationRunner::new(h.procedure.clone())
        .run(h.source(), &h.config())
        .await
        .unwrap();

    let calls = h.procedure.invocations().await;
    assert_eq!(calls.len(), 5);
    for call in &calls {
        let entries = call.scratch_entries.unwrap();
        assert!(entries >= 1 && entries <= 2, "saw {entries} staging directories");
    }
    assert_eq!(h.scratch_entries(), 0);
}

#[tokio::test]
async fn test_progress_events() {
    let h = TestHarness::new();
    fixtures::write_release_set(h.source(), &["9.280", "10.290"]);

    let (tx, mut rx) = mpsc::channel(64);
    let summary = MigrationRunner::new(h.procedure.clone())
        .with_progress(tx)
        .run(h.source(), &h.config())
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert!(matches!(events.first(), Some(MigrationProgress::Started { total: 2, .. })));
    assert!(matches!(events.last(), Some(MigrationProgress::Completed { .. })));
    let processing = events
        .iter()
        .filter(|e| matches!(e, MigrationProgress::Processing { .. }))
        .count();
    assert_eq!(processing, 2);
    assert_eq!(summary.reports.len(), 2);
}

#[tokio::test]
async fn test_unavailable_procedure_fails_before_staging() {
    let h = TestHarness::new();
    fixtures::write_release_set(h.source(), &["9.280"]);
    h.procedure.set_unavailable(true).await;

    let err = MigrationRunner::new(h.procedure.clone())
        .run(h.source(), &h.config())
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::Procedure(_)));
    assert_eq!(h.scratch_entries(), 0);
}
