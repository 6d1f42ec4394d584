//! Bounded-concurrency download dispatch.

use flowdag::agents::download::download_pass;
use flowdag::agents::AgentContext;
use flowdag::lifecycle::JobStatus;
use flowdag::store::Store;
use flowdag::workflow::WorkflowBuilder;
use flowdag_test_utils::builders::{seed_project, test_config_with_limits, AppBuilder};
use flowdag_test_utils::fake_launcher::FakeLauncher;
use flowdag_test_utils::fake_remote::FakeRemote;
use flowdag_test_utils::init_tracing;

/// A store with `eligible` jobs in qc-passed and `running` jobs already
/// downloading, in creation order.
fn store_with_jobs(eligible: usize, running: usize) -> (Store, tempfile::TempDir) {
    init_tracing();
    let store = Store::open_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let project = seed_project(&store, "ProjX", "77", dir.path().to_str().unwrap());
    AppBuilder::new("Align", "901")
        .param("project-id", "project")
        .param("sample-id", "sample")
        .register(&store);
    let builder = WorkflowBuilder::new(&store);
    for i in 0..(eligible + running) {
        let name = format!("S{i}");
        store.add_sample(&name, &project).unwrap();
        let job = builder.add_sample_app(&name, "Align").unwrap();
        let status = if i < eligible {
            JobStatus::QcPassed
        } else {
            JobStatus::Downloading
        };
        store.set_job_status(&job, status, "").unwrap();
    }
    (store, dir)
}

#[tokio::test]
async fn dispatch_fills_only_the_free_slots() {
    let (store, _dir) = store_with_jobs(10, 3);
    let config = test_config_with_limits(0.0, 5);
    let remote = FakeRemote::new();
    let ctx = AgentContext {
        store: &store,
        remote: &remote,
        config: &config,
        safe: false,
        only_job: None,
    };

    let mut launcher = FakeLauncher::new();
    let transitions = download_pass(&ctx, &mut launcher).await.unwrap();

    assert_eq!(launcher.launched().len(), 2);
    assert_eq!(
        transitions.count(JobStatus::QcPassed, JobStatus::Downloading),
        2
    );
    assert_eq!(store.count_jobs_with_status(JobStatus::Downloading).unwrap(), 5);
    // the first eligible jobs in query order were taken
    let still_eligible = store.jobs_with_statuses([JobStatus::QcPassed]).unwrap();
    assert_eq!(still_eligible.len(), 8);
}

#[tokio::test]
async fn dispatch_records_the_worker_pid() {
    let (store, _dir) = store_with_jobs(1, 0);
    let config = test_config_with_limits(0.0, 5);
    let remote = FakeRemote::new();
    let ctx = AgentContext {
        store: &store,
        remote: &remote,
        config: &config,
        safe: false,
        only_job: None,
    };

    let mut launcher = FakeLauncher::new();
    download_pass(&ctx, &mut launcher).await.unwrap();

    let launched = launcher.launched();
    assert_eq!(launched.len(), 1);
    let command = &launched[0];
    assert_eq!(command[0], "flowdag");
    assert!(command.contains(&"--id".to_string()));

    let downloading = store.jobs_with_statuses([JobStatus::Downloading]).unwrap();
    assert!(downloading[0].details.starts_with("pid: "));
}

#[tokio::test]
async fn launch_failure_aborts_the_whole_pass() {
    let (store, _dir) = store_with_jobs(3, 0);
    let config = test_config_with_limits(0.0, 5);
    let remote = FakeRemote::new();
    let ctx = AgentContext {
        store: &store,
        remote: &remote,
        config: &config,
        safe: false,
        only_job: None,
    };

    let mut launcher = FakeLauncher::failing_after(1);
    let result = download_pass(&ctx, &mut launcher).await;
    assert!(result.is_err());

    // one launched, one failed, the third untouched
    assert_eq!(store.count_jobs_with_status(JobStatus::Downloading).unwrap(), 1);
    assert_eq!(
        store.count_jobs_with_status(JobStatus::DownloadFailed).unwrap(),
        1
    );
    assert_eq!(store.count_jobs_with_status(JobStatus::QcPassed).unwrap(), 1);

    let failed = store.jobs_with_statuses([JobStatus::DownloadFailed]).unwrap();
    assert!(failed[0].details.contains("--id"));
}

#[tokio::test]
async fn no_slots_means_no_launches() {
    let (store, _dir) = store_with_jobs(4, 5);
    let config = test_config_with_limits(0.0, 5);
    let remote = FakeRemote::new();
    let ctx = AgentContext {
        store: &store,
        remote: &remote,
        config: &config,
        safe: false,
        only_job: None,
    };

    let mut launcher = FakeLauncher::new();
    let transitions = download_pass(&ctx, &mut launcher).await.unwrap();
    assert!(launcher.launched().is_empty());
    assert!(transitions.is_empty());
}

#[tokio::test]
async fn safe_mode_counts_but_launches_nothing() {
    let (store, _dir) = store_with_jobs(10, 3);
    let config = test_config_with_limits(0.0, 5);
    let remote = FakeRemote::new();
    let ctx = AgentContext {
        store: &store,
        remote: &remote,
        config: &config,
        safe: true,
        only_job: None,
    };

    let mut launcher = FakeLauncher::new();
    let transitions = download_pass(&ctx, &mut launcher).await.unwrap();
    assert!(launcher.launched().is_empty());
    assert!(transitions.is_empty());
    assert_eq!(store.count_jobs_with_status(JobStatus::Downloading).unwrap(), 3);
    assert_eq!(store.count_jobs_with_status(JobStatus::QcPassed).unwrap(), 10);
}
