//! Track, QC and download-worker behaviour over the shared store.

use flowdag::agents::qc_check::qc_pass;
use flowdag::agents::track::track_pass;
use flowdag::agents::worker::download_one;
use flowdag::agents::AgentContext;
use flowdag::lifecycle::JobStatus;
use flowdag::store::{Job, Store};
use flowdag::workflow::WorkflowBuilder;
use flowdag_test_utils::builders::{seed_project, test_config, AppBuilder};
use flowdag_test_utils::fake_remote::FakeRemote;
use flowdag_test_utils::init_tracing;

const THRESHOLDS: &str = r#"{"insert_size": {"operator": "ge", "threshold": 300}}"#;

struct Fixture {
    store: Store,
    _output_dir: tempfile::TempDir,
    job: Job,
}

fn fixture_with_qc() -> Fixture {
    init_tracing();
    let store = Store::open_in_memory().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    let project = seed_project(&store, "ProjX", "77", output_dir.path().to_str().unwrap());
    store.add_sample("NA12878", &project).unwrap();
    AppBuilder::new("Align", "901")
        .param("project-id", "project")
        .param("sample-id", "sample")
        .qc(Some("Variants"), "csv", THRESHOLDS, &["vcf", "bam"])
        .register(&store);
    let job = WorkflowBuilder::new(&store)
        .add_sample_app("NA12878", "Align")
        .unwrap();
    store.set_execution_id(&job, "AS-1").unwrap();
    let job = store.job_by_id(job.id).unwrap();
    Fixture {
        store,
        _output_dir: output_dir,
        job,
    }
}

#[tokio::test]
async fn track_maps_vendor_statuses_to_local_states() {
    let fx = fixture_with_qc();
    let config = test_config();
    fx.store
        .set_job_status(&fx.job, JobStatus::Submitted, "")
        .unwrap();

    let remote = FakeRemote::new();
    remote.set_status("AS-1", "Running");
    let ctx = AgentContext {
        store: &fx.store,
        remote: &remote,
        config: &config,
        safe: false,
        only_job: None,
    };

    let transitions = track_pass(&ctx).await.unwrap();
    assert_eq!(transitions.count(JobStatus::Submitted, JobStatus::Running), 1);
    assert_eq!(
        fx.store.job_by_id(fx.job.id).unwrap().status,
        JobStatus::Running
    );

    remote.set_status("AS-1", "Complete");
    let transitions = track_pass(&ctx).await.unwrap();
    assert_eq!(
        transitions.count(JobStatus::Running, JobStatus::AppFinished),
        1
    );

    // app-finished is no longer in the tracker's working set
    let transitions = track_pass(&ctx).await.unwrap();
    assert!(transitions.is_empty());
}

#[tokio::test]
async fn track_skips_jobs_without_execution_id() {
    init_tracing();
    let store = Store::open_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let project = seed_project(&store, "ProjX", "77", dir.path().to_str().unwrap());
    store.add_sample("S1", &project).unwrap();
    AppBuilder::new("Align", "901")
        .param("project-id", "project")
        .param("sample-id", "sample")
        .register(&store);
    let job = WorkflowBuilder::new(&store)
        .add_sample_app("S1", "Align")
        .unwrap();
    store.set_job_status(&job, JobStatus::Submitted, "").unwrap();

    let remote = FakeRemote::new();
    let config = test_config();
    let ctx = AgentContext {
        store: &store,
        remote: &remote,
        config: &config,
        safe: false,
        only_job: None,
    };
    let transitions = track_pass(&ctx).await.unwrap();
    assert!(transitions.is_empty());
    assert_eq!(
        store.job_by_id(job.id).unwrap().status,
        JobStatus::Submitted
    );
}

#[tokio::test]
async fn unknown_vendor_status_leaves_job_untouched() {
    let fx = fixture_with_qc();
    let config = test_config();
    fx.store
        .set_job_status(&fx.job, JobStatus::Running, "")
        .unwrap();
    let remote = FakeRemote::new();
    remote.set_status("AS-1", "NeedsAttention");
    let ctx = AgentContext {
        store: &fx.store,
        remote: &remote,
        config: &config,
        safe: false,
        only_job: None,
    };
    let transitions = track_pass(&ctx).await.unwrap();
    assert!(transitions.is_empty());
    assert_eq!(
        fx.store.job_by_id(fx.job.id).unwrap().status,
        JobStatus::Running
    );
}

#[tokio::test]
async fn qc_passes_and_publishes_the_verdict() {
    let fx = fixture_with_qc();
    let config = test_config();
    fx.store
        .set_job_status(&fx.job, JobStatus::AppFinished, "")
        .unwrap();

    let remote = FakeRemote::new();
    remote.add_file("AS-1", "csv", "summary.csv", "insert_size,310\n");
    let ctx = AgentContext {
        store: &fx.store,
        remote: &remote,
        config: &config,
        safe: false,
        only_job: None,
    };

    let transitions = qc_pass(&ctx).await.unwrap();
    assert_eq!(
        transitions.count(JobStatus::AppFinished, JobStatus::QcPassed),
        1
    );
    let job = fx.store.job_by_id(fx.job.id).unwrap();
    assert_eq!(job.status, JobStatus::QcPassed);
    assert!(job.details.is_empty());

    let metadata = remote.metadata();
    assert_eq!(metadata.len(), 1);
    let (execution_id, namespace, values) = &metadata[0];
    assert_eq!(execution_id, "AS-1");
    assert_eq!(namespace, "AutomatedQC");
    assert!(values.contains(&("QCResult".to_string(), "qc-passed".to_string())));
}

#[tokio::test]
async fn qc_failure_records_the_failing_metric() {
    let fx = fixture_with_qc();
    let config = test_config();
    fx.store
        .set_job_status(&fx.job, JobStatus::AppFinished, "")
        .unwrap();

    let remote = FakeRemote::new();
    remote.add_file("AS-1", "csv", "summary.csv", "insert_size,290\n");
    let ctx = AgentContext {
        store: &fx.store,
        remote: &remote,
        config: &config,
        safe: false,
        only_job: None,
    };

    let transitions = qc_pass(&ctx).await.unwrap();
    assert_eq!(
        transitions.count(JobStatus::AppFinished, JobStatus::QcFailed),
        1
    );
    let job = fx.store.job_by_id(fx.job.id).unwrap();
    assert_eq!(job.status, JobStatus::QcFailed);
    assert!(job.details.contains("insert_size"));
    assert!(job.details.contains("ge"));
    assert!(job.details.contains("300"));

    let metadata = remote.metadata();
    let (_, _, values) = &metadata[0];
    assert!(values.contains(&("QCResult".to_string(), "qc-failed".to_string())));
    assert!(values.iter().any(|(k, _)| k == "QCDetails"));
}

#[tokio::test]
async fn missing_metrics_file_is_fatal_to_that_job_only() {
    let fx = fixture_with_qc();
    let config = test_config();
    fx.store
        .set_job_status(&fx.job, JobStatus::AppFinished, "")
        .unwrap();

    // no metrics file programmed
    let remote = FakeRemote::new();
    let ctx = AgentContext {
        store: &fx.store,
        remote: &remote,
        config: &config,
        safe: false,
        only_job: None,
    };
    let transitions = qc_pass(&ctx).await.unwrap();
    assert!(transitions.is_empty());
    assert_eq!(
        fx.store.job_by_id(fx.job.id).unwrap().status,
        JobStatus::AppFinished
    );
}

#[tokio::test]
async fn worker_downloads_deliverables_and_records_terminal_status() {
    let fx = fixture_with_qc();
    let config = test_config();
    fx.store
        .set_job_status(&fx.job, JobStatus::Downloading, "pid: 1001")
        .unwrap();

    let remote = FakeRemote::new();
    remote.add_file("AS-1", "vcf", "genome.vcf", "##fileformat=VCFv4.2\n");
    remote.add_file("AS-1", "bam", "genome.bam", "BAM\n");
    let ctx = AgentContext {
        store: &fx.store,
        remote: &remote,
        config: &config,
        safe: false,
        only_job: Some(fx.job.id),
    };

    download_one(&ctx, fx.job.id).await.unwrap();
    let job = fx.store.job_by_id(fx.job.id).unwrap();
    assert_eq!(job.status, JobStatus::Downloaded);

    let output_dir = fx.store.job_output_dir(&job).unwrap();
    assert!(output_dir.join("genome.vcf").is_file());
    assert!(output_dir.join("genome.bam").is_file());
}

#[tokio::test]
async fn worker_without_deliverable_config_fails_the_job() {
    init_tracing();
    let store = Store::open_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let project = seed_project(&store, "ProjX", "77", dir.path().to_str().unwrap());
    store.add_sample("S1", &project).unwrap();
    AppBuilder::new("Align", "901")
        .param("project-id", "project")
        .param("sample-id", "sample")
        .register(&store);
    let job = WorkflowBuilder::new(&store)
        .add_sample_app("S1", "Align")
        .unwrap();
    store.set_execution_id(&job, "AS-1").unwrap();

    let remote = FakeRemote::new();
    let config = test_config();
    let ctx = AgentContext {
        store: &store,
        remote: &remote,
        config: &config,
        safe: false,
        only_job: Some(job.id),
    };
    assert!(download_one(&ctx, job.id).await.is_err());
    let job = store.job_by_id(job.id).unwrap();
    assert_eq!(job.status, JobStatus::DownloadFailed);
    assert!(job.details.contains("no deliverables configured"));
}
