use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flowdag::errors::FlowdagError;
use flowdag::launch::LaunchPayload;
use flowdag::remote::{BoxFuture, RemoteService, SampleBundle};

/// A fake remote execution service:
/// - serves programmed sample bundles, statuses and output listings
/// - writes programmed metrics/deliverable files on download
/// - records submissions and published metadata for assertions.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    bundles: BTreeMap<(String, String), Vec<SampleBundle>>,
    statuses: BTreeMap<String, String>,
    outputs: BTreeMap<String, Vec<String>>,
    /// (execution id, extension) → files written into the destination
    /// directory on `download_files`.
    files: BTreeMap<(String, String), Vec<(String, String)>>,
    submissions: Vec<(String, LaunchPayload)>,
    metadata: Vec<(String, String, Vec<(String, String)>)>,
    next_execution: u64,
    fail_submission: bool,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: a paired-end bundle with the given read count and
    /// length.
    pub fn bundle(id: &str, reads: u64, read_length: u32) -> SampleBundle {
        SampleBundle {
            external_id: id.to_string(),
            reads,
            read1_length: read_length,
            read2_length: read_length,
            paired_end: true,
        }
    }

    pub fn add_bundle(&self, project: &str, sample: &str, bundle: SampleBundle) {
        self.state
            .lock()
            .unwrap()
            .bundles
            .entry((project.to_string(), sample.to_string()))
            .or_default()
            .push(bundle);
    }

    pub fn set_status(&self, execution_id: &str, vendor_status: &str) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(execution_id.to_string(), vendor_status.to_string());
    }

    pub fn set_outputs(&self, execution_id: &str, ids: &[&str]) {
        self.state.lock().unwrap().outputs.insert(
            execution_id.to_string(),
            ids.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Serve `contents` as `file_name` whenever `extension` is downloaded
    /// for `execution_id`.
    pub fn add_file(&self, execution_id: &str, extension: &str, file_name: &str, contents: &str) {
        self.state
            .lock()
            .unwrap()
            .files
            .entry((execution_id.to_string(), extension.to_string()))
            .or_default()
            .push((file_name.to_string(), contents.to_string()));
    }

    pub fn fail_submissions(&self) {
        self.state.lock().unwrap().fail_submission = true;
    }

    pub fn submissions(&self) -> Vec<(String, LaunchPayload)> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn metadata(&self) -> Vec<(String, String, Vec<(String, String)>)> {
        self.state.lock().unwrap().metadata.clone()
    }
}

impl RemoteService for FakeRemote {
    fn submit<'a>(
        &'a self,
        app_external_id: &'a str,
        payload: &'a LaunchPayload,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if state.fail_submission {
                return Err(FlowdagError::Remote("submission refused".to_string()));
            }
            state.next_execution += 1;
            let execution_id = format!("AS-{}", state.next_execution);
            state
                .submissions
                .push((app_external_id.to_string(), payload.clone()));
            // a fresh submission reports as pending until told otherwise
            state
                .statuses
                .entry(execution_id.clone())
                .or_insert_with(|| "PendingExecution".to_string());
            Ok(execution_id)
        })
    }

    fn status<'a>(&'a self, execution_id: &'a str) -> BoxFuture<'a, String> {
        Box::pin(async move {
            self.state
                .lock()
                .unwrap()
                .statuses
                .get(execution_id)
                .cloned()
                .ok_or_else(|| {
                    FlowdagError::Remote(format!("unknown execution: {execution_id}"))
                })
        })
    }

    fn sample_bundles<'a>(
        &'a self,
        project_external_id: &'a str,
        sample_name: &'a str,
    ) -> BoxFuture<'a, Vec<SampleBundle>> {
        Box::pin(async move {
            Ok(self
                .state
                .lock()
                .unwrap()
                .bundles
                .get(&(project_external_id.to_string(), sample_name.to_string()))
                .cloned()
                .unwrap_or_default())
        })
    }

    fn locate_output<'a>(
        &'a self,
        execution_id: &'a str,
        _result_name: Option<&'a str>,
        _path_glob: Option<&'a str>,
    ) -> BoxFuture<'a, Vec<String>> {
        Box::pin(async move {
            Ok(self
                .state
                .lock()
                .unwrap()
                .outputs
                .get(execution_id)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn download_files<'a>(
        &'a self,
        execution_id: &'a str,
        extension: &'a str,
        dest: &'a Path,
        _result_name: Option<&'a str>,
    ) -> BoxFuture<'a, Vec<PathBuf>> {
        Box::pin(async move {
            let files = self
                .state
                .lock()
                .unwrap()
                .files
                .get(&(execution_id.to_string(), extension.to_string()))
                .cloned()
                .unwrap_or_default();
            let mut written = Vec::new();
            for (name, contents) in files {
                let path = dest.join(name);
                std::fs::create_dir_all(dest)?;
                std::fs::write(&path, contents)?;
                written.push(path);
            }
            Ok(written)
        })
    }

    fn set_metadata<'a>(
        &'a self,
        execution_id: &'a str,
        namespace: &'a str,
        values: &'a [(String, String)],
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.state.lock().unwrap().metadata.push((
                execution_id.to_string(),
                namespace.to_string(),
                values.to_vec(),
            ));
            Ok(())
        })
    }
}
