// src/remote/vendor.rs

//! Production [`RemoteService`] implementation: a thin adapter that shells
//! out to the vendor's command-line client. The client owns credentials,
//! retries and the wire protocol; this adapter only builds argument lists
//! and parses stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::ConfigFile;
use crate::errors::{FlowdagError, Result};
use crate::launch::LaunchPayload;
use crate::remote::{BoxFuture, RemoteService, SampleBundle};

pub struct VendorCli {
    argv: Vec<String>,
}

impl VendorCli {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            argv: cfg.service.vendor_cli.clone(),
        }
    }

    /// Run the vendor client with `args`, optionally feeding `stdin`, and
    /// return trimmed stdout. Non-zero exits become `Remote` errors carrying
    /// the client's stderr.
    async fn run(&self, args: Vec<String>, stdin: Option<String>) -> Result<String> {
        let program = &self.argv[0];
        let mut cmd = Command::new(program);
        cmd.args(&self.argv[1..])
            .args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(program = %program, args = ?args, "invoking vendor client");

        let mut child = cmd
            .spawn()
            .map_err(|e| FlowdagError::Remote(format!("spawning {program}: {e}")))?;

        if let Some(input) = stdin {
            let mut handle = child.stdin.take().ok_or_else(|| {
                FlowdagError::Remote(format!("no stdin handle for {program}"))
            })?;
            handle
                .write_all(input.as_bytes())
                .await
                .map_err(|e| FlowdagError::Remote(format!("writing to {program}: {e}")))?;
            drop(handle);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| FlowdagError::Remote(format!("waiting for {program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FlowdagError::Remote(format!(
                "{program} {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl RemoteService for VendorCli {
    fn submit<'a>(
        &'a self,
        app_external_id: &'a str,
        payload: &'a LaunchPayload,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let body = payload.to_json()?;
            let out = self
                .run(
                    vec![
                        "launch".to_string(),
                        "--app".to_string(),
                        app_external_id.to_string(),
                        "--payload-stdin".to_string(),
                    ],
                    Some(body),
                )
                .await?;
            if out.is_empty() {
                return Err(FlowdagError::Remote(
                    "vendor client returned no execution id".to_string(),
                ));
            }
            Ok(out)
        })
    }

    fn status<'a>(&'a self, execution_id: &'a str) -> BoxFuture<'a, String> {
        Box::pin(async move {
            self.run(
                vec!["status".to_string(), execution_id.to_string()],
                None,
            )
            .await
        })
    }

    fn sample_bundles<'a>(
        &'a self,
        project_external_id: &'a str,
        sample_name: &'a str,
    ) -> BoxFuture<'a, Vec<SampleBundle>> {
        Box::pin(async move {
            let out = self
                .run(
                    vec![
                        "samples".to_string(),
                        "--project".to_string(),
                        project_external_id.to_string(),
                        "--name".to_string(),
                        sample_name.to_string(),
                        "--json".to_string(),
                    ],
                    None,
                )
                .await?;
            if out.is_empty() {
                return Ok(Vec::new());
            }
            let bundles: Vec<SampleBundle> = serde_json::from_str(&out)
                .map_err(|e| FlowdagError::Remote(format!("bad sample listing: {e}")))?;
            Ok(bundles)
        })
    }

    fn locate_output<'a>(
        &'a self,
        execution_id: &'a str,
        result_name: Option<&'a str>,
        path_glob: Option<&'a str>,
    ) -> BoxFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut args = vec![
                "outputs".to_string(),
                execution_id.to_string(),
                "--json".to_string(),
            ];
            if let Some(result) = result_name {
                args.push("--result".to_string());
                args.push(result.to_string());
            }
            if let Some(glob) = path_glob {
                args.push("--match".to_string());
                args.push(glob.to_string());
            }
            let out = self.run(args, None).await?;
            if out.is_empty() {
                return Ok(Vec::new());
            }
            let ids: Vec<String> = serde_json::from_str(&out)
                .map_err(|e| FlowdagError::Remote(format!("bad output listing: {e}")))?;
            Ok(ids)
        })
    }

    fn download_files<'a>(
        &'a self,
        execution_id: &'a str,
        extension: &'a str,
        dest: &'a Path,
        result_name: Option<&'a str>,
    ) -> BoxFuture<'a, Vec<PathBuf>> {
        Box::pin(async move {
            let mut args = vec![
                "download".to_string(),
                execution_id.to_string(),
                "--extension".to_string(),
                extension.to_string(),
                "--output".to_string(),
                dest.display().to_string(),
            ];
            if let Some(result) = result_name {
                args.push("--result".to_string());
                args.push(result.to_string());
            }
            let out = self.run(args, None).await?;
            Ok(out.lines().map(PathBuf::from).collect())
        })
    }

    fn set_metadata<'a>(
        &'a self,
        execution_id: &'a str,
        namespace: &'a str,
        values: &'a [(String, String)],
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut args = vec![
                "annotate".to_string(),
                execution_id.to_string(),
                "--namespace".to_string(),
                namespace.to_string(),
            ];
            for (key, value) in values {
                args.push(format!("{key}={value}"));
            }
            self.run(args, None).await?;
            Ok(())
        })
    }
}
