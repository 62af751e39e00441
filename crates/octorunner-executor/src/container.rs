// SPDX-License-Identifier: MIT OR Apache-2.0
//! Container Executor (spec.md §4.6 C6).
//!
//! Drives a `bollard::Docker` handle through image presence, container
//! create/start/wait/inspect/remove. The Wait and the Log Drain are spawned
//! as sibling tasks, following `abp_host::SidecarClient::run`'s split
//! between the stdout-reading task and the awaited result channel rather
//! than a single task doing both jobs in lockstep.

use crate::{container_name, drain_logs, ExecutorError};
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    UploadToContainerOptions, WaitContainerOptions,
};
use bollard::image::{CreateImageOptions, ListImagesOptions};
use bollard::Docker;
use futures::StreamExt;
use octorunner_core::EventScope;
use octorunner_pipeline::PipelineSpec;
use octorunner_store::OutputWriter;
use std::path::Path;

const WORKING_DIR: &str = "/var/run/octorunner";

/// Outcome of a full container run.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionOutcome {
    /// The container's exit code. `0` is success (spec.md §4.6).
    pub exit_code: i64,
}

/// Drives one pipeline execution inside a disposable container.
#[derive(Debug, Clone)]
pub struct ContainerExecutor {
    docker: Docker,
}

impl ContainerExecutor {
    /// Wrap an already-connected Docker Engine API client.
    #[must_use]
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Run `pipeline` against the extracted source tree at `workdir`,
    /// draining logs through `writer`, naming the container from
    /// `(full_name, commit_id)`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutorError`] at any stage; the container is removed
    /// on every path once it has been created, so partial failures never
    /// leave a container behind.
    pub async fn run(
        &self,
        pipeline: &PipelineSpec,
        workdir: &Path,
        full_name: &str,
        commit_id: &str,
        writer: &OutputWriter,
        scope: &EventScope,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        self.ensure_image(&pipeline.image, scope).await?;

        let name = container_name(full_name, commit_id);
        let container_id = self.create_container(&name, pipeline).await?;

        let upload = self.upload_workspace(&container_id, workdir);
        match scope.race(upload).await {
            Some(result) => result?,
            None => {
                let _ = self.remove_container(&container_id).await;
                return Err(ExecutorError::Cancelled);
            }
        }

        self.docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| ExecutorError::ContainerStart(e.to_string()))?;

        let log_stream = self.log_stream(&container_id);
        let drain_writer = writer.clone();
        let drain_scope = scope.child_scope();
        let drain_scope_for_task = drain_scope.clone();
        let drain_handle = tokio::spawn(async move {
            drain_logs(log_stream, &drain_writer, &drain_scope_for_task).await;
        });

        let wait = self.wait_container(&container_id);
        let wait_result = match scope.race(wait).await {
            Some(result) => result,
            None => {
                drain_scope.cancel();
                let _ = self.remove_container(&container_id).await;
                let _ = drain_handle.await;
                return Err(ExecutorError::Cancelled);
            }
        };

        // Container has exited; the drain's own stream-close should already
        // be unblocking it, but cancel explicitly so a lingering follow
        // stream can't keep the sibling task alive past this point.
        drain_scope.cancel();
        let _ = drain_handle.await;

        let exit_code = match wait_result {
            Ok(code) => code,
            Err(e) => {
                let _ = self.remove_container(&container_id).await;
                return Err(e);
            }
        };

        self.remove_container(&container_id).await?;

        Ok(ExecutionOutcome { exit_code })
    }

    async fn ensure_image(&self, image: &str, scope: &EventScope) -> Result<(), ExecutorError> {
        let present = self.image_present(image).await?;
        if present {
            return Ok(());
        }

        tracing::info!(%image, "image not present locally, pulling");
        let pull = self.pull_image(image);
        match scope.race(pull).await {
            Some(result) => result,
            None => Err(ExecutorError::Cancelled),
        }
    }

    async fn image_present(&self, image: &str) -> Result<bool, ExecutorError> {
        let images = self
            .docker
            .list_images(Some(ListImagesOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .map_err(|e| ExecutorError::ImagePull(e.to_string()))?;

        let (name, tag) = image.split_once(':').unwrap_or((image, "latest"));
        let full = format!("{name}:{tag}");
        let explicit_tag = image.contains(':');

        Ok(images.iter().any(|summary| {
            summary
                .repo_tags
                .iter()
                .any(|t| tag_matches(t, name, &full, explicit_tag))
        }))
    }

    async fn pull_image(&self, image: &str) -> Result<(), ExecutorError> {
        let (name, tag) = image.split_once(':').unwrap_or((image, "latest"));
        let mut stream = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: name,
                tag,
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(progress) = stream.next().await {
            progress.map_err(|e| ExecutorError::ImagePull(e.to_string()))?;
        }
        Ok(())
    }

    async fn create_container(
        &self,
        name: &str,
        pipeline: &PipelineSpec,
    ) -> Result<String, ExecutorError> {
        let entrypoint = vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            pipeline.script.join(" && "),
        ];

        let config = Config {
            image: Some(pipeline.image.clone()),
            entrypoint: Some(entrypoint),
            working_dir: Some(WORKING_DIR.to_string()),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.to_string(),
                    platform: None,
                }),
                config,
            )
            .await
            .map_err(|e| ExecutorError::ContainerCreate(e.to_string()))?;

        for warning in response.warnings {
            tracing::warn!(%warning, container = %name, "container create warning");
        }

        Ok(response.id)
    }

    async fn upload_workspace(&self, container_id: &str, workdir: &Path) -> Result<(), ExecutorError> {
        let workdir = workdir.to_path_buf();
        let tar_bytes = tokio::task::spawn_blocking(move || build_tar(&workdir))
            .await
            .map_err(|e| ExecutorError::Copy(e.to_string()))?
            .map_err(|e| ExecutorError::Copy(e.to_string()))?;

        self.docker
            .upload_to_container(
                container_id,
                Some(UploadToContainerOptions {
                    path: WORKING_DIR.to_string(),
                    ..Default::default()
                }),
                tar_bytes.into(),
            )
            .await
            .map_err(|e| ExecutorError::Copy(e.to_string()))
    }

    fn log_stream(
        &self,
        container_id: &str,
    ) -> impl futures::Stream<Item = String> + Unpin + 'static {
        let stream = self.docker.logs(
            container_id,
            Some(LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                timestamps: true,
                ..Default::default()
            }),
        );
        Box::pin(stream.filter_map(|item| async move {
            match item {
                Ok(output) => Some(output.to_string()),
                Err(e) => {
                    tracing::warn!(error = %e, "log stream error");
                    None
                }
            }
        }))
    }

    async fn wait_container(&self, container_id: &str) -> Result<i64, ExecutorError> {
        let mut stream = self
            .docker
            .wait_container(container_id, None::<WaitContainerOptions<String>>);

        let mut exit_code = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(response) => exit_code = Some(response.status_code),
                Err(bollard::errors::Error::DockerContainerWaitError { code, .. }) => {
                    exit_code = Some(code);
                }
                Err(e) => return Err(ExecutorError::ContainerInspect(e.to_string())),
            }
        }

        match exit_code {
            Some(code) => Ok(code),
            None => {
                let inspect = self
                    .docker
                    .inspect_container(container_id, None)
                    .await
                    .map_err(|e| ExecutorError::ContainerInspect(e.to_string()))?;
                inspect
                    .state
                    .and_then(|s| s.exit_code)
                    .ok_or_else(|| ExecutorError::ContainerInspect("no exit code reported".into()))
            }
        }
    }

    async fn remove_container(&self, container_id: &str) -> Result<(), ExecutorError> {
        self.docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| ExecutorError::ContainerRemove(e.to_string()))
    }
}

/// Does a cached `repo_tag` satisfy a request for `name[:tag]` (spec.md
/// §4.6 step 1: "matching either the full name:tag or just the name
/// portion (before `:`)")?
///
/// An explicitly tagged request (`alpine:3.18`) must match a cached tag
/// exactly — `alpine:latest` being present does not satisfy it. Only an
/// untagged request (`alpine`, implicitly `latest`) falls back to matching
/// any cached tag with the same name portion, generalising the name-only
/// match beyond a hardcoded `:latest` cached suffix.
fn tag_matches(repo_tag: &str, name: &str, full: &str, explicit_tag: bool) -> bool {
    if repo_tag == full {
        return true;
    }
    if explicit_tag {
        return false;
    }
    repo_tag.rsplit_once(':').map_or(repo_tag, |(n, _)| n) == name
}

fn build_tar(workdir: &Path) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut buf);
        builder.append_dir_all(".", workdir)?;
        builder.finish()?;
    }
    Ok(buf)
}
