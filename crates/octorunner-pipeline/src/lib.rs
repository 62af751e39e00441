// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pipeline description parser (spec.md §4.5 C5).
//!
//! Searches a working tree root for `.octorunner.yaml` then `.octorunner.yml`
//! and deserialises it into a [`PipelineSpec`]. `serde_yaml` is used without
//! `deny_unknown_fields` so additional keys a newer pipeline file might carry
//! are silently ignored.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::path::Path;

const PRIMARY_FILENAME: &str = ".octorunner.yaml";
const FALLBACK_FILENAME: &str = ".octorunner.yml";

/// Errors raised while locating or parsing a pipeline description.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Neither `.octorunner.yaml` nor `.octorunner.yml` exists at the tree
    /// root.
    #[error("no .octorunner.yaml or .octorunner.yml found")]
    Missing,
    /// The file exists but is empty or fails to parse.
    #[error("pipeline file is invalid: {0}")]
    Invalid(String),
    /// Reading the file from disk failed.
    #[error("failed to read pipeline file: {0}")]
    Io(String),
}

impl PipelineError {
    /// Classify this error per spec.md §7.
    #[must_use]
    pub fn kind(&self) -> octorunner_core::ErrorKind {
        match self {
            PipelineError::Missing => octorunner_core::ErrorKind::ConfigMissing,
            PipelineError::Invalid(_) | PipelineError::Io(_) => {
                octorunner_core::ErrorKind::ConfigInvalid
            }
        }
    }
}

/// A parsed pipeline: a container image and a linear shell script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Container image reference, e.g. `"alpine:latest"`.
    pub image: String,
    /// Shell commands executed in order inside the container.
    pub script: Vec<String>,
}

/// Locate and parse the pipeline description at the root of `workdir`.
///
/// # Errors
///
/// Returns [`PipelineError::Missing`] if neither filename is present, or
/// [`PipelineError::Invalid`] if the found file is empty or unparseable.
pub fn load_pipeline(workdir: &Path) -> Result<PipelineSpec, PipelineError> {
    let path = locate(workdir).ok_or(PipelineError::Missing)?;
    let content =
        std::fs::read_to_string(&path).map_err(|e| PipelineError::Io(e.to_string()))?;
    parse_pipeline(&content)
}

/// Parse pipeline YAML content directly (used for testing and by callers
/// that already have the file's bytes).
///
/// # Errors
///
/// Returns [`PipelineError::Invalid`] if `content` is empty or does not
/// deserialise into a [`PipelineSpec`].
pub fn parse_pipeline(content: &str) -> Result<PipelineSpec, PipelineError> {
    if content.trim().is_empty() {
        return Err(PipelineError::Invalid("file is empty".to_string()));
    }
    let spec: PipelineSpec =
        serde_yaml::from_str(content).map_err(|e| PipelineError::Invalid(e.to_string()))?;
    if spec.script.is_empty() {
        return Err(PipelineError::Invalid("script must be non-empty".to_string()));
    }
    Ok(spec)
}

fn locate(workdir: &Path) -> Option<std::path::PathBuf> {
    for filename in [PRIMARY_FILENAME, FALLBACK_FILENAME] {
        let candidate = workdir.join(filename);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_pipeline() {
        let yaml = "image: alpine:latest\nscript:\n  - \"true\"\n  - \"true\"\n";
        let spec = parse_pipeline(yaml).expect("parse");
        assert_eq!(spec.image, "alpine:latest");
        assert_eq!(spec.script, vec!["true".to_string(), "true".to_string()]);
    }

    #[test]
    fn ignores_unknown_keys() {
        let yaml = "image: alpine:latest\nscript: [\"true\"]\nextra_field: ignored\n";
        let spec = parse_pipeline(yaml).expect("parse");
        assert_eq!(spec.image, "alpine:latest");
    }

    #[test]
    fn empty_file_is_invalid() {
        let err = parse_pipeline("   \n").unwrap_err();
        assert!(matches!(err, PipelineError::Invalid(_)));
    }

    #[test]
    fn empty_script_list_is_invalid() {
        let err = parse_pipeline("image: alpine\nscript: []\n").unwrap_err();
        assert!(matches!(err, PipelineError::Invalid(_)));
    }

    #[test]
    fn malformed_yaml_is_invalid() {
        let err = parse_pipeline("image: [unterminated").unwrap_err();
        assert!(matches!(err, PipelineError::Invalid(_)));
    }

    #[test]
    fn missing_file_reports_missing() {
        let dir = tempfile::tempdir().expect("tmp");
        let err = load_pipeline(dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Missing));
    }

    #[test]
    fn prefers_yaml_over_yml() {
        let dir = tempfile::tempdir().expect("tmp");
        std::fs::write(dir.path().join(".octorunner.yaml"), "image: a\nscript: [\"x\"]\n")
            .expect("write yaml");
        std::fs::write(dir.path().join(".octorunner.yml"), "image: b\nscript: [\"y\"]\n")
            .expect("write yml");

        let spec = load_pipeline(dir.path()).expect("load");
        assert_eq!(spec.image, "a");
    }

    #[test]
    fn falls_back_to_yml() {
        let dir = tempfile::tempdir().expect("tmp");
        std::fs::write(dir.path().join(".octorunner.yml"), "image: b\nscript: [\"y\"]\n")
            .expect("write yml");

        let spec = load_pipeline(dir.path()).expect("load");
        assert_eq!(spec.image, "b");
    }
}
