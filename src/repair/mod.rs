//! External OCR/repair tool integration.
//!
//! The repair pipeline is an opaque external capability: one command
//! extracts structured metadata from a PDF, another removes watermarks
//! and trims pages. Both speak JSON on stdout and report failure through
//! a non-zero exit with details on stderr. The trait keeps the worker's
//! state machine independent of the tool, so an in-process library can
//! replace the subprocess later.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;

use crate::metadata::StructuredMetadata;

/// Repair pipeline failure.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("repair tool '{0}' not found")]
    ToolNotFound(String),
    #[error("repair tool failed: {0}")]
    Failed(String),
    #[error("unusable tool output: {0}")]
    Output(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata extracted from a document by the external tool.
#[derive(Debug, Clone)]
pub struct ExtractOutput {
    pub metadata: StructuredMetadata,
}

/// Result of the watermark-removal/trim step.
#[derive(Debug, Clone)]
pub struct RepairOutput {
    /// Path of the trimmed document; may equal the input path when the
    /// tool repairs in place.
    pub trimmed: PathBuf,
}

/// Capability interface over the external repair pipeline.
#[async_trait]
pub trait RepairTool: Send + Sync {
    /// Extract structured metadata from the document.
    async fn extract(&self, input: &Path) -> Result<ExtractOutput, RepairError>;

    /// Remove watermarks / trim pages, producing the path of the result.
    async fn repair(
        &self,
        input: &Path,
        metadata: &StructuredMetadata,
    ) -> Result<RepairOutput, RepairError>;
}

/// Wire shape of the repair command's stdout.
#[derive(Debug, Deserialize)]
struct RepairResponse {
    success: bool,
    #[serde(default)]
    trimmed: Option<PathBuf>,
    #[serde(default)]
    error: Option<String>,
}

/// Subprocess-backed repair tool.
pub struct CommandRepairTool {
    extract_command: Vec<String>,
    repair_command: Vec<String>,
    format: String,
}

impl CommandRepairTool {
    pub fn new(extract_command: Vec<String>, repair_command: Vec<String>, format: String) -> Self {
        Self {
            extract_command,
            repair_command,
            format,
        }
    }

    async fn run(argv: &[String], extra: &[&str]) -> Result<Vec<u8>, RepairError> {
        let program = argv
            .first()
            .ok_or_else(|| RepairError::Output("empty command".to_string()))?;

        let output = Command::new(program)
            .args(&argv[1..])
            .args(extra)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => Ok(output.stdout),
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let detail = if stderr.is_empty() {
                    format!("exit status {}", output.status)
                } else {
                    stderr
                };
                Err(RepairError::Failed(detail))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RepairError::ToolNotFound(program.clone()))
            }
            Err(e) => Err(RepairError::Io(e)),
        }
    }
}

#[async_trait]
impl RepairTool for CommandRepairTool {
    async fn extract(&self, input: &Path) -> Result<ExtractOutput, RepairError> {
        let input = input.to_string_lossy().to_string();
        let stdout = Self::run(&self.extract_command, &[&input]).await?;
        let metadata: StructuredMetadata = serde_json::from_slice(&stdout)
            .map_err(|e| RepairError::Output(format!("extract output is not metadata: {e}")))?;
        Ok(ExtractOutput { metadata })
    }

    async fn repair(
        &self,
        input: &Path,
        metadata: &StructuredMetadata,
    ) -> Result<RepairOutput, RepairError> {
        let input = input.to_string_lossy().to_string();
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| RepairError::Output(e.to_string()))?;

        let stdout = Self::run(
            &self.repair_command,
            &[&input, "-f", &self.format, "-m", &metadata_json],
        )
        .await?;

        let response: RepairResponse = serde_json::from_slice(&stdout)
            .map_err(|e| RepairError::Output(format!("repair output is not JSON: {e}")))?;

        if !response.success {
            return Err(RepairError::Failed(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        let trimmed = response
            .trimmed
            .ok_or_else(|| RepairError::Output("repair reported success without a path".to_string()))?;
        Ok(RepairOutput { trimmed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_tool_not_found() {
        let tool = CommandRepairTool::new(
            vec!["definitely-not-a-real-binary-pv".to_string()],
            vec!["also-not-real-pv".to_string()],
            "doc-repair".to_string(),
        );
        let err = tool.extract(Path::new("/tmp/in.pdf")).await.unwrap_err();
        assert!(matches!(err, RepairError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        // `sh -c` gives us a deterministic failing tool.
        let tool_cmd = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo 'boom' >&2; exit 3".to_string(),
        ];
        let tool = CommandRepairTool::new(tool_cmd, vec![], "doc-repair".to_string());
        let err = tool.extract(Path::new("/tmp/in.pdf")).await.unwrap_err();
        match err {
            RepairError::Failed(detail) => assert!(detail.contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn extract_parses_metadata_json() {
        let tool_cmd = vec![
            "sh".to_string(),
            "-c".to_string(),
            r#"echo '{"semester":"sem-3","branch":"cse","subject":"dbms","paperType":"notes"}'"#
                .to_string(),
        ];
        let tool = CommandRepairTool::new(tool_cmd, vec![], "doc-repair".to_string());
        let out = tool.extract(Path::new("/tmp/in.pdf")).await.unwrap();
        assert_eq!(out.metadata.subject, "dbms");
    }
}
