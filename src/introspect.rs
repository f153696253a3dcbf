//! Build tool introspection
//!
//! Runs the external build tool against one descriptor with a target that
//! prints the evaluated project as `Key:value` lines. The output is parsed by
//! [`DescriptorReader::read_introspection`](crate::reader::DescriptorReader::read_introspection).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::config::IntrospectionConfig;
use crate::error::{MigrateError, Result};

/// The external build tool
#[derive(Debug, Clone)]
pub struct BuildTool {
    tool: PathBuf,
    target: String,
    skip_lines: usize,
}

impl BuildTool {
    pub fn new(tool: impl Into<PathBuf>, target: impl Into<String>, skip_lines: usize) -> Self {
        Self {
            tool: tool.into(),
            target: target.into(),
            skip_lines,
        }
    }

    pub fn from_config(config: &IntrospectionConfig) -> Self {
        Self::new(&config.tool, &config.target, config.skip_lines)
    }

    pub fn skip_lines(&self) -> usize {
        self.skip_lines
    }

    /// Fail early when the tool is configured by path and the path is missing
    ///
    /// A bare program name is resolved through `PATH` when it is spawned.
    pub fn ensure_available(&self) -> Result<()> {
        let by_path = self.tool.components().count() > 1 || self.tool.is_absolute();
        if by_path && !self.tool.exists() {
            return Err(MigrateError::BuildToolUnavailable(self.tool.clone()));
        }
        Ok(())
    }

    /// Run the introspection target and return its standard output
    pub fn introspect(&self, project: &Path) -> Result<String> {
        self.ensure_available()?;
        debug!(tool = %self.tool.display(), project = %project.display(), "Running build tool");

        let output = Command::new(&self.tool)
            .arg(project)
            .arg(format!("/t:{}", self.target))
            .arg("/v:m")
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => MigrateError::BuildToolUnavailable(self.tool.clone()),
                _ => MigrateError::IntrospectionFailed {
                    path: project.to_path_buf(),
                    message: format!("failed to run {}: {}", self.tool.display(), e),
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(MigrateError::IntrospectionFailed {
                path: project.to_path_buf(),
                message: format!("{} ({})", detail.trim(), output.status),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
