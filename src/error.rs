//! Error types for project migration

use std::path::PathBuf;

use thiserror::Error;

/// Result type for migration operations
pub type Result<T> = std::result::Result<T, MigrateError>;

/// Migration errors
///
/// Per-file kinds abort the pipeline of one descriptor only. Batch-fatal kinds
/// (see [`MigrateError::is_batch_fatal`]) abort the whole run. The warning kinds
/// (`UnresolvableVersion`, `VersionConflict`, `PropertyNameCollision`) are carried
/// as values and logged; they are never returned from a pipeline step.
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Malformed input {path}: {message}")]
    MalformedInput { path: PathBuf, message: String },

    #[error("Missing required field: {field}")]
    MissingRequiredField { field: &'static str },

    #[error("Reference has no name: {include:?}")]
    MalformedReference { include: String },

    /// `hint_path` is `None` for a `PackageReference` written without a version
    #[error("Unable to resolve a version for {name}{}", hint_path_suffix(hint_path))]
    UnresolvableVersion { name: String, hint_path: Option<String> },

    #[error("Destination directory cannot be created: {0}")]
    DirectoryMissing(PathBuf),

    #[error("Destination {path} is not writable: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Property {property} is referenced by multiple versions: {}", versions.join(", "))]
    VersionConflict { property: String, versions: Vec<String> },

    #[error("Packages {} all map to property {property}", packages.join(", "))]
    PropertyNameCollision { property: String, packages: Vec<String> },

    #[error("Build tool not found at {0}")]
    BuildToolUnavailable(PathBuf),

    #[error("Introspection of {path} failed: {message}")]
    IntrospectionFailed { path: PathBuf, message: String },

    #[error("Source root does not exist: {0}")]
    SourceRootMissing(PathBuf),

    #[error("Cannot create destination root {path}: {source}")]
    DestinationRootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error: {0}")]
    Xml(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    /// Stable short name of the error kind, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            MigrateError::MalformedInput { .. } => "MalformedInput",
            MigrateError::MissingRequiredField { .. } => "MissingRequiredField",
            MigrateError::MalformedReference { .. } => "MalformedReference",
            MigrateError::UnresolvableVersion { .. } => "UnresolvableVersion",
            MigrateError::DirectoryMissing(_) => "DirectoryMissing",
            MigrateError::DestinationUnwritable { .. } => "DestinationUnwritable",
            MigrateError::VersionConflict { .. } => "VersionConflict",
            MigrateError::PropertyNameCollision { .. } => "PropertyNameCollision",
            MigrateError::BuildToolUnavailable(_) => "BuildToolUnavailable",
            MigrateError::IntrospectionFailed { .. } => "IntrospectionFailed",
            MigrateError::SourceRootMissing(_) => "SourceRootMissing",
            MigrateError::DestinationRootUnavailable { .. } => "DestinationRootUnavailable",
            MigrateError::Xml(_) => "Xml",
            MigrateError::Io(_) => "Io",
        }
    }

    /// Whether this error must stop the whole batch rather than one file
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            MigrateError::BuildToolUnavailable(_)
                | MigrateError::IntrospectionFailed { .. }
                | MigrateError::SourceRootMissing(_)
                | MigrateError::DestinationRootUnavailable { .. }
        )
    }
}

fn hint_path_suffix(hint_path: &Option<String>) -> String {
    match hint_path {
        Some(path) => format!(" from hint path {}", path),
        None => " (PackageReference has no Version)".to_string(),
    }
}
