//! Legacy Project Migration
//!
//! Converts legacy XML build-project descriptors (the 2003 MSBuild schema) into
//! the SDK-style schema. External package versions are lifted out of each
//! descriptor into a shared version registry and referenced through `$(Name)`
//! tokens, so one file governs the version of every package across the tree.
//!
//! ## Pipeline
//!
//! ```text
//! source root
//! └── **/*.csproj ──► reader ──► classify ──► writer ──► destination root
//!       (batch)        │            │                    ├── **/*.csproj
//!                      │            └──► registry ─────► └── build/versions.props
//!                      └── introspect (optional build-tool evaluation)
//! ```
//!
//! - **reader**: descriptor file (or build-tool output) → [`RawDescriptor`]
//! - **classify**: raw references → SDK / external / project, version inference
//! - **registry**: cross-project version accumulator and its persisted form
//! - **writer**: [`ProjectDescriptor`] → SDK-style markup
//! - **batch**: discovery, filtering, continue-on-error orchestration

pub mod batch;
pub mod classify;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod introspect;
pub mod reader;
pub mod registry;
pub mod writer;
pub mod xml;

pub use batch::{BatchReport, FileFailure, FileOutcome, Migrator, PathFilter};
pub use classify::{extract_version, Classified, Classifier, SubstitutionTable};
pub use config::{InputSource, MigrateConfig};
pub use descriptor::{ProjectDescriptor, RawDescriptor, RawReference, Reference};
pub use error::{MigrateError, Result};
pub use introspect::BuildTool;
pub use reader::DescriptorReader;
pub use registry::{VersionProps, VersionRegistry};
pub use writer::DescriptorWriter;
