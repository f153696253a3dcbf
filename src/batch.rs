//! Batch Orchestrator
//!
//! Discovers descriptors under a source root, filters them by path fragment,
//! mirrors each one into the destination root and runs Read → Classify → Write.
//! A failing file is logged and skipped; only batch-fatal errors stop the run.
//! The version registry is loaded once before the first file and saved once
//! after the last one.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::classify::Classifier;
use crate::config::{InputSource, MigrateConfig};
use crate::descriptor::{ProjectDescriptor, RawDescriptor};
use crate::error::{MigrateError, Result};
use crate::introspect::BuildTool;
use crate::reader::DescriptorReader;
use crate::registry::{PropertyNamer, VersionProps, VersionRegistry};
use crate::writer::DescriptorWriter;

// =============================================================================
// Path filter
// =============================================================================

/// Allow/deny list of path fragments
///
/// Fragments are matched as substrings of a descriptor's path relative to the
/// source root, normalised to `/`, so directories above the root never take
/// part. An empty allow-list accepts everything; the deny-list always wins.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl PathFilter {
    pub fn new<I, E>(include: I, exclude: E) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            include: include.into_iter().map(|f| normalize(f.as_ref())).collect(),
            exclude: exclude.into_iter().map(|f| normalize(f.as_ref())).collect(),
        }
    }

    pub fn from_config(config: &MigrateConfig) -> Self {
        Self::new(&config.filters.include, &config.filters.exclude)
    }

    /// Whether the root-relative `path` is eligible
    pub fn accepts(&self, path: &Path) -> bool {
        let path = normalize(&path.to_string_lossy());
        let included = self.include.is_empty() || self.include.iter().any(|f| path.contains(f.as_str()));
        included && !self.exclude.iter().any(|f| path.contains(f.as_str()))
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of one file's pipeline, reported as the batch progresses
#[derive(Debug)]
pub enum FileOutcome {
    Migrated { source: PathBuf, destination: PathBuf },
    Failed { source: PathBuf, error: MigrateError },
}

/// A file whose pipeline failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub source: PathBuf,
    pub kind: &'static str,
    pub message: String,
}

/// Summary of a batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Destination paths written
    pub migrated: Vec<PathBuf>,
    pub failed: Vec<FileFailure>,
    /// Descriptors rejected by the path filter
    pub skipped: Vec<PathBuf>,
    /// Non-fatal findings: unresolved versions, conflicts, name collisions
    pub warnings: Vec<String>,
    /// Where the version registry was saved
    pub registry_path: Option<PathBuf>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

// =============================================================================
// Migrator
// =============================================================================

/// Drives the per-file pipeline and owns the run's version registry
#[derive(Debug)]
pub struct Migrator {
    config: MigrateConfig,
    reader: DescriptorReader,
    classifier: Classifier,
    writer: DescriptorWriter,
    filter: PathFilter,
    namer: PropertyNamer,
    build_tool: Option<BuildTool>,
    registry: VersionRegistry,
    warnings: Vec<String>,
}

impl Migrator {
    pub fn new(config: MigrateConfig) -> Self {
        let build_tool = match config.input.source {
            InputSource::Descriptor => None,
            InputSource::Introspection | InputSource::Both => {
                Some(BuildTool::from_config(&config.introspection))
            }
        };
        Self {
            reader: DescriptorReader::from_config(&config),
            classifier: Classifier::from_config(&config),
            writer: DescriptorWriter::from_config(&config),
            filter: PathFilter::from_config(&config),
            namer: PropertyNamer::new(config.shared_properties.clone()),
            build_tool,
            registry: VersionRegistry::new(),
            warnings: Vec::new(),
            config,
        }
    }

    /// Versions recorded so far in this run
    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    /// Migrate every eligible descriptor under `source_root` into `destination_root`
    pub fn migrate_batch(&mut self, source_root: &Path, destination_root: &Path) -> Result<BatchReport> {
        self.migrate_batch_with(source_root, destination_root, |_| {})
    }

    /// Like [`Migrator::migrate_batch`], reporting each file as it completes
    pub fn migrate_batch_with<F>(
        &mut self,
        source_root: &Path,
        destination_root: &Path,
        mut on_outcome: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(&FileOutcome),
    {
        if !source_root.is_dir() {
            return Err(MigrateError::SourceRootMissing(source_root.to_path_buf()));
        }
        fs::create_dir_all(destination_root).map_err(|source| {
            MigrateError::DestinationRootUnavailable {
                path: destination_root.to_path_buf(),
                source,
            }
        })?;
        if let Some(tool) = &self.build_tool {
            tool.ensure_available()?;
        }

        let registry_path = destination_root.join(&self.config.registry.path);
        let mut props = VersionProps::load(&registry_path)?;
        let mut report = BatchReport::default();

        let candidates = self.discover(source_root);
        info!(
            source = %source_root.display(),
            destination = %destination_root.display(),
            candidates = candidates.len(),
            "Starting batch"
        );

        for source in candidates {
            let relative = source.strip_prefix(source_root).unwrap_or(&source);
            if !self.filter.accepts(relative) {
                debug!(path = %source.display(), "Excluded by path filter");
                report.skipped.push(source);
                continue;
            }
            let destination = destination_root.join(relative);

            let outcome = match self.migrate_file(&source, &destination, destination_root) {
                Ok(destination) => {
                    report.migrated.push(destination.clone());
                    FileOutcome::Migrated { source, destination }
                }
                Err(error) if error.is_batch_fatal() => {
                    error!(path = %source.display(), kind = error.kind(), "{}", error);
                    return Err(error);
                }
                Err(error) => {
                    error!(path = %source.display(), kind = error.kind(), "{}", error);
                    report.failed.push(FileFailure {
                        source: source.clone(),
                        kind: error.kind(),
                        message: error.to_string(),
                    });
                    FileOutcome::Failed { source, error }
                }
            };
            on_outcome(&outcome);
        }

        self.persist(&mut props, &registry_path)?;
        report.warnings.append(&mut self.warnings);
        report.registry_path = Some(registry_path);

        info!(
            migrated = report.migrated.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            warnings = report.warnings.len(),
            "Batch complete"
        );
        Ok(report)
    }

    /// Migrate one descriptor and persist the registry under `output_root`
    pub fn migrate_single(&mut self, source: &Path, destination: &Path, output_root: &Path) -> Result<PathBuf> {
        if let Some(tool) = &self.build_tool {
            tool.ensure_available()?;
        }
        let registry_path = output_root.join(&self.config.registry.path);
        let mut props = VersionProps::load(&registry_path)?;
        let written = self.migrate_file(source, destination, output_root)?;
        self.persist(&mut props, &registry_path)?;
        Ok(written)
    }

    /// Read → Classify → Write for one file
    ///
    /// Versions are recorded only once the migrated descriptor has been
    /// written, so a file that fails at any step leaves no trace in the registry.
    pub fn migrate_file(&mut self, source: &Path, destination: &Path, output_root: &Path) -> Result<PathBuf> {
        let raw = self.read(source)?;
        let classified = self.classifier.classify(raw)?;
        for warning in &classified.warnings {
            self.warnings.push(format!("{}: {}", source.display(), warning));
        }
        let written = self.writer.write(&classified.descriptor, destination, output_root)?;
        self.record(&classified.descriptor);
        Ok(written)
    }

    /// Whether `path` names a descriptor file by its extension
    pub fn is_descriptor_path(&self, path: &Path) -> bool {
        let extensions = self.descriptor_extensions();
        path.extension()
            .map(|ext| extensions.contains(&ext.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or(false)
    }

    fn descriptor_extensions(&self) -> Vec<String> {
        self.config
            .project
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect()
    }

    fn read(&self, source: &Path) -> Result<RawDescriptor> {
        let introspected = match &self.build_tool {
            Some(tool) => {
                if !source.is_file() {
                    return Err(MigrateError::MalformedInput {
                        path: source.to_path_buf(),
                        message: "project does not exist".to_string(),
                    });
                }
                let text = tool.introspect(source)?;
                Some(self.reader.read_introspection(&text, tool.skip_lines()))
            }
            None => None,
        };

        match (self.config.input.source, introspected) {
            (InputSource::Introspection, Some(raw)) => Ok(raw),
            (InputSource::Both, Some(introspected)) => {
                let mut raw = self.reader.read_file(source)?;
                raw.fill_from(introspected);
                Ok(raw)
            }
            _ => self.reader.read_file(source),
        }
    }

    fn record(&mut self, descriptor: &ProjectDescriptor) {
        for package in descriptor.discovered_versions() {
            let version = package.version.as_deref().unwrap_or_default();
            if let Some(conflict) = self.registry.record_version(&package.name, version) {
                self.warnings.push(conflict.to_string());
            }
        }
    }

    fn persist(&mut self, props: &mut VersionProps, path: &Path) -> Result<()> {
        for collision in props.merge(&self.registry, &self.namer) {
            self.warnings.push(collision.to_string());
        }
        for conflict in props.conflicts() {
            warn!("{}", conflict);
        }
        props.save(path)
    }

    /// Descriptor files under `root`, in a stable order
    fn discover(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| self.is_descriptor_path(entry.path()))
            .map(|entry| entry.into_path())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn descriptor(assembly: &str, package: &str, version: &str) -> String {
        format!(
            r#"<Project>
  <PropertyGroup><AssemblyName>{assembly}</AssemblyName></PropertyGroup>
  <ItemGroup>
    <Reference Include="{package}">
      <HintPath>..\packages\{package}.{version}\lib\{package}.dll</HintPath>
    </Reference>
  </ItemGroup>
</Project>
"#
        )
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_filter_allow_and_deny_fragments() {
        let filter = PathFilter::new(["Core"], ["Tools"]);
        assert!(filter.accepts(Path::new("src/Core/Sub/X.proj")));
        assert!(!filter.accepts(Path::new("src/Core/Tools/Y.proj")));
        assert!(!filter.accepts(Path::new("src/Editor/Z.proj")));
    }

    #[test]
    fn test_filter_normalizes_separators() {
        let filter = PathFilter::new(Vec::<String>::new(), [r"Platform\Tools\"]);
        assert!(!filter.accepts(Path::new(r"src\Platform\Tools\Build\B.csproj")));
        assert!(filter.accepts(Path::new("src/Platform/Text/T.csproj")));
    }

    #[test]
    fn test_filter_ignores_directories_above_source_root() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("Tools").join("CoreTeam").join("repo");
        write(&src.join("Core").join("X.csproj"), &descriptor("X", "Castle.Core", "4.2.1"));
        write(&src.join("Editor").join("Z.csproj"), &descriptor("Z", "Castle.Core", "4.2.1"));

        let mut config = MigrateConfig::default();
        config.filters.include = vec!["Core/".to_string()];
        config.filters.exclude = vec!["Tools".to_string()];

        let out = dir.path().join("out");
        let report = Migrator::new(config).migrate_batch(&src, &out).unwrap();
        assert_eq!(report.migrated, vec![out.join("Core").join("X.csproj")]);
        assert_eq!(report.skipped, vec![src.join("Editor").join("Z.csproj")]);
    }

    #[test]
    fn test_unusable_destination_root_aborts_batch() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src.join("A.csproj"), &descriptor("A", "Castle.Core", "4.2.1"));
        let blocker = dir.path().join("out");
        fs::write(&blocker, "not a directory").unwrap();

        let err = Migrator::new(MigrateConfig::default())
            .migrate_batch(&src, &blocker)
            .unwrap_err();
        assert_eq!(err.kind(), "DestinationRootUnavailable");
        assert!(err.is_batch_fatal());
    }

    #[test]
    fn test_failed_write_records_no_versions() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        write(&src.join("A").join("A.csproj"), &descriptor("A", "Castle.Core", "4.2.1"));
        write(&src.join("B").join("B.csproj"), &descriptor("B", "Newtonsoft.Json", "9.0.1"));
        // A directory where B's migrated file should go
        fs::create_dir_all(out.join("B").join("B.csproj")).unwrap();

        let mut migrator = Migrator::new(MigrateConfig::default());
        let report = migrator.migrate_batch(&src, &out).unwrap();
        assert_eq!(report.migrated, vec![out.join("A").join("A.csproj")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].kind, "DestinationUnwritable");

        let props = VersionProps::load(out.join("build").join("versions.props")).unwrap();
        assert!(props.versions("CastleCore").is_some());
        assert!(props.versions("NewtonsoftJson").is_none());
    }

    #[test]
    fn test_failed_single_file_records_no_versions() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("A.csproj");
        write(&source, &descriptor("A", "Castle.Core", "4.2.1"));
        let destination = dir.path().join("out").join("A.csproj");
        fs::create_dir_all(&destination).unwrap();

        let mut migrator = Migrator::new(MigrateConfig::default());
        let err = migrator
            .migrate_single(&source, &destination, dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), "DestinationUnwritable");
        assert!(migrator.registry().is_empty());
        assert!(!dir.path().join("build").join("versions.props").exists());
    }

    #[test]
    fn test_descriptor_path_by_extension() {
        let migrator = Migrator::new(MigrateConfig::default());
        assert!(migrator.is_descriptor_path(Path::new("Missing.csproj")));
        assert!(migrator.is_descriptor_path(Path::new(r"src\Core\Core.CSPROJ")));
        assert!(!migrator.is_descriptor_path(Path::new("src/Core")));
    }

    #[test]
    fn test_missing_single_file_is_malformed_input() {
        let dir = tempdir().unwrap();
        let mut migrator = Migrator::new(MigrateConfig::default());
        let err = migrator
            .migrate_single(
                &dir.path().join("Missing.csproj"),
                &dir.path().join("out").join("New.csproj"),
                dir.path(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "MalformedInput");
        assert!(!err.is_batch_fatal());
    }

    #[cfg(unix)]
    #[test]
    fn test_both_inputs_fill_gaps_from_tool_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let tool = dir.path().join("msbuild.sh");
        fs::write(
            &tool,
            "#!/bin/sh\necho 'Build banner'\necho 'AssemblyName:FromTool'\necho 'RootNamespace:Contoso.Tool'\n",
        )
        .unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let src = dir.path().join("src");
        write(&src.join("A.csproj"), &descriptor("FromFile", "Castle.Core", "4.2.1"));

        let mut config = MigrateConfig::default();
        config.input.source = InputSource::Both;
        config.introspection.tool = tool;
        config.introspection.skip_lines = 1;

        let out = dir.path().join("out");
        let report = Migrator::new(config).migrate_batch(&src, &out).unwrap();
        assert!(report.is_clean());

        let migrated = fs::read_to_string(out.join("A.csproj")).unwrap();
        assert!(migrated.contains("<AssemblyName>FromFile</AssemblyName>"));
        assert!(migrated.contains("<RootNamespace>Contoso.Tool</RootNamespace>"));
        assert!(migrated.contains("Version=\"$(CastleCore)\""));
    }

    #[test]
    fn test_missing_source_root_is_fatal() {
        let dir = tempdir().unwrap();
        let mut migrator = Migrator::new(MigrateConfig::default());
        let err = migrator
            .migrate_batch(&dir.path().join("missing"), &dir.path().join("out"))
            .unwrap_err();
        assert_eq!(err.kind(), "SourceRootMissing");
    }

    #[test]
    fn test_unavailable_build_tool_aborts_batch() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("A.csproj"), "<Project />").unwrap();

        let mut config = MigrateConfig::default();
        config.input.source = InputSource::Introspection;
        config.introspection.tool = dir.path().join("missing").join("MSBuild.exe");

        let mut migrator = Migrator::new(config);
        let err = migrator.migrate_batch(dir.path(), &dir.path().join("out")).unwrap_err();
        assert_eq!(err.kind(), "BuildToolUnavailable");
    }

    #[test]
    fn test_discover_filters_by_extension() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b").join("B.csproj"), "").unwrap();
        fs::write(dir.path().join("A.CSPROJ"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let migrator = Migrator::new(MigrateConfig::default());
        let found = migrator.discover(dir.path());
        assert_eq!(found, vec![dir.path().join("A.CSPROJ"), dir.path().join("b").join("B.csproj")]);
    }
}
