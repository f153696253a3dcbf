//! Version Registry
//!
//! Centralises third-party package versions. During a batch every classified
//! package reference is recorded in a [`VersionRegistry`] keyed by package name.
//! At the end of the batch the run is merged into the persisted [`VersionProps`]
//! (one MSBuild property per package) and written back exactly once.
//!
//! Conflicts are never resolved: a property that ends up with several versions
//! keeps all of them and is reported on save.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use semver::Version;
use tracing::{debug, info, warn};

use crate::classify::TOKEN_PREFIX;
use crate::config::SharedPropertyConfig;
use crate::error::{MigrateError, Result};
use crate::xml;

/// Namespace of the persisted props file
pub const MSBUILD_NAMESPACE: &str = "http://schemas.microsoft.com/developer/msbuild/2003";

/// Derive a property name from a package name by dropping punctuation
///
/// `Newtonsoft.Json` → `NewtonsoftJson`. A leading digit gets an underscore so
/// the result stays a valid property identifier. The mapping is not injective;
/// collisions are detected by [`VersionProps::merge`].
pub fn property_name_for(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| c.is_alphanumeric()).collect();
    match stripped.chars().next() {
        Some(first) if first.is_alphabetic() => stripped,
        _ => format!("_{}", stripped),
    }
}

/// Maps package names to property names, honouring shared prefixes
#[derive(Debug, Clone, Default)]
pub struct PropertyNamer {
    shared: Vec<SharedPropertyConfig>,
}

impl PropertyNamer {
    pub fn new(shared: Vec<SharedPropertyConfig>) -> Self {
        Self { shared }
    }

    /// Shared property for `name`, if its prefix is configured
    pub fn shared_property(&self, name: &str) -> Option<&str> {
        self.shared
            .iter()
            .find(|s| name.starts_with(&s.prefix))
            .map(|s| s.property.as_str())
    }

    pub fn property_name(&self, name: &str) -> String {
        self.shared_property(name)
            .map(str::to_string)
            .unwrap_or_else(|| property_name_for(name))
    }

    /// Indirection token for a package, e.g. `$(NewtonsoftJson)`
    pub fn token(&self, name: &str) -> String {
        format!("{}{})", TOKEN_PREFIX, self.property_name(name))
    }
}

/// Add `version` to a version set
///
/// The empty version recorded for an unresolved reference is a value like any
/// other; a later concrete version sits beside it and shows up as a conflict.
fn insert_version(versions: &mut BTreeSet<String>, version: &str) -> bool {
    versions.insert(version.trim().to_string())
}

// =============================================================================
// Run accumulator
// =============================================================================

/// Package versions observed during one batch
#[derive(Debug, Clone, Default)]
pub struct VersionRegistry {
    /// package name → versions
    packages: BTreeMap<String, BTreeSet<String>>,
}

impl VersionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a version for a package (idempotent)
    ///
    /// Returns a `VersionConflict` when the package now has more than one
    /// version; the conflict is logged and both versions are kept.
    pub fn record_version(&mut self, name: &str, version: &str) -> Option<MigrateError> {
        let versions = self.packages.entry(name.to_string()).or_default();
        if !insert_version(versions, version) || versions.len() < 2 {
            return None;
        }
        let conflict = MigrateError::VersionConflict {
            property: name.to_string(),
            versions: versions.iter().cloned().collect(),
        };
        warn!("{}", conflict);
        Some(conflict)
    }

    pub fn versions(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.packages.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.packages.iter().map(|(name, versions)| (name.as_str(), versions))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

// =============================================================================
// Persisted registry
// =============================================================================

/// The persisted property list (`build/versions.props`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionProps {
    /// property name → versions
    properties: BTreeMap<String, BTreeSet<String>>,
}

impl VersionProps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a previously saved registry; a missing file yields an empty one
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No existing version registry");
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let root = xml::parse(&content).map_err(|e| MigrateError::MalformedInput {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut props = Self::new();
        for group in root.children_named("PropertyGroup") {
            for property in &group.children {
                props.insert(&property.name, &property.text);
            }
        }
        info!(path = %path.display(), properties = props.len(), "Loaded version registry");
        Ok(props)
    }

    pub fn insert(&mut self, property: &str, version: &str) -> bool {
        insert_version(self.properties.entry(property.to_string()).or_default(), version)
    }

    /// Merge a run into this registry
    ///
    /// Every (package, version) pair is added under its derived property name.
    /// Returns `PropertyNameCollision` diagnostics for distinct packages that
    /// derive the same (non-shared) property name.
    pub fn merge(&mut self, run: &VersionRegistry, namer: &PropertyNamer) -> Vec<MigrateError> {
        let mut sources: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
        for (name, versions) in run.iter() {
            let property = namer.property_name(name);
            for version in versions {
                self.insert(&property, version);
            }
            if namer.shared_property(name).is_none() {
                sources.entry(property).or_default().insert(name);
            }
        }

        sources
            .into_iter()
            .filter(|(_, packages)| packages.len() > 1)
            .map(|(property, packages)| {
                let collision = MigrateError::PropertyNameCollision {
                    property,
                    packages: packages.into_iter().map(str::to_string).collect(),
                };
                warn!("{}", collision);
                collision
            })
            .collect()
    }

    pub fn versions(&self, property: &str) -> Option<&BTreeSet<String>> {
        self.properties.get(property)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Properties holding more than one version
    pub fn conflicts(&self) -> Vec<MigrateError> {
        self.properties
            .iter()
            .filter(|(_, versions)| versions.len() > 1)
            .map(|(property, versions)| MigrateError::VersionConflict {
                property: property.clone(),
                versions: versions.iter().cloned().collect(),
            })
            .collect()
    }

    /// Render the props document, sorted by property name
    ///
    /// Warnings are logged for every line of a multi-version property and for
    /// every empty version.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "<Project xmlns=\"{}\">", MSBUILD_NAMESPACE);
        out.push_str("  <PropertyGroup>\n");
        for (property, versions) in &self.properties {
            if versions.len() > 1 {
                if let Some(highest) = highest(versions) {
                    warn!(property = %property, highest = %highest, "Package is referenced by multiple versions");
                }
            }
            for version in versions {
                if versions.len() > 1 {
                    warn!(property = %property, version = %version, "Package is referenced by multiple versions");
                }
                if version.trim().is_empty() {
                    warn!(property = %property, "Package does not specify a version");
                }
                let _ = writeln!(out, "    <{0}>{1}</{0}>", property, xml::escape(version));
            }
        }
        out.push_str("  </PropertyGroup>\n");
        out.push_str("</Project>\n");
        out
    }

    /// Write the registry, replacing any previous file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| MigrateError::DestinationUnwritable {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, self.render()).map_err(|source| MigrateError::DestinationUnwritable {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), properties = self.len(), "Saved version registry");
        Ok(())
    }
}

/// Highest version of a set: semver order when every version parses, lexical otherwise
fn highest(versions: &BTreeSet<String>) -> Option<&str> {
    let parsed: Option<Vec<(Version, &str)>> = versions
        .iter()
        .map(|v| Version::parse(v).ok().map(|parsed| (parsed, v.as_str())))
        .collect();
    match parsed {
        Some(parsed) => parsed.into_iter().max_by(|a, b| a.0.cmp(&b.0)).map(|(_, v)| v),
        None => versions.iter().next_back().map(String::as_str),
    }
}
