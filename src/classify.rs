//! Reference Classification
//!
//! Turns the untyped reference nodes of a [`RawDescriptor`] into tagged
//! [`Reference`] variants, in this order of precedence:
//!
//! 1. `ProjectReference` nodes (and references to descriptor files) → `Project`
//! 2. Names listed in the [`SubstitutionTable`] → `Pinned` / `LocalFile`
//! 3. Versions already written as `$(Property)` → `Migrated`
//! 4. `PackageReference` nodes with a literal version → `Package` (or `Pinned`
//!    when the pair is one of the table's fixed replacements)
//! 5. `Reference` nodes without a hint path → `Sdk`
//! 6. `Reference` nodes with a hint path → `Package`, version recovered from the
//!    packages-cache directory name in the hint path
//!
//! Version recovery is a pure function ([`extract_version`]) so the pattern can be
//! tested on its own.

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::config::{MigrateConfig, PinnedPackage, SubstitutionConfig};
use crate::descriptor::{
    ExternalReference, ProjectDescriptor, RawDescriptor, RawReference, Reference, ReferenceElement,
};
use crate::error::{MigrateError, Result};

/// Opening sequence of an indirection token, e.g. `$(NewtonsoftJson)`
pub const TOKEN_PREFIX: &str = "$(";

// =============================================================================
// Version extraction
// =============================================================================

/// Recover a package version from a hint path
///
/// Matches a directory segment made of the package name, a dot, then a
/// dot-separated run that starts with a digit and ends in numeric groups with an
/// optional `-prerelease` tag, bounded by path separators:
/// `..\packages\Foo.Bar.1.2.3\lib\net45\Foo.Bar.dll` yields `1.2.3` for `Foo.Bar`.
/// The result is passed through [`normalize_version`].
pub fn extract_version(name: &str, hint_path: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    match version_pattern(name) {
        Ok(re) => capture_version(&re, hint_path),
        Err(e) => {
            warn!(package = %name, "Invalid version pattern: {}", e);
            None
        }
    }
}

/// Compile the hint-path pattern used by [`extract_version`] for one package name
pub fn version_pattern(name: &str) -> std::result::Result<Regex, regex::Error> {
    let pattern = format!(
        r"(?:^|[\\/]){}\.(\d[A-Za-z0-9]*(?:\.[A-Za-z0-9]+)*?\.\d+(?:\.\d+)*(?:-[A-Za-z0-9]+(?:[.-][A-Za-z0-9]+)*)?)(?:[\\/]|$)",
        regex::escape(name)
    );
    RegexBuilder::new(&pattern).case_insensitive(true).build()
}

fn capture_version(re: &Regex, hint_path: &str) -> Option<String> {
    let captures = re.captures(hint_path)?;
    captures.get(1).map(|m| normalize_version(m.as_str()))
}

/// Keep only the last three dotted components of a long version
///
/// Compound interop encodings such as `14.0.DesignTime.15.0.25726-Preview5`
/// carry the real package version in their tail. The pre-release tag is split
/// off first so its own dots are never counted.
pub fn normalize_version(version: &str) -> String {
    let (core, tag) = match version.split_once('-') {
        Some((core, tag)) => (core, Some(tag)),
        None => (version, None),
    };
    let components: Vec<&str> = core.split('.').collect();
    if components.len() <= 3 {
        return version.to_string();
    }
    let mut normalized = components[components.len() - 3..].join(".");
    if let Some(tag) = tag {
        normalized.push('-');
        normalized.push_str(tag);
    }
    normalized
}

/// Whether a value is already an indirection token
pub fn is_token(value: &str) -> bool {
    let value = value.trim();
    value.starts_with(TOKEN_PREFIX) && value.ends_with(')')
}

// =============================================================================
// Substitution table
// =============================================================================

/// Replacement for a special-cased legacy reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// One or more packages with hard-coded versions
    Packages(Vec<PinnedPackage>),
    /// Direct reference to a vendored binary
    LocalFile(String),
}

/// Immutable map from legacy reference name to its replacement
#[derive(Debug, Clone, Default)]
pub struct SubstitutionTable {
    entries: HashMap<String, Replacement>,
}

impl SubstitutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from configuration entries
    ///
    /// Entries that set both or neither of `packages` / `local_file` are
    /// ambiguous and skipped with a warning.
    pub fn from_config(entries: &[SubstitutionConfig]) -> Self {
        let mut table = Self::new();
        for entry in entries {
            let replacement = match (entry.packages.is_empty(), &entry.local_file) {
                (false, None) => Replacement::Packages(entry.packages.clone()),
                (true, Some(path)) => Replacement::LocalFile(path.clone()),
                _ => {
                    warn!(
                        reference = %entry.reference,
                        "Substitution must set exactly one of packages or local_file; skipping"
                    );
                    continue;
                }
            };
            table = table.with(&entry.reference, replacement);
        }
        table
    }

    pub fn with(mut self, reference: &str, replacement: Replacement) -> Self {
        self.entries.insert(reference.to_string(), replacement);
        self
    }

    pub fn get(&self, reference: &str) -> Option<&Replacement> {
        self.entries.get(reference)
    }

    /// Whether `name`/`version` is one of the fixed replacement packages
    pub fn is_pinned(&self, name: &str, version: &str) -> bool {
        self.entries.values().any(|replacement| match replacement {
            Replacement::Packages(packages) => packages
                .iter()
                .any(|p| p.name == name && p.version == version),
            Replacement::LocalFile(_) => false,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Classifier
// =============================================================================

/// Classification result for one descriptor
#[derive(Debug)]
pub struct Classified {
    pub descriptor: ProjectDescriptor,
    /// Non-fatal findings (`UnresolvableVersion`)
    pub warnings: Vec<MigrateError>,
}

/// Reference classifier
#[derive(Debug, Clone)]
pub struct Classifier {
    substitutions: SubstitutionTable,
    /// Lower-cased descriptor extensions, without the dot
    descriptor_extensions: Vec<String>,
    /// Compiled version patterns by package name
    patterns: RefCell<HashMap<String, Regex>>,
}

impl Classifier {
    pub fn new(substitutions: SubstitutionTable, descriptor_extensions: &[String]) -> Self {
        Self {
            substitutions,
            descriptor_extensions: descriptor_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            patterns: RefCell::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &MigrateConfig) -> Self {
        Self::new(
            SubstitutionTable::from_config(&config.substitutions),
            &config.project.extensions,
        )
    }

    /// Classify every reference of a raw descriptor
    ///
    /// Fails with `MissingRequiredField` when the assembly name is absent and with
    /// `MalformedReference` when a reference has no name.
    pub fn classify(&self, raw: RawDescriptor) -> Result<Classified> {
        let assembly_name = raw
            .assembly_name
            .filter(|name| !name.trim().is_empty())
            .ok_or(MigrateError::MissingRequiredField { field: "AssemblyName" })?;

        let mut references = Vec::with_capacity(raw.references.len());
        let mut warnings = Vec::new();
        for reference in &raw.references {
            references.extend(self.classify_reference(reference, &mut warnings)?);
        }

        debug!(
            assembly = %assembly_name,
            references = references.len(),
            warnings = warnings.len(),
            "Classified descriptor"
        );

        Ok(Classified {
            descriptor: ProjectDescriptor {
                assembly_name: assembly_name.trim().to_string(),
                root_namespace: raw.root_namespace,
                no_warn_codes: raw.no_warn_codes,
                cls_compliant_flag: raw.cls_compliant_flag,
                shipping_assembly_flag: raw.shipping_assembly_flag,
                references,
                other_files: raw.other_files,
                embedded_resources: raw.embedded_resources,
            },
            warnings,
        })
    }

    /// Classify one reference node; substitutions may expand it into several
    pub fn classify_reference(
        &self,
        raw: &RawReference,
        warnings: &mut Vec<MigrateError>,
    ) -> Result<Vec<Reference>> {
        let name = raw.name();
        if name.is_empty() {
            return Err(MigrateError::MalformedReference {
                include: raw.include.clone(),
            });
        }

        if raw.element == ReferenceElement::ProjectReference || self.is_descriptor_path(name) {
            return Ok(vec![Reference::Project {
                path: raw.include.trim().to_string(),
            }]);
        }

        if let Some(replacement) = self.substitutions.get(name) {
            debug!(reference = %name, "Applying substitution");
            return Ok(match replacement {
                Replacement::Packages(packages) => packages
                    .iter()
                    .map(|p| Reference::Pinned {
                        name: p.name.clone(),
                        version: p.version.clone(),
                    })
                    .collect(),
                Replacement::LocalFile(path) => vec![Reference::LocalFile {
                    name: name.to_string(),
                    path: path.clone(),
                }],
            });
        }

        let reference = match (raw.element, raw.version.as_deref(), raw.hint_path.as_deref()) {
            (_, Some(version), _) if is_token(version) => Reference::Migrated {
                name: name.to_string(),
                token: version.trim().to_string(),
            },
            (ReferenceElement::PackageReference, Some(version), _) => {
                let version = version.trim();
                if self.substitutions.is_pinned(name, version) {
                    Reference::Pinned {
                        name: name.to_string(),
                        version: version.to_string(),
                    }
                } else {
                    package(name, Some(version.to_string()))
                }
            }
            (ReferenceElement::PackageReference, None, _) => {
                warn!(package = %name, "PackageReference has no version");
                warnings.push(MigrateError::UnresolvableVersion {
                    name: name.to_string(),
                    hint_path: None,
                });
                package(name, None)
            }
            (_, _, None) => Reference::Sdk {
                name: name.to_string(),
            },
            (_, _, Some(hint_path)) => {
                let version = self.version_from_hint_path(name, hint_path);
                if version.is_none() {
                    warn!(reference = %name, hint_path, "Unable to get version from hint path");
                    warnings.push(MigrateError::UnresolvableVersion {
                        name: name.to_string(),
                        hint_path: Some(hint_path.to_string()),
                    });
                }
                package(name, version)
            }
        };
        Ok(vec![reference])
    }

    /// [`extract_version`] with the compiled pattern kept per package name
    fn version_from_hint_path(&self, name: &str, hint_path: &str) -> Option<String> {
        let mut patterns = self.patterns.borrow_mut();
        let re = match patterns.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => match version_pattern(name) {
                Ok(re) => entry.insert(re),
                Err(e) => {
                    warn!(package = %name, "Invalid version pattern: {}", e);
                    return None;
                }
            },
        };
        capture_version(re, hint_path)
    }

    fn is_descriptor_path(&self, include: &str) -> bool {
        include
            .rsplit_once('.')
            .map(|(_, ext)| self.descriptor_extensions.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false)
    }
}

fn package(name: &str, version: Option<String>) -> Reference {
    Reference::Package(ExternalReference {
        name: name.to_string(),
        version,
    })
}
