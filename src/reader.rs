//! Descriptor Reader
//!
//! Two raw input forms feed the same [`RawDescriptor`]:
//! - the descriptor file itself, parsed as an element tree
//! - `Key:value` lines printed by the build tool's introspection target
//!
//! Infrastructure-only includes (`packages.config`, `app.config`) are skipped
//! here so they never reach classification.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::MigrateConfig;
use crate::descriptor::{EmbeddedResource, RawDescriptor, RawReference, ReferenceElement};
use crate::error::{MigrateError, Result};
use crate::xml::{self, Element};

/// Reads descriptors in either input form
#[derive(Debug, Clone, Default)]
pub struct DescriptorReader {
    /// Lower-cased file names to drop
    skip_includes: Vec<String>,
}

impl DescriptorReader {
    pub fn new(skip_includes: &[String]) -> Self {
        Self {
            skip_includes: skip_includes.iter().map(|s| s.to_ascii_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &MigrateConfig) -> Self {
        Self::new(&config.project.skip_includes)
    }

    /// Parse a descriptor file
    pub fn read_file(&self, path: &Path) -> Result<RawDescriptor> {
        let content = fs::read_to_string(path).map_err(|e| MigrateError::MalformedInput {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let root = xml::parse(&content).map_err(|e| MigrateError::MalformedInput {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.read_tree(&root, path)
    }

    /// Extract a descriptor from a parsed element tree
    ///
    /// Accepts both the legacy schema and the new one, so already migrated
    /// descriptors read back to the same model.
    pub fn read_tree(&self, root: &Element, path: &Path) -> Result<RawDescriptor> {
        if root.name != "Project" {
            return Err(MigrateError::MalformedInput {
                path: path.to_path_buf(),
                message: format!("expected <Project> root element, found <{}>", root.name),
            });
        }

        let mut raw = RawDescriptor::default();

        for group in root.children_named("PropertyGroup") {
            set_once(&mut raw.assembly_name, group.value("AssemblyName"));
            set_once(&mut raw.root_namespace, group.value("RootNamespace"));
            set_once(&mut raw.no_warn_codes, group.value("NoWarn"));
            set_once(&mut raw.cls_compliant_flag, group.value("CLSCompliant"));
            set_once(&mut raw.shipping_assembly_flag, group.value("ShippingAssembly"));
        }

        for group in root.children_named("ItemGroup") {
            for item in &group.children {
                let Some(include) = item.attr("Include").map(str::trim) else {
                    continue;
                };
                if self.is_skipped(include) {
                    debug!(include, "Skipping infrastructure item");
                    continue;
                }
                match item.name.as_str() {
                    "Reference" => {
                        let mut reference = RawReference::new(ReferenceElement::Reference, include);
                        reference.hint_path = item.value("HintPath").map(str::to_string);
                        raw.references.push(reference);
                    }
                    "PackageReference" => {
                        let mut reference = RawReference::new(ReferenceElement::PackageReference, include);
                        // Some hand-edited projects carry the version as a child element
                        reference.version = item
                            .attr("Version")
                            .or_else(|| item.value("Version"))
                            .map(|v| v.trim().to_string());
                        raw.references.push(reference);
                    }
                    "ProjectReference" => {
                        raw.references
                            .push(RawReference::new(ReferenceElement::ProjectReference, include));
                    }
                    "None" | "Content" => raw.other_files.push(include.to_string()),
                    "EmbeddedResource" => raw.embedded_resources.push(EmbeddedResource {
                        source_path: include.to_string(),
                        generator_name: owned(item.value("Generator")),
                        generated_output_path: owned(item.value("LastGenOutput")),
                        logical_name: owned(item.value("LogicalName")),
                        manifest_resource_name: owned(item.value("ManifestResourceName")),
                        sub_type: owned(item.value("SubType")),
                    }),
                    _ => {}
                }
            }
        }

        debug!(
            path = %path.display(),
            references = raw.references.len(),
            files = raw.other_files.len(),
            resources = raw.embedded_resources.len(),
            "Read descriptor"
        );
        Ok(raw)
    }

    /// Parse build-tool introspection output
    ///
    /// The first `skip_lines` lines are the tool banner. List values are
    /// `;`-separated; a `References` entry may carry a hint path after `|` and a
    /// `PackageReferences` entry a version after `|`.
    pub fn read_introspection(&self, text: &str, skip_lines: usize) -> RawDescriptor {
        let mut raw = RawDescriptor::default();

        for line in text.lines().skip(skip_lines) {
            let Some((key, value)) = line.trim().split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "AssemblyName" => set_once(&mut raw.assembly_name, non_empty(value)),
                "RootNamespace" => set_once(&mut raw.root_namespace, non_empty(value)),
                "NoWarn" => set_once(&mut raw.no_warn_codes, non_empty(value)),
                "CLSCompliant" => set_once(&mut raw.cls_compliant_flag, non_empty(value)),
                "ShippingAssembly" => set_once(&mut raw.shipping_assembly_flag, non_empty(value)),
                "ProjectReferences" => {
                    for entry in self.entries(value) {
                        raw.references
                            .push(RawReference::new(ReferenceElement::ProjectReference, entry));
                    }
                }
                "References" => {
                    for entry in self.entries(value) {
                        let reference = match entry.split_once('|') {
                            Some((include, hint)) if !hint.trim().is_empty() => {
                                RawReference::new(ReferenceElement::Reference, include.trim())
                                    .with_hint_path(hint.trim())
                            }
                            Some((include, _)) => {
                                RawReference::new(ReferenceElement::Reference, include.trim())
                            }
                            None => RawReference::new(ReferenceElement::Reference, entry),
                        };
                        raw.references.push(reference);
                    }
                }
                "PackageReferences" => {
                    for entry in self.entries(value) {
                        let reference = match entry.split_once('|') {
                            Some((name, version)) => {
                                RawReference::new(ReferenceElement::PackageReference, name.trim())
                                    .with_version(version.trim())
                            }
                            None => RawReference::new(ReferenceElement::PackageReference, entry),
                        };
                        raw.references.push(reference);
                    }
                }
                "None" => raw.other_files.extend(self.entries(value).map(str::to_string)),
                "Resources" => raw
                    .embedded_resources
                    .extend(self.entries(value).map(EmbeddedResource::new)),
                _ => {}
            }
        }
        raw
    }

    fn entries<'a>(&'a self, value: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        value
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter(move |entry| !self.is_skipped(entry))
    }

    fn is_skipped(&self, include: &str) -> bool {
        let file_name = include
            .rsplit(['\\', '/'])
            .next()
            .unwrap_or(include)
            .to_ascii_lowercase();
        self.skip_includes.contains(&file_name)
    }
}

fn set_once(slot: &mut Option<String>, value: Option<&str>) {
    if slot.is_none() {
        *slot = owned(value);
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}
