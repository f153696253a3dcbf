//! Project descriptor model
//!
//! A [`RawDescriptor`] is what the reader extracts from a legacy (or already
//! migrated) project file: scalar properties, untyped reference nodes and
//! included files. The classifier turns it into a [`ProjectDescriptor`], whose
//! references are tagged once and rendered exhaustively by the writer.


/// Element kind a reference node was declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceElement {
    /// `<Reference Include="...">`, optionally with a `<HintPath>`
    Reference,
    /// `<PackageReference Include="..." Version="...">`
    PackageReference,
    /// `<ProjectReference Include="...">`
    ProjectReference,
}

/// A reference node as found in the source, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReference {
    pub element: ReferenceElement,
    /// The `Include` identity string (`Name, Version=..., Culture=...` or a path)
    pub include: String,
    pub hint_path: Option<String>,
    /// Version attribute or child element of a `PackageReference`
    pub version: Option<String>,
}

impl RawReference {
    pub fn new(element: ReferenceElement, include: impl Into<String>) -> Self {
        Self {
            element,
            include: include.into(),
            hint_path: None,
            version: None,
        }
    }

    pub fn with_hint_path(mut self, hint_path: impl Into<String>) -> Self {
        self.hint_path = Some(hint_path.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Reference name: the identity text before the first comma
    pub fn name(&self) -> &str {
        self.include
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
    }
}

/// An embedded resource declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedResource {
    pub source_path: String,
    pub generator_name: Option<String>,
    pub generated_output_path: Option<String>,
    pub logical_name: Option<String>,
    pub manifest_resource_name: Option<String>,
    pub sub_type: Option<String>,
}

impl EmbeddedResource {
    pub fn new(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            ..Self::default()
        }
    }

    /// Whether any optional metadata is present
    pub fn has_metadata(&self) -> bool {
        self.generator_name.is_some()
            || self.generated_output_path.is_some()
            || self.logical_name.is_some()
            || self.manifest_resource_name.is_some()
            || self.sub_type.is_some()
    }
}

/// Reader output: everything a descriptor declares, references still untyped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDescriptor {
    pub assembly_name: Option<String>,
    pub root_namespace: Option<String>,
    pub no_warn_codes: Option<String>,
    pub cls_compliant_flag: Option<String>,
    pub shipping_assembly_flag: Option<String>,
    pub references: Vec<RawReference>,
    pub other_files: Vec<String>,
    pub embedded_resources: Vec<EmbeddedResource>,
}

impl RawDescriptor {
    /// Fill fields this descriptor lacks from `other`
    ///
    /// Scalars are taken when missing here; lists are taken when empty here.
    pub fn fill_from(&mut self, other: RawDescriptor) {
        fill(&mut self.assembly_name, other.assembly_name);
        fill(&mut self.root_namespace, other.root_namespace);
        fill(&mut self.no_warn_codes, other.no_warn_codes);
        fill(&mut self.cls_compliant_flag, other.cls_compliant_flag);
        fill(&mut self.shipping_assembly_flag, other.shipping_assembly_flag);
        if self.references.is_empty() {
            self.references = other.references;
        }
        if self.other_files.is_empty() {
            self.other_files = other.other_files;
        }
        if self.embedded_resources.is_empty() {
            self.embedded_resources = other.embedded_resources;
        }
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.as_deref().map_or(true, |v| v.trim().is_empty()) {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            *slot = Some(value);
        }
    }
}

/// A third-party reference whose version is centralised in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReference {
    pub name: String,
    /// `None` when the version could not be recovered from the hint path
    pub version: Option<String>,
}

/// A classified reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Platform/framework reference, never versioned
    Sdk { name: String },
    /// Versioned external package, rendered through its registry property
    Package(ExternalReference),
    /// Already uses an indirection token and is passed through unchanged
    Migrated { name: String, token: String },
    /// Fixed replacement package with a literal version
    Pinned { name: String, version: String },
    /// Direct reference to a vendored binary
    LocalFile { name: String, path: String },
    /// Reference to a sibling descriptor
    Project { path: String },
}

/// A fully classified descriptor, ready to be written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDescriptor {
    pub assembly_name: String,
    pub root_namespace: Option<String>,
    pub no_warn_codes: Option<String>,
    pub cls_compliant_flag: Option<String>,
    pub shipping_assembly_flag: Option<String>,
    pub references: Vec<Reference>,
    pub other_files: Vec<String>,
    pub embedded_resources: Vec<EmbeddedResource>,
}

impl ProjectDescriptor {
    pub fn sdk_references(&self) -> impl Iterator<Item = &str> {
        self.references.iter().filter_map(|r| match r {
            Reference::Sdk { name } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Package, migrated, pinned and local-file references, in declaration order
    pub fn external_references(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(|r| {
            matches!(
                r,
                Reference::Package(_)
                    | Reference::Migrated { .. }
                    | Reference::Pinned { .. }
                    | Reference::LocalFile { .. }
            )
        })
    }

    pub fn project_references(&self) -> impl Iterator<Item = &str> {
        self.references.iter().filter_map(|r| match r {
            Reference::Project { path } => Some(path.as_str()),
            _ => None,
        })
    }

    /// Package references that carry a discovered version
    pub fn discovered_versions(&self) -> impl Iterator<Item = &ExternalReference> {
        self.references.iter().filter_map(|r| match r {
            Reference::Package(package) => Some(package),
            _ => None,
        })
    }
}
