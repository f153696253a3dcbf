//! Descriptor Writer
//!
//! Renders a [`ProjectDescriptor`] in the SDK-style schema. Section order is
//! fixed: properties, SDK references, external references, project references,
//! other files, embedded resources, generated code files. Empty item groups are
//! omitted, so a migrated descriptor renders back to the same bytes.

use std::fmt::Write as _;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::info;

use crate::config::MigrateConfig;
use crate::descriptor::{EmbeddedResource, ProjectDescriptor, Reference};
use crate::error::{MigrateError, Result};
use crate::registry::PropertyNamer;
use crate::xml::escape;

/// Writes descriptors in the new schema
#[derive(Debug, Clone)]
pub struct DescriptorWriter {
    sdk: String,
    target_framework: String,
    root_placeholder: String,
    /// Lower-cased, without the dot
    generator_extension: String,
    namer: PropertyNamer,
}

impl DescriptorWriter {
    pub fn new(
        sdk: impl Into<String>,
        target_framework: impl Into<String>,
        root_placeholder: impl Into<String>,
        generator_extension: &str,
        namer: PropertyNamer,
    ) -> Self {
        Self {
            sdk: sdk.into(),
            target_framework: target_framework.into(),
            root_placeholder: root_placeholder.into(),
            generator_extension: generator_extension.trim_start_matches('.').to_ascii_lowercase(),
            namer,
        }
    }

    pub fn from_config(config: &MigrateConfig) -> Self {
        Self::new(
            &config.project.sdk,
            &config.project.target_framework,
            &config.project.root_placeholder,
            &config.project.generator_extension,
            PropertyNamer::new(config.shared_properties.clone()),
        )
    }

    /// Write `descriptor` to `destination`
    ///
    /// `output_root` is the root of the migrated tree; project reference paths
    /// that start from the legacy root placeholder are rewritten relative to it.
    /// Nothing is written when the descriptor has no assembly name or the
    /// destination directory cannot be created.
    pub fn write(
        &self,
        descriptor: &ProjectDescriptor,
        destination: &Path,
        output_root: &Path,
    ) -> Result<PathBuf> {
        let directory = destination
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let content = self.render(descriptor, &relative_root(&directory, output_root))?;

        if !directory.as_os_str().is_empty() {
            fs::create_dir_all(&directory).map_err(|_| MigrateError::DirectoryMissing(directory.clone()))?;
        }
        fs::write(destination, content).map_err(|source| MigrateError::DestinationUnwritable {
            path: destination.to_path_buf(),
            source,
        })?;

        info!(
            assembly = %descriptor.assembly_name,
            destination = %destination.display(),
            "Wrote descriptor"
        );
        Ok(destination.to_path_buf())
    }

    /// Render the new-schema text
    ///
    /// `root` replaces the legacy root placeholder in project reference paths.
    pub fn render(&self, descriptor: &ProjectDescriptor, root: &str) -> Result<String> {
        if descriptor.assembly_name.trim().is_empty() {
            return Err(MigrateError::MissingRequiredField { field: "AssemblyName" });
        }

        let mut out = String::new();
        let _ = writeln!(out, "<Project Sdk=\"{}\">", escape(&self.sdk));
        out.push_str("  <PropertyGroup>\n");
        property(&mut out, "AssemblyName", Some(&descriptor.assembly_name));
        property(&mut out, "TargetFramework", Some(&self.target_framework));
        property(&mut out, "RootNamespace", descriptor.root_namespace.as_deref());
        property(&mut out, "ShippingAssembly", descriptor.shipping_assembly_flag.as_deref());
        property(&mut out, "NoWarn", descriptor.no_warn_codes.as_deref());
        property(&mut out, "CLSCompliant", descriptor.cls_compliant_flag.as_deref());
        out.push_str("  </PropertyGroup>\n");

        let sdk: Vec<String> = descriptor
            .sdk_references()
            .map(|name| format!("    <Reference Include=\"{}\" />\n", escape(name)))
            .collect();
        item_group(&mut out, &sdk);

        let external: Vec<String> = descriptor
            .external_references()
            .filter_map(|reference| self.external_item(reference))
            .collect();
        item_group(&mut out, &external);

        let projects: Vec<String> = descriptor
            .project_references()
            .map(|path| {
                let path = rewrite_root(path, &self.root_placeholder, root);
                format!("    <ProjectReference Include=\"{}\" />\n", escape(&path))
            })
            .collect();
        item_group(&mut out, &projects);

        let files: Vec<String> = descriptor
            .other_files
            .iter()
            .map(|file| format!("    <None Include=\"{}\" />\n", escape(file)))
            .collect();
        item_group(&mut out, &files);

        let resources: Vec<String> = descriptor
            .embedded_resources
            .iter()
            .map(resource_item)
            .collect();
        item_group(&mut out, &resources);

        let generated: Vec<String> = descriptor
            .embedded_resources
            .iter()
            .filter(|resource| self.is_generator_source(&resource.source_path))
            .map(generated_compile_item)
            .collect();
        item_group(&mut out, &generated);

        out.push_str("</Project>\n");
        Ok(out)
    }

    fn external_item(&self, reference: &Reference) -> Option<String> {
        let item = match reference {
            Reference::Package(package) => package_item(&package.name, &self.namer.token(&package.name)),
            Reference::Migrated { name, token } => package_item(name, token),
            Reference::Pinned { name, version } => package_item(name, version),
            Reference::LocalFile { name, path } => format!(
                "    <Reference Include=\"{}\">\n      <HintPath>{}</HintPath>\n    </Reference>\n",
                escape(name),
                escape(path)
            ),
            Reference::Sdk { .. } | Reference::Project { .. } => return None,
        };
        Some(item)
    }

    fn is_generator_source(&self, source_path: &str) -> bool {
        source_path
            .rsplit_once('.')
            .map(|(_, ext)| ext.eq_ignore_ascii_case(&self.generator_extension))
            .unwrap_or(false)
    }
}

fn property(out: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        let _ = writeln!(out, "    <{0}>{1}</{0}>", name, escape(value));
    }
}

fn item_group(out: &mut String, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str("  <ItemGroup>\n");
    for item in items {
        out.push_str(item);
    }
    out.push_str("  </ItemGroup>\n");
}

fn package_item(name: &str, version: &str) -> String {
    format!(
        "    <PackageReference Include=\"{}\" Version=\"{}\" />\n",
        escape(name),
        escape(version)
    )
}

fn resource_item(resource: &EmbeddedResource) -> String {
    let include = escape(&resource.source_path);
    if !resource.has_metadata() {
        return format!("    <EmbeddedResource Include=\"{}\" />\n", include);
    }

    let mut item = format!("    <EmbeddedResource Include=\"{}\">\n", include);
    for (name, value) in [
        ("Generator", &resource.generator_name),
        ("LastGenOutput", &resource.generated_output_path),
        ("LogicalName", &resource.logical_name),
        ("ManifestResourceName", &resource.manifest_resource_name),
        ("SubType", &resource.sub_type),
    ] {
        if let Some(value) = value {
            let _ = writeln!(item, "      <{0}>{1}</{0}>", name, escape(value));
        }
    }
    item.push_str("    </EmbeddedResource>\n");
    item
}

/// `<Compile Update>` entry for the code file generated from a resource
fn generated_compile_item(resource: &EmbeddedResource) -> String {
    let source = resource.source_path.as_str();
    let (directory, file_name) = match source.rfind(['\\', '/']) {
        Some(idx) => source.split_at(idx + 1),
        None => ("", source),
    };
    let generated = match &resource.generated_output_path {
        Some(output) => format!("{}{}", directory, output),
        None => {
            let stem = file_name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file_name);
            format!("{}{}.Designer.cs", directory, stem)
        }
    };
    format!(
        "    <Compile Update=\"{}\">\n      <DesignTime>True</DesignTime>\n      <AutoGen>True</AutoGen>\n      <DependentUpon>{}</DependentUpon>\n    </Compile>\n",
        escape(&generated),
        escape(file_name)
    )
}

/// Replace the legacy root placeholder, keeping the rest of the path
pub fn rewrite_root(path: &str, placeholder: &str, root: &str) -> String {
    if placeholder.is_empty() {
        return path.to_string();
    }
    path.replace(placeholder, root)
}

/// Relative path from `from_dir` to `root`, `\`-separated (`.` when equal)
pub fn relative_root(from_dir: &Path, root: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let to: Vec<Component<'_>> = root
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut parts: Vec<String> = std::iter::repeat("..".to_string())
        .take(from.len() - common)
        .collect();
    parts.extend(to[common..].iter().map(|c| c.as_os_str().to_string_lossy().into_owned()));

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("\\")
    }
}
