//! Configuration management for the migrator
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (migrate.toml)
//! - Environment variables (MIGRATE__*)
//!
//! ## Example config file (migrate.toml):
//! ```toml
//! [project]
//! target_framework = "net46"
//! root_placeholder = "$(PlatformPath)"
//!
//! [filters]
//! include = ["Platform/Text/"]
//! exclude = ["Platform/Tools/"]
//!
//! [registry]
//! path = "build/versions.props"
//!
//! [[substitutions]]
//! reference = "Moq"
//! local_file = "$(RepoRoot)\\lib\\Moq.dll"
//!
//! [[shared_properties]]
//! prefix = "Microsoft.VisualStudio."
//! property = "MicrosoftVSSDKVersion"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for a migration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateConfig {
    /// Output schema settings
    #[serde(default)]
    pub project: ProjectConfig,

    /// Path fragment filters for batch discovery
    #[serde(default)]
    pub filters: FilterConfig,

    /// Version registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Which raw input source feeds the reader
    #[serde(default)]
    pub input: InputConfig,

    /// External build tool settings
    #[serde(default)]
    pub introspection: IntrospectionConfig,

    /// Special-case reference replacements
    #[serde(default = "default_substitutions")]
    pub substitutions: Vec<SubstitutionConfig>,

    /// Package name prefixes that share one version property
    #[serde(default)]
    pub shared_properties: Vec<SharedPropertyConfig>,
}

/// Settings for the new descriptor schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// SDK attribute of the new root element
    #[serde(default = "default_sdk")]
    pub sdk: String,

    /// Target identifier written into every descriptor
    #[serde(default = "default_target_framework")]
    pub target_framework: String,

    /// Legacy root-path token rewritten in project references
    #[serde(default = "default_root_placeholder")]
    pub root_placeholder: String,

    /// Extension of resources that produce a generated code file
    #[serde(default = "default_generator_extension")]
    pub generator_extension: String,

    /// Infrastructure-only includes that are dropped
    #[serde(default = "default_skip_includes")]
    pub skip_includes: Vec<String>,

    /// Descriptor file extensions picked up by batch discovery
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

/// Allow/deny path fragments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// A descriptor is only migrated if its path contains one of these (empty = all)
    #[serde(default)]
    pub include: Vec<String>,

    /// A descriptor whose path contains one of these is never migrated
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

/// Version registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry file location, relative to the migration root
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

/// Raw input source for the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    /// Parse the descriptor file directly
    #[default]
    Descriptor,
    /// Ask the build tool to print the evaluated project
    Introspection,
    /// Parse the file, then fill gaps from the build tool output
    Both,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub source: InputSource,
}

/// External build tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionConfig {
    /// Path to the build tool executable
    #[serde(default = "default_tool")]
    pub tool: PathBuf,

    /// Target that prints the project as `Key:value` lines
    #[serde(default = "default_target")]
    pub target: String,

    /// Banner lines printed before the data
    #[serde(default = "default_skip_lines")]
    pub skip_lines: usize,
}

/// A special-case replacement for one legacy reference
///
/// Exactly one of `packages` or `local_file` should be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionConfig {
    /// Legacy reference name (identity text before the first comma)
    pub reference: String,

    /// Fixed replacement packages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<PinnedPackage>,

    /// Fixed path to a vendored binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedPackage {
    pub name: String,
    pub version: String,
}

/// Packages starting with `prefix` render with `$(property)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedPropertyConfig {
    pub prefix: String,
    pub property: String,
}

// Default value functions
fn default_sdk() -> String {
    "Microsoft.NET.Sdk".to_string()
}

fn default_target_framework() -> String {
    "net46".to_string()
}

fn default_root_placeholder() -> String {
    "$(PlatformPath)".to_string()
}

fn default_generator_extension() -> String {
    "resx".to_string()
}

fn default_skip_includes() -> Vec<String> {
    vec!["packages.config".to_string(), "app.config".to_string()]
}

fn default_extensions() -> Vec<String> {
    vec!["csproj".to_string()]
}

fn default_exclude() -> Vec<String> {
    [
        "Platform/Applications/",
        "Consolidated/CFEditor/",
        "Platform/ExtensibilityHosting/",
        "Platform/F5DeployPlatform/",
        "Platform/Imaging/",
        "Platform/Tools/",
        "Platform/UserNotifications/",
        "Platform/Utilities/",
        "Platform/WER/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("build").join("versions.props")
}

fn default_tool() -> PathBuf {
    PathBuf::from(r"C:\Program Files (x86)\Microsoft Visual Studio\2017\Enterprise\MSBuild\15.0\Bin\MSBuild.exe")
}

fn default_target() -> String {
    "Tool".to_string()
}

fn default_skip_lines() -> usize {
    3
}

fn default_substitutions() -> Vec<SubstitutionConfig> {
    vec![
        SubstitutionConfig {
            reference: "Microsoft.VisualStudio.QualityTools.UnitTestFramework".to_string(),
            packages: vec![
                PinnedPackage {
                    name: "MSTest.TestFramework".to_string(),
                    version: "1.1.18".to_string(),
                },
                PinnedPackage {
                    name: "MSTest.TestAdapter".to_string(),
                    version: "1.1.18".to_string(),
                },
            ],
            local_file: None,
        },
        SubstitutionConfig {
            reference: "Moq".to_string(),
            packages: Vec::new(),
            local_file: Some(r"$(RepoRoot)\lib\Moq.dll".to_string()),
        },
    ]
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            sdk: default_sdk(),
            target_framework: default_target_framework(),
            root_placeholder: default_root_placeholder(),
            generator_extension: default_generator_extension(),
            skip_includes: default_skip_includes(),
            extensions: default_extensions(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: default_exclude(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            target: default_target(),
            skip_lines: default_skip_lines(),
        }
    }
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            filters: FilterConfig::default(),
            registry: RegistryConfig::default(),
            input: InputConfig::default(),
            introspection: IntrospectionConfig::default(),
            substitutions: default_substitutions(),
            shared_properties: Vec::new(),
        }
    }
}

impl MigrateConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["migrate.toml", ".migrate.toml", "config/migrate.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "csproj-migrate", "migrate") {
            let xdg_config = config_dir.config_dir().join("migrate.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // MIGRATE__PROJECT__TARGET_FRAMEWORK=net472
        builder = builder.add_source(
            Environment::with_prefix("MIGRATE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
