//! End-to-end migration tests
//!
//! Fixture descriptors are written into a temp directory and migrated through
//! the public API.

use std::fs;
use std::path::Path;

use csproj_migrate::{extract_version, MigrateConfig, Migrator, VersionProps};
use tempfile::tempdir;

const CORE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="15.0" DefaultTargets="Build" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <AssemblyName>Microsoft.VisualStudio.Text.Core</AssemblyName>
    <RootNamespace>Microsoft.VisualStudio.Text</RootNamespace>
    <NoWarn>1591</NoWarn>
  </PropertyGroup>
  <ItemGroup>
    <Reference Include="System" />
    <Reference Include="Newtonsoft.Json, Version=9.0.0.0, Culture=neutral">
      <HintPath>$(NuGetPackageRoot)\Newtonsoft.Json.9.0.1\lib\net45\Newtonsoft.Json.dll</HintPath>
    </Reference>
    <Reference Include="Microsoft.VisualStudio.QualityTools.UnitTestFramework" />
    <Reference Include="Moq">
      <HintPath>..\packages\Moq.4.2\lib\Moq.dll</HintPath>
    </Reference>
  </ItemGroup>
  <ItemGroup>
    <ProjectReference Include="$(PlatformPath)\Text\Data\Data.csproj" />
    <None Include="packages.config" />
    <None Include="README.md" />
    <EmbeddedResource Include="Strings.resx">
      <Generator>ResXFileCodeGenerator</Generator>
      <LastGenOutput>Strings.Designer.cs</LastGenOutput>
    </EmbeddedResource>
  </ItemGroup>
</Project>
"#;

fn legacy(assembly: Option<&str>, package: &str, version: &str) -> String {
    let name = assembly
        .map(|a| format!("<AssemblyName>{}</AssemblyName>", a))
        .unwrap_or_default();
    format!(
        r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>{name}</PropertyGroup>
  <ItemGroup>
    <Reference Include="{package}">
      <HintPath>..\packages\{package}.{version}\lib\net45\{package}.dll</HintPath>
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
fn test_migrates_legacy_descriptor() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let out = dir.path().join("out");
    write(&src.join("Text").join("Core").join("Core.csproj"), CORE);

    let mut migrator = Migrator::new(MigrateConfig::default());
    let report = migrator.migrate_batch(&src, &out).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.migrated, vec![out.join("Text").join("Core").join("Core.csproj")]);

    let migrated = fs::read_to_string(&report.migrated[0]).unwrap();
    assert!(migrated.starts_with("<Project Sdk=\"Microsoft.NET.Sdk\">\n"));
    assert!(migrated.contains("    <AssemblyName>Microsoft.VisualStudio.Text.Core</AssemblyName>\n"));
    assert!(migrated.contains("    <TargetFramework>net46</TargetFramework>\n"));
    assert!(migrated.contains("    <Reference Include=\"System\" />\n"));
    assert!(migrated.contains(
        "    <PackageReference Include=\"Newtonsoft.Json\" Version=\"$(NewtonsoftJson)\" />\n"
    ));
    assert!(migrated.contains("    <PackageReference Include=\"MSTest.TestFramework\" Version=\"1.1.18\" />\n"));
    assert!(migrated.contains("    <PackageReference Include=\"MSTest.TestAdapter\" Version=\"1.1.18\" />\n"));
    assert!(migrated.contains("      <HintPath>$(RepoRoot)\\lib\\Moq.dll</HintPath>\n"));
    assert!(migrated.contains("    <ProjectReference Include=\"..\\..\\Text\\Data\\Data.csproj\" />\n"));
    assert!(migrated.contains("    <None Include=\"README.md\" />\n"));
    assert!(migrated.contains("    <Compile Update=\"Strings.Designer.cs\">\n"));
    assert!(!migrated.contains("packages.config"));
    assert!(!migrated.contains("UnitTestFramework"));

    let props = fs::read_to_string(out.join("build").join("versions.props")).unwrap();
    assert!(props.contains("    <NewtonsoftJson>9.0.1</NewtonsoftJson>\n"));
    assert!(!props.contains("MSTest"));
}

#[test]
fn test_remigration_is_byte_identical() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    write(&src.join("Text").join("Core").join("Core.csproj"), CORE);

    Migrator::new(MigrateConfig::default()).migrate_batch(&src, &first).unwrap();
    let report = Migrator::new(MigrateConfig::default())
        .migrate_batch(&first, &second)
        .unwrap();
    assert!(report.is_clean());

    let relative = Path::new("Text").join("Core").join("Core.csproj");
    assert_eq!(
        fs::read(first.join(&relative)).unwrap(),
        fs::read(second.join(&relative)).unwrap()
    );
}

#[test]
fn test_in_place_migration_is_stable() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("repo");
    let project = root.join("Core").join("Core.csproj");
    write(&project, CORE);

    Migrator::new(MigrateConfig::default()).migrate_batch(&root, &root).unwrap();
    let once = fs::read_to_string(&project).unwrap();
    Migrator::new(MigrateConfig::default()).migrate_batch(&root, &root).unwrap();
    assert_eq!(once, fs::read_to_string(&project).unwrap());

    // The registry keeps the version recorded by the first pass
    let props = VersionProps::load(root.join("build").join("versions.props")).unwrap();
    assert_eq!(props.versions("NewtonsoftJson").unwrap().len(), 1);
}

#[test]
fn test_batch_continues_past_failing_file() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let out = dir.path().join("out");
    write(&src.join("A").join("A.csproj"), &legacy(Some("A"), "Newtonsoft.Json", "9.0.1"));
    write(&src.join("B").join("B.csproj"), &legacy(None, "Castle.Core", "4.2.1"));
    write(&src.join("C").join("C.csproj"), &legacy(Some("C"), "Newtonsoft.Json", "10.0.3"));

    let mut migrator = Migrator::new(MigrateConfig::default());
    let report = migrator.migrate_batch(&src, &out).unwrap();

    assert_eq!(report.migrated, vec![out.join("A").join("A.csproj"), out.join("C").join("C.csproj")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].source, src.join("B").join("B.csproj"));
    assert_eq!(report.failed[0].kind, "MissingRequiredField");
    assert!(!out.join("B").join("B.csproj").exists());

    let props = VersionProps::load(out.join("build").join("versions.props")).unwrap();
    assert!(props.versions("CastleCore").is_none());
    let versions: Vec<&str> = props
        .versions("NewtonsoftJson")
        .unwrap()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(versions, vec!["10.0.3", "9.0.1"]);
    assert!(report.warnings.iter().any(|w| w.contains("Newtonsoft.Json")));
}

#[test]
fn test_filter_skips_denied_subtrees() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let out = dir.path().join("out");
    write(&src.join("Core").join("X.csproj"), &legacy(Some("X"), "Castle.Core", "4.2.1"));
    write(&src.join("Core").join("Tools").join("Y.csproj"), &legacy(Some("Y"), "Castle.Core", "4.2.1"));

    let mut config = MigrateConfig::default();
    config.filters.include = vec!["Core".to_string()];
    config.filters.exclude = vec!["Tools".to_string()];

    let report = Migrator::new(config).migrate_batch(&src, &out).unwrap();
    assert_eq!(report.migrated, vec![out.join("Core").join("X.csproj")]);
    assert_eq!(report.skipped, vec![src.join("Core").join("Tools").join("Y.csproj")]);
}

#[test]
fn test_existing_registry_is_merged() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    write(&src.join("A").join("A.csproj"), &legacy(Some("A"), "Castle.Core", "4.2.1"));
    write(
        &src.join("build").join("versions.props"),
        r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <SystemMemory>4.5.0</SystemMemory>
  </PropertyGroup>
</Project>
"#,
    );

    Migrator::new(MigrateConfig::default()).migrate_batch(&src, &src).unwrap();

    let props = fs::read_to_string(src.join("build").join("versions.props")).unwrap();
    assert_eq!(
        props,
        "<Project xmlns=\"http://schemas.microsoft.com/developer/msbuild/2003\">\n  <PropertyGroup>\n    <CastleCore>4.2.1</CastleCore>\n    <SystemMemory>4.5.0</SystemMemory>\n  </PropertyGroup>\n</Project>\n"
    );
}

#[test]
fn test_unresolved_version_is_recorded_empty() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    write(
        &src.join("A.csproj"),
        r#"<Project>
  <PropertyGroup><AssemblyName>A</AssemblyName></PropertyGroup>
  <ItemGroup>
    <Reference Include="Vendor.Widgets"><HintPath>lib\Vendor.Widgets.dll</HintPath></Reference>
  </ItemGroup>
</Project>"#,
    );

    let report = Migrator::new(MigrateConfig::default()).migrate_batch(&src, &src).unwrap();
    assert!(report.is_clean());
    assert!(report.warnings.iter().any(|w| w.contains("Vendor.Widgets")));

    let props = VersionProps::load(src.join("build").join("versions.props")).unwrap();
    assert!(props.versions("VendorWidgets").unwrap().contains(""));
}

#[test]
fn test_single_file_migration() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("Legacy.csproj");
    let destination = dir.path().join("migrated").join("New.csproj");
    write(&source, &legacy(Some("Legacy"), "Castle.Core", "4.2.1"));

    let mut migrator = Migrator::new(MigrateConfig::default());
    let written = migrator
        .migrate_single(&source, &destination, dir.path())
        .unwrap();
    assert_eq!(written, destination);
    assert!(fs::read_to_string(&destination)
        .unwrap()
        .contains("<PackageReference Include=\"Castle.Core\" Version=\"$(CastleCore)\" />"));
    assert!(dir.path().join("build").join("versions.props").exists());
}

#[test]
fn test_version_extraction_from_hint_paths() {
    assert_eq!(
        extract_version("Newtonsoft.Json", r"..\packages\Newtonsoft.Json.9.0.1\lib\net45\Newtonsoft.Json.dll"),
        Some("9.0.1".to_string())
    );
    assert_eq!(
        extract_version("System.Memory", r"$(NuGetPackageRoot)\System.Memory.4.5.0-preview1\lib\System.Memory.dll"),
        Some("4.5.0-preview1".to_string())
    );
    assert_eq!(extract_version("Vendor.Widgets", r"lib\Vendor.Widgets.dll"), None);
}
