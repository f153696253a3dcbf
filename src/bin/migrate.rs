//! Project Migration CLI
//!
//! Converts legacy project descriptors to the SDK-style schema.
//!
//! ```text
//! csproj-migrate <SOURCE.csproj> <DESTINATION.csproj>   # single file
//! csproj-migrate <SOURCE_ROOT> [DESTINATION_ROOT]       # batch, in place by default
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use csproj_migrate::{BatchReport, FileFailure, FileOutcome, MigrateConfig, MigrateError, Migrator};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "csproj-migrate")]
#[command(about = "Migrate legacy project descriptors to the SDK-style schema")]
struct Cli {
    /// Source descriptor, or the root directory of a batch
    source: PathBuf,

    /// Destination descriptor, or destination root (defaults to the source root)
    destination: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(report) if report.is_clean() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<BatchReport> {
    let config = MigrateConfig::load().context("Failed to load configuration")?;
    let mut migrator = Migrator::new(config);

    // Descriptor paths run in single-file mode even when the file is missing
    let single = cli.source.is_file() || (!cli.source.is_dir() && migrator.is_descriptor_path(&cli.source));
    if single {
        let destination = cli
            .destination
            .context("Single-file mode needs a destination descriptor path")?;
        return run_single(&mut migrator, &cli.source, &destination);
    }

    let destination = cli.destination.unwrap_or_else(|| cli.source.clone());
    println!("🔍 Migrating {} → {}", cli.source.display(), destination.display());

    let report = migrator
        .migrate_batch_with(&cli.source, &destination, print_outcome)
        .with_context(|| format!("Batch aborted under {}", cli.source.display()))?;

    print_summary(&report);
    Ok(report)
}

fn run_single(migrator: &mut Migrator, source: &Path, destination: &Path) -> anyhow::Result<BatchReport> {
    let output_root = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut report = BatchReport::default();
    let outcome = match migrator.migrate_single(source, destination, output_root) {
        Ok(written) => {
            report.migrated.push(written.clone());
            FileOutcome::Migrated {
                source: source.to_path_buf(),
                destination: written,
            }
        }
        Err(error) if error.is_batch_fatal() => {
            return Err(error).with_context(|| format!("Cannot migrate {}", source.display()));
        }
        Err(error) => {
            report.failed.push(failure(source, &error));
            FileOutcome::Failed {
                source: source.to_path_buf(),
                error,
            }
        }
    };
    print_outcome(&outcome);
    Ok(report)
}

fn failure(source: &Path, error: &MigrateError) -> FileFailure {
    FileFailure {
        source: source.to_path_buf(),
        kind: error.kind(),
        message: error.to_string(),
    }
}

fn print_outcome(outcome: &FileOutcome) {
    match outcome {
        FileOutcome::Migrated { destination, .. } => println!("✅ {}", destination.display()),
        FileOutcome::Failed { source, error } => println!("❌ {}: {}", source.display(), error),
    }
}

fn print_summary(report: &BatchReport) {
    println!();
    if !report.warnings.is_empty() {
        println!("⚠️  {} warnings:", report.warnings.len());
        for warning in &report.warnings {
            println!("   └─ {}", warning);
        }
    }
    if let Some(path) = &report.registry_path {
        println!("📦 Versions written to {}", path.display());
    }
    println!(
        "📊 {} migrated, {} failed, {} skipped",
        report.migrated.len(),
        report.failed.len(),
        report.skipped.len()
    );
    for failure in &report.failed {
        println!("   ❌ {} [{}]", failure.source.display(), failure.kind);
    }
}
