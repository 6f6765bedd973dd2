use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use asap_promote::{
    format_diff, format_manifest_diff, has_manifest_changes, AccessManager, BucketUrl,
    CheckTableRow, DatasetId, DiffResult, GcloudBackend, GcsError, IntegrityChecker, PromoteError,
    PromoteOptions, PromotionConfig, Promoter, ReleaseTransfer, StagingEnv, StorageBackend,
    StructureValidator, TeamName, WorkflowInventory,
};

#[derive(Parser)]
#[command(name = "asap-promote")]
#[command(about = "Validate, test, and promote ASAP CRN datasets between cloud buckets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Promotion config file (YAML or JSON); defaults cover the production setup
    #[arg(short, long, env = "ASAP_PROMOTE_CONFIG")]
    config: Option<PathBuf>,

    /// GCP project passed to gcloud storage calls
    #[arg(short, long, env = "GCP_PROJECT_ID")]
    project: Option<String>,

    /// Path to the gcloud binary when it is not on PATH
    #[arg(long, env = "GCLOUD_BIN")]
    gcloud_bin: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a raw bucket's directory layout and core metadata files
    Validate {
        /// Contributing team, e.g. "team-hardy" or "cohort"
        team: String,

        /// Dataset source and assay, e.g. "pmdbs-bulk-rnaseq"
        dataset: String,
    },

    /// Run the release tests against a staging workflow
    Check {
        /// Contributing team, e.g. "team-hardy" or "cohort"
        team: String,

        /// Dataset source and assay, e.g. "pmdbs-bulk-rnaseq"
        dataset: String,

        /// Workflow prefix holding the harmonized outputs, e.g. "harmonized_pmdbs"
        #[arg(short, long)]
        workflow: String,

        /// Staging environment to read from
        #[arg(short, long, default_value = "dev")]
        env: EnvArg,

        /// Output format: table, yaml, json
        #[arg(short, long, default_value = "table")]
        output: OutputFormat,
    },

    /// Show what changed between a staging workflow and production
    Diff {
        /// Contributing team, e.g. "team-hardy" or "cohort"
        team: String,

        /// Dataset source and assay, e.g. "pmdbs-bulk-rnaseq"
        dataset: String,

        /// Workflow prefix holding the harmonized outputs
        #[arg(short, long)]
        workflow: String,

        /// Staging environment to read from
        #[arg(short, long, default_value = "dev")]
        env: EnvArg,

        /// Include a line diff of the combined manifests
        #[arg(long)]
        manifests: bool,

        /// Output format: table, yaml, json
        #[arg(short, long, default_value = "table")]
        output: OutputFormat,
    },

    /// Test a staging workflow, write the promotion report, and sync to production
    Promote {
        /// Contributing team, e.g. "team-hardy" or "cohort"
        team: String,

        /// Dataset source and assay, e.g. "pmdbs-bulk-rnaseq"
        dataset: String,

        /// Workflow prefix holding the harmonized outputs
        #[arg(short, long)]
        workflow: String,

        /// Staging environment to promote from
        #[arg(short, long, default_value = "uat")]
        env: EnvArg,

        /// Copy for real instead of the default dry run
        #[arg(long)]
        promote: bool,

        /// Also sync the top-level metadata/ prefix
        #[arg(long)]
        include_metadata: bool,

        /// Also sync the top-level artifacts/ prefix
        #[arg(long)]
        include_artifacts: bool,

        /// Grant the cloud reader group on the production bucket afterwards
        #[arg(long)]
        grant_readers: bool,

        /// Directory the markdown report is written into
        #[arg(long, default_value = ".")]
        report_dir: PathBuf,
    },

    /// Upload versioned release resources into every dataset's raw bucket
    Transfer {
        /// Local directory holding the {version}/{dataset} resource trees
        #[arg(default_value = "release-resources")]
        resources: PathBuf,

        /// Copy for real instead of the default dry run
        #[arg(long)]
        promote: bool,
    },

    /// Strip the QC label and downgrade team access on a finalized bucket
    Lockdown {
        /// Full bucket URL, e.g. gs://asap-raw-team-hardy-pmdbs-bulk-rnaseq
        bucket: String,

        /// Apply the changes instead of the default dry run
        #[arg(long)]
        promote: bool,
    },

    /// List the configured contributor teams and their IAM identities
    Teams,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EnvArg {
    Dev,
    Uat,
}

impl From<EnvArg> for StagingEnv {
    fn from(env: EnvArg) -> Self {
        match env {
            EnvArg::Dev => StagingEnv::Dev,
            EnvArg::Uat => StagingEnv::Uat,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Yaml,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("asap_promote=debug,info")
    } else {
        EnvFilter::new("asap_promote=info,warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => PromotionConfig::load(path)?,
        None => PromotionConfig::default(),
    };

    let mut backend = match cli.project.clone() {
        Some(project) => GcloudBackend::with_project(project),
        None => GcloudBackend::new(),
    };
    if let Some(binary) = cli.gcloud_bin.clone() {
        backend = backend.gcloud_bin(binary);
    }

    match cli.command {
        Commands::Validate { team, dataset } => {
            cmd_validate(&backend, &config, &team, &dataset).await
        }
        Commands::Check {
            team,
            dataset,
            workflow,
            env,
            output,
        } => cmd_check(&backend, &config, &team, &dataset, &workflow, env.into(), output).await,
        Commands::Diff {
            team,
            dataset,
            workflow,
            env,
            manifests,
            output,
        } => {
            cmd_diff(
                &backend,
                &config,
                &team,
                &dataset,
                &workflow,
                env.into(),
                manifests,
                output,
            )
            .await
        }
        Commands::Promote {
            team,
            dataset,
            workflow,
            env,
            promote,
            include_metadata,
            include_artifacts,
            grant_readers,
            report_dir,
        } => {
            let mut options = PromoteOptions::new(env.into(), workflow);
            options.promote = promote;
            options.include_metadata = include_metadata;
            options.include_artifacts = include_artifacts;
            options.grant_readers = grant_readers;
            options.report_dir = report_dir;
            cmd_promote(&backend, &config, &team, &dataset, options).await
        }
        Commands::Transfer { resources, promote } => {
            cmd_transfer(&backend, &config, &resources, promote).await
        }
        Commands::Lockdown { bucket, promote } => {
            cmd_lockdown(&backend, &config, &bucket, promote).await
        }
        Commands::Teams => cmd_teams(&config),
    }
}

fn dataset_id(
    config: &PromotionConfig,
    team: &str,
    dataset: &str,
) -> Result<DatasetId, PromoteError> {
    let id = DatasetId::new(team, dataset)?;
    if !config.is_known_team(id.team()) {
        warn!("'{}' is not in the configured team roster", id.team());
    }
    Ok(id)
}

async fn cmd_validate(
    backend: &dyn StorageBackend,
    config: &PromotionConfig,
    team: &str,
    dataset: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = dataset_id(config, team, dataset)?;
    let bucket = config.naming.raw_bucket(&id)?;
    info!("Validating {}", bucket);

    let validator = StructureValidator::new(backend);
    let structure = validator.bucket_structure(&bucket).await?;

    println!("\nTop-level directories in {}:", bucket);
    for dir in &structure.present {
        println!("  \x1b[32m✓\x1b[0m {}", dir);
    }
    for dir in &structure.missing_recommended {
        println!("  \x1b[33m⚠\x1b[0m {} (recommended, missing)", dir);
    }
    for dir in &structure.missing_required {
        println!("  \x1b[31m✗\x1b[0m {} (required, missing)", dir);
    }
    for name in &structure.unexpected {
        println!("  ? {} (unexpected)", name);
    }

    if !structure.is_valid() {
        return Err(Box::new(PromoteError::Validation(format!(
            "MISSING required directories in {}: {}",
            bucket,
            structure.missing_required.join(", ")
        ))));
    }

    let metadata = validator.metadata_files(&bucket).await?;
    println!("\nMetadata files under {}:", metadata.checked_dir);
    for file in &metadata.present_core {
        println!("  \x1b[32m✓\x1b[0m {}", file);
    }
    for file in &metadata.missing_core {
        println!("  \x1b[31m✗\x1b[0m {} (core, missing)", file);
    }
    for file in &metadata.supplementary {
        println!("  + {} (supplementary)", file);
    }
    for file in &metadata.unexpected {
        println!("  ? {} (unexpected)", file);
    }

    let layout = validator.detect_layout(&bucket).await?;
    println!("\nLayout: {}", layout.as_str());

    if !metadata.is_complete() {
        return Err(Box::new(PromoteError::Validation(format!(
            "MISSING core metadata files in {}: {}",
            bucket,
            metadata.missing_core.join(", ")
        ))));
    }

    println!("\n\x1b[32m✓\x1b[0m {} passes structure validation", bucket);
    Ok(())
}

async fn cmd_check(
    backend: &dyn StorageBackend,
    config: &PromotionConfig,
    team: &str,
    dataset: &str,
    workflow: &str,
    env: StagingEnv,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = dataset_id(config, team, dataset)?;
    let bucket = config.naming.staging_bucket(env, &id)?;
    info!("Testing {}/{}", bucket, workflow);

    let inventory = WorkflowInventory::collect(backend, &bucket, workflow).await?;
    let report = IntegrityChecker::new().check(&inventory);

    match output {
        OutputFormat::Table => {
            let rows: Vec<CheckTableRow> = report.checks.iter().map(CheckTableRow::from).collect();
            let mut table = Table::new(rows);
            table.with(Style::markdown());
            println!("{}", table);
        }
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&report)?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    let failed = report.failures().len();
    if failed > 0 {
        return Err(Box::new(PromoteError::Integrity(format!(
            "{} of {} files failed the release tests",
            failed,
            report.checks.len()
        ))));
    }

    println!(
        "\n\x1b[32m✓\x1b[0m {} files passed all release tests",
        report.checks.len()
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_diff(
    backend: &dyn StorageBackend,
    config: &PromotionConfig,
    team: &str,
    dataset: &str,
    workflow: &str,
    env: StagingEnv,
    manifests: bool,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = dataset_id(config, team, dataset)?;
    let staging_bucket = config.naming.staging_bucket(env, &id)?;
    let production_bucket = config.naming.curated_bucket(&id)?;
    info!(
        "Comparing {}/{} against {}",
        staging_bucket, workflow, production_bucket
    );

    let staging = WorkflowInventory::collect(backend, &staging_bucket, workflow).await?;
    let production = WorkflowInventory::try_collect(backend, &production_bucket, workflow).await?;

    let diff = match &production {
        Some(prod) => DiffResult::between(&staging.snapshot, &prod.snapshot),
        None => {
            info!(
                "No production data for {} yet; everything counts as added",
                workflow
            );
            DiffResult::first_release(&staging.snapshot)
        }
    };

    match output {
        OutputFormat::Table => println!("{}", format_diff(&diff)),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&diff)?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&diff)?),
    }

    if manifests {
        let production_manifest = production.as_ref().and_then(|p| p.manifest_urls.first());
        match (staging.manifest_urls.first(), production_manifest) {
            (Some(new_url), Some(old_url)) => {
                let old = backend.read_object(old_url).await?;
                let new = backend.read_object(new_url).await?;
                if has_manifest_changes(&old, &new) {
                    println!("\n{}", format_manifest_diff(&old, &new));
                } else {
                    println!("\nNo manifest changes.");
                }
            }
            _ => println!("\nManifest missing on one side; skipping the manifest diff."),
        }
    }

    Ok(())
}

async fn cmd_promote(
    backend: &dyn StorageBackend,
    config: &PromotionConfig,
    team: &str,
    dataset: &str,
    options: PromoteOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = dataset_id(config, team, dataset)?;
    if options.promote {
        info!("Promoting {} ({})", id, options.workflow);
    } else {
        info!("Dry-run promotion for {} ({})", id, options.workflow);
    }

    let promoter = Promoter::new(backend, config);
    let outcome = promoter.run(&id, &options).await?;

    for line in &outcome.sync_output {
        println!("  {}", line);
    }
    println!("\nReport written to {}", outcome.report_path.display());

    if !outcome.report.tests_passed() {
        return Err(Box::new(PromoteError::Integrity(
            "release tests failed; nothing was synced".to_string(),
        )));
    }

    if outcome.promoted {
        println!(
            "\x1b[32m✓\x1b[0m Promoted {} to {}",
            outcome.report.workflow, outcome.report.production_bucket
        );
    } else {
        println!(
            "Dry run finished. Re-run with --promote to copy to {}.",
            outcome.report.production_bucket
        );
    }
    Ok(())
}

async fn cmd_transfer(
    backend: &dyn StorageBackend,
    config: &PromotionConfig,
    resources: &Path,
    promote: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Reading release resources from {}", resources.display());

    let transfer = ReleaseTransfer::new(backend, config);
    let outcome = transfer.run(resources, !promote).await?;

    for stray in &outcome.strays {
        warn!("Unclaimed file under the release root: {}", stray.display());
    }
    for item in &outcome.items {
        if outcome.applied {
            println!("  Copied {} to {}", item.source.display(), item.destination);
        } else {
            println!(
                "  Would copy {} to {}",
                item.source.display(),
                item.destination
            );
        }
    }

    if outcome.applied {
        println!(
            "\n\x1b[32m✓\x1b[0m Uploaded {} release files",
            outcome.items.len()
        );
    } else {
        println!(
            "\nDry run finished. Re-run with --promote to upload {} files.",
            outcome.items.len()
        );
    }
    Ok(())
}

async fn cmd_lockdown(
    backend: &dyn StorageBackend,
    config: &PromotionConfig,
    bucket: &str,
    promote: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bucket = BucketUrl::parse(bucket)?;
    let manager = AccessManager::new(backend, &config.access);
    let report = manager.lockdown(&bucket, !promote).await?;

    println!("\nLockdown for {} (team {}):", report.bucket, report.team);
    if report.actions.is_empty() {
        println!("  nothing to change");
    }
    for action in &report.actions {
        let marker = if report.applied {
            "\x1b[32m✓\x1b[0m"
        } else {
            "-"
        };
        println!("  {} {}", marker, action);
    }

    if !report.applied && !report.actions.is_empty() {
        println!(
            "\nDry run finished. Re-run with --promote to apply {} changes.",
            report.actions.len()
        );
    }
    Ok(())
}

fn cmd_teams(config: &PromotionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut rows = Vec::new();
    for raw in &config.teams {
        let team = TeamName::parse(raw)?;
        rows.push(TeamRow {
            team: raw.clone(),
            group: config.access.team_group_member(&team),
            upload_account: config.access.upload_sa_member(&team),
        });
    }

    let mut table = Table::new(rows);
    table.with(Style::markdown());
    println!("{}", table);
    Ok(())
}

#[derive(Tabled)]
struct TeamRow {
    #[tabled(rename = "team")]
    team: String,
    #[tabled(rename = "google group")]
    group: String,
    #[tabled(rename = "upload service account")]
    upload_account: String,
}

fn print_error(err: Box<dyn std::error::Error>) {
    if let Some(err) = err.downcast_ref::<PromoteError>() {
        if let PromoteError::Storage(gcs) = err {
            print_gcs_error(gcs);
            return;
        }
    }
    eprintln!("\n\x1b[31m✗ Error:\x1b[0m {}", err);
}

fn print_gcs_error(err: &GcsError) {
    eprintln!("\n\x1b[31m✗ Storage Error [{}]\x1b[0m", err.error_code());
    eprintln!("  {}", err);
    eprintln!("\n\x1b[33mSuggestion:\x1b[0m");
    for line in err.suggestion().lines() {
        eprintln!("  {}", line);
    }
    eprintln!();
}
