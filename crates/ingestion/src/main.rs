//! Vis4T maintenance tool
//!
//! Offline imports that run against the same database as the gateway:
//! 1. `seed-subjects` loads the subject catalog and class offerings
//! 2. `import-roster` creates a class's students from a JSON roster
//! 3. `reconcile` attaches exported subject scores to class rosters

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vis4t_common::{config::AppConfig, db::DbPool, Repository, VERSION};
use vis4t_ingestion::reconciler::Reconciler;
use vis4t_ingestion::seed::{self, OfferingSeeds, RosterRecord, SubjectSeed};

#[derive(Parser)]
#[command(name = "vis4t-ingest", version, about = "Vis4T reference data and score import")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed subjects and per-class subject offerings
    SeedSubjects {
        /// `[{name_code, name, credit}]`
        #[arg(long)]
        subjects: PathBuf,

        /// `{class_name: [{name_code, semester_id}]}`
        #[arg(long)]
        offerings: PathBuf,
    },

    /// Create students of an existing class from a JSON roster
    ImportRoster {
        #[arg(long = "class")]
        class_name: String,

        #[arg(long)]
        file: PathBuf,
    },

    /// Attach `{class}_score.json` scores to each class's students
    Reconcile {
        #[arg(long)]
        data_dir: PathBuf,

        #[arg(long = "class", required = true)]
        classes: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting Vis4T maintenance tool v{}", VERSION);

    let pool = DbPool::new(&config.database).await?;
    if config.database.auto_migrate {
        pool.create_schema().await?;
    }
    let repo = Repository::new(pool);

    match cli.command {
        Command::SeedSubjects { subjects, offerings } => {
            let subjects: Vec<SubjectSeed> = seed::read_json(&subjects)?;
            let offerings: OfferingSeeds = seed::read_json(&offerings)?;

            let report = seed::seed_subjects(&repo, &subjects, &offerings).await?;
            for class_name in &report.skipped_classes {
                println!("Class {} not found, skipping subjects for this class", class_name);
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::ImportRoster { class_name, file } => {
            let records: Vec<RosterRecord> = seed::read_json(&file)?;
            let report = seed::import_roster(
                &repo,
                &class_name,
                &records,
                config.ingestion.student_id_width,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Reconcile { data_dir, classes } => {
            let reconciler = Reconciler::new(repo, &config.ingestion);
            let mut failed = 0;

            for class_name in &classes {
                println!("Processing class: {}", class_name);

                let scores = match seed::load_class_scores(&data_dir, class_name) {
                    Ok(scores) => scores,
                    Err(e) => {
                        warn!(class_name = %class_name, error = %e, "Score file unusable, skipping class");
                        println!("Skipping {}: {}", class_name, e);
                        continue;
                    }
                };

                match reconciler.reconcile_class(class_name, &scores).await {
                    Ok(report) => {
                        if report.batch_error.is_some() {
                            failed += 1;
                        }
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    }
                    Err(e) => {
                        error!(class_name = %class_name, error = %e, "Reconciliation failed");
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                anyhow::bail!("{} of {} classes did not reconcile cleanly", failed, classes.len());
            }
        }
    }

    info!("Done");
    Ok(())
}
