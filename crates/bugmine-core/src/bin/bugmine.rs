//! `bugmine` command-line entry point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use _bugmine_core::config::MinerConfig;
use _bugmine_core::errors::MinerResult;
use _bugmine_core::mine_and_store;
use _bugmine_core::models::Dataset;
use _bugmine_core::pipeline::mine_with_config;
use _bugmine_core::store::DatasetStore;

/// Defect dataset miner
#[derive(Parser)]
#[command(name = "bugmine")]
#[command(about = "Label every method of every release as buggy or clean", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for one project
    Mine {
        /// Project configuration file (TOML)
        #[arg(short, long, env = "BUGMINE_CONFIG")]
        config: PathBuf,

        /// Also write the dataset as pretty-printed JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Skip writing the SQLite database
        #[arg(long)]
        no_store: bool,
    },

    /// Print the stored summary of a project
    Show {
        /// Dataset database
        #[arg(long)]
        db: PathBuf,

        /// Project name
        #[arg(long)]
        project: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let result = match cli.command {
        Commands::Mine {
            config,
            json,
            no_store,
        } => mine(&config, json.as_deref(), no_store),
        Commands::Show { db, project } => show(&db, &project),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn mine(config_path: &Path, json: Option<&Path>, no_store: bool) -> MinerResult<()> {
    let config = MinerConfig::load(config_path)?;
    let dataset = if no_store {
        mine_with_config(&config)?
    } else {
        mine_and_store(&config)?
    };
    if let Some(path) = json {
        std::fs::write(path, dataset.to_json_pretty()?)?;
        info!(path = %path.display(), "dataset exported");
    }
    print_summary(&dataset);
    Ok(())
}

fn print_summary(dataset: &Dataset) {
    let s = &dataset.summary;
    println!("Project:     {}", dataset.project.name);
    println!("Versions:    {} kept, {} dropped", s.versions, s.versions_dropped);
    println!(
        "Tickets:     {} kept, {} dropped, {} with inferred injected version",
        s.tickets, s.tickets_dropped, s.tickets_inferred
    );
    println!("Proportion:  {:.3}", s.proportion);
    println!(
        "Methods:     {} total, {} buggy ({:.1}%)",
        s.methods,
        s.buggy_methods,
        s.buggy_ratio() * 100.0
    );
    println!("Diagnostics: {}", dataset.diagnostics.len());
}

fn show(db: &Path, project: &str) -> MinerResult<()> {
    let store = DatasetStore::open(db)?;
    store.init_schema()?;
    let Some(stored) = store.load_project(project)? else {
        println!("No project named {project} in {}", db.display());
        println!("Stored projects: {}", store.list_projects()?.join(", "));
        return Ok(());
    };

    let ratio = if stored.methods == 0 {
        0.0
    } else {
        stored.buggy_methods as f64 / stored.methods as f64
    };
    println!("Project:     {} ({})", stored.name, stored.tracker_key);
    println!("Branch:      {} [{}]", stored.branch, stored.release_tag_template);
    println!("Mined at:    {}", stored.mined_at);
    println!(
        "Versions:    {} kept, {} dropped",
        stored.versions, stored.versions_dropped
    );
    println!(
        "Tickets:     {} kept, {} dropped",
        stored.tickets, stored.tickets_dropped
    );
    println!("Proportion:  {:.3}", stored.proportion);
    println!(
        "Methods:     {} total, {} buggy ({:.1}%)",
        stored.methods,
        stored.buggy_methods,
        ratio * 100.0
    );
    println!("Diagnostics: {}", stored.diagnostics);
    for (stage, category, count) in store.summarize_diagnostics(project)? {
        println!("  {stage:<11} {category:<24} {count}");
    }
    Ok(())
}
