use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SyncModeArg {
    /// Full pull of merge requests created after --since
    Backfill,
    /// Incremental pull from the stored checkpoint watermark
    Refresh,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Jsonl,
    /// Write both formats
    All,
}

#[derive(Parser, Debug)]
#[command(name = "mergemap")]
#[command(about = "Merge-request classification and confidence engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to ./mergemap.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull merge requests and their details from GitLab into storage
    Sync {
        /// Project id (repeatable); falls back to GITLAB_PROJECT_IDS
        #[arg(long = "project-id")]
        project_ids: Vec<u64>,

        /// Sync mode
        #[arg(long, value_enum, default_value = "refresh")]
        mode: SyncModeArg,

        /// Backfill cutoff, ISO timestamp (required for backfill)
        #[arg(long)]
        since: Option<String>,

        /// Skip discussions, approvals, and pipelines
        #[arg(long)]
        light: bool,
    },

    /// Derive features and classify stored merge requests
    Classify {
        /// Project id (repeatable); falls back to GITLAB_PROJECT_IDS
        #[arg(long = "project-id")]
        project_ids: Vec<u64>,

        /// Only records whose stored classifier version is stale
        #[arg(long)]
        only_stale: bool,

        /// Classify every project present in the database
        #[arg(long)]
        all_projects: bool,
    },

    /// Export joined classification rows
    Export {
        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: ExportFormat,

        /// Output directory
        #[arg(short, long, default_value = "./exports")]
        out: PathBuf,
    },

    /// Run the external summarizer over low-confidence records
    Enrich {
        /// Project id (repeatable); falls back to GITLAB_PROJECT_IDS
        #[arg(long = "project-id")]
        project_ids: Vec<u64>,

        /// Enrichment tool (describe, review)
        #[arg(long, default_value = "describe")]
        tool: String,

        /// Maximum records per project
        #[arg(long, default_value = "10")]
        count: u32,

        /// Confidence cutoff; defaults to the needs-review threshold
        #[arg(long)]
        confidence_below: Option<f64>,

        /// Re-run records that already have an artifact
        #[arg(long)]
        force: bool,

        /// Per-invocation timeout in seconds
        #[arg(long, default_value = "300")]
        timeout_secs: u64,
    },

    /// Write a random audit sample for human labeling
    Audit {
        /// Sample size
        #[arg(long, default_value = "50")]
        size: u32,

        /// Output directory
        #[arg(short, long, default_value = "./reports")]
        out: PathBuf,
    },

    /// List accessible projects from GitLab
    Projects {
        /// Restrict to one group (subgroups included)
        #[arg(long)]
        group: Option<String>,

        /// Fetch per-project merge-request counts
        #[arg(long)]
        counts: bool,
    },

    /// Summarize stored classifications
    Status,
}
