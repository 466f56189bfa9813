use anyhow::Result;
use clap::Parser;
use mergemap::cli::{Cli, Commands};
use mergemap::commands;
use mergemap::config::{load_dotenv, Settings};

fn main() -> Result<()> {
    load_dotenv(None);
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync {
            project_ids,
            mode,
            since,
            light,
        } => commands::sync::run(
            &settings,
            commands::sync::SyncConfig {
                project_ids,
                mode,
                since,
                light,
            },
        ),
        Commands::Classify {
            project_ids,
            only_stale,
            all_projects,
        } => commands::classify::run(
            &settings,
            commands::classify::ClassifyConfig {
                project_ids,
                only_stale,
                all_projects,
            },
        ),
        Commands::Export { format, out } => commands::export::run(&settings, format, &out),
        Commands::Enrich {
            project_ids,
            tool,
            count,
            confidence_below,
            force,
            timeout_secs,
        } => commands::enrich::run(
            &settings,
            commands::enrich::EnrichConfig {
                project_ids,
                tool,
                count,
                confidence_below,
                force,
                timeout_secs,
            },
        ),
        Commands::Audit { size, out } => commands::export::run_audit(&settings, size, &out),
        Commands::Projects { group, counts } => {
            commands::projects::run(&settings, group.as_deref(), counts)
        }
        Commands::Status => commands::status::run(&settings),
    }
}
