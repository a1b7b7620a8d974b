use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use release_tracker::db::Database;
use release_tracker::models::{ReleaseDetails, RepositoryView};
use release_tracker::sync::RefreshScheduler;
use release_tracker::{upstream, AppError, Config, TrackerService};

#[derive(Parser)]
#[command(name = "release-tracker")]
#[command(about = "Track GitHub repositories and their latest releases")]
struct Cli {
    /// Use built-in fixture data instead of the GitHub API
    #[arg(long, global = true)]
    fixtures: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tracked repositories
    List,

    /// Show one tracked repository
    Show { id: String },

    /// Start tracking a repository (https://github.com/owner/repo or owner/repo)
    Add { url: String },

    /// Stop tracking a repository
    Remove { id: String },

    /// Fetch the latest metadata and release for one repository
    Refresh { id: String },

    /// Refresh every tracked repository
    RefreshAll,

    /// Mark a release as seen
    Seen {
        repository_id: String,
        release_id: String,
    },

    /// Show a release and the commits behind its tag
    Release {
        repository_id: String,
        release_id: String,
    },

    /// Keep running and refresh all repositories on the configured interval
    Watch {
        /// Refresh once at startup instead of waiting a full interval
        #[arg(long)]
        now: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Watch { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<AppError>() {
                Some(app) => eprintln!("Error [{}]: {}", app.kind(), app.public_message()),
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if cli.fixtures {
        config.use_fixture_data = true;
    }

    let db = Database::open(&config.db_path).await?;
    let source = upstream::from_config(&config)?;
    let service = TrackerService::new(db, source);
    let json = cli.json;

    match cli.command {
        Commands::List => {
            let repos = service.list_repositories().await?;
            if json {
                print_json(&repos)?;
            } else if repos.is_empty() {
                println!("No repositories tracked yet. Add one with `release-tracker add owner/repo`.");
            } else {
                for repo in &repos {
                    print_repository(repo);
                }
            }
        }

        Commands::Show { id } => match service.get_repository(&id).await? {
            Some(repo) if json => print_json(&repo)?,
            Some(repo) => print_repository(&repo),
            None => return Err(AppError::not_found("Repository").into()),
        },

        Commands::Add { url } => {
            let repo = service.add_repository(&url).await?;
            if json {
                print_json(&repo)?;
            } else {
                println!("Now tracking:");
                print_repository(&repo);
            }
        }

        Commands::Remove { id } => {
            let removed = service.delete_repository(&id).await?;
            if json {
                print_json(&removed)?;
            } else if removed {
                println!("Stopped tracking repository {}", id.trim());
            } else {
                println!("Repository {} was not tracked", id.trim());
            }
        }

        Commands::Refresh { id } => {
            let repo = service.refresh_repository(&id).await?;
            if json {
                print_json(&repo)?;
            } else {
                print_repository(&repo);
            }
        }

        Commands::RefreshAll => {
            let summary = service.refresh_all_repositories().await;
            if json {
                print_json(&summary)?;
            } else {
                println!(
                    "Refreshed {} of {} repositories",
                    summary.refreshed, summary.attempted
                );
                if !summary.failed.is_empty() {
                    println!("Failed: {:?}", summary.failed);
                }
            }
        }

        Commands::Seen {
            repository_id,
            release_id,
        } => {
            service
                .mark_release_as_seen(&repository_id, &release_id)
                .await?;
            if json {
                print_json(&true)?;
            } else {
                println!("Marked release {} as seen", release_id.trim());
            }
        }

        Commands::Release {
            repository_id,
            release_id,
        } => {
            let details = service
                .get_release_details(&repository_id, &release_id)
                .await?;
            if json {
                print_json(&details)?;
            } else {
                print_details(&details);
            }
        }

        Commands::Watch { now } => {
            let interval = config.refresh_interval()?;
            let handle = RefreshScheduler::new(service.engine().clone(), interval)
                .run_immediately(now)
                .spawn();

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            tracing::info!("Shutting down");
            handle.abort();
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_repository(repo: &RepositoryView) {
    let marker = if repo.has_unseen_updates { "*" } else { " " };
    println!("{} [{}] {}", marker, repo.id, repo.full_name);
    if let Some(description) = &repo.description {
        println!("      {}", description);
    }
    match &repo.latest_release {
        Some(release) => println!(
            "      latest: {} [{}] published {}{}",
            release.tag_name,
            release.id,
            release.published_at.format("%Y-%m-%d"),
            if release.is_seen { "" } else { " (new)" }
        ),
        None => println!("      no releases"),
    }
}

fn print_details(details: &ReleaseDetails) {
    let release = &details.release;
    println!(
        "{} {}",
        release.tag_name,
        release.name.as_deref().unwrap_or_default()
    );
    println!("published {}", release.published_at.format("%Y-%m-%d %H:%M UTC"));
    println!("{}", release.html_url);
    if let Some(body) = &release.body {
        println!();
        println!("{}", body);
    }
    println!();
    if details.commits.is_empty() {
        println!("No commit history available");
    }
    for commit in &details.commits {
        println!(
            "{} {} ({})",
            commit.sha, commit.message, commit.author.name
        );
    }
}
