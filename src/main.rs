use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use issuescope::agent::devin::DevinClient;
use issuescope::config::AppConfig;
use issuescope::platform::github::GitHubIssues;
use issuescope::workflow;

#[derive(Parser)]
#[command(name = "issuescope", about = "Scope GitHub issues with an autonomous coding agent")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// GitHub issue workflow
    Issues {
        #[command(subcommand)]
        command: IssuesCommand,
    },
}

#[derive(Subcommand)]
enum IssuesCommand {
    /// List open issues in a repository
    List {
        /// Repository as owner/repo (falls back to github.default_repo)
        #[arg(long)]
        repo: Option<String>,
    },
    /// Scope one issue with the agent, then optionally wait for its PR
    Scope {
        /// Issue number
        #[arg(short, long)]
        number: u64,
        /// Repository as owner/repo (falls back to github.default_repo)
        #[arg(long)]
        repo: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Diagnostics stay on stderr and out of the way unless requested
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;

    // Interruption is plain SIGINT: the process dies and any in-flight
    // session stays live remotely; the service has no cancel call.
    run_command(cli.command, &config).await
}

async fn run_command(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Issues { command } => match command {
            IssuesCommand::List { repo } => {
                let repo = config.repo_or(repo.as_deref())?;
                let issues = GitHubIssues::new(&config.github)?;
                workflow::issue::list_issues(&issues, &repo).await?;
            }
            IssuesCommand::Scope { number, repo } => {
                let repo = config.repo_or(repo.as_deref())?;
                let issues = GitHubIssues::new(&config.github)?;
                let agent = DevinClient::new(&config.devin)?;
                workflow::issue::scope_issue(config, &issues, &agent, &repo, number).await?;
            }
        },
    }

    Ok(())
}
