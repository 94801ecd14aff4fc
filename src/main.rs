use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

const DEFAULT_CONFIG: &str = "changelog.toml";

#[derive(Parser)]
#[command(name = "changelog")]
#[command(about = "Create an HTML changelog for each project and mail it to subscribers")]
struct Cli {
    /// Projects to report on (all configured projects if omitted)
    projects: Vec<String>,

    /// Treat project arguments as regular expressions
    #[arg(short, long)]
    regex: bool,

    /// Show command error messages
    #[arg(short, long)]
    verbose: bool,

    /// Revision range for git log
    #[arg(long, default_value = "HEAD")]
    revisions: String,

    /// A file holding the subscribers list in JSON (or TOML) format
    #[arg(short = 'l', long = "list", value_name = "FILE")]
    subscribers: Option<PathBuf>,

    /// What to do when no subscribers list is given
    #[arg(long, value_enum, default_value_t = NoSubscribersArg::Print)]
    no_subscribers: NoSubscribersArg,

    /// Configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of projects queried concurrently
    #[arg(short, long)]
    jobs: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum NoSubscribersArg {
    Print,
    Skip,
}

impl From<NoSubscribersArg> for changelog::NoSubscribers {
    fn from(arg: NoSubscribersArg) -> Self {
        match arg {
            NoSubscribersArg::Print => changelog::NoSubscribers::Print,
            NoSubscribersArg::Skip => changelog::NoSubscribers::Skip,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .init();

    // An explicit --config must exist; the default one is optional
    let config = match &cli.config {
        Some(path) => changelog::Config::load(path)?,
        None => changelog::Config::load_or_default(Path::new(DEFAULT_CONFIG))?,
    };

    let projects = changelog::select_projects(&config, &cli.projects, cli.regex)?;
    if projects.is_empty() {
        tracing::warn!("no projects selected");
    }

    let run_config = changelog::RunConfig {
        subject: config.subject_for(&cli.revisions),
        revisions: cli.revisions,
        subscribers: cli.subscribers,
        no_subscribers: cli.no_subscribers.into(),
        from: config.from.clone(),
        link_base: config.link_base.clone(),
        jobs: cli.jobs.unwrap_or(config.jobs),
    };

    let query = Arc::new(changelog::GitLog::new(config.link_base.as_str()));
    let transport = Arc::new(
        changelog::Sendmail::new(config.sendmail.clone()).context("invalid mail configuration")?,
    );

    let summary = changelog::run(&run_config, &projects, query, transport).await?;
    tracing::info!(
        changed = summary.changed_projects,
        failed = summary.failed_projects,
        undelivered = summary.failures(),
        "run finished"
    );

    Ok(ExitCode::from(
        u8::try_from(summary.failures()).unwrap_or(u8::MAX),
    ))
}
