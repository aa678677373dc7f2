//! cltrigger - trigger CI runs for Gerrit changes
//!
//! ## Commands
//!
//! - `runtrybot`: dispatch trybot (and, when configured, unity) runs
//! - `unity`: dispatch only the unity compatibility run
//!
//! Without `--change`, arguments are commit references and must name pending
//! commits of the current branch; `HEAD` selects all of them. `unity --normal`
//! takes released versions instead and involves no change at all.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use cltrigger_core::{
    ChangeResolver, DispatchCoordinator, DispatchEvent, DispatchSink, DispatchTarget,
    GitHistoryReader, TriggerKind, UnityPayload,
};
use cltrigger_remote::{DryRunSink, GerritClient, GitHubDispatcher, Settings};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "cltrigger")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Trigger CI runs for Gerrit changes", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run trybots for pending commits or changes
    Runtrybot {
        #[command(flatten)]
        target: TriggerArgs,

        /// Skip the unity run even when a unity repository is configured
        #[arg(long)]
        no_unity: bool,
    },

    /// Run unity for pending commits, changes, or released versions
    Unity {
        #[command(flatten)]
        target: TriggerArgs,

        /// Treat arguments as versions understood by unity, e.g. v0.4.0
        #[arg(long, conflicts_with = "change")]
        normal: bool,
    },
}

#[derive(Args, Debug, Clone)]
struct TriggerArgs {
    /// Treat arguments as change numbers or IDs instead of commits
    #[arg(long)]
    change: bool,

    /// Trigger even when the latest patchset already passed
    #[arg(short, long)]
    force: bool,

    /// Log the dispatch requests instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Commits (default mode), changes (with --change) or versions (with --normal)
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    cltrigger_core::init_tracing(cli.json, level);

    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let settings = Settings::load(&cwd).context("Failed to load codereview.cfg")?;

    match cli.command {
        Commands::Runtrybot { target, no_unity } => {
            let targets = settings.targets(!no_unity);
            cmd_trigger(&settings, &target, targets).await
        }
        Commands::Unity { target, normal } => {
            let unity = unity_target(&settings)?;
            if normal {
                cmd_unity_versions(&settings, &target, &unity).await
            } else {
                cmd_trigger(&settings, &target, vec![unity]).await
            }
        }
    }
}

fn unity_target(settings: &Settings) -> Result<DispatchTarget> {
    match &settings.unity {
        Some(unity) => Ok(unity.target(TriggerKind::Unity)),
        None => bail!(
            "no unity repository configured in codereview.cfg (cue-unity-new or cue-unity)"
        ),
    }
}

fn make_sink(settings: &Settings, dry_run: bool) -> Result<Arc<dyn DispatchSink>> {
    if dry_run {
        return Ok(Arc::new(DryRunSink));
    }
    let auth = settings.require_github_auth()?.clone();
    let dispatcher = GitHubDispatcher::new(&settings.github_api, auth, settings.http_timeout)
        .context("Failed to create GitHub client")?;
    Ok(Arc::new(dispatcher))
}

/// Unity event for a plain version run.
fn versions_event(versions: &[String]) -> Result<DispatchEvent> {
    if versions.is_empty() {
        bail!("must provide at least one version with --normal");
    }
    Ok(DispatchEvent::Unity(UnityPayload::for_versions(versions)))
}

async fn cmd_unity_versions(
    settings: &Settings,
    opts: &TriggerArgs,
    unity: &DispatchTarget,
) -> Result<()> {
    let event = versions_event(&opts.args)?;
    let sink = make_sink(settings, opts.dry_run)?;
    sink.deliver(&unity.owner, &unity.repo, &event)
        .await
        .context("Failed to dispatch unity run")?;
    Ok(())
}

async fn cmd_trigger(
    settings: &Settings,
    opts: &TriggerArgs,
    targets: Vec<DispatchTarget>,
) -> Result<()> {
    let mut history = GitHistoryReader::new(settings.root.clone());
    if let Some(branch) = &settings.default_branch {
        history = history.with_default_branch(branch);
    }

    let resolver = ChangeResolver::new(&history, &settings.github.owner, &settings.github.repo);
    let revisions = resolver
        .resolve(&opts.args, opts.change)
        .context("Failed to resolve changes")?;
    info!("Resolved {} revision(s)", revisions.len());

    let review = GerritClient::new(
        &settings.gerrit_server,
        settings.gerrit_auth.clone(),
        settings.http_timeout,
    )
    .context("Failed to create Gerrit client")?;

    let sink = make_sink(settings, opts.dry_run)?;

    let coordinator = DispatchCoordinator::new(Arc::new(review), targets);
    coordinator
        .dispatch(&revisions, opts.force, sink)
        .await
        .context("Some triggers failed")?;

    Ok(())
}
