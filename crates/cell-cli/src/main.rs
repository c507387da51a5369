//! cellctl - terminal interface for team-cell lifecycle management
//!
//! Drives the lifecycle operator directly: onboarding, deployment,
//! scaling, credential rotation, budgets, diagnosis, and guarded
//! decommission, plus the generic stack path. Registry, claim, and
//! bundle storage is a JSON state file, so invocations compose; the
//! local provider dumps its resources into the same file.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod confirm;
mod notify;
mod output;
mod state;

use cell_guard::{AutoApprove, Confirmer};
use cell_lifecycle::{LifecycleError, LifecycleOperator};
use cell_provider::InMemoryCloudProvider;
use commands::{stack, team};
use confirm::TerminalConfirmer;
use notify::NotificationSink;

/// cellctl CLI application
#[derive(Parser)]
#[command(name = "cellctl")]
#[command(about = "cellkit - team-cell provisioning and lifecycle management", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CELLKIT_CONFIG")]
    config: Option<String>,

    /// State file holding teams, slots, and credentials
    #[arg(long, env = "CELLKIT_STATE", default_value = "cellkit-state.json")]
    state: String,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table")]
    output: output::OutputFormat,

    /// Answer yes to every confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Bootstrap {
        /// Where to write the configuration
        #[arg(long, default_value = "cellkit.toml")]
        path: String,
    },

    /// Onboard a new team
    Onboard {
        /// Team slug
        #[arg(long)]
        team: String,

        /// Team lead identities, comma separated
        #[arg(long, required = true, value_delimiter = ',')]
        leads: Vec<String>,

        /// Target environment (prod, dev)
        #[arg(long, default_value = "dev")]
        env: String,

        /// Size class (small, medium, large)
        #[arg(long, default_value = "small")]
        tier: String,

        /// Cost center for budget tagging
        #[arg(long, default_value = "general")]
        cost_center: String,

        /// Monthly budget limit in USD
        #[arg(long)]
        budget: Option<f64>,
    },

    /// Deploy (or redeploy) a team's automation server
    Deploy {
        #[arg(long)]
        team: String,
    },

    /// Move a team to a new size class
    Scale {
        #[arg(long)]
        team: String,

        /// Target size class (small, medium, large)
        #[arg(long)]
        tier: String,
    },

    /// Rotate a team's credentials
    Rotate {
        #[arg(long)]
        team: String,

        /// Regenerate all self-owned secrets
        #[arg(long)]
        all: bool,

        /// Set a specific key, as key=value; repeatable
        #[arg(long = "set", value_parser = parse_key_val)]
        set: Vec<(String, String)>,
    },

    /// Configure budget alerts for a team's cost center
    Budget {
        #[arg(long)]
        team: String,

        /// Monthly limit in USD
        #[arg(long)]
        limit: f64,

        /// Alert thresholds as percentages of the limit
        #[arg(long, value_delimiter = ',', default_value = "50,80,100")]
        thresholds: Vec<u8>,
    },

    /// Read-only health report for a team
    Diagnose {
        #[arg(long)]
        team: String,
    },

    /// List all teams occupying a slot
    Teams,

    /// Decommission a team through the safety guard
    Decommission {
        #[arg(long)]
        team: String,

        /// Snapshot state and retain the state backend
        #[arg(long)]
        backup: bool,

        /// Transfer retained state to another team first
        #[arg(long)]
        transfer_to: Option<String>,

        /// Override protected-pattern vetoes
        #[arg(long)]
        force: bool,
    },

    /// Generic stack operations, carrying the safety guard
    Stack {
        /// Stack name
        name: String,

        /// Target environment (prod, dev)
        env: String,

        /// What to do
        #[arg(value_enum)]
        action: stack::StackAction,

        /// Snapshot state before destroying
        #[arg(long)]
        backup: bool,

        /// Override protected-pattern vetoes
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    if let Err(err) = run(cli).await {
        // A declined confirmation is a graceful no-op, not a failure.
        if let Some(LifecycleError::Guard(cell_guard::GuardError::ConfirmationDeclined(_))) =
            err.downcast_ref::<LifecycleError>()
        {
            output::print_warning(&err.to_string());
            return;
        }
        output::print_error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Bootstrap { path } = &cli.command {
        config::write_starter(path)?;
        output::print_success(&format!("Wrote starter configuration to {path}"));
        output::print_info("Edit the org and region, then run `cellctl onboard`");
        return Ok(());
    }

    let org_config = config::load(cli.config.as_deref())?;

    let confirmer: Arc<dyn Confirmer> = if cli.yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(TerminalConfirmer::new(5))
    };
    let store = state::FileStore::open(&cli.state)?;
    let provider = Arc::new(InMemoryCloudProvider::new());
    store.hydrate_provider(&provider).await;

    let operator = LifecycleOperator::new(
        org_config.clone(),
        store.clone(),
        store.clone(),
        provider.clone(),
        store.clone(),
        confirmer,
    );
    if let Some(webhook) = &org_config.notification_webhook {
        NotificationSink::new(webhook.clone()).spawn(operator.subscribe());
    }

    let outcome = match cli.command {
        Commands::Bootstrap { .. } => unreachable!("handled above"),
        Commands::Onboard {
            team,
            leads,
            env,
            tier,
            cost_center,
            budget,
        } => {
            team::onboard(&operator, &team, leads, &env, &tier, &cost_center, budget).await
        }
        Commands::Deploy { team } => team::deploy(&operator, &team).await,
        Commands::Scale { team, tier } => team::scale(&operator, &team, &tier).await,
        Commands::Rotate { team, all, set } => team::rotate(&operator, &team, all, set).await,
        Commands::Budget {
            team,
            limit,
            thresholds,
        } => team::budget(&operator, &team, limit, thresholds).await,
        Commands::Diagnose { team } => team::diagnose(&operator, &team, cli.output).await,
        Commands::Teams => team::list(&operator, cli.output).await,
        Commands::Decommission {
            team,
            backup,
            transfer_to,
            force,
        } => {
            team::decommission(&operator, &team, backup, transfer_to, force, cli.output).await
        }
        Commands::Stack {
            name,
            env,
            action,
            backup,
            force,
        } => stack::execute(&operator, &name, &env, action, backup, force, cli.output).await,
    };

    // Persist provider resources even when the command failed, so a
    // partial destruction is reflected on the next invocation.
    store.save_provider(provider.snapshot()).await?;
    outcome
}

/// Parse a `key=value` argument.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    if key.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("github_token=ghp_x").unwrap(),
            ("github_token".to_string(), "ghp_x".to_string())
        );
        assert!(parse_key_val("no-equals").is_err());
        assert!(parse_key_val("=value").is_err());
    }
}
