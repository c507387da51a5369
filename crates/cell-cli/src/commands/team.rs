//! Team lifecycle commands

use crate::output::{self, print_info, print_success, print_warning, OutputFormat};
use anyhow::Context;
use cell_lifecycle::{DecommissionOptions, LifecycleOperator};
use cell_provision::OnboardRequest;
use cell_types::{Environment, Team, TeamId, Tier};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use tabled::Tabled;

/// Table row for team display
#[derive(Debug, Serialize, Tabled)]
struct TeamRow {
    team: String,
    id: u8,
    status: String,
    env: String,
    tier: String,
    network: String,
    age: String,
}

impl From<Team> for TeamRow {
    fn from(team: Team) -> Self {
        Self {
            team: team.id.to_string(),
            id: team.numeric_id,
            status: team.status.to_string(),
            env: team.environment.to_string(),
            tier: team.tier.to_string(),
            network: team.network_range,
            age: humanize_duration(chrono::Utc::now() - team.created_at),
        }
    }
}

pub async fn onboard(
    operator: &LifecycleOperator,
    team: &str,
    leads: Vec<String>,
    env: &str,
    tier: &str,
    cost_center: &str,
    budget: Option<f64>,
) -> anyhow::Result<()> {
    let mut request = OnboardRequest::new(parse_team(team)?, cost_center, parse_env(env)?);
    request.leads = leads.into_iter().collect::<BTreeSet<String>>();
    request.tier = parse_tier(tier)?;
    request.budget_monthly = budget;

    print_info(&format!("Onboarding team {team}..."));
    let outcome = operator.onboard(request).await?;

    if outcome.resumed {
        print_warning("Resumed a previously incomplete onboarding");
    }
    print_success(&format!(
        "Team {} onboarded: numeric id {}, network {}",
        outcome.team.id, outcome.team.numeric_id, outcome.team.network_range
    ));
    print_info(&format!(
        "State backend: bucket {}, lock table {}",
        outcome.state_backend.bucket, outcome.state_backend.lock_table
    ));
    Ok(())
}

pub async fn deploy(operator: &LifecycleOperator, team: &str) -> anyhow::Result<()> {
    print_info(&format!("Deploying automation server for {team}..."));
    let record = operator.deploy(&parse_team(team)?).await?;

    print_success(&format!(
        "Deployed {} ({} replicas) at {}",
        team, record.descriptor.replicas, record.endpoint_url
    ));
    match record.health {
        cell_types::HealthState::Healthy => print_success("Deployment is healthy"),
        cell_types::HealthState::Unknown => {
            print_warning("Deployment did not report healthy yet; check `diagnose` later")
        }
        cell_types::HealthState::Unhealthy => print_warning("Deployment is unhealthy"),
    }
    Ok(())
}

pub async fn scale(operator: &LifecycleOperator, team: &str, tier: &str) -> anyhow::Result<()> {
    let record = operator.scale(&parse_team(team)?, parse_tier(tier)?).await?;
    print_success(&format!(
        "Scaled {} to {}: {} cpu / {} MiB / {} replicas",
        team, tier, record.descriptor.cpu, record.descriptor.memory, record.descriptor.replicas
    ));
    Ok(())
}

pub async fn rotate(
    operator: &LifecycleOperator,
    team: &str,
    all: bool,
    set: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let updates: BTreeMap<String, String> = set.into_iter().collect();
    if !all && updates.is_empty() {
        anyhow::bail!("nothing to rotate: pass --all or at least one --set key=value");
    }

    let report = operator.rotate(&parse_team(team)?, updates, all).await?;
    print_success(&format!(
        "Rotated credentials for {}: keys [{}], bundle version {}",
        team,
        report.keys.join(", "),
        report.bundle_version
    ));
    Ok(())
}

pub async fn budget(
    operator: &LifecycleOperator,
    team: &str,
    limit: f64,
    thresholds: Vec<u8>,
) -> anyhow::Result<()> {
    operator
        .set_budget(&parse_team(team)?, limit, thresholds.clone())
        .await?;
    print_success(&format!(
        "Budget for {team} set to ${limit:.2}/month, alerts at {thresholds:?}%"
    ));
    Ok(())
}

pub async fn diagnose(
    operator: &LifecycleOperator,
    team: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let report = operator.diagnose(&parse_team(team)?).await?;
    output::print_report(&report, format);
    for finding in &report.findings {
        print_warning(finding);
    }
    Ok(())
}

pub async fn list(operator: &LifecycleOperator, format: OutputFormat) -> anyhow::Result<()> {
    let teams = operator.list_teams().await?;
    let rows: Vec<TeamRow> = teams.into_iter().map(TeamRow::from).collect();
    output::print_list(rows, format);
    Ok(())
}

pub async fn decommission(
    operator: &LifecycleOperator,
    team: &str,
    backup: bool,
    transfer_to: Option<String>,
    force: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let transfer_to = transfer_to.as_deref().map(parse_team).transpose()?;
    let report = operator
        .decommission(
            &parse_team(team)?,
            DecommissionOptions {
                backup,
                transfer_to,
                force,
            },
        )
        .await?;

    print_success(&format!(
        "Team {} decommissioned, numeric id {} freed",
        report.team, report.freed_numeric_id
    ));
    if let Some(backup) = &report.destruction.backup {
        print_info(&format!(
            "Backup at {} (sha256 {})",
            backup.location, backup.digest_sha256
        ));
    }
    output::print_report(&report, format);
    Ok(())
}

fn parse_team(s: &str) -> anyhow::Result<TeamId> {
    TeamId::new(s).context("invalid team slug")
}

fn parse_env(s: &str) -> anyhow::Result<Environment> {
    Environment::from_str(s).map_err(anyhow::Error::msg)
}

fn parse_tier(s: &str) -> anyhow::Result<Tier> {
    Tier::from_str(s).map_err(anyhow::Error::msg)
}

fn humanize_duration(duration: chrono::Duration) -> String {
    if duration.num_days() > 0 {
        format!("{}d", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{}h", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{}m", duration.num_minutes())
    } else {
        format!("{}s", duration.num_seconds())
    }
}
