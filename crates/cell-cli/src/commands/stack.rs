//! Generic stack commands, carrying the safety guard independently of
//! teams

use crate::output::{self, print_info, print_success, OutputFormat};
use cell_lifecycle::LifecycleOperator;
use cell_types::Environment;
use std::str::FromStr;

/// Stack actions
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum StackAction {
    /// Preview the resources a teardown would remove
    Plan,
    /// Materialize the stack's resources
    Apply,
    /// Tear the stack down through the safety guard
    Destroy,
}

pub async fn execute(
    operator: &LifecycleOperator,
    name: &str,
    env: &str,
    action: StackAction,
    backup: bool,
    force: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let environment = Environment::from_str(env).map_err(anyhow::Error::msg)?;

    match action {
        StackAction::Plan => {
            let impact = operator.stack_plan(name).await?;
            print_info(&format!("Teardown of {name} would remove {}", impact.summary_line()));
            output::print_report(&impact, format);
        }
        StackAction::Apply => {
            let resources = operator.stack_apply(name, environment).await?;
            print_success(&format!("Applied stack {name}: {} resources", resources.len()));
            for resource in &resources {
                print_info(&format!("  {} {}", resource.kind, resource.name));
            }
        }
        StackAction::Destroy => {
            let report = operator
                .stack_destroy(name, environment, backup, force)
                .await?;
            print_success(&format!(
                "Destroyed stack {name}: {} resources removed",
                report.deleted.len()
            ));
            if let Some(backup) = &report.backup {
                print_info(&format!("Backup at {}", backup.location));
            }
        }
    }
    Ok(())
}
