use crate::utils;
use colored::Colorize;
use serde::Serialize;
use stackflow_cloud::{DeploymentResult, ExecutionState, ResourceStatus, StateManager};
use stackflow_core::{DescriptorSet, ResourceKind};
use std::process::ExitCode;

#[derive(Serialize)]
pub(crate) struct ResourceLine {
    id: String,
    kind: ResourceKind,
    status: ResourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Recorded in state but no longer declared
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    orphaned: bool,
}

#[derive(Serialize)]
struct StatusOutput {
    deployment: String,
    resources: Vec<ResourceLine>,
    result: DeploymentResult,
}

pub async fn handle(
    set: &DescriptorSet,
    state_manager: &StateManager,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let state = state_manager.load().await?;
    let lines = resource_lines(set, &state);
    let result = DeploymentResult::collect(set, &state);

    if json {
        let output = StatusOutput {
            deployment: set.deployment.clone(),
            resources: lines,
            result,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} {}", "Deployment:".bold(), set.deployment.cyan().bold());
    if !state_manager.exists() {
        println!("{}", "  (never provisioned)".dimmed());
    } else {
        println!(
            "{} {}",
            "Updated:".dimmed(),
            state.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    println!();
    print_lines(&lines);

    Ok(ExitCode::SUCCESS)
}

/// Declared resources in provisioning order, then undeclared records that
/// may still exist at the provider
pub(crate) fn resource_lines(set: &DescriptorSet, state: &ExecutionState) -> Vec<ResourceLine> {
    let mut lines: Vec<ResourceLine> = set
        .ordered()
        .map(|desc| {
            let record = state.record(&desc.id);
            ResourceLine {
                id: desc.id.clone(),
                kind: desc.kind,
                status: state.status(&desc.id),
                handle: state.handle(&desc.id).map(|h| h.address().to_string()),
                error: record.and_then(|r| r.last_error.clone()),
                orphaned: false,
            }
        })
        .collect();

    for (id, record) in &state.resources {
        if set.get(id).is_none() && record.status.may_exist() {
            lines.push(ResourceLine {
                id: id.clone(),
                kind: record.kind,
                status: record.status,
                handle: record.handle.as_ref().map(|h| h.address().to_string()),
                error: record.last_error.clone(),
                orphaned: true,
            });
        }
    }
    lines
}

pub(crate) fn print_lines(lines: &[ResourceLine]) {
    let width = lines.iter().map(|l| l.id.len()).max().unwrap_or(0);
    for line in lines {
        let status = utils::colored_status(line.status);
        let suffix = if line.orphaned {
            " (not declared)".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<width$}  {}  {}{}",
            line.id,
            format!("{:<17}", line.kind.to_string()).dimmed(),
            status,
            suffix,
            width = width
        );
        if let Some(handle) = &line.handle {
            println!("      {} {}", "→".dimmed(), handle);
        }
        if let Some(error) = &line.error {
            println!("      {} {}", "↳".dimmed(), error.red());
        }
    }
}
