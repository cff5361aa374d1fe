pub mod plan;
pub mod provision;
pub mod status;
pub mod teardown;
pub mod validate;

use crate::utils;
use colored::Colorize;
use serde::Serialize;
use stackflow_cloud::{CancellationFlag, Operation, ProviderAdapter, RunOutcome, StateManager};
use stackflow_cloud_gcp::GcpProvider;
use stackflow_config::Settings;
use stackflow_core::DescriptorSet;

pub(crate) fn gcp_provider(settings: &Settings) -> GcpProvider {
    GcpProvider::new(settings.gcp.project.clone(), settings.gcp.region.clone())
}

#[derive(Serialize)]
struct AbortedOutput {
    deployment: String,
    operation: Operation,
    outcome: RunOutcome,
    error: String,
    resources: Vec<status::ResourceLine>,
}

/// Fail early when the provider has no usable credentials.
///
/// On failure the recorded status of every resource is still printed, as
/// text or as JSON.
pub(crate) async fn ensure_authenticated(
    provider: &dyn ProviderAdapter,
    set: &DescriptorSet,
    state_manager: &StateManager,
    operation: Operation,
    json: bool,
) -> anyhow::Result<bool> {
    let auth = provider.check_auth().await?;
    if auth.authenticated {
        if let Some(account) = &auth.account_info {
            eprintln!("{} {}", "Account:".dimmed(), account.cyan());
        }
        return Ok(true);
    }

    let error = auth.error.unwrap_or_default();
    eprintln!("{} {}", "✗ Not authenticated:".red().bold(), error);

    let state = state_manager.load().await?;
    let resources = status::resource_lines(set, &state);
    if json {
        let output = AbortedOutput {
            deployment: set.deployment.clone(),
            operation,
            outcome: RunOutcome::Aborted,
            error,
            resources,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        println!("{}", "Resources:".bold());
        status::print_lines(&resources);
        println!();
        utils::print_outcome(RunOutcome::Aborted);
    }
    Ok(false)
}

/// Ctrl-C requests cancellation; the executor stops before the next resource
pub(crate) fn cancel_on_ctrl_c() -> CancellationFlag {
    let flag = CancellationFlag::new();
    let handle = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{}",
                "Cancelling after the current resource... (state is kept)".yellow()
            );
            handle.cancel();
        }
    });
    flag
}
