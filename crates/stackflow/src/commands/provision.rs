use crate::utils;
use colored::Colorize;
use stackflow_cloud::{Executor, Operation, StateManager};
use stackflow_config::Settings;
use stackflow_core::DescriptorSet;
use std::process::ExitCode;

pub async fn handle(
    set: &DescriptorSet,
    state_manager: &StateManager,
    settings: &Settings,
    json: bool,
) -> anyhow::Result<ExitCode> {
    if !json {
        println!(
            "{} {} ({} resources)",
            "Provisioning".blue(),
            set.deployment.cyan().bold(),
            set.len()
        );
    }

    let provider = super::gcp_provider(settings);
    let authenticated =
        super::ensure_authenticated(&provider, set, state_manager, Operation::Provision, json).await?;
    if !authenticated {
        return Ok(ExitCode::FAILURE);
    }

    let report = Executor::new(&provider, state_manager)
        .with_config(utils::executor_config(settings))
        .with_cancellation(super::cancel_on_ctrl_c())
        .provision(set)
        .await?;

    utils::print_run(set, &report, json)?;
    Ok(ExitCode::from(report.exit_code() as u8))
}
