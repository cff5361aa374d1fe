use crate::utils;
use colored::Colorize;
use stackflow_cloud::{ActionType, Executor, Operation, Plan, StateManager};
use stackflow_config::Settings;
use stackflow_core::DescriptorSet;
use std::process::ExitCode;

pub async fn handle(
    set: &DescriptorSet,
    state_manager: &StateManager,
    settings: &Settings,
    yes: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let state = state_manager.load().await?;
    let plan = Plan::for_teardown(set, &state);

    if !plan.has_changes {
        println!("{}", "Nothing deployed, nothing to tear down.".green());
        return Ok(ExitCode::SUCCESS);
    }

    // without --yes only show what would be deleted
    if !yes {
        println!(
            "{} the following resources of {} would be deleted:",
            "⚠".yellow(),
            set.deployment.cyan().bold()
        );
        for action in plan.actions_by_type(ActionType::Delete) {
            println!("  - {} ({})", action.resource_id.red(), action.kind);
        }
        println!();
        println!("Run with --yes to delete them");
        return Ok(ExitCode::SUCCESS);
    }

    let provider = super::gcp_provider(settings);
    let authenticated =
        super::ensure_authenticated(&provider, set, state_manager, Operation::Teardown, json).await?;
    if !authenticated {
        return Ok(ExitCode::FAILURE);
    }

    let report = Executor::new(&provider, state_manager)
        .with_config(utils::executor_config(settings))
        .with_cancellation(super::cancel_on_ctrl_c())
        .teardown(set)
        .await?;

    utils::print_run(set, &report, json)?;
    Ok(ExitCode::from(report.exit_code() as u8))
}
