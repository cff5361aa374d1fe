use colored::Colorize;
use stackflow_cloud::{ActionType, Plan, StateManager};
use stackflow_core::DescriptorSet;
use std::process::ExitCode;

pub async fn handle(
    set: &DescriptorSet,
    state_manager: &StateManager,
    teardown: bool,
) -> anyhow::Result<ExitCode> {
    let state = state_manager.load().await?;
    let plan = if teardown {
        Plan::for_teardown(set, &state)
    } else {
        Plan::for_provision(set, &state)
    };

    println!(
        "{} {} ({})",
        "Plan for".bold(),
        set.deployment.cyan().bold(),
        if teardown { "teardown" } else { "provision" }
    );
    println!();

    let width = plan
        .actions
        .iter()
        .map(|a| a.resource_id.len())
        .max()
        .unwrap_or(0);
    for action in &plan.actions {
        let marker = match action.action_type {
            ActionType::Create => "+".green().bold(),
            ActionType::Delete => "-".red().bold(),
            ActionType::NoOp => "=".dimmed(),
        };
        println!(
            "  {} {:<width$}  {}",
            marker,
            action.resource_id,
            action.description.dimmed(),
            width = width
        );
    }

    println!();
    println!("{}", plan.summary());
    Ok(ExitCode::SUCCESS)
}
