use colored::{ColoredString, Colorize};
use serde::Serialize;
use stackflow_cloud::{
    DeploymentResult, ExecutorConfig, ResourceOutcome, ResourceStatus, RetryConfig, RunOutcome,
    RunReport, StateManager,
};
use stackflow_config::Settings;
use stackflow_core::DescriptorSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exit code for configuration errors
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// 2 for descriptor or settings problems, 1 for everything else
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    let is_config = err.chain().any(|cause| {
        cause.is::<stackflow_core::ConfigError>() || cause.is::<stackflow_config::SettingsError>()
    });
    if is_config { EXIT_CONFIG_ERROR } else { 1 }
}

/// Locate and load the descriptor file
pub fn load_descriptors(file: Option<PathBuf>) -> anyhow::Result<(PathBuf, DescriptorSet)> {
    let path = match file {
        Some(path) => path,
        None => stackflow_config::find_stack_file()?,
    };
    tracing::debug!(path = %path.display(), "Using descriptor file");
    let set = stackflow_core::load(&path)?;
    Ok((path, set))
}

/// State lives next to the descriptor file unless `state_dir` says otherwise
pub fn state_manager(
    settings: &Settings,
    descriptor_path: &Path,
    set: &DescriptorSet,
) -> anyhow::Result<StateManager> {
    let root = match &settings.state_dir {
        Some(dir) => dir.clone(),
        None => descriptor_path
            .canonicalize()?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    Ok(StateManager::new(root, &set.deployment))
}

pub fn executor_config(settings: &Settings) -> ExecutorConfig {
    ExecutorConfig {
        retry: RetryConfig {
            max_attempts: settings.max_attempts,
            initial_delay: Duration::from_millis(settings.initial_backoff_ms),
            max_delay: Duration::from_millis(settings.max_backoff_ms),
            ..RetryConfig::default()
        },
        call_timeout: Duration::from_secs(settings.call_timeout_secs),
    }
}

pub fn colored_status(status: ResourceStatus) -> ColoredString {
    paint(status, status.to_string())
}

fn paint(status: ResourceStatus, text: String) -> ColoredString {
    match status {
        ResourceStatus::Created => text.green(),
        ResourceStatus::Failed => text.red().bold(),
        ResourceStatus::Blocked => text.yellow(),
        ResourceStatus::Unknown => text.magenta(),
        ResourceStatus::Creating => text.cyan(),
        ResourceStatus::Pending | ResourceStatus::Deleted => text.dimmed(),
    }
}

/// Print one line per resource, including the cause of failures
pub fn print_resources(resources: &[ResourceOutcome]) {
    let width = resources.iter().map(|r| r.id.len()).max().unwrap_or(0);
    for resource in resources {
        // pad before coloring so escape codes do not skew the columns
        let status = paint(resource.status, format!("{:<8}", resource.status.to_string()));
        println!(
            "  {}  {:<width$}  {}",
            status,
            resource.id,
            resource.kind.to_string().dimmed(),
            width = width
        );
        if let Some(error) = &resource.error {
            println!("      {} {}", "↳".dimmed(), error);
        }
    }
}

pub fn print_outcome(outcome: RunOutcome) {
    let text = format!("Run {}", outcome);
    let text = match outcome {
        RunOutcome::Succeeded => text.green().bold(),
        RunOutcome::PartialFailure => text.yellow().bold(),
        RunOutcome::Aborted | RunOutcome::Cancelled => text.red().bold(),
    };
    println!("{}", text);
}

#[derive(Serialize)]
struct RunOutput<'a> {
    deployment: &'a str,
    #[serde(flatten)]
    report: &'a RunReport,
    result: DeploymentResult,
}

/// Print a finished run as text or JSON
pub fn print_run(set: &DescriptorSet, report: &RunReport, json: bool) -> anyhow::Result<()> {
    let result = DeploymentResult::collect(set, &report.state);
    if json {
        let output = RunOutput {
            deployment: &set.deployment,
            report,
            result,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("{}", "Resources:".bold());
    print_resources(&report.resources);
    println!();
    print_outcome(report.outcome);
    println!();
    print!("{}", result);
    Ok(())
}
