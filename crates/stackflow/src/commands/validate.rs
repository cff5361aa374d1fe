use colored::Colorize;
use stackflow_core::{DescriptorSet, ResourceKind};
use std::path::Path;
use std::process::ExitCode;

/// Loading already validated the file; this prints what was found
pub fn handle(path: &Path, set: &DescriptorSet) -> anyhow::Result<ExitCode> {
    println!("Descriptor file: {}", path.display().to_string().cyan());
    println!("{}", "✓ Descriptor file is valid".green().bold());
    println!();
    println!("Summary:");
    println!("  Deployment: {}", set.deployment.cyan());
    println!("  Resources: {}", set.len());
    for kind in ResourceKind::ALL {
        let of_kind = set.by_kind(kind);
        if !of_kind.is_empty() {
            let ids: Vec<&str> = of_kind.iter().map(|d| d.id.as_str()).collect();
            println!("    - {} ({})", kind, ids.join(", "));
        }
    }

    println!();
    println!("Provisioning order:");
    for (i, desc) in set.ordered().enumerate() {
        if desc.depends_on.is_empty() {
            println!("  {}. {}", i + 1, desc.id.cyan());
        } else {
            println!(
                "  {}. {} {}",
                i + 1,
                desc.id.cyan(),
                format!("(after {})", desc.depends_on.join(", ")).dimmed()
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}
