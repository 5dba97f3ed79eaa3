use super::{json_pretty, EXIT_FAILURE, EXIT_SUCCESS};
use freeroot_runtime::prereq::Check;
use freeroot_runtime::{format_missing, inspect_host, HostReport};
use freeroot_schema::{resolve_with_override, BootstrapConfig};
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub fn run(config: &BootstrapConfig, json_output: bool) -> Result<u8, String> {
    let urls = match resolve_with_override(config.arch_override.as_deref()) {
        Ok(arch) => vec![config.engine.url(arch), config.rootfs.url(arch)],
        Err(_) => Vec::new(),
    };
    let report = inspect_host(&config.workspace, &urls, PROBE_TIMEOUT);
    let problems = report.blocking_problems();
    let healthy = problems.is_empty();

    if json_output {
        let json = serde_json::json!({
            "healthy": healthy,
            "host": report,
            "problems": problems,
        });
        println!("{}", json_pretty(&json)?);
    } else {
        print_report(&report);
        println!();
        if healthy {
            println!("All checks passed.");
        } else {
            print!("{}", format_missing(&problems));
        }
    }
    Ok(if healthy { EXIT_SUCCESS } else { EXIT_FAILURE })
}

fn print_report(report: &HostReport) {
    println!("freeroot doctor\n");
    let arch = report
        .architecture
        .map_or_else(|| "unsupported".to_owned(), |a| a.to_string());
    println!(
        "  host {} (uid {}, {} -> {arch}{})",
        report.hostname,
        report.uid,
        report.machine,
        if report.in_container { ", container" } else { "" }
    );

    println!("\nWritable locations");
    print_checks(&report.writable, "⚠");
    println!("\nHost commands");
    print_checks(&report.commands, "ℹ");
    if !report.network.is_empty() {
        println!("\nArtifact hosts");
        print_checks(&report.network, "✗");
    }
}

fn print_checks(checks: &[Check], miss_icon: &str) {
    for check in checks {
        let icon = if check.ok { "✓" } else { miss_icon };
        println!("  {icon} {} ({})", check.name, check.detail);
    }
}
