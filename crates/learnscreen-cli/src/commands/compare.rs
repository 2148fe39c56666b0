//! The `learnscreen compare` command.

use std::path::PathBuf;

use anyhow::Result;

use learnscreen_core::report::ScreeningReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_decline: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");
    let baseline = ScreeningReport::load_json(&baseline_path)?;
    let current = ScreeningReport::load_json(&current_path)?;
    if baseline.user_id != current.user_id {
        eprintln!(
            "Warning: comparing reports for different children ({} vs {})",
            baseline.user_id, current.user_id
        );
    }

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            // text format
            println!(
                "Comparison: {} declines, {} improvements, {} unchanged",
                report.declines.len(),
                report.improvements.len(),
                report.unchanged
            );
            println!(
                "Overall risk: {} -> {}",
                report.baseline_tier.label(),
                report.current_tier.label()
            );

            if !report.declines.is_empty() {
                println!("\nDeclines:");
                for d in &report.declines {
                    println!(
                        "  {} {:.1}% -> {:.1}% ({:+.1}%)",
                        d.domain.title(),
                        d.baseline_accuracy,
                        d.current_accuracy,
                        d.delta
                    );
                }
            }

            if !report.improvements.is_empty() {
                println!("\nImprovements:");
                for i in &report.improvements {
                    println!(
                        "  {} {:.1}% -> {:.1}% ({:+.1}%)",
                        i.domain.title(),
                        i.baseline_accuracy,
                        i.current_accuracy,
                        i.delta
                    );
                }
            }

            if !report.new_domains.is_empty() {
                println!("\n{} newly played game(s)", report.new_domains.len());
            }
            if !report.missing_domains.is_empty() {
                println!("{} game(s) no longer present", report.missing_domains.len());
            }
        }
    }

    if fail_on_decline && report.has_declines() {
        std::process::exit(1);
    }

    Ok(())
}
