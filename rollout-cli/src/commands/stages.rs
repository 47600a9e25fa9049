//! Stages command handler

use anyhow::Result;
use colored::*;
use rollout_core::domain::stage::StageName;
use rollout_runner::Config;
use std::process::ExitCode;

use super::PipelineArgs;

/// Print the fixed stage order and whether each stage aborts the run
///
/// Only the scan setting affects the listing, so the rest of the pipeline
/// configuration is not validated here.
pub fn handle_stages(args: PipelineArgs) -> Result<ExitCode> {
    println!("{}", "Pipeline stages:".bold());
    println!();
    for (stage, blocking) in stage_modes(args.scan_blocking) {
        let mode = if blocking {
            "blocking".normal()
        } else {
            "non-blocking".yellow()
        };
        println!(
            "  {} {:<20} {}",
            format!("{}.", stage.position()).dimmed(),
            stage.as_str().bold(),
            mode
        );
    }

    Ok(ExitCode::SUCCESS)
}

fn stage_modes(scan_blocking: bool) -> Vec<(StageName, bool)> {
    let config = Config {
        scan_blocking,
        ..Config::default()
    };
    StageName::ALL
        .into_iter()
        .map(|stage| (stage, config.is_blocking(stage)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: PipelineArgs,
    }

    #[test]
    fn test_listing_ignores_unrelated_bad_settings() {
        let cli = TestCli::try_parse_from([
            "rollout",
            "--account-id",
            "not-an-account",
            "--quality-gate-timeout",
            "0",
        ])
        .unwrap();

        assert_eq!(handle_stages(cli.args).unwrap(), ExitCode::SUCCESS);
    }

    #[test]
    fn test_scan_is_the_only_non_blocking_stage() {
        let modes = stage_modes(false);
        assert_eq!(modes.len(), 9);
        assert_eq!(
            modes
                .iter()
                .filter(|(_, blocking)| !blocking)
                .map(|(stage, _)| *stage)
                .collect::<Vec<_>>(),
            vec![StageName::VulnerabilityScan]
        );

        assert!(stage_modes(true).iter().all(|(_, blocking)| *blocking));
    }
}
