mod bootstrap;

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::{Context, Result};
use recon_core::settings::Settings;
use recon_runtime::orchestrator::ReconOrchestrator;
use recon_runtime::summary_log::CsvSummarySink;
use recon_ui::{render_json, render_report};

fn main() -> ExitCode {
    let settings = Settings::load_with_last_used();

    if let Err(e) = bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref()) {
        eprintln!("warning: logging disabled: {e:#}");
    }

    tracing::info!("banner-recon v{} starting", env!("CARGO_PKG_VERSION"));

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> Result<()> {
    let config = settings.run_config()?;
    tracing::info!(
        "CPA limit: {}, connect target: {}%, meeting target: {}%, join: {:?}",
        config.thresholds.cpa_limit,
        config.thresholds.connect_target,
        config.thresholds.meeting_target,
        config.join
    );

    let orchestrator = ReconOrchestrator::new(config);
    let outcome = orchestrator
        .run(&settings.spend, &settings.leads)
        .context("reconciliation failed")?;

    match settings.format.as_str() {
        "json" => println!("{}", render_json(&outcome.analysis)?),
        _ => {
            let color = !settings.no_color && std::io::stdout().is_terminal();
            print!("{}", render_report(&outcome.analysis, color));
        }
    }

    if let Some(path) = &settings.summary_log {
        let mut sink = CsvSummarySink::new(path);
        orchestrator
            .record(&outcome, &mut sink)
            .with_context(|| format!("cannot append to summary log {}", path.display()))?;
        tracing::info!("Summary row appended to {}", path.display());
    }

    Ok(())
}
