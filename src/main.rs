//! command line client for prometheus alertmanager
//!
//! Features:
//! - lists active alerts as table or json, filtered by service, severity and tag
//! - sorts alerts by severity, start, end or duration
//! - shows labels and annotations of single alerts
//! - relative times like `3h 12m AGO`
use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;
use settings::{Action, ConfigOrigin, Opts, Query, Settings};

use crate::{alert_renderer::AlertRenderer, fetch::AlertClient, pipeline::Pipeline};

mod alert;
mod alert_renderer;
mod fetch;
mod filter;
mod handoff;
mod log;
mod pipeline;
mod rendered_alert;
mod settings;
mod sort;
mod time_delta;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let opts = Opts::parse()?;

	let query = match &opts.action {
		Action::GenerateConfig(path) => {
			Settings::generate(path)?;
			println!("A new configuration file {} was generated.", path.display());
			return Ok(());
		}
		Action::Show(query) => query,
	};

	let (settings, origin) = Settings::load(&opts)?;

	log::setup_logging(settings.verbose).context("could not setup logging")?;

	match origin {
		ConfigOrigin::File(path) => tracing::info!("loaded config from {}", path.display()),
		ConfigOrigin::Missing(path) => {
			tracing::warn!("config file missing at {}, using defaults", path.display())
		}
		ConfigOrigin::Defaults => tracing::warn!("no config file location, using defaults"),
	}
	tracing::debug!(url = %settings.url, timeout = ?settings.http_timeout, "configuration");

	run(&settings, query).await
}

/// one fetch, process, render cycle
async fn run(settings: &Settings, query: &Query) -> Result<()> {
	let renderer = AlertRenderer::new(settings).context("failed to construct alert renderer")?;
	let client = AlertClient::new(settings).context("failed to construct alertmanager client")?;

	let mut pipeline = Pipeline::collect(fetch::spawn_producer(client)).await;
	pipeline.sort(query.sort, &settings.severity);

	match renderer.render(&pipeline, query, &Utc::now()) {
		Ok(output) => {
			let mut stdout = std::io::stdout().lock();
			if let Err(err) = stdout.write_all(output.as_bytes()).and_then(|()| stdout.flush()) {
				tracing::error!("failed to write alerts: {err}");
			}
		}
		Err(err) => tracing::error!("{err:#}"),
	}

	Ok(())
}
