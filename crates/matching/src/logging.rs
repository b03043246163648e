// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Logging initialization for the papermill service
//!
//! Logs always go to a daily-rolling file; stderr output is optional.
//!
//! # Configuration
//!
//! - `RUST_LOG`: filter directives (default: `info`), e.g.
//!   `RUST_LOG=papermill_matching=debug,engine=trace`
//! - `LOG_DIR`: root directory for log files (default: `{workspace_root}/logs`).
//!   Files land in `{LOG_DIR}/papermill/`
//! - `LOG_TO_CONSOLE`: `true`, `1` or `yes` to also log to stderr with ANSI colors
//!
//! A `.env` file in the working directory is loaded first.
//!
//! # Log File Format
//!
//! - Filename: `papermill.{date}.log`, one file per UTC day
//! - Line: UTC RFC 3339 timestamp, thread id, level, target, message and fields
//! - No ANSI colors in files

use std::{
	env,
	path::{Path, PathBuf},
	sync::OnceLock,
};

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::{
	non_blocking,
	rolling::{self, Rotation},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{DEFAULT_LOG_LEVEL, DEFAULT_LOG_TO_CONSOLE, LOG_COMPONENT_NAME};

// Keeps the non-blocking writer flushing until process exit
static LOG_GUARD: OnceLock<non_blocking::WorkerGuard> = OnceLock::new();

/// Walk up from `start` to the first directory whose Cargo.toml declares a workspace
fn find_workspace_root(start: &Path) -> Option<PathBuf> {
	start.ancestors().find_map(|dir| {
		let manifest = dir.join("Cargo.toml");
		std::fs::read_to_string(&manifest)
			.ok()
			.filter(|content| content.contains("[workspace]"))
			.map(|_| dir.to_path_buf())
	})
}

fn log_root() -> PathBuf {
	if let Ok(dir) = env::var("LOG_DIR") {
		return PathBuf::from(dir);
	}

	let start = env::var("CARGO_MANIFEST_DIR")
		.map(PathBuf::from)
		.or_else(|_| env::current_dir())
		.unwrap_or_else(|_| PathBuf::from("."));

	find_workspace_root(&start)
		.unwrap_or(start)
		.join("logs")
}

fn console_enabled() -> bool {
	env::var("LOG_TO_CONSOLE")
		.map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
		.unwrap_or(DEFAULT_LOG_TO_CONSOLE)
}

fn file_writer(log_dir: &Path) -> Result<non_blocking::NonBlocking> {
	let appender = rolling::RollingFileAppender::builder()
		.rotation(Rotation::DAILY)
		.filename_prefix(LOG_COMPONENT_NAME)
		.filename_suffix("log")
		.build(log_dir)
		.with_context(|| {
			format!(
				"Failed to create rolling file appender in {}",
				log_dir.display()
			)
		})?;

	let (writer, guard) = non_blocking(appender);
	LOG_GUARD.set(guard).ok();

	Ok(writer)
}

/// Initialize logging with file output and optional console output
///
/// Call once, before anything logs. Fails if the log directory cannot be
/// created or a global subscriber is already installed.
pub fn init_logging() -> Result<()> {
	dotenv::dotenv().ok();

	let log_level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
	let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

	let log_dir = log_root().join(LOG_COMPONENT_NAME);
	std::fs::create_dir_all(&log_dir)
		.with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

	let file_layer = fmt::layer()
		.with_writer(file_writer(&log_dir)?)
		.with_timer(fmt::time::UtcTime::rfc_3339())
		.with_thread_ids(true)
		.with_target(true)
		.with_ansi(false);

	let log_to_console = console_enabled();
	let console_layer = log_to_console.then(|| {
		fmt::layer()
			.with_writer(std::io::stderr)
			.with_timer(fmt::time::UtcTime::rfc_3339())
			.with_thread_ids(true)
			.with_target(true)
			.with_ansi(true)
	});

	tracing_subscriber::registry()
		.with(filter)
		.with(file_layer)
		.with(console_layer)
		.try_init()
		.context("Failed to install tracing subscriber")?;

	info!(target: "server", "Log level: {}", log_level);
	info!(target: "server", "Log directory: {}", log_dir.display());
	info!(
		target: "server",
		"Log file base name: {}.YYYY-MM-DD.log (daily rolling)",
		LOG_COMPONENT_NAME
	);
	if log_to_console {
		info!(target: "server", "Console output: enabled");
	}

	Ok(())
}
