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

//! Logging initialization for the matchmaking service
//!
//! # Configuration
//!
//! - `RUST_LOG`: log level filter (default: `info`)
//! - `LOG_DIR`: root directory for log files (default: `./logs`); files
//!   land in `{LOG_DIR}/matchmaking/` and roll daily as
//!   `matchmaking.{date}.log`
//! - `LOG_TO_CONSOLE`: set to `true`, `1`, or `yes` to also log to stderr
//!
//! File output carries UTC timestamps and thread ids, no ANSI colors.

use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::{
	non_blocking,
	non_blocking::WorkerGuard,
	rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
	EnvFilter, fmt, layer::SubscriberExt, registry::Registry, util::SubscriberInitExt,
};

use crate::config::{DEFAULT_LOG_LEVEL, DEFAULT_LOG_TO_CONSOLE, LOG_COMPONENT_NAME};

/// Initialize logging with daily-rolling file output and optional
/// console output.
///
/// Returns the writer guard; buffered lines are flushed when it drops,
/// so the caller must hold it for the life of the process.
pub fn init_logging() -> Result<WorkerGuard> {
	dotenv::dotenv().ok();

	let log_dir = env::var("LOG_DIR")
		.map(PathBuf::from)
		.unwrap_or_else(|_| PathBuf::from("logs"))
		.join(LOG_COMPONENT_NAME);
	std::fs::create_dir_all(&log_dir)
		.with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

	let file_appender = RollingFileAppender::builder()
		.rotation(Rotation::DAILY)
		.filename_prefix(LOG_COMPONENT_NAME)
		.filename_suffix(".log")
		.build(&log_dir)
		.with_context(|| {
			format!(
				"Failed to create rolling file appender in {}",
				log_dir.display()
			)
		})?;
	let (file_writer, guard) = non_blocking(file_appender);

	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

	let subscriber = Registry::default().with(filter).with(
		fmt::layer()
			.with_writer(file_writer)
			.with_timer(fmt::time::UtcTime::rfc_3339())
			.with_thread_ids(true)
			.with_ansi(false),
	);

	let log_to_console = env::var("LOG_TO_CONSOLE")
		.map(|v| v == "true" || v == "1" || v == "yes")
		.unwrap_or(DEFAULT_LOG_TO_CONSOLE);
	if log_to_console {
		subscriber
			.with(fmt::layer().with_writer(std::io::stderr).with_ansi(true))
			.init();
	} else {
		subscriber.init();
	}

	info!(
		log_dir = %log_dir.display(),
		console = log_to_console,
		"Logging initialized"
	);

	Ok(guard)
}
