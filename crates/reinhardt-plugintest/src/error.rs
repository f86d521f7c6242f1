//! Runner error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors raised while configuring or driving a test run.
///
/// Failing tests are not errors; they are reported in the
/// [`RunSummary`](crate::runner::RunSummary).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
	/// The argument vector was rejected.
	#[error("{0}")]
	Usage(#[from] clap::Error),

	/// A suite path could not be read.
	#[error("cannot load tests from {path}: {source}")]
	Load {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// A suite path is neither a directory nor a file.
	#[error("no tests found at {0}")]
	NoSuchSuite(PathBuf),

	/// No suite path was configured and the tester did not build a suite.
	#[error("make_suite must be implemented when suite_path is None")]
	MissingSuite,

	/// A plugin rejected its configuration.
	#[error("plugin '{plugin}' failed to configure: {message}")]
	Plugin { plugin: String, message: String },

	/// Writing to the output stream failed.
	#[error("failed to write runner output")]
	Output(#[from] std::fmt::Error),
}
