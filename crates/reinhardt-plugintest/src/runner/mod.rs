//! A small plugin-aware test runner
//!
//! [`TestProgram::run`] parses a `runtests`-style argument vector, enables
//! plugins by `--with-<name>` flag or `RUNTESTS_WITH_<NAME>` variable, runs
//! a [`TestSuite`] and writes a text report into the [`Config`] stream.

mod case;
mod config;
mod loader;
mod plugin;
mod program;
mod result;

pub use case::{FailureKind, Outcome, TestCase, TestFailure, TestSuite};
pub use config::{Config, OutputBuffer};
pub use loader::{DirectoryLoader, Loader, TEST_MATCH};
pub use plugin::{Plugin, PluginManager, activation_env_var, activation_flag};
pub use program::TestProgram;
pub use result::{RunSummary, TestResult};
