//! Run a stub suite with a plugin under test

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::{RunnerError, RunnerResult};
use crate::runner::{Config, OutputBuffer, Plugin, PluginManager, RunSummary, TestProgram, TestSuite};

/// Describes how to exercise a plugin.
///
/// Implementors name the activation argument, the plugins to install and
/// either a suite path for the loader or a suite built in
/// [`make_suite`](PluginTester::make_suite). [`set_up`](PluginTester::set_up)
/// then runs everything and captures the report.
///
/// # Examples
///
/// ```
/// use reinhardt_plugintest::runner::{Plugin, TestCase, TestSuite};
/// use reinhardt_plugintest::{PluginTester, RunnerResult};
/// use std::fmt::{self, Write};
///
/// struct Hello;
///
/// impl Plugin for Hello {
///     fn name(&self) -> &str {
///         "hello"
///     }
///
///     fn report(&mut self, out: &mut dyn fmt::Write) -> fmt::Result {
///         writeln!(out, "hello from the plugin")
///     }
/// }
///
/// struct HelloTest;
///
/// impl PluginTester for HelloTest {
///     fn activate(&self) -> &str {
///         "--with-hello"
///     }
///
///     fn plugins(&self) -> Vec<Box<dyn Plugin>> {
///         vec![Box::new(Hello)]
///     }
///
///     fn make_suite(&self) -> RunnerResult<TestSuite> {
///         Ok(TestSuite::new().with_test(TestCase::new("runs", || Ok(()))))
///     }
/// }
///
/// let run = HelloTest.set_up().unwrap();
/// assert!(run.output.contains("hello from the plugin"));
/// assert!(run.summary.was_successful());
/// ```
pub trait PluginTester {
	/// The argument that enables the plugin, e.g. `--with-timer`.
	fn activate(&self) -> &str;

	/// A path handed to the loader. When `None`, the suite comes from
	/// [`make_suite`](PluginTester::make_suite).
	fn suite_path(&self) -> Option<PathBuf> {
		None
	}

	/// Extra arguments placed after the activation argument.
	fn args(&self) -> Vec<String> {
		Vec::new()
	}

	/// Environment seen by plugins and spawned tests.
	fn env(&self) -> BTreeMap<String, String> {
		BTreeMap::new()
	}

	fn plugins(&self) -> Vec<Box<dyn Plugin>>;

	fn make_suite(&self) -> RunnerResult<TestSuite> {
		Err(RunnerError::MissingSuite)
	}

	/// Run the suite with the plugins installed.
	fn set_up(&self) -> RunnerResult<PluginRun> {
		let mut argv = vec!["runtests".to_string(), self.activate().to_string()];
		argv.extend(self.args());
		let suite = match self.suite_path() {
			Some(path) => {
				argv.push(path.display().to_string());
				None
			}
			None => Some(self.make_suite()?),
		};

		let stream = OutputBuffer::new();
		let config = Config::new()
			.with_envs(self.env())
			.with_stream(stream.clone())
			.with_plugins(PluginManager::new(self.plugins()));
		tracing::debug!(?argv, "running plugin suite");
		let summary = TestProgram::run(argv.iter().cloned(), config, suite)?;

		Ok(PluginRun {
			argv,
			summary,
			output: CapturedOutput::from(&stream),
		})
	}
}

/// What a [`PluginTester::set_up`] run produced.
#[derive(Debug, Clone)]
pub struct PluginRun {
	pub argv: Vec<String>,
	pub summary: RunSummary,
	pub output: CapturedOutput,
}

/// The text a run wrote to its stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
	text: String,
}

impl CapturedOutput {
	pub fn new(text: impl Into<String>) -> Self {
		Self { text: text.into() }
	}

	pub fn contains(&self, needle: &str) -> bool {
		self.text.contains(needle)
	}

	/// Lines without their line endings.
	pub fn lines(&self) -> impl Iterator<Item = &str> {
		self.text.lines()
	}

	pub fn as_str(&self) -> &str {
		&self.text
	}
}

impl From<&OutputBuffer> for CapturedOutput {
	fn from(buffer: &OutputBuffer) -> Self {
		Self::new(buffer.contents())
	}
}

impl fmt::Display for CapturedOutput {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.text)
	}
}
