//! Command-line driven test runs

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fmt::Write;
use std::path::PathBuf;
use std::time::Instant;

use super::case::{Outcome, TestSuite};
use super::config::{Config, OutputBuffer};
use super::plugin::PluginManager;
use super::result::RunSummary;
use crate::error::RunnerResult;

const SEPARATOR_THICK: &str =
	"======================================================================";
const SEPARATOR_THIN: &str =
	"----------------------------------------------------------------------";

/// Parses an argument vector, loads or takes a suite, runs it with the
/// enabled plugins and writes a report to the configured stream.
///
/// # Examples
///
/// ```
/// use reinhardt_plugintest::runner::{Config, OutputBuffer, TestCase, TestFailure, TestProgram, TestSuite};
///
/// let stream = OutputBuffer::new();
/// let suite = TestSuite::new()
///     .with_test(TestCase::new("passes", || Ok(())))
///     .with_test(TestCase::new("fails", || Err(TestFailure::fail("nope"))));
///
/// let summary = TestProgram::run(
///     ["runtests"],
///     Config::new().with_stream(stream.clone()),
///     Some(suite),
/// )
/// .unwrap();
///
/// assert_eq!(summary.tests_run(), 2);
/// assert!(stream.contents().starts_with(".F\n"));
/// assert!(stream.contents().ends_with("FAILED (failures=1)\n"));
/// ```
#[derive(Debug)]
pub struct TestProgram;

impl TestProgram {
	fn command(plugins: &PluginManager) -> Command {
		let command = Command::new("runtests")
			.about("Run a test suite with plugins")
			.arg(
				Arg::new("verbose")
					.short('v')
					.long("verbose")
					.action(ArgAction::Count)
					.help("Be more verbose (can be repeated)"),
			)
			.arg(
				Arg::new("quiet")
					.short('q')
					.long("quiet")
					.action(ArgAction::Count)
					.help("Be less verbose"),
			)
			.arg(
				Arg::new("stop")
					.short('x')
					.long("stop")
					.action(ArgAction::SetTrue)
					.help("Stop running tests after the first error or failure"),
			)
			.arg(
				Arg::new("paths")
					.value_name("PATH")
					.num_args(0..)
					.value_parser(clap::value_parser!(PathBuf))
					.help("Suites to load"),
			);
		plugins.add_options(command)
	}

	/// Run a suite.
	///
	/// `argv[0]` is the program name. When `suite` is `None` the positional
	/// paths (or the current directory) are loaded with the configured
	/// loader.
	pub fn run<I, T>(argv: I, mut config: Config, suite: Option<TestSuite>) -> RunnerResult<RunSummary>
	where
		I: IntoIterator<Item = T>,
		T: Into<String>,
	{
		let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
		let mut plugins = std::mem::take(&mut config.plugins);
		let matches = Self::command(&plugins).try_get_matches_from(&argv)?;
		Self::apply_flags(&matches, &mut config);
		plugins.configure(&matches, &config)?;
		tracing::debug!(?argv, enabled = ?plugins.enabled_names(), "starting test run");

		let suite = match suite {
			Some(suite) => suite,
			None => Self::load(&matches, &config)?,
		};
		let mut runner = TextRunner {
			out: config.stream().clone(),
			verbosity: config.verbosity(),
			stop: config.stop(),
			plugins: &mut plugins,
		};
		runner.run(&suite)
	}

	fn apply_flags(matches: &ArgMatches, config: &mut Config) {
		let louder = matches.get_count("verbose");
		let quieter = matches.get_count("quiet");
		let verbosity = config
			.verbosity()
			.saturating_add(louder)
			.saturating_sub(quieter);
		config.set_verbosity(verbosity);
		if matches.get_flag("stop") {
			config.set_stop(true);
		}
	}

	fn load(matches: &ArgMatches, config: &Config) -> RunnerResult<TestSuite> {
		let paths: Vec<PathBuf> = match matches.get_many::<PathBuf>("paths") {
			Some(paths) => paths.cloned().collect(),
			None => vec![PathBuf::from(".")],
		};
		let mut suite = TestSuite::new();
		for path in paths {
			suite.extend(config.loader().load(&path, config)?);
		}
		Ok(suite)
	}
}

struct TextRunner<'a> {
	out: OutputBuffer,
	verbosity: u8,
	stop: bool,
	plugins: &'a mut PluginManager,
}

impl TextRunner<'_> {
	fn run(&mut self, suite: &TestSuite) -> RunnerResult<RunSummary> {
		let mut summary = RunSummary::default();
		let started = Instant::now();
		self.plugins.each_enabled(|p| p.begin());

		for test in suite.iter() {
			self.plugins.each_enabled(|p| p.start_test(test));
			if self.verbosity > 1 {
				write!(self.out, "{} ... ", test.name())?;
			}
			let outcome = test.run();
			match &outcome {
				Outcome::Ok => self.plugins.each_enabled(|p| p.add_success(test)),
				Outcome::Failure(f) => self.plugins.each_enabled(|p| p.add_failure(test, f)),
				Outcome::Error(f) => self.plugins.each_enabled(|p| p.add_error(test, f)),
				Outcome::Skip(f) => self.plugins.each_enabled(|p| p.add_skip(test, f)),
			}
			self.progress(&outcome)?;
			self.plugins.each_enabled(|p| p.stop_test(test));

			let stop_here = self.stop && outcome.is_problem();
			summary.record(test.name(), outcome);
			if stop_here {
				tracing::debug!(test = test.name(), "stopping after first problem");
				break;
			}
		}
		summary.set_elapsed(started.elapsed());

		if self.verbosity == 1 {
			writeln!(self.out)?;
		}
		self.print_errors(&summary)?;
		self.plugins.report(&mut self.out)?;
		let count = summary.tests_run();
		writeln!(self.out, "{}", SEPARATOR_THIN)?;
		writeln!(
			self.out,
			"Ran {} test{} in {:.3}s",
			count,
			if count == 1 { "" } else { "s" },
			summary.elapsed().as_secs_f64()
		)?;
		writeln!(self.out)?;
		writeln!(self.out, "{}", summary.status_line())?;

		self.plugins.each_enabled(|p| p.finalize(&summary));
		Ok(summary)
	}

	fn progress(&mut self, outcome: &Outcome) -> RunnerResult<()> {
		match self.verbosity {
			0 => {}
			1 => write!(self.out, "{}", outcome.mark())?,
			_ => match outcome {
				Outcome::Skip(reason) => writeln!(self.out, "SKIP: {}", reason.message())?,
				other => writeln!(self.out, "{}", other.word())?,
			},
		}
		Ok(())
	}

	fn print_errors(&mut self, summary: &RunSummary) -> RunnerResult<()> {
		let blocks = summary
			.errors()
			.into_iter()
			.map(|(name, f)| ("ERROR", name, f))
			.chain(summary.failures().into_iter().map(|(name, f)| ("FAIL", name, f)));
		for (flavour, name, failure) in blocks {
			writeln!(self.out, "{}", SEPARATOR_THICK)?;
			writeln!(self.out, "{}: {}", flavour, name)?;
			writeln!(self.out, "{}", SEPARATOR_THIN)?;
			writeln!(self.out, "{}", failure.details())?;
			writeln!(self.out)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::runner::{TestCase, TestFailure};
	use rstest::rstest;

	fn mixed_suite() -> TestSuite {
		TestSuite::new()
			.with_test(TestCase::new("test_ok", || Ok(())))
			.with_test(TestCase::new("test_fail", || Err(TestFailure::fail("1 != 2"))))
			.with_test(TestCase::new("test_error", || Err(TestFailure::error("disk gone"))))
			.with_test(TestCase::new("test_skip", || Err(TestFailure::skip("not today"))))
	}

	fn run(argv: &[&str], suite: TestSuite) -> (RunSummary, String) {
		let stream = OutputBuffer::new();
		let summary = TestProgram::run(
			argv.iter().copied(),
			Config::new().with_stream(stream.clone()),
			Some(suite),
		)
		.unwrap();
		(summary, stream.contents())
	}

	#[rstest]
	fn test_default_report_layout() {
		// Act
		let (summary, out) = run(&["runtests"], mixed_suite());

		// Assert
		assert_eq!(summary.tests_run(), 4);
		let expected_head = "\
.FES
======================================================================
ERROR: test_error
----------------------------------------------------------------------
Error: disk gone

======================================================================
FAIL: test_fail
----------------------------------------------------------------------
Failure: 1 != 2

----------------------------------------------------------------------
Ran 4 tests in ";
		assert!(out.starts_with(expected_head), "{}", out);
		assert!(out.ends_with("s\n\nFAILED (failures=1, errors=1, SKIP=1)\n"), "{}", out);
	}

	#[rstest]
	fn test_verbose_lines() {
		// Act
		let (_, out) = run(&["runtests", "-v"], mixed_suite());

		// Assert
		assert!(out.starts_with(
			"test_ok ... ok\ntest_fail ... FAIL\ntest_error ... ERROR\ntest_skip ... SKIP: not today\n"
		));
	}

	#[rstest]
	fn test_quiet_has_no_progress() {
		// Act
		let (_, out) = run(&["runtests", "-q"], TestSuite::new().with_test(TestCase::new("a", || Ok(()))));

		// Assert
		assert!(out.starts_with(SEPARATOR_THIN), "{}", out);
		assert!(out.contains("Ran 1 test in "));
		assert!(out.ends_with("\nOK\n"));
	}

	#[rstest]
	fn test_stop_after_first_problem() {
		// Act
		let (summary, _) = run(&["runtests", "-x"], mixed_suite());

		// Assert
		assert_eq!(summary.tests_run(), 2);
	}

	#[rstest]
	fn test_unknown_flag_is_usage_error() {
		// Act
		let result = TestProgram::run(["runtests", "--bogus"], Config::new(), Some(TestSuite::new()));

		// Assert
		assert!(matches!(result, Err(crate::error::RunnerError::Usage(_))));
	}
}
