//! Normalizing run reports for comparison

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::RunnerResult;
use crate::runner::{Config, OutputBuffer, Plugin, PluginManager, TestProgram, TestSuite};

static TRACEBACK_RE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(concat!(
		r"(?ms)^(?P<hdr>Traceback \((?:most recent call last|innermost last)\):|stack backtrace:)\s*$",
		r"(?P<stack>.*?)",
		r"^(?P<msg>\w+.*)",
	))
	.expect("traceback pattern is valid")
});

static TIMING_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"Ran (\d+ tests?) in [0-9.]+s").expect("timing pattern is valid"));

/// Split `text` into blocks, each ending at (and including) a blank line.
/// Line endings are kept, so the blocks concatenate back to `text`.
///
/// # Examples
///
/// ```
/// use reinhardt_plugintest::output::blankline_separated_blocks;
///
/// let blocks = blankline_separated_blocks("spam\n\nham\neggs\n\nfoo\n");
/// assert_eq!(blocks, vec!["spam\n\n", "ham\neggs\n\n", "foo\n"]);
/// ```
pub fn blankline_separated_blocks(text: &str) -> Vec<String> {
	let mut blocks = Vec::new();
	let mut block = String::new();
	for line in text.split_inclusive('\n') {
		block.push_str(line);
		if line.trim().is_empty() {
			blocks.push(std::mem::take(&mut block));
		}
	}
	if !block.is_empty() {
		blocks.push(block);
	}
	blocks
}

/// Replace the frames of every stack trace with `...`, keeping the header
/// and the first line that starts with a word character.
///
/// # Examples
///
/// ```
/// use reinhardt_plugintest::output::remove_stack_traces;
///
/// let out = "Traceback (most recent call last):\n  File \"x\", line 1\nValueError: bad\n";
/// assert_eq!(
///     remove_stack_traces(out),
///     "Traceback (most recent call last):\n...\nValueError: bad\n"
/// );
/// ```
pub fn remove_stack_traces(out: &str) -> String {
	blankline_separated_blocks(out)
		.iter()
		.map(|block| TRACEBACK_RE.replace(block, "${hdr}\n...\n${msg}").into_owned())
		.collect()
}

/// Make a run report stable: stack traces collapsed, timings hidden and
/// surrounding whitespace trimmed.
///
/// # Examples
///
/// ```
/// use reinhardt_plugintest::output::munge_output;
///
/// let out = "..\n----------------------------------------------------------------------\nRan 2 tests in 0.013s\n\nOK\n";
/// assert_eq!(
///     munge_output(out),
///     "..\n----------------------------------------------------------------------\nRan 2 tests in ...s\n\nOK"
/// );
/// ```
pub fn munge_output(out: &str) -> String {
	let out = remove_stack_traces(out);
	TIMING_RE
		.replace_all(&out, "Ran $1 in ...s")
		.trim()
		.to_string()
}

/// Everything besides argv that [`run`] accepts.
#[derive(Debug, Default)]
pub struct RunOptions {
	pub plugins: Option<PluginManager>,
	pub env: Vec<(String, String)>,
	pub config: Option<Config>,
	pub suite: Option<TestSuite>,
}

impl RunOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn plugin(mut self, plugin: Box<dyn Plugin>) -> Self {
		self.plugins.get_or_insert_with(PluginManager::default).add(plugin);
		self
	}

	pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env.push((key.into(), value.into()));
		self
	}

	pub fn config(mut self, config: Config) -> Self {
		self.config = Some(config);
		self
	}

	pub fn suite(mut self, suite: TestSuite) -> Self {
		self.suite = Some(suite);
		self
	}
}

/// Run the program into a fresh buffer and return its munged report.
///
/// Plugins in `options` replace those of `options.config`; environment
/// entries are added to it.
///
/// # Examples
///
/// ```
/// use reinhardt_plugintest::output::{run, RunOptions};
/// use reinhardt_plugintest::runner::{TestCase, TestSuite};
///
/// let suite = TestSuite::new().with_test(TestCase::new("test_ok", || Ok(())));
/// let out = run(["runtests"], RunOptions::new().suite(suite)).unwrap();
/// assert_eq!(
///     out,
///     ".\n----------------------------------------------------------------------\nRan 1 test in ...s\n\nOK"
/// );
/// ```
pub fn run<I, T>(argv: I, options: RunOptions) -> RunnerResult<String>
where
	I: IntoIterator<Item = T>,
	T: Into<String>,
{
	let RunOptions {
		plugins,
		env,
		config,
		suite,
	} = options;
	let stream = OutputBuffer::new();
	let mut config = config.unwrap_or_default().with_stream(stream.clone());
	if let Some(plugins) = plugins {
		config = config.with_plugins(plugins);
	}
	config = config.with_envs(env.into_iter().collect());

	TestProgram::run(argv, config, suite)?;
	Ok(munge_output(&stream.contents()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_blocks_reassemble() {
		// Arrange
		let text = "a\n\n\nb\n";

		// Act
		let blocks = blankline_separated_blocks(text);

		// Assert
		assert_eq!(blocks, vec!["a\n\n", "\n", "b\n"]);
		assert_eq!(blocks.concat(), text);
	}

	#[rstest]
	#[case(
		"Traceback (innermost last):\n  File \"a\"\n    boom()\nNameError: boom\n",
		"Traceback (innermost last):\n...\nNameError: boom\n"
	)]
	#[case(
		"stack backtrace:\n   0: main\n   1: start\nError: disk gone\n",
		"stack backtrace:\n...\nError: disk gone\n"
	)]
	#[case("no trace here\n", "no trace here\n")]
	fn test_remove_stack_traces(#[case] input: &str, #[case] expected: &str) {
		// Act & Assert
		assert_eq!(remove_stack_traces(input), expected);
	}

	#[rstest]
	fn test_traces_in_separate_blocks() {
		// Arrange
		let out = "\
stack backtrace:
   0: a
Failure: one

stack backtrace:
   0: b
Failure: two
";

		// Act
		let cleaned = remove_stack_traces(out);

		// Assert
		assert_eq!(
			cleaned,
			"stack backtrace:\n...\nFailure: one\n\nstack backtrace:\n...\nFailure: two\n"
		);
	}

	#[rstest]
	#[case("Ran 1 test in 0.001s", "Ran 1 test in ...s")]
	#[case("  Ran 12 tests in 3.5s\n\n", "Ran 12 tests in ...s")]
	fn test_munge_timing(#[case] input: &str, #[case] expected: &str) {
		// Act & Assert
		assert_eq!(munge_output(input), expected);
	}
}
