//! Runner plugins and their activation

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fmt;

use super::case::{TestCase, TestFailure};
use super::config::Config;
use super::result::RunSummary;
use crate::error::RunnerResult;

/// Extends a test run.
///
/// Every hook has an empty default, so a plugin implements only what it
/// needs. Hooks are only called on enabled plugins.
pub trait Plugin: Send {
	/// Name used for the `--with-<name>` flag and the
	/// `RUNTESTS_WITH_<NAME>` environment variable.
	fn name(&self) -> &str;

	/// Enable the plugin even when it is not activated explicitly.
	fn enabled_by_default(&self) -> bool {
		false
	}

	/// Register extra command-line options.
	fn add_options(&self, command: Command) -> Command {
		command
	}

	/// Read options after the plugin has been enabled.
	fn configure(&mut self, _matches: &ArgMatches, _config: &Config) -> RunnerResult<()> {
		Ok(())
	}

	fn begin(&mut self) {}

	fn start_test(&mut self, _test: &TestCase) {}

	fn stop_test(&mut self, _test: &TestCase) {}

	fn add_success(&mut self, _test: &TestCase) {}

	fn add_failure(&mut self, _test: &TestCase, _failure: &TestFailure) {}

	fn add_error(&mut self, _test: &TestCase, _error: &TestFailure) {}

	fn add_skip(&mut self, _test: &TestCase, _reason: &TestFailure) {}

	/// Called once the report is written.
	fn finalize(&mut self, _summary: &RunSummary) {}

	/// Write a section into the run report, before [`finalize`](Plugin::finalize).
	fn report(&mut self, _out: &mut dyn fmt::Write) -> fmt::Result {
		Ok(())
	}
}

/// The flag that enables `name`.
pub fn activation_flag(name: &str) -> String {
	format!("with-{}", name)
}

/// The environment variable that enables `name`.
pub fn activation_env_var(name: &str) -> String {
	format!(
		"RUNTESTS_WITH_{}",
		name.to_uppercase().replace(['-', '.'], "_")
	)
}

struct Entry {
	plugin: Box<dyn Plugin>,
	enabled: bool,
}

/// The plugins available to a run, in call order.
#[derive(Default)]
pub struct PluginManager {
	entries: Vec<Entry>,
}

impl PluginManager {
	pub fn new(plugins: Vec<Box<dyn Plugin>>) -> Self {
		Self {
			entries: plugins
				.into_iter()
				.map(|plugin| Entry {
					enabled: plugin.enabled_by_default(),
					plugin,
				})
				.collect(),
		}
	}

	pub fn add(&mut self, plugin: Box<dyn Plugin>) {
		self.entries.push(Entry {
			enabled: plugin.enabled_by_default(),
			plugin,
		});
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn names(&self) -> Vec<&str> {
		self.entries.iter().map(|e| e.plugin.name()).collect()
	}

	/// Names of the plugins that are currently enabled.
	pub fn enabled_names(&self) -> Vec<&str> {
		self.entries
			.iter()
			.filter(|e| e.enabled)
			.map(|e| e.plugin.name())
			.collect()
	}

	/// Add every plugin's activation flag and options to `command`.
	pub(crate) fn add_options(&self, mut command: Command) -> Command {
		for entry in &self.entries {
			let name = entry.plugin.name();
			command = command.arg(
				Arg::new(activation_flag(name))
					.long(activation_flag(name))
					.action(ArgAction::SetTrue)
					.help(format!(
						"Enable plugin {} [{}]",
						name,
						activation_env_var(name)
					)),
			);
			command = entry.plugin.add_options(command);
		}
		command
	}

	/// Enable plugins by flag or environment, then configure the enabled
	/// ones.
	pub(crate) fn configure(&mut self, matches: &ArgMatches, config: &Config) -> RunnerResult<()> {
		for entry in &mut self.entries {
			let name = entry.plugin.name().to_string();
			let by_flag = matches.get_flag(&activation_flag(&name));
			let by_env = config
				.env()
				.get(&activation_env_var(&name))
				.is_some_and(|v| is_truthy(v));
			if by_flag || by_env {
				entry.enabled = true;
			}
			if entry.enabled {
				tracing::debug!(plugin = %name, by_flag, by_env, "plugin enabled");
				entry.plugin.configure(matches, config)?;
			}
		}
		Ok(())
	}

	/// Call `f` on every enabled plugin.
	pub(crate) fn each_enabled<F>(&mut self, mut f: F)
	where
		F: FnMut(&mut dyn Plugin),
	{
		for entry in self.entries.iter_mut().filter(|e| e.enabled) {
			f(entry.plugin.as_mut());
		}
	}

	pub(crate) fn report(&mut self, out: &mut dyn fmt::Write) -> fmt::Result {
		for entry in self.entries.iter_mut().filter(|e| e.enabled) {
			entry.plugin.report(out)?;
		}
		Ok(())
	}
}

impl fmt::Debug for PluginManager {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PluginManager")
			.field("plugins", &self.names())
			.field("enabled", &self.enabled_names())
			.finish()
	}
}

fn is_truthy(value: &str) -> bool {
	!matches!(
		value.trim().to_lowercase().as_str(),
		"" | "0" | "false" | "no" | "off"
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	struct Named(&'static str);

	impl Plugin for Named {
		fn name(&self) -> &str {
			self.0
		}
	}

	#[rstest]
	#[case("coverage", "RUNTESTS_WITH_COVERAGE")]
	#[case("doc-test", "RUNTESTS_WITH_DOC_TEST")]
	fn test_activation_env_var(#[case] name: &str, #[case] expected: &str) {
		// Act & Assert
		assert_eq!(activation_env_var(name), expected);
	}

	#[rstest]
	#[case("1", true)]
	#[case("yes", true)]
	#[case("", false)]
	#[case("0", false)]
	#[case("False", false)]
	fn test_is_truthy(#[case] value: &str, #[case] expected: bool) {
		// Act & Assert
		assert_eq!(is_truthy(value), expected);
	}

	#[rstest]
	fn test_flag_and_env_enable_plugins() {
		// Arrange
		let mut manager = PluginManager::new(vec![
			Box::new(Named("alpha")),
			Box::new(Named("beta")),
			Box::new(Named("gamma")),
		]);
		let command = manager.add_options(Command::new("runtests"));
		let matches = command
			.try_get_matches_from(["runtests", "--with-alpha"])
			.unwrap();
		let config = Config::new().with_env("RUNTESTS_WITH_BETA", "1");

		// Act
		manager.configure(&matches, &config).unwrap();

		// Assert
		assert_eq!(manager.enabled_names(), vec!["alpha", "beta"]);
	}
}
