//! Run configuration

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::loader::{DirectoryLoader, Loader};
use super::plugin::{Plugin, PluginManager};

/// An in-memory stream the runner writes its report to.
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
	inner: Arc<Mutex<String>>,
}

impl OutputBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Everything written so far.
	pub fn contents(&self) -> String {
		self.inner.lock().clone()
	}

	pub fn clear(&self) {
		self.inner.lock().clear();
	}
}

impl fmt::Write for OutputBuffer {
	fn write_str(&mut self, s: &str) -> fmt::Result {
		self.inner.lock().push_str(s);
		Ok(())
	}
}

/// Settings for one run.
///
/// # Examples
///
/// ```
/// use reinhardt_plugintest::runner::{Config, OutputBuffer};
///
/// let stream = OutputBuffer::new();
/// let config = Config::new()
///     .with_env("RUNTESTS_WITH_TIMER", "1")
///     .with_stream(stream.clone())
///     .with_verbosity(2);
/// assert_eq!(config.verbosity(), 2);
/// ```
pub struct Config {
	env: BTreeMap<String, String>,
	stream: OutputBuffer,
	pub(crate) plugins: PluginManager,
	loader: Box<dyn Loader>,
	verbosity: u8,
	stop: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			env: BTreeMap::new(),
			stream: OutputBuffer::new(),
			plugins: PluginManager::default(),
			loader: Box::new(DirectoryLoader::new()),
			verbosity: 1,
			stop: false,
		}
	}
}

impl Config {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add one environment variable, visible to plugins and spawned tests.
	pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env.insert(key.into(), value.into());
		self
	}

	pub fn with_envs(mut self, env: BTreeMap<String, String>) -> Self {
		self.env.extend(env);
		self
	}

	pub fn with_stream(mut self, stream: OutputBuffer) -> Self {
		self.stream = stream;
		self
	}

	pub fn with_plugins(mut self, plugins: PluginManager) -> Self {
		self.plugins = plugins;
		self
	}

	pub fn with_plugin(mut self, plugin: Box<dyn Plugin>) -> Self {
		self.plugins.add(plugin);
		self
	}

	pub fn with_loader(mut self, loader: Box<dyn Loader>) -> Self {
		self.loader = loader;
		self
	}

	/// 0 is quiet, 1 prints one mark per test, 2 prints one line per test.
	pub fn with_verbosity(mut self, verbosity: u8) -> Self {
		self.verbosity = verbosity;
		self
	}

	/// Stop after the first failure or error.
	pub fn with_stop(mut self, stop: bool) -> Self {
		self.stop = stop;
		self
	}

	pub fn env(&self) -> &BTreeMap<String, String> {
		&self.env
	}

	pub fn stream(&self) -> &OutputBuffer {
		&self.stream
	}

	pub fn plugins(&self) -> &PluginManager {
		&self.plugins
	}

	pub fn loader(&self) -> &dyn Loader {
		self.loader.as_ref()
	}

	pub fn verbosity(&self) -> u8 {
		self.verbosity
	}

	pub fn stop(&self) -> bool {
		self.stop
	}

	pub(crate) fn set_verbosity(&mut self, verbosity: u8) {
		self.verbosity = verbosity;
	}

	pub(crate) fn set_stop(&mut self, stop: bool) {
		self.stop = stop;
	}
}

impl fmt::Debug for Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Config")
			.field("env", &self.env)
			.field("plugins", &self.plugins)
			.field("verbosity", &self.verbosity)
			.field("stop", &self.stop)
			.finish_non_exhaustive()
	}
}
