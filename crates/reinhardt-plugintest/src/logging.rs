//! Logging setup for test runs

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging for tests (call once)
///
/// Runner events (suite loading, plugin activation) are emitted through
/// `tracing` and reach `env_logger` via the `log` bridge.
///
/// # Examples
///
/// ```
/// use reinhardt_plugintest::logging::init_test_logging;
///
/// init_test_logging();
/// ```
pub fn init_test_logging() {
	INIT.call_once(|| {
		let _ = env_logger::builder().is_test(true).try_init();
	});
}
