//! Logging setup for test runs
//!
//! The client reports what it does through `tracing`; element searches log
//! every accept/skip decision at debug level.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging for tests (call once)
///
/// Uses `env_logger` in test mode, so output is captured per test and
/// filtered by `RUST_LOG`. Repeated calls are no-ops.
///
/// # Examples
///
/// ```
/// use reinhardt_webtest::logging::init_test_logging;
///
/// init_test_logging();
/// init_test_logging();
/// ```
pub fn init_test_logging() {
	INIT.call_once(|| {
		let _ = env_logger::builder().is_test(true).try_init();
	});
}
