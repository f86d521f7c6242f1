//! # Reinhardt Plugintest
//!
//! Exercise test-runner plugins against stub suites.
//!
//! A [`PluginTester`] names a plugin's activation argument and either a
//! suite path or an in-memory [`TestSuite`](runner::TestSuite).
//! [`PluginTester::set_up`] runs the suite through [`runner::TestProgram`]
//! with the plugins installed and keeps the report in a [`CapturedOutput`]
//! for string checks. The [`output`] helpers make reports stable enough to
//! compare literally.
//!
//! ## Example
//!
//! ```
//! use reinhardt_plugintest::runner::{Plugin, TestCase, TestFailure, TestSuite};
//! use reinhardt_plugintest::{PluginTester, RunnerResult};
//! use std::fmt::{self, Write};
//!
//! #[derive(Default)]
//! struct Tally {
//!     failures: usize,
//! }
//!
//! impl Plugin for Tally {
//!     fn name(&self) -> &str {
//!         "tally"
//!     }
//!
//!     fn add_failure(&mut self, _test: &TestCase, _failure: &TestFailure) {
//!         self.failures += 1;
//!     }
//!
//!     fn report(&mut self, out: &mut dyn fmt::Write) -> fmt::Result {
//!         writeln!(out, "tally: {} failing", self.failures)
//!     }
//! }
//!
//! struct TallyTest;
//!
//! impl PluginTester for TallyTest {
//!     fn activate(&self) -> &str {
//!         "--with-tally"
//!     }
//!
//!     fn plugins(&self) -> Vec<Box<dyn Plugin>> {
//!         vec![Box::new(Tally::default())]
//!     }
//!
//!     fn make_suite(&self) -> RunnerResult<TestSuite> {
//!         Ok(TestSuite::new()
//!             .with_test(TestCase::new("test_pass", || Ok(())))
//!             .with_test(TestCase::new("test_fail", || Err(TestFailure::fail("nope")))))
//!     }
//! }
//!
//! let run = TallyTest.set_up().unwrap();
//! assert!(run.output.contains("FAIL: test_fail"));
//! assert!(run.output.contains("tally: 1 failing"));
//! assert!(!run.summary.was_successful());
//! ```

pub mod error;
pub mod logging;
pub mod output;
pub mod runner;
pub mod tester;

pub use error::{RunnerError, RunnerResult};
pub use logging::init_test_logging;
pub use output::{RunOptions, blankline_separated_blocks, munge_output, remove_stack_traces, run};
pub use tester::{CapturedOutput, PluginRun, PluginTester};
