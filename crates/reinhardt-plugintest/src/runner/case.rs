//! Test cases, suites and their outcomes

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// How a test that did not pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
	/// An assertion did not hold.
	Failure,
	/// The test could not run to completion (a panic, a spawn error, ...).
	Error,
	/// The test chose not to run.
	Skip,
}

/// Why a test did not pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
	kind: FailureKind,
	message: String,
	trace: Option<String>,
}

impl TestFailure {
	pub fn fail(message: impl Into<String>) -> Self {
		Self::new(FailureKind::Failure, message)
	}

	pub fn error(message: impl Into<String>) -> Self {
		Self::new(FailureKind::Error, message)
	}

	pub fn skip(reason: impl Into<String>) -> Self {
		Self::new(FailureKind::Skip, reason)
	}

	fn new(kind: FailureKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
			trace: None,
		}
	}

	/// Attach diagnostic output shown above the message, such as a
	/// backtrace or captured stderr.
	pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
		let trace = trace.into();
		self.trace = (!trace.trim().is_empty()).then_some(trace);
		self
	}

	pub fn kind(&self) -> FailureKind {
		self.kind
	}

	pub fn message(&self) -> &str {
		&self.message
	}

	pub fn trace(&self) -> Option<&str> {
		self.trace.as_deref()
	}

	/// The text printed in the failure block of a run report.
	pub fn details(&self) -> String {
		let label = match self.kind {
			FailureKind::Failure => "Failure",
			FailureKind::Error => "Error",
			FailureKind::Skip => "Skipped",
		};
		let mut out = String::new();
		if let Some(trace) = &self.trace {
			out.push_str(trace);
			if !trace.ends_with('\n') {
				out.push('\n');
			}
		}
		out.push_str(label);
		out.push_str(": ");
		out.push_str(&self.message);
		out
	}
}

/// Any error returned with `?` from a test body counts as an error.
impl<E> From<E> for TestFailure
where
	E: std::error::Error,
{
	fn from(err: E) -> Self {
		Self::error(err.to_string())
	}
}

/// The result of running one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	Ok,
	Failure(TestFailure),
	Error(TestFailure),
	Skip(TestFailure),
}

impl Outcome {
	/// One-character progress marker.
	pub fn mark(&self) -> char {
		match self {
			Outcome::Ok => '.',
			Outcome::Failure(_) => 'F',
			Outcome::Error(_) => 'E',
			Outcome::Skip(_) => 'S',
		}
	}

	/// Word used in verbose progress lines.
	pub fn word(&self) -> &'static str {
		match self {
			Outcome::Ok => "ok",
			Outcome::Failure(_) => "FAIL",
			Outcome::Error(_) => "ERROR",
			Outcome::Skip(_) => "SKIP",
		}
	}

	pub fn is_problem(&self) -> bool {
		matches!(self, Outcome::Failure(_) | Outcome::Error(_))
	}
}

impl From<TestFailure> for Outcome {
	fn from(failure: TestFailure) -> Self {
		match failure.kind {
			FailureKind::Failure => Outcome::Failure(failure),
			FailureKind::Error => Outcome::Error(failure),
			FailureKind::Skip => Outcome::Skip(failure),
		}
	}
}

type TestFn = Box<dyn Fn() -> Result<(), TestFailure> + Send + Sync>;

/// A named test.
///
/// # Examples
///
/// ```
/// use reinhardt_plugintest::runner::{Outcome, TestCase, TestFailure};
///
/// let passing = TestCase::new("adds", || {
///     if 1 + 1 == 2 { Ok(()) } else { Err(TestFailure::fail("math broke")) }
/// });
/// assert_eq!(passing.run(), Outcome::Ok);
///
/// let panicking = TestCase::new("boom", || panic!("kaboom"));
/// assert_eq!(panicking.run().word(), "ERROR");
/// ```
pub struct TestCase {
	name: String,
	func: TestFn,
}

impl TestCase {
	pub fn new<F>(name: impl Into<String>, func: F) -> Self
	where
		F: Fn() -> Result<(), TestFailure> + Send + Sync + 'static,
	{
		Self {
			name: name.into(),
			func: Box::new(func),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Run the test. Panics are caught and reported as errors.
	pub fn run(&self) -> Outcome {
		match catch_unwind(AssertUnwindSafe(|| (self.func)())) {
			Ok(Ok(())) => Outcome::Ok,
			Ok(Err(failure)) => failure.into(),
			Err(payload) => Outcome::Error(TestFailure::error(format!(
				"panicked: {}",
				panic_message(payload.as_ref())
			))),
		}
	}
}

impl fmt::Debug for TestCase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TestCase")
			.field("name", &self.name)
			.finish_non_exhaustive()
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}

/// An ordered collection of tests.
#[derive(Debug, Default)]
pub struct TestSuite {
	tests: Vec<TestCase>,
}

impl TestSuite {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_test(mut self, test: TestCase) -> Self {
		self.tests.push(test);
		self
	}

	pub fn push(&mut self, test: TestCase) {
		self.tests.push(test);
	}

	/// Append every test of `other`.
	pub fn extend(&mut self, other: TestSuite) {
		self.tests.extend(other.tests);
	}

	pub fn len(&self) -> usize {
		self.tests.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tests.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
		self.tests.iter()
	}
}

impl FromIterator<TestCase> for TestSuite {
	fn from_iter<I: IntoIterator<Item = TestCase>>(iter: I) -> Self {
		Self {
			tests: iter.into_iter().collect(),
		}
	}
}
