//! Collected results of a run

use std::time::Duration;

use super::case::{Outcome, TestFailure};

/// One finished test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
	pub name: String,
	pub outcome: Outcome,
}

/// Everything a run produced, in execution order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
	results: Vec<TestResult>,
	elapsed: Duration,
}

impl RunSummary {
	pub(crate) fn record(&mut self, name: &str, outcome: Outcome) {
		self.results.push(TestResult {
			name: name.to_string(),
			outcome,
		});
	}

	pub(crate) fn set_elapsed(&mut self, elapsed: Duration) {
		self.elapsed = elapsed;
	}

	pub fn results(&self) -> &[TestResult] {
		&self.results
	}

	pub fn tests_run(&self) -> usize {
		self.results.len()
	}

	pub fn elapsed(&self) -> Duration {
		self.elapsed
	}

	fn matching<'a>(
		&'a self,
		pick: impl Fn(&'a Outcome) -> Option<&'a TestFailure> + 'a,
	) -> impl Iterator<Item = (&'a str, &'a TestFailure)> + 'a {
		self.results
			.iter()
			.filter_map(move |r| pick(&r.outcome).map(|f| (r.name.as_str(), f)))
	}

	pub fn failures(&self) -> Vec<(&str, &TestFailure)> {
		self.matching(|o| match o {
			Outcome::Failure(f) => Some(f),
			_ => None,
		})
		.collect()
	}

	pub fn errors(&self) -> Vec<(&str, &TestFailure)> {
		self.matching(|o| match o {
			Outcome::Error(f) => Some(f),
			_ => None,
		})
		.collect()
	}

	pub fn skipped(&self) -> Vec<(&str, &TestFailure)> {
		self.matching(|o| match o {
			Outcome::Skip(f) => Some(f),
			_ => None,
		})
		.collect()
	}

	/// No failures and no errors. Skips do not count against a run.
	pub fn was_successful(&self) -> bool {
		!self.results.iter().any(|r| r.outcome.is_problem())
	}

	/// The closing line of the report, e.g. `FAILED (failures=1)`.
	pub fn status_line(&self) -> String {
		let mut counts = Vec::new();
		let failures = self.failures().len();
		let errors = self.errors().len();
		let skipped = self.skipped().len();
		if failures > 0 {
			counts.push(format!("failures={}", failures));
		}
		if errors > 0 {
			counts.push(format!("errors={}", errors));
		}
		if skipped > 0 {
			counts.push(format!("SKIP={}", skipped));
		}
		let head = if self.was_successful() { "OK" } else { "FAILED" };
		if counts.is_empty() {
			head.to_string()
		} else {
			format!("{} ({})", head, counts.join(", "))
		}
	}
}
