//! Expected-status checks applied to every response

use http::StatusCode;
use regex::Regex;

use crate::error::{WebTestError, WebTestResult};

/// Which response statuses a request accepts.
///
/// # Examples
///
/// ```
/// use reinhardt_webtest::status::ExpectedStatus;
///
/// assert_eq!(ExpectedStatus::from(404), ExpectedStatus::Code(404));
/// assert_eq!(ExpectedStatus::from("*"), ExpectedStatus::Any);
/// assert_eq!(ExpectedStatus::from("3*"), ExpectedStatus::Glob("3*".to_string()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExpectedStatus {
	/// Any 2xx or 3xx status.
	#[default]
	Default,
	/// Any status at all.
	Any,
	/// Exactly this status code.
	Code(u16),
	/// One of these status codes.
	OneOf(Vec<u16>),
	/// A shell-style pattern matched against the status line, e.g. `"3*"`
	/// or `"404 *"`.
	Glob(String),
}

impl From<u16> for ExpectedStatus {
	fn from(code: u16) -> Self {
		Self::Code(code)
	}
}

impl From<StatusCode> for ExpectedStatus {
	fn from(code: StatusCode) -> Self {
		Self::Code(code.as_u16())
	}
}

impl From<Vec<u16>> for ExpectedStatus {
	fn from(codes: Vec<u16>) -> Self {
		Self::OneOf(codes)
	}
}

impl From<&[u16]> for ExpectedStatus {
	fn from(codes: &[u16]) -> Self {
		Self::OneOf(codes.to_vec())
	}
}

impl From<&str> for ExpectedStatus {
	fn from(pattern: &str) -> Self {
		if pattern == "*" {
			Self::Any
		} else if let Ok(code) = pattern.parse::<u16>() {
			Self::Code(code)
		} else {
			Self::Glob(pattern.to_string())
		}
	}
}

/// Format a status as a status line, e.g. `200 OK`.
pub fn status_line(status: StatusCode) -> String {
	match status.canonical_reason() {
		Some(reason) => format!("{} {}", status.as_str(), reason),
		None => status.as_str().to_string(),
	}
}

fn glob_to_regex(pattern: &str) -> String {
	let mut out = String::from("(?is)^");
	for c in pattern.chars() {
		match c {
			'*' => out.push_str(".*"),
			'?' => out.push('.'),
			c => out.push_str(&regex::escape(&c.to_string())),
		}
	}
	out.push('$');
	out
}

impl ExpectedStatus {
	/// Whether `status` is acceptable.
	pub fn accepts(&self, status: StatusCode) -> bool {
		match self {
			ExpectedStatus::Any => true,
			ExpectedStatus::Default => (200..400).contains(&status.as_u16()),
			ExpectedStatus::Code(code) => status.as_u16() == *code,
			ExpectedStatus::OneOf(codes) => codes.contains(&status.as_u16()),
			ExpectedStatus::Glob(pattern) => Regex::new(&glob_to_regex(pattern))
				.map(|re| re.is_match(&status_line(status)))
				.unwrap_or(false),
		}
	}

	/// Check `status`, producing the error text a failing test shows.
	pub fn check(&self, status: StatusCode, url: &str, body: &str) -> WebTestResult<()> {
		if self.accepts(status) {
			return Ok(());
		}
		let line = status_line(status);
		let message = match self {
			ExpectedStatus::OneOf(codes) => format!(
				"Bad response: {} (not one of {} for {})\n{}",
				line,
				codes
					.iter()
					.map(u16::to_string)
					.collect::<Vec<_>>()
					.join(", "),
				url,
				body
			),
			ExpectedStatus::Default => format!(
				"Bad response: {} (not 200 OK or 3xx redirect for {})\n{}",
				line, url, body
			),
			ExpectedStatus::Code(code) => format!("Bad response: {} (not {})", line, code),
			ExpectedStatus::Glob(pattern) => format!("Bad response: {} (not {})", line, pattern),
			ExpectedStatus::Any => unreachable!("Any accepts every status"),
		};
		Err(WebTestError::App(message))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(ExpectedStatus::Default, 200, true)]
	#[case(ExpectedStatus::Default, 302, true)]
	#[case(ExpectedStatus::Default, 404, false)]
	#[case(ExpectedStatus::Default, 199, false)]
	#[case(ExpectedStatus::Any, 500, true)]
	#[case(ExpectedStatus::Code(404), 404, true)]
	#[case(ExpectedStatus::Code(404), 200, false)]
	#[case(ExpectedStatus::OneOf(vec![200, 404]), 404, true)]
	#[case(ExpectedStatus::OneOf(vec![200, 404]), 500, false)]
	#[case(ExpectedStatus::from("3*"), 301, true)]
	#[case(ExpectedStatus::from("3*"), 404, false)]
	#[case(ExpectedStatus::from("404 not*"), 404, true)]
	fn test_accepts(#[case] expected: ExpectedStatus, #[case] code: u16, #[case] ok: bool) {
		// Arrange
		let status = StatusCode::from_u16(code).unwrap();

		// Act & Assert
		assert_eq!(expected.accepts(status), ok);
	}

	#[rstest]
	fn test_default_failure_message_mentions_url_and_body() {
		// Act
		let err = ExpectedStatus::Default
			.check(StatusCode::NOT_FOUND, "http://localhost/missing", "nope")
			.unwrap_err();

		// Assert
		assert_eq!(
			err.to_string(),
			"Bad response: 404 Not Found (not 200 OK or 3xx redirect for http://localhost/missing)\nnope"
		);
	}

	#[rstest]
	fn test_code_failure_message() {
		// Act
		let err = ExpectedStatus::Code(201)
			.check(StatusCode::OK, "http://localhost/", "")
			.unwrap_err();

		// Assert
		assert_eq!(err.to_string(), "Bad response: 200 OK (not 201)");
	}
}
