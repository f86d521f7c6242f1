//! Error types for the application test client

use thiserror::Error;

/// Result type for test client operations.
pub type WebTestResult<T> = Result<T, WebTestError>;

/// Errors raised while building requests, running the application, or
/// inspecting its responses.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WebTestError {
	/// The application answered with a status the caller did not expect,
	/// or wrote to its error stream.
	#[error("{0}")]
	App(String),

	#[error("HTTP error: {0}")]
	Http(#[from] http::Error),

	#[error("Invalid header value: {0}")]
	InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

	#[error("Invalid header name: {0}")]
	InvalidHeaderName(String),

	#[error("Invalid URL {url:?}: {source}")]
	InvalidUrl {
		url: String,
		#[source]
		source: url::ParseError,
	},

	#[error("Could not parse cookie header {header:?}: {message}")]
	Cookie { header: String, message: String },

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("Form encoding error: {0}")]
	UrlEncoding(#[from] serde_urlencoded::ser::Error),

	#[error("I/O error reading upload {path:?}: {source}")]
	Upload {
		path: String,
		#[source]
		source: std::io::Error,
	},

	/// An HTML scan could not pick a single element.
	#[error("{0}")]
	NoMatch(String),

	#[error(transparent)]
	Form(#[from] FormError),

	/// The body does not (or does) contain a string it must not (must).
	#[error("{0}")]
	Content(String),

	#[error("{0}")]
	InvalidRequest(String),
}

/// Errors raised while parsing or manipulating HTML forms.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FormError {
	#[error("{0}")]
	Malformed(String),

	#[error("No field by the name {name:?} found (fields: {available})")]
	NoSuchField { name: String, available: String },

	#[error("Multiple fields match {name:?}: {count} fields")]
	Ambiguous { name: String, count: usize },

	#[error("Field {name:?} has no index {index}")]
	IndexOutOfRange { name: String, index: usize },

	#[error("You cannot set the value of the <{tag}> field {name:?}")]
	NotSettable { tag: String, name: String },

	#[error("Option(s) {missing} not found (from {available})")]
	OptionNotFound { missing: String, available: String },

	#[error("Field {name:?} is not a <select>")]
	NotASelect { name: String },

	#[error("Field {name:?} is not a checkbox")]
	NotACheckbox { name: String },

	#[error("Field {name:?} is not a submit button")]
	NotAButton { name: String },

	#[error("{0}")]
	NoForm(String),
}
