//! Synthetic requests and the per-request environment handed to applications

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request};
use http_body_util::{BodyExt, Full};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::error::{WebTestError, WebTestResult};

/// Environment key carrying the mount point of the application.
pub const SCRIPT_NAME: &str = "SCRIPT_NAME";
/// Environment key set to `"true"` for every request made by a test client.
pub const TESTING_FLAG: &str = "paste.testing";

/// Where an application reports problems. Anything written here fails the
/// request unless errors are expected.
#[derive(Debug, Clone, Default)]
pub struct ErrorStream {
	buffer: Arc<Mutex<String>>,
}

impl ErrorStream {
	pub fn write(&self, message: &str) {
		self.buffer.lock().push_str(message);
	}

	pub fn contents(&self) -> String {
		self.buffer.lock().clone()
	}
}

/// Values an application exposes to the test that made the request.
#[derive(Debug, Clone, Default)]
pub struct TestingVariables {
	values: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl TestingVariables {
	pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
		self.values.lock().insert(name.into(), value.into());
	}

	pub fn snapshot(&self) -> BTreeMap<String, Value> {
		self.values.lock().clone()
	}
}

/// Per-request environment, attached to every request as an extension.
///
/// Applications retrieve it with
/// `request.extensions().get::<Environ>()`.
#[derive(Debug, Clone, Default)]
pub struct Environ {
	vars: BTreeMap<String, String>,
	errors: ErrorStream,
	testing_variables: TestingVariables,
}

impl Environ {
	pub fn get(&self, key: &str) -> Option<&str> {
		self.vars.get(key).map(String::as_str)
	}

	pub fn vars(&self) -> &BTreeMap<String, String> {
		&self.vars
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.vars.insert(key.into(), value.into());
	}

	/// Insert only when the key is not present yet.
	pub fn set_default(&mut self, key: &str, value: &str) {
		self.vars
			.entry(key.to_string())
			.or_insert_with(|| value.to_string());
	}

	pub fn errors(&self) -> &ErrorStream {
		&self.errors
	}

	pub fn testing_variables(&self) -> &TestingVariables {
		&self.testing_variables
	}

	pub(crate) fn reset_streams(&mut self) {
		self.errors = ErrorStream::default();
		self.testing_variables = TestingVariables::default();
	}
}

/// Parameters for a query string or a form body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Params {
	#[default]
	None,
	/// Sent verbatim.
	Raw(String),
	/// Urlencoded; repeated names are kept.
	Pairs(Vec<(String, String)>),
}

impl Params {
	pub fn is_empty(&self) -> bool {
		match self {
			Params::None => true,
			Params::Raw(raw) => raw.is_empty(),
			Params::Pairs(pairs) => pairs.is_empty(),
		}
	}

	/// Encode into `application/x-www-form-urlencoded` text.
	pub fn encode(&self) -> WebTestResult<String> {
		match self {
			Params::None => Ok(String::new()),
			Params::Raw(raw) => Ok(raw.clone()),
			Params::Pairs(pairs) => Ok(serde_urlencoded::to_string(pairs)?),
		}
	}

	/// Decode into pairs, keeping blank values.
	pub fn to_pairs(&self) -> WebTestResult<Vec<(String, String)>> {
		match self {
			Params::Pairs(pairs) => Ok(pairs.clone()),
			other => Ok(url::form_urlencoded::parse(other.encode()?.as_bytes())
				.into_owned()
				.collect()),
		}
	}
}

impl From<&str> for Params {
	fn from(raw: &str) -> Self {
		Self::Raw(raw.to_string())
	}
}

impl From<String> for Params {
	fn from(raw: String) -> Self {
		Self::Raw(raw)
	}
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for Params {
	fn from(pairs: Vec<(K, V)>) -> Self {
		Self::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Params {
	fn from(pairs: [(K, V); N]) -> Self {
		Self::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}

/// Read a request body from inside an application.
///
/// `Full` bodies are complete in memory, so no runtime is needed.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use http_body_util::Full;
/// use reinhardt_webtest::request::read_body;
///
/// assert_eq!(read_body(Full::new(Bytes::from("a=1"))), Bytes::from("a=1"));
/// ```
pub fn read_body(mut body: Full<Bytes>) -> Bytes {
	let mut cx = Context::from_waker(Waker::noop());
	let mut out = BytesMut::new();
	loop {
		let frame = pin!(body.frame()).poll(&mut cx);
		match frame {
			Poll::Ready(Some(Ok(frame))) => {
				if let Ok(data) = frame.into_data() {
					out.extend_from_slice(&data);
				}
			}
			_ => break,
		}
	}
	out.freeze()
}

/// Drop the `#fragment` of a URL.
pub fn remove_fragment(url: &str) -> &str {
	match url.find('#') {
		Some(at) => &url[..at],
		None => url,
	}
}

/// A request before it is handed to the application.
#[derive(Debug, Clone)]
pub struct TestRequest {
	method: Method,
	scheme: Option<String>,
	path: String,
	query: String,
	headers: HeaderMap,
	body: Bytes,
	environ: Environ,
}

impl TestRequest {
	/// A blank GET request for `url`.
	///
	/// Absolute URLs keep only their path and query; the host becomes the
	/// `Host` header. The fragment is dropped.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_webtest::request::TestRequest;
	///
	/// let req = TestRequest::blank("/search?q=rust#top");
	/// assert_eq!(req.path(), "/search");
	/// assert_eq!(req.query(), "q=rust");
	/// ```
	pub fn blank(url: &str) -> Self {
		let mut headers = HeaderMap::new();
		let url = remove_fragment(url);
		let mut scheme = None;
		let absolute = ["http", "https"].into_iter().find_map(|s| {
			url.strip_prefix(s)
				.and_then(|rest| rest.strip_prefix("://"))
				.map(|rest| (s, rest))
		});
		let relative = if let Some((found, rest)) = absolute {
			scheme = Some(found.to_string());
			let (host, path) = match rest.find('/') {
				Some(at) => (&rest[..at], &rest[at..]),
				None => (rest, "/"),
			};
			if let Ok(value) = HeaderValue::from_str(host) {
				headers.insert(HOST, value);
			}
			path
		} else {
			url
		};
		let (path, query) = match relative.split_once('?') {
			Some((path, query)) => (path, query),
			None => (relative, ""),
		};
		let path = if path.is_empty() { "/" } else { path };
		Self {
			method: Method::GET,
			scheme,
			path: path.to_string(),
			query: query.to_string(),
			headers,
			body: Bytes::new(),
			environ: Environ::default(),
		}
	}

	pub fn with_method(mut self, method: Method) -> Self {
		self.method = method;
		self
	}

	/// Set the body and its `Content-Length`.
	pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self.headers
			.insert(CONTENT_LENGTH, HeaderValue::from(self.body.len()));
		self
	}

	pub fn with_content_type(mut self, content_type: &str) -> WebTestResult<Self> {
		self.headers
			.insert(CONTENT_TYPE, HeaderValue::from_str(content_type)?);
		Ok(self)
	}

	pub fn with_header(mut self, name: &str, value: &str) -> WebTestResult<Self> {
		let header_name: HeaderName = name
			.parse()
			.map_err(|_| WebTestError::InvalidHeaderName(name.to_string()))?;
		self.headers
			.insert(header_name, HeaderValue::from_str(value)?);
		Ok(self)
	}

	pub fn with_environ(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.environ.insert(key, value);
		self
	}

	pub fn method(&self) -> &Method {
		&self.method
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	pub fn query(&self) -> &str {
		&self.query
	}

	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	pub fn headers_mut(&mut self) -> &mut HeaderMap {
		&mut self.headers
	}

	pub fn body(&self) -> &Bytes {
		&self.body
	}

	pub fn environ(&self) -> &Environ {
		&self.environ
	}

	pub fn environ_mut(&mut self) -> &mut Environ {
		&mut self.environ
	}

	/// Path and query as they appear in the request line.
	pub fn path_and_query(&self) -> String {
		if self.query.is_empty() {
			self.path.clone()
		} else {
			format!("{}?{}", self.path, self.query)
		}
	}

	/// Full URL against `base_url`, or against the `Host` header when set.
	///
	/// The scheme of an absolute request URL wins over the scheme of
	/// `base_url`.
	pub fn url(&self, base_url: &str) -> String {
		let base = match self.headers.get(HOST).and_then(|h| h.to_str().ok()) {
			Some(host) => {
				let scheme = self
					.scheme
					.as_deref()
					.or_else(|| base_url.split_once("://").map(|(scheme, _)| scheme))
					.unwrap_or("http");
				format!("{}://{}", scheme, host)
			}
			None => base_url.trim_end_matches('/').to_string(),
		};
		format!("{}{}", base, self.path_and_query())
	}

	/// Strip the environ's `SCRIPT_NAME` prefix from the path.
	pub(crate) fn strip_script_name(&mut self) {
		let Some(script_name) = self.environ.get(SCRIPT_NAME).map(str::to_string) else {
			return;
		};
		if !script_name.is_empty() {
			if let Some(rest) = self.path.strip_prefix(script_name.as_str()) {
				self.path = if rest.is_empty() { "/".to_string() } else { rest.to_string() };
			}
		}
	}

	pub(crate) fn into_http(self, base_url: &str) -> WebTestResult<Request<Full<Bytes>>> {
		let uri = self.url(base_url);
		let mut builder = Request::builder().method(self.method).uri(uri);
		for (name, value) in self.headers.iter() {
			builder = builder.header(name, value);
		}
		let mut request = builder.body(Full::new(self.body))?;
		request.extensions_mut().insert(self.environ);
		Ok(request)
	}
}
