//! Responses returned by [`TestApp`](crate::TestApp)

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, Method, Response, StatusCode, Version};
use http_body_util::{BodyExt, Full};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::app::{RequestBuilder, TestApp};
use crate::error::{WebTestError, WebTestResult};
use crate::forms::{Form, Forms};
use crate::html::{ElementQuery, find_element};
use crate::status::status_line;

static WHITESPACE_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"[ \n\r\t]+").expect("whitespace pattern is valid"));

static LOCATION_HREF_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"location\.href='(.*?)'").expect("onclick pattern is valid"));

/// A finished response, with the body fully collected.
///
/// Responses produced by a [`TestApp`] remember the app and the request
/// URL, so links can be followed and forms submitted from them.
pub struct TestResponse {
	status: StatusCode,
	headers: HeaderMap,
	body: Bytes,
	version: Version,
	app: Option<TestApp>,
	request_url: String,
	errors: String,
	testing_variables: BTreeMap<String, Value>,
	cookies_set: BTreeMap<String, String>,
	forms: OnceCell<Forms>,
}

impl TestResponse {
	/// Collect an `http::Response` into a standalone test response.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_webtest::response::TestResponse;
	/// use http::{Response, StatusCode};
	/// use http_body_util::Full;
	/// use bytes::Bytes;
	///
	/// # tokio_test::block_on(async {
	/// let response = Response::builder()
	///     .status(StatusCode::OK)
	///     .body(Full::new(Bytes::from("Hello World")))
	///     .unwrap();
	/// let test_response = TestResponse::new(response).await;
	/// assert_eq!(test_response.status_line(), "200 OK");
	/// # });
	/// ```
	pub async fn new(response: Response<Full<Bytes>>) -> Self {
		let (parts, body) = response.into_parts();
		let body = body
			.collect()
			.await
			.map(|collected| collected.to_bytes())
			.unwrap_or_else(|_| Bytes::new());
		Self::with_body_and_version(parts.status, parts.headers, body, parts.version)
	}

	/// Create a response with status, headers and body (HTTP/1.1)
	pub fn with_body(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
		Self::with_body_and_version(status, headers, body, Version::HTTP_11)
	}

	pub fn with_body_and_version(
		status: StatusCode,
		headers: HeaderMap,
		body: Bytes,
		version: Version,
	) -> Self {
		Self {
			status,
			headers,
			body,
			version,
			app: None,
			request_url: String::new(),
			errors: String::new(),
			testing_variables: BTreeMap::new(),
			cookies_set: BTreeMap::new(),
			forms: OnceCell::new(),
		}
	}

	pub(crate) fn with_context(
		mut self,
		app: TestApp,
		request_url: String,
		errors: String,
		testing_variables: BTreeMap<String, Value>,
	) -> Self {
		self.app = Some(app);
		self.request_url = request_url;
		self.errors = errors;
		self.testing_variables = testing_variables;
		self
	}

	pub(crate) fn set_cookies_set(&mut self, cookies: BTreeMap<String, String>) {
		self.cookies_set = cookies;
	}

	pub fn status(&self) -> StatusCode {
		self.status
	}

	pub fn status_code(&self) -> u16 {
		self.status.as_u16()
	}

	/// Status code and reason, e.g. `404 Not Found`
	pub fn status_line(&self) -> String {
		status_line(self.status)
	}

	pub fn version(&self) -> Version {
		self.version
	}

	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Get header value
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|v| v.to_str().ok())
	}

	pub fn body(&self) -> &Bytes {
		&self.body
	}

	/// Body as lossy UTF-8
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).to_string()
	}

	/// The media type of the response, without parameters.
	pub fn content_type(&self) -> Option<&str> {
		self.headers
			.get(CONTENT_TYPE)
			.and_then(|v| v.to_str().ok())
			.map(|ct| ct.split(';').next().unwrap_or(ct).trim())
			.filter(|ct| !ct.is_empty())
	}

	/// The `charset` parameter of the content type, as the header spells it.
	pub fn charset(&self) -> Option<String> {
		let raw = self.headers.get(CONTENT_TYPE)?.to_str().ok()?;
		let mime: mime::Mime = raw.parse().ok()?;
		mime.get_param(mime::CHARSET)?;
		// mime lowercases charset values
		raw.split(';').skip(1).find_map(|param| {
			let (name, value) = param.split_once('=')?;
			name.trim()
				.eq_ignore_ascii_case("charset")
				.then(|| value.trim().trim_matches('"').to_string())
		})
	}

	pub fn location(&self) -> Option<&str> {
		self.header(LOCATION.as_str())
	}

	/// The body as text, decoded with the declared charset when the app
	/// uses unicode.
	pub fn testbody(&self) -> String {
		let use_unicode = self.app.as_ref().is_none_or(TestApp::use_unicode);
		if use_unicode {
			if let Some(encoding) = self
				.charset()
				.and_then(|c| encoding_rs::Encoding::for_label(c.as_bytes()))
			{
				let (decoded, _, _) = encoding.decode(&self.body);
				return decoded.into_owned();
			}
		}
		self.text()
	}

	/// The body with every whitespace run collapsed to a single space.
	pub fn normal_body(&self) -> String {
		WHITESPACE_RE.replace_all(&self.testbody(), " ").into_owned()
	}

	/// Whether `s` appears in the body or in its normalized form.
	pub fn contains(&self, s: &str) -> bool {
		self.testbody().contains(s) || self.normal_body().contains(s)
	}

	/// Require every string of `strings` in the body and none of `no`.
	pub fn must_contain(&self, strings: &[&str], no: &[&str]) -> WebTestResult<()> {
		for s in strings {
			if !self.contains(s) {
				tracing::error!(response = %self, "actual response");
				return Err(WebTestError::Content(format!(
					"Body does not contain string {:?}",
					s
				)));
			}
		}
		for s in no {
			if self.contains(s) {
				tracing::error!(response = %self, forbidden = s, "actual response");
				return Err(WebTestError::Content(format!(
					"Body contains bad string {:?}",
					s
				)));
			}
		}
		Ok(())
	}

	/// Decode a JSON body. The content type must be `application/json`.
	pub fn json<T: DeserializeOwned>(&self) -> WebTestResult<T> {
		match self.content_type() {
			Some("application/json") => Ok(serde_json::from_slice(&self.body)?),
			other => Err(WebTestError::Content(format!(
				"Not a JSON response body (content-type: {})",
				other.unwrap_or("")
			))),
		}
	}

	pub fn json_value(&self) -> WebTestResult<Value> {
		self.json()
	}

	/// Parse the body into an HTML document. The content type must
	/// mention `html`.
	///
	/// # Examples
	///
	/// ```
	/// use bytes::Bytes;
	/// use http::{HeaderMap, HeaderValue, StatusCode};
	/// use reinhardt_webtest::TestResponse;
	/// use scraper::Selector;
	///
	/// let mut headers = HeaderMap::new();
	/// headers.insert("content-type", HeaderValue::from_static("text/html"));
	/// let res = TestResponse::with_body(
	///     StatusCode::OK,
	///     headers,
	///     Bytes::from_static(b"<ul><li>a</li><li>b</li></ul>"),
	/// );
	///
	/// let doc = res.html().unwrap();
	/// let items = Selector::parse("li").unwrap();
	/// assert_eq!(doc.select(&items).count(), 2);
	/// ```
	pub fn html(&self) -> WebTestResult<scraper::Html> {
		match self.content_type() {
			Some(ct) if ct.contains("html") => Ok(scraper::Html::parse_document(&self.testbody())),
			other => Err(WebTestError::Content(format!(
				"Not an HTML response body (content-type: {})",
				other.unwrap_or("")
			))),
		}
	}

	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	pub fn is_redirect(&self) -> bool {
		self.status.is_redirection()
	}

	pub fn is_client_error(&self) -> bool {
		self.status.is_client_error()
	}

	pub fn is_server_error(&self) -> bool {
		self.status.is_server_error()
	}

	/// Text the application wrote to its error stream.
	pub fn errors(&self) -> &str {
		&self.errors
	}

	/// Cookies set by this response.
	pub fn cookies_set(&self) -> &BTreeMap<String, String> {
		&self.cookies_set
	}

	/// Values the application recorded for the test.
	pub fn testing_variables(&self) -> &BTreeMap<String, Value> {
		&self.testing_variables
	}

	/// The URL that was requested.
	pub fn request_url(&self) -> &str {
		&self.request_url
	}

	fn parsed_forms(&self) -> WebTestResult<&Forms> {
		self.forms.get_or_try_init(|| {
			let forms = Forms::extract(&self.testbody())?;
			Ok(match &self.app {
				Some(app) => forms.with_origin(app, &self.request_url),
				None => forms,
			})
		})
	}

	/// Every form on the page.
	pub fn forms(&self) -> WebTestResult<Forms> {
		self.parsed_forms().cloned()
	}

	/// The single form on the page. Zero or several forms are an error.
	pub fn form(&self) -> WebTestResult<Form> {
		self.parsed_forms()?.clone().into_single()
	}

	fn app(&self) -> WebTestResult<&TestApp> {
		self.app.as_ref().ok_or_else(|| {
			WebTestError::InvalidRequest("This response was not produced by a TestApp".to_string())
		})
	}

	/// Request the `Location` of a redirect.
	pub fn follow(&self) -> WebTestResult<RequestBuilder> {
		if !self.is_redirect() {
			return Err(WebTestError::InvalidRequest(format!(
				"You can only follow redirect responses (not {})",
				self.status_line()
			)));
		}
		let location = self.location().ok_or_else(|| {
			WebTestError::InvalidRequest("Redirect response has no Location header".to_string())
		})?;
		Ok(self.app()?.get(location))
	}

	/// Click the `<a>` link selected by `query`.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_webtest::{ElementQuery, TestApp};
	/// use http::{Request, Response};
	/// use http_body_util::Full;
	/// use bytes::Bytes;
	///
	/// # tokio_test::block_on(async {
	/// let app = TestApp::new(|req: Request<Full<Bytes>>| {
	///     let body = match req.uri().path() {
	///         "/" => r#"<a href="/about">About us</a>"#,
	///         _ => "about page",
	///     };
	///     Response::new(Full::new(Bytes::from(body)))
	/// });
	/// let res = app.get("/").await.unwrap();
	/// let about = res.click(&ElementQuery::new().content("About")).unwrap().await.unwrap();
	/// assert!(about.contains("about page"));
	/// # });
	/// ```
	pub fn click(&self, query: &ElementQuery) -> WebTestResult<RequestBuilder> {
		let found = find_element(&self.testbody(), "a", "href", None, query)?;
		self.goto(&found.uri, Method::GET)
	}

	/// Click a `<button>` whose `onclick` sets `location.href`.
	pub fn click_button(&self, query: &ElementQuery) -> WebTestResult<RequestBuilder> {
		let found = find_element(
			&self.testbody(),
			"button",
			"onclick",
			Some(&LOCATION_HREF_RE),
			query,
		)?;
		self.goto(&found.uri, Method::GET)
	}

	/// Go to `href`, relative to this response's request URL.
	pub fn goto(&self, href: &str, method: Method) -> WebTestResult<RequestBuilder> {
		self.app()?.goto(&self.request_url, href, method)
	}

	/// A one-line description, e.g. `<200 OK text/html body="<html><bo...html>"/42>`.
	pub fn summary(&self) -> String {
		let ct = self
			.content_type()
			.map(|ct| format!(" {}", ct))
			.unwrap_or_default();
		let location = self
			.location()
			.map(|l| format!(" location: {}", l))
			.unwrap_or_default();
		let body = if self.body.is_empty() {
			" no body".to_string()
		} else {
			let text = self.testbody();
			let repr = format!("{:?}", text);
			let chars: Vec<char> = repr.chars().collect();
			if chars.len() > 18 {
				let head: String = chars[..10].iter().collect();
				let tail: String = chars[chars.len() - 5..].iter().collect();
				format!(" body={}...{}/{}", head, tail, text.chars().count())
			} else {
				format!(" body={}", repr)
			}
		};
		format!("<{}{}{}{}>", self.status_line(), ct, location, body)
	}
}

fn title_case(name: &str) -> String {
	let mut out = String::with_capacity(name.len());
	let mut upper = true;
	for c in name.chars() {
		if upper {
			out.extend(c.to_uppercase());
		} else {
			out.extend(c.to_lowercase());
		}
		upper = !c.is_alphabetic();
	}
	out
}

impl fmt::Display for TestResponse {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut headers: Vec<(String, String)> = self
			.headers
			.iter()
			.filter(|(name, _)| **name != CONTENT_LENGTH)
			.map(|(name, value)| {
				(
					title_case(name.as_str()),
					String::from_utf8_lossy(value.as_bytes()).to_string(),
				)
			})
			.collect();
		headers.sort();
		let headers: Vec<String> = headers
			.iter()
			.map(|(name, value)| format!("{}: {}", name, value))
			.collect();
		let body = self.testbody();
		let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();
		write!(
			f,
			"Response: {}\n{}\n{}",
			self.status_line(),
			headers.join("\n"),
			lines.join("\n")
		)
	}
}

impl fmt::Debug for TestResponse {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.summary())
	}
}

/// Panicking assertions for use directly in tests
pub trait ResponseExt {
	fn assert_status(&self, expected: StatusCode) -> &Self;
	fn assert_success(&self) -> &Self;
	fn assert_redirect(&self) -> &Self;
	fn assert_contains(&self, s: &str) -> &Self;
	fn assert_not_contains(&self, s: &str) -> &Self;
}

impl ResponseExt for TestResponse {
	fn assert_status(&self, expected: StatusCode) -> &Self {
		assert_eq!(
			self.status,
			expected,
			"Expected status {}, got {}. Body: {}",
			status_line(expected),
			self.status_line(),
			self.text()
		);
		self
	}

	fn assert_success(&self) -> &Self {
		assert!(
			self.is_success(),
			"Expected success status (2xx), got {}. Body: {}",
			self.status_line(),
			self.text()
		);
		self
	}

	fn assert_redirect(&self) -> &Self {
		assert!(
			self.is_redirect(),
			"Expected redirect status (3xx), got {}",
			self.status_line()
		);
		self
	}

	fn assert_contains(&self, s: &str) -> &Self {
		assert!(self.contains(s), "Body does not contain string {:?}\n{}", s, self);
		self
	}

	fn assert_not_contains(&self, s: &str) -> &Self {
		assert!(!self.contains(s), "Body contains bad string {:?}\n{}", s, self);
		self
	}
}
