//! Application test client
//!
//! [`TestApp`] drives an in-process application the way a browser would:
//! it assembles URLs and bodies, keeps cookies between requests, checks
//! statuses, and hands back a [`TestResponse`] that can follow links and
//! submit forms.

use bytes::Bytes;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderValue, Method, Request, Response};
use http_body_util::{BodyExt, Full};
use std::collections::BTreeMap;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

use crate::cookies::CookieJar;
use crate::error::{WebTestError, WebTestResult};
use crate::multipart::{ResolvedUpload, UploadFile, encode_multipart};
use crate::request::{Params, TESTING_FLAG, TestRequest, remove_fragment};
use crate::response::TestResponse;
use crate::status::ExpectedStatus;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// An application under test.
///
/// Implemented for every `Fn(Request) -> Response` closure.
pub trait Application: Send + Sync {
	fn call(&self, request: Request<Full<Bytes>>) -> Response<Full<Bytes>>;
}

impl<F> Application for F
where
	F: Fn(Request<Full<Bytes>>) -> Response<Full<Bytes>> + Send + Sync,
{
	fn call(&self, request: Request<Full<Bytes>>) -> Response<Full<Bytes>> {
		self(request)
	}
}

/// Builder for [`TestApp`].
///
/// # Example
/// ```rust
/// use reinhardt_webtest::TestApp;
/// use http::Response;
/// use http_body_util::Full;
/// use bytes::Bytes;
///
/// let app = TestApp::builder(|_req: http::Request<Full<Bytes>>| {
///     Response::new(Full::new(Bytes::from("hi")))
/// })
///     .base_url("http://testserver")
///     .extra_environ("REMOTE_USER", "alice")
///     .build();
/// assert_eq!(app.base_url(), "http://testserver");
/// ```
pub struct TestAppBuilder {
	app: Arc<dyn Application>,
	base_url: String,
	extra_environ: BTreeMap<String, String>,
	relative_to: Option<PathBuf>,
	use_unicode: bool,
}

impl TestAppBuilder {
	pub fn new(app: impl Application + 'static) -> Self {
		Self {
			app: Arc::new(app),
			base_url: "http://localhost".to_string(),
			extra_environ: BTreeMap::new(),
			relative_to: None,
			use_unicode: true,
		}
	}

	/// Scheme and host used for request URLs
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = url.into();
		self
	}

	/// Add an environ entry sent with every request
	pub fn extra_environ(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra_environ.insert(key.into(), value.into());
		self
	}

	/// Directory that upload filenames are resolved against
	pub fn relative_to(mut self, dir: impl Into<PathBuf>) -> Self {
		self.relative_to = Some(dir.into());
		self
	}

	/// Decode response bodies using their declared charset (default: on)
	pub fn use_unicode(mut self, enabled: bool) -> Self {
		self.use_unicode = enabled;
		self
	}

	pub fn build(self) -> TestApp {
		TestApp {
			inner: Arc::new(Inner {
				app: self.app,
				base_url: self.base_url,
				extra_environ: self.extra_environ,
				relative_to: self.relative_to,
				use_unicode: self.use_unicode,
				cookies: RwLock::new(CookieJar::new()),
			}),
		}
	}
}

struct Inner {
	app: Arc<dyn Application>,
	base_url: String,
	extra_environ: BTreeMap<String, String>,
	relative_to: Option<PathBuf>,
	use_unicode: bool,
	cookies: RwLock<CookieJar>,
}

/// Test client wrapping an application.
///
/// Cloning is cheap; clones share the cookie jar.
///
/// # Example
/// ```rust
/// use reinhardt_webtest::TestApp;
/// use http::Response;
/// use http_body_util::Full;
/// use bytes::Bytes;
///
/// # tokio_test::block_on(async {
/// let app = TestApp::new(|req: http::Request<Full<Bytes>>| {
///     Response::builder()
///         .header("content-type", "text/plain")
///         .body(Full::new(Bytes::from(format!("you asked for {}", req.uri().path()))))
///         .unwrap()
/// });
/// let res = app.get("/hello").await.unwrap();
/// assert!(res.contains("you asked for /hello"));
/// # });
/// ```
#[derive(Clone)]
pub struct TestApp {
	inner: Arc<Inner>,
}

impl fmt::Debug for TestApp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TestApp")
			.field("base_url", &self.inner.base_url)
			.field("extra_environ", &self.inner.extra_environ)
			.field("relative_to", &self.inner.relative_to)
			.field("use_unicode", &self.inner.use_unicode)
			.finish_non_exhaustive()
	}
}

impl TestApp {
	pub fn new(app: impl Application + 'static) -> Self {
		TestAppBuilder::new(app).build()
	}

	pub fn builder(app: impl Application + 'static) -> TestAppBuilder {
		TestAppBuilder::new(app)
	}

	pub fn base_url(&self) -> &str {
		&self.inner.base_url
	}

	pub fn relative_to(&self) -> Option<&Path> {
		self.inner.relative_to.as_deref()
	}

	pub fn use_unicode(&self) -> bool {
		self.inner.use_unicode
	}

	/// Forget all saved cookies.
	pub async fn reset(&self) {
		self.inner.cookies.write().await.clear();
	}

	/// A snapshot of the cookie jar.
	pub async fn cookies(&self) -> CookieJar {
		self.inner.cookies.read().await.clone()
	}

	/// Store a cookie that will be sent with following requests.
	pub async fn set_cookie(&self, name: &str, value: &str) -> WebTestResult<()> {
		self.inner.cookies.write().await.set(name, value)
	}

	pub fn get(&self, url: &str) -> RequestBuilder {
		RequestBuilder::new(self.clone(), Method::GET, url)
	}

	/// POST; params go into the body.
	pub fn post(&self, url: &str) -> RequestBuilder {
		RequestBuilder::new(self.clone(), Method::POST, url)
	}

	/// PUT; params go into the body like a POST.
	pub fn put(&self, url: &str) -> RequestBuilder {
		RequestBuilder::new(self.clone(), Method::PUT, url)
	}

	pub fn delete(&self, url: &str) -> RequestBuilder {
		RequestBuilder::new(self.clone(), Method::DELETE, url)
	}

	pub fn head(&self, url: &str) -> RequestBuilder {
		RequestBuilder::new(self.clone(), Method::HEAD, url)
	}

	/// A GET or POST to `href`, resolved against `from_url`.
	///
	/// The scheme, host and fragment of `href` are ignored.
	pub(crate) fn goto(&self, from_url: &str, href: &str, method: Method) -> WebTestResult<RequestBuilder> {
		if method != Method::GET && method != Method::POST {
			return Err(WebTestError::InvalidRequest(format!(
				"Only \"GET\" or \"POST\" are allowed for method (you gave {:?})",
				method.as_str()
			)));
		}
		let href = match Url::parse(href) {
			Ok(absolute) => match absolute.query() {
				Some(query) => format!("{}?{}", absolute.path(), query),
				None => absolute.path().to_string(),
			},
			Err(_) => remove_fragment(href).to_string(),
		};
		let base = Url::parse(from_url).map_err(|source| WebTestError::InvalidUrl {
			url: from_url.to_string(),
			source,
		})?;
		let mut target = base.join(&href).map_err(|source| WebTestError::InvalidUrl {
			url: href.clone(),
			source,
		})?;
		target.set_fragment(None);
		tracing::debug!(%target, %method, "following link");
		Ok(RequestBuilder::new(self.clone(), method, target.as_str()))
	}

	/// Run a prebuilt request, e.g. for methods without a shortcut.
	///
	/// The app-wide extra environ is merged in without overriding what the
	/// request already carries.
	pub async fn request(
		&self,
		mut req: TestRequest,
		status: impl Into<ExpectedStatus>,
		expect_errors: bool,
	) -> WebTestResult<TestResponse> {
		for (key, value) in &self.inner.extra_environ {
			req.environ_mut().set_default(key, value);
		}
		self.do_request(req, status.into(), expect_errors).await
	}

	/// Resolve uploads and encode a multipart body.
	pub fn encode_multipart(
		&self,
		params: &[(String, String)],
		files: &[UploadFile],
	) -> WebTestResult<(String, Bytes)> {
		let resolved = files
			.iter()
			.map(|f| f.resolve(self.relative_to()))
			.collect::<WebTestResult<Vec<ResolvedUpload>>>()?;
		Ok(encode_multipart(params, &resolved))
	}

	/// Execute `req` against the application.
	pub async fn do_request(
		&self,
		mut req: TestRequest,
		status: ExpectedStatus,
		expect_errors: bool,
	) -> WebTestResult<TestResponse> {
		req.environ_mut().reset_streams();
		req.strip_script_name();
		{
			let cookies = self.inner.cookies.read().await;
			if let Some(header) = cookies.header_value() {
				req.headers_mut()
					.insert(COOKIE, HeaderValue::from_str(&header)?);
			}
		}
		req.environ_mut().insert(TESTING_FLAG, "true");

		let environ = req.environ().clone();
		let url = req.url(&self.inner.base_url);
		let method = req.method().clone();
		tracing::debug!(%method, %url, "dispatching test request");

		let http_request = req.into_http(&self.inner.base_url)?;
		let response = self.inner.app.call(http_request);

		let (parts, body) = response.into_parts();
		let body = body
			.collect()
			.await
			.map(|collected| collected.to_bytes())
			.unwrap_or_else(|_| Bytes::new());

		let errors = environ.errors().contents();
		let mut res = TestResponse::with_body_and_version(parts.status, parts.headers, body, parts.version)
			.with_context(self.clone(), url.clone(), errors, environ.testing_variables().snapshot());

		if !expect_errors {
			status.check(res.status(), &url, &res.text())?;
			if !res.errors().is_empty() {
				return Err(WebTestError::App(format!(
					"Application had errors logged:\n{}",
					res.errors()
				)));
			}
		}

		let mut cookies_set = BTreeMap::new();
		{
			let mut jar = self.inner.cookies.write().await;
			for header in res.headers().get_all(SET_COOKIE) {
				let header = header.to_str().map_err(|e| WebTestError::Cookie {
					header: String::from_utf8_lossy(header.as_bytes()).to_string(),
					message: e.to_string(),
				})?;
				for (name, value) in jar.store_set_cookie(header)? {
					tracing::trace!(%name, "cookie stored");
					cookies_set.insert(name, value);
				}
			}
		}
		res.set_cookies_set(cookies_set);
		tracing::debug!(status = %res.status(), %url, "test request finished");
		Ok(res)
	}
}

/// Per-request options for a [`TestApp`] request.
///
/// Awaiting the builder sends the request.
#[must_use = "a request does nothing until it is sent or awaited"]
pub struct RequestBuilder {
	app: TestApp,
	method: Method,
	url: String,
	params: Params,
	headers: Vec<(String, String)>,
	extra_environ: BTreeMap<String, String>,
	status: ExpectedStatus,
	expect_errors: bool,
	upload_files: Vec<UploadFile>,
	content_type: Option<String>,
}

impl RequestBuilder {
	fn new(app: TestApp, method: Method, url: &str) -> Self {
		Self {
			app,
			method,
			url: url.to_string(),
			params: Params::None,
			headers: Vec::new(),
			extra_environ: BTreeMap::new(),
			status: ExpectedStatus::Default,
			expect_errors: false,
			upload_files: Vec::new(),
			content_type: None,
		}
	}

	/// Query parameters for GET and HEAD, body parameters otherwise.
	pub fn params(mut self, params: impl Into<Params>) -> Self {
		self.params = params.into();
		self
	}

	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	pub fn extra_environ(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra_environ.insert(key.into(), value.into());
		self
	}

	/// The status to expect instead of "any 2xx or 3xx".
	pub fn status(mut self, status: impl Into<ExpectedStatus>) -> Self {
		self.status = status.into();
		self
	}

	/// Accept any status and ignore the application's error stream.
	pub fn expect_errors(mut self) -> Self {
		self.expect_errors = true;
		self
	}

	/// Files to send; the body becomes `multipart/form-data`.
	pub fn upload_files(mut self, files: impl IntoIterator<Item = UploadFile>) -> Self {
		self.upload_files.extend(files);
		self
	}

	pub fn upload_file(mut self, file: UploadFile) -> Self {
		self.upload_files.push(file);
		self
	}

	pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
		self.content_type = Some(content_type.into());
		self
	}

	pub fn method(&self) -> &Method {
		&self.method
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	fn build_request(self) -> WebTestResult<(TestApp, TestRequest, ExpectedStatus, bool)> {
		let carries_body = !matches!(self.method, Method::GET | Method::HEAD);
		let mut req = if carries_body {
			self.build_body_request()?
		} else {
			let mut url = remove_fragment(&self.url).to_string();
			if !self.params.is_empty() {
				url.push(if url.contains('?') { '&' } else { '?' });
				url.push_str(&self.params.encode()?);
			}
			TestRequest::blank(&url).with_method(self.method.clone())
		};

		for (key, value) in &self.app.inner.extra_environ {
			req.environ_mut().insert(key.clone(), value.clone());
		}
		for (key, value) in &self.extra_environ {
			req.environ_mut().insert(key.clone(), value.clone());
		}
		for (name, value) in &self.headers {
			req = req.with_header(name, value)?;
		}
		Ok((self.app, req, self.status, self.expect_errors))
	}

	fn build_body_request(&self) -> WebTestResult<TestRequest> {
		if self.method == Method::DELETE && !self.params.is_empty() {
			tracing::warn!(
				url = %self.url,
				"You are not supposed to send a body in a DELETE request. Most web servers will ignore it"
			);
		}
		let is_multipart = self
			.content_type
			.as_deref()
			.is_some_and(|ct| ct.starts_with("multipart"));

		let (content_type, body) = if !self.upload_files.is_empty() || is_multipart {
			let pairs = self.params.to_pairs()?;
			let (content_type, body) = self.app.encode_multipart(&pairs, &self.upload_files)?;
			(Some(content_type), body)
		} else {
			let body = Bytes::from(self.params.encode()?);
			let content_type = match &self.content_type {
				Some(explicit) => Some(explicit.clone()),
				None if !body.is_empty() => Some(FORM_URLENCODED.to_string()),
				None => None,
			};
			(content_type, body)
		};

		let mut req = TestRequest::blank(&self.url)
			.with_method(self.method.clone())
			.with_body(body);
		if let Some(content_type) = content_type {
			req = req.with_content_type(&content_type)?;
		}
		Ok(req)
	}

	/// Send the request.
	pub async fn send(self) -> WebTestResult<TestResponse> {
		let (app, req, status, expect_errors) = self.build_request()?;
		app.do_request(req, status, expect_errors).await
	}
}

impl IntoFuture for RequestBuilder {
	type Output = WebTestResult<TestResponse>;
	type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

	fn into_future(self) -> Self::IntoFuture {
		Box::pin(self.send())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::request::Environ;
	use http::StatusCode;
	use http::header::CONTENT_TYPE;
	use rstest::rstest;

	fn echo(req: Request<Full<Bytes>>) -> Response<Full<Bytes>> {
		let content_type = req
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|v| v.to_str().ok())
			.unwrap_or("")
			.to_string();
		let cookie = req
			.headers()
			.get(COOKIE)
			.and_then(|v| v.to_str().ok())
			.unwrap_or("")
			.to_string();
		let body = format!(
			"{} {} ct={} cookie={}",
			req.method(),
			req.uri(),
			content_type,
			cookie
		);
		Response::builder()
			.header(CONTENT_TYPE, "text/plain")
			.body(Full::new(Bytes::from(body)))
			.unwrap()
	}

	#[rstest]
	#[tokio::test]
	async fn test_get_appends_params_and_drops_fragment() {
		// Arrange
		let app = TestApp::new(echo);

		// Act
		let res = app
			.get("/search?a=1#frag")
			.params([("q", "two words")])
			.await
			.unwrap();

		// Assert
		assert_eq!(res.text(), "GET http://localhost/search?a=1&q=two+words ct= cookie=");
	}

	#[rstest]
	#[tokio::test]
	async fn test_post_defaults_to_urlencoded() {
		// Arrange
		let app = TestApp::new(echo);

		// Act
		let res = app.post("/submit").params(vec![("a", "b")]).await.unwrap();

		// Assert
		assert!(res.text().contains("ct=application/x-www-form-urlencoded"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_post_without_body_has_no_content_type() {
		// Arrange
		let app = TestApp::new(echo);

		// Act
		let res = app.post("/submit").await.unwrap();

		// Assert
		assert!(res.text().ends_with("ct= cookie="));
	}

	#[rstest]
	#[tokio::test]
	async fn test_upload_switches_to_multipart() {
		// Arrange
		let app = TestApp::new(|req: Request<Full<Bytes>>| {
			let ct = req.headers()[CONTENT_TYPE].to_str().unwrap().to_string();
			Response::new(Full::new(Bytes::from(ct)))
		});

		// Act
		let res = app
			.post("/upload")
			.params("title=x")
			.upload_file(UploadFile::new("doc", "a.txt", "hello"))
			.await
			.unwrap();

		// Assert
		assert!(res.text().starts_with("multipart/form-data; boundary=----------a_BoUnDaRy"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_unexpected_status_is_error() {
		// Arrange
		let app = TestApp::new(|_req: Request<Full<Bytes>>| {
			Response::builder()
				.status(StatusCode::NOT_FOUND)
				.body(Full::new(Bytes::from("missing")))
				.unwrap()
		});

		// Act
		let default = app.get("/x").await;
		let expected = app.get("/x").status(404).await;
		let ignored = app.get("/x").expect_errors().await;

		// Assert
		assert!(matches!(default, Err(WebTestError::App(_))));
		assert_eq!(expected.unwrap().status_code(), 404);
		assert_eq!(ignored.unwrap().status_code(), 404);
	}

	#[rstest]
	#[tokio::test]
	async fn test_logged_errors_fail_request() {
		// Arrange
		let app = TestApp::new(|req: Request<Full<Bytes>>| {
			if let Some(environ) = req.extensions().get::<Environ>() {
				environ.errors().write("something broke");
			}
			Response::new(Full::new(Bytes::new()))
		});

		// Act
		let err = app.get("/").await.unwrap_err();
		let res = app.get("/").expect_errors().await.unwrap();

		// Assert
		assert_eq!(
			err.to_string(),
			"Application had errors logged:\nsomething broke"
		);
		assert_eq!(res.errors(), "something broke");
	}

	#[rstest]
	#[tokio::test]
	async fn test_cookies_round_trip_and_reset() {
		// Arrange
		let app = TestApp::new(|req: Request<Full<Bytes>>| {
			let mut builder = Response::builder();
			if req.uri().path() == "/login" {
				builder = builder.header(SET_COOKIE, "session=abc; Path=/");
			}
			let cookie = req
				.headers()
				.get(COOKIE)
				.map(|v| v.to_str().unwrap().to_string())
				.unwrap_or_default();
			builder.body(Full::new(Bytes::from(cookie))).unwrap()
		});

		// Act
		let login = app.get("/login").await.unwrap();
		let after = app.get("/home").await.unwrap();
		app.reset().await;
		let cleared = app.get("/home").await.unwrap();

		// Assert
		assert_eq!(login.cookies_set().get("session").map(String::as_str), Some("abc"));
		assert_eq!(after.text(), "session=abc; ");
		assert_eq!(cleared.text(), "");
	}

	#[rstest]
	#[tokio::test]
	async fn test_extra_environ_and_script_name() {
		// Arrange
		let app = TestApp::builder(|req: Request<Full<Bytes>>| {
			let environ = req.extensions().get::<Environ>().unwrap();
			let body = format!(
				"{} {} {}",
				req.uri().path(),
				environ.get("REMOTE_USER").unwrap_or("-"),
				environ.get(TESTING_FLAG).unwrap_or("-")
			);
			Response::new(Full::new(Bytes::from(body)))
		})
		.extra_environ("REMOTE_USER", "alice")
		.build();

		// Act
		let res = app
			.get("/mount/page")
			.extra_environ("SCRIPT_NAME", "/mount")
			.await
			.unwrap();

		// Assert
		assert_eq!(res.text(), "/page alice true");
	}

	#[rstest]
	#[tokio::test]
	async fn test_request_runs_arbitrary_method() {
		// Arrange
		let app = TestApp::new(echo);
		let req = TestRequest::blank("/new-col").with_method(Method::from_bytes(b"MKCOL").unwrap());

		// Act
		let res = app.request(req, ExpectedStatus::Default, false).await.unwrap();

		// Assert
		assert!(res.text().starts_with("MKCOL http://localhost/new-col"));
	}
}
