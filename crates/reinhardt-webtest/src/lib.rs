//! # Reinhardt WebTest
//!
//! An in-process application test client with a lightweight HTML form
//! scraping layer.
//!
//! ## Features
//!
//! - **TestApp**: issue GET/POST/PUT/DELETE/HEAD requests against an
//!   application closure, with cookie persistence and status checking
//! - **TestResponse**: body inspection, link following and clicking
//! - **Forms**: regex-based form parsing, field manipulation and submission
//! - **Uploads**: `multipart/form-data` encoding
//!
//! ## Example
//!
//! ```rust
//! use reinhardt_webtest::TestApp;
//! use http::{Request, Response};
//! use http_body_util::Full;
//! use bytes::Bytes;
//!
//! # tokio_test::block_on(async {
//! let app = TestApp::new(|req: Request<Full<Bytes>>| {
//!     let body = if req.method() == http::Method::POST {
//!         "thanks".to_string()
//!     } else {
//!         r#"<form method="POST" action="/signup">
//!             <input name="email">
//!             <input type="submit" name="go" value="Sign up">
//!         </form>"#
//!             .to_string()
//!     };
//!     Response::new(Full::new(Bytes::from(body)))
//! });
//!
//! let page = app.get("/signup").await.unwrap();
//! let mut form = page.form().unwrap();
//! form.set("email", "ada@example.com").unwrap();
//! let done = form.submit(Some(("go", None))).unwrap().await.unwrap();
//! assert!(done.contains("thanks"));
//! # });
//! ```

pub mod app;
pub mod cookies;
pub mod error;
pub mod field;
pub mod forms;
pub mod html;
pub mod logging;
pub mod multipart;
pub mod request;
pub mod response;
pub mod status;

pub use app::{Application, RequestBuilder, TestApp, TestAppBuilder};
pub use cookies::CookieJar;
pub use error::{FormError, WebTestError, WebTestResult};
pub use field::{Field, FieldKind, FieldOption};
pub use forms::{Form, Forms};
pub use html::{ElementQuery, Pattern, find_element};
pub use logging::init_test_logging;
pub use multipart::{UploadFile, encode_multipart};
pub use request::{Environ, Params, TestRequest, read_body};
pub use response::{ResponseExt, TestResponse};
pub use status::ExpectedStatus;
