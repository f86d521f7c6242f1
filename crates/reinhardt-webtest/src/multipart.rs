//! `multipart/form-data` encoding for file uploads

use bytes::Bytes;
use rand::Rng;
use std::path::{Path, PathBuf};

use crate::error::{WebTestError, WebTestResult};

/// A file to upload with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
	/// Name of the form field.
	pub field: String,
	pub filename: String,
	/// File contents. `None` means "read `filename` from disk".
	pub content: Option<Vec<u8>>,
}

impl UploadFile {
	/// An upload whose contents are read from disk when the request is built.
	///
	/// Relative filenames are resolved against the app's `relative_to`
	/// directory, if one was configured.
	pub fn from_path(field: impl Into<String>, filename: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			filename: filename.into(),
			content: None,
		}
	}

	/// An upload with inline contents.
	pub fn new(
		field: impl Into<String>,
		filename: impl Into<String>,
		content: impl Into<Vec<u8>>,
	) -> Self {
		Self {
			field: field.into(),
			filename: filename.into(),
			content: Some(content.into()),
		}
	}

	/// Resolve the contents, reading from disk when needed.
	pub(crate) fn resolve(&self, relative_to: Option<&Path>) -> WebTestResult<ResolvedUpload> {
		match &self.content {
			Some(content) => Ok(ResolvedUpload {
				field: self.field.clone(),
				filename: self.filename.clone(),
				content: content.clone(),
			}),
			None => {
				let path = match relative_to {
					Some(base) => base.join(&self.filename),
					None => PathBuf::from(&self.filename),
				};
				let content = std::fs::read(&path).map_err(|source| WebTestError::Upload {
					path: path.display().to_string(),
					source,
				})?;
				Ok(ResolvedUpload {
					field: self.field.clone(),
					filename: path.display().to_string(),
					content,
				})
			}
		}
	}
}

/// An upload with its contents in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUpload {
	pub field: String,
	pub filename: String,
	pub content: Vec<u8>,
}

/// Generate a fresh multipart boundary.
pub fn make_boundary() -> String {
	let n: u64 = rand::thread_rng().r#gen();
	format!("----------a_BoUnDaRy{}$", n)
}

/// Encode form parameters and files into a `multipart/form-data` body.
///
/// Returns the `Content-Type` header value (carrying the boundary) and the
/// body.
///
/// # Examples
///
/// ```
/// use reinhardt_webtest::multipart::{encode_multipart_with_boundary, ResolvedUpload};
///
/// let (content_type, body) = encode_multipart_with_boundary(
///     &[("title".to_string(), "hi".to_string())],
///     &[ResolvedUpload {
///         field: "doc".into(),
///         filename: "a.txt".into(),
///         content: b"text".to_vec(),
///     }],
///     "XyZ",
/// );
/// assert_eq!(content_type, "multipart/form-data; boundary=XyZ");
/// assert!(String::from_utf8_lossy(&body).contains("Content-Type: text/plain"));
/// ```
pub fn encode_multipart(params: &[(String, String)], files: &[ResolvedUpload]) -> (String, Bytes) {
	encode_multipart_with_boundary(params, files, &make_boundary())
}

/// [`encode_multipart`] with a caller-chosen boundary.
pub fn encode_multipart_with_boundary(
	params: &[(String, String)],
	files: &[ResolvedUpload],
	boundary: &str,
) -> (String, Bytes) {
	let mut lines: Vec<Vec<u8>> = Vec::new();
	for (key, value) in params {
		lines.push(format!("--{}", boundary).into_bytes());
		lines.push(format!("Content-Disposition: form-data; name=\"{}\"", key).into_bytes());
		lines.push(Vec::new());
		lines.push(value.as_bytes().to_vec());
	}
	for file in files {
		lines.push(format!("--{}", boundary).into_bytes());
		lines.push(
			format!(
				"Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
				file.field, file.filename
			)
			.into_bytes(),
		);
		let guessed = mime_guess::from_path(&file.filename)
			.first_raw()
			.unwrap_or("application/octet-stream");
		lines.push(format!("Content-Type: {}", guessed).into_bytes());
		lines.push(Vec::new());
		lines.push(file.content.clone());
	}
	lines.push(format!("--{}--", boundary).into_bytes());
	lines.push(Vec::new());

	let body = lines.join(&b"\r\n"[..]);
	(
		format!("multipart/form-data; boundary={}", boundary),
		Bytes::from(body),
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::io::Write;

	#[rstest]
	fn test_encode_multipart_layout() {
		// Arrange
		let params = vec![("a".to_string(), "1".to_string())];
		let files = vec![ResolvedUpload {
			field: "f".to_string(),
			filename: "data.bin".to_string(),
			content: vec![0, 1, 2],
		}];

		// Act
		let (content_type, body) = encode_multipart_with_boundary(&params, &files, "B");

		// Assert
		assert_eq!(content_type, "multipart/form-data; boundary=B");
		let mut expected = b"--B\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--B\r\nContent-Disposition: form-data; name=\"f\"; filename=\"data.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n".to_vec();
		expected.extend_from_slice(&[0, 1, 2]);
		expected.extend_from_slice(b"\r\n--B--\r\n");
		assert_eq!(body.as_ref(), expected.as_slice());
	}

	#[rstest]
	fn test_boundary_shape() {
		// Act
		let boundary = make_boundary();

		// Assert
		assert!(boundary.starts_with("----------a_BoUnDaRy"));
		assert!(boundary.ends_with('$'));
	}

	#[rstest]
	fn test_resolve_reads_relative_to_directory() {
		// Arrange
		let dir = tempfile::tempdir().unwrap();
		let mut file = std::fs::File::create(dir.path().join("hello.txt")).unwrap();
		file.write_all(b"hello").unwrap();
		let upload = UploadFile::from_path("doc", "hello.txt");

		// Act
		let resolved = upload.resolve(Some(dir.path())).unwrap();

		// Assert
		assert_eq!(resolved.content, b"hello");
		assert!(resolved.filename.ends_with("hello.txt"));
	}

	#[rstest]
	fn test_resolve_missing_file_is_error() {
		// Arrange
		let upload = UploadFile::from_path("doc", "/definitely/not/here.txt");

		// Act
		let result = upload.resolve(None);

		// Assert
		assert!(matches!(result, Err(WebTestError::Upload { .. })));
	}
}
