//! Cookie jar kept by [`TestApp`](crate::TestApp) between requests

use cookie::Cookie;
use std::collections::BTreeMap;

use crate::error::{WebTestError, WebTestResult};

/// Cookies remembered across requests, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
	cookies: BTreeMap<String, String>,
}

impl CookieJar {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.cookies.is_empty()
	}

	pub fn len(&self) -> usize {
		self.cookies.len()
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self.cookies.get(name).map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Store a cookie by hand.
	///
	/// Names must be non-empty and free of `=`, `;`, whitespace and control
	/// characters; values must not contain `;` or control characters.
	pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> WebTestResult<()> {
		let name = name.into();
		let value = value.into();
		validate_cookie_key(&name)?;
		validate_cookie_value(&value)?;
		self.cookies.insert(name, value);
		Ok(())
	}

	pub fn remove(&mut self, name: &str) -> Option<String> {
		self.cookies.remove(name)
	}

	pub fn clear(&mut self) {
		self.cookies.clear();
	}

	/// Record every cookie of one `Set-Cookie` header value and return
	/// the `(name, value)` pairs that were stored.
	pub fn store_set_cookie(&mut self, header: &str) -> WebTestResult<Vec<(String, String)>> {
		let cookie = Cookie::parse(header.to_string()).map_err(|e| WebTestError::Cookie {
			header: header.to_string(),
			message: e.to_string(),
		})?;
		let name = cookie.name().to_string();
		let raw = cookie.value();
		let value = if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
			unquote_cookie_value(cookie.value_trimmed())
		} else {
			raw.to_string()
		};
		self.cookies.insert(name.clone(), value.clone());
		Ok(vec![(name, value)])
	}

	/// Render the jar as a `Cookie` request header, or `None` when empty.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_webtest::cookies::CookieJar;
	///
	/// let mut jar = CookieJar::new();
	/// jar.set("a", "1").unwrap();
	/// jar.set("b", "x y").unwrap();
	/// assert_eq!(jar.header_value().as_deref(), Some("a=1; b=\"x y\"; "));
	/// ```
	pub fn header_value(&self) -> Option<String> {
		if self.cookies.is_empty() {
			return None;
		}
		Some(
			self.cookies
				.iter()
				.map(|(name, value)| format!("{}={}; ", name, quote_cookie_value(value)))
				.collect(),
		)
	}
}

fn is_legal_cookie_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~:".contains(c)
}

/// Quote a cookie value when it contains characters outside the token set.
pub fn quote_cookie_value(value: &str) -> String {
	if value.chars().all(is_legal_cookie_char) {
		return value.to_string();
	}
	let mut out = String::with_capacity(value.len() + 2);
	out.push('"');
	for c in value.chars() {
		match c {
			'"' => out.push_str("\\\""),
			'\\' => out.push_str("\\\\"),
			c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
			c => {
				let mut buf = [0u8; 4];
				for byte in c.encode_utf8(&mut buf).bytes() {
					out.push_str(&format!("\\{:03o}", byte));
				}
			}
		}
	}
	out.push('"');
	out
}

/// Undo the escapes of [`quote_cookie_value`] on a value whose
/// surrounding quotes were already removed.
pub fn unquote_cookie_value(value: &str) -> String {
	let bytes = value.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'\\' && i + 1 < bytes.len() {
			let octal = bytes.get(i + 1..i + 4).filter(|d| d.iter().all(|b| (b'0'..=b'7').contains(b)));
			if let Some(digits) = octal {
				let code = digits.iter().fold(0u16, |acc, d| acc * 8 + u16::from(d - b'0'));
				if let Ok(byte) = u8::try_from(code) {
					out.push(byte);
					i += 4;
					continue;
				}
			}
			out.push(bytes[i + 1]);
			i += 2;
		} else {
			out.push(bytes[i]);
			i += 1;
		}
	}
	String::from_utf8_lossy(&out).into_owned()
}

fn validate_cookie_key(key: &str) -> WebTestResult<()> {
	let problem = if key.is_empty() {
		Some("must not be empty")
	} else if key.contains('=') {
		Some("must not contain '='")
	} else if key.contains(';') {
		Some("must not contain ';'")
	} else if key.chars().any(|c| c.is_ascii_whitespace()) {
		Some("must not contain whitespace")
	} else if key.chars().any(|c| c.is_control()) {
		Some("must not contain control characters")
	} else {
		None
	};
	match problem {
		Some(problem) => Err(WebTestError::InvalidRequest(format!(
			"cookie key {} (found in key: {:?})",
			problem, key
		))),
		None => Ok(()),
	}
}

fn validate_cookie_value(value: &str) -> WebTestResult<()> {
	let problem = if value.contains(';') {
		Some("must not contain ';'")
	} else if value.contains('\r') || value.contains('\n') {
		Some("must not contain newlines")
	} else if value.chars().any(|c| c.is_control()) {
		Some("must not contain control characters")
	} else {
		None
	};
	match problem {
		Some(problem) => Err(WebTestError::InvalidRequest(format!(
			"cookie value {} (found in value: {:?})",
			problem, value
		))),
		None => Ok(()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_store_set_cookie_ignores_attributes() {
		// Arrange
		let mut jar = CookieJar::new();

		// Act
		let stored = jar
			.store_set_cookie("session=abc123; Path=/; HttpOnly")
			.unwrap();

		// Assert
		assert_eq!(stored, vec![("session".to_string(), "abc123".to_string())]);
		assert_eq!(jar.get("session"), Some("abc123"));
	}

	#[rstest]
	fn test_store_set_cookie_rejects_garbage() {
		// Arrange
		let mut jar = CookieJar::new();

		// Act
		let result = jar.store_set_cookie("no-equals-sign");

		// Assert
		assert!(matches!(result, Err(WebTestError::Cookie { .. })));
	}

	#[rstest]
	#[case("plain", "plain")]
	#[case("with space", "\"with space\"")]
	#[case("q\"uote", "\"q\\\"uote\"")]
	#[case("é", "\"\\303\\251\"")]
	fn test_quote_cookie_value(#[case] raw: &str, #[case] quoted: &str) {
		// Act & Assert
		assert_eq!(quote_cookie_value(raw), quoted);
	}

	#[rstest]
	#[case("")]
	#[case("key=value")]
	#[case("key;injection")]
	#[case("key name")]
	#[case("key\x00name")]
	fn test_set_rejects_invalid_keys(#[case] key: &str) {
		// Arrange
		let mut jar = CookieJar::new();

		// Act & Assert
		assert!(jar.set(key, "v").is_err());
	}

	#[rstest]
	#[case("value; extra=injected")]
	#[case("value\r\nInjected-Header: malicious")]
	#[case("value\x01hidden")]
	fn test_set_rejects_invalid_values(#[case] value: &str) {
		// Arrange
		let mut jar = CookieJar::new();

		// Act & Assert
		assert!(jar.set("k", value).is_err());
	}

	#[rstest]
	#[case(r#"sess="a b""#, "a b", "sess=\"a b\"; ")]
	#[case(r#"q="say \"hi\"""#, r#"say "hi""#, r#"q="say \"hi\""; "#)]
	#[case(r#"u="caf\303\251""#, "café", r#"u="caf\303\251"; "#)]
	#[case(r#"plain="""#, "", "plain=; ")]
	fn test_quoted_set_cookie_round_trips(
		#[case] header: &str,
		#[case] stored: &str,
		#[case] sent: &str,
	) {
		// Arrange
		let mut jar = CookieJar::new();

		// Act
		let pairs = jar.store_set_cookie(header).unwrap();

		// Assert
		assert_eq!(pairs[0].1, stored);
		assert_eq!(jar.header_value().as_deref(), Some(sent));
	}

	#[rstest]
	fn test_header_value_empty_jar() {
		// Act & Assert
		assert_eq!(CookieJar::new().header_value(), None);
	}
}
