//! Regex-based scanning helpers for response bodies
//!
//! These helpers deliberately understand only the handful of tags test suites
//! care about. They are not an HTML parser.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{WebTestError, WebTestResult};

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(
		r#"(?s)([^= \n\r\t]+)[ \n\r\t]*(?:=[ \n\r\t]*(?:"([^"]*)"|'([^']*)'|([^"'][^ \n\r\t>]*)))?"#,
	)
	.expect("attribute pattern is valid")
});

static SCRIPT_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"(?is)<script.*?>.*?</script>").expect("script pattern is valid"));

/// Lowercased attribute names mapped to their unquoted values.
pub type Attributes = BTreeMap<String, String>;

/// Parse the attribute portion of a start tag.
///
/// Attribute names are lowercased. Values are HTML-unquoted; attributes
/// given without a value map to the empty string.
///
/// # Examples
///
/// ```
/// use reinhardt_webtest::html::parse_attrs;
///
/// let attrs = parse_attrs(r#" NAME="q" value='a &amp; b' checked"#);
/// assert_eq!(attrs["name"], "q");
/// assert_eq!(attrs["value"], "a & b");
/// assert_eq!(attrs["checked"], "");
/// ```
pub fn parse_attrs(text: &str) -> Attributes {
	let mut attrs = Attributes::new();
	for caps in ATTR_RE.captures_iter(text) {
		let name = caps[1].to_lowercase();
		let body = caps
			.get(2)
			.or_else(|| caps.get(3))
			.or_else(|| caps.get(4))
			.map(|m| m.as_str())
			.unwrap_or("");
		attrs.insert(name, html_unquote(body));
	}
	attrs
}

/// Unquote the few entities forms commonly carry. Incomplete on purpose.
pub fn html_unquote(value: &str) -> String {
	let mut out = value.to_string();
	for (entity, replacement) in [
		("&nbsp;", " "),
		("&gt;", ">"),
		("&lt;", "<"),
		("&quot;", "\""),
		("&amp;", "&"),
	] {
		out = out.replace(entity, replacement);
	}
	out
}

/// A matcher used when searching for links and buttons.
///
/// Either a regular expression (searched, not anchored) or an arbitrary
/// predicate.
#[derive(Clone)]
pub enum Pattern {
	Regex(Regex),
	Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Pattern {
	/// Compile a regular expression pattern.
	pub fn new(pattern: &str) -> Result<Self, regex::Error> {
		Ok(Self::Regex(Regex::new(pattern)?))
	}

	/// Wrap a predicate closure.
	pub fn predicate<F>(f: F) -> Self
	where
		F: Fn(&str) -> bool + Send + Sync + 'static,
	{
		Self::Predicate(Arc::new(f))
	}

	pub fn matches(&self, text: &str) -> bool {
		match self {
			Pattern::Regex(re) => re.is_match(text),
			Pattern::Predicate(f) => f(text),
		}
	}
}

impl fmt::Debug for Pattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Pattern::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
			Pattern::Predicate(_) => f.write_str("Predicate(..)"),
		}
	}
}

impl From<Regex> for Pattern {
	fn from(re: Regex) -> Self {
		Self::Regex(re)
	}
}

/// Strings compile to regexes; text that is not a valid regex matches
/// literally.
impl From<&str> for Pattern {
	fn from(pattern: &str) -> Self {
		match Regex::new(pattern) {
			Ok(re) => Self::Regex(re),
			Err(_) => Self::Regex(
				Regex::new(&regex::escape(pattern)).expect("escaped pattern is valid"),
			),
		}
	}
}

/// Criteria for [`find_element`]. All given patterns must match.
#[derive(Debug, Clone, Default)]
pub struct ElementQuery {
	/// Matched against the element contents (everything between the tags).
	pub content: Option<Pattern>,
	/// Matched against the `id` attribute, or the empty string.
	pub id: Option<Pattern>,
	/// Matched against the literal href (after extraction).
	pub href: Option<Pattern>,
	/// Matched against the whole element HTML.
	pub html: Option<Pattern>,
	/// Which of several matching elements to pick.
	pub index: Option<usize>,
}

impl ElementQuery {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn content(mut self, pattern: impl Into<Pattern>) -> Self {
		self.content = Some(pattern.into());
		self
	}

	pub fn id(mut self, pattern: impl Into<Pattern>) -> Self {
		self.id = Some(pattern.into());
		self
	}

	pub fn href(mut self, pattern: impl Into<Pattern>) -> Self {
		self.href = Some(pattern.into());
		self
	}

	pub fn html(mut self, pattern: impl Into<Pattern>) -> Self {
		self.html = Some(pattern.into());
		self
	}

	pub fn index(mut self, index: usize) -> Self {
		self.index = Some(index);
		self
	}
}

/// An element selected by [`find_element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundElement {
	pub html: String,
	pub content: String,
	pub attrs: Attributes,
	/// The link target, after `href_extract` was applied.
	pub uri: String,
}

/// Search `body` for `<tag ...>...</tag>` elements that carry a usable
/// link in `href_attr` and satisfy `query`.
///
/// Elements inside `<script>` blocks are ignored, as are fragment-only
/// and `javascript:` links. When `href_extract` is given, its first capture
/// group is taken from the attribute value as the link.
pub fn find_element(
	body: &str,
	tag: &str,
	href_attr: &str,
	href_extract: Option<&Regex>,
	query: &ElementQuery,
) -> WebTestResult<FoundElement> {
	let tag_re = Regex::new(&format!(
		r"(?is)<{tag}\s+(.*?)>(.*?)</{tag}>",
		tag = regex::escape(tag)
	))
	.map_err(|e| WebTestError::InvalidRequest(e.to_string()))?;
	let bad_spans: Vec<(usize, usize)> = SCRIPT_RE
		.find_iter(body)
		.map(|m| (m.start(), m.end()))
		.collect();

	let mut found = Vec::new();
	let mut total = 0usize;
	for caps in tag_re.captures_iter(body) {
		let whole = caps.get(0).expect("group 0 always participates");
		if bad_spans
			.iter()
			.any(|&(start, end)| whole.start() > start && whole.end() < end)
		{
			continue;
		}
		let el_html = whole.as_str();
		let el_content = &caps[2];
		let mut attrs = parse_attrs(&caps[1]);
		tracing::debug!(element = el_html, "inspecting element");

		let Some(raw_href) = attrs.get(href_attr).filter(|v| !v.is_empty()).cloned() else {
			tracing::debug!("  skipped: no {} attribute", href_attr);
			continue;
		};
		let el_href = match href_extract {
			Some(extract) => match extract.captures(&raw_href).and_then(|c| c.get(1)) {
				Some(m) => m.as_str().to_string(),
				None => {
					tracing::debug!("  skipped: doesn't match extract pattern");
					continue;
				}
			},
			None => raw_href,
		};
		attrs.insert("uri".to_string(), el_href.clone());
		if el_href.starts_with('#') {
			tracing::debug!("  skipped: only internal fragment href");
			continue;
		}
		if el_href.starts_with("javascript:") {
			tracing::debug!("  skipped: cannot follow javascript:");
			continue;
		}
		total += 1;
		if query.content.as_ref().is_some_and(|p| !p.matches(el_content)) {
			tracing::debug!("  skipped: doesn't match description");
			continue;
		}
		let id = attrs.get("id").map(String::as_str).unwrap_or("");
		if query.id.as_ref().is_some_and(|p| !p.matches(id)) {
			tracing::debug!("  skipped: doesn't match id");
			continue;
		}
		if query.href.as_ref().is_some_and(|p| !p.matches(&el_href)) {
			tracing::debug!("  skipped: doesn't match href");
			continue;
		}
		if query.html.as_ref().is_some_and(|p| !p.matches(el_html)) {
			tracing::debug!("  skipped: doesn't match html");
			continue;
		}
		tracing::debug!("  accepted");
		found.push(FoundElement {
			html: el_html.to_string(),
			content: el_content.to_string(),
			attrs,
			uri: el_href,
		});
	}

	if found.is_empty() {
		return Err(WebTestError::NoMatch(format!(
			"No matching elements found (from {} possible)",
			total
		)));
	}
	match query.index {
		None if found.len() > 1 => Err(WebTestError::NoMatch(format!(
			"Multiple links match: {}",
			found
				.iter()
				.map(|f| format!("{:?}", f.html))
				.collect::<Vec<_>>()
				.join(", ")
		))),
		None => Ok(found.swap_remove(0)),
		Some(index) => {
			let matched = found.len();
			if index < matched {
				Ok(found.swap_remove(index))
			} else {
				Err(WebTestError::NoMatch(format!(
					"Only {} (out of {}) links match; index {} out of range",
					matched, total, index
				)))
			}
		}
	}
}
