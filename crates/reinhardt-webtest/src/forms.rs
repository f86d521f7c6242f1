//! HTML form scraping
//!
//! [`Form::parse`] scans the text of a single `<form>` element in one pass,
//! tracking an open `<select>` (to collect its options) and an open
//! `<textarea>` (to capture its contents). Radio buttons sharing a name are
//! folded into one field.

use once_cell::sync::Lazy;
use regex::Regex;
use http::Method;
use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use crate::app::{RequestBuilder, TestApp};
use crate::error::{FormError, WebTestError, WebTestResult};
use crate::field::Field;
use crate::html::{html_unquote, parse_attrs};
use crate::multipart::UploadFile;

static FORM_TAG_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"(?i)<(/?)([a-z0-9_\-]*)([^>]*?)>").expect("tag pattern is valid"));

static PAGE_TAG_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"(?is)<(/?)([:a-z0-9_\-]*)(.*?)>").expect("tag pattern is valid"));

const DEFAULT_ENCTYPE: &str = "application/x-www-form-urlencoded";

/// Where a form was found, so it can be submitted.
#[derive(Debug, Clone)]
struct FormOrigin {
	app: TestApp,
	url: String,
}

/// A form found in a page.
#[derive(Debug, Clone)]
pub struct Form {
	text: String,
	action: String,
	method: String,
	id: Option<String>,
	enctype: String,
	fields: Vec<Field>,
	origin: Option<FormOrigin>,
}

impl Form {
	/// Parse the full HTML of one `<form>...</form>` element.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_webtest::forms::Form;
	///
	/// let form = Form::parse(r#"<form action="/s"><input name="q" value="rust"></form>"#).unwrap();
	/// assert_eq!(form.action(), "/s");
	/// assert_eq!(form.method(), "GET");
	/// assert_eq!(form.get("q").unwrap().value().as_deref(), Some("rust"));
	/// ```
	pub fn parse(text: &str) -> Result<Self, FormError> {
		let fields = parse_fields(text)?;
		let (action, method, id, enctype) = parse_action(text)?;
		Ok(Self {
			text: text.to_string(),
			action,
			method,
			id,
			enctype,
			fields,
			origin: None,
		})
	}

	/// The full HTML of the form.
	pub fn text(&self) -> &str {
		&self.text
	}

	/// The (possibly relative) action URI.
	pub fn action(&self) -> &str {
		&self.action
	}

	/// The method as written in the page, e.g. `GET`.
	pub fn method(&self) -> &str {
		&self.method
	}

	pub fn id(&self) -> Option<&str> {
		self.id.as_deref()
	}

	pub fn enctype(&self) -> &str {
		&self.enctype
	}

	/// All fields in document order.
	pub fn fields(&self) -> &[Field] {
		&self.fields
	}

	/// Distinct field names in document order.
	pub fn field_names(&self) -> Vec<&str> {
		let mut names: Vec<&str> = Vec::new();
		for name in self.fields.iter().filter_map(Field::name) {
			if !names.contains(&name) {
				names.push(name);
			}
		}
		names
	}

	/// Every field carrying `name`.
	pub fn fields_named(&self, name: &str) -> Vec<&Field> {
		self.fields
			.iter()
			.filter(|f| f.name() == Some(name))
			.collect()
	}

	fn positions(&self, name: &str) -> Vec<usize> {
		self.fields
			.iter()
			.enumerate()
			.filter(|(_, f)| f.name() == Some(name))
			.map(|(i, _)| i)
			.collect()
	}

	fn no_such_field(&self, name: &str) -> FormError {
		FormError::NoSuchField {
			name: name.to_string(),
			available: self
				.field_names()
				.iter()
				.map(|n| format!("{:?}", n))
				.collect::<Vec<_>>()
				.join(", "),
		}
	}

	fn single_position(&self, name: &str) -> Result<usize, FormError> {
		match self.positions(name).as_slice() {
			[] => Err(self.no_such_field(name)),
			[one] => Ok(*one),
			many => Err(FormError::Ambiguous {
				name: name.to_string(),
				count: many.len(),
			}),
		}
	}

	fn indexed_position(&self, name: &str, index: usize) -> Result<usize, FormError> {
		let positions = self.positions(name);
		if positions.is_empty() {
			return Err(self.no_such_field(name));
		}
		positions
			.get(index)
			.copied()
			.ok_or_else(|| FormError::IndexOutOfRange {
				name: name.to_string(),
				index,
			})
	}

	/// The one field called `name`. Missing or ambiguous names are errors.
	pub fn get(&self, name: &str) -> Result<&Field, FormError> {
		Ok(&self.fields[self.single_position(name)?])
	}

	pub fn get_mut(&mut self, name: &str) -> Result<&mut Field, FormError> {
		let pos = self.single_position(name)?;
		Ok(&mut self.fields[pos])
	}

	/// The `index`-th field called `name`.
	pub fn get_index(&self, name: &str, index: usize) -> Result<&Field, FormError> {
		Ok(&self.fields[self.indexed_position(name, index)?])
	}

	pub fn get_index_mut(&mut self, name: &str, index: usize) -> Result<&mut Field, FormError> {
		let pos = self.indexed_position(name, index)?;
		Ok(&mut self.fields[pos])
	}

	/// Like [`Form::get`], but `None` when no field has that name.
	pub fn get_or_none(&self, name: &str) -> Result<Option<&Field>, FormError> {
		if self.positions(name).is_empty() {
			return Ok(None);
		}
		self.get(name).map(Some)
	}

	/// Set the value of the one field called `name`.
	///
	/// Selects and radios pick the matching option, checkboxes are checked
	/// by a non-empty value, buttons cannot be set. Use [`Form::set_index`]
	/// when several fields share the name.
	pub fn set(&mut self, name: &str, value: &str) -> Result<(), FormError> {
		self.get_mut(name)?.set_value(value)
	}

	pub fn set_index(&mut self, name: &str, index: usize, value: &str) -> Result<(), FormError> {
		self.get_index_mut(name, index)?.set_value(value)
	}

	/// Check or uncheck the checkbox called `name`.
	pub fn check(&mut self, name: &str, checked: bool) -> Result<(), FormError> {
		self.get_mut(name)?.set_checked(checked)
	}

	/// Like [`Form::set`], but first confirms the target is a `<select>`.
	pub fn select(&mut self, name: &str, value: &str, index: Option<usize>) -> Result<(), FormError> {
		let field = match index {
			Some(index) => self.get_index_mut(name, index)?,
			None => self.get_mut(name)?,
		};
		if !field.is_select() {
			return Err(FormError::NotASelect {
				name: name.to_string(),
			});
		}
		field.set_value(value)
	}

	/// `(name, value)` pairs for the current state of the form.
	///
	/// When `button` is given, that button's value comes first as if it had
	/// been pressed. File inputs are left to [`Form::upload_fields`].
	pub fn submit_fields(
		&self,
		button: Option<(&str, Option<usize>)>,
	) -> Result<Vec<(String, String)>, FormError> {
		let mut submit = Vec::new();
		if let Some((name, index)) = button {
			let field = match index {
				Some(index) => self.get_index(name, index)?,
				None => self.get(name)?,
			};
			if let Some(value) = field.value_if_submitted()? {
				submit.push((name.to_string(), value));
			}
		}
		for field in &self.fields {
			let Some(name) = field.name() else {
				continue;
			};
			if field.is_file() {
				continue;
			}
			if let Some(values) = field.values() {
				submit.extend(values.into_iter().map(|v| (name.to_string(), v)));
			}
		}
		Ok(submit)
	}

	/// Files chosen for the form's file inputs.
	pub fn upload_fields(&self) -> Vec<UploadFile> {
		self.fields
			.iter()
			.filter_map(|field| {
				let chosen = field.chosen_file()?;
				Some(UploadFile {
					field: field.name()?.to_string(),
					filename: chosen.filename.clone(),
					content: chosen.content.clone(),
				})
			})
			.collect()
	}
}

impl Form {
	/// Submit the form, optionally pressing the button `button`.
	///
	/// The request goes to the form's action with its method; chosen files
	/// are uploaded and non-GET requests use the form's enctype.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_webtest::TestApp;
	/// use http::{Request, Response};
	/// use http_body_util::Full;
	/// use bytes::Bytes;
	///
	/// # tokio_test::block_on(async {
	/// let app = TestApp::new(|req: Request<Full<Bytes>>| {
	///     let body = match req.uri().query() {
	///         Some(query) => format!("searched {}", query),
	///         None => r#"<form action="/search"><input name="q"></form>"#.to_string(),
	///     };
	///     Response::new(Full::new(Bytes::from(body)))
	/// });
	/// let mut form = app.get("/").await.unwrap().form().unwrap();
	/// form.set("q", "rust").unwrap();
	/// let res = form.submit(None).unwrap().await.unwrap();
	/// assert_eq!(res.text(), "searched q=rust");
	/// # });
	/// ```
	pub fn submit(&self, button: Option<(&str, Option<usize>)>) -> WebTestResult<RequestBuilder> {
		let origin = self.origin.as_ref().ok_or_else(|| {
			WebTestError::InvalidRequest(
				"This form was not read from a response and cannot be submitted".to_string(),
			)
		})?;
		let method = Method::from_bytes(self.method.to_uppercase().as_bytes())
			.map_err(|e| WebTestError::InvalidRequest(e.to_string()))?;
		let fields = self.submit_fields(button)?;
		let uploads = self.upload_fields();
		let is_get = method == Method::GET;

		let mut request = origin
			.app
			.goto(&origin.url, &self.action, method)?
			.params(fields);
		if !uploads.is_empty() {
			request = request.upload_files(uploads);
		}
		if !is_get {
			request = request.content_type(self.enctype.clone());
		}
		Ok(request)
	}

	pub(crate) fn set_origin(&mut self, app: &TestApp, url: &str) {
		self.origin = Some(FormOrigin {
			app: app.clone(),
			url: url.to_string(),
		});
	}
}

impl Index<&str> for Form {
	type Output = Field;

	/// Panics when the name is missing or ambiguous.
	fn index(&self, name: &str) -> &Field {
		match self.get(name) {
			Ok(field) => field,
			Err(e) => panic!("{}", e),
		}
	}
}

fn parse_fields(text: &str) -> Result<Vec<Field>, FormError> {
	let mut fields: Vec<Field> = Vec::new();
	let mut radios: HashMap<Option<String>, usize> = HashMap::new();
	let mut in_select: Option<usize> = None;
	let mut in_textarea: Option<(usize, usize)> = None;

	for caps in FORM_TAG_RE.captures_iter(text) {
		let whole = caps.get(0).expect("group 0 always participates");
		let end = &caps[1] == "/";
		let tag = caps[2].to_lowercase();
		if !matches!(
			tag.as_str(),
			"input" | "select" | "option" | "textarea" | "button"
		) {
			continue;
		}
		if tag == "select" && end {
			if in_select.take().is_none() {
				return Err(FormError::Malformed(format!(
					"{:?} without starting select",
					whole.as_str()
				)));
			}
			continue;
		}
		if tag == "textarea" && end {
			let Some((index, content_start)) = in_textarea.take() else {
				return Err(FormError::Malformed(format!(
					"</textarea> with no <textarea> at {}",
					whole.start()
				)));
			};
			fields[index].set_text_content(html_unquote(&text[content_start..whole.start()]));
			continue;
		}
		if end {
			continue;
		}

		let attrs = parse_attrs(&caps[3]);
		if tag == "option" {
			let Some(select) = in_select else {
				return Err(FormError::Malformed(format!(
					"<option> outside of a <select> at {}",
					whole.start()
				)));
			};
			let value = attrs.get("value").cloned();
			fields[select].push_option(value, attrs.contains_key("selected"));
			continue;
		}

		let is_radio = tag == "input"
			&& attrs
				.get("type")
				.is_some_and(|t| t.eq_ignore_ascii_case("radio"));
		if is_radio {
			let name = attrs.get("name").cloned();
			let value = attrs.get("value").cloned();
			let checked = attrs.contains_key("checked");
			let index = match radios.get(&name) {
				Some(&index) => index,
				None => {
					fields.push(Field::new(&tag, whole.start(), attrs));
					radios.insert(name, fields.len() - 1);
					fields.len() - 1
				}
			};
			fields[index].push_option(value, checked);
			continue;
		}

		let field = Field::new(&tag, whole.start(), attrs);
		match tag.as_str() {
			"textarea" => {
				if in_textarea.is_some() {
					return Err(FormError::Malformed(format!(
						"Nested textareas at {}",
						whole.start()
					)));
				}
				in_textarea = Some((fields.len(), whole.end()));
			}
			"select" => {
				if in_select.is_some() {
					return Err(FormError::Malformed(format!(
						"Nested selects at {}",
						whole.start()
					)));
				}
				in_select = Some(fields.len());
			}
			_ => {}
		}
		fields.push(field);
	}
	Ok(fields)
}

fn parse_action(text: &str) -> Result<(String, String, Option<String>, String), FormError> {
	let mut start: Option<(String, String, Option<String>, String)> = None;
	for caps in FORM_TAG_RE.captures_iter(text) {
		if !caps[2].eq_ignore_ascii_case("form") {
			continue;
		}
		if &caps[1] == "/" {
			return start.ok_or_else(|| FormError::NoForm("No <form> tag found".to_string()));
		}
		let mut attrs = parse_attrs(&caps[3]);
		start = Some((
			attrs.remove("action").unwrap_or_default(),
			attrs.remove("method").unwrap_or_else(|| "GET".to_string()),
			attrs.remove("id"),
			attrs
				.remove("enctype")
				.unwrap_or_else(|| DEFAULT_ENCTYPE.to_string()),
		));
	}
	Err(FormError::NoForm("No </form> tag found".to_string()))
}

/// The forms of a page, addressable by position or by id.
#[derive(Debug, Clone, Default)]
pub struct Forms {
	forms: Vec<Form>,
	by_id: HashMap<String, usize>,
}

impl Forms {
	/// Find every `<form>...</form>` in `body`.
	///
	/// Nested forms, a stray `</form>` or an unterminated form are errors.
	pub fn extract(body: &str) -> WebTestResult<Self> {
		let mut texts = Vec::new();
		let mut started: Option<usize> = None;
		for caps in PAGE_TAG_RE.captures_iter(body) {
			if !caps[2].eq_ignore_ascii_case("form") {
				continue;
			}
			let whole = caps.get(0).expect("group 0 always participates");
			if &caps[1] == "/" {
				let Some(begin) = started.take() else {
					return Err(FormError::Malformed(format!(
						"</form> unexpected at {}",
						whole.start()
					))
					.into());
				};
				texts.push(&body[begin..whole.end()]);
			} else {
				if started.is_some() {
					return Err(FormError::Malformed(format!(
						"Nested form tags at {}",
						whole.start()
					))
					.into());
				}
				started = Some(whole.start());
			}
		}
		if let Some(begin) = started {
			return Err(
				FormError::Malformed(format!("Dangling form: {:?}", &body[begin..])).into(),
			);
		}

		let mut forms = Forms::default();
		for text in texts {
			let form = Form::parse(text).map_err(WebTestError::from)?;
			if let Some(id) = form.id() {
				forms.by_id.insert(id.to_string(), forms.forms.len());
			}
			forms.forms.push(form);
		}
		Ok(forms)
	}

	pub fn len(&self) -> usize {
		self.forms.len()
	}

	pub fn is_empty(&self) -> bool {
		self.forms.is_empty()
	}

	/// The `index`-th form of the page.
	pub fn at(&self, index: usize) -> Option<&Form> {
		self.forms.get(index)
	}

	/// The form with the given `id` attribute.
	pub fn by_id(&self, id: &str) -> Option<&Form> {
		self.by_id.get(id).map(|&i| &self.forms[i])
	}

	pub fn by_id_mut(&mut self, id: &str) -> Option<&mut Form> {
		let index = *self.by_id.get(id)?;
		self.forms.get_mut(index)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Form> {
		self.forms.iter()
	}

	pub(crate) fn with_origin(mut self, app: &TestApp, url: &str) -> Self {
		for form in &mut self.forms {
			form.set_origin(app, url);
		}
		self
	}

	pub(crate) fn into_single(self) -> WebTestResult<Form> {
		let mut forms = self.forms;
		match forms.len() {
			0 => Err(FormError::NoForm("You used response.form, but no forms exist".to_string()).into()),
			1 => Ok(forms.remove(0)),
			_ => Err(FormError::NoForm(
				"You used response.form, but more than one form exists".to_string(),
			)
			.into()),
		}
	}
}

impl Index<usize> for Forms {
	type Output = Form;

	fn index(&self, index: usize) -> &Form {
		&self.forms[index]
	}
}

impl IndexMut<usize> for Forms {
	fn index_mut(&mut self, index: usize) -> &mut Form {
		&mut self.forms[index]
	}
}

impl Index<&str> for Forms {
	type Output = Form;

	/// Panics when no form has that id.
	fn index(&self, id: &str) -> &Form {
		match self.by_id(id) {
			Some(form) => form,
			None => panic!("No form with id {:?}", id),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	const SIGNUP: &str = r#"<form action="/signup" method="POST" id="signup" enctype="multipart/form-data">
		<input type="hidden" name="csrf" value="t0k">
		<input name="user" type="text">
		<textarea name="bio">Hello &amp; welcome</textarea>
		<select name="plan">
			<option value="free">Free</option>
			<option value="pro" selected>Pro</option>
		</select>
		<input type="radio" name="color" value="red">
		<input type="radio" name="color" value="blue" checked>
		<input type="checkbox" name="terms">
		<input type="file" name="avatar">
		<input type="submit" name="go" value="Sign up">
		<button name="go" value="Later">Later</button>
	</form>"#;

	#[rstest]
	fn test_parse_action_attributes() {
		// Act
		let form = Form::parse(SIGNUP).unwrap();

		// Assert
		assert_eq!(form.action(), "/signup");
		assert_eq!(form.method(), "POST");
		assert_eq!(form.id(), Some("signup"));
		assert_eq!(form.enctype(), "multipart/form-data");
	}

	#[rstest]
	fn test_parse_field_defaults() {
		// Act
		let form = Form::parse(SIGNUP).unwrap();

		// Assert
		assert_eq!(form["csrf"].value().as_deref(), Some("t0k"));
		assert_eq!(form["user"].value().as_deref(), Some(""));
		assert_eq!(form["bio"].value().as_deref(), Some("Hello & welcome"));
		assert_eq!(form["plan"].value().as_deref(), Some("pro"));
		assert_eq!(form["color"].value().as_deref(), Some("blue"));
		assert_eq!(form["color"].options().len(), 2);
		assert_eq!(form["terms"].value(), None);
		assert_eq!(form.fields_named("go").len(), 2);
	}

	#[rstest]
	fn test_submit_fields_with_button() {
		// Arrange
		let mut form = Form::parse(SIGNUP).unwrap();
		form.set("user", "ada").unwrap();
		form.check("terms", true).unwrap();

		// Act
		let fields = form.submit_fields(Some(("go", Some(1)))).unwrap();

		// Assert
		let pairs: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
		assert_eq!(
			pairs,
			vec![
				("go", "Later"),
				("csrf", "t0k"),
				("user", "ada"),
				("bio", "Hello & welcome"),
				("plan", "pro"),
				("color", "blue"),
				("terms", "on"),
			]
		);
	}

	#[rstest]
	fn test_ambiguous_get_and_set() {
		// Arrange
		let mut form = Form::parse(SIGNUP).unwrap();

		// Act
		let get = form.get("go").map(|_| ()).unwrap_err();
		let set = form.set("go", "x");

		// Assert
		assert!(matches!(get, FormError::Ambiguous { count: 2, .. }));
		assert!(matches!(set, Err(FormError::Ambiguous { .. })));
	}

	#[rstest]
	fn test_missing_field_lists_names() {
		// Arrange
		let form = Form::parse(SIGNUP).unwrap();

		// Act
		let err = form.get("nope").unwrap_err();

		// Assert
		assert!(err.to_string().contains("\"csrf\""));
		assert!(form.get_or_none("nope").unwrap().is_none());
	}

	#[rstest]
	fn test_select_requires_select_field() {
		// Arrange
		let mut form = Form::parse(SIGNUP).unwrap();

		// Act & Assert
		assert!(matches!(
			form.select("user", "x", None),
			Err(FormError::NotASelect { .. })
		));
		form.select("plan", "free", None).unwrap();
		assert_eq!(form["plan"].value().as_deref(), Some("free"));
	}

	#[rstest]
	fn test_upload_fields_reports_chosen_files() {
		// Arrange
		let mut form = Form::parse(SIGNUP).unwrap();
		form.get_mut("avatar")
			.unwrap()
			.set_file("me.png", b"PNG".to_vec())
			.unwrap();

		// Act
		let uploads = form.upload_fields();
		let fields = form.submit_fields(None).unwrap();

		// Assert
		assert_eq!(uploads.len(), 1);
		assert_eq!(uploads[0].field, "avatar");
		assert_eq!(uploads[0].filename, "me.png");
		assert!(fields.iter().all(|(k, _)| k != "avatar"));
	}

	#[rstest]
	#[case("<form><select name=a><select name=b></select></form>", "Nested selects")]
	#[case("<form><textarea name=a><textarea name=b></textarea></form>", "Nested textareas")]
	#[case("<form></select></form>", "without starting select")]
	#[case("<form></textarea></form>", "</textarea> with no <textarea>")]
	#[case("<form><option value=x></form>", "outside of a <select>")]
	#[case("<form><input name=a>", "No </form> tag found")]
	fn test_malformed_forms(#[case] html: &str, #[case] message: &str) {
		// Act
		let err = Form::parse(html).unwrap_err();

		// Assert
		assert!(err.to_string().contains(message), "{}", err);
	}

	#[rstest]
	fn test_extract_indexes_by_position_and_id() {
		// Arrange
		let body = r#"<form id="a"></form><p>x</p><FORM action="/b"></FORM>"#;

		// Act
		let forms = Forms::extract(body).unwrap();

		// Assert
		assert_eq!(forms.len(), 2);
		assert_eq!(forms.by_id("a").unwrap().id(), Some("a"));
		assert_eq!(forms[1].action(), "/b");
	}

	#[rstest]
	#[case("<form><form></form></form>", "Nested form tags")]
	#[case("</form>", "</form> unexpected")]
	#[case("<form>", "Dangling form")]
	fn test_extract_rejects_bad_nesting(#[case] body: &str, #[case] message: &str) {
		// Act
		let err = Forms::extract(body).unwrap_err();

		// Assert
		assert!(err.to_string().contains(message), "{}", err);
	}
}
