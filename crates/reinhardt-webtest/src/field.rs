//! Form field model
//!
//! Every control found inside a `<form>` becomes a [`Field`]. The
//! [`FieldKind`] decides how reading and writing its value behaves:
//! radio groups and selects pick among options, checkboxes toggle,
//! submit buttons only carry a value when they are the pressed button.

use crate::error::FormError;
use crate::html::Attributes;

/// One `<option>` of a select, or one radio button of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOption {
	pub value: Option<String>,
	/// `selected` for options, `checked` for radios.
	pub selected: bool,
}

/// A file chosen for an `<input type="file">`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChosenFile {
	pub filename: String,
	/// Inline contents. When `None` the file is read from disk on submit.
	pub content: Option<Vec<u8>>,
}

/// The behaviour attached to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
	/// Any input type without special handling (password, email, ...).
	Plain,
	Text,
	Hidden,
	Textarea,
	File {
		chosen: Option<ChosenFile>,
	},
	Select {
		options: Vec<FieldOption>,
		selected: Option<usize>,
		forced: Option<String>,
	},
	MultipleSelect {
		options: Vec<FieldOption>,
		selected: Vec<usize>,
		forced: Vec<String>,
	},
	Radio {
		options: Vec<FieldOption>,
		selected: Option<usize>,
	},
	Checkbox {
		checked: bool,
	},
	/// `<input type="submit|button|image">` and `<button>`.
	Submit,
}

impl FieldKind {
	/// Pick the kind for a tag. `type_attr` is the lowercased `type` of an
	/// `<input>`; for other tags the tag name itself is the type.
	pub(crate) fn for_tag(tag: &str, type_attr: Option<&str>, attrs: &Attributes) -> Self {
		let tag_type = if tag == "input" {
			type_attr.unwrap_or("text")
		} else {
			tag
		};
		match tag_type {
			"select" if attrs.contains_key("multiple") => FieldKind::MultipleSelect {
				options: Vec::new(),
				selected: Vec::new(),
				forced: Vec::new(),
			},
			"select" => FieldKind::Select {
				options: Vec::new(),
				selected: None,
				forced: None,
			},
			"radio" => FieldKind::Radio {
				options: Vec::new(),
				selected: None,
			},
			"checkbox" => FieldKind::Checkbox {
				checked: attrs.contains_key("checked"),
			},
			"text" => FieldKind::Text,
			"hidden" => FieldKind::Hidden,
			"textarea" => FieldKind::Textarea,
			"file" => FieldKind::File { chosen: None },
			"submit" | "button" | "image" => FieldKind::Submit,
			_ => FieldKind::Plain,
		}
	}
}

/// A single form control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
	tag: String,
	name: Option<String>,
	pos: usize,
	id: Option<String>,
	raw_value: Option<String>,
	attrs: Attributes,
	kind: FieldKind,
}

impl Field {
	/// Build a field from its start tag. `name`, `value` and `id` are taken
	/// out of `attrs`; the rest stay available through [`Field::attrs`].
	pub(crate) fn new(tag: &str, pos: usize, mut attrs: Attributes) -> Self {
		let name = attrs.remove("name");
		let type_attr = attrs.get("type").map(|t| t.to_lowercase());
		let kind = FieldKind::for_tag(tag, type_attr.as_deref(), &attrs);
		let raw_value = attrs.remove("value");
		let id = attrs.remove("id");
		Self {
			tag: tag.to_string(),
			name,
			pos,
			id,
			raw_value,
			attrs,
			kind,
		}
	}

	pub fn tag(&self) -> &str {
		&self.tag
	}

	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	/// Byte offset of the start tag within the form text.
	pub fn pos(&self) -> usize {
		self.pos
	}

	pub fn id(&self) -> Option<&str> {
		self.id.as_deref()
	}

	pub fn attrs(&self) -> &Attributes {
		&self.attrs
	}

	pub fn kind(&self) -> &FieldKind {
		&self.kind
	}

	/// Options of a select, multiple select or radio group.
	pub fn options(&self) -> &[FieldOption] {
		match &self.kind {
			FieldKind::Select { options, .. }
			| FieldKind::MultipleSelect { options, .. }
			| FieldKind::Radio { options, .. } => options,
			_ => &[],
		}
	}

	pub(crate) fn push_option(&mut self, value: Option<String>, selected: bool) -> bool {
		match &mut self.kind {
			FieldKind::Select { options, .. }
			| FieldKind::MultipleSelect { options, .. }
			| FieldKind::Radio { options, .. } => {
				options.push(FieldOption { value, selected });
				true
			}
			_ => false,
		}
	}

	pub(crate) fn set_text_content(&mut self, text: String) {
		self.raw_value = Some(text);
	}

	pub fn is_settable(&self) -> bool {
		!matches!(self.kind, FieldKind::Submit)
	}

	pub fn is_file(&self) -> bool {
		matches!(self.kind, FieldKind::File { .. })
	}

	pub fn is_select(&self) -> bool {
		matches!(
			self.kind,
			FieldKind::Select { .. } | FieldKind::MultipleSelect { .. }
		)
	}

	/// Current values that would be submitted, or `None` when the field
	/// contributes nothing.
	pub fn values(&self) -> Option<Vec<String>> {
		match &self.kind {
			FieldKind::MultipleSelect {
				options,
				selected,
				forced,
			} => {
				let mut values: Vec<String> = if !selected.is_empty() {
					selected
						.iter()
						.filter_map(|&i| options[i].value.clone())
						.collect()
				} else if forced.is_empty() {
					options
						.iter()
						.filter(|o| o.selected)
						.filter_map(|o| o.value.clone())
						.collect()
				} else {
					Vec::new()
				};
				values.extend(forced.iter().cloned());
				if !options.is_empty() && values.is_empty() {
					None
				} else {
					Some(values)
				}
			}
			_ => self.value().map(|v| vec![v]),
		}
	}

	/// The single current value. Multiple selects report their first value.
	pub fn value(&self) -> Option<String> {
		match &self.kind {
			FieldKind::Plain => self.raw_value.clone(),
			FieldKind::Text | FieldKind::Hidden | FieldKind::Textarea => {
				Some(self.raw_value.clone().unwrap_or_default())
			}
			FieldKind::File { chosen } => Some(
				chosen
					.as_ref()
					.map(|c| c.filename.clone())
					.or_else(|| self.raw_value.clone())
					.unwrap_or_default(),
			),
			FieldKind::Select {
				options,
				selected,
				forced,
			} => {
				if let Some(forced) = forced {
					return Some(forced.clone());
				}
				match selected {
					Some(i) => options[*i].value.clone(),
					None => options
						.iter()
						.find(|o| o.selected)
						.or_else(|| options.first())
						.and_then(|o| o.value.clone()),
				}
			}
			FieldKind::MultipleSelect { .. } => {
				self.values().and_then(|v| v.into_iter().next())
			}
			FieldKind::Radio { options, selected } => match selected {
				Some(i) => options[*i].value.clone(),
				None => options
					.iter()
					.find(|o| o.selected)
					.and_then(|o| o.value.clone()),
			},
			FieldKind::Checkbox { checked } => {
				if *checked {
					Some(self.raw_value.clone().unwrap_or_else(|| "on".to_string()))
				} else {
					None
				}
			}
			FieldKind::Submit => None,
		}
	}

	/// The value a submit button sends when it is the one pressed.
	pub fn value_if_submitted(&self) -> Result<Option<String>, FormError> {
		match self.kind {
			FieldKind::Submit => Ok(self.raw_value.clone()),
			_ => Err(FormError::NotAButton {
				name: self.display_name(),
			}),
		}
	}

	/// Set the value as a user would.
	///
	/// Selects and radios must be given one of their option values.
	/// Checkboxes are checked by any non-empty value. File inputs take a
	/// filename that is read from disk on submit. Buttons cannot be set.
	pub fn set_value(&mut self, value: &str) -> Result<(), FormError> {
		let name = self.display_name();
		match &mut self.kind {
			FieldKind::Submit => Err(FormError::NotSettable {
				tag: self.tag.clone(),
				name,
			}),
			FieldKind::Select {
				options,
				selected,
				forced,
			} => {
				*forced = None;
				*selected = Some(find_option(options, value)?);
				Ok(())
			}
			FieldKind::Radio { options, selected } => {
				*selected = Some(find_option(options, value)?);
				Ok(())
			}
			FieldKind::MultipleSelect { .. } => self.set_values(&[value]),
			FieldKind::Checkbox { checked } => {
				*checked = !value.is_empty();
				Ok(())
			}
			FieldKind::File { chosen } => {
				*chosen = Some(ChosenFile {
					filename: value.to_string(),
					content: None,
				});
				Ok(())
			}
			FieldKind::Plain | FieldKind::Text | FieldKind::Hidden | FieldKind::Textarea => {
				self.raw_value = Some(value.to_string());
				Ok(())
			}
		}
	}

	/// Select several options of a multiple select at once.
	pub fn set_values(&mut self, values: &[&str]) -> Result<(), FormError> {
		match &mut self.kind {
			FieldKind::MultipleSelect {
				options, selected, ..
			} => {
				let mut wanted: Vec<&str> = values.to_vec();
				let mut indices = Vec::new();
				for (i, option) in options.iter().enumerate() {
					if let Some(value) = option.value.as_deref() {
						if let Some(at) = wanted.iter().position(|w| *w == value) {
							indices.push(i);
							wanted.remove(at);
						}
					}
				}
				if !wanted.is_empty() {
					return Err(FormError::OptionNotFound {
						missing: wanted.join(", "),
						available: describe_options(options),
					});
				}
				*selected = indices;
				Ok(())
			}
			_ => match values {
				[single] => self.set_value(single),
				_ => Err(FormError::NotASelect {
					name: self.display_name(),
				}),
			},
		}
	}

	/// Check or uncheck a checkbox.
	pub fn set_checked(&mut self, on: bool) -> Result<(), FormError> {
		match &mut self.kind {
			FieldKind::Checkbox { checked } => {
				*checked = on;
				Ok(())
			}
			_ => Err(FormError::NotACheckbox {
				name: self.display_name(),
			}),
		}
	}

	/// Choose a file with inline contents for a file input.
	pub fn set_file(&mut self, filename: &str, content: impl Into<Vec<u8>>) -> Result<(), FormError> {
		let name = self.display_name();
		match &mut self.kind {
			FieldKind::File { chosen } => {
				*chosen = Some(ChosenFile {
					filename: filename.to_string(),
					content: Some(content.into()),
				});
				Ok(())
			}
			_ => Err(FormError::NotSettable {
				tag: self.tag.clone(),
				name,
			}),
		}
	}

	pub fn chosen_file(&self) -> Option<&ChosenFile> {
		match &self.kind {
			FieldKind::File { chosen } => chosen.as_ref(),
			_ => None,
		}
	}

	/// Set the value without any checks, even on hidden fields and buttons.
	pub fn force_value(&mut self, value: &str) {
		match &mut self.kind {
			FieldKind::Select { forced, .. } => *forced = Some(value.to_string()),
			FieldKind::MultipleSelect {
				forced, selected, ..
			} => {
				*forced = vec![value.to_string()];
				selected.clear();
			}
			_ => self.raw_value = Some(value.to_string()),
		}
	}

	fn display_name(&self) -> String {
		self.name.clone().unwrap_or_default()
	}
}

fn find_option(options: &[FieldOption], value: &str) -> Result<usize, FormError> {
	options
		.iter()
		.position(|o| o.value.as_deref() == Some(value))
		.ok_or_else(|| FormError::OptionNotFound {
			missing: format!("{:?}", value),
			available: describe_options(options),
		})
}

fn describe_options(options: &[FieldOption]) -> String {
	options
		.iter()
		.map(|o| format!("{:?}", o.value))
		.collect::<Vec<_>>()
		.join(", ")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::html::parse_attrs;
	use rstest::rstest;

	fn field(tag: &str, attrs: &str) -> Field {
		Field::new(tag, 0, parse_attrs(attrs))
	}

	#[rstest]
	#[case("input", r#"type="text""#, Some(""))]
	#[case("input", r#"value="x""#, Some("x"))]
	#[case("input", r#"type="hidden" value="h""#, Some("h"))]
	#[case("input", r#"type="password""#, None)]
	#[case("input", r#"type="submit" value="Go""#, None)]
	#[case("input", r#"type="checkbox""#, None)]
	#[case("input", r#"type="checkbox" checked"#, Some("on"))]
	#[case("input", r#"type="file""#, Some(""))]
	fn test_default_values(#[case] tag: &str, #[case] attrs: &str, #[case] expected: Option<&str>) {
		// Act
		let f = field(tag, attrs);

		// Assert
		assert_eq!(f.value().as_deref(), expected);
	}

	#[rstest]
	fn test_select_prefers_forced_then_selected_then_first() {
		// Arrange
		let mut f = field("select", r#"name="s""#);
		f.push_option(Some("a".into()), false);
		f.push_option(Some("b".into()), true);

		// Act & Assert
		assert_eq!(f.value().as_deref(), Some("b"));
		f.set_value("a").unwrap();
		assert_eq!(f.value().as_deref(), Some("a"));
		f.force_value("zzz");
		assert_eq!(f.value().as_deref(), Some("zzz"));
		f.set_value("b").unwrap();
		assert_eq!(f.value().as_deref(), Some("b"));
	}

	#[rstest]
	fn test_select_without_selected_uses_first_option() {
		// Arrange
		let mut f = field("select", "");
		f.push_option(Some("first".into()), false);
		f.push_option(Some("second".into()), false);

		// Act & Assert
		assert_eq!(f.value().as_deref(), Some("first"));
	}

	#[rstest]
	fn test_select_rejects_unknown_option() {
		// Arrange
		let mut f = field("select", "");
		f.push_option(Some("a".into()), false);

		// Act
		let err = f.set_value("nope").unwrap_err();

		// Assert
		assert!(matches!(err, FormError::OptionNotFound { .. }));
	}

	#[rstest]
	fn test_radio_is_none_until_checked() {
		// Arrange
		let mut f = field("input", r#"type="radio" name="r""#);
		f.push_option(Some("x".into()), false);
		f.push_option(Some("y".into()), false);

		// Act & Assert
		assert_eq!(f.value(), None);
		f.set_value("y").unwrap();
		assert_eq!(f.value().as_deref(), Some("y"));
	}

	#[rstest]
	fn test_multiple_select_values() {
		// Arrange
		let mut f = field("select", r#"name="m" multiple"#);
		f.push_option(Some("1".into()), true);
		f.push_option(Some("2".into()), false);
		f.push_option(Some("3".into()), true);

		// Act & Assert
		assert_eq!(f.values(), Some(vec!["1".to_string(), "3".to_string()]));
		f.set_values(&["2", "3"]).unwrap();
		assert_eq!(f.values(), Some(vec!["2".to_string(), "3".to_string()]));
		assert!(f.set_values(&["4"]).is_err());
	}

	#[rstest]
	fn test_multiple_select_none_when_nothing_selected() {
		// Arrange
		let mut f = field("select", r#"multiple="multiple""#);
		f.push_option(Some("1".into()), false);

		// Act & Assert
		assert_eq!(f.values(), None);
	}

	#[rstest]
	fn test_checkbox_toggle_and_custom_value() {
		// Arrange
		let mut f = field("input", r#"type="checkbox" value="yes""#);

		// Act & Assert
		assert_eq!(f.value(), None);
		f.set_checked(true).unwrap();
		assert_eq!(f.value().as_deref(), Some("yes"));
		f.set_value("").unwrap();
		assert_eq!(f.value(), None);
	}

	#[rstest]
	fn test_submit_not_settable_but_forceable() {
		// Arrange
		let mut f = field("input", r#"type="submit" name="go" value="Go""#);

		// Act
		let err = f.set_value("x").unwrap_err();
		f.force_value("Forced");

		// Assert
		assert_eq!(
			err.to_string(),
			r#"You cannot set the value of the <input> field "go""#
		);
		assert_eq!(f.value(), None);
		assert_eq!(f.value_if_submitted().unwrap().as_deref(), Some("Forced"));
	}

	#[rstest]
	fn test_type_attribute_is_case_insensitive() {
		// Act
		let f = field("input", r#"TYPE="CheckBox" checked"#);

		// Assert
		assert!(matches!(f.kind(), FieldKind::Checkbox { checked: true }));
	}
}
