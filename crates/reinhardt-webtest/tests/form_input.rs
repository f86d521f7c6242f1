//! Integration tests for reading form inputs from served pages

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Request, Response};
use http_body_util::Full;
use reinhardt_webtest::{Forms, TestApp};
use rstest::rstest;

const WITH_DEFAULTS: &str = r#"
<html>
    <head><title>form page</title></head>
    <body>
        <form method="POST" id="text_input_form">
            <input name="foo" type="text" value="bar">
            <input name="button" type="submit" value="text">
        </form>
        <form method="POST" id="radio_input_form">
            <input name="foo" type="radio" value="bar">
            <input name="foo" type="radio" value="baz" checked>
            <input name="button" type="submit" value="radio">
        </form>
        <form method="POST" id="checkbox_input_form">
            <input name="foo" type="checkbox" value="bar" checked>
            <input name="button" type="submit" value="text">
        </form>
    </body>
</html>
"#;

const WITHOUT_DEFAULTS: &str = r#"
<html>
    <head><title>form page</title></head>
    <body>
        <form method="POST" id="text_input_form">
            <input name="foo" type="text">
            <input name="button" type="submit" value="text">
        </form>
        <form method="POST" id="radio_input_form">
            <input name="foo" type="radio" value="bar">
            <input name="foo" type="radio" value="baz">
            <input name="button" type="submit" value="radio">
        </form>
        <form method="POST" id="checkbox_input_form">
            <input name="foo" type="checkbox" value="bar">
            <input name="button" type="submit" value="text">
        </form>
    </body>
</html>
"#;

const UNICODE: &str = r#"
<html>
    <head><title>form page</title></head>
    <body>
        <form method="POST" id="text_input_form">
            <input name="foo" type="text" value="Хармс">
            <input name="button" type="submit" value="Сохранить">
        </form>
        <form method="POST" id="radio_input_form">
            <input name="foo" type="radio" value="Хармс">
            <input name="foo" type="radio" value="Блок" checked>
            <input name="button" type="submit" value="Сохранить">
        </form>
        <form method="POST" id="checkbox_input_form">
            <input name="foo" type="checkbox" value="Хармс" checked>
            <input name="button" type="submit" value="Ура">
        </form>
    </body>
</html>
"#;

fn page_app(body: &'static str, content_type: &'static str) -> TestApp {
	TestApp::new(move |_req: Request<Full<Bytes>>| {
		Response::builder()
			.header(CONTENT_TYPE, content_type)
			.body(Full::new(Bytes::from_static(body.as_bytes())))
			.unwrap()
	})
}

fn pair(name: &str, value: &str) -> (String, String) {
	(name.to_string(), value.to_string())
}

async fn forms_of(app: &TestApp) -> Forms {
	let res = app.get("/").await.unwrap();
	assert_eq!(res.status_code(), 200);
	assert_eq!(res.content_type(), Some("text/html"));
	res.forms().unwrap()
}

// ============================================================================
// Pages with default values
// ============================================================================

#[rstest]
#[tokio::test]
async fn test_inputs_with_defaults() {
	// Arrange
	reinhardt_webtest::init_test_logging();
	let app = page_app(WITH_DEFAULTS, "text/html");

	// Act
	let forms = forms_of(&app).await;

	// Assert
	let text = &forms["text_input_form"];
	assert_eq!(text["foo"].value().as_deref(), Some("bar"));
	assert_eq!(text.submit_fields(None).unwrap(), vec![pair("foo", "bar")]);

	let radio = &forms["radio_input_form"];
	assert_eq!(radio["foo"].value().as_deref(), Some("baz"));
	assert_eq!(radio.submit_fields(None).unwrap(), vec![pair("foo", "baz")]);

	let checkbox = &forms["checkbox_input_form"];
	assert_eq!(checkbox["foo"].value().as_deref(), Some("bar"));
	assert_eq!(checkbox.submit_fields(None).unwrap(), vec![pair("foo", "bar")]);
}

#[rstest]
#[tokio::test]
async fn test_inputs_with_unicode_values() {
	// Arrange
	let app = page_app(UNICODE, "text/html; charset=utf-8");

	// Act
	let res = app.get("/").await.unwrap();
	let forms = res.forms().unwrap();

	// Assert
	assert_eq!(res.content_type(), Some("text/html"));
	assert_eq!(res.charset().as_deref(), Some("utf-8"));
	assert_eq!(
		forms["text_input_form"].submit_fields(None).unwrap(),
		vec![pair("foo", "Хармс")]
	);
	assert_eq!(
		forms["radio_input_form"].submit_fields(None).unwrap(),
		vec![pair("foo", "Блок")]
	);
	assert_eq!(
		forms["checkbox_input_form"].submit_fields(None).unwrap(),
		vec![pair("foo", "Хармс")]
	);
	assert_eq!(
		forms["checkbox_input_form"]
			.submit_fields(Some(("button", None)))
			.unwrap()[0],
		pair("button", "Ура")
	);
}

// ============================================================================
// Pages without default values
// ============================================================================

#[rstest]
#[tokio::test]
async fn test_inputs_without_defaults() {
	// Arrange
	let app = page_app(WITHOUT_DEFAULTS, "text/html");

	// Act
	let forms = forms_of(&app).await;

	// Assert
	let text = &forms["text_input_form"];
	assert_eq!(text["foo"].value().as_deref(), Some(""));
	assert_eq!(text.submit_fields(None).unwrap(), vec![pair("foo", "")]);

	let radio = &forms["radio_input_form"];
	assert_eq!(radio["foo"].value(), None);
	assert!(radio.submit_fields(None).unwrap().is_empty());

	let checkbox = &forms["checkbox_input_form"];
	assert_eq!(checkbox["foo"].value(), None);
	assert!(checkbox.submit_fields(None).unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_setting_inputs_without_defaults() {
	// Arrange
	let app = page_app(WITHOUT_DEFAULTS, "text/html");
	let mut forms = forms_of(&app).await;

	// Act
	forms.by_id_mut("text_input_form").unwrap().set("foo", "typed").unwrap();
	forms.by_id_mut("radio_input_form").unwrap().set("foo", "bar").unwrap();
	forms.by_id_mut("checkbox_input_form").unwrap().check("foo", true).unwrap();
	let bad_radio = forms.by_id_mut("radio_input_form").unwrap().set("foo", "qux");

	// Assert
	assert_eq!(forms["text_input_form"]["foo"].value().as_deref(), Some("typed"));
	assert_eq!(forms["radio_input_form"]["foo"].value().as_deref(), Some("bar"));
	assert_eq!(forms["checkbox_input_form"]["foo"].value().as_deref(), Some("bar"));
	assert!(bad_radio.unwrap_err().to_string().contains("\"qux\""));
}

#[rstest]
#[tokio::test]
async fn test_single_form_accessor_rejects_many_forms() {
	// Arrange
	let app = page_app(WITH_DEFAULTS, "text/html");

	// Act
	let err = app.get("/").await.unwrap().form().unwrap_err();

	// Assert
	assert_eq!(
		err.to_string(),
		"You used response.form, but more than one form exists"
	);
}
