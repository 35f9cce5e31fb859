use predicates::prelude::*;
use proust_core::AnyEmptyResult;
use rstest::rstest;

mod common;

use common::proust_cmd;

#[test]
fn render_with_json_context() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("page.mustache"), "Hello {{name}}!\n")?;
	std::fs::write(tmp.path().join("data.json"), r#"{ "name": "World" }"#)?;

	proust_cmd()
		.current_dir(tmp.path())
		.args(["render", "page.mustache", "--json", "data.json"])
		.assert()
		.success()
		.stdout("Hello World!\n");

	Ok(())
}

#[test]
fn render_multiple_files_in_order() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("a.mustache"), "a={{value}}\n")?;
	std::fs::write(tmp.path().join("b.mustache"), "b={{value}}\n")?;
	std::fs::write(tmp.path().join("data.json"), r#"{ "value": 1 }"#)?;

	proust_cmd()
		.current_dir(tmp.path())
		.args(["render", "b.mustache", "a.mustache", "-j", "data.json"])
		.assert()
		.success()
		.stdout("b=1\na=1\n");

	Ok(())
}

#[rstest]
#[case::indented(&[][..], "list:\n  - one\n  - two\n")]
#[case::disable_indentation(&["--disable-indentation"][..], "list:\n  - one\n- two\n")]
#[case::include_partials(&["--include-partials"][..], "list:\n  - one\n  - two\n")]
fn render_partials_from_template_path(
	#[case] flags: &[&str],
	#[case] expected: &str,
) -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let templates = tmp.path().join("templates");
	std::fs::create_dir_all(&templates)?;
	std::fs::write(templates.join("items.mustache"), "- one\n- two\n")?;
	std::fs::write(tmp.path().join("page.mustache"), "list:\n  {{>items}}\n")?;

	proust_cmd()
		.current_dir(tmp.path())
		.args(["render", "page.mustache", "--path", "templates"])
		.args(flags)
		.assert()
		.success()
		.stdout(expected.to_string());

	Ok(())
}

#[test]
fn render_without_context_leaves_variables_empty() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("page.mustache"), "[{{missing}}]")?;

	proust_cmd()
		.current_dir(tmp.path())
		.args(["render", "page.mustache"])
		.assert()
		.success()
		.stdout("[]");

	Ok(())
}

#[test]
fn render_missing_template_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	proust_cmd()
		.current_dir(tmp.path())
		.args(["render", "nope.mustache"])
		.assert()
		.code(2)
		.stderr(predicate::str::contains("not found"));

	Ok(())
}

#[test]
fn render_reports_template_errors() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("broken.mustache"), "{{#open}}never closed")?;

	proust_cmd()
		.current_dir(tmp.path())
		.args(["render", "broken.mustache"])
		.assert()
		.code(2)
		.stderr(predicate::str::contains("is never closed"));

	Ok(())
}

#[test]
fn render_reports_invalid_json() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("page.mustache"), "{{x}}")?;
	std::fs::write(tmp.path().join("data.json"), "{ not json")?;

	proust_cmd()
		.current_dir(tmp.path())
		.args(["render", "page.mustache", "--json", "data.json"])
		.assert()
		.code(2)
		.stderr(predicate::str::contains("invalid JSON"));

	Ok(())
}

#[test]
fn config_enables_durable_cache() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("proust.toml"), "cache_dir = \"cache\"\n")?;
	std::fs::write(tmp.path().join("page.mustache"), "cached")?;

	proust_cmd()
		.current_dir(tmp.path())
		.args(["render", "page.mustache"])
		.assert()
		.success()
		.stdout("cached");

	let entries = std::fs::read_dir(tmp.path().join("cache"))?.count();
	assert_eq!(entries, 1);

	Ok(())
}

#[test]
fn no_cache_flag_skips_durable_cache() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("proust.toml"), "cache_dir = \"cache\"\n")?;
	std::fs::write(tmp.path().join("page.mustache"), "fresh")?;

	proust_cmd()
		.current_dir(tmp.path())
		.args(["render", "page.mustache", "--no-cache"])
		.assert()
		.success()
		.stdout("fresh");

	assert!(!tmp.path().join("cache").exists());

	Ok(())
}

#[test]
fn config_sets_delimiters() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("proust.toml"),
		"enable_cache = false\n\n[delimiters]\nopen = \"<%\"\nclose = \"%>\"\n",
	)?;
	std::fs::write(tmp.path().join("page.mustache"), "<%name%> {{name}}")?;
	std::fs::write(tmp.path().join("data.json"), r#"{ "name": "Z" }"#)?;

	proust_cmd()
		.current_dir(tmp.path())
		.args(["render", "page.mustache", "--json", "data.json"])
		.assert()
		.success()
		.stdout("Z {{name}}");

	Ok(())
}
