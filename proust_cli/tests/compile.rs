use predicates::prelude::*;
use proust_core::AnyEmptyResult;

mod common;

use common::proust_cmd;

#[test]
fn compile_prints_compact_instructions() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("page.mustache"), "Hello {{name}}")?;

	proust_cmd()
		.current_dir(tmp.path())
		.args(["compile", "page.mustache"])
		.assert()
		.success()
		.stdout(predicate::str::contains(r#"{"op":"text","text":"Hello "}"#))
		.stdout(predicate::str::contains(r#""op":"variable""#));

	Ok(())
}

#[test]
fn compile_beautify_pretty_prints() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("page.mustache"), "Hello {{name}}")?;

	proust_cmd()
		.current_dir(tmp.path())
		.args(["compile", "page.mustache", "--beautify"])
		.assert()
		.success()
		.stdout(predicate::str::contains(r#""op": "text""#))
		.stdout(predicate::str::contains(r#""beautify": true"#));

	Ok(())
}

#[test]
fn compile_writes_output_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("header.mustache"), "<h1>{{title}}</h1>")?;
	std::fs::write(tmp.path().join("page.mustache"), "{{>header}}")?;

	proust_cmd()
		.current_dir(tmp.path())
		.args([
			"compile",
			"page.mustache",
			"--include-partials",
			"--output",
			"page.json",
		])
		.assert()
		.success()
		.stdout("");

	let compiled = std::fs::read_to_string(tmp.path().join("page.json"))?;
	let template: serde_json::Value = serde_json::from_str(&compiled)?;
	assert_eq!(template["options"]["include_partial_code"], true);
	assert_eq!(template["ops"][0]["op"], "inline");
	assert_eq!(template["ops"][0]["name"], "header");

	Ok(())
}

#[test]
fn compile_requires_files() {
	proust_cmd().arg("compile").assert().failure();
}
