use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::Context;
use crate::Delimiters;
use crate::FingerprintSource;
use crate::KeyPath;
use crate::Node;
use crate::ProustError;
use crate::ProustResult;
use crate::TokenTree;
use crate::parser::parse;
use crate::value::Value;

/// How deep partials may nest while rendering. Compile-time inlining stops
/// at the same depth and falls back to a runtime reference.
pub const MAX_PARTIAL_DEPTH: usize = 128;

/// Options that change what a template compiles to. All default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct CompilerOptions {
	/// Treat lambdas as plain truthy values instead of calling them.
	pub disable_lambdas: bool,
	/// Do not re-indent the output of standalone partials. The indentation in
	/// front of the partial tag is still written once, before the partial's
	/// output, so only its first line is indented.
	pub disable_indentation: bool,
	/// Compile partial bodies into the including template.
	pub include_partial_code: bool,
	/// Pretty-print the textual representation of compiled templates.
	pub beautify: bool,
}

/// Supplies what a template needs beyond its own instructions: partials and
/// compilation of lambda output.
pub trait Resolver {
	/// Source of the partial `name`, used when inlining partial code.
	fn partial_source(&self, name: &str) -> ProustResult<Option<String>>;

	/// Identifies the current version of the partial `name`, or `None` when
	/// it does not exist. Templates with inlined partials are only reused
	/// while this stays the same.
	fn partial_fingerprint(&self, name: &str) -> ProustResult<Option<FingerprintSource>>;

	/// The compiled partial `name`, or `None` when no such template exists.
	fn partial(&self, name: &str) -> ProustResult<Option<Arc<Template>>>;

	/// Compile text returned by a lambda.
	fn dynamic(&self, source: &str, delimiters: &Delimiters) -> ProustResult<Arc<Template>>;
}

/// A [`Resolver`] without partials. Lambda output is compiled on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPartials(pub CompilerOptions);

impl Resolver for NoPartials {
	fn partial_source(&self, _name: &str) -> ProustResult<Option<String>> {
		Ok(None)
	}

	fn partial_fingerprint(&self, _name: &str) -> ProustResult<Option<FingerprintSource>> {
		Ok(None)
	}

	fn partial(&self, _name: &str) -> ProustResult<Option<Arc<Template>>> {
		Ok(None)
	}

	fn dynamic(&self, source: &str, delimiters: &Delimiters) -> ProustResult<Arc<Template>> {
		compile(source, delimiters, self.0, self).map(Arc::new)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Op {
	Text {
		text: String,
	},
	Variable {
		path: KeyPath,
		escaped: bool,
	},
	Section {
		path: KeyPath,
		body: Vec<Op>,
		raw: String,
		delimiters: Delimiters,
	},
	Inverted {
		path: KeyPath,
		body: Vec<Op>,
	},
	Partial {
		name: String,
		indent: String,
	},
	/// A partial compiled into its parent.
	Inline {
		name: String,
		indent: String,
		body: Vec<Op>,
	},
}

/// A partial whose body was compiled into a template, as it was at the time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDependency {
	pub name: String,
	/// `None` when the partial did not exist and compiled to nothing.
	pub source: Option<FingerprintSource>,
}

/// A compiled template. Cheap to share and safe to render any number of
/// times against different contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
	options: CompilerOptions,
	ops: Vec<Op>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	dependencies: Vec<PartialDependency>,
}

impl Template {
	pub fn options(&self) -> CompilerOptions {
		self.options
	}

	/// Number of top-level instructions.
	pub fn len(&self) -> usize {
		self.ops.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}

	/// The partials compiled into this template.
	pub fn dependencies(&self) -> &[PartialDependency] {
		&self.dependencies
	}

	/// Whether every inlined partial is still what `resolver` would provide.
	pub fn is_current(&self, resolver: &dyn Resolver) -> ProustResult<bool> {
		for dependency in &self.dependencies {
			if resolver.partial_fingerprint(&dependency.name)? != dependency.source {
				return Ok(false);
			}
		}

		Ok(true)
	}

	pub fn render(&self, context: &mut Context, resolver: &dyn Resolver) -> ProustResult<String> {
		let mut output = String::new();
		let renderer = Renderer {
			options: self.options,
			resolver,
		};
		renderer.render_ops(&self.ops, context, &mut output)?;

		Ok(output)
	}

	/// The textual representation of the compiled instructions, pretty-printed
	/// when `beautify` is set.
	pub fn to_text(&self) -> ProustResult<String> {
		let text = if self.options.beautify {
			serde_json::to_string_pretty(self)
		} else {
			serde_json::to_string(self)
		};

		text.map_err(|error| ProustError::Serialization(error.to_string()))
	}
}

/// Parse and compile `source` in one step.
pub fn compile(
	source: &str,
	delimiters: &Delimiters,
	options: CompilerOptions,
	resolver: &dyn Resolver,
) -> ProustResult<Template> {
	let tree = parse(source, delimiters)?;
	Generator::new(options, delimiters.clone(), resolver).compile(&tree)
}

/// Turns a [`TokenTree`] into a [`Template`].
pub struct Generator<'a> {
	options: CompilerOptions,
	/// Delimiters that inlined partials start with.
	delimiters: Delimiters,
	resolver: &'a dyn Resolver,
}

impl<'a> Generator<'a> {
	pub fn new(options: CompilerOptions, delimiters: Delimiters, resolver: &'a dyn Resolver) -> Self {
		Self {
			options,
			delimiters,
			resolver,
		}
	}

	pub fn compile(&self, tree: &TokenTree) -> ProustResult<Template> {
		let mut ops = vec![];
		let mut lowering = Lowering::default();
		self.lower(tree, &mut lowering, &mut ops)?;

		Ok(Template {
			options: self.options,
			ops,
			dependencies: lowering.dependencies,
		})
	}

	fn lower(&self, nodes: &[Node], lowering: &mut Lowering, ops: &mut Vec<Op>) -> ProustResult<()> {
		for node in nodes {
			match node {
				Node::Text { text } => push_text(ops, text),
				Node::Comment { .. } => {}
				Node::Variable { path, escaped, .. } => {
					ops.push(Op::Variable {
						path: KeyPath::parse(path.as_str()),
						escaped: *escaped,
					});
				}
				Node::Section {
					path,
					inverted,
					children,
					raw,
					delimiters,
					..
				} => {
					let mut body = vec![];
					self.lower(children, lowering, &mut body)?;
					let path = KeyPath::parse(path.as_str());

					if *inverted {
						ops.push(Op::Inverted { path, body });
					} else {
						ops.push(Op::Section {
							path,
							body,
							raw: raw.clone(),
							delimiters: delimiters.clone(),
						});
					}
				}
				Node::Partial { name, indent, .. } => {
					self.lower_partial(name, indent, lowering, ops)?;
				}
			}
		}

		Ok(())
	}

	fn lower_partial(
		&self,
		name: &str,
		indent: &str,
		lowering: &mut Lowering,
		ops: &mut Vec<Op>,
	) -> ProustResult<()> {
		// Recursive partials stay runtime references so that data decides
		// how deep they go.
		let recursive = lowering.inlining.iter().any(|ancestor| ancestor == name);
		if !self.options.include_partial_code
			|| recursive
			|| lowering.inlining.len() >= MAX_PARTIAL_DEPTH
		{
			ops.push(Op::Partial {
				name: name.to_string(),
				indent: indent.to_string(),
			});
			return Ok(());
		}

		if !lowering.dependencies.iter().any(|dependency| dependency.name == name) {
			lowering.dependencies.push(PartialDependency {
				name: name.to_string(),
				source: self.resolver.partial_fingerprint(name)?,
			});
		}

		// A missing partial renders nothing, so it compiles to nothing.
		let Some(source) = self.resolver.partial_source(name)? else {
			return Ok(());
		};

		let tree = parse(&source, &self.delimiters)?;
		let mut body = vec![];
		lowering.inlining.push(name.to_string());
		let lowered = self.lower(&tree, lowering, &mut body);
		lowering.inlining.pop();
		lowered?;

		ops.push(Op::Inline {
			name: name.to_string(),
			indent: indent.to_string(),
			body,
		});

		Ok(())
	}
}

#[derive(Default)]
struct Lowering {
	/// Partials whose bodies are being compiled, outermost first.
	inlining: Vec<String>,
	dependencies: Vec<PartialDependency>,
}

fn push_text(ops: &mut Vec<Op>, text: &str) {
	if let Some(Op::Text { text: previous }) = ops.last_mut() {
		previous.push_str(text);
	} else {
		ops.push(Op::Text {
			text: text.to_string(),
		});
	}
}

struct Renderer<'a> {
	options: CompilerOptions,
	resolver: &'a dyn Resolver,
}

impl Renderer<'_> {
	fn render_ops(&self, ops: &[Op], context: &mut Context, output: &mut String) -> ProustResult<()> {
		for op in ops {
			match op {
				Op::Text { text } => output.push_str(text),
				Op::Variable { path, escaped } => {
					let value = context.resolve_path(path)?;
					let text = self.interpolate(value, context)?;
					if *escaped {
						output.push_str(&escape_html(&text));
					} else {
						output.push_str(&text);
					}
				}
				Op::Section {
					path,
					body,
					raw,
					delimiters,
				} => {
					let value = context.resolve_path(path)?;
					self.render_section(value, body, raw, delimiters, context, output)?;
				}
				Op::Inverted { path, body } => {
					if !context.resolve_path(path)?.is_truthy() {
						self.render_ops(body, context, output)?;
					}
				}
				Op::Partial { name, indent } => {
					let mut scope = context.enter_partial(name)?;
					tracing::trace!(partial = %name, "resolving partial");
					let Some(template) = self.resolver.partial(name)? else {
						continue;
					};

					let mut rendered = String::new();
					self.render_ops(&template.ops, &mut scope, &mut rendered)?;
					self.write_indented(output, indent, &rendered);
				}
				Op::Inline { name, indent, body } => {
					let mut scope = context.enter_partial(name)?;
					let mut rendered = String::new();
					self.render_ops(body, &mut scope, &mut rendered)?;
					self.write_indented(output, indent, &rendered);
				}
			}
		}

		Ok(())
	}

	fn render_section(
		&self,
		value: Value,
		body: &[Op],
		raw: &str,
		delimiters: &Delimiters,
		context: &mut Context,
		output: &mut String,
	) -> ProustResult<()> {
		match value {
			Value::Lambda(lambda) if !self.options.disable_lambdas => {
				match lambda.call(raw) {
					Value::Text(source) => {
						let template = self.resolver.dynamic(&source, delimiters)?;
						self.render_ops(&template.ops, context, output)?;
					}
					result => output.push_str(&result.to_string()),
				}
			}
			value if !value.is_truthy() => {}
			Value::List(items) => {
				for item in items {
					let mut scope = context.push(item);
					self.render_ops(body, &mut scope, output)?;
				}
			}
			value => {
				let mut scope = context.push(value);
				self.render_ops(body, &mut scope, output)?;
			}
		}

		Ok(())
	}

	/// The text a variable tag produces, before escaping.
	fn interpolate(&self, value: Value, context: &mut Context) -> ProustResult<String> {
		let Value::Lambda(lambda) = value else {
			return Ok(value.to_string());
		};

		if self.options.disable_lambdas {
			return Ok(String::new());
		}

		match lambda.call("") {
			Value::Text(source) => {
				let template = self.resolver.dynamic(&source, &Delimiters::default())?;
				let mut rendered = String::new();
				self.render_ops(&template.ops, context, &mut rendered)?;
				Ok(rendered)
			}
			result => Ok(result.to_string()),
		}
	}

	fn write_indented(&self, output: &mut String, indent: &str, text: &str) {
		if indent.is_empty() {
			output.push_str(text);
			return;
		}

		if self.options.disable_indentation {
			output.push_str(indent);
			output.push_str(text);
			return;
		}

		for line in text.split_inclusive('\n') {
			output.push_str(indent);
			output.push_str(line);
		}
	}
}

/// Escape the characters that are significant in HTML.
pub fn escape_html(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());
	for ch in text.chars() {
		match ch {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			_ => escaped.push(ch),
		}
	}

	escaped
}
