use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum ProustError {
	#[error(transparent)]
	#[diagnostic(code(proust::io_error))]
	Io(#[from] std::io::Error),

	#[error("closing tag `{name}` at {line}:{column} does not match {}", expected_label(.expected.as_deref()))]
	#[diagnostic(
		code(proust::unmatched_close_tag),
		help("sections must be closed in reverse order of opening")
	)]
	UnmatchedCloseTag {
		name: String,
		expected: Option<String>,
		line: usize,
		column: usize,
	},

	#[error("section `{name}` opened at {line}:{column} is never closed")]
	#[diagnostic(
		code(proust::unterminated_section),
		help("add `{{{{/{name}}}}}` to close this section")
	)]
	UnterminatedSection {
		name: String,
		line: usize,
		column: usize,
	},

	#[error("malformed tag `{tag}` at {line}:{column}: {reason}")]
	#[diagnostic(code(proust::malformed_tag))]
	MalformedTag {
		tag: String,
		reason: String,
		line: usize,
		column: usize,
	},

	#[error("no value found in context for `{0}`")]
	#[diagnostic(
		code(proust::context_miss),
		help("provide the value or disable `raise_on_context_miss`")
	)]
	ContextMiss(String),

	#[error("cache failure at `{path}`: {reason}")]
	#[diagnostic(
		code(proust::cache_io),
		help("check that the cache directory exists and is writable, or disable the cache")
	)]
	CacheIo { path: String, reason: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(proust::config_parse),
		help("check that proust.toml is valid TOML")
	)]
	ConfigParse(String),

	#[error("partial `{name}` nested deeper than {depth} levels")]
	#[diagnostic(
		code(proust::partial_recursion),
		help("a partial probably includes itself without a terminating condition")
	)]
	PartialRecursion { name: String, depth: usize },

	#[error("failed to serialize compiled template: {0}")]
	#[diagnostic(code(proust::serialization))]
	Serialization(String),

	#[error("value cannot be used as a render context: {0}")]
	#[diagnostic(code(proust::invalid_context))]
	InvalidContext(String),
}

fn expected_label(expected: Option<&str>) -> String {
	match expected {
		Some(name) => format!("open section `{name}`"),
		None => "any open section".to_string(),
	}
}

impl ProustError {
	pub(crate) fn cache_io(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
		Self::CacheIo {
			path: path.display().to_string(),
			reason: error.to_string(),
		}
	}
}

pub type ProustResult<T> = Result<T, ProustError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
