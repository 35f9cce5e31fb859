use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;

use crate::Position;

/// The pair of markers that open and close a tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Delimiters {
	pub open: String,
	pub close: String,
}

impl Default for Delimiters {
	fn default() -> Self {
		Self {
			open: "{{".to_string(),
			close: "}}".to_string(),
		}
	}
}

impl Delimiters {
	pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
		Self {
			open: open.into(),
			close: close.into(),
		}
	}

	/// Check that both markers are usable. Returns the reason when they are
	/// not.
	pub fn validate(&self) -> Result<(), String> {
		for marker in [&self.open, &self.close] {
			if marker.is_empty() {
				return Err("delimiters cannot be empty".to_string());
			}

			if marker.chars().any(char::is_whitespace) {
				return Err(format!("delimiter `{marker}` contains whitespace"));
			}

			if marker.contains('=') {
				return Err(format!("delimiter `{marker}` contains `=`"));
			}
		}

		Ok(())
	}
}

impl Display for Delimiters {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} {}", self.open, self.close)
	}
}

/// A lexical unit of template source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Token {
	/// Literal text between tags.
	Text(String),
	/// `{{name}}` when `escaped`, `{{{name}}}` or `{{&name}}` otherwise.
	Variable { path: String, escaped: bool },
	/// `{{#name}}`
	SectionOpen(String),
	/// `{{^name}}`
	InvertedSectionOpen(String),
	/// `{{/name}}`
	SectionClose(String),
	/// `{{>name}}`
	Partial(String),
	/// `{{! anything }}`
	Comment(String),
	/// `{{=<% %>=}}`. Consumed by the parser.
	DelimiterChange(Delimiters),
}

impl Token {
	/// Whether a line holding only this tag is removed from the output.
	/// Text and variables are never standalone.
	pub fn allows_standalone(&self) -> bool {
		!matches!(self, Token::Text(_) | Token::Variable { .. })
	}

	pub fn sigil(&self) -> Option<char> {
		match self {
			Token::Text(_) => None,
			Token::Variable { escaped: true, .. } => None,
			Token::Variable { escaped: false, .. } => Some('&'),
			Token::SectionOpen(_) => Some('#'),
			Token::InvertedSectionOpen(_) => Some('^'),
			Token::SectionClose(_) => Some('/'),
			Token::Partial(_) => Some('>'),
			Token::Comment(_) => Some('!'),
			Token::DelimiterChange(_) => Some('='),
		}
	}
}

impl Display for Token {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Token::Text(text) => write!(f, "{text}"),
			Token::Variable {
				path,
				escaped: true,
			} => write!(f, "{{{{{path}}}}}"),
			Token::Variable {
				path,
				escaped: false,
			} => write!(f, "{{{{&{path}}}}}"),
			Token::SectionOpen(path) => write!(f, "{{{{#{path}}}}}"),
			Token::InvertedSectionOpen(path) => write!(f, "{{{{^{path}}}}}"),
			Token::SectionClose(path) => write!(f, "{{{{/{path}}}}}"),
			Token::Partial(name) => write!(f, "{{{{>{name}}}}}"),
			Token::Comment(text) => write!(f, "{{{{!{text}}}}}"),
			Token::DelimiterChange(delimiters) => write!(f, "{{{{={delimiters}=}}}}"),
		}
	}
}

/// Whitespace surrounding a tag that sits alone on its line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standalone {
	/// Whitespace between the start of the line and the tag.
	pub indent: String,
	/// Byte length of the whitespace and line break following the tag.
	pub trailing: usize,
}

/// A token together with where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpannedToken {
	pub token: Token,
	pub position: Position,
	/// Present when the token is the only non-whitespace content of its
	/// line(s). Always `None` for text.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub standalone: Option<Standalone>,
}

impl SpannedToken {
	pub fn new(token: Token, position: Position) -> Self {
		Self {
			token,
			position,
			standalone: None,
		}
	}

	/// The standalone whitespace, but only for tokens that may be trimmed.
	pub fn trimmable(&self) -> Option<&Standalone> {
		if self.token.allows_standalone() {
			self.standalone.as_ref()
		} else {
			None
		}
	}
}
