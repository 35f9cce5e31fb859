use crate::Delimiters;
use crate::Point;
use crate::Position;
use crate::ProustError;
use crate::ProustResult;
use crate::tokens::SpannedToken;
use crate::tokens::Standalone;
use crate::tokens::Token;

/// One step of the scanner: the literal text before a tag, and the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scanned {
	/// Always a [`Token::Text`], possibly empty.
	pub literal: SpannedToken,
	/// `None` only for the trailing text after the last tag.
	pub tag: Option<SpannedToken>,
}

/// Splits template source into literal text and tags using the active
/// delimiters. Delimiter change tags take effect for everything scanned
/// after them.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
	/// The full template source.
	source: &'a str,
	/// Byte offset of the next unscanned character.
	cursor: usize,
	/// Line/column/offset of `cursor`.
	position: Point,
	/// Delimiters to restore on `reset`.
	initial: Delimiters,
	/// Delimiters currently in effect.
	delimiters: Delimiters,
	finished: bool,
}

impl<'a> Scanner<'a> {
	pub fn new(source: &'a str, delimiters: Delimiters) -> ProustResult<Self> {
		delimiters
			.validate()
			.map_err(|reason| malformed(&delimiters.to_string(), reason, Point::default()))?;

		Ok(Self {
			source,
			cursor: 0,
			position: Point::default(),
			initial: delimiters.clone(),
			delimiters,
			finished: false,
		})
	}

	/// Rewind to the start of the source with the initial delimiters.
	pub fn reset(&mut self) {
		self.cursor = 0;
		self.position = Point::default();
		self.delimiters = self.initial.clone();
		self.finished = false;
	}

	/// The delimiters in effect for the next tag.
	pub fn delimiters(&self) -> &Delimiters {
		&self.delimiters
	}

	pub fn source(&self) -> &'a str {
		self.source
	}

	fn scan_next(&mut self) -> ProustResult<Option<Scanned>> {
		let source = self.source;
		let rest = &source[self.cursor..];

		let Some(found) = memstr(rest.as_bytes(), self.delimiters.open.as_bytes()) else {
			self.finished = true;
			if rest.is_empty() {
				return Ok(None);
			}

			let literal = self.take_literal(rest);
			return Ok(Some(Scanned { literal, tag: None }));
		};

		let literal = self.take_literal(&rest[..found]);
		let tag_start = self.cursor;
		let after_open = tag_start + self.delimiters.open.len();
		let sigil = source[after_open..].chars().next();

		let (closing, content_start) = match sigil {
			Some('{') => (format!("}}{}", self.delimiters.close), after_open + 1),
			Some('=') => (format!("={}", self.delimiters.close), after_open + 1),
			Some('#' | '^' | '/' | '!' | '>' | '&') => {
				(self.delimiters.close.clone(), after_open + 1)
			}
			_ => (self.delimiters.close.clone(), after_open),
		};

		let Some(content_len) = memstr(
			source[content_start..].as_bytes(),
			closing.as_bytes(),
		) else {
			let opening = &source[tag_start..content_start];
			return Err(malformed(
				opening,
				format!("missing closing `{closing}`"),
				self.position,
			));
		};

		let tag_end = content_start + content_len + closing.len();
		let raw = &source[tag_start..tag_end];
		let content = source[content_start..content_start + content_len].trim();
		let position = Position::spanning(self.position, raw);

		let token = match sigil {
			Some('!') => Token::Comment(content.to_string()),
			Some('=') => {
				let delimiters = parse_delimiters(content)
					.map_err(|reason| malformed(raw, reason, position.start))?;
				self.delimiters = delimiters.clone();
				Token::DelimiterChange(delimiters)
			}
			_ => {
				let name = validate_name(content).map_err(|reason| {
					malformed(raw, reason, position.start)
				})?;
				match sigil {
					Some('#') => Token::SectionOpen(name),
					Some('^') => Token::InvertedSectionOpen(name),
					Some('/') => Token::SectionClose(name),
					Some('>') => Token::Partial(name),
					Some('{' | '&') => {
						Token::Variable {
							path: name,
							escaped: false,
						}
					}
					_ => {
						Token::Variable {
							path: name,
							escaped: true,
						}
					}
				}
			}
		};

		let standalone = standalone_at(source, tag_start, tag_end);
		self.cursor = tag_end;
		self.position = position.end;

		Ok(Some(Scanned {
			literal,
			tag: Some(SpannedToken {
				token,
				position,
				standalone,
			}),
		}))
	}

	/// Consume `text` from the cursor as a literal.
	fn take_literal(&mut self, text: &str) -> SpannedToken {
		let position = Position::spanning(self.position, text);
		self.cursor += text.len();
		self.position = position.end;

		SpannedToken::new(Token::Text(text.to_string()), position)
	}
}

impl Iterator for Scanner<'_> {
	type Item = ProustResult<Scanned>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.finished {
			return None;
		}

		match self.scan_next() {
			Ok(Some(scanned)) => Some(Ok(scanned)),
			Ok(None) => None,
			Err(error) => {
				self.finished = true;
				Some(Err(error))
			}
		}
	}
}

fn malformed(tag: &str, reason: impl Into<String>, at: Point) -> ProustError {
	ProustError::MalformedTag {
		tag: tag.to_string(),
		reason: reason.into(),
		line: at.line,
		column: at.column,
	}
}

fn validate_name(content: &str) -> Result<String, String> {
	if content.is_empty() {
		return Err("tag name is empty".to_string());
	}

	if content.chars().any(char::is_whitespace) {
		return Err("tag name contains whitespace".to_string());
	}

	Ok(content.to_string())
}

/// Parse the body of `{{=<% %>=}}`, i.e. `<% %>`.
fn parse_delimiters(content: &str) -> Result<Delimiters, String> {
	let mut parts = content.split_whitespace();
	let (Some(open), Some(close), None) = (parts.next(), parts.next(), parts.next()) else {
		return Err("expected an opening and a closing delimiter".to_string());
	};

	let delimiters = Delimiters::new(open, close);
	delimiters.validate()?;

	Ok(delimiters)
}

fn is_inline_whitespace(byte: u8) -> bool {
	matches!(byte, b' ' | b'\t' | b'\r')
}

/// Classify the tag at `start..end` as standalone when everything else on its
/// first and last line is whitespace. Only the whitespace around the tag is
/// visited.
fn standalone_at(source: &str, start: usize, end: usize) -> Option<Standalone> {
	let bytes = source.as_bytes();

	let mut line_start = start;
	while line_start > 0 && matches!(bytes[line_start - 1], b' ' | b'\t') {
		line_start -= 1;
	}

	if line_start > 0 && bytes[line_start - 1] != b'\n' {
		return None;
	}

	let mut line_end = end;
	while line_end < bytes.len() && is_inline_whitespace(bytes[line_end]) {
		line_end += 1;
	}

	let trailing = match bytes.get(line_end) {
		None => line_end - end,
		Some(b'\n') => line_end + 1 - end,
		Some(_) => return None,
	};

	Some(Standalone {
		indent: source[line_start..start].to_string(),
		trailing,
	})
}

pub fn memstr(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	haystack
		.windows(needle.len())
		.position(|window| window == needle)
}
