use derive_more::Deref;
use derive_more::DerefMut;
use serde::Deserialize;
use serde::Serialize;

use super::ProustError;
use super::ProustResult;
use crate::Delimiters;
use crate::Position;
use crate::scanner::Scanner;
use crate::tokens::SpannedToken;
use crate::tokens::Token;

/// A node of the parsed template. Sections own their children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
	/// Literal output, after standalone-line trimming.
	Text { text: String },
	/// `{{path}}`, `{{{path}}}` or `{{&path}}`.
	Variable {
		path: String,
		escaped: bool,
		position: Position,
	},
	/// `{{#path}}...{{/path}}` or, when `inverted`, `{{^path}}...{{/path}}`.
	Section {
		path: String,
		inverted: bool,
		children: Vec<Node>,
		/// The untouched source between the opening and closing tags. This is
		/// what a section lambda receives.
		raw: String,
		/// Delimiters in effect at the opening tag.
		delimiters: Delimiters,
		opening: Position,
		closing: Position,
	},
	/// `{{>name}}`. `indent` is the whitespace preceding a standalone partial
	/// tag and is empty otherwise.
	Partial {
		name: String,
		indent: String,
		position: Position,
	},
	/// `{{! text }}`
	Comment { text: String, position: Position },
}

/// The parsed form of a template: a sequence of well-nested nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Deref, DerefMut)]
#[serde(transparent)]
pub struct TokenTree(
	#[deref]
	#[deref_mut]
	Vec<Node>,
);

impl TokenTree {
	pub fn new(nodes: Vec<Node>) -> Self {
		Self(nodes)
	}

	pub fn into_nodes(self) -> Vec<Node> {
		self.0
	}

	/// Total number of nodes, counting section children.
	pub fn node_count(&self) -> usize {
		fn count(nodes: &[Node]) -> usize {
			nodes
				.iter()
				.map(|node| {
					match node {
						Node::Section { children, .. } => 1 + count(children),
						_ => 1,
					}
				})
				.sum()
		}

		count(&self.0)
	}
}

/// Parse template source into a [`TokenTree`], starting with `delimiters`.
pub fn parse(source: impl AsRef<str>, delimiters: &Delimiters) -> ProustResult<TokenTree> {
	let source = source.as_ref();
	let mut scanner = Scanner::new(source, delimiters.clone())?;
	let mut root: Vec<Node> = vec![];
	let mut pending: Vec<SectionCreator> = vec![];
	// Bytes of the next literal that belong to the previous standalone line.
	let mut strip_next = 0;

	while let Some(scanned) = scanner.next() {
		let scanned = scanned?;
		let Token::Text(mut text) = scanned.literal.token else {
			continue;
		};

		text.drain(..strip_next.min(text.len()));
		strip_next = 0;

		if let Some(standalone) = scanned.tag.as_ref().and_then(SpannedToken::trimmable) {
			text.truncate(text.len().saturating_sub(standalone.indent.len()));
			strip_next = standalone.trailing;
		}

		if !text.is_empty() {
			container(&mut root, &mut pending).push(Node::Text { text });
		}

		let Some(tag) = scanned.tag else {
			continue;
		};

		let inverted = matches!(tag.token, Token::InvertedSectionOpen(_));
		match tag.token {
			Token::SectionOpen(path) | Token::InvertedSectionOpen(path) => {
				pending.push(SectionCreator {
					path,
					inverted,
					opening: tag.position,
					delimiters: scanner.delimiters().clone(),
					children: vec![],
				});
			}
			Token::SectionClose(name) => {
				let Some(creator) = pending.pop() else {
					return Err(ProustError::UnmatchedCloseTag {
						name,
						expected: None,
						line: tag.position.start.line,
						column: tag.position.start.column,
					});
				};

				if creator.path != name {
					return Err(ProustError::UnmatchedCloseTag {
						name,
						expected: Some(creator.path),
						line: tag.position.start.line,
						column: tag.position.start.column,
					});
				}

				let node = creator.into_node(source, tag.position);
				container(&mut root, &mut pending).push(node);
			}
			Token::Partial(name) => {
				let indent = tag
					.standalone
					.map(|standalone| standalone.indent)
					.unwrap_or_default();
				container(&mut root, &mut pending).push(Node::Partial {
					name,
					indent,
					position: tag.position,
				});
			}
			Token::Comment(text) => {
				container(&mut root, &mut pending).push(Node::Comment {
					text,
					position: tag.position,
				});
			}
			Token::Variable { path, escaped } => {
				container(&mut root, &mut pending).push(Node::Variable {
					path,
					escaped,
					position: tag.position,
				});
			}
			Token::DelimiterChange(_) => {}
			Token::Text(text) => {
				container(&mut root, &mut pending).push(Node::Text { text });
			}
		}
	}

	// Report the innermost section that was left open.
	if let Some(creator) = pending.pop() {
		return Err(ProustError::UnterminatedSection {
			name: creator.path,
			line: creator.opening.start.line,
			column: creator.opening.start.column,
		});
	}

	Ok(TokenTree(root))
}

/// Where the next node belongs: the innermost open section, or the root.
fn container<'a>(root: &'a mut Vec<Node>, pending: &'a mut [SectionCreator]) -> &'a mut Vec<Node> {
	match pending.last_mut() {
		Some(creator) => &mut creator.children,
		None => root,
	}
}

struct SectionCreator {
	path: String,
	inverted: bool,
	opening: Position,
	delimiters: Delimiters,
	children: Vec<Node>,
}

impl SectionCreator {
	fn into_node(self, source: &str, closing: Position) -> Node {
		let raw = source[self.opening.end.offset..closing.start.offset].to_string();

		Node::Section {
			path: self.path,
			inverted: self.inverted,
			children: self.children,
			raw,
			delimiters: self.delimiters,
			opening: self.opening,
			closing,
		}
	}
}
