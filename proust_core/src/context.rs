use std::collections::BTreeMap;
use std::ops::Deref;
use std::ops::DerefMut;

use serde::Deserialize;
use serde::Serialize;

use crate::ProustError;
use crate::ProustResult;
use crate::generator::MAX_PARTIAL_DEPTH;
use crate::value::Lookup;
use crate::value::Value;

/// A dotted variable reference, split once at compile time. `.` refers to
/// the innermost frame and has no segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPath {
	pub raw: String,
	pub segments: Vec<String>,
}

impl KeyPath {
	pub fn parse(raw: impl Into<String>) -> Self {
		let raw = raw.into();
		let segments = if raw == "." {
			vec![]
		} else {
			raw.split('.').map(ToString::to_string).collect()
		};

		Self { raw, segments }
	}

	pub fn is_implicit(&self) -> bool {
		self.segments.is_empty()
	}
}

/// The scope stack a template renders against.
///
/// Frames are pushed with [`Context::push`], which returns a guard that pops
/// the frame when dropped. Values set with [`Context::set`] live below every
/// frame and are searched last.
#[derive(Debug, Default)]
pub struct Context {
	globals: BTreeMap<String, Value>,
	frames: Vec<Value>,
	raise_on_miss: bool,
	partial_depth: usize,
}

impl Context {
	pub fn new() -> Self {
		Self::default()
	}

	/// A context whose only frame is `value`.
	pub fn from_value(value: impl Into<Value>) -> Self {
		let mut context = Self::default();
		context.frames.push(value.into());
		context
	}

	/// Fail with [`ProustError::ContextMiss`] instead of rendering nothing
	/// when a path does not resolve.
	#[must_use]
	pub fn raise_on_miss(mut self, raise: bool) -> Self {
		self.raise_on_miss = raise;
		self
	}

	pub fn set_raise_on_miss(&mut self, raise: bool) {
		self.raise_on_miss = raise;
	}

	pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.globals.insert(key.into(), value.into());
	}

	/// Push a frame for the lifetime of the returned guard.
	pub fn push(&mut self, frame: impl Into<Value>) -> FrameGuard<'_> {
		self.frames.push(frame.into());
		FrameGuard {
			context: self,
			scope: Scope::Frame,
		}
	}

	/// Number of pushed frames, not counting globals.
	pub fn depth(&self) -> usize {
		self.frames.len()
	}

	/// The innermost frame.
	pub fn current(&self) -> Option<&Value> {
		self.frames.last()
	}

	pub(crate) fn enter_partial(&mut self, name: &str) -> ProustResult<FrameGuard<'_>> {
		if self.partial_depth >= MAX_PARTIAL_DEPTH {
			return Err(ProustError::PartialRecursion {
				name: name.to_string(),
				depth: MAX_PARTIAL_DEPTH,
			});
		}

		self.partial_depth += 1;
		Ok(FrameGuard {
			context: self,
			scope: Scope::Partial,
		})
	}

	/// Resolve a dotted path, honoring the miss policy.
	pub fn resolve(&self, path: &str) -> ProustResult<Value> {
		self.resolve_path(&KeyPath::parse(path))
	}

	pub(crate) fn resolve_path(&self, path: &KeyPath) -> ProustResult<Value> {
		match self.lookup_path(path) {
			Some(value) => Ok(value),
			None if self.raise_on_miss => Err(ProustError::ContextMiss(path.raw.clone())),
			None => Ok(Value::Null),
		}
	}

	/// Resolve a dotted path, returning `None` when it is absent.
	pub fn lookup(&self, path: &str) -> Option<Value> {
		self.lookup_path(&KeyPath::parse(path))
	}

	fn lookup_path(&self, path: &KeyPath) -> Option<Value> {
		let Some((first, rest)) = path.segments.split_first() else {
			return self.current().cloned();
		};

		// Only the first segment walks the stack. The first frame that knows
		// it wins, even if the rest of the path then fails.
		let mut value = self
			.frames
			.iter()
			.rev()
			.find_map(|frame| get_or_call(frame, first))
			.or_else(|| self.globals.try_get(first))?;

		for segment in rest {
			value = get_or_call(&value, segment)?;
		}

		Some(value)
	}
}

fn get_or_call(target: &impl Lookup, key: &str) -> Option<Value> {
	target.try_get(key).or_else(|| target.try_call(key))
}

enum Scope {
	Frame,
	Partial,
}

/// Keeps a frame (or a partial nesting level) on the [`Context`] until
/// dropped, including when rendering fails part way.
pub struct FrameGuard<'a> {
	context: &'a mut Context,
	scope: Scope,
}

impl Deref for FrameGuard<'_> {
	type Target = Context;

	fn deref(&self) -> &Self::Target {
		self.context
	}
}

impl DerefMut for FrameGuard<'_> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		self.context
	}
}

impl Drop for FrameGuard<'_> {
	fn drop(&mut self) {
		match self.scope {
			Scope::Frame => {
				self.context.frames.pop();
			}
			Scope::Partial => {
				self.context.partial_depth -= 1;
			}
		}
	}
}
