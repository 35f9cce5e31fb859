use std::collections::HashMap;
use std::hash::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

use crate::CompilerOptions;
use crate::Delimiters;
use crate::ProustError;
use crate::ProustResult;
use crate::Template;

pub(crate) const CACHE_SCHEMA_VERSION: u32 = 2;
pub const CACHE_FILE_EXTENSION: &str = "mustache_cache";
pub const DEFAULT_CACHE_DIR: &str = ".mustache_cache";

/// Where a template came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FingerprintSource {
	/// Inline source, identified by a content hash.
	Text { hash: u64, len: usize },
	/// A template file, identified without reading its content again.
	File {
		path: PathBuf,
		modified_unix_ms: u64,
		size: u64,
	},
}

/// Everything that decides what a compilation produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
	pub source: FingerprintSource,
	pub delimiters: Delimiters,
	pub options: CompilerOptions,
}

impl FingerprintSource {
	pub fn text(source: &str) -> Self {
		let mut hasher = DefaultHasher::new();
		source.hash(&mut hasher);

		Self::Text {
			hash: hasher.finish(),
			len: source.len(),
		}
	}

	/// Identify the file at `path` by modification time and size.
	pub fn file(path: &Path) -> ProustResult<Self> {
		let metadata = std::fs::metadata(path)?;
		let modified_unix_ms = metadata
			.modified()
			.ok()
			.and_then(|time| time.duration_since(UNIX_EPOCH).ok())
			.and_then(|duration| duration.as_millis().try_into().ok())
			.unwrap_or(0);

		Ok(Self::File {
			path: path.to_path_buf(),
			modified_unix_ms,
			size: metadata.len(),
		})
	}
}

impl Fingerprint {
	pub fn for_text(source: &str, delimiters: &Delimiters, options: CompilerOptions) -> Self {
		Self {
			source: FingerprintSource::text(source),
			delimiters: delimiters.clone(),
			options,
		}
	}

	/// Fingerprint a template file by path, modification time and size.
	pub fn for_file(
		path: &Path,
		delimiters: &Delimiters,
		options: CompilerOptions,
	) -> ProustResult<Self> {
		Ok(Self {
			source: FingerprintSource::file(path)?,
			delimiters: delimiters.clone(),
			options,
		})
	}

	/// A stable 16 hex digit name for this fingerprint.
	pub fn digest(&self) -> String {
		let mut hasher = DefaultHasher::new();
		self.hash(&mut hasher);
		format!("{:016x}", hasher.finish())
	}
}

/// How compiled templates are kept between calls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheMode {
	/// Compile on every call.
	Disabled,
	/// Keep compiled templates for the lifetime of the cache.
	#[default]
	Memory,
	/// Keep them in memory and as files in this directory.
	Durable(PathBuf),
}

/// A snapshot of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
	pub memory_hits: u64,
	pub durable_hits: u64,
	pub compilations: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct DurableEntry {
	schema_version: u32,
	fingerprint: Fingerprint,
	template: Template,
}

/// Memoizes compiled templates by [`Fingerprint`].
#[derive(Debug, Default)]
pub struct TemplateCache {
	mode: CacheMode,
	templates: RwLock<HashMap<Fingerprint, Arc<Template>>>,
	memory_hits: AtomicU64,
	durable_hits: AtomicU64,
	compilations: AtomicU64,
}

impl TemplateCache {
	/// Create a cache, creating the durable directory when needed.
	pub fn new(mode: CacheMode) -> ProustResult<Self> {
		if let CacheMode::Durable(dir) = &mode {
			std::fs::create_dir_all(dir).map_err(|error| ProustError::cache_io(dir, error))?;
		}

		Ok(Self {
			mode,
			..Self::default()
		})
	}

	pub fn mode(&self) -> &CacheMode {
		&self.mode
	}

	pub fn stats(&self) -> CacheStats {
		CacheStats {
			memory_hits: self.memory_hits.load(Ordering::Relaxed),
			durable_hits: self.durable_hits.load(Ordering::Relaxed),
			compilations: self.compilations.load(Ordering::Relaxed),
		}
	}

	/// Number of templates held in memory.
	pub fn len(&self) -> usize {
		self.templates
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// The durable file for `fingerprint`, when persisting.
	pub fn entry_path(&self, fingerprint: &Fingerprint) -> Option<PathBuf> {
		match &self.mode {
			CacheMode::Durable(dir) => {
				Some(dir.join(format!(
					"{}.{CACHE_FILE_EXTENSION}",
					fingerprint.digest()
				)))
			}
			_ => None,
		}
	}

	/// Return the template for `fingerprint`, compiling it with `compile` only
	/// when neither memory nor the durable directory has it. Failed
	/// compilations are not stored.
	pub fn get_or_compile(
		&self,
		fingerprint: &Fingerprint,
		compile: impl FnOnce() -> ProustResult<Template>,
	) -> ProustResult<Arc<Template>> {
		self.get_current_or_compile(fingerprint, |_| Ok(true), compile)
	}

	/// Like [`TemplateCache::get_or_compile`], but a stored template that
	/// `is_current` rejects is compiled again and replaced.
	pub fn get_current_or_compile(
		&self,
		fingerprint: &Fingerprint,
		is_current: impl Fn(&Template) -> ProustResult<bool>,
		compile: impl FnOnce() -> ProustResult<Template>,
	) -> ProustResult<Arc<Template>> {
		if self.mode == CacheMode::Disabled {
			self.compilations.fetch_add(1, Ordering::Relaxed);
			return compile().map(Arc::new);
		}

		if let Some(template) = self.memory(fingerprint) {
			if is_current(&template)? {
				self.memory_hits.fetch_add(1, Ordering::Relaxed);
				tracing::trace!(digest = %fingerprint.digest(), "memory cache hit");
				return Ok(template);
			}

			tracing::debug!(digest = %fingerprint.digest(), "stale memory cache entry");
		}

		let entry_path = self.entry_path(fingerprint);
		if let Some(path) = &entry_path {
			if let Some(template) = load_entry(path, fingerprint)? {
				if is_current(&template)? {
					self.durable_hits.fetch_add(1, Ordering::Relaxed);
					tracing::debug!(path = %path.display(), "durable cache hit");
					return Ok(self.remember(fingerprint, template));
				}

				tracing::debug!(path = %path.display(), "stale durable cache entry");
			}
		}

		let template = compile()?;
		self.compilations.fetch_add(1, Ordering::Relaxed);

		if let Some(path) = &entry_path {
			save_entry(path, fingerprint, &template)?;
			tracing::debug!(path = %path.display(), "wrote durable cache entry");
		}

		Ok(self.remember(fingerprint, template))
	}

	/// Forget the templates held in memory. Durable entries stay.
	pub fn clear_memory(&self) {
		self.templates
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.clear();
	}

	/// Forget every template, in memory and on disk. Templates already handed
	/// out stay usable.
	pub fn clear(&self) -> ProustResult<()> {
		self.clear_memory();

		let CacheMode::Durable(dir) = &self.mode else {
			tracing::debug!("cleared memory cache");
			return Ok(());
		};

		let entries = match std::fs::read_dir(dir) {
			Ok(entries) => entries,
			Err(error) if error.kind() == ErrorKind::NotFound => return Ok(()),
			Err(error) => return Err(ProustError::cache_io(dir, error)),
		};

		let mut removed = 0_usize;
		for entry in entries {
			let path = entry.map_err(|error| ProustError::cache_io(dir, error))?.path();
			if path.extension().is_some_and(|ext| ext == CACHE_FILE_EXTENSION) {
				std::fs::remove_file(&path).map_err(|error| ProustError::cache_io(&path, error))?;
				removed += 1;
			}
		}

		tracing::debug!(dir = %dir.display(), removed, "cleared durable cache");
		Ok(())
	}

	fn memory(&self, fingerprint: &Fingerprint) -> Option<Arc<Template>> {
		self.templates
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.get(fingerprint)
			.cloned()
	}

	fn remember(&self, fingerprint: &Fingerprint, template: Template) -> Arc<Template> {
		let template = Arc::new(template);
		self.templates
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(fingerprint.clone(), Arc::clone(&template));
		template
	}
}

/// Read a durable entry. Unreadable content or a different fingerprint is a
/// miss, a failing read is not.
fn load_entry(path: &Path, fingerprint: &Fingerprint) -> ProustResult<Option<Template>> {
	let bytes = match std::fs::read(path) {
		Ok(bytes) => bytes,
		Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
		Err(error) => return Err(ProustError::cache_io(path, error)),
	};

	let Ok(entry) = serde_json::from_slice::<DurableEntry>(&bytes) else {
		tracing::debug!(path = %path.display(), "ignoring unreadable cache entry");
		return Ok(None);
	};

	if entry.schema_version != CACHE_SCHEMA_VERSION || entry.fingerprint != *fingerprint {
		return Ok(None);
	}

	Ok(Some(entry.template))
}

fn save_entry(path: &Path, fingerprint: &Fingerprint, template: &Template) -> ProustResult<()> {
	let entry = DurableEntry {
		schema_version: CACHE_SCHEMA_VERSION,
		fingerprint: fingerprint.clone(),
		template: template.clone(),
	};
	let payload = serde_json::to_vec(&entry).map_err(|error| ProustError::cache_io(path, error))?;

	let temp_path = path.with_extension(format!(
		"tmp-{}-{}",
		std::process::id(),
		SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_or(0, |duration| duration.as_nanos())
	));

	std::fs::write(&temp_path, payload).map_err(|error| ProustError::cache_io(&temp_path, error))?;

	if let Err(error) = std::fs::rename(&temp_path, path) {
		let _ = std::fs::remove_file(&temp_path);
		return Err(ProustError::cache_io(path, error));
	}

	Ok(())
}
