use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::CacheMode;
use crate::CompilerOptions;
use crate::DEFAULT_CACHE_DIR;
use crate::Delimiters;
use crate::ProustError;
use crate::ProustResult;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["proust.toml", ".proust.toml", ".config/proust.toml"];

pub const DEFAULT_TEMPLATE_EXTENSION: &str = "mustache";

/// Configuration loaded from a `proust.toml` file.
///
/// ```toml
/// template_path = "templates"
/// template_extension = "mustache"
/// cache_dir = ".mustache_cache"
/// enable_cache = true
/// raise_on_context_miss = false
///
/// [delimiters]
/// open = "{{"
/// close = "}}"
///
/// [compiler]
/// include_partial_code = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProustConfig {
	/// Directory that partials and named templates are read from.
	#[serde(default)]
	pub template_path: Option<PathBuf>,
	/// File extension of named templates, without the dot.
	#[serde(default)]
	pub template_extension: Option<String>,
	/// Directory for compiled templates. Defaults to `.mustache_cache` inside
	/// the template path.
	#[serde(default)]
	pub cache_dir: Option<PathBuf>,
	#[serde(default)]
	pub enable_cache: Option<bool>,
	/// Keep compiled templates on disk as well as in memory.
	#[serde(default)]
	pub persist_cache: Option<bool>,
	#[serde(default)]
	pub raise_on_context_miss: Option<bool>,
	/// Delimiters every template starts with.
	#[serde(default)]
	pub delimiters: Option<Delimiters>,
	#[serde(default)]
	pub compiler: CompilerOptions,
}

impl ProustConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if there is none.
	pub fn load(root: &Path) -> ProustResult<Option<ProustConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config: ProustConfig =
			toml::from_str(&content).map_err(|e| ProustError::ConfigParse(e.to_string()))?;

		tracing::debug!(path = %config_path.display(), "loaded config");
		Ok(Some(config))
	}
}

/// Runtime options of a [`Proust`](crate::Proust) engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProustOptions {
	pub template_path: PathBuf,
	pub template_extension: String,
	/// `None` means `<template_path>/.mustache_cache`.
	pub cache_dir: Option<PathBuf>,
	pub enable_cache: bool,
	pub persist_cache: bool,
	pub raise_on_context_miss: bool,
	pub delimiters: Delimiters,
	pub compiler: CompilerOptions,
}

impl Default for ProustOptions {
	fn default() -> Self {
		Self {
			template_path: PathBuf::from("."),
			template_extension: DEFAULT_TEMPLATE_EXTENSION.to_string(),
			cache_dir: None,
			enable_cache: true,
			persist_cache: true,
			raise_on_context_miss: false,
			delimiters: Delimiters::default(),
			compiler: CompilerOptions::default(),
		}
	}
}

impl ProustOptions {
	/// Options for a project at `root`, taking whatever `config` sets.
	/// Relative paths in the config are relative to `root`.
	pub fn from_config(root: &Path, config: Option<&ProustConfig>) -> Self {
		let mut options = Self {
			template_path: root.to_path_buf(),
			..Self::default()
		};

		let Some(config) = config else {
			return options;
		};

		if let Some(template_path) = &config.template_path {
			options.template_path = root.join(template_path);
		}

		if let Some(extension) = &config.template_extension {
			options.template_extension = extension.trim_start_matches('.').to_string();
		}

		options.cache_dir = config.cache_dir.as_ref().map(|dir| root.join(dir));
		options.enable_cache = config.enable_cache.unwrap_or(options.enable_cache);
		options.persist_cache = config.persist_cache.unwrap_or(options.persist_cache);
		options.raise_on_context_miss = config
			.raise_on_context_miss
			.unwrap_or(options.raise_on_context_miss);

		if let Some(delimiters) = &config.delimiters {
			options.delimiters = delimiters.clone();
		}

		options.compiler = config.compiler;
		options
	}

	/// Only keep compiled templates in memory.
	#[must_use]
	pub fn in_memory(mut self) -> Self {
		self.enable_cache = true;
		self.persist_cache = false;
		self
	}

	#[must_use]
	pub fn without_cache(mut self) -> Self {
		self.enable_cache = false;
		self
	}

	pub fn resolved_cache_dir(&self) -> PathBuf {
		self.cache_dir
			.clone()
			.unwrap_or_else(|| self.template_path.join(DEFAULT_CACHE_DIR))
	}

	pub fn cache_mode(&self) -> CacheMode {
		match (self.enable_cache, self.persist_cache) {
			(false, _) => CacheMode::Disabled,
			(true, false) => CacheMode::Memory,
			(true, true) => CacheMode::Durable(self.resolved_cache_dir()),
		}
	}

	/// Path of the named template `name`.
	pub fn template_file(&self, name: &str) -> PathBuf {
		self.template_path
			.join(format!("{name}.{}", self.template_extension))
	}
}
