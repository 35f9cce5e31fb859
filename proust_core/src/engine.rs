use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::CacheStats;
use crate::Context;
use crate::Delimiters;
use crate::Fingerprint;
use crate::FingerprintSource;
use crate::Generator;
use crate::ProustConfig;
use crate::ProustOptions;
use crate::ProustResult;
use crate::Resolver;
use crate::Template;
use crate::TemplateCache;
use crate::TokenTree;
use crate::parser::parse;
use crate::value::Value;

/// Compiles and renders templates, memoizing compilations in a
/// [`TemplateCache`].
///
/// ```rust
/// use proust_core::Proust;
/// use proust_core::ProustOptions;
///
/// let proust = Proust::new(ProustOptions::default().in_memory())?;
/// let output = proust.render(
/// 	"Hello {{name}}!",
/// 	serde_json::json!({ "name": "World" }),
/// )?;
/// assert_eq!(output, "Hello World!");
/// # Ok::<(), proust_core::ProustError>(())
/// ```
#[derive(Debug)]
pub struct Proust {
	options: ProustOptions,
	cache: TemplateCache,
	/// Partial sources registered in memory. These shadow template files.
	partials: HashMap<String, String>,
}

impl Proust {
	/// Create an engine, creating the cache directory when the cache persists.
	pub fn new(options: ProustOptions) -> ProustResult<Self> {
		let cache = TemplateCache::new(options.cache_mode())?;

		Ok(Self {
			options,
			cache,
			partials: HashMap::new(),
		})
	}

	/// Create an engine for the project at `root`, reading `proust.toml` when
	/// present.
	pub fn load(root: &Path) -> ProustResult<Self> {
		let config = ProustConfig::load(root)?;
		Self::new(ProustOptions::from_config(root, config.as_ref()))
	}

	pub fn options(&self) -> &ProustOptions {
		&self.options
	}

	/// Register `source` as the partial `name`. Templates compiled before
	/// are dropped from memory since they may have inlined an older version.
	pub fn add_partial(&mut self, name: impl Into<String>, source: impl Into<String>) {
		self.partials.insert(name.into(), source.into());
		self.cache.clear_memory();
	}

	/// A fresh context following this engine's miss policy.
	pub fn context(&self) -> Context {
		Context::new().raise_on_miss(self.options.raise_on_context_miss)
	}

	/// Compile `source`, reusing an earlier compilation of the same source,
	/// delimiters and options.
	#[tracing::instrument(skip_all)]
	pub fn compile(&self, source: &str) -> ProustResult<Arc<Template>> {
		self.compile_with(source, &self.options.delimiters)
	}

	/// The textual representation of the compiled `source`.
	pub fn compile_to_string(&self, source: &str) -> ProustResult<String> {
		self.compile(source)?.to_text()
	}

	/// Parse `source` without compiling it.
	pub fn tokens(&self, source: &str) -> ProustResult<TokenTree> {
		parse(source, &self.options.delimiters)
	}

	pub fn render(&self, source: &str, value: impl Into<Value>) -> ProustResult<String> {
		let mut context = self.context();
		let mut scope = context.push(value);
		self.render_with_context(source, &mut scope)
	}

	/// Render `source` against a context owned by the caller.
	pub fn render_with_context(&self, source: &str, context: &mut Context) -> ProustResult<String> {
		self.compile(source)?.render(context, self)
	}

	/// Render the template called `name`. An unknown name renders as empty
	/// text.
	pub fn render_named(&self, name: &str, value: impl Into<Value>) -> ProustResult<String> {
		let Some(template) = self.partial(name)? else {
			return Ok(String::new());
		};

		let mut context = self.context();
		let mut scope = context.push(value);
		template.render(&mut scope, self)
	}

	/// Render the template file at `path`.
	pub fn render_file(&self, path: &Path, value: impl Into<Value>) -> ProustResult<String> {
		let template = self.compile_file(path)?;
		let mut context = self.context();
		let mut scope = context.push(value);
		template.render(&mut scope, self)
	}

	/// Compile the template file at `path`, fingerprinted by its path,
	/// modification time and size.
	pub fn compile_file(&self, path: &Path) -> ProustResult<Arc<Template>> {
		let delimiters = &self.options.delimiters;
		let fingerprint = Fingerprint::for_file(path, delimiters, self.options.compiler)?;

		self.cache.get_current_or_compile(
			&fingerprint,
			|template| template.is_current(self),
			|| {
				let source = std::fs::read_to_string(path)?;
				self.generate(&source, delimiters, &fingerprint)
			},
		)
	}

	/// Forget every compiled template, including those on disk.
	pub fn clear_cache(&self) -> ProustResult<()> {
		self.cache.clear()
	}

	pub fn cache_stats(&self) -> CacheStats {
		self.cache.stats()
	}

	fn compile_with(&self, source: &str, delimiters: &Delimiters) -> ProustResult<Arc<Template>> {
		let fingerprint = Fingerprint::for_text(source, delimiters, self.options.compiler);
		self.cache.get_current_or_compile(
			&fingerprint,
			|template| template.is_current(self),
			|| self.generate(source, delimiters, &fingerprint),
		)
	}

	fn generate(
		&self,
		source: &str,
		delimiters: &Delimiters,
		fingerprint: &Fingerprint,
	) -> ProustResult<Template> {
		let tree = parse(source, delimiters)?;
		tracing::debug!(
			digest = %fingerprint.digest(),
			nodes = tree.node_count(),
			"compiling template"
		);

		Generator::new(self.options.compiler, delimiters.clone(), self).compile(&tree)
	}
}

impl Resolver for Proust {
	fn partial_source(&self, name: &str) -> ProustResult<Option<String>> {
		if let Some(source) = self.partials.get(name) {
			return Ok(Some(source.clone()));
		}

		let path = self.options.template_file(name);
		if !path.is_file() {
			return Ok(None);
		}

		Ok(Some(std::fs::read_to_string(path)?))
	}

	fn partial_fingerprint(&self, name: &str) -> ProustResult<Option<FingerprintSource>> {
		if let Some(source) = self.partials.get(name) {
			return Ok(Some(FingerprintSource::text(source)));
		}

		let path = self.options.template_file(name);
		if !path.is_file() {
			return Ok(None);
		}

		FingerprintSource::file(&path).map(Some)
	}

	fn partial(&self, name: &str) -> ProustResult<Option<Arc<Template>>> {
		if let Some(source) = self.partials.get(name) {
			return self.compile_with(source, &self.options.delimiters).map(Some);
		}

		let path = self.options.template_file(name);
		if !path.is_file() {
			tracing::trace!(partial = %name, "no template found");
			return Ok(None);
		}

		self.compile_file(&path).map(Some)
	}

	fn dynamic(&self, source: &str, delimiters: &Delimiters) -> ProustResult<Arc<Template>> {
		self.compile_with(source, delimiters)
	}
}
