use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use proust_core::AnyResult;
use proust_core::ProustConfig;
use proust_core::ProustOptions;
use proust_core::Value;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Render and compile mustache templates.",
	long_about = "proust compiles mustache templates into reusable instruction lists and renders \
	              them against JSON data.\n\nQuick start:\n  proust render page.mustache --json \
	              data.json\n  proust tokens page.mustache\n  proust compile page.mustache \
	              --output page.json"
)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProustCli {
	#[command(subcommand)]
	pub command: Commands,

	/// Directory that partials are read from. Also where `proust.toml` is
	/// looked for. Defaults to the current directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// JSON file providing the render context.
	#[arg(long, short, global = true)]
	pub json: Option<PathBuf>,

	/// Treat lambdas as plain values.
	#[arg(long, global = true, default_value_t = false)]
	pub disable_lambdas: bool,

	/// Do not indent the output of standalone partials.
	#[arg(long, global = true, default_value_t = false)]
	pub disable_indentation: bool,

	/// Compile partials into the templates that include them.
	#[arg(long, global = true, default_value_t = false)]
	pub include_partials: bool,

	/// Pretty-print compiled output.
	#[arg(long, global = true, default_value_t = false)]
	pub beautify: bool,

	/// Compile every template from scratch, without reading or writing the
	/// cache.
	#[arg(long, global = true, default_value_t = false)]
	pub no_cache: bool,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Render templates to stdout.
	///
	/// Each file is rendered against the context from `--json` and the
	/// outputs are printed in order.
	Render {
		/// Template files to render.
		#[arg(required = true)]
		files: Vec<PathBuf>,
	},
	/// Print the parsed token tree of each template as JSON.
	Tokens {
		/// Template files to parse.
		#[arg(required = true)]
		files: Vec<PathBuf>,
	},
	/// Print the compiled form of each template.
	Compile {
		/// Template files to compile.
		#[arg(required = true)]
		files: Vec<PathBuf>,

		/// Write the compiled output to this file instead of stdout.
		#[arg(long, short)]
		output: Option<PathBuf>,
	},
}

impl ProustCli {
	/// The directory partials and config are resolved from.
	pub fn root(&self) -> PathBuf {
		self.path
			.clone()
			.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
	}

	/// Engine options from `proust.toml` with the command line flags applied on
	/// top. Without a config file compiled templates are only kept in memory.
	pub fn options(&self) -> AnyResult<ProustOptions> {
		let root = self.root();
		let config = ProustConfig::load(&root)?;
		let mut options = ProustOptions::from_config(&root, config.as_ref());

		if config.is_none() {
			options = options.in_memory();
		}

		if self.no_cache {
			options = options.without_cache();
		}

		options.compiler.disable_lambdas |= self.disable_lambdas;
		options.compiler.disable_indentation |= self.disable_indentation;
		options.compiler.include_partial_code |= self.include_partials;
		options.compiler.beautify |= self.beautify;

		Ok(options)
	}

	/// The render context read from `--json`, or an empty one.
	pub fn context(&self) -> AnyResult<Value> {
		let Some(path) = &self.json else {
			return Ok(Value::Null);
		};

		read_json(path)
	}
}

fn read_json(path: &Path) -> AnyResult<Value> {
	let content = std::fs::read_to_string(path)
		.map_err(|e| format!("failed to read `{}`: {e}", path.display()))?;
	let value: serde_json::Value = serde_json::from_str(&content)
		.map_err(|e| format!("invalid JSON in `{}`: {e}", path.display()))?;

	Ok(Value::from(value))
}
