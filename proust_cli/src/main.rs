use std::path::Path;
use std::process;

use clap::Parser;
use owo_colors::OwoColorize;
use proust_cli::Commands;
use proust_cli::ProustCli;
use proust_core::AnyEmptyResult;
use proust_core::AnyResult;
use proust_core::Proust;
use proust_core::ProustError;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = ProustCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let default_level = if args.verbose { "debug" } else { "warn" };
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
		)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.init();

	let result = match &args.command {
		Commands::Render { files } => run_render(&args, files),
		Commands::Tokens { files } => run_tokens(&args, files),
		Commands::Compile { files, output } => run_compile(&args, files, output.as_deref()),
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<ProustError>() {
			Ok(proust_err) => {
				let report: miette::Report = (*proust_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

fn engine(args: &ProustCli) -> AnyResult<Proust> {
	Ok(Proust::new(args.options()?)?)
}

fn read_template(path: &Path) -> AnyResult<String> {
	std::fs::read_to_string(path)
		.map_err(|e| format!("failed to read template `{}`: {e}", path.display()).into())
}

fn ensure_template(path: &Path) -> AnyEmptyResult {
	if path.is_file() {
		return Ok(());
	}

	Err(format!("template `{}` not found", path.display()).into())
}

fn run_render(args: &ProustCli, files: &[std::path::PathBuf]) -> AnyEmptyResult {
	let proust = engine(args)?;
	let context = args.context()?;

	for file in files {
		ensure_template(file)?;
		let output = proust.render_file(file, context.clone())?;
		print!("{output}");
	}

	Ok(())
}

fn run_tokens(args: &ProustCli, files: &[std::path::PathBuf]) -> AnyEmptyResult {
	let proust = engine(args)?;

	for file in files {
		let source = read_template(file)?;
		let tree = proust.tokens(&source)?;
		println!("{}", serde_json::to_string_pretty(&tree)?);
	}

	Ok(())
}

fn run_compile(
	args: &ProustCli,
	files: &[std::path::PathBuf],
	output: Option<&Path>,
) -> AnyEmptyResult {
	let proust = engine(args)?;
	let mut compiled = Vec::with_capacity(files.len());

	for file in files {
		ensure_template(file)?;
		compiled.push(proust.compile_file(file)?.to_text()?);
	}

	let text = compiled.join("\n");
	match output {
		Some(path) => {
			std::fs::write(path, format!("{text}\n"))
				.map_err(|e| format!("failed to write `{}`: {e}", path.display()))?;
		}
		None => println!("{text}"),
	}

	Ok(())
}
