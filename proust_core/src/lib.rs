//! `proust_core` compiles Mustache templates into reusable instruction lists
//! and renders them against a context.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Template source
//!   -> Scanner (splits literal text and tags using the active delimiters)
//!   -> Parser (builds a nested token tree, trims standalone lines)
//!   -> Generator (lowers the tree into a compact instruction list)
//!   -> TemplateCache (memoizes compiled templates by fingerprint)
//!   -> Template::render (executes the instructions against a Context)
//! ```
//!
//! ## Key Types
//!
//! - [`Proust`]: the engine tying the pipeline together, with partial lookup.
//! - [`Template`]: a compiled template, shareable across threads.
//! - [`Context`]: the scope stack variables are resolved against.
//! - [`Value`]: a context value, built from `serde_json` or any `Serialize`
//!   type.
//! - [`TemplateCache`]: in-memory and on-disk memoization of compilations.
//! - [`ProustConfig`]: configuration loaded from `proust.toml`.
//!
//! ## Quick Start
//!
//! ```rust
//! use proust_core::Proust;
//! use proust_core::ProustOptions;
//! use serde_json::json;
//!
//! let proust = Proust::new(ProustOptions::default().in_memory())?;
//! let output = proust.render(
//! 	"{{#items}}{{.}},{{/items}}",
//! 	json!({ "items": ["a", "b", "c"] }),
//! )?;
//! assert_eq!(output, "a,b,c,");
//! # Ok::<(), proust_core::ProustError>(())
//! ```

pub use cache::*;
pub use config::*;
pub use context::*;
pub use engine::*;
pub use error::*;
pub use generator::*;
pub use parser::*;
pub use position::*;
pub use scanner::*;
pub use tokens::*;
pub use value::*;

mod cache;
mod config;
mod context;
mod engine;
#[allow(unused_assignments)]
mod error;
mod generator;
mod parser;
mod position;
mod scanner;
mod tokens;
mod value;
