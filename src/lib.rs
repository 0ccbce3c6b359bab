#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]

//! ## Modules
//!
//! A run goes through the [`pipeline`]: an [`archive`] is extracted, the
//! [`walker`] classifies files with the [`classifier`], the [`orchestrator`]
//! calls the generation endpoint through the [`client`] on a bounded
//! [`parallel`] worker pool, and the [`aggregator`] builds the
//! [`aggregator::ProjectDocumentSet`] that [`render`] exports and [`history`]
//! keeps.
//!
//! ```rust,ignore
//! use autodocgen::{Config, pipeline::{DocumentationPipeline, ProjectSource, RunHandle}};
//!
//! async fn example() -> autodocgen::Result<()> {
//!     let config = Config::load()?;
//!     let run = config.run_config();
//!     let pipeline = DocumentationPipeline::from_config(config)?;
//!     let source = ProjectSource::from_path("./my-project")?;
//!     let set = pipeline.run(&source, run, RunHandle::new()).await?;
//!     println!("{} files documented", set.summary.succeeded);
//!     Ok(())
//! }
//! ```

/// Configuration module for the application
pub mod config;
/// Error handling types and utilities
pub mod error;
/// Logging configuration and utilities
pub mod logging;
/// Retry and backoff helpers
pub mod utils;
/// File classification by extension and size
pub mod classifier;
/// Deterministic project traversal
pub mod walker;
/// Prompt construction and input truncation
pub mod prompts;
/// Generation endpoint abstraction and per-file results
pub mod client;
/// Bounded worker pool
pub mod parallel;
/// Processing modes, retries and run state
pub mod orchestrator;
/// Result aggregation and project overview
pub mod aggregator;
/// Markdown, JSON and HTML exports
pub mod render;
/// Archive extraction with size and path checks
pub mod archive;
/// Bounded history of previous runs
pub mod history;
/// Extract, walk, document and aggregate
pub mod pipeline;
/// Terminal output helpers for the CLI
pub mod cli;
/// Progress bars and spinners
pub mod ui;
/// Usage quotas for the demo key
pub mod demo;
/// Job manager and HTTP routes for the web service
pub mod api;
#[doc(hidden)]
pub mod testing;

// Re-export common types
pub use aggregator::ProjectDocumentSet;
pub use client::{DocumentationClient, GenerationEndpoint};
pub use config::{Config, RunConfig};
pub use error::{DocGenError, Result};
pub use pipeline::{DocumentationPipeline, ProjectSource, RunHandle};
