//! pagemill renders JavaScript-heavy web pages in headless Chromium and
//! distills them into GitHub Flavored Markdown.
//!
//! The crate splits into three layers:
//!
//! - [`renderer`]: a launched browser with a fixed pool of tabs, request
//!   interception that aborts decorative resources, and deadline-bounded
//!   navigation.
//! - [`pipeline`]: pure HTML-to-Markdown distillation, usable without a
//!   browser on any HTML string.
//! - [`config`]: environment-driven settings for both layers.
//!
//! ```no_run
//! use pagemill::{config::Config, renderer::Renderer};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let renderer = Renderer::launch(&config).await?;
//! let doc = renderer.render_markdown("https://example.com/").await?;
//! println!("{}", doc.markdown);
//! renderer.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod pipeline;
pub mod renderer;

pub use config::{Config, ConfigError};
pub use pipeline::{MarkdownDocument, PipelineError, extract_markdown, extract_markdown_from};
pub use renderer::{RenderError, RenderedPage, Renderer};

/// Any failure a render-and-distill round trip can produce.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
