pub mod article;
pub mod errors;
pub mod filter;
pub mod markdown;

#[cfg(test)]
mod tests;

pub use article::{ExtractedArticle, ExtractionStrategy, FilteredBody, ReadabilityGated};
pub use errors::PipelineError;
pub use filter::FilterConfig;

use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

/// Base used to resolve relative links when the caller has only raw HTML
/// and no origin for it.
static DEFAULT_BASE: Lazy<Url> =
    Lazy::new(|| Url::parse("http://localhost/").expect("default base url"));

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub filter: FilterConfig,
}

/// Final output handed back to the caller; not retained by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownDocument {
    pub title: Option<String>,
    pub markdown: String,
}

/// Filter, extract and convert raw page HTML to Markdown.
pub fn extract_markdown(
    html: &str,
    config: &PipelineConfig,
) -> Result<MarkdownDocument, PipelineError> {
    extract_markdown_from(html, &DEFAULT_BASE, config)
}

/// Same, with the page's real URL so relative links resolve correctly.
#[instrument(skip(html, config), fields(bytes = html.len()))]
pub fn extract_markdown_from(
    html: &str,
    base: &Url,
    config: &PipelineConfig,
) -> Result<MarkdownDocument, PipelineError> {
    extract_markdown_with(html, base, config, &ReadabilityGated::default())
}

/// Full pipeline with a caller-chosen extraction strategy. Synchronous and
/// CPU-bound end to end; every entity it builds is request-scoped.
pub fn extract_markdown_with(
    html: &str,
    base: &Url,
    config: &PipelineConfig,
    strategy: &dyn ExtractionStrategy,
) -> Result<MarkdownDocument, PipelineError> {
    let document = parse_document(html)?;
    filter::filter(&document, &config.filter);
    let article = strategy.extract(&document, base)?;
    let markdown = markdown::convert_fragment(&article.html);

    Ok(MarkdownDocument {
        title: article.title,
        markdown,
    })
}

fn parse_document(html: &str) -> Result<NodeRef, PipelineError> {
    if html.trim().is_empty() {
        return Err(PipelineError::Parse("empty document".into()));
    }
    let document = kuchiki::parse_html().one(html);
    if document.select_first("body").is_err() {
        return Err(PipelineError::Parse("document has no body".into()));
    }
    Ok(document)
}
