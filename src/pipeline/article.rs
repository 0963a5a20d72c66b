use kuchiki::NodeRef;
use once_cell::sync::Lazy;
use readability::extractor;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::pipeline::errors::PipelineError;

/// Main-content fragment produced by an extraction strategy, consumed only
/// by the Markdown converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedArticle {
    pub title: Option<String>,
    pub html: String,
}

/// Replaceable extraction capability: strategies decide how the main
/// content region of a filtered document is chosen.
pub trait ExtractionStrategy: Send + Sync {
    fn extract(&self, document: &NodeRef, base: &Url) -> Result<ExtractedArticle, PipelineError>;
}

/// Fallback strategy: the filtered body's inner markup, verbatim.
pub struct FilteredBody;

impl ExtractionStrategy for FilteredBody {
    fn extract(&self, document: &NodeRef, _base: &Url) -> Result<ExtractedArticle, PipelineError> {
        let body = document
            .select_first("body")
            .map_err(|()| PipelineError::Extraction("document has no body".into()))?;

        let html = body
            .as_node()
            .children()
            .map(|child| child.to_string())
            .collect::<String>();

        Ok(ExtractedArticle {
            title: document_title(document),
            html,
        })
    }
}

/// Default strategy: a readability heuristic acts as a binary gate. Pages
/// that look article-shaped get full readability extraction; everything
/// else falls back to the filtered body. Never a blend of the two.
pub struct ReadabilityGated {
    /// Candidate nodes shorter than this contribute nothing.
    pub min_candidate_length: usize,
    /// Accumulated score above which the document counts as an article.
    pub min_score: f64,
}

impl Default for ReadabilityGated {
    fn default() -> Self {
        Self {
            min_candidate_length: 140,
            min_score: 20.0,
        }
    }
}

static UNLIKELY_CANDIDATES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "(?i)-ad-|ai2html|banner|breadcrumbs|combx|comment|community|cover-wrap|disqus|extra|\
         footer|gdpr|header|legends|menu|related|remark|replies|rpl|rss|shoutbox|sidebar|\
         skyscraper|social|sponsor|supplemental|ad-break|agegate|pagination|pager|popup|yom-remote",
    )
    .unwrap()
});

static MAYBE_CANDIDATES: Lazy<Regex> =
    Lazy::new(|| Regex::new("(?i)and|article|body|column|content|main|shadow").unwrap());

impl ReadabilityGated {
    /// Score the document for "is this structured like an article": sum
    /// `sqrt(len - min)` over paragraph-like candidates, skipping nodes whose
    /// class/id mark them as boilerplate, until the score clears the gate.
    pub fn probably_readerable(&self, document: &NodeRef) -> bool {
        let Ok(nodes) = document.select("p, pre, article, div > br") else {
            return false;
        };

        let mut visited: Vec<NodeRef> = Vec::new();
        let mut score = 0.0f64;

        for node in nodes {
            let candidate = if node.name.local.as_ref() == "br" {
                match node.as_node().parent() {
                    Some(parent) => parent,
                    None => continue,
                }
            } else {
                node.as_node().clone()
            };
            if visited.contains(&candidate) {
                continue;
            }
            visited.push(candidate.clone());

            let Some(element) = candidate.as_element() else {
                continue;
            };
            let attributes = element.attributes.borrow();
            let match_string = format!(
                "{} {}",
                attributes.get("class").unwrap_or_default(),
                attributes.get("id").unwrap_or_default()
            );
            drop(attributes);
            if UNLIKELY_CANDIDATES.is_match(&match_string)
                && !MAYBE_CANDIDATES.is_match(&match_string)
            {
                continue;
            }
            if element.name.local.as_ref() == "p" && has_list_ancestor(&candidate) {
                continue;
            }

            let text_len = candidate.text_contents().trim().chars().count();
            if text_len < self.min_candidate_length {
                continue;
            }
            score += ((text_len - self.min_candidate_length) as f64).sqrt();
            if score > self.min_score {
                return true;
            }
        }
        false
    }
}

impl ExtractionStrategy for ReadabilityGated {
    fn extract(&self, document: &NodeRef, base: &Url) -> Result<ExtractedArticle, PipelineError> {
        if self.probably_readerable(document) {
            let html = document.to_string();
            match extractor::extract(&mut html.as_bytes(), base) {
                Ok(product) => {
                    debug!("readability gate positive, article region extracted");
                    return Ok(ExtractedArticle {
                        title: non_empty(product.title),
                        html: product.content,
                    });
                }
                Err(e) => {
                    debug!("readability extraction failed, using filtered body: {}", e);
                }
            }
        }
        FilteredBody.extract(document, base)
    }
}

fn has_list_ancestor(node: &NodeRef) -> bool {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if let Some(el) = ancestor.as_element()
            && matches!(el.name.local.as_ref(), "li" | "ol" | "ul")
        {
            return true;
        }
        current = ancestor.parent();
    }
    false
}

fn document_title(document: &NodeRef) -> Option<String> {
    let title = document.select_first("title").ok()?;
    non_empty(title.text_contents())
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
