use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::renderer::errors::RenderError;

/// One reusable rendering context, a browser tab equivalent. Handles outlive
/// many requests; everything else in a request is scoped to that request.
#[async_trait]
pub trait RenderHandle: Send + Sync + 'static {
    fn id(&self) -> Uuid;

    /// Navigate to `url`, wait for the load-complete signal and return the
    /// fully rendered outer HTML of the document root.
    async fn render(&self, url: &Url) -> Result<String, RenderError>;

    /// Abort any in-flight navigation. Called before a handle goes back to
    /// the idle set so the next borrower never observes residual network
    /// activity from the previous request.
    async fn reset(&self) -> Result<(), RenderError>;

    /// Permanently discard the handle. Only used when the handle is broken
    /// and about to be replaced.
    async fn close(&self) -> Result<(), RenderError>;
}

/// Creates rendering handles. The pool uses this both for the eager startup
/// fill and for lazily replacing broken handles.
#[async_trait]
pub trait RenderBackend: Send + Sync + 'static {
    type Handle: RenderHandle;

    async fn new_handle(&self) -> Result<Self::Handle, RenderError>;
}

/// Raw outcome of one navigation, with elapsed time for observability.
#[derive(Debug)]
pub struct FetchResult {
    pub html: String,
    pub elapsed: Duration,
    pub fetched_at: DateTime<Utc>,
}

/// Rendered page handed back to the caller of [`Renderer::render_page`].
///
/// [`Renderer::render_page`]: crate::renderer::Renderer::render_page
#[derive(Debug)]
pub struct RenderedPage {
    pub url: Url,
    pub html: String,
    pub elapsed: Duration,
    pub fetched_at: DateTime<Utc>,
}
