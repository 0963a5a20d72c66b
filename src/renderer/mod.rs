pub mod chromium;
pub mod errors;
pub mod handle;
pub mod interceptor;
pub mod navigator;
pub mod pool;

pub use chromium::{ChromiumBackend, Tab};
pub use errors::RenderError;
pub use handle::{FetchResult, RenderBackend, RenderHandle, RenderedPage};
pub use interceptor::{InterceptPolicy, ResourceKind};
pub use pool::{AcquireMode, HandleHealth, HandlePool, PoolConfig, PooledHandle};

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;
use url::Url;

use crate::config::Config;
use crate::pipeline::{self, MarkdownDocument, PipelineConfig};

/// Process-scoped rendering owner: one launched browser plus the fixed pool
/// of tabs on top of it. Construct once at startup, pass by reference into
/// whatever serves requests, close at shutdown.
pub struct Renderer {
    backend: Arc<ChromiumBackend>,
    pool: HandlePool<ChromiumBackend>,
    nav_timeout: Duration,
    pipeline: PipelineConfig,
}

impl Renderer {
    pub async fn launch(config: &Config) -> Result<Self, RenderError> {
        let policy = InterceptPolicy::new(config.blocked_resources().clone());
        let backend = Arc::new(ChromiumBackend::launch(config.chrome_path(), policy).await?);
        let pool = HandlePool::initialize(Arc::clone(&backend), config.pool()).await?;

        Ok(Self {
            backend,
            pool,
            nav_timeout: config.nav_timeout(),
            pipeline: PipelineConfig {
                filter: config.filter(),
            },
        })
    }

    /// Render `url` in a pooled tab and return its fully executed HTML.
    #[instrument(skip(self))]
    pub async fn render_page(&self, url: &str) -> Result<RenderedPage, RenderError> {
        let url = Url::parse(url)?;
        let fetched = render_with_pool(&self.pool, &url, self.nav_timeout).await?;

        Ok(RenderedPage {
            url,
            html: fetched.html,
            elapsed: fetched.elapsed,
            fetched_at: fetched.fetched_at,
        })
    }

    /// Render `url` and distill the result straight to Markdown. The
    /// distillation is CPU-bound, so it runs on the blocking pool to keep
    /// the runtime's worker threads free for other navigations.
    #[instrument(skip(self))]
    pub async fn render_markdown(&self, url: &str) -> Result<MarkdownDocument, crate::Error> {
        let page = self.render_page(url).await?;
        let config = self.pipeline.clone();
        let doc = tokio::task::spawn_blocking(move || {
            pipeline::extract_markdown_from(&page.html, &page.url, &config)
        })
        .await
        .map_err(|e| RenderError::Browser(format!("distillation task failed: {e}")))??;

        Ok(doc)
    }

    pub fn pool(&self) -> &HandlePool<ChromiumBackend> {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.shutdown().await;
        self.backend.close().await;
    }
}

/// The per-request state machine over any backend: acquire, navigate,
/// release. Release runs on every path, with the navigation outcome recorded
/// on the handle first so the pool knows whether to reset or replace it.
async fn render_with_pool<B: RenderBackend>(
    pool: &HandlePool<B>,
    url: &Url,
    deadline: Duration,
) -> Result<FetchResult, RenderError> {
    let mut guard = pool.acquire().await?;

    let outcome = navigator::load(&*guard, url, deadline).await;
    if let Err(ref e) = outcome {
        guard.record_failure(e);
    }
    guard.release().await;

    outcome
}
