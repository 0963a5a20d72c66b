use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, instrument};
use url::Url;

use crate::renderer::errors::RenderError;
use crate::renderer::handle::{FetchResult, RenderHandle};

/// Drive one handle to load `url` under a hard deadline and read back the
/// fully rendered outer HTML. Performs no pool bookkeeping: the caller owns
/// the handle and must return it whatever the outcome here.
#[instrument(skip(handle), fields(handle = %handle.id(), url = %url))]
pub async fn load<H: RenderHandle>(
    handle: &H,
    url: &Url,
    deadline: Duration,
) -> Result<FetchResult, RenderError> {
    let started = Instant::now();

    let html = match tokio::time::timeout(deadline, handle.render(url)).await {
        Err(_) => return Err(RenderError::NavigationTimeout(deadline)),
        Ok(Err(e)) => return Err(e),
        Ok(Ok(html)) => html,
    };

    let elapsed = started.elapsed();
    info!(elapsed_ms = elapsed.as_millis() as u64, "page loaded");

    Ok(FetchResult {
        html,
        elapsed,
        fetched_at: Utc::now(),
    })
}
