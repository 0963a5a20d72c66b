use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::StopLoadingParams;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::renderer::errors::RenderError;
use crate::renderer::handle::{RenderBackend, RenderHandle};
use crate::renderer::interceptor::{self, InterceptPolicy};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Process-scoped Chromium instance. Owns the CDP connection and creates the
/// tabs the pool hands out; torn down once at shutdown.
pub struct ChromiumBackend {
    browser: Mutex<Browser>,
    policy: InterceptPolicy,
    shutdown: CancellationToken,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl ChromiumBackend {
    #[instrument(skip_all)]
    pub async fn launch(
        chrome_path: Option<&str>,
        policy: InterceptPolicy,
    ) -> Result<Self, RenderError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .args([
                "--disable-gpu",
                "--disable-dev-shm-usage",
                "--disable-extensions",
                "--disable-background-timer-throttling",
                "--disable-renderer-backgrounding",
                "--no-first-run",
            ]);
        if let Some(path) = chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(RenderError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Browser(e.to_string()))?;
        debug!("browser launched");

        let shutdown = CancellationToken::new();
        let loop_token = shutdown.clone();
        let driver = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    event = handler.next() => match event {
                        Some(Ok(())) => {}
                        Some(Err(e)) => {
                            error!("browser handler failed: {}", e);
                            break;
                        }
                        None => break,
                    }
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            policy,
            shutdown,
            driver: Mutex::new(Some(driver)),
        })
    }

    /// Stop the CDP driver loop and close the browser process.
    pub async fn close(&self) {
        self.shutdown.cancel();
        if let Err(e) = self.browser.lock().await.close().await {
            warn!("browser close failed: {}", e);
        }
        if let Some(driver) = self.driver.lock().await.take() {
            let _ = driver.await;
        }
    }
}

#[async_trait]
impl RenderBackend for ChromiumBackend {
    type Handle = Tab;

    async fn new_handle(&self) -> Result<Tab, RenderError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(RenderError::from_cdp)?;

        page.execute(SetUserAgentOverrideParams::new(USER_AGENT))
            .await
            .map_err(RenderError::from_cdp)?;

        // Bound to the tab for its whole pooled lifetime, before first use.
        interceptor::install(page.clone(), self.policy.clone()).await?;

        let tab = Tab {
            id: Uuid::new_v4(),
            page,
        };
        debug!(id = %tab.id, "rendering handle created");
        Ok(tab)
    }
}

/// One pooled browser tab.
pub struct Tab {
    id: Uuid,
    page: Page,
}

#[async_trait]
impl RenderHandle for Tab {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn render(&self, url: &Url) -> Result<String, RenderError> {
        self.page
            .goto(url.as_str())
            .await
            .map_err(RenderError::from_cdp)?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(RenderError::from_cdp)?;
        self.page.content().await.map_err(RenderError::from_cdp)
    }

    async fn reset(&self) -> Result<(), RenderError> {
        self.page
            .execute(StopLoadingParams::default())
            .await
            .map(|_| ())
            .map_err(RenderError::from_cdp)
    }

    async fn close(&self) -> Result<(), RenderError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(RenderError::from_cdp)
    }
}
