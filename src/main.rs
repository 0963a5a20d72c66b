use anyhow::{Context, Result};
use pagemill::{config::Config, renderer::Renderer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let url = std::env::args()
        .nth(1)
        .context("usage: pagemill <url>")?;

    let renderer = Renderer::launch(&config).await?;
    let result = renderer.render_markdown(&url).await;
    renderer.close().await;

    let doc = result?;
    if let Some(title) = &doc.title {
        tracing::info!(title, "page distilled");
    }
    println!("{}", doc.markdown);

    Ok(())
}
