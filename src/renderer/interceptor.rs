use std::collections::HashSet;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::renderer::errors::RenderError;

/// Sub-resource classes a rendered page can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    Xhr,
    Fetch,
    Websocket,
    Other,
}

impl ResourceKind {
    pub fn from_cdp(resource_type: &ResourceType) -> Self {
        match resource_type {
            ResourceType::Document => Self::Document,
            ResourceType::Stylesheet => Self::Stylesheet,
            ResourceType::Image => Self::Image,
            ResourceType::Media => Self::Media,
            ResourceType::Font => Self::Font,
            ResourceType::Script => Self::Script,
            ResourceType::Xhr => Self::Xhr,
            ResourceType::Fetch => Self::Fetch,
            ResourceType::WebSocket => Self::Websocket,
            _ => Self::Other,
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "document" => Some(Self::Document),
            "stylesheet" => Some(Self::Stylesheet),
            "image" => Some(Self::Image),
            "media" => Some(Self::Media),
            "font" => Some(Self::Font),
            "script" => Some(Self::Script),
            "xhr" => Some(Self::Xhr),
            "fetch" => Some(Self::Fetch),
            "websocket" => Some(Self::Websocket),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Network policy bound to a handle for its entire pooled lifetime: requests
/// of a blocked kind are aborted, everything else continues. The primary
/// document, scripts and XHR/fetch calls stay allowed so JavaScript-driven
/// content assembly keeps working.
#[derive(Debug, Clone)]
pub struct InterceptPolicy {
    blocked: HashSet<ResourceKind>,
}

impl InterceptPolicy {
    pub fn new(blocked: HashSet<ResourceKind>) -> Self {
        Self { blocked }
    }

    pub fn should_abort(&self, kind: ResourceKind) -> bool {
        self.blocked.contains(&kind)
    }
}

impl Default for InterceptPolicy {
    fn default() -> Self {
        Self::new(HashSet::from([
            ResourceKind::Image,
            ResourceKind::Stylesheet,
            ResourceKind::Font,
        ]))
    }
}

/// Install the policy on a tab. Must run once, before the tab serves its
/// first request. Enables the CDP Fetch domain and spawns a task that
/// answers every paused request for as long as the tab lives.
pub async fn install(page: Page, policy: InterceptPolicy) -> Result<(), RenderError> {
    page.execute(EnableParams::default())
        .await
        .map_err(RenderError::from_cdp)?;

    let mut requests = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(RenderError::from_cdp)?;

    tokio::spawn(async move {
        while let Some(event) = requests.next().await {
            let kind = ResourceKind::from_cdp(&event.resource_type);
            let request_id = event.request_id.clone();

            let outcome = if policy.should_abort(kind) {
                trace!(url = %event.request.url, ?kind, "aborting sub-resource request");
                page.execute(FailRequestParams::new(request_id, ErrorReason::Aborted))
                    .await
                    .map(|_| ())
            } else {
                page.execute(ContinueRequestParams::new(request_id))
                    .await
                    .map(|_| ())
            };

            // A verdict can race tab navigation; the request is simply gone.
            if let Err(e) = outcome {
                debug!(url = %event.request.url, "interception verdict not delivered: {}", e);
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_blocks_decoration_only() {
        let policy = InterceptPolicy::default();

        assert!(policy.should_abort(ResourceKind::Image));
        assert!(policy.should_abort(ResourceKind::Stylesheet));
        assert!(policy.should_abort(ResourceKind::Font));

        assert!(!policy.should_abort(ResourceKind::Document));
        assert!(!policy.should_abort(ResourceKind::Script));
        assert!(!policy.should_abort(ResourceKind::Xhr));
        assert!(!policy.should_abort(ResourceKind::Fetch));
        assert!(!policy.should_abort(ResourceKind::Websocket));
    }

    #[test]
    fn resource_kind_parses_config_labels() {
        assert_eq!(ResourceKind::parse("image"), Some(ResourceKind::Image));
        assert_eq!(ResourceKind::parse(" Font "), Some(ResourceKind::Font));
        assert_eq!(ResourceKind::parse("bogus"), None);
    }

    #[test]
    fn cdp_mapping_covers_blockable_kinds() {
        assert_eq!(
            ResourceKind::from_cdp(&ResourceType::Image),
            ResourceKind::Image
        );
        assert_eq!(
            ResourceKind::from_cdp(&ResourceType::Stylesheet),
            ResourceKind::Stylesheet
        );
        assert_eq!(
            ResourceKind::from_cdp(&ResourceType::Font),
            ResourceKind::Font
        );
        assert_eq!(
            ResourceKind::from_cdp(&ResourceType::Ping),
            ResourceKind::Other
        );
    }
}
