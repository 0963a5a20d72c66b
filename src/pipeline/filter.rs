use kuchiki::{NodeRef, Selectors};
use once_cell::sync::Lazy;
use regex::Regex;

/// Tag sets are configuration, not constants: deployments disagree on the
/// exact denylist (`footer` in particular), so the canonical set lives in
/// [`Config`](crate::config::Config).
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Tags removed wherever they appear outside a meaningful container.
    pub denylist: Vec<String>,
    /// Container tags whose descendants are preserved verbatim, however
    /// deeply a denylisted tag is nested inside them.
    pub meaningful_containers: Vec<String>,
    /// Drop inline base64 data URIs to bound output size.
    pub strip_data_uris: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            denylist: ["script", "style", "link", "javascript"]
                .map(String::from)
                .to_vec(),
            meaningful_containers: [
                "pre", "code", "iframe", "template", "object", "svg", "form", "canvas",
            ]
            .map(String::from)
            .to_vec(),
            strip_data_uris: true,
        }
    }
}

/// Remove extraneous markup in place. Two order-sensitive passes: first drop
/// everything whose effective display resolves to `none`, then drop
/// denylisted tags that are not protected by a meaningful container.
/// Re-running the filter on its own output removes nothing further.
pub fn filter(document: &NodeRef, config: &FilterConfig) {
    strip_hidden_elements(document);
    strip_denylisted_tags(document, config);
    if config.strip_data_uris {
        strip_inline_data(document);
    }
}

// ---- visibility pass ----------------------------------------------------

/// Where a display declaration came from, in ascending cascade strength.
/// The `hidden` attribute acts as the weakest layer (a user-agent default),
/// inline style beats sheet rules, `!important` beats both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CascadeRank {
    HiddenAttribute,
    Sheet,
    Inline,
    SheetImportant,
    InlineImportant,
}

struct DisplayRule {
    selectors: Selectors,
    display: String,
    important: bool,
}

static CSS_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

/// Remove every element whose effective display is `none`.
///
/// External stylesheets never load (the interceptor aborts them), so the
/// computed display of a rendered page is fully determined by its embedded
/// `<style>` sheets, inline `style` attributes and the `hidden` attribute.
fn strip_hidden_elements(document: &NodeRef) {
    let rules = collect_display_rules(document);

    let Ok(elements) = document.select("body *") else {
        return;
    };
    let elements: Vec<_> = elements.collect();

    for element in elements {
        let mut display: Option<(CascadeRank, String)> = None;
        let mut apply = |rank: CascadeRank, value: &str| {
            // Later declarations win within the same rank.
            if display.as_ref().is_none_or(|(current, _)| rank >= *current) {
                display = Some((rank, value.to_ascii_lowercase()));
            }
        };

        if element.attributes.borrow().get("hidden").is_some() {
            apply(CascadeRank::HiddenAttribute, "none");
        }
        for rule in &rules {
            if rule.selectors.matches(&element) {
                let rank = if rule.important {
                    CascadeRank::SheetImportant
                } else {
                    CascadeRank::Sheet
                };
                apply(rank, &rule.display);
            }
        }
        if let Some(style) = element.attributes.borrow().get("style")
            && let Some((value, important)) = display_declaration(style)
        {
            let rank = if important {
                CascadeRank::InlineImportant
            } else {
                CascadeRank::Inline
            };
            apply(rank, &value);
        }

        if matches!(display, Some((_, ref value)) if value == "none") {
            element.as_node().detach();
        }
    }
}

fn collect_display_rules(document: &NodeRef) -> Vec<DisplayRule> {
    let mut rules = Vec::new();
    let Ok(sheets) = document.select("style") else {
        return rules;
    };

    for sheet in sheets {
        let css = sheet.text_contents();
        let css = CSS_COMMENT.replace_all(&css, "");
        for block in css.split('}') {
            let Some((selector, declarations)) = block.split_once('{') else {
                continue;
            };
            let selector = selector.trim();
            // At-rule preludes (and the bodies of nested ones) fail to
            // compile as selectors and are skipped.
            if selector.is_empty() || selector.starts_with('@') {
                continue;
            }
            let Some((display, important)) = display_declaration(declarations) else {
                continue;
            };
            if let Ok(selectors) = Selectors::compile(selector) {
                rules.push(DisplayRule {
                    selectors,
                    display,
                    important,
                });
            }
        }
    }
    rules
}

/// Last `display` declaration in a declaration block, with its `!important`
/// flag stripped off the value.
fn display_declaration(declarations: &str) -> Option<(String, bool)> {
    let mut found = None;
    for declaration in declarations.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        if !property.trim().eq_ignore_ascii_case("display") {
            continue;
        }
        let value = value.trim();
        let (value, important) = match value.strip_suffix("!important") {
            Some(stripped) => (stripped.trim(), true),
            None => (value, false),
        };
        found = Some((value.to_ascii_lowercase(), important));
    }
    found
}

// ---- denylist pass ------------------------------------------------------

/// Remove denylisted tags, sparing any with a meaningful container among
/// their ancestors (a `<script>` illustrating usage inside `<pre>` stays).
fn strip_denylisted_tags(document: &NodeRef, config: &FilterConfig) {
    let denylisted: Vec<NodeRef> = document
        .inclusive_descendants()
        .filter(|node| {
            node.as_element()
                .is_some_and(|el| config.denylist.iter().any(|t| t == el.name.local.as_ref()))
        })
        .collect();

    for node in denylisted {
        if !has_meaningful_ancestor(&node, &config.meaningful_containers) {
            node.detach();
        }
    }
}

/// Iterative walk up the parent links. A node with no ancestors has, by
/// definition, no meaningful container.
fn has_meaningful_ancestor(node: &NodeRef, containers: &[String]) -> bool {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if let Some(el) = ancestor.as_element()
            && containers.iter().any(|t| t == el.name.local.as_ref())
        {
            return true;
        }
        current = ancestor.parent();
    }
    false
}

// ---- data URI pass ------------------------------------------------------

static BASE64_DATA_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:[^,]*;base64,").unwrap());

fn strip_inline_data(document: &NodeRef) {
    let Ok(elements) = document.select("[src], [href]") else {
        return;
    };
    for element in elements.collect::<Vec<_>>() {
        let mut attributes = element.attributes.borrow_mut();
        for attr in ["src", "href"] {
            if attributes
                .get(attr)
                .is_some_and(|value| BASE64_DATA_URI.is_match(value))
            {
                attributes.remove(attr);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchiki::traits::TendrilSink;

    fn parse(html: &str) -> NodeRef {
        kuchiki::parse_html().one(html)
    }

    fn body_html(document: &NodeRef) -> String {
        document
            .select_first("body")
            .map(|body| {
                body.as_node()
                    .children()
                    .map(|child| child.to_string())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    #[test]
    fn denylisted_tag_without_protection_is_removed() {
        let doc = parse("<html><body><p>Hello</p><script>alert(1)</script></body></html>");
        filter(&doc, &FilterConfig::default());
        assert_eq!(body_html(&doc).trim(), "<p>Hello</p>");
    }

    #[test]
    fn denylisted_tag_deep_inside_meaningful_container_is_preserved() {
        let doc = parse(
            "<html><body><pre><div><script>example()</script></div></pre>\
             <script>tracker()</script></body></html>",
        );
        filter(&doc, &FilterConfig::default());
        let body = body_html(&doc);
        assert!(body.contains("example()"));
        assert!(!body.contains("tracker()"));
    }

    #[test]
    fn inline_display_none_is_removed() {
        let doc = parse(r#"<html><body><div style="display:none">gone</div><p>kept</p></body></html>"#);
        filter(&doc, &FilterConfig::default());
        let body = body_html(&doc);
        assert!(!body.contains("gone"));
        assert!(body.contains("kept"));
    }

    #[test]
    fn embedded_sheet_display_none_is_removed() {
        let doc = parse(
            "<html><head><style>.banner { color: red; display: none; }</style></head>\
             <body><div class=\"banner\">gone</div><div>kept</div></body></html>",
        );
        filter(&doc, &FilterConfig::default());
        let body = body_html(&doc);
        assert!(!body.contains("gone"));
        assert!(body.contains("kept"));
    }

    #[test]
    fn inline_style_overrides_sheet_rule() {
        let doc = parse(
            "<html><head><style>div { display: none }</style></head>\
             <body><div style=\"display:block\">kept</div></body></html>",
        );
        filter(&doc, &FilterConfig::default());
        assert!(body_html(&doc).contains("kept"));
    }

    #[test]
    fn important_sheet_rule_overrides_inline_style() {
        let doc = parse(
            "<html><head><style>div { display: none !important }</style></head>\
             <body><div style=\"display:block\">gone</div></body></html>",
        );
        filter(&doc, &FilterConfig::default());
        assert!(!body_html(&doc).contains("gone"));
    }

    #[test]
    fn hidden_attribute_counts_as_display_none() {
        let doc = parse("<html><body><span hidden>gone</span><span>kept</span></body></html>");
        filter(&doc, &FilterConfig::default());
        let body = body_html(&doc);
        assert!(!body.contains("gone"));
        assert!(body.contains("kept"));
    }

    #[test]
    fn filtering_is_idempotent() {
        let doc = parse(
            "<html><head><style>.x{display:none}</style></head>\
             <body><p class=\"x\">gone</p><p>kept</p>\
             <script>a()</script><pre><script>b()</script></pre></body></html>",
        );
        let config = FilterConfig::default();
        filter(&doc, &config);
        let first = doc.to_string();
        filter(&doc, &config);
        assert_eq!(doc.to_string(), first);
    }

    #[test]
    fn base64_data_uris_are_stripped() {
        let doc = parse(
            r#"<html><body><img src="data:image/png;base64,iVBORw0KGgo="> <a href="/x">link</a></body></html>"#,
        );
        filter(&doc, &FilterConfig::default());
        let body = body_html(&doc);
        assert!(!body.contains("base64"));
        assert!(body.contains("href=\"/x\""));
    }

    #[test]
    fn configured_footer_denylisting_is_honored() {
        let mut config = FilterConfig::default();
        config.denylist.push("footer".to_string());
        let doc = parse("<html><body><p>kept</p><footer>site footer</footer></body></html>");
        filter(&doc, &config);
        assert!(!body_html(&doc).contains("site footer"));
    }
}
