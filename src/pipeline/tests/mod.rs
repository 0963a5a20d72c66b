use std::fs;

use crate::pipeline::{
    FilteredBody, PipelineConfig, PipelineError, ReadabilityGated, extract_markdown,
    extract_markdown_with,
};
use url::Url;

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("src/pipeline/tests/fixtures/{name}"))
        .expect("failed to read test fixture")
}

#[test]
fn trivial_page_renders_to_bare_text() {
    let html = "<html><body><p>Hello</p><script>alert(1)</script></body></html>";
    let doc = extract_markdown(html, &PipelineConfig::default()).unwrap();

    // Too short for the readability gate, so the filtered body comes back
    // as-is and converts to a single word.
    assert_eq!(doc.markdown, "Hello");
}

#[test]
fn article_page_goes_through_full_extraction() {
    let html = fixture("article.html");
    let doc = extract_markdown(&html, &PipelineConfig::default()).unwrap();

    assert!(
        doc.title
            .as_deref()
            .is_some_and(|t| t.contains("Container Gardening"))
    );
    assert!(doc.markdown.contains("drainage matters"));
    assert!(doc.markdown.contains("six to eight hours"));

    // Nothing fabricated, nothing from the removed markup.
    assert!(!doc.markdown.contains("analytics"));
    assert!(!doc.markdown.contains("We use cookies"));
    assert!(!doc.markdown.contains("Subscribe to our newsletter"));
}

#[test]
fn article_extraction_output_is_a_subset_of_the_input_text() {
    let html = fixture("article.html");
    let doc = extract_markdown(&html, &PipelineConfig::default()).unwrap();

    for word in doc.markdown.split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if !word.is_empty() {
            assert!(html.contains(word), "fabricated text in output: {word}");
        }
    }
}

#[test]
fn gfm_constructs_survive_the_whole_pipeline() {
    let html = fixture("widgets.html");
    let doc = extract_markdown(&html, &PipelineConfig::default()).unwrap();

    assert!(doc.markdown.contains("# Release Checklist"));
    assert!(doc.markdown.contains("~~due Friday~~"));
    assert!(doc.markdown.contains("- [x] Tag the release"));
    assert!(doc.markdown.contains("- [ ] Update the changelog"));
    assert!(doc.markdown.contains("| Platform | Status |"));
    assert!(doc.markdown.contains("| Linux | passing |"));
    assert!(doc.markdown.contains("```html"));
    assert!(doc.markdown.contains(r#"<script src="widget.js">"#));

    // The live script outside the code example is gone.
    assert!(!doc.markdown.contains("loadBuildBadges"));
}

#[test]
fn empty_input_is_a_parse_error() {
    let result = extract_markdown("   ", &PipelineConfig::default());
    assert!(matches!(result, Err(PipelineError::Parse(_))));
}

#[test]
fn hidden_content_never_reaches_the_markdown() {
    let html = "<html><head><style>.gone { display: none }</style></head>\
                <body><p class=\"gone\">secret</p><p>visible</p></body></html>";
    let doc = extract_markdown(html, &PipelineConfig::default()).unwrap();

    assert_eq!(doc.markdown, "visible");
}

#[test]
fn strategies_are_swappable_without_changing_the_pipeline_shape() {
    let html = fixture("widgets.html");
    let base = Url::parse("https://example.com/").unwrap();
    let config = PipelineConfig::default();

    let gated = extract_markdown_with(&html, &base, &config, &ReadabilityGated::default()).unwrap();
    let plain = extract_markdown_with(&html, &base, &config, &FilteredBody).unwrap();

    // This page fails the gate, so both strategies land on the same body.
    assert_eq!(gated.markdown, plain.markdown);
}
