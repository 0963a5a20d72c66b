//! Structural HTML to GitHub-flavored-Markdown conversion.
//!
//! A pure function of the input tree: no network, no pool, and total for
//! any parseable fragment. Unknown elements degrade to their children
//! rather than failing.

use kuchiki::NodeRef;
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\n]+").unwrap());
static BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]+$").unwrap());
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Convert an HTML fragment to Markdown.
pub fn convert_fragment(html: &str) -> String {
    use kuchiki::traits::TendrilSink;

    let document = kuchiki::parse_html().one(html);
    let root = document
        .select_first("body")
        .map(|body| body.as_node().clone())
        .unwrap_or(document);

    normalize(&render_children(&root))
}

fn render_children(node: &NodeRef) -> String {
    node.children().map(|child| render_node(&child)).collect()
}

fn render_node(node: &NodeRef) -> String {
    if let Some(text) = node.as_text() {
        return WHITESPACE_RUN
            .replace_all(text.borrow().as_str(), " ")
            .into_owned();
    }
    let Some(element) = node.as_element() else {
        // Comments, doctypes, processing instructions.
        return String::new();
    };

    let name = element.name.local.as_ref();
    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            block(format!("{} {}", "#".repeat(level), inline(node)))
        }
        "p" => block(render_children(node).trim().to_string()),
        "br" => "  \n".to_string(),
        "hr" => block("---".to_string()),
        "em" | "i" => wrap(node, "*"),
        "strong" | "b" => wrap(node, "**"),
        "del" | "s" | "strike" => wrap(node, "~~"),
        "code" => inline_code(node),
        "a" => link(node),
        "img" => image(node),
        "ul" => render_list(node, false),
        "ol" => render_list(node, true),
        "blockquote" => blockquote(node),
        "pre" => code_block(node),
        "table" => render_table(node),
        // Checkboxes are rendered by their list item; everything else a
        // form control carries has no Markdown shape.
        "input" | "button" | "select" | "textarea" => String::new(),
        "head" | "script" | "style" | "title" | "template" => String::new(),
        _ => render_children(node),
    }
}

/// Children rendered onto a single line, for headings and table cells.
fn inline(node: &NodeRef) -> String {
    WHITESPACE_RUN
        .replace_all(render_children(node).trim(), " ")
        .into_owned()
}

fn block(content: String) -> String {
    if content.is_empty() {
        String::new()
    } else {
        format!("\n\n{content}\n\n")
    }
}

fn wrap(node: &NodeRef, marker: &str) -> String {
    let content = render_children(node);
    let trimmed = content.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{marker}{trimmed}{marker}")
    }
}

fn inline_code(node: &NodeRef) -> String {
    let content = node.text_contents();
    let content = content.trim();
    if content.is_empty() {
        String::new()
    } else if content.contains('`') {
        format!("`` {content} ``")
    } else {
        format!("`{content}`")
    }
}

fn link(node: &NodeRef) -> String {
    let label = inline(node);
    let href = node
        .as_element()
        .and_then(|el| el.attributes.borrow().get("href").map(String::from));
    match href {
        Some(href) if !href.is_empty() => format!("[{label}]({href})"),
        _ => label,
    }
}

fn image(node: &NodeRef) -> String {
    let Some(element) = node.as_element() else {
        return String::new();
    };
    let attributes = element.attributes.borrow();
    let Some(src) = attributes.get("src").filter(|src| !src.is_empty()) else {
        return String::new();
    };
    let alt = attributes.get("alt").unwrap_or_default();
    format!("![{alt}]({src})")
}

fn blockquote(node: &NodeRef) -> String {
    let inner = normalize(&render_children(node));
    if inner.is_empty() {
        return String::new();
    }
    let quoted = inner
        .lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    block(quoted)
}

fn code_block(node: &NodeRef) -> String {
    let content = node.text_contents();
    let content = content.trim_matches('\n');
    let language = node
        .select_first("code")
        .ok()
        .and_then(|code| {
            code.attributes.borrow().get("class").and_then(|classes| {
                classes
                    .split_whitespace()
                    .find_map(|class| {
                        class
                            .strip_prefix("language-")
                            .or_else(|| class.strip_prefix("lang-"))
                            .map(String::from)
                    })
            })
        })
        .unwrap_or_default();

    // A wider fence keeps fragments that themselves contain fences intact.
    let fence = if content.contains("```") { "````" } else { "```" };
    block(format!("{fence}{language}\n{content}\n{fence}"))
}

fn render_list(node: &NodeRef, ordered: bool) -> String {
    let mut items = Vec::new();
    let mut index = 1usize;

    for child in node.children() {
        let Some(element) = child.as_element() else {
            continue;
        };
        if element.name.local.as_ref() != "li" {
            continue;
        }

        let marker = if ordered {
            let marker = format!("{index}. ");
            index += 1;
            marker
        } else {
            "- ".to_string()
        };
        let checkbox = task_checkbox(&child)
            .map(|checked| if checked { "[x] " } else { "[ ] " })
            .unwrap_or_default();

        let content = normalize(&render_children(&child));
        let mut lines = content.lines();
        let first = lines.next().unwrap_or_default().to_string();
        let mut item = format!("{marker}{checkbox}{first}");
        for line in lines.filter(|line| !line.is_empty()) {
            item.push('\n');
            item.push_str("    ");
            item.push_str(line);
        }
        items.push(item);
    }

    if items.is_empty() {
        String::new()
    } else {
        block(items.join("\n"))
    }
}

/// GFM task-list state, if this item leads with a checkbox input.
fn task_checkbox(li: &NodeRef) -> Option<bool> {
    let first = li.children().find(|child| {
        child.as_element().is_some()
            || child
                .as_text()
                .is_some_and(|text| !text.borrow().trim().is_empty())
    })?;
    let element = first.as_element()?;
    if element.name.local.as_ref() != "input" {
        return None;
    }
    let attributes = element.attributes.borrow();
    if attributes
        .get("type")
        .is_some_and(|t| t.eq_ignore_ascii_case("checkbox"))
    {
        Some(attributes.get("checked").is_some())
    } else {
        None
    }
}

fn render_table(node: &NodeRef) -> String {
    let Ok(row_nodes) = node.select("tr") else {
        return String::new();
    };

    let mut rows: Vec<Vec<String>> = Vec::new();
    for row in row_nodes {
        let mut cells = Vec::new();
        for child in row.as_node().children() {
            let Some(element) = child.as_element() else {
                continue;
            };
            if matches!(element.name.local.as_ref(), "td" | "th") {
                cells.push(inline(&child).replace('|', "\\|"));
            }
        }
        if !cells.is_empty() {
            rows.push(cells);
        }
    }
    if rows.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    let header = &rows[0];
    out.push_str(&format!("| {} |", header.join(" | ")));
    out.push('\n');
    out.push_str(&format!(
        "| {} |",
        vec!["---"; header.len()].join(" | ")
    ));
    for row in &rows[1..] {
        out.push('\n');
        out.push_str(&format!("| {} |", row.join(" | ")));
    }
    block(out)
}

fn normalize(markdown: &str) -> String {
    let cleaned = BLANK_LINE.replace_all(markdown, "");
    EXCESS_NEWLINES
        .replace_all(&cleaned, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_and_paragraphs() {
        let md = convert_fragment("<h1>Title</h1><p>First.</p><h2>Sub</h2><p>Second.</p>");
        assert_eq!(md, "# Title\n\nFirst.\n\n## Sub\n\nSecond.");
    }

    #[test]
    fn emphasis_links_and_images() {
        let md = convert_fragment(
            r#"<p>Go <strong>fast</strong>, stay <em>calm</em>, see <a href="https://example.com">docs</a> <img src="/a.png" alt="pic"></p>"#,
        );
        assert_eq!(
            md,
            "Go **fast**, stay *calm*, see [docs](https://example.com) ![pic](/a.png)"
        );
    }

    #[test]
    fn strikethrough_is_gfm() {
        let md = convert_fragment("<p>It is <del>wrong</del> right.</p>");
        assert_eq!(md, "It is ~~wrong~~ right.");
    }

    #[test]
    fn unordered_and_ordered_lists() {
        let md = convert_fragment("<ul><li>one</li><li>two</li></ul><ol><li>a</li><li>b</li></ol>");
        assert_eq!(md, "- one\n- two\n\n1. a\n2. b");
    }

    #[test]
    fn nested_list_is_indented() {
        let md = convert_fragment("<ul><li>outer<ul><li>inner</li></ul></li></ul>");
        assert_eq!(md, "- outer\n    - inner");
    }

    #[test]
    fn task_list_checkboxes() {
        let md = convert_fragment(
            r#"<ul><li><input type="checkbox" checked>done</li><li><input type="checkbox">todo</li></ul>"#,
        );
        assert_eq!(md, "- [x] done\n- [ ] todo");
    }

    #[test]
    fn blockquote_prefixes_every_line() {
        let md = convert_fragment("<blockquote><p>first</p><p>second</p></blockquote>");
        assert_eq!(md, "> first\n>\n> second");
    }

    #[test]
    fn fenced_code_block_preserves_content_verbatim() {
        let md = convert_fragment(
            "<pre><code class=\"language-rust\">fn main() {\n    println!(\"hi\");\n}</code></pre>",
        );
        assert_eq!(
            md,
            "```rust\nfn main() {\n    println!(\"hi\");\n}\n```"
        );
    }

    #[test]
    fn inline_code() {
        let md = convert_fragment("<p>Run <code>cargo test</code> now.</p>");
        assert_eq!(md, "Run `cargo test` now.");
    }

    #[test]
    fn table_preserves_rows_and_columns() {
        let md = convert_fragment(
            "<table><thead><tr><th>Name</th><th>Age</th></tr></thead>\
             <tbody><tr><td>Ada</td><td>36</td></tr><tr><td>Alan</td><td>41</td></tr></tbody></table>",
        );
        assert_eq!(
            md,
            "| Name | Age |\n| --- | --- |\n| Ada | 36 |\n| Alan | 41 |"
        );

        // Row and column counts survive a round trip through the pipe syntax.
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|l| l.matches('|').count() == 3));
    }

    #[test]
    fn pipes_in_cells_are_escaped() {
        let md = convert_fragment("<table><tr><td>a|b</td><td>c</td></tr></table>");
        assert_eq!(md, "| a\\|b | c |\n| --- | --- |");
    }

    #[test]
    fn unknown_elements_degrade_to_children() {
        let md = convert_fragment("<section><custom-widget><p>content</p></custom-widget></section>");
        assert_eq!(md, "content");
    }

    #[test]
    fn minimal_body_yields_bare_text() {
        let md = convert_fragment("<p>Hello</p>");
        assert_eq!(md, "Hello");
    }

    #[test]
    fn never_panics_on_malformed_structure() {
        for html in [
            "",
            "<td>stray cell</td>",
            "<ul><p>not an item</p></ul>",
            "<table><div>junk</div></table>",
            "<a>no href</a><img>",
            "<pre></pre><code></code>",
        ] {
            let _ = convert_fragment(html);
        }
    }
}
