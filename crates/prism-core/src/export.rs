//! HTML and Markdown projections of a document
//!
//! Both exports are lossy: spatial positions, edge nodes and metadata are
//! dropped. JSON export goes through [`crate::tree::serialize_pretty`].

use crate::document::Document;
use crate::node::{AstNode, NodeType};

// ==================== HTML ====================

/// Render the document as an HTML fragment wrapped in `<article>`
pub fn to_html(doc: &Document) -> String {
    let mut out = format!("<article id=\"{}\">\n", escape_html(&doc.id));
    if let Some(title) = &doc.title {
        out.push_str(&format!("<header>{}</header>\n", escape_html(title)));
    }
    for block in doc.blocks() {
        let html = node_html(block);
        if !html.is_empty() {
            out.push_str(&html);
            out.push('\n');
        }
    }
    out.push_str("</article>\n");
    out
}

fn node_html(node: &AstNode) -> String {
    let inner = || {
        let mut html = node
            .content
            .as_deref()
            .map(escape_html)
            .unwrap_or_default();
        for child in &node.children {
            html.push_str(&node_html(child));
        }
        html
    };
    let class_div = |class: &str| format!("<div class=\"{}\">{}</div>", class, inner());

    match node.node_type {
        NodeType::Paragraph => format!("<p>{}</p>", inner()),
        NodeType::Heading => {
            let level = heading_level(node);
            format!("<h{level}>{}</h{level}>", inner())
        }
        NodeType::Text => inner(),
        NodeType::List => {
            let tag = if node.attribute_bool("ordered").unwrap_or(false) {
                "ol"
            } else {
                "ul"
            };
            format!("<{tag}>{}</{tag}>", inner())
        }
        NodeType::ListItem => format!("<li>{}</li>", inner()),
        NodeType::Blockquote => format!("<blockquote>{}</blockquote>", inner()),
        NodeType::CodeBlock => {
            let code = escape_html(&node.text_content());
            match node.attribute_str("language") {
                Some(lang) => format!(
                    "<pre><code class=\"language-{}\">{}</code></pre>",
                    escape_html(lang),
                    code
                ),
                None => format!("<pre><code>{}</code></pre>", code),
            }
        }
        NodeType::Link => format!(
            "<a href=\"{}\">{}</a>",
            escape_html(node.attribute_str("href").unwrap_or("#")),
            inner()
        ),
        NodeType::Divider => "<hr>".to_string(),
        NodeType::Table => format!("<table>{}</table>", inner()),
        NodeType::TableRow => format!("<tr>{}</tr>", inner()),
        NodeType::TableCell => format!("<td>{}</td>", inner()),
        NodeType::Image => format!(
            "<img src=\"{}\" alt=\"{}\">",
            escape_html(node.attribute_str("src").unwrap_or_default()),
            escape_html(node.content.as_deref().unwrap_or_default())
        ),
        NodeType::Video => format!(
            "<video src=\"{}\" controls></video>",
            escape_html(node.attribute_str("src").unwrap_or_default())
        ),
        NodeType::Media => format!(
            "<a class=\"media\" href=\"{}\">{}</a>",
            escape_html(node.attribute_str("src").unwrap_or("#")),
            inner()
        ),
        NodeType::GraphEdge => String::new(),
        NodeType::Group => class_div("group"),
        NodeType::GraphNode => class_div("graph-node"),
        NodeType::Shape => class_div("shape"),
        NodeType::TimelineItem => match node.attribute_str("date") {
            Some(date) => format!(
                "<div class=\"timeline-item\"><time>{}</time> {}</div>",
                escape_html(date),
                inner()
            ),
            None => class_div("timeline-item"),
        },
        NodeType::AiBlock => class_div("ai-block"),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ==================== Markdown ====================

/// Render the document as CommonMark
pub fn to_markdown(doc: &Document) -> String {
    let mut blocks = Vec::new();
    if let Some(title) = &doc.title {
        blocks.push(format!("# {}", escape_markdown(title)));
    }
    blocks.extend(
        doc.blocks()
            .iter()
            .map(|block| block_markdown(block))
            .filter(|md| !md.is_empty()),
    );

    let mut out = blocks.join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn block_markdown(node: &AstNode) -> String {
    match node.node_type {
        NodeType::Heading => format!(
            "{} {}",
            "#".repeat(heading_level(node) as usize),
            inline_markdown(node)
        ),
        NodeType::List => list_markdown(node, 0),
        NodeType::Blockquote => {
            let body = if node.children.is_empty() {
                inline_markdown(node)
            } else {
                node.children
                    .iter()
                    .map(|c| block_markdown(c))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            };
            body.lines()
                .map(|line| {
                    if line.is_empty() {
                        ">".to_string()
                    } else {
                        format!("> {}", line)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        NodeType::CodeBlock => format!(
            "```{}\n{}\n```",
            node.attribute_str("language").unwrap_or_default(),
            node.text_content()
        ),
        NodeType::Divider => "---".to_string(),
        NodeType::Table => table_markdown(node),
        NodeType::GraphEdge => String::new(),
        NodeType::Image | NodeType::Video | NodeType::Media | NodeType::Link => {
            inline_markdown_node(node)
        }
        NodeType::Group => node
            .children
            .iter()
            .map(|c| block_markdown(c))
            .filter(|md| !md.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        NodeType::TimelineItem => match node.attribute_str("date") {
            Some(date) => format!("**{}** {}", escape_markdown(date), inline_markdown(node)),
            None => inline_markdown(node),
        },
        _ => inline_markdown(node),
    }
}

/// Content of `node` followed by its children rendered inline
fn inline_markdown(node: &AstNode) -> String {
    let mut out = node
        .content
        .as_deref()
        .map(escape_markdown)
        .unwrap_or_default();
    for child in &node.children {
        out.push_str(&inline_markdown_node(child));
    }
    out
}

fn inline_markdown_node(node: &AstNode) -> String {
    match node.node_type {
        NodeType::Link => format!(
            "[{}]({})",
            inline_markdown(node),
            node.attribute_str("href").unwrap_or("#")
        ),
        NodeType::Image => format!(
            "![{}]({})",
            escape_markdown(node.content.as_deref().unwrap_or_default()),
            node.attribute_str("src").unwrap_or_default()
        ),
        NodeType::Video | NodeType::Media => format!(
            "[{}]({})",
            inline_markdown(node),
            node.attribute_str("src").unwrap_or("#")
        ),
        NodeType::GraphEdge => String::new(),
        _ => inline_markdown(node),
    }
}

fn list_markdown(list: &AstNode, depth: usize) -> String {
    let ordered = list.attribute_bool("ordered").unwrap_or(false);
    let indent = "  ".repeat(depth);
    let mut lines = Vec::new();
    let mut number = 0;

    for item in &list.children {
        number += 1;
        let marker = if ordered {
            format!("{}.", number)
        } else {
            "-".to_string()
        };

        let (nested, inline): (Vec<_>, Vec<_>) = item
            .children
            .iter()
            .partition(|c| c.node_type == NodeType::List);
        let mut text = item
            .content
            .as_deref()
            .map(escape_markdown)
            .unwrap_or_default();
        for child in inline {
            text.push_str(&inline_markdown_node(child));
        }
        lines.push(format!("{}{} {}", indent, marker, text));
        for sub in nested {
            lines.push(list_markdown(sub, depth + 1));
        }
    }
    lines.join("\n")
}

fn table_markdown(table: &AstNode) -> String {
    let rows: Vec<Vec<String>> = table
        .children
        .iter()
        .map(|row| {
            row.children
                .iter()
                .map(|cell| inline_markdown(cell).replace('|', "\\|"))
                .collect()
        })
        .collect();
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let render = |cells: &[String]| {
        let mut padded = cells.to_vec();
        padded.resize(width, String::new());
        format!("| {} |", padded.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render(&rows[0]));
    lines.push(format!("|{}", " --- |".repeat(width)));
    for row in &rows[1..] {
        lines.push(render(row));
    }
    lines.join("\n")
}

fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn heading_level(node: &AstNode) -> u64 {
    node.attribute_u64("level").unwrap_or(1).clamp(1, 6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree;
    use serde_json::Value;

    fn doc_with(nodes: Vec<AstNode>) -> Document {
        nodes.into_iter().fold(Document::new(), |doc, node| {
            tree::add_node(&doc, node, None, None).unwrap()
        })
    }

    #[test]
    fn test_html_blocks_and_escaping() {
        let doc = doc_with(vec![
            AstNode::heading(2, "Tom & Jerry"),
            AstNode::paragraph("a < b").with_child(
                AstNode::new(NodeType::Link)
                    .with_content("link")
                    .with_attribute("href", Value::from("https://x.io/?a=1&b=\"2\"")),
            ),
            AstNode::new(NodeType::Divider),
            AstNode::edge("a", "b"),
        ])
        .titled("Notes");

        let html = to_html(&doc);
        assert!(html.starts_with("<article id=\""));
        assert!(html.contains("<header>Notes</header>"));
        assert!(html.contains("<h2>Tom &amp; Jerry</h2>"));
        assert!(html.contains(
            "<p>a &lt; b<a href=\"https://x.io/?a=1&amp;b=&quot;2&quot;\">link</a></p>"
        ));
        assert!(html.contains("<hr>"));
        assert!(!html.contains("edge"));
        assert!(html.trim_end().ends_with("</article>"));
    }

    #[test]
    fn test_html_lists_and_tables() {
        let list = AstNode::new(NodeType::List)
            .with_attribute("ordered", Value::from(true))
            .with_child(AstNode::new(NodeType::ListItem).with_content("one"));
        let table = AstNode::new(NodeType::Table).with_child(
            AstNode::new(NodeType::TableRow)
                .with_child(AstNode::new(NodeType::TableCell).with_content("c1")),
        );
        let html = to_html(&doc_with(vec![list, table]));
        assert!(html.contains("<ol><li>one</li></ol>"));
        assert!(html.contains("<table><tr><td>c1</td></tr></table>"));
    }

    #[test]
    fn test_markdown_blocks() {
        let list = AstNode::new(NodeType::List)
            .with_child(AstNode::new(NodeType::ListItem).with_content("first"))
            .with_child(
                AstNode::new(NodeType::ListItem).with_content("second").with_child(
                    AstNode::new(NodeType::List)
                        .with_attribute("ordered", Value::from(true))
                        .with_child(AstNode::new(NodeType::ListItem).with_content("inner")),
                ),
            );
        let code = AstNode::new(NodeType::CodeBlock)
            .with_content("fn main() {}")
            .with_attribute("language", Value::from("rust"));
        let quote = AstNode::new(NodeType::Blockquote).with_content("wise *words*");

        let md = to_markdown(&doc_with(vec![
            AstNode::heading(3, "Intro"),
            list,
            code,
            quote,
        ]));
        assert_eq!(
            md,
            "### Intro\n\n\
             - first\n- second\n  1. inner\n\n\
             ```rust\nfn main() {}\n```\n\n\
             > wise \\*words\\*\n"
        );
    }

    #[test]
    fn test_markdown_table_and_links() {
        let row = |cells: &[&str]| {
            cells.iter().fold(AstNode::new(NodeType::TableRow), |row, text| {
                row.with_child(AstNode::new(NodeType::TableCell).with_content(*text))
            })
        };
        let table = AstNode::new(NodeType::Table)
            .with_child(row(&["Name", "Role"]))
            .with_child(row(&["Ada", "a|b"]));
        let para = AstNode::paragraph("see ").with_child(
            AstNode::new(NodeType::Link)
                .with_content("docs")
                .with_attribute("href", Value::from("https://docs.rs")),
        );

        let md = to_markdown(&doc_with(vec![table, para]));
        assert_eq!(
            md,
            "| Name | Role |\n| --- | --- |\n| Ada | a\\|b |\n\nsee [docs](https://docs.rs)\n"
        );
    }

    #[test]
    fn test_empty_document_exports() {
        let doc = Document::new();
        assert_eq!(to_markdown(&doc), "");
        assert_eq!(to_html(&doc), format!("<article id=\"{}\">\n</article>\n", doc.id));
    }
}
