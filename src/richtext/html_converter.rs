// HTML Converter
// Converts between ContentDocument and the HTML stored in the content field.
// Atomic blocks carry their entity as data-* attributes on a <figure>, with the
// entity's pre-rendered body (or a generated preview) as the figure's content.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::content_document::*;
use super::entity::{EntityData, EntityKey, EntityStore, Mutability};
use super::html_parser::{HtmlFragment, HtmlNode, parse_html};

static LINE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*[\r\n]+[ \t]*").expect("valid regex"));
static ANY_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            // NUL is a parse error; readers see U+FFFD anyway
            '\0' => out.push('\u{FFFD}'),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            // the parser folds raw CR into LF; a character reference survives
            '\r' => out.push_str("&#13;"),
            '\0' => out.push('\u{FFFD}'),
            _ => out.push(ch),
        }
    }
    out
}

/// Convert a document to its stored HTML form
pub fn document_to_html(doc: &ContentDocument) -> String {
    let mut output = String::new();
    let blocks = doc.blocks();
    let mut i = 0;

    while i < blocks.len() {
        let block = &blocks[i];

        match &block.block_type {
            BlockType::ListItem { ordered } => {
                let tag = if *ordered { "ol" } else { "ul" };
                output.push_str(&format!("<{}>", tag));
                while i < blocks.len() && blocks[i].block_type == block.block_type {
                    match blocks[i].depth {
                        0 => output.push_str("<li>"),
                        depth => output.push_str(&format!(r#"<li data-depth="{}">"#, depth)),
                    }
                    output.push_str(&inline_content_to_html(&blocks[i].content, false));
                    output.push_str("</li>");
                    i += 1;
                }
                output.push_str(&format!("</{}>", tag));
                continue;
            }
            BlockType::Unstyled => wrap(&mut output, "p", &block.content),
            BlockType::Heading { level } => wrap(&mut output, &format!("h{}", level), &block.content),
            BlockType::BlockQuote => wrap(&mut output, "blockquote", &block.content),
            BlockType::CodeBlock => {
                let inner = inline_content_to_html(&block.content, true);
                output.push_str("<pre>");
                // a newline right after <pre> is swallowed by parsers
                if inner.starts_with('\n') {
                    output.push('\n');
                }
                output.push_str(&inner);
                output.push_str("</pre>");
            }
            BlockType::Atomic => output.push_str(&atomic_to_html(block, doc.entities())),
            BlockType::Unknown(name) => {
                output.push_str(&format!(r#"<div data-block-type="{}">"#, escape_attr(name)));
                output.push_str(&inline_content_to_html(&block.content, false));
                output.push_str("</div>");
            }
        }
        i += 1;
    }

    output
}

fn wrap(output: &mut String, tag: &str, content: &[InlineContent]) {
    output.push_str(&format!("<{}>", tag));
    output.push_str(&inline_content_to_html(content, false));
    output.push_str(&format!("</{}>", tag));
}

/// Convert inline content to HTML; inside <pre> line breaks stay literal
pub(crate) fn inline_content_to_html(content: &[InlineContent], preformatted: bool) -> String {
    let mut output = String::new();

    for item in content {
        match item {
            InlineContent::Text(run) => {
                let style = run.style;
                let tags: Vec<&str> = [
                    (style.bold, "strong"),
                    (style.italic, "em"),
                    (style.underline, "u"),
                    (style.strikethrough, "s"),
                    (style.code, "code"),
                ]
                .into_iter()
                .filter_map(|(on, tag)| on.then_some(tag))
                .collect();

                for tag in &tags {
                    output.push_str(&format!("<{}>", tag));
                }
                output.push_str(&escape_text(&run.text));
                for tag in tags.iter().rev() {
                    output.push_str(&format!("</{}>", tag));
                }
            }
            InlineContent::Link { link, content } => {
                output.push_str(&format!(r#"<a href="{}""#, escape_attr(&link.url)));
                if let Some(title) = &link.title {
                    output.push_str(&format!(r#" title="{}""#, escape_attr(title)));
                }
                output.push('>');
                output.push_str(&inline_content_to_html(content, preformatted));
                output.push_str("</a>");
            }
            InlineContent::LineBreak => {
                output.push_str(if preformatted { "\n" } else { "<br>" });
            }
        }
    }

    output
}

fn atomic_to_html(block: &Block, entities: &EntityStore) -> String {
    let Some(key) = &block.entity else {
        return "<figure></figure>".to_string();
    };
    let entity = match entities.get(key) {
        Ok(entity) => entity,
        Err(err) => {
            warn!(block = %block.key, "writing empty figure: {err}");
            return "<figure></figure>".to_string();
        }
    };

    let payload = entity.data.to_json().unwrap_or_else(|err| {
        warn!(entity = %key, "entity payload could not be serialized: {err}");
        "null".to_string()
    });
    let body = match entity.data.body() {
        Some(body) => body.to_string(),
        None => entity_preview_html(&entity.data),
    };

    format!(
        r#"<figure data-entity-type="{}" data-entity-key="{}" data-mutability="{}" data-entity-data="{}">{}</figure>"#,
        escape_attr(entity.data.type_tag()),
        escape_attr(key.as_str()),
        entity.mutability.as_str(),
        escape_attr(&payload),
        body
    )
}

/// Self-contained HTML for entities that do not carry a rendered body
fn entity_preview_html(data: &EntityData) -> String {
    match data {
        EntityData::Image(image) => image
            .images
            .iter()
            .map(|meta| {
                let alt = if meta.desc.is_empty() {
                    meta.image.name.as_deref().unwrap_or_default()
                } else {
                    meta.desc.as_str()
                };
                format!(
                    r#"<img src="{}" alt="{}">"#,
                    escape_attr(meta.image.preview_url()),
                    escape_attr(alt)
                )
            })
            .collect(),
        EntityData::Video(video) => match video.video.source_url() {
            Some(src) => format!(r#"<video src="{}"></video>"#, escape_attr(src)),
            None => String::new(),
        },
        EntityData::ColorBox(_) | EntityData::Opaque(_) => String::new(),
    }
}

/// Convert stored HTML to a document.
///
/// Malformed input is not an error: the document degrades to one paragraph
/// holding the visible text. The result always has at least one block, so an
/// empty document reads back as a single empty paragraph.
pub fn html_to_document(html: &str) -> ContentDocument {
    let fragment = parse_html(html);

    if !fragment.errors.is_empty() {
        warn!(
            errors = fragment.errors.len(),
            first = %fragment.errors[0],
            "malformed HTML, keeping plain text only"
        );
        return plain_text_fallback(&fragment);
    }

    let mut doc = ContentDocument::new();
    let mut pending: Vec<InlineContent> = Vec::new();
    let mut keys = EntityKeys::new();
    for node in &fragment.nodes {
        node_to_blocks(node, &mut doc, &mut pending, &mut keys);
    }
    flush_paragraph(&mut doc, &mut pending);

    // Ensure at least one block exists
    if doc.is_empty() {
        doc.add_block(Block::paragraph());
    }

    doc.normalize();
    doc
}

fn plain_text_fallback(fragment: &HtmlFragment) -> ContentDocument {
    let visible = fragment.visible_text();
    let text = ANY_WHITESPACE.replace_all(&visible, " ");
    ContentDocument::with_paragraph(text.trim())
}

/// Wrap stray top-level inline content into a paragraph
fn flush_paragraph(doc: &mut ContentDocument, pending: &mut Vec<InlineContent>) {
    let only_whitespace = pending.iter().all(|item| match item {
        InlineContent::Text(run) => run.text.trim().is_empty(),
        _ => false,
    });
    if !only_whitespace {
        let mut block = Block::paragraph();
        block.content = std::mem::take(pending);
        doc.add_block(block);
    }
    pending.clear();
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "blockquote"
            | "pre"
            | "ul"
            | "ol"
            | "figure"
            | "div"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "main"
            | "hr"
    )
}

/// Stored entity key -> key in the document being built
type EntityKeys = BTreeMap<String, EntityKey>;

/// Convert a top-level node to one or more blocks
fn node_to_blocks(
    node: &HtmlNode,
    doc: &mut ContentDocument,
    pending: &mut Vec<InlineContent>,
    keys: &mut EntityKeys,
) {
    let tag = match node {
        HtmlNode::Text(text) => {
            if !(pending.is_empty() && text.trim().is_empty()) {
                collect_inline(std::slice::from_ref(node), TextStyle::plain(), false, pending);
            }
            return;
        }
        HtmlNode::Element { tag, .. } => tag.as_str(),
    };

    if !is_block_tag(tag) {
        collect_inline(std::slice::from_ref(node), TextStyle::plain(), false, pending);
        return;
    }
    flush_paragraph(doc, pending);

    let text_block = |block_type: BlockType, preformatted: bool| {
        let mut block = Block::new(block_type);
        collect_inline(node.children(), TextStyle::plain(), preformatted, &mut block.content);
        block
    };

    match tag {
        "p" => {
            doc.add_block(text_block(BlockType::Unstyled, false));
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag[1..].parse().unwrap_or(1);
            doc.add_block(text_block(BlockType::heading(level), false));
        }
        "blockquote" => {
            doc.add_block(text_block(BlockType::BlockQuote, false));
        }
        "pre" => {
            doc.add_block(text_block(BlockType::CodeBlock, true));
        }
        "ul" | "ol" => {
            let ordered = tag == "ol";
            for item in node.children().iter().filter(|c| c.tag() == Some("li")) {
                let mut block = Block::new(BlockType::ListItem { ordered });
                block.depth = item
                    .attr("data-depth")
                    .and_then(|depth| depth.trim().parse().ok())
                    .unwrap_or(0);
                collect_inline(item.children(), TextStyle::plain(), false, &mut block.content);
                doc.add_block(block);
            }
        }
        "figure" => figure_to_block(node, doc, keys),
        "hr" => {}
        _ => {
            if let Some(block_type) = node.attr("data-block-type") {
                doc.add_block(text_block(BlockType::Unknown(block_type.to_string()), false));
            } else if node
                .children()
                .iter()
                .any(|c| c.tag().is_some_and(is_block_tag))
            {
                // generic container: its children are the blocks
                for child in node.children() {
                    node_to_blocks(child, doc, pending, keys);
                }
                flush_paragraph(doc, pending);
            } else {
                doc.add_block(text_block(BlockType::Unstyled, false));
            }
        }
    }
}

/// Rebuild an atomic block and its entity from a <figure>.
/// Figures naming an already seen key share that entity.
fn figure_to_block(node: &HtmlNode, doc: &mut ContentDocument, keys: &mut EntityKeys) {
    let Some(type_tag) = node.attr("data-entity-type") else {
        doc.add_block(Block::new(BlockType::Atomic));
        return;
    };
    let stored_key = node.attr("data-entity-key").unwrap_or_default();
    if let Some(key) = keys.get(stored_key) {
        doc.add_block(Block::atomic(key.clone()));
        return;
    }

    let raw = node.attr("data-entity-data").unwrap_or("null");
    let mutability = node
        .attr("data-mutability")
        .and_then(Mutability::parse)
        .unwrap_or_default();
    let requested = EntityKey::new(stored_key);

    let data = EntityData::from_json(type_tag, raw);
    let key = doc
        .entities_mut()
        .insert_with_key(requested.clone(), mutability, data);
    if key != requested {
        debug!(requested = %requested, assigned = %key, "entity key reassigned");
    }
    if !stored_key.is_empty() {
        keys.insert(stored_key.to_string(), key.clone());
    }
    doc.add_block(Block::atomic(key));
}

/// Collect inline content from nodes, applying the inherited style
fn collect_inline(
    nodes: &[HtmlNode],
    style: TextStyle,
    preformatted: bool,
    out: &mut Vec<InlineContent>,
) {
    for node in nodes {
        match node {
            HtmlNode::Text(text) => {
                if preformatted {
                    for (i, line) in text.split('\n').enumerate() {
                        if i > 0 {
                            out.push(InlineContent::LineBreak);
                        }
                        if !line.is_empty() {
                            out.push(InlineContent::Text(TextRun::new(line, style)));
                        }
                    }
                } else {
                    let text = LINE_WHITESPACE.replace_all(text, " ");
                    out.push(InlineContent::Text(TextRun::new(text, style)));
                }
            }
            HtmlNode::Element { tag, children, .. } => {
                let mut inner = style;
                match tag.as_str() {
                    "br" => {
                        out.push(InlineContent::LineBreak);
                        continue;
                    }
                    "a" => {
                        let link = Link {
                            url: node.attr("href").unwrap_or_default().to_string(),
                            title: node.attr("title").map(str::to_string),
                        };
                        let mut content = Vec::new();
                        collect_inline(children, style, preformatted, &mut content);
                        out.push(InlineContent::Link { link, content });
                        continue;
                    }
                    "strong" | "b" => inner.bold = true,
                    "em" | "i" => inner.italic = true,
                    "u" | "ins" => inner.underline = true,
                    "s" | "del" | "strike" => inner.strikethrough = true,
                    "code" => inner.code = true,
                    // other inline elements (span, img, ...) contribute their text
                    _ => {}
                }
                collect_inline(children, inner, preformatted, out);
            }
        }
    }
}
