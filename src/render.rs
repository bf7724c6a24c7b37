// Block renderer dispatch.
// Every block gets a renderer; blocks that cannot be resolved fall back to
// their plain text instead of failing.

use tracing::warn;

use crate::media::MediaItem;
use crate::richtext::content_document::{Block, BlockType, ContentDocument};
use crate::richtext::entity::{
    ColorBoxData, EntityData, EntityStore, ImageBlockData, OpaqueData, VideoBlockData,
};
use crate::richtext::html_parser::parse_html;

const PREVIEW_WIDTH: usize = 60;

/// The renderer chosen for one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockRenderer<'a> {
    ColorBox(&'a ColorBoxData),
    Image(&'a ImageBlockData),
    Video(&'a VideoBlockData),
    Opaque(&'a OpaqueData),
    Text(&'a Block),
    Heading { level: u8, block: &'a Block },
    ListItem { ordered: bool, block: &'a Block },
    Quote(&'a Block),
    Code(&'a Block),
    PlainText(&'a Block),
}

pub fn select_renderer<'a>(block: &'a Block, entities: &'a EntityStore) -> BlockRenderer<'a> {
    if let Some(key) = &block.entity {
        return match entities.get(key) {
            Ok(entity) => match &entity.data {
                EntityData::ColorBox(data) => BlockRenderer::ColorBox(data),
                EntityData::Image(data) => BlockRenderer::Image(data),
                EntityData::Video(data) => BlockRenderer::Video(data),
                EntityData::Opaque(data) => BlockRenderer::Opaque(data),
            },
            Err(err) => {
                warn!(block = %block.key, "rendering as plain text: {err}");
                BlockRenderer::PlainText(block)
            }
        };
    }

    match block.block_type {
        BlockType::Unstyled => BlockRenderer::Text(block),
        BlockType::Heading { level } => BlockRenderer::Heading { level, block },
        BlockType::ListItem { ordered } => BlockRenderer::ListItem { ordered, block },
        BlockType::BlockQuote => BlockRenderer::Quote(block),
        BlockType::CodeBlock => BlockRenderer::Code(block),
        BlockType::Atomic | BlockType::Unknown(_) => BlockRenderer::PlainText(block),
    }
}

impl BlockRenderer<'_> {
    /// One-line textual preview of the block
    pub fn render_preview(&self) -> String {
        match self {
            BlockRenderer::ColorBox(data) => {
                let text = parse_html(&data.body).visible_text();
                format!("[color-box {}] {}", data.color, truncate(&single_line(&text)))
            }
            BlockRenderer::Image(data) => {
                let names: Vec<&str> = data
                    .images
                    .iter()
                    .map(|meta| meta.image.name().unwrap_or(meta.image.id()))
                    .collect();
                let mut preview = if data.images.len() > 1 {
                    format!("[slideshow x{}] {}", data.images.len(), names.join(", "))
                } else {
                    format!("[image] {}", names.join(", "))
                };
                if let Some(alignment) = data.alignment {
                    preview.push_str(&format!(" ({})", alignment.as_str()));
                }
                if let Some(delay) = data.delay {
                    preview.push_str(&format!(" every {}s", delay));
                }
                preview
            }
            BlockRenderer::Video(data) => {
                let name = data.video.name().unwrap_or(data.video.id());
                match data.video.source_url() {
                    Some(url) => format!("[video] {} <{}>", name, url),
                    None => format!("[video] {}", name),
                }
            }
            BlockRenderer::Opaque(data) => {
                format!("[{}] {}", data.entity_type, truncate(&single_line(&data.raw)))
            }
            BlockRenderer::Text(block) | BlockRenderer::PlainText(block) => {
                single_line(&block.to_plain_text())
            }
            BlockRenderer::Heading { level, block } => {
                format!("{} {}", "#".repeat(*level as usize), single_line(&block.to_plain_text()))
            }
            BlockRenderer::ListItem { ordered, block } => {
                let marker = if *ordered { "1." } else { "-" };
                format!("{} {}", marker, single_line(&block.to_plain_text()))
            }
            BlockRenderer::Quote(block) => format!("> {}", single_line(&block.to_plain_text())),
            BlockRenderer::Code(block) => format!("`{}`", single_line(&block.to_plain_text())),
        }
    }
}

/// Previews for every block, in order
pub fn render_document(doc: &ContentDocument) -> Vec<String> {
    doc.blocks()
        .iter()
        .map(|block| select_renderer(block, doc.entities()).render_preview())
        .collect()
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= PREVIEW_WIDTH {
        text.to_string()
    } else {
        let cut: String = text.chars().take(PREVIEW_WIDTH).collect();
        format!("{}…", cut)
    }
}
