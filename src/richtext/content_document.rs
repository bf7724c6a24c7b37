// Content Document Model
// An ordered list of blocks plus the entity store they reference.
// HTML and raw JSON are only storage formats for this model.

use std::fmt;

use serde_json::{Map, Value};

use super::entity::{EntityData, EntityKey, EntityStore, Mutability};
use crate::error::{DraftError, DraftResult};

/// Opaque identifier of a block within one document
pub type BlockKey = String;

/// Text styling (semantic, not syntactic)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub code: bool,
    pub strikethrough: bool,
}

impl TextStyle {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn bold() -> Self {
        TextStyle {
            bold: true,
            ..Default::default()
        }
    }

    pub fn italic() -> Self {
        TextStyle {
            italic: true,
            ..Default::default()
        }
    }

    pub fn code() -> Self {
        TextStyle {
            code: true,
            ..Default::default()
        }
    }
}

/// A run of styled text (a contiguous piece of text with uniform styling)
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub style: TextStyle,
}

impl TextRun {
    pub fn new(text: impl Into<String>, style: TextStyle) -> Self {
        TextRun {
            text: text.into(),
            style,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, TextStyle::plain())
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Link destination
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub url: String,
    pub title: Option<String>,
}

impl Link {
    pub fn new(url: impl Into<String>) -> Self {
        Link {
            url: url.into(),
            title: None,
        }
    }
}

/// Inline content (can appear within a block)
#[derive(Debug, Clone, PartialEq)]
pub enum InlineContent {
    Text(TextRun),
    Link {
        link: Link,
        content: Vec<InlineContent>,
    },
    LineBreak,
}

impl InlineContent {
    /// Flatten to plain text
    pub fn to_plain_text(&self) -> String {
        match self {
            InlineContent::Text(run) => run.text.clone(),
            InlineContent::Link { content, .. } => {
                content.iter().map(|c| c.to_plain_text()).collect()
            }
            InlineContent::LineBreak => "\n".to_string(),
        }
    }
}

/// Merge adjacent runs that share a style and drop empty ones
pub fn normalize_inline(content: Vec<InlineContent>) -> Vec<InlineContent> {
    let mut out: Vec<InlineContent> = Vec::with_capacity(content.len());

    for item in content {
        match item {
            InlineContent::Text(run) if run.is_empty() => {}
            InlineContent::Text(run) => {
                if let Some(InlineContent::Text(prev)) = out.last_mut()
                    && prev.style == run.style
                {
                    prev.text.push_str(&run.text);
                    continue;
                }
                out.push(InlineContent::Text(run));
            }
            InlineContent::Link { link, content } => {
                let content = normalize_inline(content);
                if content.is_empty() {
                    continue;
                }
                if let Some(InlineContent::Link {
                    link: prev_link,
                    content: prev_content,
                }) = out.last_mut()
                    && *prev_link == link
                {
                    prev_content.extend(content);
                    let merged = normalize_inline(std::mem::take(prev_content));
                    *prev_content = merged;
                    continue;
                }
                out.push(InlineContent::Link { link, content });
            }
            InlineContent::LineBreak => out.push(InlineContent::LineBreak),
        }
    }

    out
}

/// Block-level content types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockType {
    Unstyled,
    Heading { level: u8 }, // 1-6
    ListItem { ordered: bool },
    BlockQuote,
    CodeBlock,
    /// Content is delegated entirely to the referenced entity
    Atomic,
    Unknown(String),
}

impl BlockType {
    pub fn heading(level: u8) -> Self {
        BlockType::Heading {
            level: level.clamp(1, 6),
        }
    }
}

/// An inline entity other than a link, carried over from raw JSON.
/// Offsets are UTF-16 code units into the block's plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineEntityRange {
    pub offset: usize,
    pub length: usize,
    pub entity: EntityKey,
}

/// A block of content
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub key: BlockKey,
    pub block_type: BlockType,
    pub content: Vec<InlineContent>,
    /// Non-owning reference into the document's entity store
    pub entity: Option<EntityKey>,
    /// List nesting level
    pub depth: u32,
    /// Block metadata we don't interpret
    pub data: Map<String, Value>,
    pub inline_entities: Vec<InlineEntityRange>,
}

impl Block {
    pub fn new(block_type: BlockType) -> Self {
        Block {
            key: BlockKey::new(),
            block_type,
            content: Vec::new(),
            entity: None,
            depth: 0,
            data: Map::new(),
            inline_entities: Vec::new(),
        }
    }

    pub fn paragraph() -> Self {
        Self::new(BlockType::Unstyled)
    }

    pub fn heading(level: u8) -> Self {
        Self::new(BlockType::heading(level))
    }

    pub fn atomic(entity: EntityKey) -> Self {
        Block {
            entity: Some(entity),
            ..Self::new(BlockType::Atomic)
        }
    }

    pub fn with_text(mut self, text: impl Into<String>, style: TextStyle) -> Self {
        self.content
            .push(InlineContent::Text(TextRun::new(text, style)));
        self
    }

    pub fn with_plain_text(self, text: impl Into<String>) -> Self {
        self.with_text(text, TextStyle::plain())
    }

    pub fn with_link(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.content.push(InlineContent::Link {
            link: Link::new(url),
            content: vec![InlineContent::Text(TextRun::plain(text))],
        });
        self
    }

    /// Get plain text content
    pub fn to_plain_text(&self) -> String {
        self.content.iter().map(|c| c.to_plain_text()).collect()
    }

    /// Check if this block has no visible text
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
            || self.content.iter().all(|c| match c {
                InlineContent::Text(run) => run.text.trim().is_empty(),
                _ => false,
            })
    }
}

/// The content document: blocks in order, plus the entities they reference
#[derive(Debug, Clone, Default)]
pub struct ContentDocument {
    blocks: Vec<Block>,
    entities: EntityStore,
    next_key: u64,
}

impl ContentDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a simple document with one paragraph
    pub fn with_paragraph(text: impl Into<String>) -> Self {
        let mut doc = Self::new();
        doc.add_block(Block::paragraph().with_plain_text(text));
        doc
    }

    fn next_key(&mut self) -> BlockKey {
        loop {
            self.next_key += 1;
            let key = format!("b{}", self.next_key);
            if self.find_block(&key).is_none() {
                return key;
            }
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityStore {
        &mut self.entities
    }

    /// Add a block, assigning a key if it has none. Returns the key.
    pub fn add_block(&mut self, block: Block) -> BlockKey {
        let index = self.blocks.len();
        self.insert_block(index, block)
    }

    /// Insert a block at a specific position. Returns the key.
    pub fn insert_block(&mut self, index: usize, mut block: Block) -> BlockKey {
        if block.key.is_empty() || self.find_block(&block.key).is_some() {
            block.key = self.next_key();
        }
        let key = block.key.clone();
        let index = index.min(self.blocks.len());
        self.blocks.insert(index, block);
        key
    }

    /// Create an entity and an atomic block referencing it at the end of the document
    pub fn insert_atomic(&mut self, mutability: Mutability, data: EntityData) -> (BlockKey, EntityKey) {
        let entity = self.entities.create(mutability, data);
        let block = self.add_block(Block::atomic(entity.clone()));
        (block, entity)
    }

    /// Remove a block. Its entity stays in the store as an orphan.
    pub fn remove_block(&mut self, index: usize) -> Option<Block> {
        if index < self.blocks.len() {
            Some(self.blocks.remove(index))
        } else {
            None
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn find_block(&self, key: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.key == key)
    }

    pub fn find_block_index(&self, key: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.key == key)
    }

    /// Check that every entity reference resolves
    pub fn validate(&self) -> DraftResult<()> {
        for block in &self.blocks {
            if let Some(entity) = &block.entity
                && !self.entities.contains(entity)
            {
                return Err(DraftError::DanglingEntity {
                    block: block.key.clone(),
                    entity: entity.clone(),
                });
            }
        }
        Ok(())
    }

    /// Merge adjacent same-styled runs in every block
    pub fn normalize(&mut self) {
        for block in &mut self.blocks {
            block.content = normalize_inline(std::mem::take(&mut block.content));
        }
    }

    /// Convert to plain text
    pub fn to_plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.to_plain_text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Structural equality ignoring block and entity keys: same block types,
    /// same inline content after normalization, same resolved entity payloads.
    pub fn semantic_eq(&self, other: &ContentDocument) -> bool {
        if self.blocks.len() != other.blocks.len() {
            return false;
        }

        self.blocks.iter().zip(&other.blocks).all(|(a, b)| {
            a.block_type == b.block_type
                && a.depth == b.depth
                && normalize_inline(a.content.clone()) == normalize_inline(b.content.clone())
                && self.resolve(a) == other.resolve(b)
        })
    }

    fn resolve(&self, block: &Block) -> Option<(Mutability, &EntityData)> {
        let key = block.entity.as_ref()?;
        self.entities
            .get(key)
            .ok()
            .map(|entity| (entity.mutability, &entity.data))
    }
}

impl fmt::Display for ContentDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ContentDocument ({} blocks):", self.blocks.len())?;
        for (i, block) in self.blocks.iter().enumerate() {
            write!(f, "  [{}] ", i)?;
            match &block.block_type {
                BlockType::Unstyled => write!(f, "Unstyled")?,
                BlockType::Heading { level } => write!(f, "Heading(h{})", level)?,
                BlockType::ListItem { ordered } => write!(
                    f,
                    "ListItem({})",
                    if *ordered { "ordered" } else { "unordered" }
                )?,
                BlockType::BlockQuote => write!(f, "BlockQuote")?,
                BlockType::CodeBlock => write!(f, "CodeBlock")?,
                BlockType::Atomic => write!(
                    f,
                    "Atomic({})",
                    block.entity.as_ref().map(|k| k.as_str()).unwrap_or("-")
                )?,
                BlockType::Unknown(name) => write!(f, "Unknown({})", name)?,
            }
            writeln!(f, ": {:?}", block.to_plain_text())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::entity::ColorBoxData;

    fn color_box() -> EntityData {
        EntityData::ColorBox(ColorBoxData {
            color: "#fff".to_string(),
            body: "<p>hi</p>".to_string(),
            raw_content_state: None,
        })
    }

    #[test]
    fn test_block_plain_text() {
        let block = Block::paragraph()
            .with_plain_text("hello")
            .with_text(" world", TextStyle::bold());

        assert_eq!(block.to_plain_text(), "hello world");
    }

    #[test]
    fn test_add_block_assigns_unique_keys() {
        let mut doc = ContentDocument::new();
        let a = doc.add_block(Block::paragraph().with_plain_text("First"));
        let b = doc.add_block(Block::heading(1).with_plain_text("A heading"));

        assert_eq!(doc.block_count(), 2);
        assert_ne!(a, b);
        assert_eq!(doc.find_block_index(&b), Some(1));
    }

    #[test]
    fn test_duplicate_block_key_is_replaced() {
        let mut doc = ContentDocument::new();
        let mut block = Block::paragraph();
        block.key = "same".to_string();
        doc.add_block(block.clone());
        let second = doc.add_block(block);
        assert_ne!(second, "same");
    }

    #[test]
    fn test_insert_atomic_links_block_and_entity() {
        let mut doc = ContentDocument::new();
        let (block_key, entity_key) = doc.insert_atomic(Mutability::Mutable, color_box());

        let block = doc.find_block(&block_key).unwrap();
        assert_eq!(block.block_type, BlockType::Atomic);
        assert_eq!(block.entity.as_ref(), Some(&entity_key));
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_dangling_reference() {
        let mut doc = ContentDocument::new();
        doc.add_block(Block::atomic(EntityKey::from("ghost")));

        let err = doc.validate().unwrap_err();
        assert!(matches!(err, DraftError::DanglingEntity { entity, .. } if entity.as_str() == "ghost"));
    }

    #[test]
    fn test_removed_block_leaves_orphan_entity() {
        let mut doc = ContentDocument::new();
        doc.insert_atomic(Mutability::Mutable, color_box());
        doc.remove_block(0);

        assert!(doc.is_empty());
        assert_eq!(doc.entities().len(), 1);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_normalize_merges_runs() {
        let content = vec![
            InlineContent::Text(TextRun::plain("a")),
            InlineContent::Text(TextRun::plain("b")),
            InlineContent::Text(TextRun::plain("")),
            InlineContent::Text(TextRun::new("c", TextStyle::bold())),
        ];
        let normalized = normalize_inline(content);
        assert_eq!(
            normalized,
            vec![
                InlineContent::Text(TextRun::plain("ab")),
                InlineContent::Text(TextRun::new("c", TextStyle::bold())),
            ]
        );
    }

    #[test]
    fn test_semantic_eq_ignores_keys() {
        let mut a = ContentDocument::new();
        a.add_block(Block::paragraph().with_plain_text("x").with_plain_text("y"));
        a.insert_atomic(Mutability::Mutable, color_box());

        let mut b = ContentDocument::new();
        let mut block = Block::paragraph().with_plain_text("xy");
        block.key = "other".to_string();
        b.add_block(block);
        let entity = b
            .entities_mut()
            .insert_with_key("zzz".into(), Mutability::Mutable, color_box());
        b.add_block(Block::atomic(entity));

        assert!(a.semantic_eq(&b));

        b.blocks_mut()[0].block_type = BlockType::heading(2);
        assert!(!a.semantic_eq(&b));
    }
}
