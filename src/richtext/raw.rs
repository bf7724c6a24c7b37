// Raw Content State
// The editor's JSON form of a document: block texts with UTF-16 offset ranges
// for inline styles and entities, plus an entity map. Color boxes store their
// nested document in this form.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use tracing::warn;

use super::content_document::*;
use super::entity::{Entity, EntityData, EntityKey, Mutability};
use super::html_converter::document_to_html;
use crate::error::DraftResult;

pub const LINK_ENTITY_TYPE: &str = "LINK";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContentState {
    pub blocks: Vec<RawBlock>,
    #[serde(default)]
    pub entity_map: BTreeMap<String, RawEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default = "unstyled")]
    pub block_type: String,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub inline_style_ranges: Vec<RawStyleRange>,
    #[serde(default)]
    pub entity_ranges: Vec<RawEntityRange>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

fn unstyled() -> String {
    "unstyled".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStyleRange {
    pub offset: usize,
    pub length: usize,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntityRange {
    pub offset: usize,
    pub length: usize,
    #[serde(deserialize_with = "number_or_string")]
    pub key: String,
}

// Entity range keys are numbers in editor output but strings in the entity map
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Key {
        Text(String),
        Number(u64),
    }

    Ok(match Key::deserialize(deserializer)? {
        Key::Text(text) => text,
        Key::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub mutability: Mutability,
    /// Kept as raw JSON so unknown payloads pass through untouched
    pub data: Box<RawValue>,
}

impl PartialEq for RawEntity {
    fn eq(&self, other: &Self) -> bool {
        self.entity_type == other.entity_type
            && self.mutability == other.mutability
            && self.data.get() == other.data.get()
    }
}

fn raw_json(text: String) -> DraftResult<Box<RawValue>> {
    match RawValue::from_string(text.clone()) {
        Ok(raw) => Ok(raw),
        // not valid JSON (an opaque payload read from damaged HTML): keep it as a string
        Err(err) => {
            warn!("entity payload is not valid JSON, storing as string: {err}");
            Ok(serde_json::value::to_raw_value(&text)?)
        }
    }
}

pub fn block_type_name(block_type: &BlockType) -> String {
    match block_type {
        BlockType::Unstyled => "unstyled".to_string(),
        BlockType::Heading { level } => {
            let name = match level {
                1 => "one",
                2 => "two",
                3 => "three",
                4 => "four",
                5 => "five",
                _ => "six",
            };
            format!("header-{}", name)
        }
        BlockType::ListItem { ordered: true } => "ordered-list-item".to_string(),
        BlockType::ListItem { ordered: false } => "unordered-list-item".to_string(),
        BlockType::BlockQuote => "blockquote".to_string(),
        BlockType::CodeBlock => "code-block".to_string(),
        BlockType::Atomic => "atomic".to_string(),
        BlockType::Unknown(name) => name.clone(),
    }
}

pub fn parse_block_type(name: &str) -> BlockType {
    match name {
        "unstyled" | "paragraph" => BlockType::Unstyled,
        "header-one" => BlockType::heading(1),
        "header-two" => BlockType::heading(2),
        "header-three" => BlockType::heading(3),
        "header-four" => BlockType::heading(4),
        "header-five" => BlockType::heading(5),
        "header-six" => BlockType::heading(6),
        "unordered-list-item" => BlockType::ListItem { ordered: false },
        "ordered-list-item" => BlockType::ListItem { ordered: true },
        "blockquote" => BlockType::BlockQuote,
        "code-block" => BlockType::CodeBlock,
        "atomic" => BlockType::Atomic,
        other => BlockType::Unknown(other.to_string()),
    }
}

fn style_names(style: TextStyle) -> impl Iterator<Item = &'static str> {
    [
        (style.bold, "BOLD"),
        (style.italic, "ITALIC"),
        (style.underline, "UNDERLINE"),
        (style.code, "CODE"),
        (style.strikethrough, "STRIKETHROUGH"),
    ]
    .into_iter()
    .filter_map(|(on, name)| on.then_some(name))
}

fn apply_style(style: &mut TextStyle, name: &str) {
    match name {
        "BOLD" => style.bold = true,
        "ITALIC" => style.italic = true,
        "UNDERLINE" => style.underline = true,
        "CODE" => style.code = true,
        "STRIKETHROUGH" => style.strikethrough = true,
        _ => {}
    }
}

fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Accumulates one block's flat text and its offset ranges
#[derive(Default)]
struct RawTextBuilder {
    text: String,
    units: usize,
    styles: Vec<RawStyleRange>,
    links: Vec<(usize, usize, Link)>,
}

impl RawTextBuilder {
    fn push_content(&mut self, content: &[InlineContent]) {
        for item in content {
            match item {
                InlineContent::Text(run) => {
                    let length = utf16_len(&run.text);
                    for style in style_names(run.style) {
                        self.styles.push(RawStyleRange {
                            offset: self.units,
                            length,
                            style: style.to_string(),
                        });
                    }
                    self.text.push_str(&run.text);
                    self.units += length;
                }
                InlineContent::Link { link, content } => {
                    let start = self.units;
                    self.push_content(content);
                    self.links.push((start, self.units - start, link.clone()));
                }
                InlineContent::LineBreak => {
                    self.text.push('\n');
                    self.units += 1;
                }
            }
        }
    }

    /// Merge touching ranges of the same style, ordered by offset
    fn merged_styles(mut self) -> (String, Vec<RawStyleRange>, Vec<(usize, usize, Link)>) {
        self.styles
            .sort_by(|a, b| a.style.cmp(&b.style).then(a.offset.cmp(&b.offset)));

        let mut merged: Vec<RawStyleRange> = Vec::new();
        for range in self.styles {
            if range.length == 0 {
                continue;
            }
            if let Some(prev) = merged.last_mut()
                && prev.style == range.style
                && prev.offset + prev.length == range.offset
            {
                prev.length += range.length;
                continue;
            }
            merged.push(range);
        }
        merged.sort_by(|a, b| a.offset.cmp(&b.offset).then(a.style.cmp(&b.style)));

        (self.text, merged, self.links)
    }
}

/// Add an entity to the map under `key` unless it is already there
fn insert_raw_entity(state: &mut RawContentState, key: &EntityKey, entity: &Entity) -> DraftResult<()> {
    if !state.entity_map.contains_key(key.as_str()) {
        state.entity_map.insert(
            key.to_string(),
            RawEntity {
                entity_type: entity.data.type_tag().to_string(),
                mutability: entity.mutability,
                data: raw_json(entity.data.to_json()?)?,
            },
        );
    }
    Ok(())
}

/// Convert a document to its raw JSON form
pub fn document_to_raw(doc: &ContentDocument) -> DraftResult<RawContentState> {
    let mut state = RawContentState::default();
    let mut link_counter = 0usize;

    for block in doc.blocks() {
        let mut raw_block = RawBlock {
            key: block.key.clone(),
            text: String::new(),
            block_type: block_type_name(&block.block_type),
            depth: block.depth,
            inline_style_ranges: Vec::new(),
            entity_ranges: Vec::new(),
            data: block.data.clone(),
        };

        if block.block_type == BlockType::Atomic {
            raw_block.text = " ".to_string();
            if let Some(key) = &block.entity
                && let Ok(entity) = doc.entities().get(key)
            {
                raw_block.entity_ranges.push(RawEntityRange {
                    offset: 0,
                    length: 1,
                    key: key.to_string(),
                });
                insert_raw_entity(&mut state, key, entity)?;
            }
            state.blocks.push(raw_block);
            continue;
        }

        let mut builder = RawTextBuilder::default();
        builder.push_content(&block.content);
        let (text, styles, links) = builder.merged_styles();
        raw_block.text = text;
        raw_block.inline_style_ranges = styles;

        for (offset, length, link) in links {
            let key = loop {
                link_counter += 1;
                let candidate = format!("link-{}", link_counter);
                if !doc.entities().contains(&EntityKey::new(candidate.as_str()))
                    && !state.entity_map.contains_key(&candidate)
                {
                    break candidate;
                }
            };

            let mut data = Map::new();
            data.insert("url".to_string(), Value::String(link.url));
            if let Some(title) = link.title {
                data.insert("title".to_string(), Value::String(title));
            }
            state.entity_map.insert(
                key.clone(),
                RawEntity {
                    entity_type: LINK_ENTITY_TYPE.to_string(),
                    mutability: Mutability::Mutable,
                    data: serde_json::value::to_raw_value(&data)?,
                },
            );
            raw_block
                .entity_ranges
                .push(RawEntityRange { offset, length, key });
        }

        for range in &block.inline_entities {
            let Ok(entity) = doc.entities().get(&range.entity) else {
                continue;
            };
            insert_raw_entity(&mut state, &range.entity, entity)?;
            raw_block.entity_ranges.push(RawEntityRange {
                offset: range.offset,
                length: range.length,
                key: range.entity.to_string(),
            });
        }
        raw_block.entity_ranges.sort_by_key(|range| range.offset);

        state.blocks.push(raw_block);
    }

    Ok(state)
}

fn link_from_raw(entity: &RawEntity) -> Link {
    let data: Value = serde_json::from_str(entity.data.get()).unwrap_or(Value::Null);
    let url = data
        .get("url")
        .or_else(|| data.get("href"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    Link {
        url: url.to_string(),
        title: data.get("title").and_then(Value::as_str).map(str::to_string),
    }
}

/// Split styled characters into text runs, turning '\n' into line breaks
fn styled_runs(chars: &[char], styles: &[TextStyle]) -> Vec<InlineContent> {
    let mut content = Vec::new();
    let mut current = String::new();
    let mut current_style = TextStyle::default();

    for (ch, style) in chars.iter().zip(styles) {
        if *ch == '\n' {
            if !current.is_empty() {
                content.push(InlineContent::Text(TextRun::new(
                    std::mem::take(&mut current),
                    current_style,
                )));
            }
            content.push(InlineContent::LineBreak);
            continue;
        }
        if *style != current_style && !current.is_empty() {
            content.push(InlineContent::Text(TextRun::new(
                std::mem::take(&mut current),
                current_style,
            )));
        }
        current_style = *style;
        current.push(*ch);
    }
    if !current.is_empty() {
        content.push(InlineContent::Text(TextRun::new(current, current_style)));
    }

    content
}

fn raw_block_content(block: &RawBlock, entity_map: &BTreeMap<String, RawEntity>) -> Vec<InlineContent> {
    let chars: Vec<char> = block.text.chars().collect();
    let mut unit_to_char = Vec::with_capacity(chars.len());
    for (i, ch) in chars.iter().enumerate() {
        for _ in 0..ch.len_utf16() {
            unit_to_char.push(i);
        }
    }
    let covered = |offset: usize, length: usize| {
        let end = offset.saturating_add(length).min(unit_to_char.len());
        offset.min(end)..end
    };

    let mut styles = vec![TextStyle::default(); chars.len()];
    for range in &block.inline_style_ranges {
        for unit in covered(range.offset, range.length) {
            apply_style(&mut styles[unit_to_char[unit]], &range.style);
        }
    }

    let mut links: Vec<Option<Link>> = vec![None; chars.len()];
    for range in &block.entity_ranges {
        if let Some(entity) = entity_map.get(&range.key)
            && entity.entity_type == LINK_ENTITY_TYPE
        {
            let link = link_from_raw(entity);
            for unit in covered(range.offset, range.length) {
                links[unit_to_char[unit]] = Some(link.clone());
            }
        }
    }

    let mut content = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = start;
        while end < chars.len() && links[end] == links[start] {
            end += 1;
        }
        let inner = styled_runs(&chars[start..end], &styles[start..end]);
        match &links[start] {
            Some(link) => content.push(InlineContent::Link {
                link: link.clone(),
                content: inner,
            }),
            None => content.extend(inner),
        }
        start = end;
    }

    content
}

/// Convert a raw JSON document back to the content model
pub fn raw_to_document(raw: &RawContentState) -> ContentDocument {
    let mut doc = ContentDocument::new();
    let mut keys: BTreeMap<&str, EntityKey> = BTreeMap::new();

    for (key, entity) in &raw.entity_map {
        if entity.entity_type == LINK_ENTITY_TYPE {
            continue;
        }
        let data = EntityData::from_json(&entity.entity_type, entity.data.get());
        let stored = doc
            .entities_mut()
            .insert_with_key(EntityKey::new(key.as_str()), entity.mutability, data);
        keys.insert(key.as_str(), stored);
    }

    for raw_block in &raw.blocks {
        let block_type = parse_block_type(&raw_block.block_type);
        let mut block = Block::new(block_type.clone());
        block.key = raw_block.key.clone();
        block.depth = raw_block.depth;
        block.data = raw_block.data.clone();

        if block_type == BlockType::Atomic {
            block.entity = raw_block
                .entity_ranges
                .iter()
                .find_map(|range| keys.get(range.key.as_str()).cloned());
        } else {
            block.content = raw_block_content(raw_block, &raw.entity_map);
            // links became content; anything else stays a range over the text
            block.inline_entities = raw_block
                .entity_ranges
                .iter()
                .filter_map(|range| {
                    let entity = keys.get(range.key.as_str())?;
                    Some(InlineEntityRange {
                        offset: range.offset,
                        length: range.length,
                        entity: entity.clone(),
                    })
                })
                .collect();
        }

        doc.add_block(block);
    }

    doc
}

/// Render a raw JSON document to HTML (color box bodies are produced this way)
pub fn raw_to_html(raw: &RawContentState) -> String {
    document_to_html(&raw_to_document(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::entity::ColorBoxData;

    #[test]
    fn test_parse_editor_output() {
        let json = r#"{
            "blocks": [
                {
                    "key": "a1",
                    "text": "Hello bold link",
                    "type": "header-two",
                    "depth": 0,
                    "inlineStyleRanges": [{ "offset": 6, "length": 4, "style": "BOLD" }],
                    "entityRanges": [{ "offset": 11, "length": 4, "key": 0 }],
                    "data": {}
                }
            ],
            "entityMap": {
                "0": { "type": "LINK", "mutability": "MUTABLE", "data": { "url": "https://example.com" } }
            }
        }"#;
        let raw: RawContentState = serde_json::from_str(json).unwrap();
        let doc = raw_to_document(&raw);

        assert_eq!(doc.block_count(), 1);
        let block = &doc.blocks()[0];
        assert_eq!(block.key, "a1");
        assert_eq!(block.block_type, BlockType::heading(2));
        assert_eq!(
            block.content,
            vec![
                InlineContent::Text(TextRun::plain("Hello ")),
                InlineContent::Text(TextRun::new("bold", TextStyle::bold())),
                InlineContent::Text(TextRun::plain(" ")),
                InlineContent::Link {
                    link: Link::new("https://example.com"),
                    content: vec![InlineContent::Text(TextRun::plain("link"))],
                },
            ]
        );
        // links are inline content, not store entities
        assert!(doc.entities().is_empty());
    }

    #[test]
    fn test_offsets_are_utf16_units() {
        let raw = RawContentState {
            blocks: vec![RawBlock {
                key: "k".to_string(),
                text: "😀ab".to_string(),
                block_type: "unstyled".to_string(),
                depth: 0,
                inline_style_ranges: vec![RawStyleRange {
                    offset: 2,
                    length: 1,
                    style: "ITALIC".to_string(),
                }],
                entity_ranges: Vec::new(),
                data: Map::new(),
            }],
            entity_map: BTreeMap::new(),
        };
        let doc = raw_to_document(&raw);
        assert_eq!(
            doc.blocks()[0].content,
            vec![
                InlineContent::Text(TextRun::plain("😀")),
                InlineContent::Text(TextRun::new("a", TextStyle::italic())),
                InlineContent::Text(TextRun::plain("b")),
            ]
        );

        let back = document_to_raw(&doc).unwrap();
        assert_eq!(back.blocks[0].inline_style_ranges, raw.blocks[0].inline_style_ranges);
    }

    #[test]
    fn test_adjacent_style_ranges_merge() {
        let mut doc = ContentDocument::new();
        doc.add_block(
            Block::paragraph()
                .with_text("ab", TextStyle::bold())
                .with_text(
                    "cd",
                    TextStyle {
                        bold: true,
                        italic: true,
                        ..Default::default()
                    },
                ),
        );
        let raw = document_to_raw(&doc).unwrap();
        assert_eq!(
            raw.blocks[0].inline_style_ranges,
            vec![
                RawStyleRange {
                    offset: 0,
                    length: 4,
                    style: "BOLD".to_string()
                },
                RawStyleRange {
                    offset: 2,
                    length: 2,
                    style: "ITALIC".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_atomic_entity_round_trip() {
        let mut doc = ContentDocument::new();
        let (_, key) = doc.insert_atomic(
            Mutability::Mutable,
            EntityData::ColorBox(ColorBoxData {
                color: "#abc".to_string(),
                body: "<p>x</p>".to_string(),
                raw_content_state: None,
            }),
        );
        let raw = document_to_raw(&doc).unwrap();
        assert_eq!(raw.blocks[0].text, " ");
        assert_eq!(raw.blocks[0].entity_ranges[0].key, key.as_str());
        assert_eq!(raw.entity_map[key.as_str()].entity_type, "color-box");

        let back = raw_to_document(&raw);
        assert!(doc.semantic_eq(&back));
        assert_eq!(back.blocks()[0].entity.as_ref(), Some(&key));
    }

    #[test]
    fn test_opaque_payload_bytes_survive() {
        let json = r#"{"blocks":[{"key":"z","text":" ","type":"atomic","entityRanges":[{"offset":0,"length":1,"key":"7"}]}],
            "entityMap":{"7":{"type":"poll","mutability":"IMMUTABLE","data":{"q" : "why?",  "n":[1,2]}}}}"#;
        let raw: RawContentState = serde_json::from_str(json).unwrap();
        let doc = raw_to_document(&raw);
        let back = document_to_raw(&doc).unwrap();
        assert_eq!(back.entity_map["7"].data.get(), r#"{"q" : "why?",  "n":[1,2]}"#);
        assert_eq!(back.entity_map["7"].mutability, Mutability::Immutable);
    }

    #[test]
    fn test_depth_data_and_inline_entities_survive() {
        let json = r#"{"blocks":[{"key":"li","text":"see note","type":"unordered-list-item","depth":2,
            "data":{"align":"center"},
            "entityRanges":[{"offset":4,"length":4,"key":9},{"offset":0,"length":3,"key":"3"}]}],
            "entityMap":{"3":{"type":"LINK","mutability":"MUTABLE","data":{"url":"https://example.com"}},
            "9":{"type":"ANNOTATION","mutability":"IMMUTABLE","data":{"note" : "check"}}}}"#;
        let raw: RawContentState = serde_json::from_str(json).unwrap();
        let doc = raw_to_document(&raw);

        let block = &doc.blocks()[0];
        assert_eq!(block.depth, 2);
        assert_eq!(block.data["align"], "center");
        assert_eq!(
            block.inline_entities,
            vec![InlineEntityRange {
                offset: 4,
                length: 4,
                entity: EntityKey::from("9"),
            }]
        );

        let back = document_to_raw(&doc).unwrap();
        let block = &back.blocks[0];
        assert_eq!(block.depth, 2);
        assert_eq!(block.data, raw.blocks[0].data);
        let ranges: Vec<(usize, usize, &str)> = block
            .entity_ranges
            .iter()
            .map(|r| (r.offset, r.length, r.key.as_str()))
            .collect();
        assert_eq!(ranges, vec![(0, 3, "link-1"), (4, 4, "9")]);
        assert_eq!(back.entity_map["9"].entity_type, "ANNOTATION");
        assert_eq!(back.entity_map["9"].data.get(), r#"{"note" : "check"}"#);
        assert_eq!(back.entity_map["link-1"].entity_type, LINK_ENTITY_TYPE);
        assert_eq!(back.entity_map.len(), 2);
    }

    #[test]
    fn test_line_breaks_and_unknown_block_types() {
        let mut doc = ContentDocument::new();
        let mut block = Block::new(BlockType::Unknown("pull-quote".to_string()))
            .with_plain_text("one");
        block.content.push(InlineContent::LineBreak);
        block.content.push(InlineContent::Text(TextRun::plain("two")));
        doc.add_block(block);

        let raw = document_to_raw(&doc).unwrap();
        assert_eq!(raw.blocks[0].text, "one\ntwo");
        assert_eq!(raw.blocks[0].block_type, "pull-quote");

        let back = raw_to_document(&raw);
        assert!(doc.semantic_eq(&back));
    }

    #[test]
    fn test_raw_to_html_renders_nested_state() {
        let mut doc = ContentDocument::new();
        doc.add_block(Block::paragraph().with_plain_text("hi"));
        let raw = document_to_raw(&doc).unwrap();
        assert_eq!(raw_to_html(&raw), "<p>hi</p>");
    }
}
