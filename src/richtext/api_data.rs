// API data export: a flat, consumer-friendly projection of a document that is
// stored next to the HTML. Consecutive list items collapse into one entry.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::content_document::{Block, BlockType, ContentDocument};
use super::entity::EntityData;
use super::html_converter::inline_content_to_html;
use super::raw::block_type_name;

const DEFAULT_ALIGNMENT: &str = "center";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDataBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    pub alignment: String,
    pub content: Vec<Value>,
    pub styles: Map<String, Value>,
}

impl ApiDataBlock {
    fn new(id: &str, block_type: impl Into<String>, content: Vec<Value>) -> Self {
        ApiDataBlock {
            id: id.to_string(),
            block_type: block_type.into(),
            alignment: DEFAULT_ALIGNMENT.to_string(),
            content,
            styles: Map::new(),
        }
    }
}

pub fn document_to_api_data(doc: &ContentDocument) -> Vec<ApiDataBlock> {
    let mut output = Vec::new();
    let blocks = doc.blocks();
    let mut i = 0;

    while i < blocks.len() {
        let block = &blocks[i];

        if let BlockType::ListItem { .. } = block.block_type {
            let mut items = Vec::new();
            while i < blocks.len() && blocks[i].block_type == block.block_type {
                items.push(Value::String(inline_content_to_html(&blocks[i].content, false)));
                i += 1;
            }
            output.push(ApiDataBlock::new(&block.key, block_type_name(&block.block_type), items));
            continue;
        }

        output.push(match block.block_type {
            BlockType::Atomic => atomic_to_api_data(doc, block),
            _ => {
                let preformatted = block.block_type == BlockType::CodeBlock;
                let html = inline_content_to_html(&block.content, preformatted);
                ApiDataBlock::new(&block.key, block_type_name(&block.block_type), vec![Value::String(html)])
            }
        });
        i += 1;
    }

    output
}

fn atomic_to_api_data(doc: &ContentDocument, block: &Block) -> ApiDataBlock {
    let entity = block
        .entity
        .as_ref()
        .and_then(|key| doc.entities().get(key).ok());
    let Some(entity) = entity else {
        warn!(block = %block.key, "atomic block without entity in api data");
        return ApiDataBlock::new(&block.key, block_type_name(&block.block_type), Vec::new());
    };

    let payload = entity.data.to_value().unwrap_or_else(|err| {
        warn!(entity = %entity.key, "entity payload is not JSON, exporting as text: {err}");
        Value::String(entity.data.to_json().unwrap_or_default())
    });

    let mut api = ApiDataBlock::new(&block.key, entity.data.type_tag(), vec![payload]);
    if let EntityData::Image(image) = &entity.data
        && let Some(alignment) = image.alignment
    {
        api.alignment = alignment.as_str().to_string();
    }
    api
}
