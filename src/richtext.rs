// Rich text: the block/entity document model and its storage formats

pub mod api_data;
pub mod content_document;
pub mod entity;
pub mod html_converter;
pub mod html_parser;
pub mod raw;

pub use content_document::{Block, BlockKey, BlockType, ContentDocument, InlineContent, Link, TextRun, TextStyle};
pub use entity::{Entity, EntityData, EntityKey, EntityStore, EntityType, Mutability};
pub use html_converter::{document_to_html, html_to_document};
