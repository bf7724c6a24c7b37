// Library exports for draft-editor

pub mod config;
pub mod editor;
pub mod error;
pub mod history;
pub mod media;
pub mod render;
pub mod richtext;
pub mod selector;
pub mod store;

pub use error::{DraftError, DraftResult, QueryError};
