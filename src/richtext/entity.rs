// Entities: out-of-band structured payloads referenced by atomic blocks.
// The payload shape is a closed sum keyed by the entity type, so a payload can
// never be stored under a type it does not belong to.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::raw::RawContentState;
use crate::error::{DraftError, DraftResult};
use crate::media::{ImageItem, VideoItem};

pub const COLOR_BOX_TYPE: &str = "color-box";
pub const IMAGE_TYPE: &str = "image";
pub const VIDEO_TYPE: &str = "video";

/// Opaque identifier of an entity within one document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        EntityKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(key: &str) -> Self {
        EntityKey::new(key)
    }
}

/// Whether the editor may change an entity's data after creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mutability {
    #[default]
    Mutable,
    Immutable,
    Segmented,
}

impl Mutability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mutability::Mutable => "MUTABLE",
            Mutability::Immutable => "IMMUTABLE",
            Mutability::Segmented => "SEGMENTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "MUTABLE" => Some(Mutability::Mutable),
            "IMMUTABLE" => Some(Mutability::Immutable),
            "SEGMENTED" => Some(Mutability::Segmented),
            _ => None,
        }
    }
}

/// The type tag of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityType {
    ColorBox,
    Image,
    Video,
    Other(String),
}

impl EntityType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            COLOR_BOX_TYPE => EntityType::ColorBox,
            IMAGE_TYPE => EntityType::Image,
            VIDEO_TYPE => EntityType::Video,
            other => EntityType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntityType::ColorBox => COLOR_BOX_TYPE,
            EntityType::Image => IMAGE_TYPE,
            EntityType::Video => VIDEO_TYPE,
            EntityType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colored callout box. `body` is the pre-rendered HTML of `raw_content_state`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorBoxData {
    pub color: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content_state: Option<RawContentState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Right,
}

impl Alignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Right => "right",
        }
    }
}

/// A picked image plus the caption/link the editor attached to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageWithMeta {
    pub image: ImageItem,
    #[serde(default)]
    pub desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Single image or slideshow block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageBlockData {
    pub images: Vec<ImageWithMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    /// Slideshow delay in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoBlockData {
    pub video: VideoItem,
    #[serde(default)]
    pub desc: String,
}

/// Payload of a type this crate does not model; `raw` is kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueData {
    pub entity_type: String,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityData {
    ColorBox(ColorBoxData),
    Image(ImageBlockData),
    Video(VideoBlockData),
    Opaque(OpaqueData),
}

impl EntityData {
    /// Decode a payload for the given type tag.
    ///
    /// Unknown tags, and known tags whose payload does not fit the expected
    /// shape, are kept as `Opaque` so that nothing is lost.
    pub fn from_json(type_tag: &str, raw: &str) -> Self {
        let typed = match EntityType::from_tag(type_tag) {
            EntityType::ColorBox => serde_json::from_str(raw).map(EntityData::ColorBox),
            EntityType::Image => serde_json::from_str(raw).map(EntityData::Image),
            EntityType::Video => serde_json::from_str(raw).map(EntityData::Video),
            EntityType::Other(_) => return Self::opaque(type_tag, raw),
        };

        typed.unwrap_or_else(|err| {
            debug!(entity_type = type_tag, "keeping payload opaque: {err}");
            Self::opaque(type_tag, raw)
        })
    }

    pub fn opaque(type_tag: &str, raw: &str) -> Self {
        EntityData::Opaque(OpaqueData {
            entity_type: type_tag.to_string(),
            raw: raw.to_string(),
        })
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityData::ColorBox(_) => EntityType::ColorBox,
            EntityData::Image(_) => EntityType::Image,
            EntityData::Video(_) => EntityType::Video,
            EntityData::Opaque(data) => EntityType::from_tag(&data.entity_type),
        }
    }

    pub fn type_tag(&self) -> &str {
        match self {
            EntityData::ColorBox(_) => COLOR_BOX_TYPE,
            EntityData::Image(_) => IMAGE_TYPE,
            EntityData::Video(_) => VIDEO_TYPE,
            EntityData::Opaque(data) => &data.entity_type,
        }
    }

    /// Serialize the payload. Opaque payloads come back exactly as stored.
    pub fn to_json(&self) -> DraftResult<String> {
        Ok(match self {
            EntityData::ColorBox(data) => serde_json::to_string(data)?,
            EntityData::Image(data) => serde_json::to_string(data)?,
            EntityData::Video(data) => serde_json::to_string(data)?,
            EntityData::Opaque(data) => data.raw.clone(),
        })
    }

    pub fn to_value(&self) -> DraftResult<Value> {
        Ok(match self {
            EntityData::ColorBox(data) => serde_json::to_value(data)?,
            EntityData::Image(data) => serde_json::to_value(data)?,
            EntityData::Video(data) => serde_json::to_value(data)?,
            EntityData::Opaque(data) => serde_json::from_str(&data.raw)?,
        })
    }

    /// Pre-rendered HTML carried by the payload, if any
    pub fn body(&self) -> Option<&str> {
        match self {
            EntityData::ColorBox(data) if !data.body.is_empty() => Some(&data.body),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub key: EntityKey,
    pub mutability: Mutability,
    pub data: EntityData,
}

impl Entity {
    pub fn entity_type(&self) -> EntityType {
        self.data.entity_type()
    }
}

/// All entities of one document, keyed by `EntityKey`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityStore {
    entities: BTreeMap<EntityKey, Entity>,
    next_key: u64,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &EntityKey) -> DraftResult<&Entity> {
        self.entities
            .get(key)
            .ok_or_else(|| DraftError::EntityNotFound(key.clone()))
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    fn fresh_key(&mut self) -> EntityKey {
        loop {
            self.next_key += 1;
            let key = EntityKey(format!("e{}", self.next_key));
            if !self.entities.contains_key(&key) {
                return key;
            }
        }
    }

    /// Create an entity under a freshly generated key
    pub fn create(&mut self, mutability: Mutability, data: EntityData) -> EntityKey {
        let key = self.fresh_key();
        self.entities.insert(
            key.clone(),
            Entity {
                key: key.clone(),
                mutability,
                data,
            },
        );
        key
    }

    /// Create an entity, keeping `key` unless it is already taken.
    /// Returns the key actually used.
    pub fn insert_with_key(
        &mut self,
        key: EntityKey,
        mutability: Mutability,
        data: EntityData,
    ) -> EntityKey {
        let key = if key.as_str().is_empty() || self.entities.contains_key(&key) {
            self.fresh_key()
        } else {
            key
        };
        self.entities.insert(
            key.clone(),
            Entity {
                key: key.clone(),
                mutability,
                data,
            },
        );
        key
    }

    /// Shallow merge: replaces only the top-level fields present in `partial`.
    ///
    /// The merged payload is decoded again under the entity's type; if it no
    /// longer fits, it is kept as an opaque payload of the same type.
    pub fn merge_data(&mut self, key: &EntityKey, partial: Map<String, Value>) -> DraftResult<()> {
        let entity = self
            .entities
            .get_mut(key)
            .ok_or_else(|| DraftError::EntityNotFound(key.clone()))?;

        let mut value = entity.data.to_value()?;
        let Value::Object(fields) = &mut value else {
            return Err(DraftError::NotAnObject(key.clone()));
        };
        fields.extend(partial);

        let raw = serde_json::to_string(&value)?;
        let type_tag = entity.data.type_tag().to_string();
        entity.data = EntityData::from_json(&type_tag, &raw);
        Ok(())
    }

    /// Replace the whole payload in one step. Only MUTABLE entities accept this,
    /// and the entity type must stay the same.
    pub fn replace_data(&mut self, key: &EntityKey, data: EntityData) -> DraftResult<()> {
        let entity = self
            .entities
            .get_mut(key)
            .ok_or_else(|| DraftError::EntityNotFound(key.clone()))?;

        if entity.mutability != Mutability::Mutable {
            return Err(DraftError::ImmutableEntity(key.clone()));
        }
        if entity.data.type_tag() != data.type_tag() {
            return Err(DraftError::EntityTypeMismatch {
                key: key.clone(),
                expected: entity.data.type_tag().to_string(),
                found: data.type_tag().to_string(),
            });
        }

        entity.data = data;
        Ok(())
    }
}
