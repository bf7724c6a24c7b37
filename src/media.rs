// Media library shapes and the search interface the selectors depend on.
// The transport behind `MediaSource` (GraphQL in production) is the host's concern.

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Pre-sized renditions of an uploaded image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResizedVariants {
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub w480: String,
    #[serde(default)]
    pub w800: String,
    #[serde(default)]
    pub w1200: String,
    #[serde(default)]
    pub w1600: String,
    #[serde(default)]
    pub w2400: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageFile {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub image_file: ImageFile,
    #[serde(default)]
    pub resized: ResizedVariants,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resized_webp: Option<ResizedVariants>,
}

impl ImageItem {
    /// URL used for grid thumbnails, falling back to the uploaded file
    pub fn preview_url(&self) -> &str {
        if self.resized.w800.is_empty() {
            &self.image_file.url
        } else {
            &self.resized.w800
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default)]
    pub filesize: u64,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<VideoFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_image: Option<ImageItem>,
}

impl VideoItem {
    /// First playable source: the transcoded stream, then the raw upload
    pub fn source_url(&self) -> Option<&str> {
        self.video_src
            .as_deref()
            .filter(|src| !src.is_empty())
            .or_else(|| self.file.as_ref().map(|f| f.url.as_str()))
    }
}

/// Anything a selector can list and pick
pub trait MediaItem: Clone {
    fn id(&self) -> &str;
    fn name(&self) -> Option<&str>;
}

impl MediaItem for ImageItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl MediaItem for VideoItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Variables of one paginated search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaQuery {
    pub search_text: String,
    pub skip: usize,
    pub take: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaPage<T> {
    /// Total number of matches, not just this page
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> Default for MediaPage<T> {
    fn default() -> Self {
        MediaPage {
            count: 0,
            items: Vec::new(),
        }
    }
}

/// Paginated search endpoint over a media library.
pub trait MediaSource {
    type Item: MediaItem;

    fn search(&self, query: &MediaQuery) -> Result<MediaPage<Self::Item>, QueryError>;
}

/// A media library held in memory, newest item last.
///
/// Searches match on name containment and list newest first, the same ordering
/// the production queries use (`orderBy: { id: desc }` over increasing ids).
#[derive(Debug, Clone, Default)]
pub struct InMemoryLibrary<T> {
    items: Vec<T>,
}

impl<T: MediaItem> InMemoryLibrary<T> {
    pub fn new(items: Vec<T>) -> Self {
        InMemoryLibrary { items }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: MediaItem> MediaSource for InMemoryLibrary<T> {
    type Item = T;

    fn search(&self, query: &MediaQuery) -> Result<MediaPage<T>, QueryError> {
        if query.take == 0 {
            return Err(QueryError::Validation("take must be positive".to_string()));
        }

        let matches: Vec<&T> = self
            .items
            .iter()
            .rev()
            .filter(|item| item.name().unwrap_or_default().contains(&query.search_text))
            .collect();

        Ok(MediaPage {
            count: matches.len(),
            items: matches
                .into_iter()
                .skip(query.skip)
                .take(query.take)
                .cloned()
                .collect(),
        })
    }
}
