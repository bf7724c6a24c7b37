// Custom block editors.
//
// An editor opens over an atomic block (or to create one), tells its host that
// editing started, and finishes exactly once: commit the whole payload, insert
// a new block, or cancel without touching the document.

use std::sync::LazyLock;
use std::time::Instant;

use regex::Regex;
use tracing::debug;

use crate::config::EditorConfig;
use crate::error::{DraftError, DraftResult};
use crate::history::EditHistory;
use crate::media::{ImageItem, MediaSource, VideoItem};
use crate::richtext::content_document::ContentDocument;
use crate::richtext::entity::{
    ColorBoxData, EntityData, EntityKey, ImageBlockData, ImageWithMeta, Mutability, VideoBlockData,
};
use crate::richtext::raw::{RawContentState, raw_to_html};
use crate::selector::{SelectedItem, Selector, SelectorConfig, SelectorOutcome};

static COLOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").expect("valid regex")
});

/// How an edit ended
#[derive(Debug, Clone, PartialEq)]
pub struct EditFinish {
    pub entity_key: Option<EntityKey>,
    pub entity_data: Option<EntityData>,
}

impl EditFinish {
    /// Replace the payload of an existing entity
    pub fn commit(key: EntityKey, data: EntityData) -> Self {
        EditFinish {
            entity_key: Some(key),
            entity_data: Some(data),
        }
    }

    /// Create a new atomic block carrying `data`
    pub fn insert(data: EntityData) -> Self {
        EditFinish {
            entity_key: None,
            entity_data: Some(data),
        }
    }

    pub fn cancel() -> Self {
        EditFinish {
            entity_key: None,
            entity_data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Committed(EntityKey),
    Inserted(EntityKey),
    Cancelled,
}

/// The document side of the editor protocol
pub trait EditHost {
    /// Editing began; the host stops treating the block as read-only
    fn on_edit_start(&mut self);

    /// Editing ended; apply the finish and make the block read-only again
    fn on_edit_finish(&mut self, finish: EditFinish) -> DraftResult<EditOutcome>;
}

/// Host over an in-memory document with undo/redo
#[derive(Debug)]
pub struct DocumentHost {
    document: ContentDocument,
    history: EditHistory,
    /// State when the current edit started
    snapshot: Option<ContentDocument>,
}

impl DocumentHost {
    pub fn new(document: ContentDocument) -> Self {
        Self::with_history(document, EditHistory::new())
    }

    /// Host whose undo depth comes from the configuration
    pub fn from_config(document: ContentDocument, config: &EditorConfig) -> Self {
        Self::with_history(document, EditHistory::with_limit(config.history_limit))
    }

    pub fn with_history(document: ContentDocument, history: EditHistory) -> Self {
        DocumentHost {
            document,
            history,
            snapshot: None,
        }
    }

    pub fn document(&self) -> &ContentDocument {
        &self.document
    }

    pub fn into_document(self) -> ContentDocument {
        self.document
    }

    /// True between `on_edit_start` and `on_edit_finish`
    pub fn is_editing(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Number of edits that can be undone
    pub fn undo_depth(&self) -> usize {
        self.history.len()
    }

    pub fn undo(&mut self) -> bool {
        let current = self.document.clone();
        match self.history.undo(current) {
            Some(previous) => {
                self.document = previous;
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        let current = self.document.clone();
        match self.history.redo(current) {
            Some(next) => {
                self.document = next;
                true
            }
            None => false,
        }
    }
}

impl EditHost for DocumentHost {
    fn on_edit_start(&mut self) {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.document.clone());
        }
    }

    fn on_edit_finish(&mut self, finish: EditFinish) -> DraftResult<EditOutcome> {
        let snapshot = self
            .snapshot
            .take()
            .unwrap_or_else(|| self.document.clone());

        let outcome = match (finish.entity_key, finish.entity_data) {
            (Some(key), Some(data)) => {
                if let Err(err) = self.document.entities_mut().replace_data(&key, data) {
                    // a rejected commit keeps the edit going
                    self.snapshot = Some(snapshot);
                    return Err(err);
                }
                debug!(entity = %key, "entity data committed");
                EditOutcome::Committed(key)
            }
            (None, Some(data)) => {
                let (block, key) = self.document.insert_atomic(Mutability::Mutable, data);
                debug!(entity = %key, block = %block, "atomic block inserted");
                EditOutcome::Inserted(key)
            }
            (key, None) => {
                debug!(entity = ?key, "edit cancelled");
                return Ok(EditOutcome::Cancelled);
            }
        };

        self.history.push(snapshot);
        Ok(outcome)
    }
}

/// Open/closed state shared by every block editor
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    target: Option<EntityKey>,
    open: bool,
}

impl EditSession {
    /// A session editing `target`, or creating a new block when None
    pub fn new(target: Option<EntityKey>) -> Self {
        EditSession {
            target,
            open: false,
        }
    }

    pub fn target(&self) -> Option<&EntityKey> {
        self.target.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open the session. The host hears about it once per opening.
    pub fn start<H: EditHost + ?Sized>(&mut self, host: &mut H) -> bool {
        if self.open {
            return false;
        }
        self.open = true;
        host.on_edit_start();
        true
    }

    /// Finish with `data`. If the host rejects it the session stays open.
    pub fn commit<H: EditHost + ?Sized>(&mut self, host: &mut H, data: EntityData) -> DraftResult<EditOutcome> {
        self.start(host);
        let finish = match &self.target {
            Some(key) => EditFinish::commit(key.clone(), data),
            None => EditFinish::insert(data),
        };
        let outcome = host.on_edit_finish(finish)?;
        self.open = false;
        Ok(outcome)
    }

    pub fn cancel<H: EditHost + ?Sized>(&mut self, host: &mut H) -> DraftResult<EditOutcome> {
        if !self.open {
            return Ok(EditOutcome::Cancelled);
        }
        self.open = false;
        host.on_edit_finish(EditFinish::cancel())
    }
}

pub fn validate_color(color: &str) -> DraftResult<()> {
    if COLOR_PATTERN.is_match(color) {
        Ok(())
    } else {
        Err(DraftError::InvalidColor(color.to_string()))
    }
}

/// Editor for color boxes: a background color plus a nested rich-text body
#[derive(Debug, Clone)]
pub struct ColorBoxEditor {
    session: EditSession,
    color: String,
    raw_content_state: RawContentState,
}

impl Default for ColorBoxEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorBoxEditor {
    /// A new, empty box
    pub fn new() -> Self {
        ColorBoxEditor {
            session: EditSession::new(None),
            color: "#ffffff".to_string(),
            raw_content_state: RawContentState::default(),
        }
    }

    /// Edit an existing box
    pub fn for_entity(key: EntityKey, data: &ColorBoxData) -> Self {
        ColorBoxEditor {
            session: EditSession::new(Some(key)),
            color: data.color.clone(),
            raw_content_state: data.raw_content_state.clone().unwrap_or_default(),
        }
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn raw_content_state(&self) -> &RawContentState {
        &self.raw_content_state
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn open<H: EditHost + ?Sized>(&mut self, host: &mut H) {
        self.session.start(host);
    }

    /// Commit color and body. An invalid color leaves the editor open.
    pub fn commit<H: EditHost + ?Sized>(
        &mut self,
        host: &mut H,
        color: &str,
        raw_content_state: RawContentState,
    ) -> DraftResult<EditOutcome> {
        validate_color(color)?;

        self.color = color.to_string();
        self.raw_content_state = raw_content_state;
        let data = ColorBoxData {
            color: self.color.clone(),
            body: raw_to_html(&self.raw_content_state),
            raw_content_state: Some(self.raw_content_state.clone()),
        };
        self.session.commit(host, EntityData::ColorBox(data))
    }

    pub fn cancel<H: EditHost + ?Sized>(&mut self, host: &mut H) -> DraftResult<EditOutcome> {
        self.session.cancel(host)
    }
}

/// Image or slideshow block editor backed by a media selector
#[derive(Debug)]
pub struct ImageBlockEditor<S> {
    session: EditSession,
    selector: Selector<ImageItem>,
    source: S,
}

impl<S: MediaSource<Item = ImageItem>> ImageBlockEditor<S> {
    pub fn new(source: S, config: SelectorConfig) -> Self {
        ImageBlockEditor {
            session: EditSession::new(None),
            selector: Selector::new(config),
            source,
        }
    }

    /// Reopen an existing block with its images preselected
    pub fn for_entity(source: S, config: SelectorConfig, key: EntityKey, data: &ImageBlockData) -> Self {
        let selected = data
            .images
            .iter()
            .map(|meta| SelectedItem {
                item: meta.image.clone(),
                desc: meta.desc.clone(),
                url: meta.url.clone(),
            })
            .collect();
        let mut selector = Selector::with_selection(config, selected, data.alignment);
        if let Some(delay) = data.delay {
            selector.set_delay(delay.to_string());
        }

        ImageBlockEditor {
            session: EditSession::new(Some(key)),
            selector,
            source,
        }
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn selector(&self) -> &Selector<ImageItem> {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut Selector<ImageItem> {
        &mut self.selector
    }

    /// Start editing and load the first page
    pub fn open<H: EditHost + ?Sized>(&mut self, host: &mut H, now: Instant) {
        if self.session.start(host) {
            self.selector.open(now);
        }
    }

    /// Run the selector's pending query, if due
    pub fn run_due(&mut self, now: Instant) -> bool {
        self.selector.run_due(now, &self.source)
    }

    /// Commit the selection. A rejected commit leaves the editor open.
    pub fn confirm<H: EditHost + ?Sized>(&mut self, host: &mut H) -> DraftResult<EditOutcome> {
        match self.selector.confirm() {
            SelectorOutcome::Confirmed {
                selected,
                alignment,
                delay,
            } if !selected.is_empty() => {
                let images = selected
                    .into_iter()
                    .map(|s| ImageWithMeta {
                        image: s.item,
                        desc: s.desc,
                        url: s.url,
                    })
                    .collect();
                let data = ImageBlockData {
                    images,
                    alignment,
                    delay,
                };
                self.session.commit(host, EntityData::Image(data))
            }
            _ => self.session.cancel(host),
        }
    }

    pub fn cancel<H: EditHost + ?Sized>(mut self, host: &mut H) -> DraftResult<EditOutcome> {
        self.session.cancel(host)
    }
}

/// Video block editor backed by a single-select media selector
#[derive(Debug)]
pub struct VideoBlockEditor<S> {
    session: EditSession,
    selector: Selector<VideoItem>,
    source: S,
}

impl<S: MediaSource<Item = VideoItem>> VideoBlockEditor<S> {
    pub fn new(source: S, config: SelectorConfig) -> Self {
        VideoBlockEditor {
            session: EditSession::new(None),
            selector: Selector::new(config),
            source,
        }
    }

    pub fn for_entity(source: S, config: SelectorConfig, key: EntityKey, data: &VideoBlockData) -> Self {
        let selected = vec![SelectedItem {
            item: data.video.clone(),
            desc: data.desc.clone(),
            url: None,
        }];

        VideoBlockEditor {
            session: EditSession::new(Some(key)),
            selector: Selector::with_selection(config, selected, None),
            source,
        }
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn selector(&self) -> &Selector<VideoItem> {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut Selector<VideoItem> {
        &mut self.selector
    }

    pub fn open<H: EditHost + ?Sized>(&mut self, host: &mut H, now: Instant) {
        if self.session.start(host) {
            self.selector.open(now);
        }
    }

    pub fn run_due(&mut self, now: Instant) -> bool {
        self.selector.run_due(now, &self.source)
    }

    pub fn confirm<H: EditHost + ?Sized>(&mut self, host: &mut H) -> DraftResult<EditOutcome> {
        let picked = match self.selector.confirm() {
            SelectorOutcome::Confirmed { selected, .. } => selected.into_iter().next(),
            SelectorOutcome::Cancelled => None,
        };
        match picked {
            Some(picked) => {
                let data = VideoBlockData {
                    video: picked.item,
                    desc: picked.desc,
                };
                self.session.commit(host, EntityData::Video(data))
            }
            None => self.session.cancel(host),
        }
    }

    pub fn cancel<H: EditHost + ?Sized>(mut self, host: &mut H) -> DraftResult<EditOutcome> {
        self.session.cancel(host)
    }
}
