// Media selector: paginated, debounced search over a media library plus the
// user's selection, caption/link metadata, alignment and slideshow delay.
//
// Time is passed in explicitly, so the state machine never sleeps or spawns.
// A query is "fired" by `poll`, which hands out a ticket; only the response
// for the most recent ticket is applied.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::SelectorSettings;
use crate::error::QueryError;
use crate::media::{MediaItem, MediaPage, MediaQuery, MediaSource};
use crate::richtext::entity::Alignment;

/// Collapses a burst of changes into one action after a quiet period
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restart the quiet period
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Make the action due right away
    pub fn fire_now(&mut self, now: Instant) {
        self.deadline = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Returns true (once) when the action is due
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorConfig {
    pub page_size: usize,
    pub multi_select: bool,
    pub enable_caption: bool,
    pub enable_url: bool,
    pub enable_alignment: bool,
    pub enable_delay: bool,
    pub debounce: Duration,
    /// Slideshow delay shown when the selector opens, in seconds
    pub initial_delay: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self::image()
    }
}

impl SelectorConfig {
    /// Image library picker; every option starts disabled
    pub fn image() -> Self {
        SelectorConfig {
            page_size: 6,
            multi_select: false,
            enable_caption: false,
            enable_url: false,
            enable_alignment: false,
            enable_delay: false,
            debounce: Duration::from_millis(300),
            initial_delay: 5.0,
        }
    }

    /// Video picker: single select with a description
    pub fn video() -> Self {
        SelectorConfig {
            enable_caption: true,
            ..Self::image()
        }
    }

    /// Site image picker with a larger grid and uploads
    pub fn site_image() -> Self {
        SelectorConfig {
            page_size: 18,
            ..Self::image()
        }
    }

    /// All slideshow options switched on
    pub fn slideshow(mut self) -> Self {
        self.multi_select = true;
        self.enable_caption = true;
        self.enable_url = true;
        self.enable_alignment = true;
        self.enable_delay = true;
        self
    }

    /// Apply configured page size, debounce and delay to a preset
    pub fn from_settings(mut self, settings: &SelectorSettings, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self.debounce = Duration::from_millis(settings.debounce_ms);
        self.initial_delay = settings.default_delay;
        self
    }
}

/// A failed query, with the request that caused it
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub message: String,
    pub query: MediaQuery,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorState {
    /// Opened, no query issued yet
    Idle,
    Searching,
    Results,
    Error(Diagnostic),
}

/// A fired query; pass it back to `resolve` with the response
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTicket {
    pub id: u64,
    pub query: MediaQuery,
}

/// A picked item and the metadata the user attached to it
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedItem<T> {
    pub item: T,
    pub desc: String,
    pub url: Option<String>,
}

impl<T> SelectedItem<T> {
    pub fn new(item: T) -> Self {
        SelectedItem {
            item,
            desc: String::new(),
            url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorOutcome<T> {
    Confirmed {
        selected: Vec<SelectedItem<T>>,
        alignment: Option<Alignment>,
        /// Seconds, at least 1; only reported when delays are enabled
        delay: Option<f64>,
    },
    Cancelled,
}

#[derive(Debug)]
pub struct Selector<T: MediaItem> {
    config: SelectorConfig,
    state: SelectorState,
    /// 1-based; 0 until the first search
    page: usize,
    search_text: String,
    debouncer: Debouncer,
    next_ticket: u64,
    in_flight: Option<u64>,
    results: Vec<T>,
    count: usize,
    selected: Vec<SelectedItem<T>>,
    alignment: Option<Alignment>,
    delay_text: String,
}

impl<T: MediaItem> Selector<T> {
    pub fn new(config: SelectorConfig) -> Self {
        Self::with_selection(config, Vec::new(), None)
    }

    /// Open on an existing selection (editing a block that already has media)
    pub fn with_selection(
        config: SelectorConfig,
        selected: Vec<SelectedItem<T>>,
        alignment: Option<Alignment>,
    ) -> Self {
        let mut selected = selected;
        if !config.multi_select && selected.len() > 1 {
            selected.truncate(1);
        }
        Selector {
            debouncer: Debouncer::new(config.debounce),
            delay_text: config.initial_delay.to_string(),
            config,
            state: SelectorState::Idle,
            page: 0,
            search_text: String::new(),
            next_ticket: 0,
            in_flight: None,
            results: Vec::new(),
            count: 0,
            selected,
            alignment,
        }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn state(&self) -> &SelectorState {
        &self.state
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn results(&self) -> &[T] {
        &self.results
    }

    /// Total number of matches reported by the last applied response
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn total_pages(&self) -> usize {
        self.count.div_ceil(self.config.page_size.max(1))
    }

    pub fn selected(&self) -> &[SelectedItem<T>] {
        &self.selected
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|s| s.item.id() == id)
    }

    pub fn alignment(&self) -> Option<Alignment> {
        self.alignment
    }

    pub fn delay_text(&self) -> &str {
        &self.delay_text
    }

    /// Show the first page of the unfiltered library
    pub fn open(&mut self, now: Instant) {
        self.set_page(1, now);
    }

    /// New search text: back to page 1, query after the debounce delay
    pub fn set_search_text(&mut self, text: impl Into<String>, now: Instant) {
        self.search_text = text.into();
        self.page = 1;
        self.state = SelectorState::Searching;
        self.debouncer.schedule(now);
    }

    /// Jump to a page; the query is due immediately
    pub fn set_page(&mut self, page: usize, now: Instant) {
        self.page = page.max(1);
        self.state = SelectorState::Searching;
        self.debouncer.fire_now(now);
    }

    fn current_query(&self) -> MediaQuery {
        let take = self.config.page_size;
        MediaQuery {
            search_text: self.search_text.clone(),
            skip: self.page.saturating_sub(1) * take,
            take,
        }
    }

    /// Fire the pending query if its time has come
    pub fn poll(&mut self, now: Instant) -> Option<QueryTicket> {
        if !self.debouncer.take_due(now) {
            return None;
        }

        self.next_ticket += 1;
        self.in_flight = Some(self.next_ticket);
        let ticket = QueryTicket {
            id: self.next_ticket,
            query: self.current_query(),
        };
        debug!(ticket = ticket.id, search = %ticket.query.search_text, skip = ticket.query.skip, "media query fired");
        Some(ticket)
    }

    /// Apply a response. Returns false when the response was stale and dropped.
    pub fn resolve(&mut self, ticket: QueryTicket, result: Result<MediaPage<T>, QueryError>) -> bool {
        if self.in_flight != Some(ticket.id) {
            debug!(ticket = ticket.id, latest = ?self.in_flight, "dropping stale media response");
            return false;
        }
        self.in_flight = None;

        match result {
            Ok(page) => {
                self.count = page.count;
                self.results = page.items;
                // a newer request may already be waiting on the debounce
                if !self.debouncer.is_pending() {
                    self.state = SelectorState::Results;
                }
            }
            Err(err) => {
                self.results.clear();
                self.count = 0;
                self.state = SelectorState::Error(Diagnostic {
                    message: err.to_string(),
                    query: ticket.query,
                });
            }
        }
        true
    }

    /// Poll, run the query against `source` and apply the response
    pub fn run_due<S>(&mut self, now: Instant, source: &S) -> bool
    where
        S: MediaSource<Item = T>,
    {
        match self.poll(now) {
            Some(ticket) => {
                let result = source.search(&ticket.query);
                self.resolve(ticket, result)
            }
            None => false,
        }
    }

    /// Select or deselect an item from the results
    pub fn toggle(&mut self, item: T) {
        let before = self.selected.len();
        self.selected.retain(|s| s.item.id() != item.id());
        if self.selected.len() != before {
            return;
        }

        if self.config.multi_select {
            self.selected.push(SelectedItem::new(item));
        } else {
            self.selected = vec![SelectedItem::new(item)];
        }
    }

    /// Set caption and link of a selected item. Returns false if it is not selected.
    pub fn update_meta(&mut self, id: &str, desc: impl Into<String>, url: Option<String>) -> bool {
        let Some(index) = self.selected.iter().position(|s| s.item.id() == id) else {
            return false;
        };
        let updated = SelectedItem {
            item: self.selected[index].item.clone(),
            desc: desc.into(),
            url: url.filter(|u| !u.is_empty()),
        };

        if self.config.multi_select {
            self.selected = self
                .selected
                .iter()
                .enumerate()
                .map(|(i, s)| if i == index { updated.clone() } else { s.clone() })
                .collect();
        } else {
            self.selected = vec![updated];
        }
        true
    }

    /// Add freshly uploaded items to the selection
    pub fn append_uploaded(&mut self, items: Vec<T>) {
        for item in items {
            if self.is_selected(item.id()) {
                continue;
            }
            if self.config.multi_select {
                self.selected.push(SelectedItem::new(item));
            } else {
                self.selected = vec![SelectedItem::new(item)];
            }
        }
    }

    pub fn set_alignment(&mut self, alignment: Option<Alignment>) {
        self.alignment = alignment;
    }

    /// Raw text of the delay input
    pub fn set_delay(&mut self, text: impl Into<String>) {
        self.delay_text = text.into();
    }

    /// Delay to report: parsed finite input, at least 1 second
    fn adjusted_delay(&self) -> f64 {
        match self.delay_text.trim().parse::<f64>() {
            Ok(delay) if delay.is_finite() && delay >= 1.0 => delay,
            _ => 1.0,
        }
    }

    /// The confirmed selection; the selector itself is left as it is
    pub fn confirm(&self) -> SelectorOutcome<T> {
        let delay = self.config.enable_delay.then(|| self.adjusted_delay());
        let alignment = if self.config.enable_alignment {
            self.alignment
        } else {
            None
        };
        SelectorOutcome::Confirmed {
            selected: self.selected.clone(),
            alignment,
            delay,
        }
    }

    pub fn cancel(self) -> SelectorOutcome<T> {
        SelectorOutcome::Cancelled
    }
}
