#![forbid(unsafe_code)]

//! Picker model shared by the terminal and scripted delegates.
//!
//! [`PickerState`] holds the input line, the candidate list last fetched from
//! the source, and the selection. It knows nothing about terminals: callers
//! feed it [`PickerKey`]s and render what it exposes.
//!
//! The cursor counts grapheme clusters, so a combining sequence or an emoji
//! with modifiers moves and deletes as one unit.

use asel_core::{CandidateSource, CompletionAction, CompletionResult, QueryChannel, TryCompletion};
use unicode_segmentation::UnicodeSegmentation;

use crate::delegate::SelectOptions;

/// Status shown when Tab finds nothing.
pub const STATUS_NO_MATCH: &str = "[No match]";
/// Status shown when Tab finds the query is the only candidate.
pub const STATUS_SOLE: &str = "[Sole completion]";
/// Status shown when Tab cannot extend the query.
pub const STATUS_NOT_UNIQUE: &str = "[Complete, but not unique]";

/// Editing and navigation input understood by the picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerKey {
    Char(char),
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Up,
    Down,
    /// Extend the query by try-completion.
    Complete,
    /// Clear the input line.
    Clear,
    Accept,
    Cancel,
}

/// What the caller should do after a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    Continue,
    Accept(String),
    Cancel,
}

/// Scroll window over the candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Viewport {
    selected: usize,
    offset: usize,
    height: usize,
}

impl Viewport {
    fn new(height: usize) -> Self {
        Self {
            selected: 0,
            offset: 0,
            height: height.max(1),
        }
    }

    fn update_selection(&mut self, selected: usize, item_count: usize) {
        if item_count == 0 {
            self.selected = 0;
            self.offset = 0;
            return;
        }
        self.selected = selected.min(item_count - 1);
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + self.height {
            self.offset = self.selected + 1 - self.height;
        }
        let max_offset = item_count.saturating_sub(self.height);
        self.offset = self.offset.min(max_offset);
    }

    fn reset(&mut self) {
        self.selected = 0;
        self.offset = 0;
    }
}

/// Input line, candidates, and selection for one prompt.
#[derive(Debug, Clone)]
pub struct PickerState {
    query: String,
    cursor: usize,
    candidates: Vec<String>,
    viewport: Viewport,
    status: Option<&'static str>,
    require_match: bool,
    default: Option<String>,
}

impl PickerState {
    /// Start a picker for `options`, showing up to `height` candidates.
    pub fn new(options: &SelectOptions, height: usize) -> Self {
        let query = options.initial_input.clone().unwrap_or_default();
        let cursor = query.graphemes(true).count();
        Self {
            query,
            cursor,
            candidates: Vec::new(),
            viewport: Viewport::new(height),
            status: None,
            require_match: options.require_match,
            default: options.default.clone(),
        }
    }

    /// Current input text.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Cursor position in grapheme clusters.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Byte offset of the cursor in [`query`](Self::query).
    pub fn cursor_byte(&self) -> usize {
        byte_offset(&self.query, self.cursor)
    }

    /// Candidates from the last refresh.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Index of the highlighted candidate.
    pub fn selected(&self) -> usize {
        self.viewport.selected
    }

    /// The highlighted candidate, if any.
    pub fn selected_candidate(&self) -> Option<&str> {
        self.candidates.get(self.viewport.selected).map(String::as_str)
    }

    /// Index of the first visible candidate.
    pub fn offset(&self) -> usize {
        self.viewport.offset
    }

    /// Candidates inside the viewport, with their absolute indices.
    pub fn visible(&self) -> impl Iterator<Item = (usize, &str)> {
        self.candidates
            .iter()
            .enumerate()
            .skip(self.viewport.offset)
            .take(self.viewport.height)
            .map(|(i, c)| (i, c.as_str()))
    }

    /// Highlight candidate `index` (clamped to the list).
    pub fn select_index(&mut self, index: usize) {
        self.viewport.update_selection(index, self.candidates.len());
    }

    /// Resize the viewport.
    pub fn set_height(&mut self, height: usize) {
        self.viewport.height = height.max(1);
        self.viewport
            .update_selection(self.viewport.selected, self.candidates.len());
    }

    /// Transient message from the last key, if any.
    pub fn status(&self) -> Option<&'static str> {
        self.status
    }

    /// Re-read candidates for the unchanged query.
    ///
    /// Keeps the input, the cursor, and the highlighted candidate (by value
    /// when it is still listed).
    pub fn refresh(&mut self, source: &mut dyn CandidateSource, channel: &QueryChannel) {
        let previous = self.selected_candidate().map(str::to_owned);
        self.candidates = source
            .query(&self.query, channel, CompletionAction::All)
            .into_candidates();
        let selected = previous
            .and_then(|p| self.candidates.iter().position(|c| *c == p))
            .unwrap_or(self.viewport.selected);
        self.viewport.update_selection(selected, self.candidates.len());
    }

    /// Re-read candidates after the query changed, resetting the selection.
    fn requery(&mut self, source: &mut dyn CandidateSource, channel: &QueryChannel) {
        self.viewport.reset();
        self.candidates = source
            .query(&self.query, channel, CompletionAction::All)
            .into_candidates();
        self.viewport.update_selection(0, self.candidates.len());
    }

    /// Apply one key.
    pub fn handle_key(
        &mut self,
        key: PickerKey,
        source: &mut dyn CandidateSource,
        channel: &QueryChannel,
    ) -> PickerOutcome {
        self.status = None;
        match key {
            PickerKey::Char(c) => {
                let at = self.cursor_byte();
                self.query.insert(at, c);
                self.cursor = self.query[..at + c.len_utf8()].graphemes(true).count();
                self.requery(source, channel);
            }
            PickerKey::Backspace => {
                if self.cursor > 0 {
                    self.remove_grapheme(self.cursor - 1);
                    self.cursor -= 1;
                    self.requery(source, channel);
                }
            }
            PickerKey::Delete => {
                if self.cursor < self.grapheme_len() {
                    self.remove_grapheme(self.cursor);
                    self.requery(source, channel);
                }
            }
            PickerKey::Left => self.cursor = self.cursor.saturating_sub(1),
            PickerKey::Right => self.cursor = (self.cursor + 1).min(self.grapheme_len()),
            PickerKey::Home => self.cursor = 0,
            PickerKey::End => self.cursor = self.grapheme_len(),
            PickerKey::Up => {
                let selected = self.viewport.selected.saturating_sub(1);
                self.viewport.update_selection(selected, self.candidates.len());
            }
            PickerKey::Down => {
                let selected = self.viewport.selected + 1;
                self.viewport.update_selection(selected, self.candidates.len());
            }
            PickerKey::Complete => self.complete(source, channel),
            PickerKey::Clear => {
                self.query.clear();
                self.cursor = 0;
                self.requery(source, channel);
            }
            PickerKey::Accept => return self.accept(source, channel),
            PickerKey::Cancel => return PickerOutcome::Cancel,
        }
        PickerOutcome::Continue
    }

    fn complete(&mut self, source: &mut dyn CandidateSource, channel: &QueryChannel) {
        match source.query(&self.query, channel, CompletionAction::Try) {
            CompletionResult::Try(TryCompletion::NoMatch) => self.status = Some(STATUS_NO_MATCH),
            CompletionResult::Try(TryCompletion::Exact) => self.status = Some(STATUS_SOLE),
            CompletionResult::Try(TryCompletion::Prefix(prefix)) if prefix != self.query => {
                self.query = prefix;
                self.cursor = self.grapheme_len();
                self.requery(source, channel);
            }
            CompletionResult::Try(TryCompletion::Prefix(_)) => {
                self.status = Some(STATUS_NOT_UNIQUE);
            }
            other => tracing::debug!(?other, "source ignored try-completion"),
        }
    }

    fn accept(&mut self, source: &mut dyn CandidateSource, channel: &QueryChannel) -> PickerOutcome {
        if self.query.is_empty()
            && let Some(default) = &self.default
        {
            return PickerOutcome::Accept(default.clone());
        }
        if let Some(choice) = self.selected_candidate() {
            return PickerOutcome::Accept(choice.to_owned());
        }
        if self.require_match {
            let exact = source.query(&self.query, channel, CompletionAction::Test);
            if exact != CompletionResult::Test(true) {
                self.status = Some(STATUS_NO_MATCH);
                return PickerOutcome::Continue;
            }
        }
        PickerOutcome::Accept(self.query.clone())
    }

    fn grapheme_len(&self) -> usize {
        self.query.graphemes(true).count()
    }

    fn remove_grapheme(&mut self, index: usize) {
        let start = byte_offset(&self.query, index);
        let end = byte_offset(&self.query, index + 1);
        self.query.replace_range(start..end, "");
    }
}

/// Byte offset of the `index`-th grapheme boundary (clamped to the end).
fn byte_offset(text: &str, index: usize) -> usize {
    text.grapheme_indices(true)
        .nth(index)
        .map_or(text.len(), |(i, _)| i)
}
