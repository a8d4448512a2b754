//! Label picker shown after a shape is finished.

use std::collections::VecDeque;

use crate::model::{Category, CompletedShape, LabelRegistry};

/// Picker state. Call [`LabelPopup::sync`] once per frame with the desired
/// visibility; setup runs once on each hidden-to-visible transition.
///
/// Shapes finished while the picker is open wait their turn and are labeled
/// in completion order.
#[derive(Debug, Clone, Default)]
pub struct LabelPopup {
    visible: bool,
    has_initialized: bool,
    /// Label key under the cursor
    selected: Option<String>,
    filter: String,
    last_used: Option<String>,
    pending: VecDeque<CompletedShape>,
}

impl LabelPopup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn last_used(&self) -> Option<&str> {
        self.last_used.as_deref()
    }

    /// The shape currently being labeled.
    pub fn pending_shape(&self) -> Option<&CompletedShape> {
        self.pending.front()
    }

    /// Shapes waiting for a label, including the current one.
    pub fn queued(&self) -> usize {
        self.pending.len()
    }

    /// Open the picker for a freshly completed shape, or queue it behind the
    /// one being labeled.
    pub fn open(&mut self, shape: CompletedShape, labels: &LabelRegistry) {
        self.pending.push_back(shape);
        if self.pending.len() > 1 {
            log::debug!("Queued shape for labeling, {} waiting", self.pending.len());
        }
        self.sync(true, labels);
    }

    pub fn sync(&mut self, visible: bool, labels: &LabelRegistry) {
        if visible && !self.has_initialized {
            self.initialize(labels);
            self.has_initialized = true;
        } else if !visible {
            self.has_initialized = false;
        }
        self.visible = visible;
    }

    fn initialize(&mut self, labels: &LabelRegistry) {
        self.filter.clear();
        self.selected = self
            .last_used
            .as_ref()
            .filter(|name| labels.get(name).is_some())
            .cloned()
            .or_else(|| labels.categories().first().map(|c| c.name.clone()));
        log::debug!("Label popup opened, preselected {:?}", self.selected);
    }

    /// Narrow the list and keep the selection inside it.
    pub fn set_filter(&mut self, filter: &str, labels: &LabelRegistry) {
        self.filter = filter.to_string();
        let matches = self.matching(labels);
        let still_listed = self
            .selected
            .as_ref()
            .is_some_and(|s| matches.iter().any(|c| &c.name == s));
        if !still_listed {
            self.selected = matches.first().map(|c| c.name.clone());
        }
    }

    /// Categories whose name or display name contains the filter, ignoring case.
    pub fn matching<'a>(&self, labels: &'a LabelRegistry) -> Vec<&'a Category> {
        let needle = self.filter.to_lowercase();
        labels
            .categories()
            .iter()
            .filter(|c| {
                needle.is_empty()
                    || c.name.to_lowercase().contains(&needle)
                    || c.title().to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn select(&mut self, name: &str) {
        self.selected = Some(name.to_string());
    }

    /// Accept the selection. Returns the shape with its label and closes.
    pub fn confirm(&mut self, labels: &LabelRegistry) -> Option<(CompletedShape, String)> {
        let label = self.selected.clone()?;
        let shape = self.pending.pop_front()?;
        self.last_used = Some(label.clone());
        self.advance(labels);
        log::info!("Labeled new {} as '{}'", shape.kind(), label);
        Some((shape, label))
    }

    /// Skip the current shape without labeling and return it to the caller.
    pub fn dismiss(&mut self, labels: &LabelRegistry) -> Option<CompletedShape> {
        let shape = self.pending.pop_front();
        self.advance(labels);
        shape
    }

    /// Close, then show again fresh if more shapes are waiting.
    fn advance(&mut self, labels: &LabelRegistry) {
        self.sync(false, labels);
        if !self.pending.is_empty() {
            self.sync(true, labels);
        }
    }
}
