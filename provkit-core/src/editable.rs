//! Editable copy of the selected source and its dirty tracking.
//!
//! All user edits run through [`EditableSource::update`], which compares the
//! record before and after the edit. Programmatic resets go through
//! [`EditableSource::replace`] and are never reported as edits.

use crate::fields::{AdvancedView, BasicView};
use crate::types::ProviderSource;

/// Tracks whether the editable copy has unsaved edits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyTracker {
    dirty: bool,
    suppressed: bool,
}

impl DirtyTracker {
    /// A tracker with no pending edits.
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Ignore the next observed update cycle.
    pub fn suppress(&mut self) {
        self.suppressed = true;
    }

    /// Record the outcome of one update cycle.
    ///
    /// A suppressed cycle is consumed without touching the dirty flag.
    pub fn observe(&mut self, changed: bool) {
        if std::mem::take(&mut self.suppressed) {
            return;
        }
        if changed {
            self.dirty = true;
        }
    }
}

/// Deep, independent copy of the selected source plus its dirty state.
#[derive(Debug, Clone, PartialEq)]
pub struct EditableSource {
    record: ProviderSource,
    tracker: DirtyTracker,
}

impl EditableSource {
    /// Wrap a fresh clone with no pending edits.
    pub fn new(record: ProviderSource) -> Self {
        Self {
            record,
            tracker: DirtyTracker::clean(),
        }
    }

    /// Wrap a record that exists only locally and therefore starts dirty.
    pub fn unsaved(record: ProviderSource) -> Self {
        let mut editable = Self::new(record);
        editable.tracker.mark_dirty();
        editable
    }

    pub fn record(&self) -> &ProviderSource {
        &self.record
    }

    pub fn is_dirty(&self) -> bool {
        self.tracker.is_dirty()
    }

    pub fn mark_clean(&mut self) {
        self.tracker.mark_clean();
    }

    /// Apply a user edit and flag the copy dirty if anything changed.
    pub fn update<R>(&mut self, edit: impl FnOnce(&mut ProviderSource) -> R) -> R {
        let before = self.record.clone();
        let result = edit(&mut self.record);
        let changed = before != self.record;
        self.tracker.observe(changed);
        result
    }

    /// Swap in server-confirmed state without reporting it as an edit.
    pub fn replace(&mut self, record: ProviderSource) {
        self.tracker.suppress();
        let changed = self.record != record;
        self.record = record;
        self.tracker.observe(changed);
    }

    /// Projection over the identifier, credential and base URL fields.
    pub fn basic(&mut self) -> BasicView<'_> {
        BasicView::new(self)
    }

    /// Projection over every provider-family-specific field.
    pub fn advanced(&mut self) -> AdvancedView<'_> {
        AdvancedView::new(self)
    }
}
