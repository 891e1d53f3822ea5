//! Undo/redo log over the edit state and the overlay stack.
//!
//! The log mixes full snapshots of [`EditState`] with cheap overlay deltas.
//! Overlays are addressed by index, and the only removal ever recorded is
//! popping the last one, so replaying deltas in order stays consistent.
//!
//! `undo_step` counts entries undone from the tip: the current position is
//! `entries[len - 1 - undo_step]`.
//!
//! ```json
//! {"state":{...},"overlays":[...],"history":[{"snapshot":{...}},{"overlay_added":{...}}],"undoStep":0}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::overlay::{FieldSet, Overlay};
use crate::state::{Document, EditState};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history is empty")]
    Empty,

    #[error("history does not start with a snapshot")]
    MissingBaseSnapshot,

    #[error("undo step {undo_step} out of range for {len} entries")]
    UndoStepOutOfRange { undo_step: usize, len: usize },

    #[error("no overlay at index {index}")]
    MissingOverlay { index: usize },

    #[error("failed to merge fields into overlay {index}: {source}")]
    Merge {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid session history: {0}")]
    History(#[from] HistoryError),
}

/// One recorded edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEntry {
    /// The whole edit state after the change.
    Snapshot(EditState),
    /// An overlay pushed on top of the stack.
    OverlayAdded(Overlay),
    /// Changed keys of the overlay at `index`, before and after.
    OverlayChanged {
        index: usize,
        new: FieldSet,
        old: FieldSet,
    },
}

impl HistoryEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            HistoryEntry::Snapshot(_) => "snapshot",
            HistoryEntry::OverlayAdded(_) => "overlay_added",
            HistoryEntry::OverlayChanged { .. } => "overlay_changed",
        }
    }
}

/// The effect of an undo or redo on the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    State,
    OverlayRemoved(usize),
    OverlayAdded(usize),
    OverlayChanged(usize),
}

/// Apply a partial field set to `overlays[index]`, leaving it untouched on failure.
fn merge_into(overlays: &mut [Overlay], index: usize, fields: &FieldSet) -> Result<(), HistoryError> {
    let slot = overlays
        .get_mut(index)
        .ok_or(HistoryError::MissingOverlay { index })?;
    *slot = slot
        .merged(fields)
        .map_err(|source| HistoryError::Merge { index, source })?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct History {
    entries: Vec<HistoryEntry>,
    undo_step: usize,
}

impl History {
    /// A history whose base is a snapshot of `initial`.
    pub fn new(initial: EditState) -> Self {
        Self {
            entries: vec![HistoryEntry::Snapshot(initial)],
            undo_step: 0,
        }
    }

    /// Rebuild a saved history.
    pub fn from_parts(entries: Vec<HistoryEntry>, undo_step: usize) -> Result<Self, HistoryError> {
        match entries.first() {
            None => return Err(HistoryError::Empty),
            Some(HistoryEntry::Snapshot(_)) => {}
            Some(_) => return Err(HistoryError::MissingBaseSnapshot),
        }
        if undo_step >= entries.len() {
            return Err(HistoryError::UndoStepOutOfRange {
                undo_step,
                len: entries.len(),
            });
        }
        Ok(Self { entries, undo_step })
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn undo_step(&self) -> usize {
        self.undo_step
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_parts(self) -> (Vec<HistoryEntry>, usize) {
        (self.entries, self.undo_step)
    }

    pub fn is_undo_available(&self) -> bool {
        self.undo_step + 1 < self.entries.len()
    }

    pub fn is_redo_available(&self) -> bool {
        self.undo_step > 0
    }

    /// Append an entry, discarding anything that was undone.
    pub fn commit(&mut self, entry: HistoryEntry) {
        if self.undo_step > 0 {
            let keep = self.entries.len() - self.undo_step;
            self.entries.truncate(keep);
            self.undo_step = 0;
        }
        tracing::debug!(kind = entry.kind(), len = self.entries.len() + 1, "history commit");
        self.entries.push(entry);
    }

    /// Step back one entry. `None` at the oldest snapshot.
    pub fn undo(&mut self, doc: &mut Document) -> Option<Applied> {
        if !self.is_undo_available() {
            return None;
        }
        let current = self.entries.len() - 1 - self.undo_step;
        self.undo_step += 1;

        let applied = match &self.entries[current] {
            HistoryEntry::Snapshot(_) => {
                let previous = self.entries[..current].iter().rev().find_map(|entry| match entry {
                    HistoryEntry::Snapshot(state) => Some(*state),
                    _ => None,
                });
                if let Some(state) = previous {
                    doc.state = state;
                }
                Applied::State
            }
            HistoryEntry::OverlayAdded(_) => {
                doc.overlays.pop();
                Applied::OverlayRemoved(doc.overlays.len())
            }
            HistoryEntry::OverlayChanged { index, old, .. } => {
                if let Err(e) = merge_into(&mut doc.overlays, *index, old) {
                    tracing::warn!(error = %e, "undo left overlay unchanged");
                }
                Applied::OverlayChanged(*index)
            }
        };
        tracing::debug!(kind = self.entries[current].kind(), undo_step = self.undo_step, "undo");
        Some(applied)
    }

    /// Re-apply the next undone entry. `None` at the tip.
    pub fn redo(&mut self, doc: &mut Document) -> Option<Applied> {
        if !self.is_redo_available() {
            return None;
        }
        self.undo_step -= 1;
        let current = self.entries.len() - 1 - self.undo_step;

        let applied = match &self.entries[current] {
            HistoryEntry::Snapshot(state) => {
                doc.state = *state;
                Applied::State
            }
            HistoryEntry::OverlayAdded(overlay) => {
                doc.overlays.push(overlay.clone());
                Applied::OverlayAdded(doc.overlays.len() - 1)
            }
            HistoryEntry::OverlayChanged { index, new, .. } => {
                if let Err(e) = merge_into(&mut doc.overlays, *index, new) {
                    tracing::warn!(error = %e, "redo left overlay unchanged");
                }
                Applied::OverlayChanged(*index)
            }
        };
        tracing::debug!(kind = self.entries[current].kind(), undo_step = self.undo_step, "redo");
        Some(applied)
    }
}

/// A commit waiting for the idle period to pass.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingCommit {
    /// Snapshot of whatever the state is when the commit lands.
    Snapshot,
    Entry(HistoryEntry),
}

/// Coalesces rapid edits into one history entry per idle period.
#[derive(Debug, Clone, PartialEq)]
pub struct Debouncer {
    delay_ms: f64,
    pending: Option<(PendingCommit, f64)>,
}

impl Debouncer {
    pub fn new(delay_ms: f64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<f64> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// Queue `commit`, pushing the deadline out to `now_ms + delay`.
    ///
    /// A pending commit that cannot be merged with `commit` is returned so
    /// the caller can land it first.
    pub fn schedule(&mut self, commit: PendingCommit, now_ms: f64) -> Option<PendingCommit> {
        let deadline = now_ms + self.delay_ms;
        let (merged, displaced) = match self.pending.take() {
            None => (commit, None),
            Some((previous, _)) => match coalesce(previous, commit) {
                Ok(merged) => (merged, None),
                Err((previous, commit)) => (commit, Some(previous)),
            },
        };
        self.pending = Some((merged, deadline));
        displaced
    }

    /// The pending commit, once its deadline has passed.
    pub fn due(&mut self, now_ms: f64) -> Option<PendingCommit> {
        match &self.pending {
            Some((_, deadline)) if now_ms >= *deadline => self.take(),
            _ => None,
        }
    }

    /// The pending commit, regardless of the deadline.
    pub fn take(&mut self) -> Option<PendingCommit> {
        self.pending.take().map(|(commit, _)| commit)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

/// Merge two pending commits, or hand both back when they are unrelated.
fn coalesce(
    previous: PendingCommit,
    next: PendingCommit,
) -> Result<PendingCommit, (PendingCommit, PendingCommit)> {
    match (previous, next) {
        (PendingCommit::Snapshot, PendingCommit::Snapshot) => Ok(PendingCommit::Snapshot),
        (
            PendingCommit::Entry(HistoryEntry::OverlayChanged {
                index,
                new: mut first_new,
                old: mut first_old,
            }),
            PendingCommit::Entry(HistoryEntry::OverlayChanged {
                index: next_index,
                new: next_new,
                old: next_old,
            }),
        ) if index == next_index => {
            for (key, value) in next_old {
                first_old.entry(key).or_insert(value);
            }
            first_new.extend(next_new);
            Ok(PendingCommit::Entry(HistoryEntry::OverlayChanged {
                index,
                new: first_new,
                old: first_old,
            }))
        }
        (previous, next) => Err((previous, next)),
    }
}

/// Everything needed to reopen an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
    pub state: EditState,
    pub overlays: Vec<Overlay>,
    pub history: Vec<HistoryEntry>,
    pub undo_step: usize,
}

impl SavedSession {
    pub fn new(doc: &Document, history: &History) -> Self {
        Self {
            state: doc.state,
            overlays: doc.overlays.clone(),
            history: history.entries().to_vec(),
            undo_step: history.undo_step(),
        }
    }

    pub fn to_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Split into a live document and a validated history.
    pub fn into_parts(self) -> Result<(Document, History), SessionError> {
        let history = History::from_parts(self.history, self.undo_step)?;
        Ok((Document::new(self.state, self.overlays), history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::overlay::{OverlayKind, OverlayType, Stroke, TextAlign, TextOverlay, TextStyle};
    use crate::transform::CropRect;
    use serde_json::json;

    fn text(center: [f64; 2], content: &str) -> Overlay {
        Overlay::new(
            center,
            OverlayKind::Text(TextOverlay {
                text: content.to_string(),
                font: "Roboto".to_string(),
                size: 24.0,
                align: TextAlign::Center,
                style: TextStyle::None,
                color: Color::WHITE,
                width: 30.0,
                height: 28.8,
            }),
        )
    }

    fn changed(index: usize, new: serde_json::Value, old: serde_json::Value) -> HistoryEntry {
        HistoryEntry::OverlayChanged {
            index,
            new: new.as_object().cloned().unwrap(),
            old: old.as_object().cloned().unwrap(),
        }
    }

    fn cropped(left: f64) -> EditState {
        let mut state = EditState::default();
        state.crop = CropRect::new(left, 0.0, 0.0, 0.0);
        state
    }

    // ===== Commit Tests =====

    #[test]
    fn test_new_history_has_nothing_to_undo() {
        let mut history = History::new(EditState::default());
        let mut doc = Document::default();
        assert!(!history.is_undo_available());
        assert!(!history.is_redo_available());
        assert_eq!(history.undo(&mut doc), None);
        assert_eq!(history.redo(&mut doc), None);
        assert_eq!(history.undo_step(), 0);
    }

    #[test]
    fn test_commit_after_undo_truncates() {
        let mut history = History::new(EditState::default());
        let mut doc = Document::default();
        for left in [1.0, 2.0, 3.0] {
            doc.state = cropped(left);
            history.commit(HistoryEntry::Snapshot(doc.state));
        }
        history.undo(&mut doc);
        history.undo(&mut doc);
        assert!(history.is_redo_available());
        doc.state = cropped(9.0);
        history.commit(HistoryEntry::Snapshot(doc.state));
        assert!(!history.is_redo_available());
        assert_eq!(history.len(), 3);
        assert_eq!(history.entries()[2], HistoryEntry::Snapshot(cropped(9.0)));
    }

    // ===== Undo Tests =====

    #[test]
    fn test_snapshot_undo_restores_previous_snapshot() {
        let mut history = History::new(EditState::default());
        let mut doc = Document::default();
        doc.state = cropped(10.0);
        history.commit(HistoryEntry::Snapshot(doc.state));
        doc.overlays.push(text([1.0, 1.0], "a"));
        history.commit(HistoryEntry::OverlayAdded(doc.overlays[0].clone()));
        doc.state = cropped(20.0);
        history.commit(HistoryEntry::Snapshot(doc.state));

        assert_eq!(history.undo(&mut doc), Some(Applied::State));
        assert_eq!(doc.state, cropped(10.0));
        assert_eq!(doc.overlays.len(), 1);

        assert_eq!(history.undo(&mut doc), Some(Applied::OverlayRemoved(0)));
        assert!(doc.overlays.is_empty());
        assert_eq!(doc.state, cropped(10.0));

        assert_eq!(history.undo(&mut doc), Some(Applied::State));
        assert_eq!(doc.state, EditState::default());
        assert!(!history.is_undo_available());
    }

    #[test]
    fn test_overlay_changed_undo_redo() {
        let mut history = History::new(EditState::default());
        let mut doc = Document::default();
        doc.overlays.push(text([50.0, 50.0], "Hi"));
        history.commit(HistoryEntry::OverlayAdded(doc.overlays[0].clone()));

        let before = doc.overlays[0].clone();
        doc.overlays[0].center = [70.0, 40.0];
        let (new, old) = Overlay::diff(&before, &doc.overlays[0]).unwrap();
        history.commit(HistoryEntry::OverlayChanged { index: 0, new, old });
        let after = doc.overlays[0].clone();

        assert_eq!(history.undo(&mut doc), Some(Applied::OverlayChanged(0)));
        assert_eq!(doc.overlays[0], before);
        assert_eq!(history.redo(&mut doc), Some(Applied::OverlayChanged(0)));
        assert_eq!(doc.overlays[0], after);
    }

    #[test]
    fn test_failed_merge_leaves_overlay() {
        let mut history = History::new(EditState::default());
        let mut doc = Document::default();
        doc.overlays.push(text([0.0, 0.0], "x"));
        history.commit(changed(0, json!({"size": 30.0}), json!({"size": "big"})));
        let before = doc.overlays[0].clone();
        assert_eq!(history.undo(&mut doc), Some(Applied::OverlayChanged(0)));
        assert_eq!(doc.overlays[0], before);
        assert_eq!(history.undo_step(), 1);
    }

    #[test]
    fn test_redo_re_adds_overlay() {
        let mut history = History::new(EditState::default());
        let mut doc = Document::default();
        let overlay = Overlay::from_stroke(OverlayType::Pen, Stroke::new([3.0, 4.0], 15.0, None)).unwrap();
        doc.overlays.push(overlay.clone());
        history.commit(HistoryEntry::OverlayAdded(overlay.clone()));
        history.undo(&mut doc);
        assert!(doc.overlays.is_empty());
        assert_eq!(history.redo(&mut doc), Some(Applied::OverlayAdded(0)));
        assert_eq!(doc.overlays, vec![overlay]);
    }

    // ===== Parts Tests =====

    #[test]
    fn test_from_parts_validates() {
        assert!(matches!(History::from_parts(vec![], 0), Err(HistoryError::Empty)));
        assert!(matches!(
            History::from_parts(vec![HistoryEntry::OverlayAdded(text([0.0, 0.0], "a"))], 0),
            Err(HistoryError::MissingBaseSnapshot)
        ));
        assert!(matches!(
            History::from_parts(vec![HistoryEntry::Snapshot(EditState::default())], 1),
            Err(HistoryError::UndoStepOutOfRange { undo_step: 1, len: 1 })
        ));
        assert!(History::from_parts(vec![HistoryEntry::Snapshot(EditState::default())], 0).is_ok());
    }

    #[test]
    fn test_entry_json_shape() {
        let value = serde_json::to_value(changed(2, json!({"angle": 1.0}), json!({"angle": 0.0}))).unwrap();
        assert_eq!(
            value,
            json!({"overlay_changed": {"index": 2, "new": {"angle": 1.0}, "old": {"angle": 0.0}}})
        );
    }

    // ===== Debounce Tests =====

    #[test]
    fn test_debounce_waits_for_idle() {
        let mut debouncer = Debouncer::new(1000.0);
        assert_eq!(debouncer.schedule(PendingCommit::Snapshot, 0.0), None);
        assert_eq!(debouncer.schedule(PendingCommit::Snapshot, 500.0), None);
        assert_eq!(debouncer.due(1200.0), None);
        assert_eq!(debouncer.deadline(), Some(1500.0));
        assert_eq!(debouncer.due(1500.0), Some(PendingCommit::Snapshot));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_overlay_changes_coalesce() {
        let mut debouncer = Debouncer::new(1000.0);
        debouncer.schedule(
            PendingCommit::Entry(changed(0, json!({"size": 30.0}), json!({"size": 24.0}))),
            0.0,
        );
        debouncer.schedule(
            PendingCommit::Entry(changed(
                0,
                json!({"size": 36.0, "width": 50.0}),
                json!({"size": 30.0, "width": 40.0}),
            )),
            100.0,
        );
        assert_eq!(
            debouncer.take(),
            Some(PendingCommit::Entry(changed(
                0,
                json!({"size": 36.0, "width": 50.0}),
                json!({"size": 24.0, "width": 40.0}),
            )))
        );
    }

    #[test]
    fn test_unrelated_commit_is_displaced() {
        let mut debouncer = Debouncer::new(1000.0);
        let first = PendingCommit::Entry(changed(0, json!({"size": 30.0}), json!({"size": 24.0})));
        debouncer.schedule(first.clone(), 0.0);
        assert_eq!(
            debouncer.schedule(PendingCommit::Entry(changed(1, json!({}), json!({}))), 10.0),
            Some(first)
        );
        assert!(matches!(
            debouncer.schedule(PendingCommit::Snapshot, 20.0),
            Some(PendingCommit::Entry(HistoryEntry::OverlayChanged { index: 1, .. }))
        ));
        debouncer.cancel();
        assert_eq!(debouncer.take(), None);
    }

    // ===== Session Tests =====

    #[test]
    fn test_session_round_trip() {
        let mut history = History::new(EditState::default());
        let mut doc = Document::default();
        doc.state.angle = 0.1 + 0.2;
        doc.state.adjustments.warmth = 0.333;
        history.commit(HistoryEntry::Snapshot(doc.state));
        doc.overlays.push(text([10.125, 1.0 / 3.0], "Hi\nthere"));
        history.commit(HistoryEntry::OverlayAdded(doc.overlays[0].clone()));
        history.undo(&mut doc);

        let session = SavedSession::new(&doc, &history);
        let json = session.to_json().unwrap();
        assert!(json.contains("\"undoStep\":1"));
        let back = SavedSession::from_json(&json).unwrap();
        assert_eq!(back, session);

        let (restored, restored_history) = back.into_parts().unwrap();
        assert_eq!(restored, doc);
        assert_eq!(restored_history, history);
    }

    #[test]
    fn test_session_rejects_bad_history() {
        let json = r#"{"state":{},"overlays":[],"history":[],"undoStep":0}"#;
        let session = SavedSession::from_json(json).unwrap();
        assert!(matches!(
            session.into_parts(),
            Err(SessionError::History(HistoryError::Empty))
        ));
        assert!(matches!(SavedSession::from_json("{"), Err(SessionError::Json(_))));
    }
}
