//! The chart collaborator: whatever renders the project. The core pushes
//! change notifications and view updates to it, and delegates scheduling,
//! undo history and exports.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::model::{ItemId, Project, ViewConfig, WorkCalendar};

/// A single observable change produced by a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "server", derive(ts_rs::TS))]
#[cfg_attr(feature = "server", ts(export))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartChange {
    TaskAdded { id: ItemId },
    TaskUpdated { id: ItemId },
    TaskDeleted { id: ItemId },
    LinkAdded { id: ItemId },
    LinkUpdated { id: ItemId },
    LinkDeleted { id: ItemId },
    MarkerAdded { id: ItemId },
    Cleared,
    BulkLoaded { tasks: usize, links: usize },
    /// Whole project replaced (undo).
    Reloaded,
    ViewChanged,
    ScheduleRecomputed { moved: Vec<ItemId> },
    Exported { format: ExportFormat, filename: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(ts_rs::TS))]
#[cfg_attr(feature = "server", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub filename: String,
    /// Export the raw chart without the page wrapper (PDF only).
    pub raw: bool,
}

/// Project and view state captured before an undoable command.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub description: String,
    pub project: Project,
    pub view: ViewConfig,
}

pub trait Chart: Send {
    fn notify(&mut self, change: &ChartChange);

    fn apply_view(&mut self, view: &ViewConfig);

    /// Recompute dates from link constraints. Returns the moved task ids.
    fn recompute_schedule(
        &mut self,
        project: &mut Project,
        calendar: &WorkCalendar,
        anchor: Option<&ItemId>,
    ) -> Result<Vec<ItemId>, AppError>;

    fn push_undo(&mut self, checkpoint: Checkpoint);

    fn undo_last(&mut self) -> Option<Checkpoint>;

    fn undo_depth(&self) -> usize;

    fn export_view(&mut self, request: &ExportRequest) -> Result<(), AppError>;
}

const MAX_UNDO_LEVELS: usize = 50;
const MAX_RECORDED_CHANGES: usize = 500;

/// In-process chart used by the server and CLI: keeps the undo history,
/// schedules with the built-in forward pass and records what it was asked
/// to render or export.
#[derive(Debug, Default)]
pub struct HeadlessChart {
    undo_stack: VecDeque<Checkpoint>,
    changes: VecDeque<ChartChange>,
    view: Option<ViewConfig>,
    exports: Vec<ExportRequest>,
}

impl HeadlessChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> impl Iterator<Item = &ChartChange> {
        self.changes.iter()
    }

    pub fn view(&self) -> Option<&ViewConfig> {
        self.view.as_ref()
    }

    pub fn exports(&self) -> &[ExportRequest] {
        &self.exports
    }
}

impl Chart for HeadlessChart {
    fn notify(&mut self, change: &ChartChange) {
        if self.changes.len() >= MAX_RECORDED_CHANGES {
            self.changes.pop_front();
        }
        self.changes.push_back(change.clone());
    }

    fn apply_view(&mut self, view: &ViewConfig) {
        self.view = Some(view.clone());
    }

    fn recompute_schedule(
        &mut self,
        project: &mut Project,
        calendar: &WorkCalendar,
        anchor: Option<&ItemId>,
    ) -> Result<Vec<ItemId>, AppError> {
        crate::schedule::forward_pass(project, calendar, anchor)
    }

    fn push_undo(&mut self, checkpoint: Checkpoint) {
        self.undo_stack.push_back(checkpoint);
        if self.undo_stack.len() > MAX_UNDO_LEVELS {
            self.undo_stack.pop_front();
        }
    }

    fn undo_last(&mut self) -> Option<Checkpoint> {
        self.undo_stack.pop_back()
    }

    fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    fn export_view(&mut self, request: &ExportRequest) -> Result<(), AppError> {
        tracing::info!(format = ?request.format, filename = %request.filename, raw = request.raw, "export requested");
        self.exports.push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn checkpoint(n: usize) -> Checkpoint {
        let mut project = Project::new();
        project.set_name(Some(format!("v{n}")));
        Checkpoint {
            description: format!("step {n}"),
            project,
            view: ViewConfig::default(),
        }
    }

    #[test]
    fn undo_history_is_bounded_and_lifo() {
        let mut chart = HeadlessChart::new();
        for n in 0..60 {
            chart.push_undo(checkpoint(n));
        }
        assert_eq!(chart.undo_depth(), MAX_UNDO_LEVELS);
        assert_eq!(chart.undo_last().unwrap().description, "step 59");
        assert_eq!(chart.undo_last().unwrap().description, "step 58");
    }

    #[test]
    fn empty_history_yields_nothing() {
        let mut chart = HeadlessChart::new();
        assert!(chart.undo_last().is_none());
    }

    #[test]
    fn change_serializes_with_kind_tag() {
        let json = serde_json::to_value(ChartChange::TaskAdded { id: ItemId::from(4) }).unwrap();
        assert_eq!(json["kind"], "task_added");
        assert_eq!(json["id"], "4");
    }
}
