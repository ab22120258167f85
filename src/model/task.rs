use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::calendar::WorkCalendar;
use super::ids::ItemId;

/// Task kind. `Summary` (wire name `project`) spans its children and its
/// dates are derived, never authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Task,
    #[serde(rename = "project", alias = "summary")]
    Summary,
    Milestone,
}

/// A scheduled unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: ItemId,
    pub text: String,
    #[serde(with = "crate::util::flex_date")]
    pub start_date: NaiveDate,
    /// Working days. Zero only for milestones.
    pub duration: i64,
    #[serde(default = "ItemId::root")]
    pub parent: ItemId,
    #[serde(default)]
    pub progress: f64,
    #[serde(rename = "type", default)]
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "textColor", default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(rename = "progressColor", default, skip_serializing_if = "Option::is_none")]
    pub progress_color: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub open: bool,
}

impl Task {
    pub fn new(id: ItemId, text: impl Into<String>, start_date: NaiveDate, duration: i64) -> Self {
        Self {
            id,
            text: text.into(),
            start_date,
            duration,
            parent: ItemId::root(),
            progress: 0.0,
            kind: TaskKind::Task,
            color: None,
            text_color: None,
            progress_color: None,
            open: false,
        }
    }

    pub fn with_parent(mut self, parent: ItemId) -> Self {
        self.parent = parent;
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_root()
    }

    /// Exclusive end date under the given calendar.
    pub fn end_date(&self, calendar: &WorkCalendar) -> NaiveDate {
        if self.kind == TaskKind::Milestone {
            return self.start_date;
        }
        calendar.add_working_days(self.start_date, self.duration)
    }
}

/// Which presentation attribute a style command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPaint {
    Bar,
    Text,
    Progress,
}

impl TaskPaint {
    pub fn apply(self, task: &mut Task, color: &str) {
        let slot = match self {
            TaskPaint::Bar => &mut task.color,
            TaskPaint::Text => &mut task.text_color,
            TaskPaint::Progress => &mut task.progress_color,
        };
        *slot = Some(color.to_string());
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskPaint::Bar => "color",
            TaskPaint::Text => "text color",
            TaskPaint::Progress => "progress color",
        }
    }
}

/// Partial update for `update_task`. `None` leaves a field unchanged; a root
/// `parent` moves the task to the top level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub duration: Option<i64>,
    pub parent: Option<ItemId>,
    pub progress: Option<f64>,
    pub kind: Option<TaskKind>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn deserializes_wire_shape() {
        let task: Task = serde_json::from_value(json!({
            "id": 3, "text": "Design", "start_date": "01-05-2025",
            "duration": 4, "type": "project", "textColor": "#fff"
        }))
        .unwrap();
        assert_eq!(task.id, ItemId::from(3));
        assert_eq!(task.start_date, day(2025, 5, 1));
        assert_eq!(task.kind, TaskKind::Summary);
        assert!(task.is_top_level());
        assert_eq!(task.text_color.as_deref(), Some("#fff"));
    }

    #[test]
    fn serializes_kind_as_type() {
        let task = Task::new(ItemId::from(1), "Ship", day(2025, 5, 1), 1);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["type"], "task");
        assert_eq!(json["parent"], "0");
        assert_eq!(json["start_date"], "2025-05-01");
        assert!(json.get("color").is_none());
    }

    #[test]
    fn end_date_skips_hidden_days() {
        let cal = WorkCalendar::from_hidden([0, 6]);
        // Friday + 2 working days => Monday counts as the 2nd, end is Tuesday.
        let task = Task::new(ItemId::from(1), "A", day(2025, 7, 18), 2);
        assert_eq!(task.end_date(&cal), day(2025, 7, 22));

        let mut milestone = Task::new(ItemId::from(2), "M", day(2025, 7, 18), 0);
        milestone.kind = TaskKind::Milestone;
        assert_eq!(milestone.end_date(&cal), day(2025, 7, 18));
    }
}
