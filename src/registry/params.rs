use std::fmt;

use chrono::NaiveDate;
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Metadata, Schema, SchemaObject, SingleOrVec};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::validation::{
    validate_color, validate_day_span, validate_duration, validate_filename, validate_lag,
    validate_positive_finite, validate_progress, validate_text, validate_weekdays, Validate,
};
use crate::error::AppError;
use crate::model::{ItemId, LinkKind, Scale, Skin, TaskKind, ZoomLevel};

/// Represents a field update that distinguishes "absent" from "null" from "value".
/// Use as `Option<FieldUpdate<T>>` with `#[serde(default, deserialize_with = "field_update_opt::deserialize")]`.
///
/// - `None` (field absent via `#[serde(default)]`) → skip / unchanged
/// - `Some(FieldUpdate::Clear)` (JSON `null`) → clear the field
/// - `Some(FieldUpdate::Set(v))` (JSON value) → set the field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldUpdate<T> {
    Clear,
    Set(T),
}

/// Serde helper for `Option<FieldUpdate<T>>` fields.
/// Prevents `Option` from swallowing JSON `null`; it maps it to `Some(FieldUpdate::Clear)`.
pub mod field_update_opt {
    use super::FieldUpdate;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<FieldUpdate<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        FieldUpdate::<T>::deserialize(deserializer).map(Some)
    }
}

/// Either every item (`"all"`) or a single id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    All,
    One(ItemId),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("all"),
            Selector::One(id) => write!(f, "{id}"),
        }
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Selector::All => s.serialize_str("all"),
            Selector::One(id) => id.serialize(s),
        }
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let id = ItemId::deserialize(d)?;
        if id.as_str().eq_ignore_ascii_case("all") {
            Ok(Selector::All)
        } else {
            Ok(Selector::One(id))
        }
    }
}

impl JsonSchema for Selector {
    fn schema_name() -> String {
        "Selector".to_string()
    }

    fn is_referenceable() -> bool {
        false
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(SingleOrVec::Vec(vec![
                InstanceType::String,
                InstanceType::Integer,
            ])),
            metadata: Some(Box::new(Metadata {
                description: Some("Item id, or \"all\" to apply to every item".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}

// ── Generation ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskSpec {
    pub id: ItemId,
    pub text: String,
    /// ISO-8601 start date (e.g. 2025-05-01).
    #[serde(with = "crate::util::flex_date")]
    #[schemars(with = "String")]
    pub start_date: NaiveDate,
    /// Duration in whole days.
    #[serde(deserialize_with = "crate::util::whole_days::deserialize")]
    #[schemars(with = "i64")]
    pub duration: i64,
    /// Task id to nest under, or null for root.
    #[serde(default)]
    pub parent: Option<ItemId>,
    /// Progress ratio (0.0–1.0).
    #[serde(default)]
    pub progress: Option<f64>,
    /// "task", "project" (a phase with subtasks) or "milestone".
    #[serde(rename = "type", default)]
    pub kind: Option<TaskKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LinkSpec {
    #[serde(default)]
    pub id: Option<ItemId>,
    #[serde(alias = "sourceId")]
    pub source: ItemId,
    #[serde(alias = "targetId")]
    pub target: ItemId,
    #[serde(rename = "type")]
    pub kind: LinkKind,
    /// Lag in whole days (may be negative).
    #[serde(default, deserialize_with = "crate::util::whole_days_opt::deserialize")]
    #[schemars(with = "Option<i64>")]
    pub lag: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateProjectParams {
    /// Project title. Defaults to the first task's text.
    #[serde(rename = "projectName", default)]
    pub project_name: Option<String>,
    /// All tasks. The first task is the project root; the rest nest under it.
    pub tasks: Vec<TaskSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

impl Validate for TaskSpec {
    fn validate(&self) -> Result<(), AppError> {
        validate_text(&self.text, "Task text")?;
        if self.kind != Some(TaskKind::Milestone) && self.kind != Some(TaskKind::Summary) {
            validate_duration(self.duration)?;
        } else {
            validate_day_span(self.duration, "Duration")?;
        }
        if let Some(p) = self.progress {
            validate_progress(p)?;
        }
        Ok(())
    }
}

impl Validate for GenerateProjectParams {
    fn validate(&self) -> Result<(), AppError> {
        if self.tasks.is_empty() {
            return Err(AppError::invalid("generate_project needs at least one task"));
        }
        self.tasks.iter().try_for_each(Validate::validate)?;
        self.links.iter().try_for_each(Validate::validate)
    }
}

impl Validate for LinkSpec {
    fn validate(&self) -> Result<(), AppError> {
        self.lag.map_or(Ok(()), validate_lag)
    }
}

// ── Task CRUD ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AddTaskParams {
    /// Optional id; a fresh one is generated when omitted.
    #[serde(default)]
    pub id: Option<ItemId>,
    pub text: String,
    /// ISO-8601 start date (e.g. 2025-05-01). Defaults to today.
    #[serde(default, with = "crate::util::flex_date_opt")]
    #[schemars(with = "Option<String>")]
    pub start_date: Option<NaiveDate>,
    /// Duration in whole days. Defaults to 1.
    #[serde(default, deserialize_with = "crate::util::whole_days_opt::deserialize")]
    #[schemars(with = "Option<i64>")]
    pub duration: Option<i64>,
    /// Task id to nest under, or null for root.
    #[serde(default)]
    pub parent: Option<ItemId>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(rename = "type", default)]
    pub kind: Option<TaskKind>,
}

impl Validate for AddTaskParams {
    fn validate(&self) -> Result<(), AppError> {
        validate_text(&self.text, "Task text")?;
        if let Some(d) = self.duration {
            if self.kind == Some(TaskKind::Milestone) {
                validate_day_span(d, "Duration")?;
            } else {
                validate_duration(d)?;
            }
        }
        if let Some(p) = self.progress {
            validate_progress(p)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateTaskParams {
    pub id: ItemId,
    #[serde(default)]
    pub text: Option<String>,
    /// ISO-8601 start date. On a summary task the whole subtree moves.
    #[serde(default, with = "crate::util::flex_date_opt")]
    #[schemars(with = "Option<String>")]
    pub start_date: Option<NaiveDate>,
    /// Duration in whole days (leaf tasks only).
    #[serde(default, deserialize_with = "crate::util::whole_days_opt::deserialize")]
    #[schemars(with = "Option<i64>")]
    pub duration: Option<i64>,
    /// New parent id, or null to move the task to the root.
    #[serde(default, deserialize_with = "field_update_opt::deserialize")]
    #[schemars(with = "Option<ItemId>")]
    pub parent: Option<FieldUpdate<ItemId>>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(rename = "type", default)]
    pub kind: Option<TaskKind>,
}

impl Validate for UpdateTaskParams {
    fn validate(&self) -> Result<(), AppError> {
        if self.text.is_none()
            && self.start_date.is_none()
            && self.duration.is_none()
            && self.parent.is_none()
            && self.progress.is_none()
            && self.kind.is_none()
        {
            return Err(AppError::invalid("update_task needs at least one field to change"));
        }
        if let Some(text) = &self.text {
            validate_text(text, "Task text")?;
        }
        if let Some(d) = self.duration {
            validate_duration(d)?;
        }
        if let Some(p) = self.progress {
            validate_progress(p)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IdParams {
    pub id: ItemId,
}

impl Validate for IdParams {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubtaskSpec {
    /// Ignored; subtasks always receive fresh ids.
    #[serde(default)]
    pub id: Option<ItemId>,
    pub text: String,
    /// ISO-8601 start date. Defaults to the split task's start.
    #[serde(default, with = "crate::util::flex_date_opt")]
    #[schemars(with = "Option<String>")]
    pub start_date: Option<NaiveDate>,
    /// Duration in whole days.
    #[serde(deserialize_with = "crate::util::whole_days::deserialize")]
    #[schemars(with = "i64")]
    pub duration: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SplitTaskParams {
    /// Task to split.
    pub id: ItemId,
    /// New subtasks, in order.
    pub subtasks: Vec<SubtaskSpec>,
    /// If true, chain the new subtasks Finish→Start.
    #[serde(rename = "addFSLinks", default)]
    pub add_fs_links: bool,
}

impl Validate for SplitTaskParams {
    fn validate(&self) -> Result<(), AppError> {
        if self.subtasks.is_empty() {
            return Err(AppError::invalid("split_task needs at least one subtask"));
        }
        for sub in &self.subtasks {
            validate_text(&sub.text, "Subtask text")?;
            validate_duration(sub.duration)?;
        }
        Ok(())
    }
}

// ── Link CRUD ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AddLinkParams {
    #[serde(default)]
    pub id: Option<ItemId>,
    /// ID of the source task.
    pub source: ItemId,
    /// ID of the target task.
    pub target: ItemId,
    #[serde(rename = "type")]
    pub kind: LinkKind,
    /// Lag in whole days (may be negative).
    #[serde(default, deserialize_with = "crate::util::whole_days_opt::deserialize")]
    #[schemars(with = "Option<i64>")]
    pub lag: Option<i64>,
}

impl Validate for AddLinkParams {
    fn validate(&self) -> Result<(), AppError> {
        if self.source == self.target {
            return Err(AppError::invariant(format!(
                "Task {} cannot depend on itself",
                self.source
            )));
        }
        self.lag.map_or(Ok(()), validate_lag)
    }
}

// ── View / styling ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ZoomParams {
    pub level: ZoomLevel,
}

impl Validate for ZoomParams {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColorParams {
    pub id: Selector,
    /// CSS color, e.g. #FF0000.
    pub color: String,
}

impl Validate for ColorParams {
    fn validate(&self) -> Result<(), AppError> {
        validate_color(&self.color)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WidthParams {
    /// Width in pixels.
    pub width: f64,
}

impl Validate for WidthParams {
    fn validate(&self) -> Result<(), AppError> {
        validate_positive_finite(self.width, "Width")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShowLinksParams {
    pub show: bool,
}

impl Validate for ShowLinksParams {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TooltipParams {
    pub enable: bool,
}

impl Validate for TooltipParams {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AddMarkerParams {
    /// Marker id. A fresh one is generated when omitted; an existing id is replaced.
    #[serde(default)]
    pub id: Option<ItemId>,
    /// ISO date for the marker (e.g. 2025-07-01).
    #[serde(with = "crate::util::flex_date")]
    #[schemars(with = "String")]
    pub start_date: NaiveDate,
    /// Label text (e.g. today, start).
    pub text: String,
    /// Tooltip. Defaults to the text followed by the long date.
    #[serde(default)]
    pub title: Option<String>,
}

impl Validate for AddMarkerParams {
    fn validate(&self) -> Result<(), AppError> {
        validate_text(&self.text, "Marker text")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetScalesParams {
    /// Timeline header rows, top to bottom.
    pub scales: Vec<Scale>,
}

impl Validate for SetScalesParams {
    fn validate(&self) -> Result<(), AppError> {
        if self.scales.is_empty() {
            return Err(AppError::invalid("set_scales needs at least one scale"));
        }
        if self.scales.iter().any(|s| s.step == 0) {
            return Err(AppError::invalid("Scale step must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetSkinParams {
    pub skin: Skin,
}

impl Validate for SetSkinParams {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HideWeekdaysParams {
    /// Weekdays to hide: 0 = Sunday .. 6 = Saturday. Replaces the current set.
    pub days: Vec<u8>,
}

impl Validate for HideWeekdaysParams {
    fn validate(&self) -> Result<(), AppError> {
        validate_weekdays(&self.days)
    }
}

// ── Scheduling ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AutoscheduleParams {
    /// Reschedule only tasks that depend on this one. Omit for the whole project.
    #[serde(rename = "anchorTaskId", default)]
    pub anchor_task_id: Option<ItemId>,
}

impl Validate for AutoscheduleParams {}

// ── System ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExportPngParams {
    /// File name, default gantt.png.
    #[serde(default)]
    pub name: Option<String>,
}

impl Validate for ExportPngParams {
    fn validate(&self) -> Result<(), AppError> {
        self.name.as_deref().map_or(Ok(()), validate_filename)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExportPdfParams {
    /// File name, default gantt.pdf.
    #[serde(default)]
    pub name: Option<String>,
    /// Export the bare chart without page styling. Default true.
    #[serde(default)]
    pub raw: Option<bool>,
}

impl Validate for ExportPdfParams {
    fn validate(&self) -> Result<(), AppError> {
        self.name.as_deref().map_or(Ok(()), validate_filename)
    }
}
