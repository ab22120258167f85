//! Applies validated commands to a workspace.
//!
//! Every command runs against a checkpoint of the project and view. If the
//! handler, the roll-up or the follow-up scheduling fails, the checkpoint is
//! restored so no command is ever partially applied.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::chart::{Chart, ChartChange, Checkpoint, HeadlessChart};
use crate::error::{AppError, Severity};
use crate::model::{ItemId, Project, ProjectSnapshot, ViewConfig, WorkCalendar};
use crate::registry::{Command, CommandOutput, CommandResult};

/// Everything one session edits: the project, its view and the chart that
/// renders them.
pub struct Workspace {
    pub project: Project,
    pub view: ViewConfig,
    pub chart: Box<dyn Chart>,
}

impl Workspace {
    pub fn new(project: Project, view: ViewConfig, chart: Box<dyn Chart>) -> Self {
        Self {
            project,
            view,
            chart,
        }
    }

    /// Empty project rendered by a [`HeadlessChart`].
    pub fn headless() -> Self {
        Self::new(Project::new(), ViewConfig::default(), Box::new(HeadlessChart::new()))
    }

    pub fn calendar(&self) -> WorkCalendar {
        self.view.calendar()
    }

    pub fn snapshot(&self, limit: usize) -> ProjectSnapshot {
        self.project.snapshot(limit)
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("tasks", &self.project.task_count())
            .field("links", &self.project.link_count())
            .field("undo_depth", &self.chart.undo_depth())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Re-run the forward pass after commands that may move dates.
    pub auto_schedule: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { auto_schedule: true }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CommandDispatcher {
    config: DispatcherConfig,
}

impl CommandDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> DispatcherConfig {
        self.config
    }

    /// Validate, apply and publish a command. On error the workspace is
    /// exactly as it was before the call.
    pub fn execute(&self, ws: &mut Workspace, cmd: Command) -> Result<CommandOutput, AppError> {
        let info = cmd.info();
        let started = Instant::now();

        if let Err(e) = cmd.validate() {
            tracing::info!(command = info.name, error = %e, "command rejected");
            return Err(e);
        }

        let project_before = ws.project.clone();
        let view_before = ws.view.clone();

        let output = match self.apply(ws, cmd, info.reschedules) {
            Ok(output) => output,
            Err(e) => {
                ws.project = project_before;
                ws.view = view_before;
                if e.severity() == Severity::Soft {
                    tracing::warn!(command = info.name, error = %e, "command had no target");
                } else {
                    tracing::info!(command = info.name, error = %e, "command failed, rolled back");
                }
                return Err(e);
            }
        };

        if info.undoable {
            ws.chart.push_undo(Checkpoint {
                description: output.message.trim_end_matches('.').to_string(),
                project: project_before,
                view: view_before,
            });
        }

        for change in &output.changes {
            ws.chart.notify(change);
        }
        if output.changes.contains(&ChartChange::ViewChanged) {
            ws.chart.apply_view(&ws.view);
        }

        tracing::info!(
            command = info.name,
            changes = output.changes.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "command applied"
        );
        Ok(output)
    }

    fn apply(
        &self,
        ws: &mut Workspace,
        cmd: Command,
        reschedules: bool,
    ) -> Result<CommandOutput, AppError> {
        let mut output = cmd.dispatch(ws)?;
        let calendar = ws.calendar();

        let rolled_up = ws.project.refresh(&calendar);
        push_task_updates(&mut output.changes, rolled_up);

        if reschedules && self.config.auto_schedule && !ws.project.is_empty() {
            let moved = ws.chart.recompute_schedule(&mut ws.project, &calendar, None)?;
            if !moved.is_empty() {
                tracing::debug!(moved = moved.len(), "auto-schedule moved tasks");
                output.changes.push(ChartChange::ScheduleRecomputed { moved });
            }
        }
        Ok(output)
    }
}

fn push_task_updates(changes: &mut Vec<ChartChange>, ids: Vec<ItemId>) {
    for id in ids {
        let known = changes.iter().any(|c| match c {
            ChartChange::TaskAdded { id: seen }
            | ChartChange::TaskUpdated { id: seen }
            | ChartChange::TaskDeleted { id: seen } => *seen == id,
            _ => false,
        });
        if !known {
            changes.push(ChartChange::TaskUpdated { id });
        }
    }
}

// ── Outcome reporting ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Applied,
    NotFound,
    Rejected,
}

/// Client-facing result of one dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub status: OutcomeStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CommandResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<ChartChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AppError>,
}

impl From<Result<CommandOutput, AppError>> for Outcome {
    fn from(result: Result<CommandOutput, AppError>) -> Self {
        match result {
            Ok(out) => Outcome {
                status: OutcomeStatus::Applied,
                message: out.message,
                result: Some(out.result),
                changes: out.changes,
                error: None,
            },
            Err(e) => Outcome {
                status: if e.is_soft() {
                    OutcomeStatus::NotFound
                } else {
                    OutcomeStatus::Rejected
                },
                message: e.to_string(),
                result: None,
                changes: Vec::new(),
                error: Some(e),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use super::*;
    use crate::chart::ExportRequest;
    use crate::model::{TaskKind, WorkCalendar};
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn cmd(name: &str, params: Value) -> Command {
        Command::from_tool_call(name, &params).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn generated() -> (CommandDispatcher, Workspace) {
        let dispatcher = CommandDispatcher::default();
        let mut ws = Workspace::headless();
        dispatcher
            .execute(
                &mut ws,
                cmd(
                    "generate_project",
                    json!({
                        "projectName": "Website",
                        "tasks": [
                            {"id": 1, "text": "Website", "start_date": "2025-05-05", "duration": 1, "type": "project"},
                            {"id": 2, "text": "Design", "start_date": "2025-05-05", "duration": 3, "parent": 1},
                            {"id": 3, "text": "Build", "start_date": "2025-05-05", "duration": 5, "parent": 1},
                            {"id": 4, "text": "Launch", "start_date": "2025-05-05", "duration": 0, "parent": 1, "type": "milestone"}
                        ],
                        "links": [
                            {"id": 10, "source": 2, "target": 3, "type": "0"},
                            {"id": 11, "source": 3, "target": 4, "type": "0"}
                        ]
                    }),
                ),
            )
            .unwrap();
        (dispatcher, ws)
    }

    #[test]
    fn generated_project_is_scheduled_and_rolled_up() {
        let (_, ws) = generated();
        let build = ws.project.get_task(&ItemId::from(3)).unwrap();
        assert_eq!(build.start_date, d(2025, 5, 8));
        let launch = ws.project.get_task(&ItemId::from(4)).unwrap();
        assert_eq!(launch.start_date, d(2025, 5, 13));

        let root = ws.project.get_task(&ItemId::from(1)).unwrap();
        assert_eq!(root.kind, TaskKind::Summary);
        assert_eq!(root.start_date, d(2025, 5, 5));
        assert_eq!(root.end_date(&WorkCalendar::default()), d(2025, 5, 13));

        // Every link is satisfied.
        let cal = ws.calendar();
        for link in ws.project.links() {
            let source = ws.project.get_task(&link.source).unwrap();
            let target = ws.project.get_task(&link.target).unwrap();
            assert!(target.start_date >= source.end_date(&cal));
        }
    }

    #[test]
    fn added_task_keeps_forest_shape() {
        let (dispatcher, mut ws) = generated();
        let out = dispatcher
            .execute(&mut ws, cmd("add_task", json!({"text": "QA", "parent": 3, "duration": 2})))
            .unwrap();
        let CommandResult::AddTask(id) = out.result else { panic!("wrong result") };
        assert_eq!(ws.project.get_task(&id).unwrap().parent, ItemId::from(3));
        // Build now has a child and became a summary.
        assert_eq!(ws.project.get_task(&ItemId::from(3)).unwrap().kind, TaskKind::Summary);
        assert!(out.changes.contains(&ChartChange::TaskUpdated { id: ItemId::from(3) }));
    }

    #[test]
    fn self_link_is_rejected_without_changes() {
        let (dispatcher, mut ws) = generated();
        let before = ws.project.clone();
        let err = dispatcher
            .execute(&mut ws, cmd("add_link", json!({"source": 2, "target": 2, "type": "0"})))
            .unwrap_err();
        assert_eq!(err.severity(), Severity::Invariant);
        assert_eq!(ws.project, before);
    }

    #[test]
    fn cycle_is_rejected() {
        let (dispatcher, mut ws) = generated();
        let err = dispatcher
            .execute(&mut ws, cmd("add_link", json!({"source": 4, "target": 2, "type": "0"})))
            .unwrap_err();
        assert_eq!(err.severity(), Severity::Invariant);
    }

    #[test]
    fn missing_link_delete_is_soft_not_found() {
        let (dispatcher, mut ws) = generated();
        let outcome = Outcome::from(dispatcher.execute(&mut ws, cmd("delete_link", json!({"id": 99}))));
        assert_eq!(outcome.status, OutcomeStatus::NotFound);
        assert_eq!(ws.project.link_count(), 2);
    }

    #[test]
    fn undo_restores_previous_state() {
        let (dispatcher, mut ws) = generated();
        let before = ws.project.clone();
        dispatcher.execute(&mut ws, cmd("delete_task", json!({"id": 3}))).unwrap();
        assert_eq!(ws.project.task_count(), 3);

        let out = dispatcher.execute(&mut ws, Command::Undo).unwrap();
        assert!(out.message.starts_with("Undid: Deleted task 3"));
        assert_eq!(ws.project, before);

        // generate_project is on the stack too, then nothing.
        dispatcher.execute(&mut ws, Command::Undo).unwrap();
        assert!(ws.project.is_empty());
        let err = dispatcher.execute(&mut ws, Command::Undo).unwrap_err();
        assert!(matches!(err, AppError::NothingToUndo));
    }

    #[test]
    fn hidden_weekends_stretch_the_schedule() {
        let (dispatcher, mut ws) = generated();
        dispatcher.execute(&mut ws, cmd("hide_weekdays", json!({"days": [0, 6]}))).unwrap();
        // Design Mon 5 May (3 days) -> Build Thu 8 May, 5 working days skipping
        // the weekend -> Launch Thu 15 May.
        let launch = ws.project.get_task(&ItemId::from(4)).unwrap();
        assert_eq!(launch.start_date, d(2025, 5, 15));
    }

    #[test]
    fn summary_start_shift_moves_subtree() {
        let (_, mut ws) = generated();
        let dispatcher = CommandDispatcher::new(DispatcherConfig { auto_schedule: false });
        dispatcher
            .execute(&mut ws, cmd("update_task", json!({"id": 1, "start_date": "2025-05-12"})))
            .unwrap();
        assert_eq!(ws.project.get_task(&ItemId::from(2)).unwrap().start_date, d(2025, 5, 12));
        assert_eq!(ws.project.get_task(&ItemId::from(3)).unwrap().start_date, d(2025, 5, 15));

        let err = dispatcher
            .execute(&mut ws, cmd("update_task", json!({"id": 1, "duration": 4})))
            .unwrap_err();
        assert_eq!(err.severity(), Severity::Validation);
    }

    /// Chart whose scheduler always fails.
    struct BrokenScheduler(HeadlessChart);

    impl Chart for BrokenScheduler {
        fn notify(&mut self, change: &ChartChange) {
            self.0.notify(change);
        }
        fn apply_view(&mut self, view: &ViewConfig) {
            self.0.apply_view(view);
        }
        fn recompute_schedule(
            &mut self,
            _project: &mut Project,
            _calendar: &WorkCalendar,
            _anchor: Option<&ItemId>,
        ) -> Result<Vec<ItemId>, AppError> {
            Err(AppError::ChartError {
                message: "scheduler offline".into(),
            })
        }
        fn push_undo(&mut self, checkpoint: Checkpoint) {
            self.0.push_undo(checkpoint);
        }
        fn undo_last(&mut self) -> Option<Checkpoint> {
            self.0.undo_last()
        }
        fn undo_depth(&self) -> usize {
            self.0.undo_depth()
        }
        fn export_view(&mut self, request: &ExportRequest) -> Result<(), AppError> {
            self.0.export_view(request)
        }
    }

    #[test]
    fn failure_after_handler_rolls_back() {
        let dispatcher = CommandDispatcher::default();
        let mut ws = Workspace::new(
            Project::new(),
            ViewConfig::default(),
            Box::new(BrokenScheduler(HeadlessChart::new())),
        );
        let err = dispatcher
            .execute(&mut ws, cmd("add_task", json!({"text": "Orphan"})))
            .unwrap_err();
        assert!(matches!(err, AppError::ChartError { .. }));
        assert!(ws.project.is_empty());
        assert_eq!(ws.chart.undo_depth(), 0);
    }

    #[test]
    fn view_commands_reach_the_chart() {
        let (dispatcher, mut ws) = generated();
        dispatcher.execute(&mut ws, cmd("set_skin", json!({"skin": "dark"}))).unwrap();
        assert_eq!(ws.view.skin, crate::model::Skin::Dark);
        let out = dispatcher.execute(&mut ws, cmd("export_png", json!({}))).unwrap();
        assert_eq!(out.changes.len(), 1);
        // Exports are not undoable.
        dispatcher.execute(&mut ws, Command::Undo).unwrap();
        assert_eq!(ws.view.skin, crate::model::Skin::Terrace);
    }

    #[test]
    fn validation_runs_before_dispatch() {
        let (dispatcher, mut ws) = generated();
        let err = dispatcher
            .execute(&mut ws, cmd("hide_weekdays", json!({"days": [0, 1, 2, 3, 4, 5, 6]})))
            .unwrap_err();
        assert_eq!(err.severity(), Severity::Validation);
        assert!(ws.view.hidden_weekdays.is_empty());
    }

    #[test]
    fn oversized_spans_are_rejected_before_scheduling() {
        let (dispatcher, mut ws) = generated();
        let before = ws.project.clone();
        let err = dispatcher
            .execute(
                &mut ws,
                cmd("add_task", json!({"id": 5, "text": "Forever", "parent": 2, "duration": 200_000_000})),
            )
            .unwrap_err();
        assert_eq!(err.severity(), Severity::Validation);
        let err = dispatcher
            .execute(&mut ws, cmd("add_link", json!({"source": 2, "target": 4, "type": "0", "lag": i64::MIN})))
            .unwrap_err();
        assert_eq!(err.severity(), Severity::Validation);
        assert_eq!(ws.project, before);
    }

    #[test]
    fn snapshot_ids_resolve_back_to_their_tasks() {
        let (dispatcher, mut ws) = generated();
        dispatcher
            .execute(&mut ws, cmd("add_task", json!({"id": "qa-review", "text": "QA", "duration": 1})))
            .unwrap();
        let snapshot = ws.snapshot(150);
        assert_eq!(snapshot.tasks.len(), 5);

        let mut round = 0;
        for task_ref in &snapshot.tasks {
            let mut forms = vec![json!(task_ref.id.as_str())];
            if let Some(n) = task_ref.id.as_number() {
                forms.push(json!(n));
            }
            for id in forms {
                round += 1;
                let text = format!("Renamed {round}");
                dispatcher
                    .execute(&mut ws, cmd("update_task", json!({"id": id, "text": text})))
                    .unwrap();
                assert_eq!(ws.project.get_task(&task_ref.id).unwrap().text, text);
                assert_eq!(ws.project.tasks().filter(|t| t.text == text).count(), 1);
            }
        }
        // Four numeric ids sent both ways plus one string id.
        assert_eq!(round, 9);
    }
}
