pub mod catalog;
pub mod execute;
pub mod handlers;
pub mod params;
pub mod validation;

use serde::{Deserialize, Serialize};

// ── Param types (used in Command enum) ──────────────────────────
use params::{
    AddLinkParams, AddMarkerParams, AddTaskParams, AutoscheduleParams, ColorParams,
    ExportPdfParams, ExportPngParams, GenerateProjectParams, HideWeekdaysParams, IdParams,
    SetScalesParams, SetSkinParams, ShowLinksParams, SplitTaskParams, TooltipParams,
    UpdateTaskParams, WidthParams, ZoomParams,
};

// ── Return types (used in CommandResult enum) ───────────────────
use crate::chart::{ChartChange, ExportRequest};
use crate::model::{ItemId, Removal};
use handlers::project::GeneratedProject;

// ── Handler modules (dispatch targets) ──────────────────────────
use handlers::{link, project, schedule, system, task, view};

use validation::Validate;

// ── Command metadata ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(ts_rs::TS))]
#[cfg_attr(feature = "server", ts(export))]
pub enum CommandCategory {
    Generation,
    Task,
    Link,
    View,
    Scheduling,
    System,
}

impl CommandCategory {
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Task => "task",
            Self::Link => "link",
            Self::View => "view",
            Self::Scheduling => "scheduling",
            Self::System => "system",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Generation => "Build a whole project at once or clear the chart",
            Self::Task => "Add, update, delete and split tasks",
            Self::Link => "Add and delete dependency links",
            Self::View => "Zoom, colors, scales, skins, markers and hidden weekdays",
            Self::Scheduling => "Re-run auto-scheduling",
            Self::System => "Undo and export",
        }
    }

    pub fn all() -> &'static [CommandCategory] {
        &[
            Self::Generation,
            Self::Task,
            Self::Link,
            Self::View,
            Self::Scheduling,
            Self::System,
        ]
    }
}

pub struct CommandInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub category: CommandCategory,
    pub undoable: bool,
    pub llm_hidden: bool,
    /// Dates may have changed; auto-scheduling runs afterwards when enabled.
    pub reschedules: bool,
}

// ── Command output ──────────────────────────────────────────────

/// Internal result of executing a Command.
/// `message` serves the chat channel and CLI, `result` carries typed data,
/// `changes` lists what the chart must re-render.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub message: String,
    pub result: CommandResult,
    pub changes: Vec<ChartChange>,
}

impl CommandOutput {
    pub fn new(message: impl Into<String>, result: CommandResult) -> Self {
        Self {
            message: message.into(),
            result,
            changes: Vec::new(),
        }
    }

    pub fn with_changes(mut self, changes: impl IntoIterator<Item = ChartChange>) -> Self {
        self.changes.extend(changes);
        self
    }
}

// ── define_commands! macro ──────────────────────────────────────

/// Single source of truth for all commands. Generates:
/// 1. `Command` enum (serde-tagged `{ "cmd": name, "params": {...} }`)
/// 2. `CommandResult` enum (serde-tagged `{ "cmd": name, "data": ... }`)
/// 3. `Command::info()`: metadata (name, description, category, flags)
/// 4. `Command::validate()`: constraint checks on the params
/// 5. `Command::dispatch()`: run the handler against a workspace
/// 6. `Command::registry_entries()`: catalog entries with JSON schemas
/// 7. `Command::from_tool_call()`: deserialize from (name, JSON) pair
macro_rules! define_commands {
    (
        params {
            $(
                [ $pc:expr $(, $pf:ident)* ]
                $pv:ident ( $pp:ty ) $( -> $pr:ty )?
                => $ph:path, $pn:literal : $pd:literal ;
            )*
        }
        no_params {
            $(
                [ $nc:expr $(, $nf:ident)* ]
                $nv:ident $( -> $nr:ty )?
                => $nh:path, $nn:literal : $nd:literal ;
            )*
        }
    ) => {
        // ── 1. Command enum ──
        /// Every surface (chat, CLI, HTTP) dispatches through the same
        /// executor. Adding a variant causes compiler errors until it's
        /// fully handled.
        #[derive(Debug, Clone, Serialize, Deserialize)]
        #[serde(tag = "cmd", content = "params")]
        pub enum Command {
            $( #[serde(rename = $pn)] $pv($pp), )*
            $( #[serde(rename = $nn)] $nv, )*
        }

        // ── 2. CommandResult enum ──
        #[derive(Debug, Clone, Serialize)]
        #[serde(tag = "cmd", content = "data")]
        pub enum CommandResult {
            $( #[serde(rename = $pn)] $pv $( ($pr) )?, )*
            $( #[serde(rename = $nn)] $nv $( ($nr) )?, )*
        }

        // ── 3. Command::info() ──
        impl Command {
            pub fn info(&self) -> CommandInfo {
                match self {
                    $( Command::$pv(_) => CommandInfo {
                        name: $pn,
                        description: $pd,
                        category: $pc,
                        undoable: define_commands!(@has_flag undoable; $($pf)*),
                        llm_hidden: define_commands!(@has_flag llm_hidden; $($pf)*),
                        reschedules: define_commands!(@has_flag reschedules; $($pf)*),
                    }, )*
                    $( Command::$nv => CommandInfo {
                        name: $nn,
                        description: $nd,
                        category: $nc,
                        undoable: define_commands!(@has_flag undoable; $($nf)*),
                        llm_hidden: define_commands!(@has_flag llm_hidden; $($nf)*),
                        reschedules: define_commands!(@has_flag reschedules; $($nf)*),
                    }, )*
                }
            }

            pub fn name(&self) -> &'static str {
                self.info().name
            }
        }

        // ── 4. Command::validate() ──
        impl Command {
            pub fn validate(&self) -> Result<(), crate::error::AppError> {
                match self {
                    $( Command::$pv(p) => p.validate(), )*
                    $( Command::$nv => Ok(()), )*
                }
            }
        }

        // ── 5. Command::dispatch() ──
        impl Command {
            pub(crate) fn dispatch(
                self,
                ws: &mut crate::dispatcher::Workspace,
            ) -> Result<CommandOutput, crate::error::AppError> {
                match self {
                    $( Command::$pv(p) => $ph(ws, p), )*
                    $( Command::$nv => $nh(ws), )*
                }
            }
        }

        // ── 6. Command::registry_entries() ──
        impl Command {
            pub(crate) fn registry_entries() -> Vec<catalog::CommandRegistryEntry> {
                vec![
                    $( catalog::entry(
                        CommandInfo {
                            name: $pn,
                            description: $pd,
                            category: $pc,
                            undoable: define_commands!(@has_flag undoable; $($pf)*),
                            llm_hidden: define_commands!(@has_flag llm_hidden; $($pf)*),
                            reschedules: define_commands!(@has_flag reschedules; $($pf)*),
                        },
                        catalog::schema_value::<$pp>(),
                    ), )*
                    $( catalog::entry(
                        CommandInfo {
                            name: $nn,
                            description: $nd,
                            category: $nc,
                            undoable: define_commands!(@has_flag undoable; $($nf)*),
                            llm_hidden: define_commands!(@has_flag llm_hidden; $($nf)*),
                            reschedules: define_commands!(@has_flag reschedules; $($nf)*),
                        },
                        catalog::empty_object_schema(),
                    ), )*
                ]
            }
        }

        // ── 7. Command::from_tool_call() ──
        impl Command {
            pub fn from_tool_call(
                name: &str,
                input: &serde_json::Value,
            ) -> Result<Command, ToolCallError> {
                match name {
                    $( $pn => catalog::de(input)
                        .map(Command::$pv)
                        .map_err(|message| ToolCallError::InvalidArguments { command: $pn, message }), )*
                    $( $nn => Ok(Command::$nv), )*
                    _ => Err(ToolCallError::UnknownCommand(name.to_string())),
                }
            }
        }
    };

    // Flag helpers: check whether a specific flag appears in a list of flags.
    // Literal tokens match before metavariables, so e.g. `undoable` matches the
    // first arm and any other ident falls through to the recursive second arm.
    (@has_flag undoable; undoable $($rest:ident)*) => { true };
    (@has_flag undoable; $_other:ident $($rest:ident)*) => { define_commands!(@has_flag undoable; $($rest)*) };
    (@has_flag undoable;) => { false };

    (@has_flag llm_hidden; llm_hidden $($rest:ident)*) => { true };
    (@has_flag llm_hidden; $_other:ident $($rest:ident)*) => { define_commands!(@has_flag llm_hidden; $($rest)*) };
    (@has_flag llm_hidden;) => { false };

    (@has_flag reschedules; reschedules $($rest:ident)*) => { true };
    (@has_flag reschedules; $_other:ident $($rest:ident)*) => { define_commands!(@has_flag reschedules; $($rest)*) };
    (@has_flag reschedules;) => { false };
}

/// Why a (name, arguments) pair could not become a `Command`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolCallError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Invalid arguments for {command}: {message}")]
    InvalidArguments {
        command: &'static str,
        message: String,
    },
}

// ── Command definitions ─────────────────────────────────────────

define_commands! {
    params {
        // ── Generation ──────────────────────────────────────────
        [CommandCategory::Generation, undoable, reschedules]
        GenerateProject(GenerateProjectParams) -> GeneratedProject
        => project::generate_project, "generate_project": "Generate a complete project: tasks (the first task is the project itself, the rest nest under it) and dependency links. Replaces the current chart.";

        // ── Task CRUD ───────────────────────────────────────────
        [CommandCategory::Task, undoable, reschedules]
        AddTask(AddTaskParams) -> ItemId
        => task::add_task, "add_task": "Add a new task to the Gantt chart.";

        [CommandCategory::Task, undoable, reschedules]
        UpdateTask(UpdateTaskParams)
        => task::update_task, "update_task": "Update an existing task's text, dates, duration, parent, progress or type.";

        [CommandCategory::Task, undoable, reschedules]
        DeleteTask(IdParams) -> Removal
        => task::delete_task, "delete_task": "Delete a task together with its subtasks and links.";

        [CommandCategory::Task, undoable, reschedules]
        SplitTask(SplitTaskParams) -> Vec<ItemId>
        => task::split_task, "split_task": "Split a task into subtasks nested under it, optionally chained finish-to-start.";

        // ── Link CRUD ───────────────────────────────────────────
        [CommandCategory::Link, undoable, reschedules]
        AddLink(AddLinkParams) -> ItemId
        => link::add_link, "add_link": "Create a dependency link between two tasks.";

        [CommandCategory::Link, undoable, reschedules]
        DeleteLink(IdParams)
        => link::delete_link, "delete_link": "Delete a dependency link by id.";

        // ── View / styling ──────────────────────────────────────
        [CommandCategory::View, undoable]
        Zoom(ZoomParams)
        => view::zoom, "zoom": "Change the timeline zoom level: hour, day, week, month, quarter, year or fit.";

        [CommandCategory::View, undoable]
        StyleTask(ColorParams)
        => view::style_task, "style_task": "Set the bar color of one task, or of all tasks with id \"all\".";

        [CommandCategory::View, undoable]
        StyleLink(ColorParams)
        => view::style_link, "style_link": "Set the color of one link, or of all links with id \"all\".";

        [CommandCategory::View, undoable]
        SetLinkWidth(WidthParams)
        => view::set_link_width, "set_link_width": "Set the line width of dependency links in pixels.";

        [CommandCategory::View, undoable, llm_hidden]
        SetLinkWrapperWidth(WidthParams)
        => view::set_link_wrapper_width, "set_link_wrapper_width": "Set the clickable area width around links in pixels.";

        [CommandCategory::View, undoable]
        ShowLinks(ShowLinksParams)
        => view::show_links, "show_links": "Show or hide dependency links.";

        [CommandCategory::View, undoable]
        SetTextColor(ColorParams)
        => view::set_text_color, "set_text_color": "Set the text color of one task, or of all tasks with id \"all\".";

        [CommandCategory::View, undoable]
        SetProgressColor(ColorParams)
        => view::set_progress_color, "set_progress_color": "Set the progress bar color of one task, or of all tasks with id \"all\".";

        [CommandCategory::View, undoable]
        SetTaskTooltip(TooltipParams)
        => view::set_task_tooltip, "set_task_tooltip": "Enable or disable task tooltips.";

        [CommandCategory::View, undoable]
        AddMarker(AddMarkerParams) -> ItemId
        => view::add_marker, "add_marker": "Add a vertical marker line on the timeline at a date.";

        [CommandCategory::View, undoable]
        SetScales(SetScalesParams)
        => view::set_scales, "set_scales": "Set custom timeline scales and, optionally, weekend highlighting.";

        [CommandCategory::View, undoable]
        SetSkin(SetSkinParams)
        => view::set_skin, "set_skin": "Set a skin (theme): terrace, dark, material, contrast-white, contrast-black, skyblue, meadow or broadway.";

        [CommandCategory::View, undoable, reschedules]
        HideWeekdays(HideWeekdaysParams)
        => view::hide_weekdays, "hide_weekdays": "Hide weekdays (0 = Sunday .. 6 = Saturday) from the timeline and from working-day calculations.";

        // ── Scheduling ──────────────────────────────────────────
        [CommandCategory::Scheduling, undoable]
        Autoschedule(AutoscheduleParams) -> Vec<ItemId>
        => schedule::autoschedule, "autoschedule": "Auto-schedule tasks from their dependency links, optionally only downstream of an anchor task.";

        // ── System ──────────────────────────────────────────────
        [CommandCategory::System]
        ExportPng(ExportPngParams) -> ExportRequest
        => system::export_png, "export_png": "Export the chart as a PNG image.";

        [CommandCategory::System]
        ExportToPdf(ExportPdfParams) -> ExportRequest
        => system::export_to_pdf, "export_to_pdf": "Export the chart as a PDF document.";
    }
    no_params {
        // ── Generation ──────────────────────────────────────────
        [CommandCategory::Generation, undoable]
        ClearAll => project::clear_all, "clear_all": "Remove all tasks, links and markers from the chart.";

        // ── System ──────────────────────────────────────────────
        [CommandCategory::System]
        Undo => system::undo, "undo": "Undo the last change.";
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_wire_shape() {
        let cmd: Command = serde_json::from_value(json!({
            "cmd": "delete_link", "params": {"id": 3}
        }))
        .unwrap();
        assert_eq!(cmd.name(), "delete_link");
        let back = serde_json::to_value(&cmd).unwrap();
        assert_eq!(back["cmd"], "delete_link");
        assert_eq!(back["params"]["id"], "3");

        let undo: Command = serde_json::from_value(json!({"cmd": "undo"})).unwrap();
        assert!(matches!(undo, Command::Undo));
    }

    #[test]
    fn from_tool_call_decodes_and_reports() {
        let cmd = Command::from_tool_call("zoom", &json!({"level": "week"})).unwrap();
        assert!(matches!(cmd, Command::Zoom(_)));

        let err = Command::from_tool_call("paint_everything", &json!({})).unwrap_err();
        assert_eq!(err, ToolCallError::UnknownCommand("paint_everything".into()));

        let err = Command::from_tool_call("zoom", &json!({"level": "decade"})).unwrap_err();
        assert!(matches!(err, ToolCallError::InvalidArguments { command: "zoom", .. }));

        // No-params commands ignore whatever arguments arrive.
        assert!(Command::from_tool_call("clear_all", &json!(null)).is_ok());
    }

    #[test]
    fn flags() {
        let undo = Command::Undo.info();
        assert!(!undo.undoable);
        let add = Command::from_tool_call("add_task", &json!({"text": "A"})).unwrap().info();
        assert!(add.undoable && add.reschedules && !add.llm_hidden);
        let wrapper = Command::from_tool_call("set_link_wrapper_width", &json!({"width": 10})).unwrap();
        assert!(wrapper.info().llm_hidden);
    }

    #[test]
    fn validate_runs_param_checks() {
        let cmd = Command::from_tool_call("style_task", &json!({"id": "all", "color": "bogus;"})).unwrap();
        assert!(cmd.validate().is_err());
        assert!(Command::ClearAll.validate().is_ok());
    }
}
