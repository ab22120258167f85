#![allow(clippy::needless_pass_by_value)]

use crate::chart::ChartChange;
use crate::dispatcher::Workspace;
use crate::error::AppError;
use crate::registry::params::AutoscheduleParams;
use crate::registry::{CommandOutput, CommandResult};

pub fn autoschedule(ws: &mut Workspace, p: AutoscheduleParams) -> Result<CommandOutput, AppError> {
    let calendar = ws.view.calendar();
    let moved = ws
        .chart
        .recompute_schedule(&mut ws.project, &calendar, p.anchor_task_id.as_ref())?;
    let scope = p
        .anchor_task_id
        .as_ref()
        .map_or_else(|| "the whole project".to_string(), |a| format!("tasks after {a}"));
    Ok(CommandOutput::new(
        format!("Auto-scheduled {scope}: {} task(s) moved.", moved.len()),
        CommandResult::Autoschedule(moved.clone()),
    )
    .with_changes([ChartChange::ScheduleRecomputed { moved }]))
}
