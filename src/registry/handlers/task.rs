#![allow(clippy::needless_pass_by_value)]

use crate::chart::ChartChange;
use crate::dispatcher::Workspace;
use crate::error::AppError;
use crate::model::{ItemId, Link, LinkKind, Task, TaskKind, TaskPatch};
use crate::registry::params::{AddTaskParams, FieldUpdate, IdParams, SplitTaskParams, UpdateTaskParams};
use crate::registry::{CommandOutput, CommandResult};

pub fn add_task(ws: &mut Workspace, p: AddTaskParams) -> Result<CommandOutput, AppError> {
    let id = p.id.unwrap_or_else(|| ws.project.fresh_id());
    let start = p.start_date.unwrap_or_else(crate::util::today);
    let kind = p.kind.unwrap_or_default();
    let default_duration = if kind == TaskKind::Milestone { 0 } else { 1 };

    let mut task = Task::new(id.clone(), p.text, start, p.duration.unwrap_or(default_duration))
        .with_parent(p.parent.unwrap_or_else(ItemId::root));
    task.progress = p.progress.unwrap_or(0.0);
    task.kind = kind;
    let text = task.text.trim().to_string();
    ws.project.add_task(task)?;

    Ok(CommandOutput::new(
        format!("Added task \"{text}\" (id {id})."),
        CommandResult::AddTask(id.clone()),
    )
    .with_changes([ChartChange::TaskAdded { id }]))
}

pub fn update_task(ws: &mut Workspace, p: UpdateTaskParams) -> Result<CommandOutput, AppError> {
    let patch = TaskPatch {
        text: p.text,
        start_date: p.start_date,
        duration: p.duration,
        parent: p.parent.map(|update| match update {
            FieldUpdate::Clear => ItemId::root(),
            FieldUpdate::Set(parent) => parent,
        }),
        progress: p.progress,
        kind: p.kind,
    };
    let shifts_subtree = patch.start_date.is_some();
    ws.project.update_task(&p.id, patch)?;

    let mut changes = vec![ChartChange::TaskUpdated { id: p.id.clone() }];
    if shifts_subtree {
        changes.extend(
            ws.project
                .descendants_of(&p.id)
                .into_iter()
                .map(|id| ChartChange::TaskUpdated { id }),
        );
    }
    Ok(CommandOutput::new(format!("Updated task {}.", p.id), CommandResult::UpdateTask)
        .with_changes(changes))
}

pub fn delete_task(ws: &mut Workspace, p: IdParams) -> Result<CommandOutput, AppError> {
    let removal = ws.project.delete_task(&p.id)?;
    let changes: Vec<ChartChange> = removal
        .links
        .iter()
        .map(|id| ChartChange::LinkDeleted { id: id.clone() })
        .chain(removal.tasks.iter().map(|id| ChartChange::TaskDeleted { id: id.clone() }))
        .collect();
    Ok(CommandOutput::new(
        format!(
            "Deleted task {} ({} task(s) and {} link(s) removed).",
            p.id,
            removal.tasks.len(),
            removal.links.len()
        ),
        CommandResult::DeleteTask(removal),
    )
    .with_changes(changes))
}

/// Nest new subtasks under an existing task, optionally chaining them
/// finish-to-start in the given order.
pub fn split_task(ws: &mut Workspace, p: SplitTaskParams) -> Result<CommandOutput, AppError> {
    let target_start = ws
        .project
        .get_task(&p.id)
        .map(|t| t.start_date)
        .ok_or_else(|| AppError::not_found(format!("Task {}", p.id)))?;

    let mut created: Vec<ItemId> = Vec::with_capacity(p.subtasks.len());
    let mut changes: Vec<ChartChange> = Vec::new();
    for sub in p.subtasks {
        let id = ws.project.fresh_id();
        let start = sub.start_date.unwrap_or(target_start);
        let task = Task::new(id.clone(), sub.text, start, sub.duration).with_parent(p.id.clone());
        ws.project.add_task(task)?;
        changes.push(ChartChange::TaskAdded { id: id.clone() });
        created.push(id);
    }
    ws.project.open_task(&p.id);
    changes.push(ChartChange::TaskUpdated { id: p.id.clone() });

    let mut links = 0;
    if p.add_fs_links {
        for pair in created.windows(2) {
            let [source, target] = pair else { continue };
            let id = ws.project.fresh_id();
            ws.project
                .add_link(Link::new(id.clone(), source.clone(), target.clone(), LinkKind::FinishToStart))?;
            changes.push(ChartChange::LinkAdded { id });
            links += 1;
        }
    }

    Ok(CommandOutput::new(
        format!(
            "Split task {} into {} subtask(s){}.",
            p.id,
            created.len(),
            if links > 0 { format!(" linked by {links} finish-to-start link(s)") } else { String::new() }
        ),
        CommandResult::SplitTask(created),
    )
    .with_changes(changes))
}
