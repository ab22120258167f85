#![allow(clippy::needless_pass_by_value)]

use serde::Serialize;

use crate::chart::ChartChange;
use crate::dispatcher::Workspace;
use crate::error::AppError;
use crate::model::{ItemId, Link, Project, Task};
use crate::registry::params::{GenerateProjectParams, LinkSpec, TaskSpec};
use crate::registry::{CommandOutput, CommandResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedProject {
    pub name: Option<String>,
    pub tasks: usize,
    pub links: usize,
}

fn task_from_spec(spec: TaskSpec, force_root: bool) -> Task {
    let parent = if force_root {
        ItemId::root()
    } else {
        spec.parent.unwrap_or_else(ItemId::root)
    };
    let mut task = Task::new(spec.id, spec.text, spec.start_date, spec.duration).with_parent(parent);
    task.progress = spec.progress.unwrap_or(0.0);
    task.kind = spec.kind.unwrap_or_default();
    task
}

fn link_from_spec(project: &mut Project, spec: LinkSpec) -> Link {
    let id = spec.id.unwrap_or_else(|| project.fresh_id());
    let mut link = Link::new(id, spec.source, spec.target, spec.kind);
    link.lag = spec.lag.unwrap_or(0);
    link
}

/// Replace the whole project. The batch is built into a fresh `Project`
/// first, so a failure anywhere leaves the current one untouched.
pub fn generate_project(
    ws: &mut Workspace,
    p: GenerateProjectParams,
) -> Result<CommandOutput, AppError> {
    let tasks: Vec<Task> = p
        .tasks
        .into_iter()
        .enumerate()
        .map(|(i, spec)| task_from_spec(spec, i == 0))
        .collect();
    let root_text = tasks.first().map(|t| t.text.clone());

    let mut project = Project::from_parts(tasks, Vec::new())?;
    for spec in p.links {
        let link = link_from_spec(&mut project, spec);
        project.add_link(link)?;
    }
    project.set_name(p.project_name.or(root_text));

    let summary = GeneratedProject {
        name: project.name().map(str::to_string),
        tasks: project.task_count(),
        links: project.link_count(),
    };
    ws.project = project;

    Ok(CommandOutput::new(
        format!(
            "Generated project \"{}\" with {} task(s) and {} link(s).",
            summary.name.as_deref().unwrap_or("untitled"),
            summary.tasks,
            summary.links
        ),
        CommandResult::GenerateProject(summary.clone()),
    )
    .with_changes([ChartChange::BulkLoaded {
        tasks: summary.tasks,
        links: summary.links,
    }]))
}

pub fn clear_all(ws: &mut Workspace) -> Result<CommandOutput, AppError> {
    let tasks = ws.project.task_count();
    ws.project.clear();
    Ok(
        CommandOutput::new(format!("Cleared the chart ({tasks} task(s) removed)."), CommandResult::ClearAll)
            .with_changes([ChartChange::Cleared]),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> GenerateProjectParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn first_task_is_forced_to_root_and_names_the_project() {
        let mut ws = Workspace::headless();
        generate_project(
            &mut ws,
            params(json!({
                "tasks": [
                    {"id": 1, "text": "Website", "start_date": "2025-05-01", "duration": 10, "parent": 9},
                    {"id": 2, "text": "Design", "start_date": "2025-05-01", "duration": 3, "parent": 1},
                    {"id": 3, "text": "Build", "start_date": "2025-05-06", "duration": 5, "parent": 1}
                ],
                "links": [{"source": 2, "target": 3, "type": "0"}]
            })),
        )
        .unwrap();
        assert_eq!(ws.project.name(), Some("Website"));
        assert!(ws.project.get_task(&ItemId::from(1)).unwrap().is_top_level());
        assert_eq!(ws.project.link_count(), 1);
        // Generated link id does not collide with task ids.
        let link = ws.project.links().next().unwrap();
        assert_eq!(link.id, ItemId::from(4));
    }

    #[test]
    fn bad_batch_leaves_project_untouched() {
        let mut ws = Workspace::headless();
        ws.project
            .add_task(Task::new(ItemId::from(7), "Keep me", chrono::NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(), 2))
            .unwrap();
        let before = ws.project.clone();
        let err = generate_project(
            &mut ws,
            params(json!({
                "projectName": "Broken",
                "tasks": [
                    {"id": 1, "text": "Root", "start_date": "2025-05-01", "duration": 2},
                    {"id": 2, "text": "A", "start_date": "2025-05-01", "duration": 2, "parent": 1}
                ],
                "links": [{"source": 2, "target": 42, "type": "0"}]
            })),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError { .. }));
        assert_eq!(ws.project, before);
    }

    #[test]
    fn clear_all_removes_everything() {
        let mut ws = Workspace::headless();
        ws.project
            .add_task(Task::new(ItemId::from(1), "A", chrono::NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(), 2))
            .unwrap();
        let out = clear_all(&mut ws).unwrap();
        assert!(ws.project.is_empty());
        assert_eq!(out.changes, vec![ChartChange::Cleared]);
    }
}
