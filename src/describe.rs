use crate::model::{ItemId, Project, TaskKind, ViewConfig, WorkCalendar};
use crate::util::format_date;

/// Human-readable outline of a project: task tree with dates, links, markers.
pub fn describe_project(project: &Project, view: &ViewConfig) -> String {
    let calendar = view.calendar();
    let mut lines = Vec::new();

    lines.push(format!("Project: {}", project.name().unwrap_or("(untitled)")));
    if let Some((start, end)) = project.span(&calendar) {
        lines.push(format!("Span: {} .. {}", format_date(start), format_date(end)));
    }

    // Tasks
    lines.push(format!("\nTasks ({})", project.task_count()));
    for id in project.children_of(&ItemId::root()) {
        push_task_tree(project, &calendar, &id, &mut lines);
    }

    // Links
    if project.link_count() > 0 {
        lines.push(format!("\nLinks ({})", project.link_count()));
        for link in project.links() {
            let lag = if link.lag == 0 {
                String::new()
            } else {
                format!(", lag {}", link.lag)
            };
            lines.push(format!(
                "  - [{}] {} -> {} ({}{lag})",
                link.id,
                task_label(project, &link.source),
                task_label(project, &link.target),
                link.kind.name()
            ));
        }
    }

    // Markers
    let markers: Vec<_> = project.markers().collect();
    if !markers.is_empty() {
        lines.push(format!("\nMarkers ({})", markers.len()));
        for m in markers {
            lines.push(format!("  - [{}] {} on {}", m.id, m.text, format_date(m.start_date)));
        }
    }

    lines.push(format!("\n{}", describe_view(view)));
    lines.join("\n")
}

fn push_task_tree(project: &Project, calendar: &WorkCalendar, id: &ItemId, lines: &mut Vec<String>) {
    let Some(task) = project.get_task(id) else {
        return;
    };
    let indent = "  ".repeat(project.depth_of(id) + 1);
    let dates = match task.kind {
        TaskKind::Milestone => format!("milestone {}", format_date(task.start_date)),
        _ => format!(
            "{} .. {}, {}d",
            format_date(task.start_date),
            format_date(task.end_date(calendar)),
            task.duration
        ),
    };
    let summary = if task.kind == TaskKind::Summary { " [summary]" } else { "" };
    let progress = if task.progress > 0.0 {
        format!(", {:.0}% done", task.progress * 100.0)
    } else {
        String::new()
    };
    lines.push(format!("{indent}- [{}] {}{summary} ({dates}{progress})", task.id, task.text));

    for child in project.children_of(id) {
        push_task_tree(project, calendar, &child, lines);
    }
}

fn task_label(project: &Project, id: &ItemId) -> String {
    project
        .get_task(id)
        .map_or_else(|| id.to_string(), |t| format!("{} \"{}\"", t.id, t.text))
}

/// One-paragraph summary of the presentation settings.
pub fn describe_view(view: &ViewConfig) -> String {
    let zoom = crate::util::serde_variant_name(&view.zoom).unwrap_or_default();
    let skin = crate::util::serde_variant_name(&view.skin).unwrap_or_default();
    let mut line = format!("View: zoom {zoom}, skin {skin}, {} scale row(s)", view.scales.len());
    if !view.hidden_weekdays.is_empty() {
        let days: Vec<String> = view.hidden_weekdays.iter().map(ToString::to_string).collect();
        line.push_str(&format!(", hidden weekdays {}", days.join(",")));
    }
    if !view.show_links {
        line.push_str(", links hidden");
    }
    line
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::model::{Link, LinkKind, Task};
    use chrono::NaiveDate;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    #[test]
    fn outline_nests_children() {
        let mut project = Project::new();
        project.set_name(Some("Website".into()));
        project.add_task(Task::new(ItemId::from(1), "Website", d(5, 5), 5)).unwrap();
        project
            .add_task(Task::new(ItemId::from(2), "Design", d(5, 5), 2).with_parent(ItemId::from(1)))
            .unwrap();
        project
            .add_task(Task::new(ItemId::from(3), "Build", d(5, 7), 3).with_parent(ItemId::from(1)))
            .unwrap();
        project
            .add_link(Link::new(ItemId::from(10), ItemId::from(2), ItemId::from(3), LinkKind::FinishToStart))
            .unwrap();

        let text = describe_project(&project, &ViewConfig::default());
        assert!(text.starts_with("Project: Website"));
        assert!(text.contains("Tasks (3)"));
        assert!(text.contains("    - [2] Design"));
        assert!(text.contains("Links (1)"));
        assert!(text.contains("2 \"Design\" -> 3 \"Build\""));
        assert!(text.contains("View: zoom"));
    }

    #[test]
    fn empty_project_is_untitled() {
        let text = describe_project(&Project::new(), &ViewConfig::default());
        assert!(text.contains("(untitled)"));
        assert!(text.contains("Tasks (0)"));
        assert!(!text.contains("Links"));
    }
}
