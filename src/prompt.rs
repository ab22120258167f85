//! System prompt for the intent translator.

use std::fmt::Write;

use chrono::NaiveDate;

use crate::model::ProjectSnapshot;

const PERSONA: &str = "\
You are a project planning assistant that edits a Gantt chart for the user. \
Turn each request into a call to one of the provided tools.";

const RULES: &str = "\
Use exactly one tool call per reply. If the request cannot be expressed with \
a single tool, do the first step and say what remains.
Replies appear in a narrow chat panel: keep them short. Markdown is allowed.
When generating a project, add a one-paragraph summary to your reply.";

const GENERATION_GUIDELINES: &str = "\
Guidelines for generate_project:
- The first task is the project itself; every other task nests under it.
- 20 to 30 tasks in total, grouped into 3 to 5 phases (type \"project\"), nested 2 to 4 levels deep.
- Cover planning, execution, testing and release.
- Include milestones where a phase ends.
- Durations are whole days (at least 1 for regular tasks).
- Tasks start no earlier than today unless the user says otherwise.
- Progress is a ratio between 0 and 1.
- Link dependent tasks, mostly finish-to-start (type \"0\").";

/// Build the system prompt for one translation.
pub fn system_prompt(today: NaiveDate, snapshot: &ProjectSnapshot) -> String {
    let mut out = String::with_capacity(2048);
    let _ = writeln!(out, "{PERSONA}\n");
    let _ = writeln!(out, "Today is {}.\n", today.format("%Y-%m-%d"));
    let _ = writeln!(out, "{RULES}\n");
    let _ = writeln!(out, "{GENERATION_GUIDELINES}\n");

    out.push_str("When you refer to an EXISTING task, use its id. Current tasks (id  text):\n");
    if snapshot.tasks.is_empty() {
        out.push_str("(none)\n");
    }
    for task in &snapshot.tasks {
        let _ = writeln!(out, "{}  {}", task.id, task.text);
    }
    if snapshot.omitted_tasks > 0 {
        let _ = writeln!(out, "... and {} more task(s) not listed.", snapshot.omitted_tasks);
    }

    out.push_str(
        "\nWhen you refer to an EXISTING link, use its id; source and target identify it. \
         Current links (id  source  target):\n",
    );
    if snapshot.links.is_empty() {
        out.push_str("(none)\n");
    }
    for link in &snapshot.links {
        let _ = writeln!(out, "{}  source: {}  target: {}", link.id, link.source, link.target);
    }
    if snapshot.omitted_links > 0 {
        let _ = writeln!(out, "... and {} more link(s) not listed.", snapshot.omitted_links);
    }

    out.push_str("\nAlways answer with a tool call when the request maps to one.\n");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::model::{ItemId, LinkRef, TaskRef};

    #[test]
    fn prompt_lists_references_and_date() {
        let snapshot = ProjectSnapshot {
            tasks: vec![TaskRef {
                id: ItemId::from(3),
                text: "Design".into(),
            }],
            links: vec![LinkRef {
                id: ItemId::from(7),
                source: ItemId::from(3),
                target: ItemId::from(4),
            }],
            omitted_tasks: 2,
            omitted_links: 0,
        };
        let prompt = system_prompt(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(), &snapshot);
        assert!(prompt.contains("Today is 2025-03-09."));
        assert!(prompt.contains("3  Design"));
        assert!(prompt.contains("7  source: 3  target: 4"));
        assert!(prompt.contains("2 more task(s)"));
        assert!(prompt.contains("exactly one tool call"));
        assert!(!prompt.contains("more link(s)"));
    }

    #[test]
    fn empty_snapshot_says_none() {
        let prompt = system_prompt(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), &ProjectSnapshot::default());
        assert_eq!(prompt.matches("(none)").count(), 2);
    }
}
