use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::ItemId;
use super::project::Project;
use crate::error::AppError;

pub const DEFAULT_SNAPSHOT_LIMIT: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: ItemId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRef {
    pub id: ItemId,
    pub source: ItemId,
    pub target: ItemId,
}

/// Bounded id reference lists handed to the translator so the model can
/// resolve names like "the design task" to concrete ids.
///
/// Truncation keeps the first `limit` entries in insertion order; newer
/// entries are dropped and counted in `omitted_*`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub tasks: Vec<TaskRef>,
    pub links: Vec<LinkRef>,
    #[serde(default)]
    pub omitted_tasks: usize,
    #[serde(default)]
    pub omitted_links: usize,
}

impl ProjectSnapshot {
    pub fn from_project(project: &Project, limit: usize) -> Self {
        let tasks: Vec<TaskRef> = project
            .tasks()
            .take(limit)
            .map(|t| TaskRef {
                id: t.id.clone(),
                text: t.text.clone(),
            })
            .collect();
        let links: Vec<LinkRef> = project
            .links()
            .take(limit)
            .map(|l| LinkRef {
                id: l.id.clone(),
                source: l.source.clone(),
                target: l.target.clone(),
            })
            .collect();
        Self {
            omitted_tasks: project.task_count().saturating_sub(tasks.len()),
            omitted_links: project.link_count().saturating_sub(links.len()),
            tasks,
            links,
        }
    }

    /// Build a snapshot from a chart's serialized `{ data: [...], links: [...] }`
    /// payload. Only ids, texts and endpoints are read; entries missing them
    /// are skipped.
    pub fn from_chart_payload(payload: &Value, limit: usize) -> Result<Self, AppError> {
        let object = payload
            .as_object()
            .ok_or_else(|| AppError::invalid("Chart snapshot must be an object with `data` and `links`"))?;

        let all_tasks: Vec<TaskRef> = entries(object.get("data"))
            .filter_map(|t| {
                Some(TaskRef {
                    id: id_field(t, &["id"])?,
                    text: t.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
                })
            })
            .collect();
        let all_links: Vec<LinkRef> = entries(object.get("links"))
            .filter_map(|l| {
                Some(LinkRef {
                    id: id_field(l, &["id"])?,
                    source: id_field(l, &["source", "sourceId"])?,
                    target: id_field(l, &["target", "targetId"])?,
                })
            })
            .collect();

        let omitted_tasks = all_tasks.len().saturating_sub(limit);
        let omitted_links = all_links.len().saturating_sub(limit);
        Ok(Self {
            tasks: all_tasks.into_iter().take(limit).collect(),
            links: all_links.into_iter().take(limit).collect(),
            omitted_tasks,
            omitted_links,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.links.is_empty()
    }
}

fn entries(value: Option<&Value>) -> impl Iterator<Item = &Value> {
    value.and_then(Value::as_array).into_iter().flatten()
}

fn id_field(value: &Value, keys: &[&str]) -> Option<ItemId> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .find_map(|v| serde_json::from_value::<ItemId>(v.clone()).ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::model::task::Task;

    fn project_with(n: u64) -> Project {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let tasks = (1..=n)
            .map(|i| Task::new(ItemId::from(i), format!("T{i}"), start, 1))
            .collect();
        Project::from_parts(tasks, vec![]).unwrap()
    }

    #[test]
    fn lists_every_id_under_the_limit() {
        let p = project_with(3);
        let snap = p.snapshot(DEFAULT_SNAPSHOT_LIMIT);
        let ids: Vec<&str> = snap.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(snap.omitted_tasks, 0);
    }

    #[test]
    fn truncation_keeps_oldest_entries() {
        let p = project_with(200);
        let snap = p.snapshot(150);
        assert_eq!(snap.tasks.len(), 150);
        assert_eq!(snap.tasks[0].id, ItemId::from(1));
        assert_eq!(snap.tasks[149].id, ItemId::from(150));
        assert_eq!(snap.omitted_tasks, 50);
    }

    #[test]
    fn parses_chart_payload() {
        let payload = json!({
            "data": [
                {"id": 1, "text": "Plan", "start_date": "2025-07-01 00:00"},
                {"id": "2", "text": "Build"},
                {"text": "no id"}
            ],
            "links": [{"id": 7, "source": 1, "target": "2", "type": "0"}]
        });
        let snap = ProjectSnapshot::from_chart_payload(&payload, 150).unwrap();
        assert_eq!(snap.tasks.len(), 2);
        assert_eq!(snap.tasks[1].text, "Build");
        assert_eq!(snap.links[0].source, ItemId::from(1));
        assert!(ProjectSnapshot::from_chart_payload(&json!([1, 2]), 150).is_err());
    }
}
