#![allow(clippy::needless_pass_by_value)]

use crate::chart::ChartChange;
use crate::dispatcher::Workspace;
use crate::error::AppError;
use crate::model::Link;
use crate::registry::params::{AddLinkParams, IdParams};
use crate::registry::{CommandOutput, CommandResult};

pub fn add_link(ws: &mut Workspace, p: AddLinkParams) -> Result<CommandOutput, AppError> {
    let id = p.id.unwrap_or_else(|| ws.project.fresh_id());
    let mut link = Link::new(id.clone(), p.source, p.target, p.kind);
    link.lag = p.lag.unwrap_or(0);
    let message = format!(
        "Linked task {} to task {} ({}, id {id}).",
        link.source,
        link.target,
        link.kind.name()
    );
    ws.project.add_link(link)?;
    Ok(CommandOutput::new(message, CommandResult::AddLink(id.clone()))
        .with_changes([ChartChange::LinkAdded { id }]))
}

pub fn delete_link(ws: &mut Workspace, p: IdParams) -> Result<CommandOutput, AppError> {
    let link = ws.project.delete_link(&p.id)?;
    Ok(CommandOutput::new(
        format!("Deleted link {} ({} -> {}).", link.id, link.source, link.target),
        CommandResult::DeleteLink,
    )
    .with_changes([ChartChange::LinkDeleted { id: link.id }]))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::model::{ItemId, Task};
    use chrono::NaiveDate;
    use serde_json::json;

    fn ws() -> Workspace {
        let mut ws = Workspace::headless();
        let start = NaiveDate::from_ymd_opt(2025, 5, 5).unwrap();
        for id in 1..=2u64 {
            ws.project.add_task(Task::new(ItemId::from(id), format!("T{id}"), start, 2)).unwrap();
        }
        ws
    }

    #[test]
    fn add_and_delete() {
        let mut ws = ws();
        let out = add_link(
            &mut ws,
            serde_json::from_value(json!({"source": 1, "target": 2, "type": "0", "lag": 1})).unwrap(),
        )
        .unwrap();
        assert_eq!(out.changes, vec![ChartChange::LinkAdded { id: ItemId::from(3) }]);
        assert_eq!(ws.project.get_link(&ItemId::from(3)).unwrap().lag, 1);

        delete_link(&mut ws, IdParams { id: ItemId::from(3) }).unwrap();
        assert_eq!(ws.project.link_count(), 0);
    }

    #[test]
    fn missing_endpoint_is_rejected() {
        let mut ws = ws();
        let err = add_link(
            &mut ws,
            serde_json::from_value(json!({"source": 1, "target": 9, "type": "0"})).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError { .. }));
    }

    #[test]
    fn delete_missing_link_is_soft() {
        let mut ws = ws();
        let err = delete_link(&mut ws, IdParams { id: ItemId::from(99) }).unwrap_err();
        assert!(err.is_soft());
        assert_eq!(ws.project.task_count(), 2);
    }
}
