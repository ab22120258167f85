#![allow(clippy::needless_pass_by_value)]

use crate::chart::ChartChange;
use crate::dispatcher::Workspace;
use crate::error::AppError;
use crate::model::{ItemId, Marker, TaskPaint};
use crate::registry::params::{
    AddMarkerParams, ColorParams, HideWeekdaysParams, Selector, SetScalesParams, SetSkinParams,
    ShowLinksParams, TooltipParams, WidthParams, ZoomParams,
};
use crate::registry::{CommandOutput, CommandResult};
use crate::util::{long_date, serde_variant_name};

fn view_changed(message: String, result: CommandResult) -> Result<CommandOutput, AppError> {
    Ok(CommandOutput::new(message, result).with_changes([ChartChange::ViewChanged]))
}

pub fn zoom(ws: &mut Workspace, p: ZoomParams) -> Result<CommandOutput, AppError> {
    ws.view.zoom = p.level;
    view_changed(format!("Zoom set to {}.", serde_variant_name(&p.level).unwrap_or_default()), CommandResult::Zoom)
}

fn paint_tasks(
    ws: &mut Workspace,
    p: &ColorParams,
    paint: TaskPaint,
) -> Result<(String, Vec<ChartChange>), AppError> {
    match &p.id {
        Selector::All => {
            let ids: Vec<ItemId> = ws.project.tasks().map(|t| t.id.clone()).collect();
            let n = ws.project.paint_all_tasks(paint, &p.color);
            Ok((
                format!("Set {} of {n} task(s) to {}.", paint.label(), p.color),
                ids.into_iter().map(|id| ChartChange::TaskUpdated { id }).collect(),
            ))
        }
        Selector::One(id) => {
            ws.project.paint_task(id, paint, &p.color)?;
            Ok((
                format!("Set {} of task {id} to {}.", paint.label(), p.color),
                vec![ChartChange::TaskUpdated { id: id.clone() }],
            ))
        }
    }
}

pub fn style_task(ws: &mut Workspace, p: ColorParams) -> Result<CommandOutput, AppError> {
    let (message, changes) = paint_tasks(ws, &p, TaskPaint::Bar)?;
    Ok(CommandOutput::new(message, CommandResult::StyleTask).with_changes(changes))
}

pub fn set_text_color(ws: &mut Workspace, p: ColorParams) -> Result<CommandOutput, AppError> {
    let (message, changes) = paint_tasks(ws, &p, TaskPaint::Text)?;
    Ok(CommandOutput::new(message, CommandResult::SetTextColor).with_changes(changes))
}

pub fn set_progress_color(ws: &mut Workspace, p: ColorParams) -> Result<CommandOutput, AppError> {
    let (message, changes) = paint_tasks(ws, &p, TaskPaint::Progress)?;
    Ok(CommandOutput::new(message, CommandResult::SetProgressColor).with_changes(changes))
}

pub fn style_link(ws: &mut Workspace, p: ColorParams) -> Result<CommandOutput, AppError> {
    let (message, changes) = match &p.id {
        Selector::All => {
            let ids: Vec<ItemId> = ws.project.links().map(|l| l.id.clone()).collect();
            let n = ws.project.paint_all_links(&p.color);
            (
                format!("Set color of {n} link(s) to {}.", p.color),
                ids.into_iter().map(|id| ChartChange::LinkUpdated { id }).collect(),
            )
        }
        Selector::One(id) => {
            ws.project.paint_link(id, &p.color)?;
            (
                format!("Set color of link {id} to {}.", p.color),
                vec![ChartChange::LinkUpdated { id: id.clone() }],
            )
        }
    };
    Ok(CommandOutput::new(message, CommandResult::StyleLink).with_changes(changes))
}

pub fn set_link_width(ws: &mut Workspace, p: WidthParams) -> Result<CommandOutput, AppError> {
    ws.view.link_line_width = p.width;
    view_changed(format!("Link width set to {}px.", p.width), CommandResult::SetLinkWidth)
}

pub fn set_link_wrapper_width(ws: &mut Workspace, p: WidthParams) -> Result<CommandOutput, AppError> {
    ws.view.link_wrapper_width = p.width;
    view_changed(
        format!("Link wrapper width set to {}px.", p.width),
        CommandResult::SetLinkWrapperWidth,
    )
}

pub fn show_links(ws: &mut Workspace, p: ShowLinksParams) -> Result<CommandOutput, AppError> {
    ws.view.show_links = p.show;
    view_changed(
        if p.show { "Links shown." } else { "Links hidden." }.to_string(),
        CommandResult::ShowLinks,
    )
}

pub fn set_task_tooltip(ws: &mut Workspace, p: TooltipParams) -> Result<CommandOutput, AppError> {
    ws.view.tooltips = p.enable;
    view_changed(
        if p.enable { "Tooltips enabled." } else { "Tooltips disabled." }.to_string(),
        CommandResult::SetTaskTooltip,
    )
}

pub fn add_marker(ws: &mut Workspace, p: AddMarkerParams) -> Result<CommandOutput, AppError> {
    let id = p.id.unwrap_or_else(|| ws.project.fresh_id());
    let text = p.text.trim().to_string();
    let title = p
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("{text} {}", long_date(p.start_date)));
    let replaced = ws.project.upsert_marker(Marker {
        id: id.clone(),
        start_date: p.start_date,
        text: text.clone(),
        title,
    });
    Ok(CommandOutput::new(
        format!(
            "{} marker \"{text}\" on {}.",
            if replaced { "Moved" } else { "Added" },
            crate::util::format_date(p.start_date)
        ),
        CommandResult::AddMarker(id.clone()),
    )
    .with_changes([ChartChange::MarkerAdded { id }]))
}

pub fn set_scales(ws: &mut Workspace, p: SetScalesParams) -> Result<CommandOutput, AppError> {
    let rows = p.scales.len();
    ws.view.set_scales(p.scales);
    view_changed(
        format!("Timeline now has {rows} scale row(s) ({}px).", ws.view.scale_height),
        CommandResult::SetScales,
    )
}

pub fn set_skin(ws: &mut Workspace, p: SetSkinParams) -> Result<CommandOutput, AppError> {
    ws.view.skin = p.skin;
    view_changed(format!("Skin set to {}.", serde_variant_name(&p.skin).unwrap_or_default()), CommandResult::SetSkin)
}

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Replaces the hidden set; hidden days also stop counting as working days.
pub fn hide_weekdays(ws: &mut Workspace, p: HideWeekdaysParams) -> Result<CommandOutput, AppError> {
    ws.view.hidden_weekdays = p.days.into_iter().collect();
    let names: Vec<&str> = ws
        .view
        .hidden_weekdays
        .iter()
        .filter_map(|d| WEEKDAY_NAMES.get(usize::from(*d)).copied())
        .collect();
    view_changed(format!("Hidden weekdays: {}.", names.join(", ")), CommandResult::HideWeekdays)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::model::{Link, LinkKind, Task, ZoomLevel};
    use chrono::NaiveDate;
    use serde_json::json;

    fn ws() -> Workspace {
        let mut ws = Workspace::headless();
        let start = NaiveDate::from_ymd_opt(2025, 5, 5).unwrap();
        for id in 1..=3u64 {
            ws.project.add_task(Task::new(ItemId::from(id), format!("T{id}"), start, 2)).unwrap();
        }
        ws.project
            .add_link(Link::new(ItemId::from(4), ItemId::from(1), ItemId::from(2), LinkKind::FinishToStart))
            .unwrap();
        ws
    }

    fn color(id: serde_json::Value, color: &str) -> ColorParams {
        serde_json::from_value(json!({"id": id, "color": color})).unwrap()
    }

    #[test]
    fn style_all_broadcasts() {
        let mut ws = ws();
        let out = style_task(&mut ws, color(json!("all"), "#ff0000")).unwrap();
        assert_eq!(out.changes.len(), 3);
        let mut painted = 0;
        ws.project.each_task(|t| {
            assert_eq!(t.color.as_deref(), Some("#ff0000"));
            painted += 1;
        });
        assert_eq!(painted, 3);
        // Other color slots are untouched.
        assert!(ws.project.tasks().all(|t| t.text_color.is_none()));
    }

    #[test]
    fn style_missing_id_is_soft() {
        let mut ws = ws();
        assert!(style_task(&mut ws, color(json!(42), "red")).unwrap_err().is_soft());
        assert!(style_link(&mut ws, color(json!(42), "red")).unwrap_err().is_soft());
    }

    #[test]
    fn text_and_progress_colors_use_their_own_slots() {
        let mut ws = ws();
        set_text_color(&mut ws, color(json!(1), "white")).unwrap();
        set_progress_color(&mut ws, color(json!(1), "#333")).unwrap();
        let t = ws.project.get_task(&ItemId::from(1)).unwrap();
        assert_eq!(t.text_color.as_deref(), Some("white"));
        assert_eq!(t.progress_color.as_deref(), Some("#333"));
        assert!(t.color.is_none());
    }

    #[test]
    fn style_link_all() {
        let mut ws = ws();
        style_link(&mut ws, color(json!("ALL"), "blue")).unwrap();
        assert_eq!(ws.project.get_link(&ItemId::from(4)).unwrap().color.as_deref(), Some("blue"));
    }

    #[test]
    fn marker_title_defaults_to_long_date() {
        let mut ws = ws();
        add_marker(
            &mut ws,
            serde_json::from_value(json!({"start_date": "2025-07-20", "text": "Launch"})).unwrap(),
        )
        .unwrap();
        let marker = ws.project.markers().next().unwrap();
        assert_eq!(marker.title, "Launch 20 July 2025");
        assert_eq!(marker.id, ItemId::from(5));
    }

    #[test]
    fn scales_set_row_height() {
        let mut ws = ws();
        set_scales(
            &mut ws,
            serde_json::from_value(json!({"scales": [
                {"unit": "month", "format": "%F %Y"},
                {"unit": "day", "step": 1, "format": "%j", "cssClass": "weekend"}
            ]}))
            .unwrap(),
        )
        .unwrap();
        assert_eq!(ws.view.scale_height, 70);
        assert!(ws.view.highlights_weekends());
    }

    #[test]
    fn hide_weekdays_is_idempotent() {
        let mut ws = ws();
        let p: HideWeekdaysParams = serde_json::from_value(json!({"days": [0, 6]})).unwrap();
        hide_weekdays(&mut ws, p.clone()).unwrap();
        let once = ws.view.clone();
        hide_weekdays(&mut ws, p).unwrap();
        assert_eq!(ws.view, once);
        assert_eq!(ws.view.hidden_weekdays.len(), 2);
    }

    #[test]
    fn zoom_updates_view() {
        let mut ws = ws();
        let out = zoom(&mut ws, ZoomParams { level: ZoomLevel::Month }).unwrap();
        assert_eq!(ws.view.zoom, ZoomLevel::Month);
        assert_eq!(out.changes, vec![ChartChange::ViewChanged]);
    }
}
