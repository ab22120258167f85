#![allow(clippy::needless_pass_by_value)]

use crate::chart::{ChartChange, ExportFormat, ExportRequest};
use crate::dispatcher::Workspace;
use crate::error::AppError;
use crate::registry::params::{ExportPdfParams, ExportPngParams};
use crate::registry::{CommandOutput, CommandResult};

/// `name` with the format's extension, appended when missing.
fn export_filename(name: Option<String>, format: ExportFormat) -> String {
    let ext = format.extension();
    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("gantt.{ext}"));
    if name.to_ascii_lowercase().ends_with(&format!(".{ext}")) {
        name
    } else {
        format!("{name}.{ext}")
    }
}

fn export(ws: &mut Workspace, request: ExportRequest) -> Result<(String, Vec<ChartChange>), AppError> {
    ws.chart.export_view(&request)?;
    Ok((
        format!("Exported the chart as {}.", request.filename),
        vec![ChartChange::Exported {
            format: request.format,
            filename: request.filename,
        }],
    ))
}

pub fn export_png(ws: &mut Workspace, p: ExportPngParams) -> Result<CommandOutput, AppError> {
    let request = ExportRequest {
        format: ExportFormat::Png,
        filename: export_filename(p.name, ExportFormat::Png),
        raw: false,
    };
    let (message, changes) = export(ws, request.clone())?;
    Ok(CommandOutput::new(message, CommandResult::ExportPng(request)).with_changes(changes))
}

pub fn export_to_pdf(ws: &mut Workspace, p: ExportPdfParams) -> Result<CommandOutput, AppError> {
    let request = ExportRequest {
        format: ExportFormat::Pdf,
        filename: export_filename(p.name, ExportFormat::Pdf),
        raw: p.raw.unwrap_or(true),
    };
    let (message, changes) = export(ws, request.clone())?;
    Ok(CommandOutput::new(message, CommandResult::ExportToPdf(request)).with_changes(changes))
}

/// Restore the most recent checkpoint held by the chart.
pub fn undo(ws: &mut Workspace) -> Result<CommandOutput, AppError> {
    let checkpoint = ws.chart.undo_last().ok_or(AppError::NothingToUndo)?;
    ws.project = checkpoint.project;
    ws.view = checkpoint.view;
    Ok(CommandOutput::new(format!("Undid: {}.", checkpoint.description), CommandResult::Undo)
        .with_changes([ChartChange::Reloaded, ChartChange::ViewChanged]))
}
