//! JSONL audit logging for dispatched commands.
//!
//! Every command the dispatcher runs is logged as a single line in
//! `{app_config_dir}/audit-logs/YYYY-MM-DD.jsonl`. Best-effort: never
//! panics or fails the caller.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct CommandAuditEntry<'a> {
    ts: DateTime<Utc>,
    session: Option<&'a str>,
    /// `chat` when the command came from a translated utterance, `direct` otherwise.
    source: &'a str,
    command: &'a str,
    params: &'a Value,
    ok: bool,
    message: &'a str,
    duration_ms: u64,
}

/// One dispatched command, as seen by the audit log.
pub struct AuditRecord<'a> {
    pub session: Option<&'a str>,
    pub source: &'a str,
    pub command: &'a str,
    pub params: &'a Value,
    pub result: Result<&'a str, &'a str>,
    pub duration: Duration,
}

/// Append a record to today's JSONL audit file.
pub fn log_command(app_config_dir: &Path, record: &AuditRecord<'_>) {
    log_command_at(app_config_dir, record, Utc::now());
}

fn log_command_at(app_config_dir: &Path, record: &AuditRecord<'_>, now: DateTime<Utc>) {
    let (ok, message) = match record.result {
        Ok(msg) => (true, msg),
        Err(e) => (false, e),
    };

    let entry = CommandAuditEntry {
        ts: now,
        session: record.session,
        source: record.source,
        command: record.command,
        params: record.params,
        ok,
        message,
        duration_ms: u64::try_from(record.duration.as_millis()).unwrap_or(u64::MAX),
    };

    let dir = crate::paths::audit_logs_dir(app_config_dir);
    if let Err(e) = fs::create_dir_all(&dir) {
        tracing::debug!(error = %e, dir = %dir.display(), "audit log dir unavailable");
        return;
    }

    let path = dir.join(format!("{}.jsonl", now.format("%Y-%m-%d")));
    if let Ok(json) = serde_json::to_string(&entry) {
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&path) {
            let _ = writeln!(file, "{json}");
        }
    }
}
