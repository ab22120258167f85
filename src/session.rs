//! Per-session state owner: one workspace, one utterance in flight.
//!
//! A turn translates the utterance outside the workspace lock and then
//! dispatches the resulting command under it. Submitting a new utterance
//! aborts the in-flight translation; a result that still arrives late is
//! dropped by the generation check.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::{AbortHandle, Abortable};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::audit::{self, AuditRecord};
use crate::dispatcher::{CommandDispatcher, Outcome, Workspace};
use crate::error::AppError;
use crate::model::ProjectSnapshot;
use crate::registry::Command;
use crate::settings::AppSettings;
use crate::translator::{HttpBackend, Translator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Idle,
    AwaitingTranslation,
    ApplyingCommand,
}

/// Reply to one submitted utterance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AppError>,
    pub superseded: bool,
}

impl TurnReply {
    fn superseded() -> Self {
        Self {
            error: Some(AppError::Superseded),
            superseded: true,
            ..Self::default()
        }
    }

    fn failed(error: AppError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionServices {
    pub dispatcher: CommandDispatcher,
    /// None when no model backend is configured; turns then fail with a
    /// translation error while direct commands keep working.
    pub translator: Option<Translator>,
    pub snapshot_limit: usize,
    /// Config dir receiving the JSONL audit log, when auditing is on.
    pub audit_dir: Option<PathBuf>,
}

impl SessionServices {
    pub fn new(dispatcher: CommandDispatcher, translator: Option<Translator>, snapshot_limit: usize) -> Self {
        Self {
            dispatcher,
            translator,
            snapshot_limit,
            audit_dir: None,
        }
    }

    pub fn with_audit(mut self, dir: Option<PathBuf>) -> Self {
        self.audit_dir = dir;
        self
    }

    /// Wire the dispatcher, the HTTP model backend (when a key is configured)
    /// and the audit log from application settings.
    pub fn from_settings(settings: &AppSettings, app_config_dir: &Path) -> Self {
        let translator = match HttpBackend::from_config(&settings.llm) {
            Ok(backend) => {
                tracing::info!(model = backend.model(), provider = ?settings.llm.provider, "model backend ready");
                Some(Translator::new(Arc::new(backend), &settings.translator))
            }
            Err(e) => {
                tracing::warn!(error = %e, "no model backend; chat turns are disabled");
                None
            }
        };
        Self::new(
            CommandDispatcher::new(settings.dispatcher),
            translator,
            settings.translator.snapshot_limit,
        )
        .with_audit(settings.audit.then(|| app_config_dir.to_path_buf()))
    }
}

struct InFlight {
    generation: u64,
    abort: AbortHandle,
}

pub struct Session {
    id: String,
    services: Arc<SessionServices>,
    workspace: Mutex<Workspace>,
    mode: Mutex<SessionMode>,
    generation: AtomicU64,
    in_flight: Mutex<Option<InFlight>>,
}

impl Session {
    pub fn new(id: impl Into<String>, services: Arc<SessionServices>, workspace: Workspace) -> Self {
        Self {
            id: id.into(),
            services,
            workspace: Mutex::new(workspace),
            mode: Mutex::new(SessionMode::Idle),
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> SessionMode {
        *self.mode.lock()
    }

    pub fn with_workspace<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Workspace) -> R,
    {
        f(&self.workspace.lock())
    }

    pub fn snapshot(&self) -> ProjectSnapshot {
        self.workspace.lock().snapshot(self.services.snapshot_limit)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Set the mode unless a newer turn has started. The mode lock is held
    /// across the generation check, and `submit` bumps the generation under
    /// the same lock.
    fn set_mode_if_current(&self, generation: u64, mode: SessionMode) -> bool {
        let mut current = self.mode.lock();
        if !self.is_current(generation) {
            return false;
        }
        *current = mode;
        true
    }

    fn finish(&self, generation: u64) {
        let mut in_flight = self.in_flight.lock();
        if in_flight.as_ref().is_some_and(|f| f.generation == generation) {
            *in_flight = None;
        }
        drop(in_flight);
        self.set_mode_if_current(generation, SessionMode::Idle);
    }

    /// Translate an utterance and apply the resulting command, if any.
    ///
    /// `snapshot` overrides the one derived from the workspace, for clients
    /// whose chart is the source of truth for ids.
    pub async fn submit(&self, utterance: &str, snapshot: Option<ProjectSnapshot>) -> TurnReply {
        let started = Instant::now();
        let generation = {
            let mut mode = self.mode.lock();
            *mode = SessionMode::AwaitingTranslation;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        let (abort, registration) = AbortHandle::new_pair();
        if let Some(previous) = self.in_flight.lock().replace(InFlight { generation, abort }) {
            tracing::warn!(session = %self.id, superseded = previous.generation, "aborting in-flight turn");
            previous.abort.abort();
        }

        let Some(translator) = self.services.translator.as_ref() else {
            self.finish(generation);
            return TurnReply::failed(AppError::TranslationError {
                message: "No model backend configured".into(),
            });
        };

        let snapshot = snapshot.unwrap_or_else(|| self.snapshot());
        let translated = Abortable::new(translator.translate(utterance, &snapshot), registration).await;

        let translation = match translated {
            Err(_aborted) => return TurnReply::superseded(),
            Ok(_) if !self.is_current(generation) => {
                tracing::warn!(session = %self.id, generation, "discarding late translation");
                return TurnReply::superseded();
            }
            Ok(Err(e)) => {
                tracing::info!(session = %self.id, error = %e, "translation failed");
                self.finish(generation);
                return TurnReply::failed(e.into());
            }
            Ok(Ok(t)) => t,
        };

        let Some(command) = translation.command else {
            self.finish(generation);
            tracing::info!(session = %self.id, elapsed_ms = elapsed_ms(started), "turn answered without a command");
            return TurnReply {
                assistant_text: translation.assistant_text,
                ..TurnReply::default()
            };
        };

        let outcome = {
            let mut ws = self.workspace.lock();
            if !self.set_mode_if_current(generation, SessionMode::ApplyingCommand) {
                return TurnReply::superseded();
            }
            self.apply(&mut ws, command.clone(), "chat")
        };
        self.finish(generation);

        tracing::info!(
            session = %self.id,
            command = command.name(),
            status = ?outcome.status,
            elapsed_ms = elapsed_ms(started),
            "turn complete"
        );
        TurnReply {
            assistant_text: translation.assistant_text,
            command: Some(command),
            outcome: Some(outcome),
            error: None,
            superseded: false,
        }
    }

    /// Apply a command that did not come from the translator.
    pub fn run_command(&self, command: Command) -> Outcome {
        let mut ws = self.workspace.lock();
        self.apply(&mut ws, command, "direct")
    }

    fn apply(&self, ws: &mut Workspace, command: Command, source: &str) -> Outcome {
        let started = Instant::now();
        let name = command.name();
        let params = self
            .services
            .audit_dir
            .as_ref()
            .map(|_| command_params(&command));
        let result = self.services.dispatcher.execute(ws, command);

        if let (Some(dir), Some(params)) = (&self.services.audit_dir, params) {
            let message = result.as_ref().map(|o| o.message.clone()).map_err(ToString::to_string);
            audit::log_command(
                dir,
                &AuditRecord {
                    session: Some(&self.id),
                    source,
                    command: name,
                    params: &params,
                    result: message.as_deref().map_err(String::as_str),
                    duration: started.elapsed(),
                },
            );
        }
        Outcome::from(result)
    }
}

fn command_params(command: &Command) -> Value {
    serde_json::to_value(command)
        .ok()
        .and_then(|v| v.get("params").cloned())
        .unwrap_or(Value::Null)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// All live sessions, keyed by client-chosen id.
pub struct SessionStore {
    services: Arc<SessionServices>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    pub fn new(services: SessionServices) -> Self {
        Self {
            services: Arc::new(services),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn services(&self) -> &SessionServices {
        &self.services
    }

    /// Existing session, or a fresh one over an empty headless workspace.
    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        self.sessions
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(session = %id, "session created");
                Arc::new(Session::new(id, self.services.clone(), Workspace::headless()))
            })
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.lock().remove(id);
        if removed.is_some() {
            tracing::info!(session = %id, "session closed");
        }
        removed.is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
