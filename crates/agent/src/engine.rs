//! The chat engine: session lifecycle around the orchestrator.
//!
//! `ChatEngine` owns the model session. It rebuilds the session when the
//! settings change or the history drifts, appends the user and streaming
//! model messages for each send, and turns the chain report into the final
//! model message.

use chrono::Utc;
use mizmaster_config::AppConfig;
use mizmaster_core::{
    ConversationMessage, DomainEvent, ModelSession, ModelTransport, SessionConfig, SessionStore,
    StoreError, TransportError,
};
use mizmaster_tools::{HostError, Librarian};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cancel::{CancelHandle, CancelReason};
use crate::context::{ContextPruner, PruneBudget};
use crate::orchestrator::{ChainFailure, ChainOutcome, ChainReport, Orchestrator};
use crate::stream_event::{ChainObserver, ChainProgress};
use crate::system_prompt::effective_instruction;

/// Appended to the model message when the user stops generation.
pub const ABORT_MARKER: &str = "\n\n**[GENERATION ABORTED]**";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("A response is already being generated")]
    Busy,

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Librarian setup failed: {0}")]
    Librarian(#[from] HostError),
}

/// Connection state shown to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatus {
    #[default]
    Idle,
    Connecting,
    Streaming,
    Error,
    Offline,
}

/// Per-engine settings that shape the model session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSettings {
    pub model: String,
    pub desanitized: bool,
    pub session_id: Option<String>,
    pub github_token: Option<String>,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            desanitized: config.desanitized,
            session_id: None,
            github_token: config.github_token.clone(),
        }
    }
}

/// Receives the full message list whenever it changes. Must not block.
pub trait MessageSink: Send + Sync {
    fn publish(&self, messages: &[ConversationMessage]);
}

/// [`MessageSink`] that forwards snapshots over an unbounded channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Vec<ConversationMessage>>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<ConversationMessage>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageSink for ChannelSink {
    fn publish(&self, messages: &[ConversationMessage]) {
        // A dropped receiver only means nobody is watching.
        let _ = self.tx.send(messages.to_vec());
    }
}

pub type ActivityCallback = Box<dyn Fn() + Send + Sync>;

/// The settings a cached session was built for.
struct CachedSession {
    session: Arc<dyn ModelSession>,
    model: String,
    desanitized: bool,
    session_id: Option<String>,
    message_count: usize,
}

impl CachedSession {
    fn is_stale(&self, settings: &EngineSettings, message_count: usize, drift: usize) -> bool {
        self.model != settings.model
            || self.desanitized != settings.desanitized
            || self.session_id != settings.session_id
            || self.message_count.abs_diff(message_count) > drift
    }
}

/// Clears the in-flight slot when a send ends, however it ends.
struct InFlight<'a> {
    slot: &'a Mutex<Option<CancelHandle>>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *lock(self.slot) = None;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Applies chain progress to the streaming model message.
struct MessageObserver<'a> {
    messages: Mutex<Vec<ConversationMessage>>,
    index: usize,
    sink: Option<&'a dyn MessageSink>,
    status: &'a Mutex<ApiStatus>,
}

impl MessageObserver<'_> {
    fn into_messages(self) -> Vec<ConversationMessage> {
        self.messages
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ChainObserver for MessageObserver<'_> {
    fn on_progress(&self, progress: &ChainProgress) {
        *lock(self.status) = ApiStatus::Streaming;

        let mut messages = lock(&self.messages);
        if let Some(msg) = messages.get_mut(self.index) {
            msg.text = progress.text.clone();
            msg.sources = progress.sources.clone();
            msg.token_usage = progress.usage;
            msg.tool_status_label = progress.tool_status_label.clone();
            msg.elapsed_ms = Some(progress.elapsed_ms);
            if progress.verified_model.is_some() {
                msg.verified_model_id = progress.verified_model.clone();
            }
        }
        if let Some(sink) = self.sink {
            sink.publish(&messages);
        }
    }
}

/// Conversation engine for one user.
pub struct ChatEngine {
    transport: Arc<dyn ModelTransport>,
    orchestrator: Orchestrator,
    pruner: ContextPruner,
    librarian: Option<Arc<Librarian>>,
    settings: Mutex<EngineSettings>,
    session: tokio::sync::Mutex<Option<CachedSession>>,
    in_flight: Mutex<Option<CancelHandle>>,
    status: Mutex<ApiStatus>,
    sink: Option<Arc<dyn MessageSink>>,
    on_activity: Option<ActivityCallback>,
    temperature: f32,
    refresh_drift: usize,
}

impl ChatEngine {
    pub fn new(
        transport: Arc<dyn ModelTransport>,
        orchestrator: Orchestrator,
        settings: EngineSettings,
    ) -> Self {
        Self {
            transport,
            orchestrator,
            pruner: ContextPruner::new(PruneBudget::default()),
            librarian: None,
            settings: Mutex::new(settings),
            session: tokio::sync::Mutex::new(None),
            in_flight: Mutex::new(None),
            status: Mutex::new(ApiStatus::Idle),
            sink: None,
            on_activity: None,
            temperature: 0.1,
            refresh_drift: 5,
        }
    }

    /// Engine wired to a GitHub-backed librarian, with limits from `config`.
    pub fn from_config(
        config: &AppConfig,
        transport: Arc<dyn ModelTransport>,
    ) -> Result<Self, EngineError> {
        let librarian = Arc::new(Librarian::from_config(config)?);
        let orchestrator = Orchestrator::new(librarian.clone())
            .with_max_turns(config.engine.max_turns)
            .with_connection_timeout(Duration::from_secs(config.engine.connection_timeout_secs));

        let mut engine = Self::new(transport, orchestrator, EngineSettings::from_config(config))
            .with_pruner(ContextPruner::new(PruneBudget::from(&config.context)))
            .with_temperature(config.temperature)
            .with_refresh_drift(config.engine.refresh_drift);
        engine.librarian = Some(librarian);
        Ok(engine)
    }

    pub fn with_pruner(mut self, pruner: ContextPruner) -> Self {
        self.pruner = pruner;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_activity_callback(mut self, callback: ActivityCallback) -> Self {
        self.on_activity = Some(callback);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_refresh_drift(mut self, drift: usize) -> Self {
        self.refresh_drift = drift;
        self
    }

    pub fn settings(&self) -> EngineSettings {
        lock(&self.settings).clone()
    }

    pub fn set_model(&self, model: impl Into<String>) {
        lock(&self.settings).model = model.into();
    }

    pub fn set_desanitized(&self, desanitized: bool) {
        lock(&self.settings).desanitized = desanitized;
    }

    /// Replace the GitHub token used for tree listings.
    pub async fn set_github_token(&self, token: Option<String>) {
        lock(&self.settings).github_token = token.clone();
        if let Some(librarian) = &self.librarian {
            librarian.set_github_token(token).await;
        }
    }

    pub fn status(&self) -> ApiStatus {
        *lock(&self.status)
    }

    fn set_status(&self, status: ApiStatus) {
        *lock(&self.status) = status;
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    pub fn event_bus(&self) -> &Arc<mizmaster_core::EventBus> {
        self.orchestrator.event_bus()
    }

    /// Load a session's history and make it the active session.
    pub async fn load_session(
        &self,
        store: &dyn SessionStore,
        session_id: &str,
    ) -> Result<Vec<ConversationMessage>, EngineError> {
        let history = store.load_history(session_id).await?;
        lock(&self.settings).session_id = Some(session_id.to_string());
        info!(session_id, messages = history.len(), "Session loaded");
        Ok(history)
    }

    /// Stop the in-flight chain. Returns false if nothing was running.
    pub fn stop(&self) -> bool {
        match lock(&self.in_flight).as_ref() {
            Some(handle) => handle.cancel(CancelReason::UserAborted),
            None => false,
        }
    }

    /// Send `text` after `history` and return the updated history.
    ///
    /// Transport failures do not surface as errors: they are rendered into
    /// the model message, as is a user abort.
    pub async fn send_message(
        &self,
        history: Vec<ConversationMessage>,
        text: &str,
    ) -> Result<Vec<ConversationMessage>, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::EmptyMessage);
        }

        let cancel = CancelHandle::new();
        {
            let mut slot = lock(&self.in_flight);
            if slot.is_some() {
                return Err(EngineError::Busy);
            }
            *slot = Some(cancel.clone());
        }
        let _in_flight = InFlight {
            slot: &self.in_flight,
        };

        let settings = self.settings();
        let prior_count = history.len();

        let mut messages = history;
        messages.push(ConversationMessage::user(text));
        messages.push(ConversationMessage::streaming_placeholder(&settings.model));
        let index = messages.len() - 1;

        self.publish(&messages);
        if let Some(callback) = &self.on_activity {
            callback();
        }
        self.set_status(ApiStatus::Connecting);

        let session = match self
            .session_for(&messages[..prior_count], &settings)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to open model session");
                let failure = ChainFailure::classify(&e, self.orchestrator.connection_timeout());
                self.finish_failed(&mut messages[index], &failure);
                self.publish(&messages);
                return Ok(messages);
            }
        };

        let observer = MessageObserver {
            messages: Mutex::new(messages),
            index,
            sink: self.sink.as_deref(),
            status: &self.status,
        };
        let report = self
            .orchestrator
            .run(session.as_ref(), text, &cancel, &observer)
            .await;

        let mut messages = observer.into_messages();
        self.finalize(&mut messages[index], report);
        self.publish(&messages);
        Ok(messages)
    }

    fn publish(&self, messages: &[ConversationMessage]) {
        if let Some(sink) = &self.sink {
            sink.publish(messages);
        }
    }

    fn finalize(&self, msg: &mut ConversationMessage, report: ChainReport) {
        msg.text = report.text;
        msg.sources = report.sources;
        msg.token_usage = report.usage.or(msg.token_usage);
        if report.verified_model.is_some() {
            msg.verified_model_id = report.verified_model;
        }
        msg.elapsed_ms = Some(report.elapsed_ms);
        msg.tool_status_label = None;
        msg.is_streaming = false;

        match report.outcome {
            ChainOutcome::Completed | ChainOutcome::TurnLimitReached => {
                self.set_status(ApiStatus::Idle);
            }
            ChainOutcome::Aborted => {
                msg.text.push_str(ABORT_MARKER);
                self.set_status(ApiStatus::Idle);
            }
            ChainOutcome::Failed(failure) => self.finish_failed(msg, &failure),
        }
    }

    fn finish_failed(&self, msg: &mut ConversationMessage, failure: &ChainFailure) {
        if !msg.text.is_empty() {
            msg.text.push_str("\n\n");
        }
        msg.text.push_str(&failure.render());
        msg.is_streaming = false;
        msg.tool_status_label = None;

        self.set_status(match failure {
            ChainFailure::Network(_) => ApiStatus::Offline,
            _ => ApiStatus::Error,
        });
    }

    /// The cached session, rebuilt first if stale.
    async fn session_for(
        &self,
        history: &[ConversationMessage],
        settings: &EngineSettings,
    ) -> Result<Arc<dyn ModelSession>, TransportError> {
        let mut cached = self.session.lock().await;
        if let Some(current) = cached.as_ref() {
            if !current.is_stale(settings, history.len(), self.refresh_drift) {
                debug!("Reusing model session");
                return Ok(current.session.clone());
            }
        }

        let seeded: Vec<ConversationMessage> = self
            .pruner
            .prune(history)
            .into_iter()
            .filter(ConversationMessage::has_text)
            .collect();
        let seeded_len = seeded.len();

        info!(
            model = %settings.model,
            desanitized = settings.desanitized,
            history = history.len(),
            seeded = seeded_len,
            "Refreshing model session"
        );

        let timeout = self.orchestrator.connection_timeout();
        let session = tokio::time::timeout(
            timeout,
            self.transport.create_session(SessionConfig {
                model: settings.model.clone(),
                system_instruction: effective_instruction(&settings.model, settings.desanitized),
                temperature: self.temperature,
                history: seeded,
                tools: self.orchestrator.dispatcher().definitions(),
            }),
        )
        .await
        .map_err(|_| {
            TransportError::Timeout(format!("session not ready after {}s", timeout.as_secs()))
        })??;

        self.orchestrator
            .event_bus()
            .publish(DomainEvent::SessionRefreshed {
                model: settings.model.clone(),
                history_len: seeded_len,
                timestamp: Utc::now(),
            });

        *cached = Some(CachedSession {
            session: session.clone(),
            model: settings.model.clone(),
            desanitized: settings.desanitized,
            session_id: settings.session_id.clone(),
            message_count: history.len(),
        });
        Ok(session)
    }
}
