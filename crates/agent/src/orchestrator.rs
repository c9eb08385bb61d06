//! The tool-calling turn loop.
//!
//! One `run` is one turn-chain: send the user's text, stream the answer,
//! resolve any tool calls the model made, send the results back, and repeat
//! until the model answers without tools or the turn budget is spent.
//!
//! Tool calls are deduplicated per chain by fingerprint. Transport failures
//! end the chain; tool failures are answered in-band so the model can react.

use chrono::Utc;
use futures::future::join_all;
use mizmaster_core::{
    DomainEvent, EventBus, ModelSession, ResponseChunk, Source, TokenUsage, ToolCall,
    ToolDispatcher, ToolRequest, ToolResponse, TransportError, TurnInput,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::cancel::{CancelHandle, CancelReason, ConnectionWatchdog};
use crate::stream_event::{ChainEvent, ChainObserver, ChainProgress, ChainState};

/// Answer to a repeated `get_framework_docs` call.
pub const FRAMEWORK_DUPLICATE_ALERT: &str = "SYSTEM ALERT: You have already fetched this module. Do not fetch it again. Use the data previously provided.";

/// Answer to a repeated `get_sse_docs` call.
pub const SSE_DUPLICATE_ALERT: &str =
    "SYSTEM ALERT: SSE Definitions for this category are already in context.";

/// Text fragments longer than this clear the tool status label.
const LABEL_CLEAR_THRESHOLD: usize = 5;

pub fn duplicate_alert(request: &ToolRequest) -> &'static str {
    match request {
        ToolRequest::FrameworkDocs(_) => FRAMEWORK_DUPLICATE_ALERT,
        ToolRequest::SseDocs(_) => SSE_DUPLICATE_ALERT,
    }
}

/// Status label shown while a tool call is being resolved.
pub fn status_label(call: &ToolCall) -> String {
    let subject = call
        .arguments
        .get("module_name")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Documentation");
    format!("Librarian: Fetching {subject}...")
}

/// A transport failure, classified for display.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainFailure {
    Timeout { after_secs: u64 },
    Network(String),
    Generic {
        message: String,
        hint: Option<&'static str>,
    },
}

impl ChainFailure {
    /// Classify a transport error. `timeout` is the connection timeout shown
    /// to the user.
    pub fn classify(err: &TransportError, timeout: Duration) -> Self {
        match err {
            TransportError::Timeout(_) => Self::Timeout {
                after_secs: timeout.as_secs(),
            },
            TransportError::Network(message) => Self::Network(message.clone()),
            TransportError::StreamInterrupted(message) if looks_like_network(message) => {
                Self::Network(message.clone())
            }
            other => Self::Generic {
                message: other.to_string(),
                hint: error_hint(other),
            },
        }
    }

    /// Markdown block appended to the partial answer.
    pub fn render(&self) -> String {
        match self {
            Self::Timeout { after_secs } => format!(
                "**CONNECTION TIMEOUT**\n\nThe neural engine failed to respond within {after_secs} seconds. \
                 This may be due to high server load or network congestion. Please try again."
            ),
            Self::Network(_) => {
                "**NETWORK ERROR**\n\nConnection lost during transmission. Please check your internet."
                    .to_string()
            }
            Self::Generic { message, hint } => match hint {
                Some(hint) => format!("**SYSTEM ERROR**\n\n{message}\n\n**Hint:** {hint}"),
                None => format!("**SYSTEM ERROR**\n\n{message}"),
            },
        }
    }
}

fn looks_like_network(message: &str) -> bool {
    ["Failed to fetch", "NetworkError", "connection reset", "connection closed"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Actionable hint for a model API failure.
pub fn error_hint(err: &TransportError) -> Option<&'static str> {
    let status = match err {
        TransportError::Api { status_code, .. } => Some(*status_code),
        _ => None,
    };

    if status == Some(400) || err.to_string().contains("INVALID_ARGUMENT") {
        return Some("The documentation might be too large (Payload Limit).");
    }
    match status? {
        413 => Some("The request payload was too large (413)."),
        429 => Some("You are sending requests too fast (Rate Limit)."),
        503 => Some("The AI model is currently overloaded."),
        _ => None,
    }
}

/// How a chain ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    /// The model answered without requesting tools
    Completed,
    /// The turn budget ran out with tool calls pending
    TurnLimitReached,
    /// The user stopped the chain
    Aborted,
    Failed(ChainFailure),
}

impl ChainOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::TurnLimitReached => "turn_limit",
            Self::Aborted => "aborted",
            Self::Failed(_) => "failed",
        }
    }

    pub fn final_state(&self) -> ChainState {
        match self {
            Self::Completed | Self::TurnLimitReached => ChainState::Done,
            Self::Aborted => ChainState::Aborted,
            Self::Failed(_) => ChainState::Error,
        }
    }
}

/// Result of a chain: the outcome plus everything streamed before it.
#[derive(Debug, Clone)]
pub struct ChainReport {
    pub outcome: ChainOutcome,
    pub text: String,
    pub usage: Option<TokenUsage>,
    pub sources: Vec<Source>,
    pub verified_model: Option<String>,
    pub turns: u32,
    pub tool_calls_made: usize,
    pub elapsed_ms: u64,
}

#[derive(Default)]
struct Accumulator {
    text: String,
    usage: Option<TokenUsage>,
    sources: Vec<Source>,
    verified_model: Option<String>,
    label: Option<String>,
}

impl Accumulator {
    /// Fold a chunk in. Returns the text it added.
    fn absorb(&mut self, chunk: &ResponseChunk) -> String {
        let fragment = chunk.joined_text();
        self.text.push_str(&fragment);

        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }
        for source in &chunk.sources {
            if !self.sources.iter().any(|s| s.uri == source.uri) {
                self.sources.push(source.clone());
            }
        }
        if let Some(version) = &chunk.model_version {
            self.verified_model = Some(version.clone());
        }

        if let Some(call) = chunk.tool_calls.first() {
            self.label = Some(status_label(call));
        } else if fragment.chars().count() > LABEL_CLEAR_THRESHOLD {
            self.label = None;
        }

        fragment
    }

    fn progress(&self, state: ChainState, turn: u32, started: Instant) -> ChainProgress {
        ChainProgress {
            state,
            turn,
            text: self.text.clone(),
            usage: self.usage,
            sources: self.sources.clone(),
            verified_model: self.verified_model.clone(),
            tool_status_label: self.label.clone(),
            elapsed_ms: elapsed_ms(started),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

enum Step {
    Cancelled(CancelReason),
    Chunk(Option<Result<ResponseChunk, TransportError>>),
}

/// What to do with one tool call of a finished turn.
enum Plan {
    Answer {
        output: String,
        fingerprint: Option<String>,
        deduplicated: bool,
    },
    Dispatch {
        request: ToolRequest,
        fingerprint: String,
    },
}

struct Dispatched {
    response: ToolResponse,
    deduplicated: bool,
}

/// Drives turn-chains against a model session.
pub struct Orchestrator {
    dispatcher: Arc<dyn ToolDispatcher>,
    events: Arc<EventBus>,
    max_turns: u32,
    connection_timeout: Duration,
}

impl Orchestrator {
    pub fn new(dispatcher: Arc<dyn ToolDispatcher>) -> Self {
        Self {
            dispatcher,
            events: Arc::new(EventBus::default()),
            max_turns: 5,
            connection_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_max_turns(mut self, max: u32) -> Self {
        self.max_turns = max.max(1);
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn dispatcher(&self) -> &Arc<dyn ToolDispatcher> {
        &self.dispatcher
    }

    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    fn classify(&self, err: &TransportError) -> ChainFailure {
        warn!(error = %err, "Transport failure ended the turn-chain");
        ChainFailure::classify(err, self.connection_timeout)
    }

    fn cancelled(&self, reason: CancelReason) -> ChainOutcome {
        match reason {
            CancelReason::UserAborted => {
                info!("Turn-chain aborted by user");
                ChainOutcome::Aborted
            }
            CancelReason::ConnectionTimeout => ChainOutcome::Failed(ChainFailure::Timeout {
                after_secs: self.connection_timeout.as_secs(),
            }),
        }
    }

    /// Run one turn-chain for `text`.
    ///
    /// The connection watchdog is armed for the whole chain until the first
    /// chunk arrives. Once `cancel` fires, the observer receives nothing but
    /// the terminal event.
    pub async fn run(
        &self,
        session: &dyn ModelSession,
        text: &str,
        cancel: &CancelHandle,
        observer: &dyn ChainObserver,
    ) -> ChainReport {
        let started = Instant::now();
        let mut signal = cancel.signal();
        let watchdog = ConnectionWatchdog::arm(cancel.clone(), self.connection_timeout);

        let mut acc = Accumulator::default();
        let mut fetched: HashSet<String> = HashSet::new();
        let mut input = TurnInput::Text {
            text: text.to_string(),
        };
        let mut turn = 0u32;
        let mut tool_calls_made = 0usize;

        info!(max_turns = self.max_turns, "Starting turn-chain");

        let outcome = 'chain: loop {
            turn += 1;
            debug!(turn, "Sending turn");

            let opened = tokio::select! {
                biased;
                reason = signal.cancelled() => Err(reason),
                result = session.send_stream(input.clone()) => Ok(result),
            };
            let mut stream = match opened {
                Err(reason) => break self.cancelled(reason),
                Ok(Err(e)) => break ChainOutcome::Failed(self.classify(&e)),
                Ok(Ok(stream)) => stream,
            };

            let mut pending: Vec<ToolCall> = Vec::new();
            loop {
                let step = tokio::select! {
                    biased;
                    reason = signal.cancelled() => Step::Cancelled(reason),
                    item = stream.recv() => Step::Chunk(item),
                };
                let chunk = match step {
                    Step::Cancelled(reason) => break 'chain self.cancelled(reason),
                    Step::Chunk(None) => break,
                    Step::Chunk(Some(Err(e))) => {
                        break 'chain ChainOutcome::Failed(self.classify(&e));
                    }
                    Step::Chunk(Some(Ok(chunk))) => chunk,
                };

                watchdog.disarm();
                let fragment = acc.absorb(&chunk);

                // The next select reports the cancellation.
                if signal.is_cancelled() {
                    continue;
                }

                if !fragment.is_empty() {
                    observer.on_event(&ChainEvent::Chunk { content: fragment });
                }
                for call in chunk.tool_calls {
                    debug!(tool = %call.name, id = %call.id, "Tool call requested");
                    observer.on_event(&ChainEvent::ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments.clone(),
                    });
                    pending.push(call);
                }
                observer.on_progress(&acc.progress(ChainState::Streaming, turn, started));
            }

            self.events.publish(DomainEvent::TurnCompleted {
                turn,
                tool_calls: pending.len(),
                timestamp: Utc::now(),
            });

            if pending.is_empty() {
                break ChainOutcome::Completed;
            }

            if turn >= self.max_turns {
                warn!(
                    turn,
                    pending = pending.len(),
                    "Turn limit reached with tool calls pending"
                );
                break ChainOutcome::TurnLimitReached;
            }

            info!(turn, tools = pending.len(), "Dispatching tool calls");
            observer.on_progress(&acc.progress(ChainState::ToolDispatch, turn, started));

            let dispatched = tokio::select! {
                biased;
                reason = signal.cancelled() => Err(reason),
                results = self.dispatch_turn(&pending, &mut fetched) => Ok(results),
            };
            let results = match dispatched {
                Err(reason) => break self.cancelled(reason),
                Ok(results) => results,
            };
            if let Some(reason) = signal.reason() {
                break self.cancelled(reason);
            }

            tool_calls_made += results.len();
            for result in &results {
                observer.on_event(&ChainEvent::ToolResult {
                    id: result.response.call_id.clone(),
                    name: result.response.name.clone(),
                    output: result.response.output.clone(),
                    deduplicated: result.deduplicated,
                });
            }

            input = TurnInput::ToolResponses {
                responses: results.into_iter().map(|r| r.response).collect(),
            };
        };

        drop(watchdog);
        let elapsed = elapsed_ms(started);

        let terminal = match &outcome {
            ChainOutcome::Completed | ChainOutcome::TurnLimitReached => ChainEvent::Done {
                turns: turn,
                tool_calls_made,
                turn_limit_reached: outcome == ChainOutcome::TurnLimitReached,
            },
            ChainOutcome::Aborted => ChainEvent::Aborted,
            ChainOutcome::Failed(failure) => ChainEvent::Error {
                message: failure.render(),
            },
        };
        observer.on_event(&terminal);

        self.events.publish(DomainEvent::ChainFinished {
            outcome: outcome.label().to_string(),
            turns: turn,
            timestamp: Utc::now(),
        });
        info!(
            outcome = outcome.label(),
            turns = turn,
            tool_calls_made,
            elapsed_ms = elapsed,
            "Turn-chain finished"
        );

        ChainReport {
            outcome,
            text: acc.text,
            usage: acc.usage,
            sources: acc.sources,
            verified_model: acc.verified_model,
            turns: turn,
            tool_calls_made,
            elapsed_ms: elapsed,
        }
    }

    /// Decide how to answer one call. Marks new fingerprints as fetched.
    fn plan(call: &ToolCall, fetched: &mut HashSet<String>) -> Plan {
        match ToolRequest::parse(call) {
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Rejected tool call");
                Plan::Answer {
                    output: format!("ERROR: {e}"),
                    fingerprint: None,
                    deduplicated: false,
                }
            }
            Ok(request) => {
                let fingerprint = request.fingerprint();
                if fetched.insert(fingerprint.clone()) {
                    Plan::Dispatch {
                        request,
                        fingerprint,
                    }
                } else {
                    warn!(fingerprint = %fingerprint, "Duplicate tool call blocked");
                    Plan::Answer {
                        output: duplicate_alert(&request).to_string(),
                        fingerprint: Some(fingerprint),
                        deduplicated: true,
                    }
                }
            }
        }
    }

    /// Answer every call of a turn. Dispatches run concurrently; results keep
    /// the order of `calls`.
    async fn dispatch_turn(
        &self,
        calls: &[ToolCall],
        fetched: &mut HashSet<String>,
    ) -> Vec<Dispatched> {
        let plans: Vec<Plan> = calls.iter().map(|call| Self::plan(call, fetched)).collect();

        let answers = join_all(plans.into_iter().map(|plan| async move {
            let started = Instant::now();
            let (output, fingerprint, deduplicated) = match plan {
                Plan::Answer {
                    output,
                    fingerprint,
                    deduplicated,
                } => (output, fingerprint, deduplicated),
                Plan::Dispatch {
                    request,
                    fingerprint,
                } => (self.dispatcher.dispatch(&request).await, Some(fingerprint), false),
            };
            (output, fingerprint, deduplicated, elapsed_ms(started))
        }))
        .await;

        calls
            .iter()
            .zip(answers)
            .map(|(call, (output, fingerprint, deduplicated, duration_ms))| {
                self.events.publish(DomainEvent::ToolDispatched {
                    tool_name: call.name.clone(),
                    fingerprint: fingerprint.unwrap_or_default(),
                    deduplicated,
                    duration_ms,
                    timestamp: Utc::now(),
                });
                Dispatched {
                    response: ToolResponse {
                        call_id: call.id.clone(),
                        name: call.name.clone(),
                        output,
                    },
                    deduplicated,
                }
            })
            .collect()
    }
}
