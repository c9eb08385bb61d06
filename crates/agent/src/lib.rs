//! The MizMaster conversation core.
//!
//! A user message starts a **turn-chain**:
//!
//! 1. **Refresh** the model session if the settings or history changed
//! 2. **Stream** the model's answer, publishing progress after every chunk
//! 3. **If tool calls**: answer them through the librarian (each logical
//!    request at most once per chain) and send the results back
//! 4. **Otherwise**: finalize the model message
//!
//! The chain also ends when the turn budget runs out, the transport fails,
//! or the user stops it.

pub mod cancel;
pub mod context;
pub mod engine;
pub mod orchestrator;
pub mod stream_event;
pub mod system_prompt;

pub use cancel::{CancelHandle, CancelReason, CancelSignal, ConnectionWatchdog};
pub use context::{ContextPruner, PruneBudget};
pub use engine::{
    ABORT_MARKER, ActivityCallback, ApiStatus, ChannelSink, ChatEngine, EngineError,
    EngineSettings, MessageSink,
};
pub use orchestrator::{ChainFailure, ChainOutcome, ChainReport, Orchestrator};
pub use stream_event::{ChainEvent, ChainObserver, ChainProgress, ChainState, NoopObserver};
pub use system_prompt::effective_instruction;
