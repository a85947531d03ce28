//! Error types for the PhoneBot call-flow engine

use thiserror::Error;

/// Errors that abort a conversational turn.
///
/// Anything that only degrades a side effect (scoring, alerting, lead
/// persistence) is deliberately NOT represented here; those paths log and
/// continue so the caller still hears a spoken response.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown flow: {0}")]
    UnknownFlow(String),

    #[error("unknown step {step} in flow {flow}")]
    UnknownStep { flow: String, step: String },

    #[error("session store error: {0}")]
    Session(#[from] SessionError),
}

/// Session store failures. The webhook boundary must fail the turn on these
/// rather than proceed without transcript continuity.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no active session for call {0}")]
    Missing(String),

    #[error("call {call_id} is bound to flow {bound}, not {requested}")]
    FlowConflict {
        call_id: String,
        bound: String,
        requested: String,
    },
}

/// Sentiment scorer failures. The engine treats the utterance as neutral.
#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("scorer backend failed: {0}")]
    Backend(String),
}

/// Alert gateway failures. Logged, never fatal to the turn.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("alert transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("alert gateway rejected message: HTTP {0}")]
    Rejected(u16),
}

/// Lead ledger failures. Finalization logs these for operator follow-up; the
/// caller still hears the closing line.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("lead store error: {0}")]
    Store(#[from] sled::Error),

    #[error("lead codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
