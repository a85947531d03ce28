//! # PhoneBot Core — call-flow engine
//!
//! Drives an automated voice-call conversation one webhook turn at a time:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Dialogue Engine                       │
//! │  ┌────────────┐   ┌──────────────┐   ┌───────────────┐   │
//! │  │ Flow Table │ → │ Session Store│ → │   Triggers    │   │
//! │  │ (static)   │   │ (per-call)   │   │ (alerts/SMS)  │   │
//! │  └────────────┘   └──────────────┘   └───────────────┘   │
//! │                          ↓                               │
//! │                   ┌──────────────┐                       │
//! │                   │ Lead Ledger  │  (sled, append-only)  │
//! │                   └──────────────┘                       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The telephony platform, speech recognition, and the webhook transport are
//! external collaborators; this crate owns the conversation state machine.

pub mod alerts;
pub mod config;
pub mod engine;
pub mod error;
pub mod flow;
pub mod leads;
pub mod sentiment;
pub mod session;

pub use alerts::{AlertGateway, NullGateway, TwilioGateway};
pub use config::BotConfig;
pub use engine::{DialogueEngine, TurnContext, TurnResult};
pub use error::{AlertError, EngineError, LedgerError, ScorerError, SessionError};
pub use flow::{flow, Flow, FlowStep, NextStep, Trigger, TriggerAction, TriggerWhen, FLOWS};
pub use leads::{Lead, LeadLedger, LEAD_SOURCE};
pub use sentiment::{LexiconScorer, SentimentScorer};
pub use session::{CallSession, CapturedFields, SessionStore, TranscriptEntry};
