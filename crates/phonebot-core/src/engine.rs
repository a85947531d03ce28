//! Dialogue engine: one turn in, one spoken response out.
//!
//! The engine interprets the active flow table for the call's session:
//! capture the utterance, score it, fire the step's triggers, then either
//! hand back the next question or finalize the call into a lead.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::alerts::AlertGateway;
use crate::config::BotConfig;
use crate::error::{EngineError, SessionError};
use crate::flow::{self, Flow, FlowStep, NextStep, TriggerAction};
use crate::leads::{Lead, LeadLedger, LEAD_SOURCE};
use crate::sentiment::SentimentScorer;
use crate::session::{CallSession, SessionStore, TranscriptEntry};
use tokio::sync::Mutex;

/// Caller-supplied request context forwarded through webhook parameters.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub name: Option<String>,
    pub referrer: Option<String>,
    pub phone: Option<String>,
}

/// What the caller hears next.
#[derive(Debug, Clone)]
pub enum TurnResult {
    /// Speak the prompt and gather the next utterance; the fallback line is
    /// spoken by the platform only on true silence.
    Gather {
        prompt: String,
        fallback: String,
        next_step: String,
    },
    /// Speak the closing line and hang up.
    Finish { closing: String },
}

/// The call-flow state machine. Shared across webhook handlers; all state
/// lives in the per-call session store.
pub struct DialogueEngine {
    sessions: SessionStore,
    scorer: Arc<dyn SentimentScorer>,
    alerts: Arc<dyn AlertGateway>,
    ledger: Arc<LeadLedger>,
    config: BotConfig,
}

impl DialogueEngine {
    pub fn new(
        scorer: Arc<dyn SentimentScorer>,
        alerts: Arc<dyn AlertGateway>,
        ledger: Arc<LeadLedger>,
        config: BotConfig,
    ) -> Self {
        Self {
            sessions: SessionStore::new(),
            scorer,
            alerts,
            ledger,
            config,
        }
    }

    /// Opens the session for a new call and returns the flow's entry prompt.
    /// `name`/`phone` from the request context are captured opportunistically.
    pub async fn start_call(
        &self,
        call_id: &str,
        flow_id: &str,
        ctx: &TurnContext,
    ) -> Result<TurnResult, EngineError> {
        let flow = flow::flow(flow_id)?;
        let entry = flow.step(flow.entry)?;
        let handle = self.sessions.open(call_id, flow.id, flow.entry)?;
        let mut session = handle.lock().await;
        session.captured.absorb(ctx);
        tracing::info!(call_id, flow_id, step = entry.name, "call started");
        Ok(TurnResult::Gather {
            prompt: entry.render_prompt(ctx),
            fallback: entry.fallback.to_string(),
            next_step: entry.name.to_string(),
        })
    }

    /// Processes one webhook turn: the caller's answer to `step_name`'s
    /// prompt. `None` means the platform recognized no speech.
    pub async fn handle_turn(
        &self,
        call_id: &str,
        flow_id: &str,
        step_name: &str,
        utterance: Option<&str>,
        ctx: &TurnContext,
    ) -> Result<TurnResult, EngineError> {
        let flow = flow::flow(flow_id)?;
        let step = flow.step(step_name)?;

        // Creation only on the flow's entry step. A turn for any other step
        // must land on a live session, so a retried delivery of the final
        // turn after finalization cannot mint a fresh one-turn lead.
        let handle = if step.name == flow.entry {
            self.sessions.open(call_id, flow.id, flow.entry)?
        } else {
            self.sessions.get(call_id)?
        };
        let mut session = handle.lock().await;

        // The flow bound at creation is authoritative for the session's
        // lifetime; a turn claiming another flow is a misrouted webhook.
        if session.flow_id != flow.id {
            return Err(SessionError::FlowConflict {
                call_id: call_id.to_string(),
                bound: session.flow_id.clone(),
                requested: flow.id.to_string(),
            }
            .into());
        }
        session.captured.absorb(ctx);

        let speech = utterance
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(step.placeholder)
            .to_string();

        let sentiment = match self.scorer.score(&speech) {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!(call_id, error = %e, "scorer failed; treating turn as neutral");
                0.0
            }
        };

        let mut meta = BTreeMap::new();
        if let Some(name) = ctx.name.as_deref().filter(|s| !s.is_empty()) {
            meta.insert("name".to_string(), name.to_string());
        }
        if let Some(phone) = ctx.phone.as_deref().filter(|s| !s.is_empty()) {
            meta.insert("phone".to_string(), phone.to_string());
        }
        session.transcript.push(TranscriptEntry {
            step: step.capture_label.to_string(),
            speech: speech.clone(),
            sentiment,
            timestamp: Utc::now(),
            meta,
        });
        tracing::info!(call_id, step = step.name, sentiment, "turn captured");

        self.run_triggers(step, &speech, sentiment, &session);

        match step.next {
            NextStep::Step(next_name) => {
                let next = flow.step(next_name)?;
                session.current_step = next.name.to_string();
                Ok(TurnResult::Gather {
                    prompt: next.prompt.to_string(),
                    fallback: next.fallback.to_string(),
                    next_step: next.name.to_string(),
                })
            }
            NextStep::Finish => {
                let result = self.finalize(flow, &session);
                drop(session);
                if let Err(e) = self.sessions.remove(call_id) {
                    tracing::warn!(call_id, error = %e, "session already retired");
                }
                Ok(result)
            }
        }
    }

    /// Session lookup for dashboards and tests. Absent means the call never
    /// started or was already finalized.
    pub fn session(&self, call_id: &str) -> Result<Arc<Mutex<CallSession>>, crate::error::SessionError> {
        self.sessions.get(call_id)
    }

    pub fn active_calls(&self) -> usize {
        self.sessions.active_calls()
    }

    /// Evaluates the step's triggers in table order. Triggers are independent
    /// of each other: a single utterance may fire several.
    fn run_triggers(&self, step: &FlowStep, speech: &str, sentiment: f32, session: &CallSession) {
        let name = session
            .captured
            .name
            .clone()
            .unwrap_or_else(|| "Prospect".to_string());
        let phone = session
            .captured
            .phone
            .clone()
            .unwrap_or_else(|| self.config.alert_phone.clone());

        for trigger in &step.triggers {
            if !trigger.matches(speech, sentiment) {
                continue;
            }
            let body = match trigger.action {
                TriggerAction::PositiveAlert => {
                    format!("Positive from {}: {}", step.capture_label, speech)
                }
                TriggerAction::NegativeAlert => {
                    format!("Negative from {}: {}", step.capture_label, speech)
                }
                TriggerAction::ScheduleCallback => {
                    format!("Call-back needed: {} at {}", name, phone)
                }
                TriggerAction::OfferBooking => format!(
                    "{} requested a follow-up. Send them this: {}",
                    name, self.config.booking_link
                ),
            };
            tracing::info!(
                call_id = %session.call_id,
                step = step.name,
                action = ?trigger.action,
                "trigger fired"
            );
            self.dispatch(self.config.alert_phone.clone(), body);
        }
    }

    /// Aggregates the session into a lead: closing SMS to the best known
    /// phone, flow-specific response fields, full transcript copy, ledger
    /// write. A failed write is surfaced to the operator log, never to the
    /// caller.
    fn finalize(&self, flow: &Flow, session: &CallSession) -> TurnResult {
        let phone = session
            .captured
            .phone
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.config.alert_phone.clone());
        let name = session
            .captured
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Prospect".to_string());

        let sms = format!(
            "Hi {}, book your 1-on-1 here: {}",
            name, self.config.booking_link
        );
        self.dispatch(phone, sms);

        let mut responses = BTreeMap::new();
        for label in flow.response_fields {
            if let Some(entry) = session.transcript.iter().rev().find(|e| e.step == *label) {
                responses.insert(label.to_string(), entry.speech.clone());
            }
        }
        let lead = Lead {
            source: LEAD_SOURCE.to_string(),
            timestamp: Utc::now(),
            responses,
            transcript: session.transcript.clone(),
        };
        match self.ledger.log_lead(&lead) {
            Ok(key) => tracing::info!(
                call_id = %session.call_id,
                key,
                turns = lead.transcript.len(),
                "lead persisted"
            ),
            Err(e) => tracing::error!(
                call_id = %session.call_id,
                error = %e,
                "LEAD LOST: ledger write failed; operator follow-up required"
            ),
        }

        TurnResult::Finish {
            closing: flow.closing.to_string(),
        }
    }

    /// Spawns the delivery so the spoken response never waits on the alert
    /// transport. Failures are logged only.
    fn dispatch(&self, to: String, body: String) {
        let gateway = Arc::clone(&self.alerts);
        tokio::spawn(async move {
            if let Err(e) = gateway.send(&to, &body).await {
                tracing::warn!(to, error = %e, "alert delivery failed");
            }
        });
    }
}
