//! Declarative call-flow tables.
//!
//! Each flow is an ordered table of [`FlowStep`] records interpreted by one
//! engine; adding or editing a step never touches engine logic. Two flows ship
//! built in: `referral` (short qualification script) and `intake` (full
//! intake script). Flows are static, built once at process start, never
//! mutated at runtime.

use once_cell::sync::Lazy;

use crate::engine::TurnContext;
use crate::error::EngineError;

/// Sentiment at or above this fires the positive-signal alert.
pub const POSITIVE_THRESHOLD: f32 = 3.0;
/// Sentiment at or below this fires the negative-signal alert.
pub const NEGATIVE_THRESHOLD: f32 = -2.0;
/// Substrings that signal the caller wants a call-back.
pub const CALLBACK_KEYWORDS: &[&str] = &["call", "later"];
/// Substrings that signal the caller wants a booking link.
pub const BOOKING_KEYWORDS: &[&str] = &["appointment", "schedule"];

/// Where the conversation goes after a step's response is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Step(&'static str),
    Finish,
}

/// Predicate evaluated against the captured turn.
#[derive(Debug, Clone, Copy)]
pub enum TriggerWhen {
    SentimentAtLeast(f32),
    SentimentAtMost(f32),
    /// Substring match on the lowered resolved speech. Matching runs against
    /// whatever string was actually captured, placeholders included.
    ContainsAny(&'static [&'static str]),
}

/// Side effect fired when a trigger predicate matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    PositiveAlert,
    NegativeAlert,
    ScheduleCallback,
    OfferBooking,
}

/// One (predicate, action) pair. Triggers on a step are evaluated in order and
/// independently; more than one may fire on the same utterance.
#[derive(Debug, Clone, Copy)]
pub struct Trigger {
    pub when: TriggerWhen,
    pub action: TriggerAction,
}

impl Trigger {
    pub fn matches(&self, speech: &str, sentiment: f32) -> bool {
        match self.when {
            TriggerWhen::SentimentAtLeast(t) => sentiment >= t,
            TriggerWhen::SentimentAtMost(t) => sentiment <= t,
            TriggerWhen::ContainsAny(words) => {
                let lowered = speech.to_lowercase();
                words.iter().any(|w| lowered.contains(w))
            }
        }
    }
}

/// The standard trigger set carried by every capture step, in fixed order:
/// positive signal, negative signal, call-back intent, booking intent.
fn standard_triggers() -> Vec<Trigger> {
    vec![
        Trigger {
            when: TriggerWhen::SentimentAtLeast(POSITIVE_THRESHOLD),
            action: TriggerAction::PositiveAlert,
        },
        Trigger {
            when: TriggerWhen::SentimentAtMost(NEGATIVE_THRESHOLD),
            action: TriggerAction::NegativeAlert,
        },
        Trigger {
            when: TriggerWhen::ContainsAny(CALLBACK_KEYWORDS),
            action: TriggerAction::ScheduleCallback,
        },
        Trigger {
            when: TriggerWhen::ContainsAny(BOOKING_KEYWORDS),
            action: TriggerAction::OfferBooking,
        },
    ]
}

/// One step of a call flow: the question spoken to the caller, the line used
/// when the platform reports true silence, the label its answer is recorded
/// under, the substitute text when no speech was recognized, and the pointer
/// to the next step.
#[derive(Debug, Clone)]
pub struct FlowStep {
    pub name: &'static str,
    pub capture_label: &'static str,
    pub prompt: &'static str,
    pub fallback: &'static str,
    /// Step-specific substitute when the platform recognized no speech.
    pub placeholder: &'static str,
    pub next: NextStep,
    pub triggers: Vec<Trigger>,
}

impl FlowStep {
    /// Interpolates `{name}` / `{ref}` from the request context. Only entry
    /// prompts carry these tokens.
    pub fn render_prompt(&self, ctx: &TurnContext) -> String {
        self.prompt
            .replace("{name}", ctx.name.as_deref().unwrap_or("there"))
            .replace("{ref}", ctx.referrer.as_deref().unwrap_or("a friend"))
    }
}

/// A named conversational script: ordered steps, an entry point, a closing
/// line, and the capture labels lifted into the lead's `responses` map.
#[derive(Debug, Clone)]
pub struct Flow {
    pub id: &'static str,
    pub entry: &'static str,
    pub closing: &'static str,
    pub response_fields: &'static [&'static str],
    steps: Vec<FlowStep>,
}

impl Flow {
    /// Looks up a step by name. Misconfiguration (a dangling pointer in the
    /// table) surfaces here as `UnknownStep`.
    pub fn step(&self, name: &str) -> Result<&FlowStep, EngineError> {
        self.steps
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| EngineError::UnknownStep {
                flow: self.id.to_string(),
                step: name.to_string(),
            })
    }

    pub fn steps(&self) -> &[FlowStep] {
        &self.steps
    }
}

/// All flows, built once at process start.
pub static FLOWS: Lazy<Vec<Flow>> = Lazy::new(|| vec![referral_flow(), intake_flow()]);

/// Looks up a flow by id.
pub fn flow(id: &str) -> Result<&'static Flow, EngineError> {
    FLOWS
        .iter()
        .find(|f| f.id == id)
        .ok_or_else(|| EngineError::UnknownFlow(id.to_string()))
}

/// Short referral-qualification script. Each step keeps its own placeholder
/// and silence line.
fn referral_flow() -> Flow {
    Flow {
        id: "referral",
        entry: "interest",
        closing: "Thanks for your time. A licensed rep will follow up. Have a great day!",
        response_fields: &["timeline"],
        steps: vec![
            FlowStep {
                name: "interest",
                capture_label: "interest",
                prompt: "Hi {name}, this is Isidro. You were referred by {ref}. \
                         Do you want to save money, make money, or eliminate debt?",
                fallback: "Sorry, I didn't hear anything. We'll call you back soon. Goodbye!",
                placeholder: "unknown",
                next: NextStep::Step("goals"),
                triggers: standard_triggers(),
            },
            FlowStep {
                name: "goals",
                capture_label: "goals",
                prompt: "What line of work are you in currently?",
                fallback: "Sorry, I didn't catch that. We'll follow up later.",
                placeholder: "unknown",
                next: NextStep::Step("retire"),
                triggers: standard_triggers(),
            },
            FlowStep {
                name: "retire",
                capture_label: "retire",
                prompt: "Is this a career or a stepping stone?",
                fallback: "Thank you. We'll be in touch.",
                placeholder: "not stated",
                next: NextStep::Step("income"),
                triggers: standard_triggers(),
            },
            FlowStep {
                name: "income",
                capture_label: "income",
                prompt: "What is your ideal income?",
                fallback: "Got it. Thank you for your time.",
                placeholder: "not provided",
                next: NextStep::Step("timeline"),
                triggers: standard_triggers(),
            },
            FlowStep {
                name: "timeline",
                capture_label: "timeline",
                prompt: "How long will it take to reach that income?",
                fallback: "We'll circle back soon. Goodbye!",
                placeholder: "not defined",
                next: NextStep::Finish,
                triggers: standard_triggers(),
            },
        ],
    }
}

/// Full intake script: six questions, no extra response fields beyond the
/// transcript itself.
fn intake_flow() -> Flow {
    Flow {
        id: "intake",
        entry: "name",
        closing: "Thanks for your time. A licensed rep will follow up. Have a great day!",
        response_fields: &[],
        steps: vec![
            FlowStep {
                name: "name",
                capture_label: "name",
                prompt: "Hi {name}, thanks for taking our call. May I have your full name?",
                fallback: "Sorry, I didn't hear anything. We'll try again another time. Goodbye!",
                placeholder: "not captured",
                next: NextStep::Step("location"),
                triggers: standard_triggers(),
            },
            FlowStep {
                name: "location",
                capture_label: "location",
                prompt: "Which city and state are you calling from?",
                fallback: "Sorry, I didn't catch that. We'll follow up by text.",
                placeholder: "not captured",
                next: NextStep::Step("job"),
                triggers: standard_triggers(),
            },
            FlowStep {
                name: "job",
                capture_label: "job",
                prompt: "What line of work are you in right now?",
                fallback: "Thank you. We'll be in touch.",
                placeholder: "not captured",
                next: NextStep::Step("experience"),
                triggers: standard_triggers(),
            },
            FlowStep {
                name: "experience",
                capture_label: "experience",
                prompt: "How many years of experience do you have in that field?",
                fallback: "Got it. Thank you for your time.",
                placeholder: "not captured",
                next: NextStep::Step("income"),
                triggers: standard_triggers(),
            },
            FlowStep {
                name: "income",
                capture_label: "income",
                prompt: "What income would make this move worth it for you?",
                fallback: "We'll circle back soon.",
                placeholder: "not captured",
                next: NextStep::Step("confirm"),
                triggers: standard_triggers(),
            },
            FlowStep {
                name: "confirm",
                capture_label: "confirm",
                prompt: "Great. Can I text you a link to book a time with a licensed rep?",
                fallback: "We'll send the details by text. Goodbye!",
                placeholder: "not captured",
                next: NextStep::Finish,
                triggers: standard_triggers(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_next_pointer_resolves() {
        for flow in FLOWS.iter() {
            assert!(flow.step(flow.entry).is_ok(), "entry missing in {}", flow.id);
            for step in flow.steps() {
                if let NextStep::Step(next) = step.next {
                    assert!(
                        flow.step(next).is_ok(),
                        "dangling next pointer {} -> {} in {}",
                        step.name,
                        next,
                        flow.id
                    );
                }
            }
        }
    }

    #[test]
    fn every_flow_terminates() {
        for flow in FLOWS.iter() {
            let terminal = flow
                .steps()
                .iter()
                .filter(|s| s.next == NextStep::Finish)
                .count();
            assert_eq!(terminal, 1, "flow {} needs exactly one terminal step", flow.id);
        }
    }

    #[test]
    fn step_names_are_unique_per_flow() {
        for flow in FLOWS.iter() {
            let mut names: Vec<_> = flow.steps().iter().map(|s| s.name).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), flow.steps().len(), "duplicate step in {}", flow.id);
        }
    }

    #[test]
    fn standard_triggers_keep_fixed_order() {
        let triggers = standard_triggers();
        let order: Vec<_> = triggers.iter().map(|t| t.action).collect();
        assert_eq!(
            order,
            vec![
                TriggerAction::PositiveAlert,
                TriggerAction::NegativeAlert,
                TriggerAction::ScheduleCallback,
                TriggerAction::OfferBooking,
            ]
        );
    }

    #[test]
    fn keyword_match_is_case_insensitive_substring() {
        let trigger = Trigger {
            when: TriggerWhen::ContainsAny(CALLBACK_KEYWORDS),
            action: TriggerAction::ScheduleCallback,
        };
        assert!(trigger.matches("Please CALL me back", 0.0));
        assert!(trigger.matches("maybe later this week", 0.0));
        assert!(!trigger.matches("no thanks", 0.0));
    }

    #[test]
    fn entry_prompt_interpolates_context() {
        let flow = flow("referral").unwrap();
        let entry = flow.step(flow.entry).unwrap();
        let ctx = TurnContext {
            name: Some("Maria".into()),
            referrer: Some("Luis".into()),
            phone: None,
        };
        let prompt = entry.render_prompt(&ctx);
        assert!(prompt.contains("Hi Maria"));
        assert!(prompt.contains("referred by Luis"));

        let blank = entry.render_prompt(&TurnContext::default());
        assert!(blank.contains("Hi there"));
        assert!(blank.contains("referred by a friend"));
    }

    #[test]
    fn unknown_step_is_reported() {
        let flow = flow("intake").unwrap();
        assert!(matches!(
            flow.step("retire"),
            Err(EngineError::UnknownStep { .. })
        ));
        assert!(matches!(
            super::flow("outbound"),
            Err(EngineError::UnknownFlow(_))
        ));
    }
}
