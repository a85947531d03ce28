//! PhoneBot Gateway — webhook boundary for the call-flow engine.
//! Receives transcribed turns from the telephony platform, answers with
//! TwiML, and serves the persisted lead feed for the dashboard.

mod twiml;

use axum::{
    body::Body,
    extract::{ConnectInfo, Form, Query, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use phonebot_core::{
    AlertGateway, BotConfig, DialogueEngine, EngineError, Lead, LeadLedger, LexiconScorer,
    NullGateway, SessionError, TurnContext, TurnResult, TwilioGateway,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Spoken when a turn cannot be processed (flow misconfiguration). The call
/// must not hang on an engine error.
const GENERIC_GOODBYE: &str =
    "Sorry, something went wrong on our end. We'll follow up soon. Goodbye!";

struct AppState {
    engine: DialogueEngine,
    ledger: Arc<LeadLedger>,
    config: BotConfig,
}

/// Query parameters on the entry routes: caller identity passed by the
/// outbound dialer.
#[derive(Deserialize)]
struct EntryQuery {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "ref")]
    referrer: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

/// Query parameters on the turn route: which flow step this answer belongs
/// to, plus the identity carried along from the entry.
#[derive(Deserialize)]
struct TurnQuery {
    flow: String,
    step: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

/// Form body the telephony platform posts on every webhook. An absent
/// `SpeechResult` means no speech was recognized.
#[derive(Deserialize)]
struct TwilioForm {
    #[serde(default, rename = "CallSid")]
    call_sid: Option<String>,
    #[serde(default, rename = "SpeechResult")]
    speech_result: Option<String>,
}

impl TwilioForm {
    /// Calls without a platform id share one un-keyed session.
    fn call_id(&self) -> String {
        self.call_sid
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unkeyed".to_string())
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BotConfig::from_env();
    let ledger = Arc::new(
        LeadLedger::open(&config.ledger_path).expect("open lead ledger"),
    );

    let alerts: Arc<dyn AlertGateway> =
        if config.account_sid.is_empty() || config.auth_token.is_empty() {
            tracing::warn!("telephony credentials missing; outbound alerts disabled");
            Arc::new(NullGateway)
        } else {
            Arc::new(TwilioGateway::new(&config))
        };

    let engine = DialogueEngine::new(
        Arc::new(LexiconScorer),
        alerts,
        Arc::clone(&ledger),
        config.clone(),
    );

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState {
        engine,
        ledger,
        config,
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/voice", post(referral_entry))
        .route("/intake", post(intake_entry))
        .route("/turn", post(turn_handler))
        .route("/transcripts", get(transcripts_handler))
        .with_state(state)
        .layer(axum::middleware::from_fn(log_call_traffic));

    tracing::info!(%bind_addr, "PhoneBot gateway listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}

async fn log_call_traffic(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    tracing::info!(%addr, method = %request.method(), path = %request.uri().path(), "webhook");
    next.run(request).await
}

async fn health() -> &'static str {
    "OK"
}

/// POST /voice — referral-qualification flow entry.
async fn referral_entry(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EntryQuery>,
    Form(form): Form<TwilioForm>,
) -> Response {
    start_flow(&state, "referral", query, form).await
}

/// POST /intake — full-intake flow entry.
async fn intake_entry(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EntryQuery>,
    Form(form): Form<TwilioForm>,
) -> Response {
    start_flow(&state, "intake", query, form).await
}

async fn start_flow(
    state: &AppState,
    flow_id: &str,
    query: EntryQuery,
    form: TwilioForm,
) -> Response {
    let call_id = form.call_id();
    let ctx = TurnContext {
        name: query.name,
        referrer: query.referrer,
        phone: query.phone,
    };
    match state.engine.start_call(&call_id, flow_id, &ctx).await {
        Ok(result) => render(state, flow_id, &ctx, result),
        Err(e) => {
            tracing::error!(call_id, flow_id, error = %e, "call start failed");
            xml(twiml::hangup(GENERIC_GOODBYE))
        }
    }
}

/// POST /turn — one answer from the caller, one prompt (or termination) back.
async fn turn_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TurnQuery>,
    Form(form): Form<TwilioForm>,
) -> Response {
    let call_id = form.call_id();
    let ctx = TurnContext {
        name: query.name.clone(),
        referrer: None,
        phone: query.phone.clone(),
    };
    let turn = state
        .engine
        .handle_turn(
            &call_id,
            &query.flow,
            &query.step,
            form.speech_result.as_deref(),
            &ctx,
        )
        .await;
    match turn {
        Ok(result) => render(&state, &query.flow, &ctx, result),
        Err(EngineError::Session(e @ SessionError::Missing(_))) => {
            // Losing transcript continuity is worse than failing the webhook;
            // the platform retries failed deliveries.
            tracing::error!(call_id, error = %e, "no session for turn");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!(call_id, flow = %query.flow, step = %query.step, error = %e, "turn failed");
            xml(twiml::hangup(GENERIC_GOODBYE))
        }
    }
}

/// GET /transcripts — read-only lead feed for the dashboard.
async fn transcripts_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Lead>>, (StatusCode, String)> {
    state
        .ledger
        .list_leads()
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

fn render(state: &AppState, flow_id: &str, ctx: &TurnContext, result: TurnResult) -> Response {
    match result {
        TurnResult::Gather {
            prompt,
            fallback,
            next_step,
        } => xml(twiml::gather(
            &action_url(state, flow_id, &next_step, ctx),
            &prompt,
            &fallback,
        )),
        TurnResult::Finish { closing } => xml(twiml::hangup(&closing)),
    }
}

/// Builds the webhook action URL for the next gather, carrying the caller
/// identity forward the way the dialer supplied it.
fn action_url(state: &AppState, flow_id: &str, step: &str, ctx: &TurnContext) -> String {
    let mut url = format!(
        "{}/turn?flow={}&step={}",
        state.config.public_base_url, flow_id, step
    );
    if let Some(name) = ctx.name.as_deref().filter(|s| !s.is_empty()) {
        url.push_str(&format!("&name={}", urlencoding::encode(name)));
    }
    if let Some(phone) = ctx.phone.as_deref().filter(|s| !s.is_empty()) {
        url.push_str(&format!("&phone={}", urlencoding::encode(phone)));
    }
    url
}

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}
