//! Outbound alert and SMS delivery.
//!
//! Fire-and-forget from the engine's point of view: delivery failures are
//! logged and never fail or delay the spoken response.

use async_trait::async_trait;

use crate::config::BotConfig;
use crate::error::AlertError;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Sends one free-text message to one destination number.
#[async_trait]
pub trait AlertGateway: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), AlertError>;
}

/// Twilio Messages API gateway: form-encoded POST with basic auth.
pub struct TwilioGateway {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioGateway {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
        }
    }
}

#[async_trait]
impl AlertGateway for TwilioGateway {
    async fn send(&self, to: &str, body: &str) -> Result<(), AlertError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            TWILIO_API_BASE, self.account_sid
        );
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AlertError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Drops every message. Used when telephony credentials are not configured,
/// so local runs still speak their prompts.
pub struct NullGateway;

#[async_trait]
impl AlertGateway for NullGateway {
    async fn send(&self, to: &str, body: &str) -> Result<(), AlertError> {
        tracing::debug!(to, body, "alert gateway disabled; message dropped");
        Ok(())
    }
}
