//! Bot configuration loaded from `.env`.
//!
//! Telephony credentials, the operator alert number, the booking link, and the
//! lead ledger path. Change behavior without code edits.

const DEFAULT_BOOKING_LINK: &str =
    "https://calendly.com/isidro-arismendez/grow-your-business";
const DEFAULT_LEDGER_PATH: &str = "./data/phonebot_leads";
const DEFAULT_BIND: &str = "127.0.0.1:4000";

/// PhoneBot configuration loaded from environment.
///
/// | Env | Default | Description |
/// |-----|---------|--------------|
/// | PHONEBOT_BIND | 127.0.0.1:4000 | Gateway listen address. |
/// | PHONEBOT_PUBLIC_URL | http://{bind} | Base URL used in webhook action links. |
/// | TWILIO_ACCOUNT_SID / TWILIO_AUTH_TOKEN | (empty) | Telephony credentials; empty disables outbound alerts. |
/// | TWILIO_FROM_NUMBER | (empty) | Source number for alerts and the closing SMS. |
/// | PHONEBOT_ALERT_PHONE | (empty) | Operator number for signal alerts and the fallback SMS target. |
/// | PHONEBOT_BOOKING_LINK | Calendly URL | Fixed external booking link sent in the closing SMS. |
/// | PHONEBOT_LEDGER_PATH | ./data/phonebot_leads | Sled path for the lead ledger. |
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bind_addr: String,
    pub public_base_url: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    /// Operator number: receives signal alerts, and the closing SMS when the
    /// caller never supplied a phone number.
    pub alert_phone: String,
    pub booking_link: String,
    pub ledger_path: String,
}

impl BotConfig {
    /// Load from environment. Unset => defaults (see struct docs).
    pub fn from_env() -> Self {
        let bind_addr = env_string("PHONEBOT_BIND", DEFAULT_BIND);
        let public_base_url =
            env_string("PHONEBOT_PUBLIC_URL", &format!("http://{}", bind_addr));
        Self {
            bind_addr,
            public_base_url,
            account_sid: env_string("TWILIO_ACCOUNT_SID", ""),
            auth_token: env_string("TWILIO_AUTH_TOKEN", ""),
            from_number: env_string("TWILIO_FROM_NUMBER", ""),
            alert_phone: env_string("PHONEBOT_ALERT_PHONE", ""),
            booking_link: env_string("PHONEBOT_BOOKING_LINK", DEFAULT_BOOKING_LINK),
            ledger_path: env_string("PHONEBOT_LEDGER_PATH", DEFAULT_LEDGER_PATH),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            public_base_url: format!("http://{}", DEFAULT_BIND),
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            alert_phone: String::new(),
            booking_link: DEFAULT_BOOKING_LINK.to_string(),
            ledger_path: DEFAULT_LEDGER_PATH.to_string(),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_the_fixed_booking_link() {
        let config = BotConfig::default();
        assert!(config.booking_link.starts_with("https://calendly.com/"));
        assert_eq!(config.bind_addr, "127.0.0.1:4000");
    }
}
