//! Lead ledger: sled-backed, append-only store of finalized leads.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::LedgerError;
use crate::session::TranscriptEntry;

/// Source tag stamped on every persisted lead.
pub const LEAD_SOURCE: &str = "PhoneBot";

/// A finalized conversation, immutable once written: flow-specific response
/// fields plus the full transcript copy taken at finalization time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub responses: BTreeMap<String, String>,
    pub transcript: Vec<TranscriptEntry>,
}

/// Durable lead store. Key: `lead_{unix_millis}_{seq}`; value: JSON lead.
pub struct LeadLedger {
    db: sled::Db,
}

impl LeadLedger {
    /// Opens or creates the ledger at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Appends one lead. Returns the ledger key for reference.
    ///
    /// Millis keep key order chronological; the sled-minted id keeps the key
    /// unique when two calls finalize in the same millisecond, so a lead can
    /// never overwrite another.
    pub fn log_lead(&self, lead: &Lead) -> Result<String, LedgerError> {
        let id = self.db.generate_id()?;
        let key = format!("lead_{}_{:020}", lead.timestamp.timestamp_millis(), id);
        let payload = serde_json::to_vec(lead)?;
        self.db.insert(key.as_bytes(), payload)?;
        Ok(key)
    }

    /// All persisted leads, newest first (for the dashboard feed).
    pub fn list_leads(&self) -> Result<Vec<Lead>, LedgerError> {
        let mut pairs: Vec<(Vec<u8>, Vec<u8>)> = self
            .db
            .iter()
            .filter_map(|r| r.ok())
            .map(|(k, v)| (k.to_vec(), v.to_vec()))
            .collect();
        pairs.sort_by(|a, b| b.0.cmp(&a.0));
        let mut leads = Vec::with_capacity(pairs.len());
        for (_, value) in pairs {
            leads.push(serde_json::from_slice(&value)?);
        }
        Ok(leads)
    }

    /// Most recent leads only.
    pub fn recent(&self, limit: usize) -> Result<Vec<Lead>, LedgerError> {
        let mut leads = self.list_leads()?;
        leads.truncate(limit);
        Ok(leads)
    }

    pub fn lead_count(&self) -> usize {
        self.db.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lead_at(millis: i64, field: &str) -> Lead {
        Lead {
            source: LEAD_SOURCE.to_string(),
            timestamp: Utc.timestamp_millis_opt(millis).unwrap(),
            responses: BTreeMap::from([("timeline".to_string(), field.to_string())]),
            transcript: Vec::new(),
        }
    }

    #[test]
    fn leads_round_trip_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = LeadLedger::open(dir.path()).unwrap();
        ledger.log_lead(&lead_at(1_700_000_000_000, "two years")).unwrap();
        ledger.log_lead(&lead_at(1_700_000_100_000, "six months")).unwrap();

        let leads = ledger.list_leads().unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].responses["timeline"], "six months");
        assert_eq!(leads[1].responses["timeline"], "two years");
        assert_eq!(leads[0].source, "PhoneBot");
    }

    #[test]
    fn same_millisecond_leads_both_persist() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = LeadLedger::open(dir.path()).unwrap();
        ledger.log_lead(&lead_at(1_700_000_000_000, "two years")).unwrap();
        ledger.log_lead(&lead_at(1_700_000_000_000, "six months")).unwrap();

        assert_eq!(ledger.lead_count(), 2);
        let leads = ledger.list_leads().unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].responses["timeline"], "six months");
        assert_eq!(leads[1].responses["timeline"], "two years");
    }

    #[test]
    fn recent_caps_the_listing() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = LeadLedger::open(dir.path()).unwrap();
        for i in 0..5 {
            ledger.log_lead(&lead_at(1_700_000_000_000 + i, "x")).unwrap();
        }
        assert_eq!(ledger.recent(3).unwrap().len(), 3);
        assert_eq!(ledger.lead_count(), 5);
    }
}
