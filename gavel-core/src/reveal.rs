//! Audited disclosure of redacted fields.
//!
//! Raw response bodies and raw judge rationales are never shown by default.
//! A reveal is an explicit per-exchange, per-field action that must be logged
//! with the backend before the field is displayed, and is forgotten when the
//! selected run changes.
//!
//! The gate itself is synchronous. [`RevealGate::request`] performs the local
//! checks and, when they pass, marks the pair pending and returns a
//! [`RevealTicket`] describing the audit call the caller must issue; the
//! caller reports back through [`RevealGate::complete`] or
//! [`RevealGate::fail`]. This keeps the disclosure ledger testable without a
//! network in the loop.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::exchange::Exchange;
use crate::types::RevealRequest;

/// Field name for the raw response body.
pub const FIELD_RESPONSE_RAW: &str = "raw_text";
/// Field name for the raw judge rationale.
pub const FIELD_RATIONALE_RAW: &str = "rationale_raw";

type PairKey = (String, String);

/// Describes the audit call the caller must issue for a granted request.
#[derive(Debug, Clone)]
pub struct RevealTicket {
    pub exchange_id: String,
    pub field: String,
    /// Body for `POST /reveal`
    pub request: RevealRequest,
}

/// Per-session disclosure ledger.
#[derive(Debug, Default)]
pub struct RevealGate {
    /// Actor recorded in the audit trail
    actor: String,
    /// False when no audit-recording backend is configured
    audit_available: bool,
    disclosed: HashSet<PairKey>,
    pending: HashSet<PairKey>,
    errors: HashMap<PairKey, String>,
}

impl RevealGate {
    pub fn new(actor: impl Into<String>, audit_available: bool) -> Self {
        Self {
            actor: actor.into(),
            audit_available,
            ..Default::default()
        }
    }

    /// Forget every disclosure. Called whenever the selected run changes.
    pub fn reset(&mut self) {
        self.disclosed.clear();
        self.pending.clear();
        self.errors.clear();
    }

    pub fn set_audit_available(&mut self, available: bool) {
        self.audit_available = available;
    }

    pub fn is_disclosed(&self, exchange_id: &str, field: &str) -> bool {
        self.disclosed
            .contains(&(exchange_id.to_string(), field.to_string()))
    }

    pub fn is_pending(&self, exchange_id: &str, field: &str) -> bool {
        self.pending
            .contains(&(exchange_id.to_string(), field.to_string()))
    }

    pub fn last_error(&self, exchange_id: &str, field: &str) -> Option<&str> {
        self.errors
            .get(&(exchange_id.to_string(), field.to_string()))
            .map(String::as_str)
    }

    /// Validate and stage a reveal.
    ///
    /// Fails locally, with no audit call issued, when no audit backend is
    /// configured, the run is not live (demo and closed historical runs stay
    /// redacted), or the raw value has not arrived yet.
    pub fn request(
        &mut self,
        exchange: &Exchange,
        field: &str,
        reason: Option<String>,
    ) -> Result<RevealTicket> {
        let key = (exchange.id.clone(), field.to_string());

        if !self.audit_available {
            let msg = "reveal unavailable: no audit endpoint configured".to_string();
            self.errors.insert(key, msg.clone());
            return Err(Error::Reveal(msg));
        }
        if !exchange.live {
            let msg = "reveal disabled for demo and historical runs".to_string();
            self.errors.insert(key, msg.clone());
            return Err(Error::Reveal(msg));
        }
        if !self.has_raw_value(exchange, field) {
            let msg = format!("field {} not ready to reveal", field);
            self.errors.insert(key, msg.clone());
            return Err(Error::Reveal(msg));
        }

        self.errors.remove(&key);
        self.pending.insert(key);

        Ok(RevealTicket {
            exchange_id: exchange.id.clone(),
            field: field.to_string(),
            request: RevealRequest {
                run_id: exchange.run.run_id.clone(),
                exchange_id: exchange.id.clone(),
                field: field.to_string(),
                actor: self.actor.clone(),
                reason,
            },
        })
    }

    /// The audit call succeeded: flip the disclosed flag.
    pub fn complete(&mut self, exchange_id: &str, field: &str) {
        let key = (exchange_id.to_string(), field.to_string());
        self.pending.remove(&key);
        self.errors.remove(&key);
        self.disclosed.insert(key);
    }

    /// The audit call failed: the field stays redacted, the error is
    /// retryable by re-issuing the request.
    pub fn fail(&mut self, exchange_id: &str, field: &str, message: impl Into<String>) {
        let key = (exchange_id.to_string(), field.to_string());
        self.pending.remove(&key);
        self.errors.insert(key, message.into());
    }

    fn has_raw_value(&self, exchange: &Exchange, field: &str) -> bool {
        match field {
            FIELD_RESPONSE_RAW => exchange
                .response
                .as_ref()
                .is_some_and(|r| r.raw_text.is_some()),
            FIELD_RATIONALE_RAW => exchange.verdicts.iter().any(|v| v.rationale_raw.is_some()),
            _ => false,
        }
    }
}
