//! Platform role: issues mandates and binds individual uses.
//!
//! The platform holds the issuer key, custodies the agent's holder key, and
//! runs the first of the three enforcement layers. Every use it binds gets
//! the next sequential index for that mandate, assigned under the ledger
//! lock so concurrent checkouts cannot share an index.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::debug;

use crate::crypto::{KeyPair, KeySet};
use crate::enforce::Enforcer;
use crate::error::MandateError;
use crate::mandate::issue::{self, bind_key};
use crate::mandate::types::{Authorization, IntentRecord};
use crate::mandate::verify::mandate_id;

/// Issuance record the platform keeps for each intent mandate.
#[derive(Debug, Clone)]
pub struct IssuedIntent {
    /// Issuer token, before any key binding.
    pub token: String,
    pub mandate_id: String,
    pub authorization: Authorization,
    pub exp: i64,
}

/// The issuing party in a mandate flow.
#[derive(Debug)]
pub struct Platform {
    issuer_keys: KeyPair,
    agent_keys: KeyPair,
    enforcer: Enforcer,
    issued: Mutex<HashMap<String, IssuedIntent>>,
}

impl Platform {
    pub fn new(issuer_kid: impl Into<String>, agent_kid: impl Into<String>) -> Self {
        Self {
            issuer_keys: KeyPair::generate(issuer_kid),
            agent_keys: KeyPair::generate(agent_kid),
            enforcer: Enforcer::new("platform"),
            issued: Mutex::new(HashMap::new()),
        }
    }

    /// Published issuer keys, for relying parties to verify against.
    pub fn key_set(&self) -> KeySet {
        KeySet {
            keys: vec![self.issuer_keys.public_jwk()],
        }
    }

    /// Issue a cart mandate over a merchant-signed checkout session.
    pub fn issue_cart_mandate(
        &self,
        checkout: &Value,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, MandateError> {
        issue::issue_cart_mandate(checkout, &self.issuer_keys, &self.agent_keys, ttl, now)
            .map_err(MandateError::from)
    }

    /// Issue an intent mandate and retain its issuance record for later
    /// per-use binding.
    pub fn issue_intent_mandate(
        &self,
        authorization: &Authorization,
        intent: &IntentRecord,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedIntent, MandateError> {
        let token = issue::issue_intent_mandate(
            authorization,
            intent,
            &self.issuer_keys,
            &self.agent_keys,
            ttl,
            now,
        )?;
        let record = IssuedIntent {
            mandate_id: mandate_id(&token),
            token,
            authorization: authorization.clone(),
            exp: (now + ttl).timestamp(),
        };
        debug!(mandate_id = %record.mandate_id, "intent mandate issued");

        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        issued.insert(record.mandate_id.clone(), record.clone());
        Ok(record)
    }

    /// Bind the next use of an issued intent mandate to a checkout session.
    ///
    /// The platform's own enforcer decides the use before anything is
    /// signed. A bound presentation therefore already consumed one use and
    /// part of the budget at this layer.
    pub fn bind_use(
        &self,
        mandate_id: &str,
        session_id: &str,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<String, MandateError> {
        let record = {
            let issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
            issued
                .get(mandate_id)
                .cloned()
                .ok_or_else(|| MandateError::UnknownMandate {
                    mandate_id: mandate_id.to_string(),
                })?
        };

        let (use_index, _) = self.enforcer.authorize_next_use(
            &record.authorization,
            record.exp,
            mandate_id,
            amount,
            None,
            now,
        )?;

        bind_key(
            &record.token,
            &self.agent_keys,
            session_id,
            Some(amount),
            Some(use_index),
            now,
        )
        .map_err(MandateError::from)
    }

    /// The platform-side enforcement point, for state and usage queries.
    pub fn enforcer(&self) -> &Enforcer {
        &self.enforcer
    }
}
