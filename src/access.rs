//! Field-level access policy for resolved addresses.
//!
//! Default deny: a field is disclosed to a requester only if some rule
//! matching that requester lists it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Fields of an address record a carrier needs to complete a delivery.
pub const DELIVERY_FIELDS: [&str; 7] = [
    "country",
    "prefecture",
    "city",
    "street",
    "building",
    "unit",
    "postalCode",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    /// An exact identity, `prefix:*` for every identity starting with
    /// `prefix:`, or `*` for everyone.
    pub accessor: String,
    pub fields: BTreeSet<String>,
}

impl AccessRule {
    pub fn matches(&self, requester: &str) -> bool {
        match self.accessor.strip_suffix('*') {
            Some(prefix) => requester.starts_with(prefix),
            None => self.accessor == requester,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub rules: Vec<AccessRule>,
}

impl AccessPolicy {
    /// An empty policy, which denies everything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow<I, S>(mut self, accessor: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.push(AccessRule {
            accessor: accessor.to_string(),
            fields: fields.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Carriers (`carrier:*`) may see the delivery fields.
    pub fn carrier_default() -> Self {
        Self::new().allow("carrier:*", DELIVERY_FIELDS)
    }
}

/// Outcome of a policy evaluation. Every requested field lands in exactly
/// one of the two sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: BTreeSet<String>,
    pub denied: BTreeSet<String>,
}

pub fn evaluate_access_policy<S: AsRef<str>>(
    policy: &AccessPolicy,
    requested_fields: &[S],
    requester: &str,
) -> AccessDecision {
    let permitted: BTreeSet<&str> = policy
        .rules
        .iter()
        .filter(|rule| rule.matches(requester))
        .flat_map(|rule| rule.fields.iter().map(String::as_str))
        .collect();

    let mut decision = AccessDecision::default();
    for field in requested_fields {
        let field: &str = field.as_ref();
        if permitted.contains(field) {
            decision.allowed.insert(field.to_string());
        } else {
            decision.denied.insert(field.to_string());
        }
    }
    tracing::debug!(
        requester,
        allowed = decision.allowed.len(),
        denied = decision.denied.len(),
        "access policy evaluated"
    );
    decision
}
