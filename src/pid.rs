//! Hierarchical Place Identifiers.
//!
//! A PID is `CC-seg-seg-...`: a two-letter upper-case country code followed
//! by administrative, building and unit segments, coarsest first.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CoreResult, ProofCoreError};

pub const SEGMENT_SEPARATOR: char = '-';

static COUNTRY: OnceLock<Regex> = OnceLock::new();
static SEGMENT: OnceLock<Regex> = OnceLock::new();

fn country_re() -> &'static Regex {
    COUNTRY.get_or_init(|| Regex::new(r"^[A-Z]{2}$").expect("static regex"))
}

fn segment_re() -> &'static Regex {
    SEGMENT.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+$").expect("static regex"))
}

/// A parsed, validated Place ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaceId {
    raw: String,
    segments: Vec<String>,
}

impl PlaceId {
    /// Parse and validate a PID string.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ProofCoreError::invalid("PID is empty"));
        }

        let segments: Vec<String> = raw.split(SEGMENT_SEPARATOR).map(str::to_string).collect();
        if !country_re().is_match(&segments[0]) {
            return Err(ProofCoreError::invalid(format!(
                "PID must start with a two-letter country code, got {:?}",
                segments[0]
            )));
        }
        if let Some(pos) = segments.iter().position(|s| !segment_re().is_match(s)) {
            return Err(ProofCoreError::invalid(format!(
                "PID segment {pos} is empty or contains invalid characters"
            )));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn country_code(&self) -> &str {
        &self.segments[0]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of hierarchical segments, country included.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// True when `self` is a strict ancestor of `other` in the hierarchy.
    pub fn is_ancestor_of(&self, other: &PlaceId) -> bool {
        self.depth() < other.depth() && other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for PlaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
