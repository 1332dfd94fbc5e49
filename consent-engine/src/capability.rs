//! Capability identifiers, queries and outcome classification.
//!
//! A [`CapabilityQuery`] is what the caller asks for. Once a negotiation
//! finishes, every distinct capability of the query carries a
//! [`CapabilityOutcome`] and the whole batch collapses into one
//! [`NegotiationResult`] whose verdict is the most severe outcome observed.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// A named authorization unit, e.g. `"location.coarse"` or `"camera"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Capability {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Capability {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// CapabilityQuery
// ---------------------------------------------------------------------------

/// Ordered list of capabilities a caller needs.
///
/// Duplicates are accepted. They are treated idempotently: only the first
/// occurrence takes part in status checks, requests and reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityQuery {
    capabilities: Vec<Capability>,
}

impl CapabilityQuery {
    pub fn new<I, C>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Capability>,
    {
        Self {
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    /// Query for exactly one capability.
    pub fn single(capability: impl Into<Capability>) -> Self {
        Self {
            capabilities: vec![capability.into()],
        }
    }

    /// The capabilities as declared, duplicates included.
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Distinct capabilities in first-occurrence order.
    pub fn distinct(&self) -> Vec<&Capability> {
        let mut seen: Vec<&Capability> = Vec::with_capacity(self.capabilities.len());
        for capability in &self.capabilities {
            if !seen.contains(&capability) {
                seen.push(capability);
            }
        }
        seen
    }
}

impl<C: Into<Capability>> FromIterator<C> for CapabilityQuery {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<Vec<Capability>> for CapabilityQuery {
    fn from(capabilities: Vec<Capability>) -> Self {
        Self { capabilities }
    }
}

impl From<&[&str]> for CapabilityQuery {
    fn from(capabilities: &[&str]) -> Self {
        Self::new(capabilities.iter().copied())
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Outcome for a single capability, and the kind of a session verdict.
///
/// Variants are declared in increasing severity so that `Ord` gives the
/// reduction rule directly: the verdict of a batch is its maximum outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityOutcome {
    Granted,
    Denied,
    /// The host will no longer prompt for this capability; the user has to
    /// grant it from the host's settings screen.
    PermanentlyDenied,
}

impl CapabilityOutcome {
    /// Display name for reports and logs.
    pub fn label(self) -> &'static str {
        match self {
            CapabilityOutcome::Granted => "granted",
            CapabilityOutcome::Denied => "denied",
            CapabilityOutcome::PermanentlyDenied => "permanently denied",
        }
    }

    pub fn is_granted(self) -> bool {
        self == CapabilityOutcome::Granted
    }
}

impl fmt::Display for CapabilityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one capability within a finished negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityReport {
    pub capability: Capability,
    pub outcome: CapabilityOutcome,
}

/// Session-level verdict plus the per-capability outcomes it was reduced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationResult {
    verdict: CapabilityOutcome,
    outcomes: Vec<CapabilityReport>,
}

impl NegotiationResult {
    /// Reduce per-capability outcomes to a verdict.
    ///
    /// Any `PermanentlyDenied` wins over any `Denied`, which wins over
    /// `Granted`. An empty batch is granted.
    pub fn from_outcomes(outcomes: Vec<CapabilityReport>) -> Self {
        let verdict = outcomes
            .iter()
            .map(|report| report.outcome)
            .max()
            .unwrap_or(CapabilityOutcome::Granted);
        Self { verdict, outcomes }
    }

    /// Every distinct capability of `query` granted.
    pub fn all_granted(query: &CapabilityQuery) -> Self {
        Self::from_outcomes(
            query
                .distinct()
                .into_iter()
                .map(|capability| CapabilityReport {
                    capability: capability.clone(),
                    outcome: CapabilityOutcome::Granted,
                })
                .collect(),
        )
    }

    pub fn verdict(&self) -> CapabilityOutcome {
        self.verdict
    }

    pub fn outcomes(&self) -> &[CapabilityReport] {
        &self.outcomes
    }

    /// Outcome recorded for `capability`, if it was part of the batch.
    pub fn outcome_of(&self, capability: &Capability) -> Option<CapabilityOutcome> {
        self.outcomes
            .iter()
            .find(|report| &report.capability == capability)
            .map(|report| report.outcome)
    }

    /// The capability that explains a non-granted verdict: the first one, in
    /// request order, whose outcome equals the verdict.
    pub fn reported(&self) -> Option<&Capability> {
        if self.verdict.is_granted() {
            return None;
        }
        self.outcomes
            .iter()
            .find(|report| report.outcome == self.verdict)
            .map(|report| &report.capability)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
