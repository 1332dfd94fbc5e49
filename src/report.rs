//! Outcome report for one replayed scenario.

use std::fmt::Write as _;

use consent_config::Scenario;
use consent_engine::{Capability, CapabilityOutcome, CapabilityReport, NegotiationResult};
use serde::Serialize;

/// What happened while a scenario was replayed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    /// Handler that fired, if any.
    pub handler: Option<String>,
    pub verdict: Option<CapabilityOutcome>,
    /// Capability explaining a non-granted verdict.
    pub reported: Option<Capability>,
    pub outcomes: Vec<CapabilityReport>,
    /// `run` dispatched before returning.
    pub completed_synchronously: bool,
    pub prompt_shown: bool,
    /// Requests the gateway received.
    pub requests: usize,
    /// Results and prompt decisions the session dropped as stale.
    pub stale_results: usize,
    pub cancelled: bool,
    pub timed_out: bool,
    pub settings_opened: bool,
    pub expected_handler: Option<String>,
}

impl ScenarioReport {
    pub fn new(scenario: &Scenario) -> Self {
        Self {
            scenario: scenario.identity.clone(),
            expected_handler: scenario.expected_handler.clone(),
            ..Self::default()
        }
    }

    /// Record the dispatched handler and the result it received.
    pub fn record_dispatch(&mut self, handler: &str, result: &NegotiationResult) {
        self.handler = Some(handler.to_string());
        self.verdict = Some(result.verdict());
        self.reported = result.reported().cloned();
        self.outcomes = result.outcomes().to_vec();
    }

    /// Name of the handler that fired, `none` when nothing did.
    pub fn fired_handler(&self) -> &str {
        self.handler.as_deref().unwrap_or("none")
    }

    /// Whether the fired handler matches the scenario's expectation.
    /// `None` when the scenario states no expectation.
    pub fn matches_expectation(&self) -> Option<bool> {
        self.expected_handler
            .as_deref()
            .map(|expected| expected == self.fired_handler())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable multi-line summary.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Scenario:  {}", self.scenario);
        let _ = writeln!(out, "Handler:   {}", self.fired_handler());
        if let Some(verdict) = self.verdict {
            let _ = writeln!(out, "Verdict:   {verdict}");
        }
        if let Some(capability) = &self.reported {
            let _ = writeln!(out, "Reported:  {capability}");
        }
        for report in &self.outcomes {
            let _ = writeln!(out, "  {:<24} {}", report.capability, report.outcome);
        }
        let _ = writeln!(
            out,
            "Requests:  {} (stale drops: {})",
            self.requests, self.stale_results
        );

        let mut flags = Vec::new();
        if self.completed_synchronously {
            flags.push("synchronous");
        }
        if self.prompt_shown {
            flags.push("prompt shown");
        }
        if self.cancelled {
            flags.push("cancelled");
        }
        if self.timed_out {
            flags.push("timed out");
        }
        if self.settings_opened {
            flags.push("settings opened");
        }
        if !flags.is_empty() {
            let _ = writeln!(out, "Notes:     {}", flags.join(", "));
        }

        match self.matches_expectation() {
            Some(true) => out.push_str("Result:    PASS\n"),
            Some(false) => {
                let _ = writeln!(
                    out,
                    "Result:    FAIL (expected {})",
                    self.expected_handler.as_deref().unwrap_or("none")
                );
            }
            None => {}
        }
        out
    }
}
