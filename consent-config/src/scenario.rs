//! Scenario scripts replayed by the consent host.
//!
//! A scenario describes how a simulated host behaves during one negotiation:
//! which capabilities are already granted, what the rationale query answers,
//! how the prompt is answered and what the asynchronous result reports.
//!
//! Scenarios come from three places, later sources overriding earlier ones by
//! `identity`:
//!
//! 1. Embedded defaults compiled into the binary
//! 2. `scenarios/` next to the executable
//! 3. `~/.config/consent/scenarios/*.toml`

use std::path::{Path, PathBuf};

use consent_engine::PromptSpec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Handler names a scenario may expect to fire.
pub const HANDLER_NAMES: &[&str] = &["granted", "denied", "permanently_denied", "none"];

/// How the simulated user answers the pre-request prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptAnswer {
    #[default]
    Accept,
    Decline,
    /// Leave the prompt open; the relay timeout eventually cancels.
    Ignore,
}

/// What the host relays back after the request is issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseScript {
    /// Capabilities reported as granted. Every other requested capability is
    /// reported as refused.
    pub granted: Vec<String>,
    /// Capabilities left out of the result entirely (interrupted request).
    pub omit: Vec<String>,
    /// Delay before the result is relayed.
    pub delay_ms: u64,
    /// Cancel the session after the request is issued, before relaying.
    pub cancel_before_result: bool,
    /// Relay a result carrying a foreign token before the real one.
    pub inject_stale_result: bool,
    /// Never relay a result; the relay timeout cancels the session.
    pub never_respond: bool,
}

/// Scenario configuration loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub identity: String,
    #[serde(default)]
    pub description: String,
    pub capabilities: Vec<String>,
    /// Capabilities the host already holds before `run`.
    #[serde(default)]
    pub granted: Vec<String>,
    /// Capabilities for which the host can still show a rationale.
    #[serde(default)]
    pub rationale: Vec<String>,
    /// Capabilities the host remembers as permanently refused.
    #[serde(default)]
    pub known_permanently_denied: Vec<String>,
    /// Whether the platform requires runtime authorization at all.
    #[serde(default = "default_true")]
    pub platform_gate: bool,
    #[serde(default)]
    pub prompt: Option<PromptSpec>,
    /// Show the configured default prompt when no `[prompt]` table is given.
    #[serde(default)]
    pub use_default_prompt: bool,
    #[serde(default)]
    pub prompt_answer: PromptAnswer,
    #[serde(default)]
    pub response: ResponseScript,
    #[serde(default = "default_true")]
    pub register_permanent_handler: bool,
    /// Handler this scenario is expected to fire (`none` for no dispatch).
    #[serde(default)]
    pub expected_handler: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl Scenario {
    /// Parse a scenario from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Returns whether this scenario is active. Defaults to `true` if not specified.
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(true)
    }

    /// The prompt to show, if any. An explicit `[prompt]` table wins over
    /// `use_default_prompt`.
    pub fn prompt_spec(&self, default_prompt: &PromptSpec) -> Option<PromptSpec> {
        match &self.prompt {
            Some(spec) => Some(spec.clone()),
            None if self.use_default_prompt => Some(default_prompt.clone()),
            None => None,
        }
    }

    /// Check that every capability named in a host list is actually part of
    /// the query.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.trim().is_empty() {
            return Err(ConfigError::Validation(
                "scenario identity must not be empty".to_string(),
            ));
        }

        let lists: [(&str, &[String]); 5] = [
            ("granted", &self.granted),
            ("rationale", &self.rationale),
            ("known_permanently_denied", &self.known_permanently_denied),
            ("response.granted", &self.response.granted),
            ("response.omit", &self.response.omit),
        ];
        for (field, names) in lists {
            if let Some(unknown) = names.iter().find(|n| !self.capabilities.contains(n)) {
                return Err(ConfigError::Validation(format!(
                    "scenario '{}': {field} names '{unknown}' which is not in capabilities",
                    self.identity
                )));
            }
        }

        if let Some(expected) = &self.expected_handler
            && !HANDLER_NAMES.contains(&expected.as_str())
        {
            return Err(ConfigError::Validation(format!(
                "scenario '{}': unknown expected_handler '{expected}' (expected one of {})",
                self.identity,
                HANDLER_NAMES.join(", ")
            )));
        }

        Ok(())
    }
}

/// Embedded default scenarios.
const EMBEDDED_SCENARIOS: &[&str] = &[
    r#"
identity = "already-granted"
description = "Every capability is already held; granted fires without a request"
capabilities = ["location.coarse"]
granted = ["location.coarse"]
expected_handler = "granted"
"#,
    r#"
identity = "granted-by-host"
description = "Missing capability is requested and the host grants it"
capabilities = ["camera"]
expected_handler = "granted"

[response]
granted = ["camera"]
"#,
    r#"
identity = "denied-with-rationale"
description = "Host refuses but can still explain; denied fires"
capabilities = ["camera"]
rationale = ["camera"]
expected_handler = "denied"
"#,
    r#"
identity = "permanently-denied"
description = "Host refuses and can no longer explain; permanently_denied fires"
capabilities = ["camera"]
expected_handler = "permanently_denied"
"#,
    r#"
identity = "permanent-fallback"
description = "Permanent refusal without a permanent handler falls back to denied"
capabilities = ["camera"]
register_permanent_handler = false
expected_handler = "denied"
"#,
    r#"
identity = "cancelled-before-result"
description = "Session is cancelled while the request is in flight; nothing fires"
capabilities = ["microphone"]
expected_handler = "none"

[response]
granted = ["microphone"]
cancel_before_result = true
"#,
    r#"
identity = "prompt-declined"
description = "User declines the justification prompt; denied fires without a request"
capabilities = ["contacts.read"]
prompt_answer = "decline"
expected_handler = "denied"

[prompt]
title = "Contacts"
message = "Contacts are used to suggest people to share with."
accept_label = "Continue"
decline_label = "Not now"
"#,
    r#"
identity = "implicit-platform"
description = "Platform grants at install time; granted fires without a request"
capabilities = ["storage.read", "storage.write"]
platform_gate = false
expected_handler = "granted"
"#,
    r#"
identity = "mixed-batch"
description = "One capability granted, one refused with rationale, one left out"
capabilities = ["location.fine", "location.background", "camera"]
rationale = ["location.background"]
expected_handler = "permanently_denied"

[response]
granted = ["location.fine"]
omit = ["camera"]
"#,
    r#"
identity = "stale-result-ignored"
description = "A result with a foreign token is dropped before the real result arrives"
capabilities = ["bluetooth.scan"]
expected_handler = "granted"

[response]
granted = ["bluetooth.scan"]
inject_stale_result = true
"#,
    r#"
identity = "slow-host"
description = "Host answers after the relay deadline; the session is cancelled first"
capabilities = ["camera"]
expected_handler = "none"

[response]
granted = ["camera"]
delay_ms = 6000
"#,
    r#"
identity = "host-never-answers"
description = "Host never relays a result; the relay times out and cancels"
capabilities = ["notifications"]
expected_handler = "none"

[response]
never_respond = true
"#,
];

/// Parse the embedded default scenarios.
pub fn embedded_scenarios() -> Vec<Scenario> {
    EMBEDDED_SCENARIOS
        .iter()
        .filter_map(|s| match Scenario::from_toml(s) {
            Ok(scenario) => Some(scenario),
            Err(e) => {
                log::error!("Failed to parse embedded scenario: {e}");
                None
            }
        })
        .collect()
}

/// Discover scenarios from embedded defaults, the bundled directory next to
/// the executable, and the user's config directory.
///
/// Later sources override earlier ones by identity. Inactive and invalid
/// scenarios are dropped.
pub fn discover_scenarios(user_config_dir: &Path) -> Vec<Scenario> {
    let mut scenarios = embedded_scenarios();

    let bundled_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.join(crate::config::SCENARIOS_DIR_NAME)));
    if let Some(ref dir) = bundled_dir {
        load_scenarios_from_dir(dir, &mut scenarios);
    }

    let user_dir = user_config_dir.join(crate::config::SCENARIOS_DIR_NAME);
    load_scenarios_from_dir(&user_dir, &mut scenarios);

    scenarios.retain(|s| s.is_active());
    scenarios.retain(|s| match s.validate() {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Skipping scenario: {e}");
            false
        }
    });
    scenarios.sort_by(|a, b| a.identity.cmp(&b.identity));
    scenarios
}

/// Load all `.toml` scenario files from a directory.
/// A scenario with an identity already in the list replaces the existing one.
pub fn load_scenarios_from_dir(dir: &Path, scenarios: &mut Vec<Scenario>) {
    if !dir.exists() {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            match load_scenario_file(&path) {
                Ok(scenario) => {
                    log::debug!(
                        "Loaded scenario {} from {}",
                        scenario.identity,
                        path.display()
                    );
                    scenarios.retain(|s| s.identity != scenario.identity);
                    scenarios.push(scenario);
                }
                Err(e) => log::error!("Failed to load scenario {}: {e}", path.display()),
            }
        }
    }
}

/// Read and parse a single scenario file.
pub fn load_scenario_file(path: &Path) -> Result<Scenario, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Scenario::from_toml(&content).map_err(|source| ConfigError::Scenario {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve a CLI scenario argument: an existing `.toml` path is loaded
/// directly, anything else is looked up by identity.
pub fn resolve_scenario(arg: &str, user_config_dir: &Path) -> Result<Scenario, ConfigError> {
    let as_path = PathBuf::from(arg);
    if as_path.extension().is_some_and(|ext| ext == "toml") {
        if !as_path.is_file() {
            return Err(ConfigError::NotFound(arg.to_string()));
        }
        let scenario = load_scenario_file(&as_path)?;
        scenario.validate()?;
        return Ok(scenario);
    }

    discover_scenarios(user_config_dir)
        .into_iter()
        .find(|s| s.identity == arg)
        .ok_or_else(|| ConfigError::NotFound(arg.to_string()))
}
