//! Scripted host adapters.
//!
//! The engine talks to the host through three contracts. Here they are backed
//! by a [`Scenario`]: status queries answer from the scenario's lists, and the
//! asynchronous collaborators (gateway, prompt, settings launcher) post a
//! [`HostEvent`] onto an unbounded channel that the relay loop drains.

use std::collections::HashSet;

use consent_config::Scenario;
use consent_engine::{
    Capability, CapabilityStatusSource, PreRequestPrompt, PromptSpec, PromptTicket,
    RequestGateway, RequestToken, SettingsLauncher,
};
use tokio::sync::mpsc;

/// Events posted by the host adapters for the relay loop.
#[derive(Debug)]
pub enum HostEvent {
    /// The engine asked the host to request these capabilities.
    RequestIssued {
        token: RequestToken,
        capabilities: Vec<Capability>,
    },
    /// The engine asked the host to show a justification prompt.
    PromptShown {
        spec: PromptSpec,
        capabilities: Vec<Capability>,
        ticket: PromptTicket,
    },
    /// The engine asked the host to open its settings screen.
    SettingsOpened,
}

/// Sender half shared by the adapters.
pub type HostSender = mpsc::UnboundedSender<HostEvent>;

fn post(tx: &HostSender, event: HostEvent) {
    if let Err(e) = tx.send(event) {
        log::warn!("Host relay is gone, dropping event: {:?}", e.0);
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Status source answering from a scenario's static lists.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStatus {
    granted: HashSet<Capability>,
    rationale: HashSet<Capability>,
    known_permanently_denied: HashSet<Capability>,
}

impl ScriptedStatus {
    pub fn from_scenario(scenario: &Scenario) -> Self {
        Self {
            granted: capability_set(&scenario.granted),
            rationale: capability_set(&scenario.rationale),
            known_permanently_denied: capability_set(&scenario.known_permanently_denied),
        }
    }
}

fn capability_set(names: &[String]) -> HashSet<Capability> {
    names.iter().map(|n| Capability::from(n.as_str())).collect()
}

impl CapabilityStatusSource for ScriptedStatus {
    fn is_granted(&self, capability: &Capability) -> bool {
        self.granted.contains(capability)
    }

    fn can_show_rationale(&self, capability: &Capability) -> bool {
        self.rationale.contains(capability)
    }

    fn is_known_permanently_denied(&self, capability: &Capability) -> bool {
        self.known_permanently_denied.contains(capability)
    }
}

// ---------------------------------------------------------------------------
// Channel-backed collaborators
// ---------------------------------------------------------------------------

/// Gateway that forwards each request to the relay loop.
#[derive(Debug, Clone)]
pub struct ChannelGateway {
    tx: HostSender,
}

impl ChannelGateway {
    pub fn new(tx: HostSender) -> Self {
        Self { tx }
    }
}

impl RequestGateway for ChannelGateway {
    fn request_async(&mut self, token: RequestToken, capabilities: &[Capability]) {
        log::debug!(
            "Host: request {token} issued for {} capabilities",
            capabilities.len()
        );
        post(
            &self.tx,
            HostEvent::RequestIssued {
                token,
                capabilities: capabilities.to_vec(),
            },
        );
    }
}

/// Prompt that forwards the ticket to the relay loop instead of rendering.
#[derive(Debug, Clone)]
pub struct ChannelPrompt {
    tx: HostSender,
}

impl ChannelPrompt {
    pub fn new(tx: HostSender) -> Self {
        Self { tx }
    }
}

impl PreRequestPrompt for ChannelPrompt {
    fn show(&mut self, spec: &PromptSpec, capabilities: &[Capability], ticket: PromptTicket) {
        log::debug!("Host: prompt '{}' shown for {}", spec.title, ticket.token());
        post(
            &self.tx,
            HostEvent::PromptShown {
                spec: spec.clone(),
                capabilities: capabilities.to_vec(),
                ticket,
            },
        );
    }
}

/// Settings launcher that records the launch on the relay channel.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    tx: HostSender,
}

impl ChannelSettings {
    pub fn new(tx: HostSender) -> Self {
        Self { tx }
    }
}

impl SettingsLauncher for ChannelSettings {
    fn open_settings(&mut self) {
        log::info!("Host: opening settings screen");
        post(&self.tx, HostEvent::SettingsOpened);
    }
}

/// Build the capability list and granted flags the host relays back for a
/// request, following the scenario's response script.
pub fn scripted_result(
    scenario: &Scenario,
    requested: &[Capability],
) -> (Vec<Capability>, Vec<bool>) {
    let response = &scenario.response;
    requested
        .iter()
        .filter(|c| !response.omit.iter().any(|o| o == c.as_str()))
        .map(|c| {
            let granted = response.granted.iter().any(|g| g == c.as_str());
            (c.clone(), granted)
        })
        .unzip()
}
