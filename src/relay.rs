//! Async relay loop replaying one scenario against a negotiation session.
//!
//! The host adapters post [`HostEvent`]s onto an unbounded channel; this loop
//! is the only code that touches the session. It answers prompts, relays
//! scripted results and enforces the host timeout by cancelling the session.
//! Run it on a current-thread runtime: the session and its handlers are not
//! `Send`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use consent_config::{Config, PromptAnswer, Scenario};
use consent_engine::{
    CapabilityOutcome, CapabilityQuery, Disposition, NegotiationRequest, NegotiationResult,
    NegotiationSession, OutcomeDispatcher, PromptSpec, RequestToken, RunOutcome, SessionPhase,
};
use tokio::sync::mpsc;

use crate::host::{
    ChannelGateway, ChannelPrompt, ChannelSettings, HostEvent, ScriptedStatus, scripted_result,
};
use crate::report::ScenarioReport;

type ScenarioSession = NegotiationSession<ScriptedStatus, ChannelGateway>;

/// Handler name and the result it received.
type FiredSlot = Rc<RefCell<Option<(&'static str, NegotiationResult)>>>;

/// Knobs the relay takes from `config.yaml` and the command line.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Longest wait for the next host event before the session is cancelled.
    pub timeout: Duration,
    pub open_settings_on_permanent_denial: bool,
    pub default_prompt: PromptSpec,
}

impl RelayOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.result_timeout(),
            open_settings_on_permanent_denial: config.open_settings_on_permanent_denial,
            default_prompt: config.default_prompt.clone(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

fn recording_dispatcher(fired: &FiredSlot, with_permanent: bool) -> OutcomeDispatcher {
    let record = |name: &'static str| {
        let slot = Rc::clone(fired);
        move |result: &NegotiationResult| {
            *slot.borrow_mut() = Some((name, result.clone()));
        }
    };
    let dispatcher = OutcomeDispatcher::new()
        .on_granted(record("granted"))
        .on_denied(record("denied"));
    if with_permanent {
        dispatcher.on_permanently_denied(record("permanently_denied"))
    } else {
        dispatcher
    }
}

/// Replay `scenario` end to end and report what the session did.
pub async fn run_scenario(scenario: &Scenario, options: &RelayOptions) -> Result<ScenarioReport> {
    log::info!("Relay: starting scenario {}", scenario.identity);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = NegotiationSession::new(
        ScriptedStatus::from_scenario(scenario),
        ChannelGateway::new(tx.clone()),
    )
    .with_prompt(ChannelPrompt::new(tx.clone()))
    .with_settings_launcher(ChannelSettings::new(tx));

    let fired: FiredSlot = Rc::default();
    let query = CapabilityQuery::new(scenario.capabilities.iter().map(String::as_str));
    let mut request = NegotiationRequest::new(
        query,
        recording_dispatcher(&fired, scenario.register_permanent_handler),
    )
    .with_gate(scenario.platform_gate);
    if let Some(spec) = scenario.prompt_spec(&options.default_prompt) {
        request = request.with_prompt(spec);
    }

    let mut report = ScenarioReport::new(scenario);
    let outcome = session
        .run(request)
        .with_context(|| format!("scenario '{}' could not start", scenario.identity))?;
    report.completed_synchronously = matches!(outcome, RunOutcome::Completed(_));

    while session.phase() != SessionPhase::Closed {
        // The session owns every sender, so the wait only ends without an
        // event when the deadline passes.
        let next = tokio::time::timeout(options.timeout, rx.recv()).await;
        let Some(event) = next.ok().flatten() else {
            time_out(&mut session, scenario, options.timeout, &mut report);
            break;
        };
        handle_event(&mut session, scenario, options.timeout, event, &mut report).await;
    }

    let dispatched = fired.borrow_mut().take();
    if let Some((handler, result)) = dispatched {
        report.record_dispatch(handler, &result);
    }

    if report.verdict == Some(CapabilityOutcome::PermanentlyDenied)
        && options.open_settings_on_permanent_denial
    {
        session.start_host_settings_screen();
    }

    while let Ok(event) = rx.try_recv() {
        match event {
            HostEvent::SettingsOpened => report.settings_opened = true,
            other => log::debug!("Relay: ignoring late event {other:?}"),
        }
    }

    log::info!(
        "Relay: scenario {} finished, handler={}",
        scenario.identity,
        report.fired_handler()
    );
    Ok(report)
}

fn time_out(
    session: &mut ScenarioSession,
    scenario: &Scenario,
    timeout: Duration,
    report: &mut ScenarioReport,
) {
    log::warn!(
        "Relay: no host answer within {timeout:?}, cancelling {}",
        scenario.identity
    );
    session.cancel();
    report.cancelled = true;
    report.timed_out = true;
}

async fn handle_event(
    session: &mut ScenarioSession,
    scenario: &Scenario,
    timeout: Duration,
    event: HostEvent,
    report: &mut ScenarioReport,
) {
    match event {
        HostEvent::PromptShown {
            spec,
            capabilities,
            ticket,
        } => {
            report.prompt_shown = true;
            log::debug!(
                "Relay: prompt '{}' for {} capabilities, answering {:?}",
                spec.title,
                capabilities.len(),
                scenario.prompt_answer
            );
            let decision = match scenario.prompt_answer {
                PromptAnswer::Accept => ticket.accept(),
                PromptAnswer::Decline => ticket.decline(),
                PromptAnswer::Ignore => {
                    drop(ticket);
                    return;
                }
            };
            if session.handle_prompt_decision(decision) == Disposition::Stale {
                report.stale_results += 1;
            }
        }
        HostEvent::RequestIssued {
            token,
            capabilities,
        } => {
            report.requests += 1;
            let response = &scenario.response;
            if response.never_respond {
                log::debug!("Relay: host will never answer {token}");
                return;
            }
            // A slow host answers under the same deadline as any other event.
            // Past it the session is cancelled and the late result below is
            // dropped as stale.
            if response.delay_ms > 0 {
                let delay = tokio::time::sleep(Duration::from_millis(response.delay_ms));
                if tokio::time::timeout(timeout, delay).await.is_err() {
                    time_out(session, scenario, timeout, report);
                }
            }

            let (reported, flags) = scripted_result(scenario, &capabilities);

            if response.inject_stale_result {
                let foreign = RequestToken::from_raw(token.get().wrapping_add(1));
                if session.handle_result(foreign, &reported, &flags) == Disposition::Stale {
                    report.stale_results += 1;
                }
            }
            if response.cancel_before_result {
                session.cancel();
                report.cancelled = true;
            }

            match session.handle_result(token, &reported, &flags) {
                Disposition::Stale => report.stale_results += 1,
                disposition => log::debug!("Relay: result for {token} -> {disposition:?}"),
            }
        }
        HostEvent::SettingsOpened => report.settings_opened = true,
    }
}
