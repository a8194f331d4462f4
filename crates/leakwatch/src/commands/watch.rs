//! `watch`: stream realtime leak alerts until interrupted.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use leakwatch_api::{AlertListener, ApiClient, LeakAlert, ListenerConfig, ListenerState};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config::Target;
use crate::error::CliError;
use crate::output::{self, Tone};

use super::util;

fn listener_config(
    target: &Target,
    args: &WatchArgs,
    authorization: Option<String>,
) -> ListenerConfig {
    let mut cfg = target.listener.clone();
    if let Some(ms) = args.reconnect_delay_ms {
        cfg.reconnect_delay = Duration::from_millis(ms);
    }
    if let Some(max) = args.max_reconnects {
        cfg.max_retries = max;
    }
    cfg.authorization = authorization;
    cfg
}

/// One alert as a single output line.
fn format_alert(alert: &LeakAlert, format: &OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            serde_json::to_string(alert).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
        }
        OutputFormat::Yaml => {
            let body = serde_yaml::to_string(alert).unwrap_or_else(|e| format!("error: {e}\n"));
            format!("---\n{}", body.trim_end())
        }
        OutputFormat::Plain => alert.location().unwrap_or("-").to_owned(),
        OutputFormat::Table => {
            let mut line = format!(
                "{}  {}  {}",
                util::format_timestamp(&alert.received_at),
                output::paint(&util::humanize(&alert.status), Tone::Alert, color),
                alert.location().unwrap_or("unknown location"),
            );
            let extras: Vec<String> = alert
                .fields
                .iter()
                .filter(|(k, _)| k.as_str() != "location")
                .map(|(k, v)| match v.as_str() {
                    Some(s) => format!("{k}={s}"),
                    None => format!("{k}={v}"),
                })
                .collect();
            if !extras.is_empty() {
                line.push_str("  ");
                line.push_str(&output::paint(&extras.join(" "), Tone::Muted, color));
            }
            line
        }
    }
}

/// Resolves once the listener gives up or is stopped.
async fn wait_terminal(mut state: watch::Receiver<ListenerState>) -> ListenerState {
    match state
        .wait_for(|s| matches!(s, ListenerState::Exhausted | ListenerState::Stopped))
        .await
    {
        Ok(s) => *s,
        Err(_) => ListenerState::Stopped,
    }
}

/// Connection progress on stderr at `-v` and above.
fn log_transition(state: ListenerState) {
    match state {
        ListenerState::Open => tracing::info!("alert socket open"),
        ListenerState::Retrying { retry } => {
            tracing::warn!(retry, "alert socket closed, reconnecting");
        }
        ListenerState::Connecting => tracing::debug!("connecting to alert socket"),
        ListenerState::Exhausted | ListenerState::Stopped => {}
    }
}

pub async fn handle(
    client: &ApiClient,
    target: &Target,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let cfg = listener_config(target, &args, client.bearer_header()?);
    let max_retries = cfg.max_retries;
    let cancel = CancellationToken::new();
    let listener = AlertListener::spawn(target.ws_url.clone(), cfg, cancel.clone());

    output::notice(
        &format!("Watching for leak alerts on {} (Ctrl-C to stop)", target.ws_url),
        global.quiet,
    );

    let color = output::should_color(&global.color);
    let mut alerts = std::pin::pin!(listener.stream());
    let mut states = listener.watch_state();
    let terminal = wait_terminal(listener.watch_state());
    tokio::pin!(terminal);
    let mut seen = 0usize;
    let mut states_open = true;

    let result = loop {
        tokio::select! {
            alert = alerts.next() => {
                let Some(alert) = alert else { break Ok(()) };
                output::print_output(&format_alert(&alert, &global.output, color), global.quiet);
                seen += 1;
                if args.count.is_some_and(|n| seen >= n) {
                    break Ok(());
                }
            }
            changed = states.changed(), if states_open => {
                match changed {
                    Ok(()) => log_transition(*states.borrow_and_update()),
                    Err(_) => states_open = false,
                }
            }
            state = &mut terminal => {
                break match state {
                    ListenerState::Exhausted => Err(CliError::Realtime {
                        message: format!(
                            "alert socket unreachable after {max_retries} reconnect attempts"
                        ),
                    }),
                    _ => Ok(()),
                };
            }
            _ = tokio::signal::ctrl_c() => {
                output::notice("Stopping", global.quiet);
                break Ok(());
            }
        }
    };

    listener.shutdown();
    tracing::debug!(received = listener.len(), "alert watch finished");
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn alert() -> LeakAlert {
        serde_json::from_value(serde_json::json!({
            "status": "potential_leak",
            "location": "Nyarugenge",
            "sensor": "S-14"
        }))
        .unwrap()
    }

    #[test]
    fn table_line_carries_location_and_extra_fields() {
        let line = format_alert(&alert(), &OutputFormat::Table, false);
        assert!(line.contains("Potential leak"));
        assert!(line.contains("Nyarugenge"));
        assert!(line.contains("sensor=S-14"));
    }

    #[test]
    fn json_line_is_single_line() {
        let line = format_alert(&alert(), &OutputFormat::Json, false);
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["location"], "Nyarugenge");
    }

    #[test]
    fn plain_is_location_only() {
        assert_eq!(format_alert(&alert(), &OutputFormat::Plain, false), "Nyarugenge");
    }
}
