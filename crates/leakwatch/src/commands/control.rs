//! Valve control command handlers.

use chrono::{DateTime, Utc};
use tabled::Tabled;

use leakwatch_api::{
    ApiClient, CommandRecord, CommandRequest, Schedule, ScheduleRequest, ScheduleStatus,
    ValveAction,
};

use crate::cli::{ControlArgs, ControlCommand, GlobalOpts, ValveActionArg};
use crate::error::CliError;
use crate::output;

use super::util;

impl From<ValveActionArg> for ValveAction {
    fn from(arg: ValveActionArg) -> Self {
        match arg {
            ValveActionArg::Open => ValveAction::Open,
            ValveActionArg::Close => ValveAction::Close,
        }
    }
}

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct CommandRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Valve")]
    valve_id: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Issued")]
    issued_at: String,
    #[tabled(rename = "By")]
    issued_by: String,
}

impl From<&CommandRecord> for CommandRow {
    fn from(c: &CommandRecord) -> Self {
        Self {
            id: c.id.to_string(),
            valve_id: c.valve_id.clone(),
            action: util::humanize(&c.action.to_string()),
            status: c.status.as_deref().map_or_else(|| "-".into(), util::humanize),
            issued_at: util::format_timestamp(&c.issued_at),
            issued_by: util::or_dash(c.issued_by.as_deref()),
        }
    }
}

fn schedule_detail(s: &Schedule) -> String {
    let duration = s
        .duration_minutes
        .map_or_else(|| "-".into(), |m| format!("{m} min"));
    [
        format!("Schedule:  {}", s.id),
        format!("Valve:     {}", s.valve_id),
        format!("Action:    {}", util::humanize(&s.action.to_string())),
        format!("Starts:    {}", util::format_timestamp(&s.start_at)),
        format!("Duration:  {duration}"),
        format!(
            "Status:    {}",
            s.status.as_deref().map_or_else(|| "-".into(), util::humanize)
        ),
    ]
    .join("\n")
}

fn status_detail(s: &ScheduleStatus) -> String {
    let mut lines = vec![format!("Status:    {}", util::humanize(&s.status))];
    lines.push(format!(
        "Executed:  {}",
        util::format_optional_timestamp(s.executed_at.as_ref())
    ));
    if let Some(ref message) = s.message {
        lines.push(format!("Message:   {message}"));
    }
    lines.join("\n")
}

fn command_detail(c: &CommandRecord) -> String {
    format!(
        "✓ {} command {} sent to valve {}",
        util::humanize(&c.action.to_string()),
        c.id,
        c.valve_id
    )
}

/// `--at` (RFC 3339) or `--in` (delay from now).
fn start_time(at: Option<&str>, after: Option<&str>) -> Result<DateTime<Utc>, CliError> {
    match (at, after) {
        (Some(raw), _) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| CliError::Validation {
                field: "at".into(),
                reason: format!("'{raw}' is not an RFC 3339 timestamp: {e}"),
            }),
        (None, Some(raw)) => {
            let delay = util::parse_duration("in", raw)?;
            let delay = chrono::Duration::from_std(delay).map_err(|e| CliError::Validation {
                field: "in".into(),
                reason: e.to_string(),
            })?;
            Ok(Utc::now() + delay)
        }
        (None, None) => Err(CliError::Validation {
            field: "at".into(),
            reason: "pass --at or --in".into(),
        }),
    }
}

fn duration_minutes(raw: Option<&str>) -> Result<Option<u32>, CliError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let minutes = util::parse_duration("duration", raw)?.as_secs() / 60;
    u32::try_from(minutes)
        .map(Some)
        .map_err(|_| CliError::Validation {
            field: "duration".into(),
            reason: format!("'{raw}' is too long"),
        })
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &ApiClient,
    args: ControlArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ControlCommand::Schedule {
            valve_id,
            action,
            at,
            after,
            duration,
        } => {
            let request = ScheduleRequest {
                valve_id,
                action: action.into(),
                start_at: start_time(at.as_deref(), after.as_deref())?,
                duration_minutes: duration_minutes(duration.as_deref())?,
            };
            let schedule = client.create_schedule(&request).await?;
            let out = output::render_single(&global.output, &schedule, schedule_detail, |s| {
                s.id.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ControlCommand::ScheduleStatus { schedule_id } => {
            let status = client.schedule_status(&schedule_id).await?;
            let out = output::render_single(&global.output, &status, status_detail, |s| {
                s.status.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ControlCommand::Command { valve_id, action } => {
            let action = ValveAction::from(action);
            if action == ValveAction::Close
                && !util::confirm(&format!("Close valve '{valve_id}' now?"), global.yes)?
            {
                return Ok(());
            }
            let record = client
                .issue_command(&CommandRequest { valve_id, action })
                .await?;
            let out = output::render_single(&global.output, &record, command_detail, |c| {
                c.id.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ControlCommand::History { page } => {
            let history = client.command_history(page).await?;
            let out = output::render_list(
                &global.output,
                &history.results,
                |x| CommandRow::from(x),
                |c| c.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            if let Some(hint) =
                output::page_hint(history.count, history.results.len(), history.has_next())
            {
                output::notice(&hint, global.quiet);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn start_time_parses_rfc3339() {
        let t = start_time(Some("2026-06-01T22:00:00+02:00"), None).unwrap();
        assert_eq!(t.to_rfc3339(), "2026-06-01T20:00:00+00:00");
    }

    #[test]
    fn start_time_in_is_relative_to_now() {
        let before = Utc::now();
        let t = start_time(None, Some("30m")).unwrap();
        assert!(t >= before + chrono::Duration::minutes(30));
    }

    #[test]
    fn duration_is_whole_minutes() {
        assert_eq!(duration_minutes(Some("1h 30m")).unwrap(), Some(90));
        assert_eq!(duration_minutes(None).unwrap(), None);
    }
}
