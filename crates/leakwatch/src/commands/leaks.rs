//! Leak command handlers.

use tabled::Tabled;

use leakwatch_api::{ApiClient, LeakQuery, LeakRecord, LeakStatus, Page, Severity};

use crate::cli::{GlobalOpts, LeakStatusArg, LeaksArgs, LeaksCommand};
use crate::error::CliError;
use crate::output::{self, Tone};

use super::util;

impl From<LeakStatusArg> for LeakStatus {
    fn from(arg: LeakStatusArg) -> Self {
        match arg {
            LeakStatusArg::PotentialLeak => LeakStatus::PotentialLeak,
            LeakStatusArg::Investigating => LeakStatus::Investigating,
            LeakStatusArg::Resolved => LeakStatus::Resolved,
        }
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct LeakRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time")]
    occurred_at: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Water lost")]
    water_lost: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Severity")]
    severity: String,
}

fn status_tone(status: LeakStatus) -> Tone {
    match status {
        LeakStatus::PotentialLeak => Tone::Alert,
        LeakStatus::Investigating => Tone::Warning,
        LeakStatus::Resolved => Tone::Ok,
        LeakStatus::Unknown => Tone::Muted,
    }
}

fn severity_tone(severity: Severity) -> Tone {
    match severity {
        Severity::Critical | Severity::High => Tone::Alert,
        Severity::Medium => Tone::Warning,
        Severity::Low => Tone::Ok,
        Severity::Unknown => Tone::Muted,
    }
}

fn leak_row(leak: &LeakRecord, color: bool) -> LeakRow {
    LeakRow {
        id: leak.id.to_string(),
        occurred_at: util::format_timestamp(&leak.occurred_at),
        location: util::or_dash(leak.place()),
        water_lost: util::format_litres(leak.water_lost_litres),
        status: output::paint(
            &util::humanize(&leak.status.to_string()),
            status_tone(leak.status),
            color,
        ),
        severity: output::paint(
            &util::humanize(&leak.severity.to_string()),
            severity_tone(leak.severity),
            color,
        ),
    }
}

fn print_page(page: &Page<LeakRecord>, global: &GlobalOpts) {
    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &page.results,
        |leak| leak_row(leak, color),
        |leak| leak.id.to_string(),
    );
    output::print_output(&out, global.quiet);
    if let Some(hint) = output::page_hint(page.count, page.results.len(), page.has_next()) {
        output::notice(&hint, global.quiet);
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &ApiClient,
    args: LeaksArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        LeaksCommand::List {
            status,
            region,
            page,
        } => {
            let query = LeakQuery {
                status: status.map(LeakStatus::from),
                province: region.province,
                district: region.district,
                page,
            };
            let leaks = client.list_leaks(&query).await?;
            print_page(&leaks, global);
            Ok(())
        }

        LeaksCommand::Investigating { page } => {
            let leaks = client.investigating_leaks(page).await?;
            print_page(&leaks, global);
            Ok(())
        }

        LeaksCommand::History { page } => {
            let leaks = client.leak_history(page).await?;
            print_page(&leaks, global);
            Ok(())
        }

        LeaksCommand::Resolve { leak_id, note } => {
            if !util::confirm(&format!("Mark leak '{leak_id}' as resolved?"), global.yes)? {
                return Ok(());
            }
            let ack = client.resolve_leak(&leak_id, note.as_deref()).await?;
            let message = ack
                .message
                .unwrap_or_else(|| format!("Leak '{leak_id}' resolved"));
            output::notice(&format!("✓ {message}"), global.quiet);
            Ok(())
        }
    }
}
