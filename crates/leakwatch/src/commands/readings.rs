//! Water reading command handlers.

use chrono::NaiveDate;
use tabled::Tabled;

use leakwatch_api::{ApiClient, WaterReading};

use crate::cli::{GlobalOpts, ReadingsArgs, ReadingsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Device")]
    device_id: String,
    #[tabled(rename = "Time")]
    recorded_at: String,
    #[tabled(rename = "Flow")]
    flow_rate: String,
    #[tabled(rename = "Pressure")]
    pressure: String,
    #[tabled(rename = "Volume")]
    volume: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

impl From<&WaterReading> for ReadingRow {
    fn from(r: &WaterReading) -> Self {
        Self {
            device_id: r.device_id.clone(),
            recorded_at: util::format_timestamp(&r.recorded_at),
            flow_rate: util::format_number(r.flow_rate, "L/min"),
            pressure: util::format_number(r.pressure, "bar"),
            volume: util::format_litres(r.volume_litres),
            reason: util::or_dash(r.reason.as_deref()),
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| CliError::Validation {
        field: "date".into(),
        reason: format!("'{raw}' is not a YYYY-MM-DD date: {e}"),
    })
}

pub async fn handle(
    client: &ApiClient,
    args: ReadingsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let readings = match args.command {
        ReadingsCommand::Hourly { device, date } => {
            let date = date.as_deref().map(parse_date).transpose()?;
            client.hourly_readings(device.as_deref(), date).await?
        }
        ReadingsCommand::Critical => client.critical_readings().await?,
    };

    let out = output::render_list(&global.output, &readings, |x| ReadingRow::from(x), |r| {
        format!("{}\t{}", r.device_id, r.recorded_at.to_rfc3339())
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn date_must_be_iso() {
        assert_eq!(
            parse_date("2026-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
        assert!(parse_date("01/03/2026").is_err());
    }
}
