//! Device command handlers.

use tabled::Tabled;

use leakwatch_api::{ApiClient, DeviceLocation, EspRegistration, RegionCount, RegionFilter};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts, RegionArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Region")]
    name: String,
    #[tabled(rename = "Devices")]
    count: u64,
}

impl From<&RegionCount> for CountRow {
    fn from(c: &RegionCount) -> Self {
        Self {
            name: c.name.clone(),
            count: c.count,
        }
    }
}

#[derive(Tabled)]
struct LocationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Province")]
    province: String,
    #[tabled(rename = "District")]
    district: String,
    #[tabled(rename = "Lat")]
    latitude: String,
    #[tabled(rename = "Lng")]
    longitude: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&DeviceLocation> for LocationRow {
    fn from(d: &DeviceLocation) -> Self {
        Self {
            id: d.id.to_string(),
            name: util::or_dash(d.name.as_deref()),
            province: util::or_dash(d.province.as_deref()),
            district: util::or_dash(d.district.as_deref()),
            latitude: format!("{:.5}", d.latitude),
            longitude: format!("{:.5}", d.longitude),
            status: d
                .status
                .as_deref()
                .map_or_else(|| "-".into(), util::humanize),
        }
    }
}

fn region_filter(region: RegionArgs) -> RegionFilter {
    RegionFilter {
        province: region.province,
        district: region.district,
    }
}

fn print_counts(counts: &[RegionCount], global: &GlobalOpts) {
    let out = output::render_list(&global.output, counts, |x| CountRow::from(x), |c| c.name.clone());
    output::print_output(&out, global.quiet);
}

fn print_locations(locations: &[DeviceLocation], global: &GlobalOpts) {
    let out = output::render_list(&global.output, locations, |x| LocationRow::from(x), |d| {
        d.id.to_string()
    });
    output::print_output(&out, global.quiet);
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &ApiClient,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::Register {
            device_id,
            name,
            province,
            district,
            lat,
            lng,
        } => {
            let form = EspRegistration {
                device_id,
                name,
                province,
                district,
                latitude: lat,
                longitude: lng,
            };
            let ack = client.register_esp(&form).await?;
            let message = ack
                .message
                .unwrap_or_else(|| format!("Device '{}' registered", form.device_id));
            output::notice(&format!("✓ {message}"), global.quiet);
            Ok(())
        }

        DevicesCommand::Provinces => {
            let counts = client.province_counts().await?;
            print_counts(&counts, global);
            Ok(())
        }

        DevicesCommand::Districts { province } => {
            let counts = client.district_counts(province.as_deref()).await?;
            print_counts(&counts, global);
            Ok(())
        }

        DevicesCommand::Sensors(region) => {
            let sensors = client.sensor_locations(&region_filter(region)).await?;
            print_locations(&sensors, global);
            Ok(())
        }

        DevicesCommand::Valves(region) => {
            let valves = client.valve_locations(&region_filter(region)).await?;
            print_locations(&valves, global);
            Ok(())
        }
    }
}
