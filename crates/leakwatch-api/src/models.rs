// Backend data types
//
// Raw shapes as the backend sends them. Field aliases cover the naming
// variants the backend uses across endpoints; anything not modelled
// explicitly is kept in a flattened `extra` map so nothing is dropped.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

// ── Identifiers ─────────────────────────────────────────────────────

/// Backend record identifier. Some endpoints send integers, others strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Self(n.to_string()),
            Raw::Text(s) => Self(s),
        })
    }
}

// ── Pagination ──────────────────────────────────────────────────────

/// A page of results.
///
/// List endpoints answer either with a bare array or with a
/// `{count, next, previous, results}` envelope; both decode here.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: Option<u64>,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    pub fn into_results(self) -> Vec<T> {
        self.results
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Page<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw<T> {
            Paged {
                #[serde(default)]
                count: Option<u64>,
                #[serde(default)]
                next: Option<String>,
                #[serde(default)]
                previous: Option<String>,
                results: Vec<T>,
            },
            Bare(Vec<T>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Paged {
                count,
                next,
                previous,
                results,
            } => Self {
                count,
                next,
                previous,
                results,
            },
            Raw::Bare(results) => Self {
                count: u64::try_from(results.len()).ok(),
                next: None,
                previous: None,
                results,
            },
        })
    }
}

// ── Users & auth payloads ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Token pair returned by login and refresh.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenPair {
    #[serde(alias = "access_token", alias = "accessToken")]
    pub access: String,
    #[serde(default, alias = "refresh_token", alias = "refreshToken")]
    pub refresh: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Generic acknowledgement (`{"message": "..."}`, `{"detail": "..."}`, or empty).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default, alias = "detail")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Leaks ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeakStatus {
    PotentialLeak,
    Investigating,
    Resolved,
    #[serde(other)]
    Unknown,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    #[serde(other)]
    Unknown,
}

/// A leak as listed on the history / investigating views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakRecord {
    pub id: RecordId,
    #[serde(
        rename = "occurred_at",
        alias = "occurredAt",
        alias = "detected_at",
        alias = "timestamp"
    )]
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(
        default,
        rename = "water_lost_litres",
        alias = "waterLostLitres",
        alias = "water_lost",
        alias = "waterLost"
    )]
    pub water_lost_litres: Option<f64>,
    pub status: LeakStatus,
    #[serde(default = "unknown_severity")]
    pub severity: Severity,
}

impl LeakRecord {
    /// Best available place name: `location`, else district, else province.
    pub fn place(&self) -> Option<&str> {
        self.location
            .as_deref()
            .or(self.district.as_deref())
            .or(self.province.as_deref())
    }
}

fn unknown_severity() -> Severity {
    Severity::Unknown
}

/// Filters for the leak listing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeakQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LeakStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

// ── Devices ─────────────────────────────────────────────────────────

/// A device count per province or district.
///
/// Rows name the region as `district`, `province`, or `name`, and the count
/// as `count`, `total`, or `device_count`; district rows often carry their
/// province too. The most specific name wins.
#[derive(Debug, Clone, Serialize)]
pub struct RegionCount {
    pub name: String,
    pub count: u64,
}

impl<'de> Deserialize<'de> for RegionCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            district: Option<String>,
            #[serde(default)]
            province: Option<String>,
            #[serde(default)]
            name: Option<String>,
            #[serde(default)]
            count: Option<u64>,
            #[serde(default)]
            total: Option<u64>,
            #[serde(default)]
            device_count: Option<u64>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let name = raw
            .district
            .or(raw.province)
            .or(raw.name)
            .ok_or_else(|| serde::de::Error::missing_field("name"))?;
        let count = raw
            .count
            .or(raw.total)
            .or(raw.device_count)
            .ok_or_else(|| serde::de::Error::missing_field("count"))?;
        Ok(Self { name, count })
    }
}

/// Position of a sensor or valve on the network map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceLocation {
    pub id: RecordId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: f64,
    #[serde(default)]
    pub status: Option<String>,
}

/// Province/district filter for the location endpoints.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
}

// ── Control ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValveAction {
    Open,
    Close,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: RecordId,
    pub valve_id: String,
    pub action: ValveAction,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(alias = "scheduled_for")]
    pub start_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleStatus {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub status: String,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "detail")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: RecordId,
    pub valve_id: String,
    pub action: ValveAction,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(alias = "created_at", alias = "timestamp")]
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub issued_by: Option<String>,
}

// ── Readings ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterReading {
    pub device_id: String,
    #[serde(alias = "timestamp", alias = "hour")]
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub flow_rate: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default, alias = "volume")]
    pub volume_litres: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn record_id_accepts_numbers_and_strings() {
        let ids: Vec<RecordId> = serde_json::from_str(r#"[42, "abc-7"]"#).unwrap();
        assert_eq!(ids, vec![RecordId::new("42"), RecordId::new("abc-7")]);
    }

    #[test]
    fn page_decodes_bare_array() {
        let page: Page<RegionCount> =
            serde_json::from_str(r#"[{"province": "Northern", "count": 12}]"#).unwrap();
        assert_eq!(page.count, Some(1));
        assert!(!page.has_next());
        assert_eq!(page.results[0].name, "Northern");
    }

    #[test]
    fn page_decodes_envelope() {
        let page: Page<RegionCount> = serde_json::from_str(
            r#"{"count": 40, "next": "https://api/leaks/?page=2", "previous": null,
                "results": [{"district": "Musanze", "total": 3}]}"#,
        )
        .unwrap();
        assert_eq!(page.count, Some(40));
        assert!(page.has_next());
        assert_eq!(page.results[0].name, "Musanze");
        assert_eq!(page.results[0].count, 3);
    }

    #[test]
    fn leak_record_accepts_backend_aliases() {
        let leak: LeakRecord = serde_json::from_value(serde_json::json!({
            "id": 9,
            "detected_at": "2026-03-01T08:15:00Z",
            "district": "Musanze",
            "province": "Northern",
            "water_lost": 125.5,
            "status": "investigating",
            "severity": "high"
        }))
        .unwrap();
        assert_eq!(leak.id.as_str(), "9");
        assert!(leak.location.is_none());
        assert_eq!(leak.place(), Some("Musanze"));
        assert_eq!(leak.water_lost_litres, Some(125.5));
        assert_eq!(leak.status, LeakStatus::Investigating);
        assert_eq!(leak.severity, Severity::High);
    }

    #[test]
    fn unknown_enum_values_are_preserved_as_unknown() {
        let leak: LeakRecord = serde_json::from_value(serde_json::json!({
            "id": "x",
            "occurred_at": "2026-03-01T08:15:00Z",
            "status": "escalated",
            "severity": "extreme"
        }))
        .unwrap();
        assert_eq!(leak.status, LeakStatus::Unknown);
        assert_eq!(leak.severity, Severity::Unknown);
        assert!(leak.water_lost_litres.is_none());
    }

    #[test]
    fn leak_record_keeps_location_and_district_apart() {
        let leak: LeakRecord = serde_json::from_value(serde_json::json!({
            "id": 3,
            "occurred_at": "2026-03-01T08:15:00Z",
            "location": "Kimironko market",
            "district": "Gasabo",
            "status": "potential_leak"
        }))
        .unwrap();
        assert_eq!(leak.place(), Some("Kimironko market"));
        assert_eq!(leak.district.as_deref(), Some("Gasabo"));
    }

    #[test]
    fn district_count_with_province_prefers_district() {
        let page: Page<RegionCount> = serde_json::from_str(
            r#"[{"province": "Northern", "district": "Musanze", "count": 3},
                {"province": "Kigali", "device_count": 8}]"#,
        )
        .unwrap();
        assert_eq!(page.results[0].name, "Musanze");
        assert_eq!(page.results[0].count, 3);
        assert_eq!(page.results[1].name, "Kigali");
        assert_eq!(page.results[1].count, 8);
    }

    #[test]
    fn region_count_without_a_count_is_rejected() {
        let row = serde_json::from_str::<RegionCount>(r#"{"district": "Musanze"}"#);
        assert!(row.is_err());
    }

    #[test]
    fn valve_action_parses_from_cli_text() {
        assert_eq!("open".parse::<ValveAction>().unwrap(), ValveAction::Open);
        assert_eq!(ValveAction::Close.to_string(), "close");
        assert!("toggle".parse::<ValveAction>().is_err());
    }
}
