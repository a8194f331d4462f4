// Water reading endpoints

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{Page, WaterReading};

#[derive(Debug, Serialize)]
struct HourlyQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
}

impl ApiClient {
    /// Hourly flow readings, optionally for one device and day.
    ///
    /// `GET readings/hourly/?device_id=...&date=YYYY-MM-DD`
    pub async fn hourly_readings(
        &self,
        device_id: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<WaterReading>, Error> {
        debug!(?device_id, ?date, "fetching hourly readings");
        let page: Page<WaterReading> = self
            .get_with_query("readings/hourly/", &HourlyQuery { device_id, date })
            .await?;
        Ok(page.into_results())
    }

    /// Readings the backend flagged as critical.
    ///
    /// `GET readings/critical/`
    pub async fn critical_readings(&self) -> Result<Vec<WaterReading>, Error> {
        debug!("fetching critical readings");
        let page: Page<WaterReading> = self.get("readings/critical/").await?;
        Ok(page.into_results())
    }
}
