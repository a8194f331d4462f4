// Device endpoints
//
// ESP board registration, per-region device counts, and the sensor/valve
// positions shown on the network map.

use serde_json::json;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::forms::{EspRegistration, Validate};
use crate::models::{Ack, DeviceLocation, Page, RegionCount, RegionFilter};

impl ApiClient {
    /// Register an ESP board at a location.
    ///
    /// `POST esp/register/`
    pub async fn register_esp(&self, form: &EspRegistration) -> Result<Ack, Error> {
        form.validate()?;
        debug!(device_id = %form.device_id, district = %form.district, "registering ESP device");
        self.post("esp/register/", form).await
    }

    /// Device counts per province.
    ///
    /// `GET devices/counts/provinces/`
    pub async fn province_counts(&self) -> Result<Vec<RegionCount>, Error> {
        debug!("fetching province counts");
        let page: Page<RegionCount> = self.get("devices/counts/provinces/").await?;
        Ok(page.into_results())
    }

    /// Device counts per district, optionally within one province.
    ///
    /// `GET devices/counts/districts/?province=...`
    pub async fn district_counts(&self, province: Option<&str>) -> Result<Vec<RegionCount>, Error> {
        debug!(?province, "fetching district counts");
        let page: Page<RegionCount> = match province {
            Some(province) => {
                self.get_with_query("devices/counts/districts/", &json!({ "province": province }))
                    .await?
            }
            None => self.get("devices/counts/districts/").await?,
        };
        Ok(page.into_results())
    }

    /// Sensor positions.
    ///
    /// `GET sensors/locations/`
    pub async fn sensor_locations(&self, filter: &RegionFilter) -> Result<Vec<DeviceLocation>, Error> {
        debug!(?filter, "fetching sensor locations");
        let page: Page<DeviceLocation> = self.get_with_query("sensors/locations/", filter).await?;
        Ok(page.into_results())
    }

    /// Valve positions.
    ///
    /// `GET valves/locations/`
    pub async fn valve_locations(&self, filter: &RegionFilter) -> Result<Vec<DeviceLocation>, Error> {
        debug!(?filter, "fetching valve locations");
        let page: Page<DeviceLocation> = self.get_with_query("valves/locations/", filter).await?;
        Ok(page.into_results())
    }
}
