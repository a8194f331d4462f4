// Valve control endpoints
//
// Scheduled open/close operations and immediate commands to remote valves.

use serde_json::json;
use tracing::{debug, info};

use crate::client::ApiClient;
use crate::error::Error;
use crate::forms::{CommandRequest, ScheduleRequest, Validate};
use crate::models::{CommandRecord, Page, Schedule, ScheduleStatus};

impl ApiClient {
    /// Schedule a valve operation.
    ///
    /// `POST control/schedules/`
    pub async fn create_schedule(&self, request: &ScheduleRequest) -> Result<Schedule, Error> {
        request.validate()?;
        info!(
            valve_id = %request.valve_id,
            action = %request.action,
            start_at = %request.start_at,
            "creating valve schedule"
        );
        self.post("control/schedules/", request).await
    }

    /// Execution status of a schedule.
    ///
    /// `GET control/schedules/{id}/status/`
    pub async fn schedule_status(&self, schedule_id: &str) -> Result<ScheduleStatus, Error> {
        let url = self.resource_url("schedule_id", "control/schedules/", schedule_id, "status")?;
        debug!(schedule_id = schedule_id.trim(), "fetching schedule status");
        self.get_url(url).await
    }

    /// Send an immediate command to a valve.
    ///
    /// `POST control/commands/`
    pub async fn issue_command(&self, request: &CommandRequest) -> Result<CommandRecord, Error> {
        request.validate()?;
        info!(valve_id = %request.valve_id, action = %request.action, "issuing valve command");
        self.post("control/commands/", request).await
    }

    /// Previously issued commands, newest first.
    ///
    /// `GET control/commands/history/?page=N`
    pub async fn command_history(&self, page: Option<u32>) -> Result<Page<CommandRecord>, Error> {
        debug!(?page, "fetching command history");
        match page {
            Some(page) => {
                self.get_with_query("control/commands/history/", &json!({ "page": page }))
                    .await
            }
            None => self.get("control/commands/history/").await,
        }
    }
}
