use std::time::Duration;

use chrono::Utc;
use ermon_common::{Error, Result, WaitTimes};
use tracing::{debug, info};
use url::Url;

use crate::request::WorkflowRequest;
use crate::response::parse_response;

/// HTTP client for the provincial workflow API.
pub struct WorkflowClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl WorkflowClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint {endpoint:?}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Scrape(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Query the current wait times for one location code, e.g. `QEH`.
    pub async fn fetch(&self, location: &str) -> Result<WaitTimes> {
        let body = WorkflowRequest::for_location(location);
        debug!("requesting wait times for {location} from {}", self.endpoint);

        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Scrape(format!("request for {location} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Scrape(format!(
                "workflow API returned {status} for {location}"
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Scrape(format!("failed to read response for {location}: {e}")))?;

        let wait = parse_response(location, &bytes, Utc::now())?;
        info!(
            location,
            waiting = wait.patients_in_waiting_room,
            total = wait.total_patients,
            "fetched wait times"
        );
        Ok(wait)
    }
}
