use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::domain::AdapterError;

/// Sends an explorer request and decodes the JSON body.
///
/// 429 and 5xx are transient, any other non-2xx or an undecodable body is a data error.
pub(crate) async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AdapterError> {
    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(AdapterError::Unavailable(format!(
            "explorer returned status {}",
            status
        )));
    }
    if !status.is_success() {
        return Err(AdapterError::Data(format!("explorer returned status {}", status)));
    }

    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| AdapterError::Data(format!("error decoding response: {}", e)))
}
