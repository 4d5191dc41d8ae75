use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::{ConfigError, StorageApiConfig};
use crate::models::common::StoreResponse;
use crate::models::timetable::{
    CreateTimeSlotRequest, CreateTimetableItemRequest, TimeSlot, TimetableItem,
    UpdateTimetableItemRequest,
};
use crate::store::TimetableStore;

/// Client for the timetable storage REST API.
///
/// Every endpoint answers with a `{success, data, message, error}` envelope.
/// Transport failures and unreadable bodies are folded into failure
/// envelopes so callers only ever deal with one failure shape.
pub struct HttpTimetableStore {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpTimetableStore {
    pub fn new(config: &StorageApiConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ConfigError::Invalid {
            name: "STORAGE_API_BASE_URL",
            value: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                name: "STORAGE_API_BASE_URL",
                value: config.base_url.clone(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    /// Build an endpoint URL below the base URL, one path segment per entry
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.url(segments);
        debug!("Storage API request: {} {}", method, url);

        let request = self
            .client
            .request(method, url)
            .header("Content-Type", "application/json");
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> StoreResponse<T> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                error!("Storage API {} request failed: {}", operation, err);
                return StoreResponse::failure(format!("{} request failed: {}", operation, err));
            }
        };

        let status = response.status();
        info!("Storage API {} responded with status: {}", operation, status);

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                error!("Failed to read {} response body: {}", operation, err);
                return StoreResponse::failure(format!("Failed to read {} response: {}", operation, err));
            }
        };

        match serde_json::from_str::<StoreResponse<T>>(&body) {
            Ok(envelope) if status.is_success() => envelope,
            Ok(mut envelope) => {
                envelope.success = false;
                if envelope.failure_message().is_none() {
                    envelope.error = Some(format!("{} failed with status {}", operation, status));
                }
                envelope
            }
            Err(err) if status.is_success() => {
                error!("Invalid {} response body: {}", operation, err);
                StoreResponse::failure(format!("Invalid {} response: {}", operation, err))
            }
            Err(_) => StoreResponse::failure(format!("{} failed with status {}", operation, status)),
        }
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
        operation: &str,
    ) -> StoreResponse<T> {
        self.send(self.request(method, segments).json(body), operation)
            .await
    }
}

#[async_trait]
impl TimetableStore for HttpTimetableStore {
    async fn list_timetable_items(&self, timetable_id: &str) -> StoreResponse<Vec<TimetableItem>> {
        let request = self.request(Method::GET, &["timetables", timetable_id, "items"]);
        self.send(request, "list timetable items").await
    }

    async fn get_all_time_slots(&self) -> StoreResponse<Vec<TimeSlot>> {
        let request = self.request(Method::GET, &["time-slots"]);
        self.send(request, "list time slots").await
    }

    async fn create_time_slot(&self, request: &CreateTimeSlotRequest) -> StoreResponse<TimeSlot> {
        self.send_json(Method::POST, &["time-slots"], request, "create time slot")
            .await
    }

    async fn create_timetable_item(
        &self,
        request: &CreateTimetableItemRequest,
    ) -> StoreResponse<TimetableItem> {
        self.send_json(
            Method::POST,
            &["timetable-items"],
            request,
            "create timetable item",
        )
        .await
    }

    async fn update_timetable_item(
        &self,
        id: &str,
        request: &UpdateTimetableItemRequest,
    ) -> StoreResponse<TimetableItem> {
        self.send_json(
            Method::PUT,
            &["timetable-items", id],
            request,
            "update timetable item",
        )
        .await
    }

    async fn delete_timetable_item(&self, id: &str) -> StoreResponse<()> {
        let request = self.request(Method::DELETE, &["timetable-items", id]);
        // whatever the endpoint echoes back as data is not needed
        let response: StoreResponse<Value> = self.send(request, "delete timetable item").await;
        StoreResponse {
            success: response.success,
            data: None,
            message: response.message,
            error: response.error,
        }
    }
}
