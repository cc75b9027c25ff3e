use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::instrument;

use super::{InventoryItem, InventoryLevel, InventoryStore, StockLocation};
use crate::errors::ServiceError;

const PUBLISHABLE_KEY_HEADER: &str = "x-publishable-api-key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Inventory store backed by the commerce platform's admin inventory API.
#[derive(Debug, Clone)]
pub struct HttpInventoryStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InventoryItemsEnvelope {
    inventory_items: Vec<InventoryItem>,
}

#[derive(Debug, Deserialize)]
struct InventoryLevelsEnvelope {
    inventory_levels: Vec<InventoryLevel>,
}

#[derive(Debug, Deserialize)]
struct StockLocationsEnvelope {
    stock_locations: Vec<StockLocation>,
}

impl HttpInventoryStore {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header(PUBLISHABLE_KEY_HEADER, key);
        }
        builder
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ServiceError> {
        let response = self
            .request(reqwest::Method::GET, path)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("GET {} failed: {}", path, e))
            })?;

        Self::check_status(path, response.status())?;

        response.json::<T>().await.map_err(|e| {
            ServiceError::SerializationError(format!(
                "Invalid response body from {}: {}",
                path, e
            ))
        })
    }

    fn check_status(path: &str, status: StatusCode) -> Result<(), ServiceError> {
        if status.is_success() {
            Ok(())
        } else {
            Err(ServiceError::ExternalServiceError(format!(
                "Inventory API returned {} for {}",
                status, path
            )))
        }
    }
}

#[async_trait]
impl InventoryStore for HttpInventoryStore {
    #[instrument(skip(self))]
    async fn find_items_by_sku(&self, sku: &str) -> Result<Vec<InventoryItem>, ServiceError> {
        let envelope: InventoryItemsEnvelope = self
            .get_json("/inventory-items", &[("sku", sku)])
            .await?;
        Ok(envelope.inventory_items)
    }

    #[instrument(skip(self))]
    async fn find_levels(
        &self,
        item_id: &str,
        location_id: &str,
    ) -> Result<Vec<InventoryLevel>, ServiceError> {
        let path = format!("/inventory-items/{}/location-levels", item_id);
        let envelope: InventoryLevelsEnvelope = self
            .get_json(&path, &[("location_id", location_id)])
            .await?;
        Ok(envelope.inventory_levels)
    }

    #[instrument(skip(self))]
    async fn set_stocked_quantity(
        &self,
        item_id: &str,
        location_id: &str,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let path = format!(
            "/inventory-items/{}/location-levels/{}",
            item_id, location_id
        );
        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&json!({ "stocked_quantity": quantity }))
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("POST {} failed: {}", path, e))
            })?;

        Self::check_status(&path, response.status())
    }

    #[instrument(skip(self))]
    async fn list_locations(&self) -> Result<Vec<StockLocation>, ServiceError> {
        let envelope: StockLocationsEnvelope = self.get_json("/stock-locations", &[]).await?;
        Ok(envelope.stock_locations)
    }
}
