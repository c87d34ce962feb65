// src/services/store_service.rs
use crate::errors::StockwiseError;
use crate::models::SupplierRecord;
use redis::{AsyncCommands, Client};
use uuid::Uuid;

// Intake records are working data for the catalogue pipeline, not a system
// of record; they expire after a day.
const RECORD_TTL_SECS: usize = 86_400;

pub struct StoreService {
    client: Client,
}

impl StoreService {
    /// Parses the URL only; call [`StoreService::ping`] at startup to verify
    /// the server is actually reachable.
    pub fn new(redis_url: &str) -> Result<Self, StockwiseError> {
        let client = Client::open(redis_url).map_err(|e| StockwiseError::Storage(e.to_string()))?;
        Ok(Self { client })
    }

    pub async fn ping(&self) -> Result<(), StockwiseError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| StockwiseError::Storage(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| StockwiseError::Storage(e.to_string()))?;

        Ok(())
    }

    pub async fn store_supplier(&self, record: &SupplierRecord) -> Result<(), StockwiseError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| StockwiseError::Storage(e.to_string()))?;

        let key = format!("supplier:{}", record.id);
        let value = serde_json::to_string(record)
            .map_err(|e| StockwiseError::Serialization(e.to_string()))?;

        conn.set_ex::<_, _, ()>(&key, value, RECORD_TTL_SECS)
            .await
            .map_err(|e| StockwiseError::Storage(e.to_string()))?;

        Ok(())
    }

    /// None when the record never existed or its TTL ran out.
    pub async fn get_supplier(
        &self,
        id: &Uuid,
    ) -> Result<Option<SupplierRecord>, StockwiseError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| StockwiseError::Storage(e.to_string()))?;

        let key = format!("supplier:{}", id);
        let value: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| StockwiseError::Storage(e.to_string()))?;

        match value {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StockwiseError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }
}
