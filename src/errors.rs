// src/errors.rs
use actix_web::{HttpResponse, ResponseError};
use log::error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StockwiseError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Vision upstream error: {0}")]
    Upstream(String),

    #[error("Invalid JSON from AI: {0}")]
    MalformedResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ResponseError for StockwiseError {
    fn error_response(&self) -> HttpResponse {
        match self {
            StockwiseError::InvalidInput(msg) => {
                HttpResponse::BadRequest().json(serde_json::json!({ "error": msg }))
            }
            StockwiseError::ImageProcessing(msg) => {
                HttpResponse::BadRequest().json(serde_json::json!({ "error": msg }))
            }
            // Downstream analysis failures reach the client as one generic
            // message; the specific kind only shows up in the server log.
            StockwiseError::Upstream(_) | StockwiseError::MalformedResponse(_) => {
                error!("image analysis failed: {}", self);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Image analysis failed"
                }))
            }
            StockwiseError::Storage(_) | StockwiseError::Serialization(_) => {
                error!("storage failure: {}", self);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error"
                }))
            }
        }
    }
}
