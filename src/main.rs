// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use anyhow::Context;
use log::info;
use std::sync::Arc;

mod errors;
mod formdata;
mod handlers;
mod models;
mod services;

use crate::handlers::{analyze_product_images, get_supplier, submit_supplier};
use crate::services::{ImageProcessor, StoreService, VisionService};

#[derive(Clone)]
pub struct AppState {
    store_service: Arc<StoreService>,
    vision_service: Arc<VisionService>,
    image_processor: Arc<ImageProcessor>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting stockwise intake service...");

    let api_key = std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY must be set")?;
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let store_service = Arc::new(StoreService::new(&redis_url)?);
    store_service
        .ping()
        .await
        .with_context(|| format!("redis is unreachable at {}", redis_url))?;

    let app_state = AppState {
        store_service,
        vision_service: Arc::new(VisionService::new(api_key)),
        image_processor: Arc::new(ImageProcessor::new()),
    };

    info!("Starting HTTP server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .service(
                web::scope("/api/v1")
                    .route("/products/analyze", web::post().to(analyze_product_images))
                    .route("/suppliers", web::post().to(submit_supplier))
                    .route("/suppliers/{id}", web::get().to(get_supplier)),
            )
            .route("/health", web::get().to(health_check))
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "stockwise",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
