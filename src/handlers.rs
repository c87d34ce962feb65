// src/handlers.rs
use crate::{AppState, errors::StockwiseError, formdata, models::*};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures_util::TryStreamExt;
use serde_json::{Map, Value};
use uuid::Uuid;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// POST /api/v1/products/analyze
///
/// Multipart body with one or more file parts named `images`, all views of a
/// single product. Replies with the model's structured insight.
pub async fn analyze_product_images(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let mut images: Vec<UploadedImage> = Vec::new();

    while let Some(mut field) = payload.try_next().await? {
        if field.name() != "images" {
            // Parts outside the contract are drained and ignored.
            while field.try_next().await?.is_some() {}
            continue;
        }

        let filename = field
            .content_disposition()
            .get_filename()
            .ok_or_else(|| StockwiseError::InvalidInput("No filename provided".to_string()))?
            .to_string();

        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        if !content_type.starts_with("image/") {
            return Err(
                StockwiseError::InvalidInput(format!("Unsupported file type: {}", content_type))
                    .into(),
            );
        }

        let image_data = read_capped(&mut field).await?;

        data.image_processor.validate_image(&image_data)?;
        let prepared = data.image_processor.shrink_for_inline(&image_data)?;

        images.push(UploadedImage {
            filename,
            content_type,
            data: prepared,
        });
    }

    if images.is_empty() {
        return Err(StockwiseError::InvalidInput("No images provided".to_string()).into());
    }

    let insight = data.vision_service.analyze_images(&images).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "imageCount": images.len(),
        "ai": insight,
    })))
}

/// POST /api/v1/suppliers
///
/// Multipart intake form: text fields arrive flat with bracket-notated keys
/// and are rebuilt into a nested record; file parts are kept as metadata.
pub async fn submit_supplier(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let mut flat: FlatFormMap = Map::new();
    let mut attachments: Vec<AttachmentMeta> = Vec::new();

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().to_string();
        let filename = field
            .content_disposition()
            .get_filename()
            .map(|s| s.to_string());

        match filename {
            Some(filename) => {
                let content_type = field
                    .content_type()
                    .map(|ct| ct.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = read_capped(&mut field).await?;
                attachments.push(AttachmentMeta {
                    field: name,
                    filename,
                    content_type,
                    size: bytes.len(),
                });
            }
            None => {
                let bytes = read_capped(&mut field).await?;
                let text = String::from_utf8(bytes).map_err(|_| {
                    StockwiseError::InvalidInput(format!("Field {} is not valid UTF-8", name))
                })?;
                flat.insert(name, Value::String(text));
            }
        }
    }

    formdata::decode_json_fields(&mut flat)?;
    let supplier = formdata::reconstruct(flat);

    let record = SupplierRecord {
        id: Uuid::new_v4(),
        supplier,
        attachments,
        created_at: chrono::Utc::now(),
    };

    data.store_service.store_supplier(&record).await?;

    Ok(HttpResponse::Created().json(&record))
}

/// GET /api/v1/suppliers/{id}
pub async fn get_supplier(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let id = path.into_inner();

    match data.store_service.get_supplier(&id).await? {
        Some(record) => Ok(HttpResponse::Ok().json(&record)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "Supplier not found"
        }))),
    }
}

async fn read_capped(field: &mut actix_multipart::Field) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        if buf.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(StockwiseError::InvalidInput(format!(
                "Upload exceeds {} MB limit",
                MAX_UPLOAD_BYTES / 1024 / 1024
            ))
            .into());
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}
