use bytes::Bytes;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// An uploaded image before it is written to storage.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Multipart product form; every field is optional here, the service decides what is required.
#[derive(Debug, Default, Clone)]
pub struct ProductForm {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub image: Option<UploadItem>,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub sku: String,
    pub category: String,
    pub quantity: i64,
    pub price: f64,
    pub description: String,
    pub image: Option<ImageResponse>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
