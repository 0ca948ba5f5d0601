use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Product record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub user_id: Uuid, // owner
    pub name: String,
    pub sku: String,
    pub category: String,
    pub quantity: i64,
    pub price: f64,
    pub description: String,
    pub image_key: Option<String>, // object storage key
    pub image_name: Option<String>,
    pub image_type: Option<String>,
    pub image_size: Option<i64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Metadata of an image already written to object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub key: String,
    pub name: String,
    pub content_type: String,
    pub size: i64,
}

impl Product {
    pub fn image(&self) -> Option<StoredImage> {
        Some(StoredImage {
            key: self.image_key.clone()?,
            name: self.image_name.clone().unwrap_or_default(),
            content_type: self.image_type.clone().unwrap_or_default(),
            size: self.image_size.unwrap_or_default(),
        })
    }

    pub fn set_image(&mut self, image: Option<StoredImage>) {
        self.image_key = image.as_ref().map(|i| i.key.clone());
        self.image_name = image.as_ref().map(|i| i.name.clone());
        self.image_type = image.as_ref().map(|i| i.content_type.clone());
        self.image_size = image.map(|i| i.size);
    }
}
