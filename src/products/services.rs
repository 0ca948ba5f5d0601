use anyhow::Context;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{ImageResponse, ProductForm, ProductResponse, UploadItem},
    repo::{Product, StoredImage},
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
    storage::product_image_key,
};

const PRESIGN_TTL_SECS: u64 = 30 * 60;

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

fn present(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_quantity(raw: &str) -> AppResult<i64> {
    match raw.parse::<i64>() {
        Ok(q) if q >= 0 => Ok(q),
        _ => Err(AppError::validation("Quantity must be a non-negative whole number")),
    }
}

fn parse_price(raw: &str) -> AppResult<f64> {
    match raw.parse::<f64>() {
        Ok(p) if p.is_finite() && p >= 0.0 => Ok(p),
        _ => Err(AppError::validation("Price must be a non-negative number")),
    }
}

async fn store_image(
    st: &AppState,
    user_id: Uuid,
    product_id: Uuid,
    image: UploadItem,
) -> AppResult<StoredImage> {
    let ext = ext_from_mime(&image.content_type).ok_or_else(|| {
        AppError::validation("Image must be a png, jpeg or webp file")
    })?;
    let key = product_image_key(user_id, product_id, ext);
    let size = image.body.len() as i64;
    st.storage
        .put_object(&key, image.body, &image.content_type)
        .await
        .with_context(|| format!("upload product image {key}"))?;
    Ok(StoredImage {
        key,
        name: image.file_name,
        content_type: image.content_type,
        size,
    })
}

/// Removes an object whose row was never written.
async fn discard_image(st: &AppState, key: Option<&str>) {
    let Some(key) = key else {
        return;
    };
    match st.storage.delete_object(key).await {
        Ok(()) => info!(key, "discarded unsaved product image"),
        Err(e) => warn!(error = %e, key, "failed to discard unsaved product image"),
    }
}

async fn to_response(st: &AppState, p: Product) -> AppResult<ProductResponse> {
    let image = match p.image() {
        Some(img) => Some(ImageResponse {
            url: st
                .storage
                .presign_get(&img.key, PRESIGN_TTL_SECS)
                .await
                .with_context(|| format!("presign {}", img.key))?,
            file_name: img.name,
            file_type: img.content_type,
            file_size: img.size,
        }),
        None => None,
    };
    Ok(ProductResponse {
        id: p.id,
        user_id: p.user_id,
        name: p.name,
        sku: p.sku,
        category: p.category,
        quantity: p.quantity,
        price: p.price,
        description: p.description,
        image,
        created_at: p.created_at,
        updated_at: p.updated_at,
    })
}

/// Loads a product and checks it belongs to `user_id`.
async fn owned_product(st: &AppState, user_id: Uuid, id: Uuid) -> AppResult<Product> {
    let product = st
        .products
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;
    if product.user_id != user_id {
        warn!(%user_id, product_id = %id, "product owned by another user");
        return Err(AppError::unauthorized("User not authorized"));
    }
    Ok(product)
}

pub async fn create_product(
    st: &AppState,
    user_id: Uuid,
    form: ProductForm,
) -> AppResult<ProductResponse> {
    let (Some(name), Some(category), Some(quantity), Some(price), Some(description)) = (
        present(form.name),
        present(form.category),
        present(form.quantity),
        present(form.price),
        present(form.description),
    ) else {
        return Err(AppError::validation("Please fill in all fields"));
    };
    let quantity = parse_quantity(&quantity)?;
    let price = parse_price(&price)?;

    let id = Uuid::new_v4();
    let sku = present(form.sku)
        .unwrap_or_else(|| format!("SKU-{}", &id.simple().to_string()[..8]).to_uppercase());

    let image = match form.image {
        Some(img) => Some(store_image(st, user_id, id, img).await?),
        None => None,
    };

    let now = OffsetDateTime::now_utc();
    let mut product = Product {
        id,
        user_id,
        name,
        sku,
        category,
        quantity,
        price,
        description,
        image_key: None,
        image_name: None,
        image_type: None,
        image_size: None,
        created_at: now,
        updated_at: now,
    };
    let new_key = image.as_ref().map(|i| i.key.clone());
    product.set_image(image);

    let saved = match st.products.insert(&product).await {
        Ok(saved) => saved,
        Err(e) => {
            discard_image(st, new_key.as_deref()).await;
            return Err(e.into());
        }
    };
    info!(%user_id, product_id = %saved.id, "product created");
    to_response(st, saved).await
}

pub async fn list_products(st: &AppState, user_id: Uuid) -> AppResult<Vec<ProductResponse>> {
    let products = st.products.list_by_user(user_id).await?;
    let mut out = Vec::with_capacity(products.len());
    for p in products {
        out.push(to_response(st, p).await?);
    }
    Ok(out)
}

pub async fn get_product(st: &AppState, user_id: Uuid, id: Uuid) -> AppResult<ProductResponse> {
    let product = owned_product(st, user_id, id).await?;
    to_response(st, product).await
}

pub async fn update_product(
    st: &AppState,
    user_id: Uuid,
    id: Uuid,
    form: ProductForm,
) -> AppResult<ProductResponse> {
    let mut product = owned_product(st, user_id, id).await?;

    if let Some(name) = present(form.name) {
        product.name = name;
    }
    if let Some(sku) = present(form.sku) {
        product.sku = sku;
    }
    if let Some(category) = present(form.category) {
        product.category = category;
    }
    if let Some(quantity) = present(form.quantity) {
        product.quantity = parse_quantity(&quantity)?;
    }
    if let Some(price) = present(form.price) {
        product.price = parse_price(&price)?;
    }
    if let Some(description) = present(form.description) {
        product.description = description;
    }

    let (replaced, new_key) = match form.image {
        Some(img) => {
            let old = product.image();
            let stored = store_image(st, user_id, id, img).await?;
            let key = stored.key.clone();
            product.set_image(Some(stored));
            (old, Some(key))
        }
        None => (None, None),
    };

    let saved = match st.products.update(&product).await {
        Ok(Some(saved)) => saved,
        Ok(None) => {
            discard_image(st, new_key.as_deref()).await;
            return Err(AppError::not_found("Product not found"));
        }
        Err(e) => {
            discard_image(st, new_key.as_deref()).await;
            return Err(e.into());
        }
    };

    if let Some(old) = replaced {
        if let Err(e) = st.storage.delete_object(&old.key).await {
            warn!(error = %e, key = %old.key, "failed to delete replaced product image");
        }
    }
    info!(%user_id, product_id = %id, "product updated");
    to_response(st, saved).await
}

pub async fn delete_product(st: &AppState, user_id: Uuid, id: Uuid) -> AppResult<()> {
    let product = owned_product(st, user_id, id).await?;
    if !st.products.delete(id).await? {
        return Err(AppError::not_found("Product not found"));
    }
    if let Some(img) = product.image() {
        st.storage
            .delete_object(&img.key)
            .await
            .with_context(|| format!("delete product image {}", img.key))?;
    }
    info!(%user_id, product_id = %id, "product deleted");
    Ok(())
}
