use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

pub use crate::products::repo_types::{Product, StoredImage};

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn insert(&self, product: &Product) -> anyhow::Result<Product>;
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Product>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Product>>;
    async fn update(&self, product: &Product) -> anyhow::Result<Option<Product>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

const PRODUCT_COLUMNS: &str = "id, user_id, name, sku, category, quantity, price, description, \
     image_key, image_name, image_type, image_size, created_at, updated_at";

pub struct PgProductStore {
    db: PgPool,
}

impl PgProductStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn insert(&self, p: &Product) -> anyhow::Result<Product> {
        let row = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (id, user_id, name, sku, category, quantity, price, description,
                                  image_key, image_name, image_type, image_size)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(p.id)
        .bind(p.user_id)
        .bind(&p.name)
        .bind(&p.sku)
        .bind(&p.category)
        .bind(p.quantity)
        .bind(p.price)
        .bind(&p.description)
        .bind(&p.image_key)
        .bind(&p.image_name)
        .bind(&p.image_type)
        .bind(p.image_size)
        .fetch_one(&self.db)
        .await
        .context("insert product")?;
        Ok(row)
    }

    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
              FROM products
             WHERE user_id = $1
             ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list products by user")?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find product")?;
        Ok(row)
    }

    async fn update(&self, p: &Product) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
               SET name = $2, sku = $3, category = $4, quantity = $5, price = $6,
                   description = $7, image_key = $8, image_name = $9, image_type = $10,
                   image_size = $11, updated_at = now()
             WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(p.id)
        .bind(&p.name)
        .bind(&p.sku)
        .bind(&p.category)
        .bind(p.quantity)
        .bind(p.price)
        .bind(&p.description)
        .bind(&p.image_key)
        .bind(&p.image_name)
        .bind(&p.image_type)
        .bind(p.image_size)
        .fetch_optional(&self.db)
        .await
        .context("update product")?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete product")?;
        Ok(res.rows_affected() == 1)
    }
}
