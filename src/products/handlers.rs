use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{ProductForm, ProductResponse, UploadItem},
    services,
};
use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::{AppError, AppResult},
    state::AppState,
};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).patch(update_product).delete(delete_product),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Text fields by name, plus at most one `image` file part.
async fn read_form(mut mp: Multipart) -> AppResult<ProductForm> {
    let mut form = ProductForm::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "image" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let body = field
                .bytes()
                .await
                .map_err(|e| AppError::validation(format!("Could not read image: {e}")))?;
            if !body.is_empty() {
                form.image = Some(UploadItem {
                    file_name,
                    content_type,
                    body,
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::validation(format!("Could not read field {name}: {e}")))?;
        let slot = match name.as_str() {
            "name" => &mut form.name,
            "sku" => &mut form.sku,
            "category" => &mut form.category,
            "quantity" => &mut form.quantity,
            "price" => &mut form.price,
            "description" => &mut form.description,
            _ => continue,
        };
        *slot = Some(value);
    }
    Ok(form)
}

#[instrument(skip(state, user, mp), fields(user_id = %user.id))]
pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(mp, _): WithRejection<Multipart, AppError>,
) -> AppResult<(StatusCode, Json<ProductResponse>)> {
    let form = read_form(mp).await?;
    let product = services::create_product(&state, user.id, form).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_products(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<ProductResponse>>> {
    Ok(Json(services::list_products(&state, user.id).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_product(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProductResponse>> {
    Ok(Json(services::get_product(&state, user.id, id).await?))
}

#[instrument(skip(state, user, mp), fields(user_id = %user.id))]
pub async fn update_product(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    WithRejection(mp, _): WithRejection<Multipart, AppError>,
) -> AppResult<Json<ProductResponse>> {
    let form = read_form(mp).await?;
    Ok(Json(services::update_product(&state, user.id, id, form).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_product(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    services::delete_product(&state, user.id, id).await?;
    Ok(Json(MessageResponse::new("Product deleted.")))
}

#[cfg(test)]
mod tests {
    use crate::{app::build_app, testing::Fakes};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "stockroom-test-boundary";

    async fn login_cookie(app: &Router, email: &str) -> String {
        let res = app
            .clone()
            .oneshot(
                Request::post("/api/users/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"name": "Owner", "email": email, "password": "secret1"})
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        let set_cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content_type, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(method: &str, uri: &str, cookie: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(res: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const FIELDS: &[(&str, &str)] = &[
        ("name", "Desk lamp"),
        ("category", "Lighting"),
        ("quantity", "4"),
        ("price", "12.50"),
        ("description", "Warm white"),
    ];

    #[tokio::test]
    async fn products_require_a_session() {
        let app = build_app(Fakes::new().state());
        let res = app
            .oneshot(Request::get("/api/products").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_list_and_delete_over_http() {
        let fakes = Fakes::new();
        let app = build_app(fakes.state());
        let cookie = login_cookie(&app, "owner@example.com").await;

        let res = app
            .clone()
            .oneshot(multipart_request(
                "POST",
                "/api/products",
                &cookie,
                multipart_body(FIELDS, Some(("lamp.jpg", "image/jpeg", b"jpegdata"))),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let created = body_json(res).await;
        assert_eq!(created["name"], "Desk lamp");
        assert_eq!(created["image"]["file_name"], "lamp.jpg");
        let id = created["id"].as_str().unwrap().to_string();

        let res = app
            .clone()
            .oneshot(
                Request::get("/api/products")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);

        let res = app
            .clone()
            .oneshot(
                Request::delete(format!("/api/products/{id}"))
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, json!({"message": "Product deleted."}));
        assert!(fakes.storage.keys().is_empty());
    }

    #[tokio::test]
    async fn other_users_product_is_unauthorized() {
        let app = build_app(Fakes::new().state());
        let owner = login_cookie(&app, "owner@example.com").await;
        let other = login_cookie(&app, "other@example.com").await;

        let res = app
            .clone()
            .oneshot(multipart_request(
                "POST",
                "/api/products",
                &owner,
                multipart_body(FIELDS, None),
            ))
            .await
            .unwrap();
        let id = body_json(res).await["id"].as_str().unwrap().to_string();

        let res = app
            .clone()
            .oneshot(multipart_request(
                "PATCH",
                &format!("/api/products/{id}"),
                &other,
                multipart_body(&[("quantity", "0")], None),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_fields_are_bad_request() {
        let app = build_app(Fakes::new().state());
        let cookie = login_cookie(&app, "owner@example.com").await;
        let res = app
            .clone()
            .oneshot(multipart_request(
                "POST",
                "/api/products",
                &cookie,
                multipart_body(&[("name", "Only a name")], None),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["message"], "Please fill in all fields");
    }

    #[tokio::test]
    async fn non_multipart_body_is_json_bad_request() {
        let app = build_app(Fakes::new().state());
        let cookie = login_cookie(&app, "owner@example.com").await;
        let res = app
            .clone()
            .oneshot(
                Request::post("/api/products")
                    .header(header::COOKIE, &cookie)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(res).await["message"].is_string());
    }
}
