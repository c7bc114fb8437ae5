use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::posts::notify;
use super::views::ProductView;
use super::{discard_on_error, parse_id, parse_list};
use crate::auth::{AuthUser, OptionalAuthUser};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiMultipart, ApiQuery};
use crate::repository::modify;
use crate::uploads::UploadForm;
use crate::AppState;
use verity_core::{
    check_price, check_text, BusinessAnalytics, MediaItem, NewProduct, Notification,
    NotificationKind, Page, Product, ProductCategory, ProductId, ProductImage, ProductQuery, Role,
    UploadKind, PRODUCT_DESCRIPTION_MAX_LEN, PRODUCT_NAME_MAX_LEN,
};

/// Marketplace page size when the client does not ask for one.
const PRODUCT_PAGE_SIZE: u32 = 12;

pub(super) fn router() -> Router<Arc<AppState>> {
    let upload_limit = DefaultBodyLimit::max(UploadKind::Product.max_request_bytes());
    Router::new()
        .route(
            "/",
            get(list_products)
                .post(create_product)
                .layer(upload_limit.clone()),
        )
        .route("/business/my-products", get(my_products))
        .route(
            "/:id",
            get(get_product)
                .put(update_product)
                .delete(delete_product)
                .layer(upload_limit),
        )
        .route("/:id/inquiry", post(send_inquiry))
        .route("/:id/like", post(like_product))
}

fn images_from(files: &[MediaItem]) -> Vec<ProductImage> {
    files
        .iter()
        .map(|m| ProductImage {
            url: m.url.clone(),
            thumbnail: Some(m.url.clone()),
        })
        .collect()
}

fn parse_price(raw: &str) -> Result<f64, ApiError> {
    let price: f64 = raw
        .parse()
        .map_err(|_| ApiError::bad_request("Price must be a number"))?;
    Ok(check_price(price)?)
}

fn parse_stock(raw: &str) -> Result<u64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("Stock must be a whole number"))
}

fn parse_flag(raw: &str) -> Result<bool, ApiError> {
    match raw {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ApiError::bad_request(format!(
            "Expected true or false, got {}",
            other
        ))),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    page: Option<u32>,
    limit: Option<u32>,
    category: Option<String>,
    search: Option<String>,
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    OptionalAuthUser(viewer): OptionalAuthUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let query = ProductQuery::parse(params.category.as_deref(), params.search.as_deref())?;
    let page = Page::new(params.page, params.limit, PRODUCT_PAGE_SIZE);
    let (products, total) = state.repository.list_products(&query, page).await?;
    let viewer = viewer.map(|u| u.id());
    let products = ProductView::many(state.repository.as_ref(), products, viewer.as_ref()).await?;

    Ok(Json(json!({
        "success": true,
        "products": products,
        "totalPages": page.total_pages(total as usize),
        "currentPage": page.page,
        "totalProducts": total,
    })))
}

async fn my_products(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    user.require_role(&[Role::Business])?;

    let products = state
        .repository
        .list_products_by_business(&user.id())
        .await?;
    let analytics = BusinessAnalytics::compute(&products);
    let products =
        ProductView::many(state.repository.as_ref(), products, Some(&user.id())).await?;

    Ok(Json(json!({
        "success": true,
        "products": products,
        "analytics": analytics,
    })))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: ProductId = parse_id(&id, "Product")?;
    let viewer = user.id();
    let (product, _) = modify::<Product, _, ApiError, _>(state.repository.as_ref(), &id, |p| {
        if !p.is_active && p.business != viewer {
            return Err(ApiError::not_found("Product not found"));
        }
        Ok(p.business != viewer && p.record_view(viewer))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let product = ProductView::one(state.repository.as_ref(), product, Some(&viewer)).await?;
    Ok(Json(json!({ "success": true, "product": product })))
}

fn new_product_from(form: &UploadForm) -> Result<NewProduct, ApiError> {
    let (Some(name), Some(description), Some(price), Some(category)) = (
        form.text("name"),
        form.text("description"),
        form.text("price"),
        form.text("category"),
    ) else {
        return Err(ApiError::bad_request(
            "Please provide name, description, price, and category",
        ));
    };

    Ok(NewProduct {
        name: name.to_string(),
        description: description.to_string(),
        price: parse_price(price)?,
        category: category.parse::<ProductCategory>()?,
        tags: parse_list(form.raw("tags").unwrap_or_default()),
        stock: form.text("stock").map(parse_stock).transpose()?.unwrap_or(0),
    })
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<impl IntoResponse, ApiError> {
    user.require_role(&[Role::Business])
        .map_err(|_| ApiError::forbidden("Only businesses can create products"))?;

    let form = state
        .uploads
        .read_form(&user.id(), UploadKind::Product, multipart)
        .await?;

    let built = new_product_from(&form).and_then(|input| {
        let mut product = Product::new(user.id(), input, Utc::now())?;
        product.images = images_from(&form.files);
        Ok(product)
    });
    let product = discard_on_error(&state.uploads, &form.files, built).await?;

    let inserted = state
        .repository
        .insert_product(&product)
        .await
        .map_err(ApiError::from);
    discard_on_error(&state.uploads, &form.files, inserted).await?;
    info!("Product {} listed by {}", product.id, user.id());

    let product = ProductView::one(state.repository.as_ref(), product, Some(&user.id())).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Product created successfully",
            "product": product,
        })),
    ))
}

/// Field changes parsed from an update form; `None` leaves a field alone.
#[derive(Debug, Default)]
struct ProductChanges {
    name: Option<String>,
    description: Option<String>,
    price: Option<f64>,
    category: Option<ProductCategory>,
    tags: Option<Vec<String>>,
    stock: Option<u64>,
    is_active: Option<bool>,
}

impl ProductChanges {
    fn from_form(form: &UploadForm) -> Result<Self, ApiError> {
        Ok(Self {
            name: form
                .text("name")
                .map(|n| check_text("name", n, PRODUCT_NAME_MAX_LEN))
                .transpose()?,
            description: form
                .text("description")
                .map(|d| check_text("description", d, PRODUCT_DESCRIPTION_MAX_LEN))
                .transpose()?,
            price: form.text("price").map(parse_price).transpose()?,
            category: form
                .text("category")
                .map(str::parse::<ProductCategory>)
                .transpose()?,
            tags: form.raw("tags").map(parse_list),
            stock: form.text("stock").map(parse_stock).transpose()?,
            is_active: form.text("isActive").map(parse_flag).transpose()?,
        })
    }

    fn apply(&self, product: &mut Product, images: &[ProductImage]) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(tags) = &self.tags {
            product.tags = tags.clone();
        }
        if let Some(stock) = self.stock {
            product.set_stock(stock);
        }
        if let Some(is_active) = self.is_active {
            product.is_active = is_active;
        }
        product.images.extend_from_slice(images);
    }
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<Json<Value>, ApiError> {
    let id: ProductId = parse_id(&id, "Product")?;
    let form = state
        .uploads
        .read_form(&user.id(), UploadKind::Product, multipart)
        .await?;

    let changes = ProductChanges::from_form(&form);
    let changes = discard_on_error(&state.uploads, &form.files, changes).await?;
    let images = images_from(&form.files);

    let updated = modify::<Product, _, ApiError, _>(state.repository.as_ref(), &id, |p| {
        if p.business != user.id() {
            return Err(ApiError::forbidden("Not authorized"));
        }
        changes.apply(p, &images);
        Ok(())
    })
    .await
    .and_then(|found| found.ok_or_else(|| ApiError::not_found("Product not found")));
    let (product, ()) = discard_on_error(&state.uploads, &form.files, updated).await?;

    let product = ProductView::one(state.repository.as_ref(), product, Some(&user.id())).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Product updated successfully",
        "product": product,
    })))
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: ProductId = parse_id(&id, "Product")?;
    let product = state
        .repository
        .get_product(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    if product.business != user.id() {
        return Err(ApiError::forbidden("Not authorized"));
    }

    if let Some(product) = state.repository.delete_product(&id).await? {
        state
            .uploads
            .delete_all(product.images.into_iter().map(|i| i.url).collect())
            .await;
    }
    Ok(Json(json!({
        "success": true,
        "message": "Product deleted successfully",
    })))
}

#[derive(Debug, Default, Deserialize)]
struct InquiryRequest {
    message: Option<String>,
}

async fn send_inquiry(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<InquiryRequest>,
) -> Result<Json<Value>, ApiError> {
    let id: ProductId = parse_id(&id, "Product")?;
    let message = body.message.unwrap_or_default();
    let now = Utc::now();
    let (product, ()) = modify::<Product, _, ApiError, _>(state.repository.as_ref(), &id, |p| {
        if !p.is_active {
            return Err(ApiError::not_found("Product not found"));
        }
        Ok(p.add_inquiry(user.id(), user.role(), &message, now)?)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Product not found"))?;

    if product.business != user.id() {
        let notification = Notification::new(
            product.business,
            NotificationKind::Message,
            "New inquiry",
            format!(
                "{} asked about {}",
                user.0.user_info.full_name, product.name
            ),
            now,
        )
        .with_account(user.id());
        notify(state.repository.as_ref(), notification).await;
    }

    Ok(Json(json!({
        "success": true,
        "message": "Inquiry sent successfully",
    })))
}

async fn like_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: ProductId = parse_id(&id, "Product")?;
    let now = Utc::now();
    let (product, liked) = modify::<Product, _, ApiError, _>(state.repository.as_ref(), &id, |p| {
        if !p.is_active {
            return Err(ApiError::not_found("Product not found"));
        }
        Ok(p.toggle_like(user.id(), now))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Product not found"))?;

    Ok(Json(json!({
        "success": true,
        "liked": liked,
        "likes": product.likes.len(),
    })))
}
