//! # REST API for the Nutrition Reference

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::info;

use super::mappers::NutritionMapper;
use super::ApiError;
use crate::domain::{nutrition, nutrition_table};

pub async fn list_nutrition() -> impl IntoResponse {
    info!("GET /api/nutrition");
    (StatusCode::OK, Json(NutritionMapper::to_list_dto(nutrition_table()))).into_response()
}

pub async fn get_nutrition(Path(item_id): Path<u32>) -> impl IntoResponse {
    info!("GET /api/nutrition/{}", item_id);

    match nutrition::find(item_id) {
        Some(item) => (StatusCode::OK, Json(NutritionMapper::to_dto(item))).into_response(),
        None => ApiError::not_found(format!("nutrition item {} not found", item_id)).into_response(),
    }
}
