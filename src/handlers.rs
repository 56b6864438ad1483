// src/handlers.rs
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use crate::calculator::Calculation;
use crate::error::ApiResult;
use crate::import_export::parse_category;
use crate::models::{AggregationResult, DeviceCategory};
use crate::presentation::{ChartData, ResultsView};

// ==================== COMMON STRUCTURES ====================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
        }
    }
}

/// A calculation as returned to clients: raw totals plus the rendered views.
#[derive(Debug, Serialize)]
pub struct CalculationResponse {
    pub id: Uuid,
    pub computed_at: DateTime<Utc>,
    pub result: AggregationResult,
    pub view: ResultsView,
}

impl From<&Calculation> for CalculationResponse {
    fn from(calculation: &Calculation) -> Self {
        Self {
            id: calculation.id,
            computed_at: calculation.computed_at,
            result: calculation.result.clone(),
            view: ResultsView::from_result(&calculation.result),
        }
    }
}

// ==================== INVENTORIES ====================

pub async fn list_inventory(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let category = parse_category(&path.into_inner())?;
    let inventory = app_state.read_calculator()?.inventory(category).clone();

    Ok(HttpResponse::Ok().json(ApiResponse::success(inventory)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuantityRequest {
    #[validate(length(max = 32, message = "Quantity cannot exceed 32 characters"))]
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct QuantityUpdated {
    pub category: DeviceCategory,
    pub index: usize,
    pub quantity: u32,
    pub recalculated: bool,
}

pub async fn set_quantity(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<(String, usize)>,
    request: web::Json<UpdateQuantityRequest>,
) -> ApiResult<HttpResponse> {
    let (raw_category, index) = path.into_inner();
    let category = parse_category(&raw_category)?;
    request.validate()?;

    let mut calculator = app_state.write_calculator()?;
    let quantity = calculator.set_quantity(category, index, &request.value)?;
    let recalculated = calculator.store().both_loaded();
    drop(calculator);

    if recalculated {
        app_state.metrics.increment_calculations();
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(QuantityUpdated {
        category,
        index,
        quantity,
        recalculated,
    })))
}

// ==================== CALCULATION ====================

pub async fn get_status(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let status = app_state.read_calculator()?.status();
    Ok(HttpResponse::Ok().json(ApiResponse::success(status)))
}

pub async fn calculate(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let response = {
        let mut calculator = app_state.write_calculator()?;
        CalculationResponse::from(calculator.calculate()?)
    };
    app_state.metrics.increment_calculations();

    log::info!(
        "Calculated {:.2} kW nominal / {:.2} kW maximum",
        response.result.total_nominal_kw,
        response.result.total_maximum_kw
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        response,
        "Power consumption calculated".to_string(),
    )))
}

pub async fn get_results(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let calculator = app_state.read_calculator()?;
    let response = CalculationResponse::from(calculator.require_latest()?);
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

pub async fn get_chart(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let calculator = app_state.read_calculator()?;
    let chart = ChartData::from_result(&calculator.require_latest()?.result);
    Ok(HttpResponse::Ok().json(ApiResponse::success(chart)))
}
