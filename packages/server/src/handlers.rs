//! HTTP handler functions for the crash forecast API.

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use crash_forecast_collision_models::{Mode, Scope};
use crash_forecast_query::{ModelResolution, QueryEngine, QueryError};
use crash_forecast_query_models::DateRange;
use crash_forecast_server_models::{
    ApiError, ApiHealth, ApiRegion, ConfidenceQueryParams, MapQueryParams, ModeSwitchParams,
    SeriesQueryParams,
};
use serde::Serialize;

use crate::AppState;

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        data_range: state.engine.dataset().range(),
    })
}

/// `GET /api/regions`
///
/// Lists the region roster with confidence, model availability and
/// boundary extent.
pub async fn regions(state: web::Data<AppState>) -> HttpResponse {
    let engine = &state.engine;
    let index = engine.dataset().regions();
    let regions: Vec<ApiRegion> = index
        .roster()
        .iter()
        .map(|name| {
            let scope = Scope::Region(name.clone());
            ApiRegion {
                name: name.clone(),
                confidence: engine.get_confidence(name),
                has_model: matches!(engine.resolve_model(&scope), ModelResolution::Cached(_)),
                bounds: index.bounding_box(name),
            }
        })
        .collect();
    HttpResponse::Ok().json(regions)
}

/// `GET /api/totals`
///
/// Collision, injury and fatality totals. Forecast mode may fit a model.
pub async fn totals(
    state: web::Data<AppState>,
    params: web::Query<SeriesQueryParams>,
) -> HttpResponse {
    let params = params.into_inner();
    let range = selected_range(&state.engine, params.start, params.end);
    let mode = params.mode.unwrap_or_default();
    run_query(&state, "totals", move |engine| {
        engine.get_totals(range.start, range.end, params.region.as_deref(), mode)
    })
    .await
}

/// `GET /api/time-series`
///
/// Smoothed daily series, with the forecast in forecast mode.
pub async fn time_series(
    state: web::Data<AppState>,
    params: web::Query<SeriesQueryParams>,
) -> HttpResponse {
    let params = params.into_inner();
    let range = selected_range(&state.engine, params.start, params.end);
    let mode = params.mode.unwrap_or_default();
    run_query(&state, "time series", move |engine| {
        engine.get_time_series(range.start, range.end, params.region.as_deref(), mode)
    })
    .await
}

/// `GET /api/map`
///
/// Per-region counts for every region, plus map framing.
pub async fn map(state: web::Data<AppState>, params: web::Query<MapQueryParams>) -> HttpResponse {
    let params = params.into_inner();
    let range = selected_range(&state.engine, params.start, params.end);
    run_query(&state, "map aggregate", move |engine| {
        engine.get_map_aggregate(range.start, range.end, params.region.as_deref())
    })
    .await
}

/// `GET /api/confidence?region=`
pub async fn confidence(
    state: web::Data<AppState>,
    params: web::Query<ConfidenceQueryParams>,
) -> HttpResponse {
    if !state.engine.dataset().regions().contains_region(&params.region) {
        return query_error_response(&QueryError::UnknownRegion(params.region.clone()));
    }
    HttpResponse::Ok().json(state.engine.get_confidence(&params.region))
}

/// `GET /api/mode-switch`
///
/// Returns the selection after switching modes. Switching to forecast
/// always moves the start date to the anchor date.
pub async fn mode_switch(
    state: web::Data<AppState>,
    params: web::Query<ModeSwitchParams>,
) -> HttpResponse {
    let current = selected_range(&state.engine, params.start, params.end);
    HttpResponse::Ok().json(state.engine.switch_mode(params.mode, current))
}

/// Fills missing dates with the dataset's bounds.
fn selected_range(engine: &QueryEngine, start: Option<NaiveDate>, end: Option<NaiveDate>) -> DateRange {
    let available = engine.dataset().range();
    DateRange {
        start: start.unwrap_or(available.start),
        end: end.unwrap_or(available.end),
    }
}

/// Runs a query on the blocking pool and renders its result.
async fn run_query<T, F>(state: &web::Data<AppState>, context: &str, query: F) -> HttpResponse
where
    T: Serialize + Send + 'static,
    F: FnOnce(&QueryEngine) -> Result<T, QueryError> + Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    match web::block(move || query(&engine)).await {
        Ok(Ok(result)) => HttpResponse::Ok().json(result),
        Ok(Err(e)) => query_error_response(&e),
        Err(e) => {
            log::error!("Failed to run {context} query: {e}");
            HttpResponse::InternalServerError().json(ApiError {
                error: format!("Failed to run {context} query"),
            })
        }
    }
}

fn query_error_response(error: &QueryError) -> HttpResponse {
    let body = ApiError {
        error: error.to_string(),
    };
    match error {
        QueryError::InvalidDateRange { .. } => HttpResponse::BadRequest().json(body),
        QueryError::UnknownRegion(_) => HttpResponse::NotFound().json(body),
        QueryError::ForecastUnavailable { .. } => {
            log::warn!("{error}");
            HttpResponse::ServiceUnavailable().json(body)
        }
        QueryError::EmptyDataset => {
            log::error!("{error}");
            HttpResponse::InternalServerError().json(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use chrono::Duration;
    use crash_forecast_collision_models::CollisionEvent;
    use crash_forecast_forecast::artifacts::BatchArtifacts;
    use crash_forecast_query::{Dataset, QueryOptions};
    use crash_forecast_query_models::{
        ConfidenceStatus, MapAggregate, ModeSelection, TimeSeriesResult, TotalsResult,
    };
    use crash_forecast_spatial::RegionIndex;

    use super::*;
    use crate::configure;

    const GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "NTAName": "Harbor" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "NTAName": "Park" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[3.0, 3.0], [4.0, 3.0], [4.0, 4.0], [3.0, 4.0], [3.0, 3.0]]]
                }
            }
        ]
    }"#;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
    }

    /// Four weeks of a weekly pattern, all inside `Harbor`.
    fn state() -> web::Data<AppState> {
        let weekly = [2_u32, 1, 1, 1, 2, 3, 2];
        let events = (0..28_i64)
            .flat_map(|t| {
                let count = weekly[usize::try_from(t).unwrap() % 7];
                (0..count).map(move |_| {
                    CollisionEvent::new(start() + Duration::days(t), 1, 0, 0.5, 0.5)
                })
            })
            .collect();
        let regions = RegionIndex::from_geojson_str(GEOJSON, "NTAName").unwrap();
        let engine = QueryEngine::new(
            Dataset::build(events, regions).unwrap(),
            BatchArtifacts::default(),
            QueryOptions::default(),
        );
        web::Data::new(AppState {
            engine: Arc::new(engine),
        })
    }

    #[actix_web::test]
    async fn totals_default_to_full_range() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::get().uri("/api/totals").to_request();
        let body: TotalsResult = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.totals.collisions, 48);
        assert_eq!(body.totals.injured, 48);
        assert_eq!(body.mode, Mode::Historical);
    }

    #[actix_web::test]
    async fn forecast_totals_fit_on_demand() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::get()
            .uri("/api/totals?mode=forecast&region=Harbor")
            .to_request();
        let body: TotalsResult = test::call_and_read_body_json(&app, req).await;
        // 365 days of a pattern averaging 12/7 per day.
        assert_eq!(body.totals.collisions, 626);
        assert_eq!(body.totals.injured, 626);
        assert_eq!(body.range.start, start() + Duration::days(28));
    }

    #[actix_web::test]
    async fn time_series_includes_smoothed_forecast() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::get()
            .uri("/api/time-series?mode=forecast&start=2021-01-08&end=2021-01-14")
            .to_request();
        let body: TimeSeriesResult = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.history.len(), 7);
        assert_eq!(body.forecast.len(), 365);
    }

    #[actix_web::test]
    async fn map_lists_every_region() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::get().uri("/api/map").to_request();
        let body: MapAggregate = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.regions.len(), 2);
        assert_eq!(body.regions[1].region, "Park");
        assert_eq!(body.regions[1].count, 0);
    }

    #[actix_web::test]
    async fn maps_query_errors_to_status_codes() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/totals?start=2021-02-01&end=2021-01-01")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri("/api/map?region=Atlantis")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/api/totals?mode=forecast&region=Park")
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[actix_web::test]
    async fn confidence_is_unavailable_without_training() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::get()
            .uri("/api/confidence?region=Harbor")
            .to_request();
        let body: ConfidenceStatus = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, ConfidenceStatus::Unavailable);
    }

    #[actix_web::test]
    async fn mode_switch_resets_start() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::get()
            .uri("/api/mode-switch?mode=forecast&start=2021-01-20")
            .to_request();
        let body: ModeSelection = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.mode, Mode::Forecast);
        assert_eq!(body.range.start, start());
    }
}
