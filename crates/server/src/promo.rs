//! `GET /promo-recommendations`: promotion bundles for a free-text product query.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use promobundle_core::bundles::{PromoBundle, PromoDataProvider, PromoEngine, PromoStatus, PromoTrace};
use promobundle_core::errors::{ApplicationError, InterfaceError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

const CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

pub struct PromoApiState<P> {
    engine: Arc<PromoEngine<P>>,
}

impl<P> Clone for PromoApiState<P> {
    fn clone(&self) -> Self {
        Self { engine: Arc::clone(&self.engine) }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PromoQuery {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Serialize)]
pub struct PromoResponse {
    pub query: String,
    pub bundles: Vec<PromoBundle>,
    pub result_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<DebugState>,
}

/// Pipeline state attached when the caller passes `debug=true`.
#[derive(Debug, Serialize)]
pub struct DebugState {
    pub status: PromoStatus,
    pub trace: PromoTrace,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub correlation_id: String,
}

pub fn router<P>(engine: Arc<PromoEngine<P>>) -> Router
where
    P: PromoDataProvider + 'static,
{
    Router::new()
        .route("/promo-recommendations", get(recommend::<P>))
        .with_state(PromoApiState { engine })
}

pub async fn recommend<P>(
    State(state): State<PromoApiState<P>>,
    Query(params): Query<PromoQuery>,
) -> Response
where
    P: PromoDataProvider + 'static,
{
    let correlation_id = Uuid::new_v4().to_string();
    let started = Instant::now();

    let result = state.engine.recommend(&params.query).await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(recommendation) => {
            let anchor_id = recommendation.anchor.as_ref().map(|anchor| anchor.product_id.0);
            let anchor_name =
                recommendation.anchor.as_ref().map(|anchor| anchor.product_name.as_str());
            info!(
                event_name = "promo.api.request_completed",
                correlation_id = %correlation_id,
                query = %params.query,
                latency_ms,
                bundle_count = recommendation.bundles.len(),
                anchor_product_id = ?anchor_id,
                anchor_product_name = ?anchor_name,
                status = ?recommendation.status,
                "promotion request completed"
            );

            let state = params
                .debug
                .then(|| DebugState { status: recommendation.status, trace: recommendation.trace });
            let body = PromoResponse {
                query: params.query,
                bundles: recommendation.bundles,
                result_text: recommendation.result_text,
                state,
            };
            (StatusCode::OK, [(CORRELATION_HEADER, correlation_id)], Json(body)).into_response()
        }
        Err(error) => {
            warn!(
                event_name = "promo.api.request_completed",
                correlation_id = %correlation_id,
                query = %params.query,
                latency_ms,
                bundle_count = 0,
                error = %error,
                "promotion request failed"
            );
            error_response(error, correlation_id)
        }
    }
}

fn error_response(error: ApplicationError, correlation_id: String) -> Response {
    let interface = error.into_interface(correlation_id.clone());
    let (status, detail) = match &interface {
        InterfaceError::BadRequest { message, .. } => (StatusCode::BAD_REQUEST, Some(message.clone())),
        InterfaceError::ServiceUnavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, None),
        InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, None),
    };
    let body = ErrorResponse {
        error: interface.user_message().to_string(),
        detail,
        correlation_id: interface.correlation_id().to_string(),
    };
    (status, [(CORRELATION_HEADER, correlation_id)], Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use promobundle_core::bundles::{PromoEngine, PromoRules, RetrievalLimits};
    use promobundle_db::{connect_with_settings, migrations, InMemoryPromoCatalog, SqlPromoCatalog};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::router;

    fn demo_router() -> Router {
        let engine = PromoEngine::new(
            InMemoryPromoCatalog::demo(),
            PromoRules::default(),
            RetrievalLimits::default(),
        );
        router(Arc::new(engine))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("router response");
        let status = response.status();
        assert!(response.headers().contains_key("x-correlation-id"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn returns_bundles_without_debug_state_by_default() {
        let (status, body) = get_json(demo_router(), "/promo-recommendations?query=banana").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "banana");
        let bundles = body["bundles"].as_array().expect("bundles");
        assert!(!bundles.is_empty() && bundles.len() <= 3);
        assert!(body["result_text"].as_str().unwrap_or_default().contains("Name: Banana"));
        assert!(body.get("state").is_none());
    }

    #[tokio::test]
    async fn debug_flag_attaches_pipeline_trace() {
        let (status, body) =
            get_json(demo_router(), "/promo-recommendations?query=Organic%20Hass%20Avocado&debug=true").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["status"], "bundles");
        assert_eq!(body["state"]["trace"]["normalized_query"], "organic hass avocado");
        assert_eq!(body["state"]["trace"]["anchor_product_id"], 47209);
        assert!(body["state"]["trace"]["pair_count"].as_u64().unwrap_or_default() > 0);
    }

    #[tokio::test]
    async fn unknown_products_return_fallback_text() {
        let (status, body) = get_json(demo_router(), "/promo-recommendations?query=xylophone").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bundles"].as_array().map(Vec::len), Some(0));
        assert_eq!(
            body["result_text"],
            "Could not identify an anchor product for promotion. Try a different query."
        );
    }

    #[tokio::test]
    async fn blank_or_missing_query_is_a_bad_request() {
        for uri in ["/promo-recommendations?query=%20%20", "/promo-recommendations"] {
            let (status, body) = get_json(demo_router(), uri).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["detail"], "query must not be empty");
            assert!(body["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
        }
    }

    #[tokio::test]
    async fn missing_schema_is_service_unavailable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        let engine =
            PromoEngine::new(SqlPromoCatalog::new(pool), PromoRules::default(), RetrievalLimits::default());

        let (status, body) = get_json(router(Arc::new(engine)), "/promo-recommendations?query=banana").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn seeded_sql_catalog_serves_bundles() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        promobundle_db::seed_demo_catalog(&pool).await.expect("seed");
        let engine =
            PromoEngine::new(SqlPromoCatalog::new(pool), PromoRules::default(), RetrievalLimits::default());

        let (status, body) = get_json(router(Arc::new(engine)), "/promo-recommendations?query=banana").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bundles"].as_array().map(Vec::len), Some(3));
    }
}
