use crate::config::AppConfig;
use crate::render::Tooltip;
use crate::types::RegionDatum;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use geo::algorithm::contains::Contains;
use geo::{Point, Rect};
use rstar::{RTree, RTreeObject, AABB};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

// Wrapper for RTree indexing
pub struct RegionEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for RegionEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct AppState {
    pub regions: Vec<RegionDatum>,
    pub tree: RTree<RegionEnvelope>,
    pub svg: String,
    pub config: AppConfig,
}

#[derive(Deserialize)]
pub struct HoverParams {
    x: f64,
    y: f64,
}

pub async fn start_server(config: AppConfig, regions: Vec<RegionDatum>, svg: String) -> Result<()> {
    tracing::info!("Building spatial index for hover lookups...");
    let tree_items: Vec<RegionEnvelope> = regions
        .iter()
        .enumerate()
        .map(|(i, datum)| {
            use geo::bounding_rect::BoundingRect;
            let rect = datum.feature.geometry.bounding_rect().unwrap_or(Rect::new(
                geo::Coord { x: 0.0, y: 0.0 },
                geo::Coord { x: 0.0, y: 0.0 },
            ));
            RegionEnvelope {
                index: i,
                aabb: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            }
        })
        .collect();

    let tree = RTree::bulk_load(tree_items);

    let state = Arc::new(AppState {
        regions,
        tree,
        svg,
        config: config.clone(),
    });

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    tracing::info!("Starting server on http://{}", addr);

    let app = Router::new()
        .route("/map.svg", get(svg_handler))
        .route("/api/hover", get(hover_handler))
        .fallback_service(ServeDir::new(&config.server.static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn svg_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "image/svg+xml")],
        state.svg.clone(),
    )
}

/// Resolve a pointer position (surface coordinates) to the tooltip state for
/// the region under it. A miss answers with the hidden tooltip, which is the
/// hover-leave transition for the page applying these states.
async fn hover_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HoverParams>,
) -> Json<Tooltip> {
    let mut tooltip = Tooltip::new(state.config.tooltip.clone());

    let point = Point::new(params.x, params.y);
    let envelope = AABB::from_point([params.x, params.y]);
    let candidates = state.tree.locate_in_envelope_intersecting(&envelope);

    for candidate in candidates {
        if let Some(datum) = state.regions.get(candidate.index) {
            if datum.feature.geometry.contains(&point) {
                tooltip.hover_enter(&datum.payload(), (params.x, params.y));
                return Json(tooltip);
            }
        }
    }

    tooltip.hover_leave();
    Json(tooltip)
}
