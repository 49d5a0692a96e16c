use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::assets::AssetCache;
use crate::calendar;
use crate::config::Config;
use crate::layout;
use crate::render::Renderer;

const SVG_CONTENT_TYPE: (&str, &str) = ("content-type", "image/svg+xml");
const PURGE_INTERVAL_SECS: u64 = 60;

struct AppState {
    config: Config,
    renderer: Renderer,
    cache: AssetCache,
}

/// Serves the grid as a static page plus its assets. The page is
/// re-rendered on every request and the stored copy only backs the
/// failure path; the SVG asset is served cache-first.
pub async fn serve(config: Config, addr_override: Option<SocketAddr>) -> anyhow::Result<()> {
    let addr = addr_override.unwrap_or(config.listen_addr);
    let cache = AssetCache::open(
        config.cache.version.clone(),
        Duration::seconds(config.cache.ttl_secs as i64),
        config.cache.enabled,
    );

    let state = Arc::new(AppState {
        renderer: Renderer::new(&config),
        config,
        cache,
    });

    let purge_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut tick =
            tokio::time::interval(std::time::Duration::from_secs(PURGE_INTERVAL_SECS));
        loop {
            tick.tick().await;
            let removed = purge_state.cache.purge_stale(Utc::now()).await;
            if removed > 0 {
                debug!(removed, "purged stale assets");
            }
        }
    });

    let router = Router::new()
        .route("/", get(handle_page))
        .route("/grid.svg", get(handle_svg))
        .route("/days.json", get(handle_days))
        .route("/config.json", get(handle_config))
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found") })
        .with_state(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutting down");
}

#[derive(Debug, Deserialize)]
struct ViewportQuery {
    #[serde(default = "default_width")]
    w: f64,
    #[serde(default = "default_height")]
    h: f64,
}

fn default_width() -> f64 {
    800.0
}

fn default_height() -> f64 {
    600.0
}

fn page_key(w: f64, h: f64) -> String {
    format!("page:{w}x{h}")
}

fn svg_key(w: f64, h: f64) -> String {
    format!("svg:{w}x{h}")
}

fn render_grid(
    state: &AppState,
    w: f64,
    h: f64,
    now: DateTime<Utc>,
) -> anyhow::Result<String> {
    let cfg = &state.config;
    let days = calendar::enumerate_days(cfg.start_date, cfg.end_date, &cfg.timezone, now)?;

    let width = (w - cfg.padding).max(1.0);
    let height = (h - cfg.padding).max(1.0);
    let grid = layout::solve_layout(days.len(), width, height)?;

    Ok(state.renderer.render_svg(&days, &grid))
}

async fn handle_page(
    State(state): State<Arc<AppState>>,
    Query(viewport): Query<ViewportQuery>,
) -> Response {
    let now = Utc::now();

    match render_grid(&state, viewport.w, viewport.h, now) {
        Ok(svg) => {
            let page = state.renderer.render_page(&svg);
            state
                .cache
                .insert(page_key(viewport.w, viewport.h), page.clone(), now)
                .await;
            Html(page).into_response()
        }
        Err(err) => {
            warn!(error = %err, "failed to render page; trying stored copy");
            match state.cache.get(&page_key(viewport.w, viewport.h), now).await {
                Some(stored) => Html(stored.as_ref().clone()).into_response(),
                None => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "failed to render grid").into_response()
                }
            }
        }
    }
}

async fn handle_svg(
    State(state): State<Arc<AppState>>,
    Query(viewport): Query<ViewportQuery>,
) -> Response {
    let now = Utc::now();
    let key = svg_key(viewport.w, viewport.h);

    if let Some(stored) = state.cache.get(&key, now).await {
        debug!(key = %key, "asset served from cache");
        return ([SVG_CONTENT_TYPE], stored.as_ref().clone()).into_response();
    }

    match render_grid(&state, viewport.w, viewport.h, now) {
        Ok(svg) => {
            let body = state.cache.insert(key, svg, now).await;
            ([SVG_CONTENT_TYPE], body.as_ref().clone()).into_response()
        }
        Err(err) => {
            warn!(error = %err, "failed to render asset");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render grid").into_response()
        }
    }
}

async fn handle_days(State(state): State<Arc<AppState>>) -> Response {
    let cfg = &state.config;
    match calendar::enumerate_days(cfg.start_date, cfg.end_date, &cfg.timezone, Utc::now()) {
        Ok(days) => Json(days).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to enumerate days");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to enumerate days").into_response()
        }
    }
}

async fn handle_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config.clone())
}
