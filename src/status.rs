use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::decision::{CandidateRequest, DecisionEngine};
use crate::orchestrator::Orchestrator;

/// Poll-only status surface for external dashboards, the manual cycle
/// trigger, and the decision-scoring call used by the external execution
/// loop. Rendering lives outside the core.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub decisions: Arc<DecisionEngine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/cycle", post(post_cycle))
        .route("/evaluate", post(post_evaluate))
        .with_state(state)
}

async fn get_status(State(state): State<AppState>) -> Json<Value> {
    let status = state.orchestrator.status();
    Json(json!({ "ok": true, "status": status }))
}

async fn post_cycle(State(state): State<AppState>) -> Json<Value> {
    match state.orchestrator.run_cycle_now().await {
        Ok(record) => Json(json!({ "ok": true, "cycle": record })),
        Err(e) => Json(json!({ "ok": false, "error": format!("{e:#}") })),
    }
}

async fn post_evaluate(
    State(state): State<AppState>,
    Json(req): Json<CandidateRequest>,
) -> Json<Value> {
    let decision = state.decisions.evaluate(req).await;
    Json(json!({ "ok": true, "decision": decision }))
}

pub async fn serve(state: AppState, listen_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    tracing::info!(addr = listen_addr, "status server listening");
    axum::serve(listener, router(state))
        .await
        .context("status server failed")?;
    Ok(())
}
