use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use probe_api::{AdminError, NamespaceName, TopicAdmin};

use crate::MemoryBroker;

/// Admin REST v2 поверх in-memory broker'а: те же пути и коды, что у Pulsar.
pub fn admin_router(broker: MemoryBroker) -> Router {
    Router::new()
        .route("/admin/v2/clusters", get(handle_clusters))
        .route("/admin/v2/tenants/{tenant}", put(handle_create_tenant))
        .route("/admin/v2/namespaces/{tenant}/{namespace}", put(handle_create_namespace))
        .route("/admin/v2/namespaces/{tenant}/{namespace}/topics", get(handle_list_topics))
        .with_state(broker)
}

pub async fn serve_admin(
    listener: tokio::net::TcpListener,
    broker: MemoryBroker,
    shutdown: CancellationToken,
) -> Result<(), String> {
    let addr = listener.local_addr().map_err(|e| format!("local addr: {e}"))?;
    tracing::info!(%addr, "memory broker admin listening");

    axum::serve(listener, admin_router(broker))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}

// --- errors: {"reason": "..."} как у Pulsar ---

fn error_response(err: AdminError) -> Response {
    let status = match &err {
        AdminError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AdminError::Conflict(_) => StatusCode::CONFLICT,
        AdminError::NotFound(_) => StatusCode::NOT_FOUND,
        AdminError::Rejected { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
        }
        AdminError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let reason = match err {
        AdminError::Rejected { reason, .. } => reason,
        other => other.to_string(),
    };
    (status, axum::Json(serde_json::json!({ "reason": reason }))).into_response()
}

fn namespace_from_path(tenant: &str, namespace: &str) -> Result<NamespaceName, Response> {
    NamespaceName::new(tenant, namespace).map_err(|e| {
        error_response(AdminError::Rejected {
            status: 412,
            reason: e.to_string(),
        })
    })
}

// --- GET /admin/v2/clusters ---

async fn handle_clusters(State(broker): State<MemoryBroker>) -> Response {
    match broker.clusters().await {
        Ok(clusters) => axum::Json(clusters).into_response(),
        Err(e) => error_response(e),
    }
}

// --- PUT /admin/v2/tenants/{tenant} ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TenantInfo {
    #[serde(default)]
    allowed_clusters: Vec<String>,
}

async fn handle_create_tenant(
    State(broker): State<MemoryBroker>,
    Path(tenant): Path<String>,
    axum::Json(info): axum::Json<TenantInfo>,
) -> Response {
    match broker.create_tenant(&tenant, &info.allowed_clusters).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

// --- PUT /admin/v2/namespaces/{tenant}/{namespace} ---

async fn handle_create_namespace(
    State(broker): State<MemoryBroker>,
    Path((tenant, namespace)): Path<(String, String)>,
) -> Response {
    let ns = match namespace_from_path(&tenant, &namespace) {
        Ok(ns) => ns,
        Err(resp) => return resp,
    };
    match broker.create_namespace(&ns).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

// --- GET /admin/v2/namespaces/{tenant}/{namespace}/topics ---

async fn handle_list_topics(
    State(broker): State<MemoryBroker>,
    Path((tenant, namespace)): Path<(String, String)>,
) -> Response {
    let ns = match namespace_from_path(&tenant, &namespace) {
        Ok(ns) => ns,
        Err(resp) => return resp,
    };
    match broker.list_topics(&ns).await {
        Ok(topics) => axum::Json(topics).into_response(),
        Err(e) => error_response(e),
    }
}
