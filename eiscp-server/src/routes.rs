//! REST routes
//!
//! | Method | Path                        | Response                              |
//! |--------|-----------------------------|---------------------------------------|
//! | GET    | `/status/`                  | 200 when connected, 410 otherwise     |
//! | PUT    | `/device/{ip}/{port}`       | 200, switches device                  |
//! | DELETE | `/device/`                  | 200, disconnects                      |
//! | GET    | `/device/{property}`        | property value, empty on timeout      |
//! | POST   | `/device/{property}/{value}`| `true` once the device confirms       |

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, put};
use axum::Router;
use eiscp_client::{ControllerStatus, Gateway, GatewayController, PropertyAccessor};
use eiscp_transport::DeviceAddress;
use std::sync::Arc;

/// State shared by every handler
pub struct AppState {
    pub controller: Arc<GatewayController>,
    pub accessor: Arc<PropertyAccessor>,
}

impl AppState {
    pub fn new(gateway: &Gateway) -> Self {
        Self {
            controller: gateway.controller.clone(),
            accessor: gateway.accessor.clone(),
        }
    }
}

type SharedState = Arc<AppState>;

pub async fn get_status(State(state): State<SharedState>) -> StatusCode {
    match state.controller.status() {
        ControllerStatus::Connected => StatusCode::OK,
        ControllerStatus::Disconnected => StatusCode::GONE,
    }
}

/// Switch to another device
///
/// An unparsable port still tears the current session down.
pub async fn put_device(
    State(state): State<SharedState>,
    Path((ip, port)): Path<(String, String)>,
) -> StatusCode {
    match port.parse::<u16>() {
        Ok(port) => {
            state
                .controller
                .set_device(DeviceAddress::new(ip, port))
                .await
        }
        Err(e) => {
            log::error!("Invalid device port {:?}: {}", port, e);
            state.controller.disconnect().await;
        }
    }
    StatusCode::OK
}

pub async fn delete_device(State(state): State<SharedState>) -> StatusCode {
    state.controller.disconnect().await;
    StatusCode::OK
}

pub async fn get_property(
    State(state): State<SharedState>,
    Path(property): Path<String>,
) -> String {
    state.accessor.get(&property).await
}

pub async fn post_property(
    State(state): State<SharedState>,
    Path((property, value)): Path<(String, String)>,
) -> String {
    state.accessor.set(&property, &value).await.to_string()
}

/// Build the gateway router
///
/// `/device/{ip}/{port}` and `/device/{property}/{value}` share one route
/// since they differ only by method.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/status/", get(get_status))
        .route("/device/", delete(delete_device))
        .route("/device/:key", get(get_property))
        .route("/device/:key/:value", put(put_device).post(post_property))
        .with_state(state)
}
