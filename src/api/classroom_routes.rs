use std::sync::Arc;
use warp::Filter;

use super::classroom_websocket;
use crate::classroom::ClassroomGateway;
use crate::config::WebSocketConfig;

/// All HTTP and WebSocket routes of the classroom server
pub fn routes(
    gateway: Arc<ClassroomGateway>,
    ws_config: WebSocketConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    classroom_websocket_route(gateway.clone(), ws_config)
        .or(classroom_health_check())
        .or(classroom_stats(gateway))
}

/// The single WebSocket endpoint every classroom event travels over
pub fn classroom_websocket_route(
    gateway: Arc<ClassroomGateway>,
    ws_config: WebSocketConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("classroom")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_gateway(gateway))
        .and(warp::any().map(move || ws_config.clone()))
        .map(
            |ws: warp::ws::Ws, gateway: Arc<ClassroomGateway>, ws_config: WebSocketConfig| {
                ws.on_upgrade(move |websocket| {
                    classroom_websocket::handle_classroom_websocket(websocket, gateway, ws_config)
                })
            },
        )
}

pub fn classroom_health_check() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("classroom")
        .and(warp::path("health"))
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "Live Classroom Server",
                "version": env!("CARGO_PKG_VERSION")
            }))
        })
}

pub fn classroom_stats(
    gateway: Arc<ClassroomGateway>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("classroom")
        .and(warp::path("stats"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_gateway(gateway))
        .and_then(|gateway: Arc<ClassroomGateway>| async move {
            let stats = gateway.stats().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&stats))
        })
}

fn with_gateway(
    gateway: Arc<ClassroomGateway>,
) -> impl Filter<Extract = (Arc<ClassroomGateway>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || gateway.clone())
}
