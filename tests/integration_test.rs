// Integration tests for the Live Classroom Server
// Each test starts the full warp stack on an ephemeral port and talks to it over real sockets

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use classroom_server::api;
use classroom_server::classroom::ClassroomGateway;
use classroom_server::config::WebSocketConfig;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> SocketAddr {
    let gateway = Arc::new(ClassroomGateway::new());
    let routes = api::routes(gateway, WebSocketConfig::default());
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

/// Connects and consumes the `connected` greeting, returning the connection id
async fn connect(addr: SocketAddr) -> (Client, String) {
    let url = format!("ws://{}/classroom", addr);
    let (mut ws, _) = connect_async(url.as_str()).await.expect("Failed to connect to WebSocket");
    let greeting = recv(&mut ws).await.expect("No greeting received");
    assert_eq!(greeting["event"], "connected");
    let id = greeting["data"]["connectionId"].as_str().unwrap().to_string();
    (ws, id)
}

async fn send(ws: &mut Client, frame: Value) {
    ws.send(Message::Text(frame.to_string())).await.expect("Failed to send");
}

async fn recv(ws: &mut Client) -> Option<Value> {
    recv_within(ws, Duration::from_secs(2)).await
}

async fn recv_within(ws: &mut Client, limit: Duration) -> Option<Value> {
    loop {
        match timeout(limit, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return Some(serde_json::from_str(&text).unwrap()),
            Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => continue,
            _ => return None,
        }
    }
}

/// Reads until an event with the given name arrives
async fn recv_event(ws: &mut Client, event: &str) -> Value {
    while let Some(frame) = recv(ws).await {
        if frame["event"] == event {
            return frame["data"].clone();
        }
    }
    panic!("Did not receive {}", event);
}

async fn create_and_join_as_owner(ws: &mut Client, room_id: &str, owner: &str) {
    send(
        ws,
        json!({"event": "create-classroom", "data": {"id": room_id, "name": "Algo", "owner": owner, "pass": "1234"}}),
    )
    .await;
    recv_event(ws, "classrooms-update").await;
    send(
        ws,
        json!({"event": "join-room", "data": {"roomId": room_id, "userName": owner, "isOwner": true}}),
    )
    .await;
    recv_event(ws, "classroom-data").await;
    recv_event(ws, "users-update").await;
}

async fn join_as_student(ws: &mut Client, room_id: &str, name: &str) -> Value {
    send(
        ws,
        json!({"event": "join-room", "data": {"roomId": room_id, "userName": name, "isOwner": false}}),
    )
    .await;
    let data = recv_event(ws, "classroom-data").await;
    recv_event(ws, "users-update").await;
    data
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = spawn_server().await;
    let resp = reqwest::get(format!("http://{}/classroom/health", addr))
        .await
        .expect("Cannot connect to server");

    assert_eq!(resp.status(), 200, "Health endpoint should return 200 OK");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "Live Classroom Server");
}

#[tokio::test]
async fn test_created_classroom_is_listed_to_everyone() {
    let addr = spawn_server().await;
    let (mut owner, _) = connect(addr).await;
    let (mut browser, _) = connect(addr).await;

    send(
        &mut owner,
        json!({"event": "create-classroom", "data": {"id": "r1", "name": "Algo", "owner": "Alice", "pass": "1234"}}),
    )
    .await;

    let listing = recv_event(&mut browser, "classrooms-update").await;
    assert_eq!(
        listing,
        json!([{"id": "r1", "name": "Algo", "owner": "Alice", "pass": "1234"}])
    );

    send(&mut browser, json!({"event": "get-classrooms"})).await;
    let listing = recv_event(&mut browser, "classrooms-update").await;
    assert_eq!(listing.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_late_joiner_gets_defaults_and_roster() {
    let addr = spawn_server().await;
    let (mut owner, owner_id) = connect(addr).await;
    let (mut student, student_id) = connect(addr).await;

    create_and_join_as_owner(&mut owner, "r1", "Alice").await;
    let data = join_as_student(&mut student, "r1", "Bob").await;

    assert_eq!(data["code"], "// Welcome to Algo!");
    assert_eq!(data["language"], "javascript");
    assert_eq!(data["collabMode"], false);

    let roster = recv_event(&mut owner, "users-update").await;
    assert_eq!(
        roster,
        json!([
            {"id": owner_id, "name": "Alice", "isOwner": true, "hasPermission": true},
            {"id": student_id, "name": "Bob", "isOwner": false, "hasPermission": false}
        ])
    );
}

#[tokio::test]
async fn test_code_change_skips_sender() {
    let addr = spawn_server().await;
    let (mut owner, _) = connect(addr).await;
    let (mut student, _) = connect(addr).await;

    create_and_join_as_owner(&mut owner, "r1", "Alice").await;
    join_as_student(&mut student, "r1", "Bob").await;
    recv_event(&mut owner, "users-update").await;

    send(
        &mut owner,
        json!({"event": "code-change", "data": {"roomId": "r1", "code": "print(1)"}}),
    )
    .await;

    assert_eq!(recv_event(&mut student, "code-update").await, json!("print(1)"));
    assert!(
        recv_within(&mut owner, Duration::from_millis(300)).await.is_none(),
        "Sender should not receive its own code update"
    );
}

#[tokio::test]
async fn test_permission_handshake() {
    let addr = spawn_server().await;
    let (mut owner, _) = connect(addr).await;
    let (mut student, student_id) = connect(addr).await;

    create_and_join_as_owner(&mut owner, "r1", "Alice").await;
    join_as_student(&mut student, "r1", "Bob").await;
    recv_event(&mut owner, "users-update").await;

    send(
        &mut student,
        json!({"event": "permission-request", "data": {"roomId": "r1", "studentId": student_id, "studentName": "Bob"}}),
    )
    .await;
    let request = recv_event(&mut owner, "permission-request-to-owner").await;
    assert_eq!(request, json!({"studentId": student_id, "studentName": "Bob"}));

    send(
        &mut owner,
        json!({"event": "permission-response", "data": {"roomId": "r1", "studentId": student_id, "approved": true}}),
    )
    .await;
    let response = recv_event(&mut student, "permission-response-from-owner").await;
    assert_eq!(response, json!({"permissionGranted": true}));

    let roster = recv_event(&mut owner, "users-update").await;
    let bob = roster
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == "Bob")
        .unwrap()
        .clone();
    assert_eq!(bob["hasPermission"], true);
}

#[tokio::test]
async fn test_owner_disconnect_closes_classroom() {
    let addr = spawn_server().await;
    let (mut owner, _) = connect(addr).await;
    let (mut student, _) = connect(addr).await;

    create_and_join_as_owner(&mut owner, "r1", "Alice").await;
    join_as_student(&mut student, "r1", "Bob").await;

    owner.close(None).await.expect("Failed to close owner connection");

    recv_event(&mut student, "classroom-deleted-notification").await;
    let listing = recv_event(&mut student, "classrooms-update").await;
    assert_eq!(listing, json!([]));
}

#[tokio::test]
async fn test_unknown_classroom_is_answered_with_null() {
    let addr = spawn_server().await;
    let (mut ws, _) = connect(addr).await;

    send(&mut ws, json!({"event": "get-classroom", "data": "missing"})).await;
    let frame = recv(&mut ws).await.expect("No response");
    assert_eq!(frame, json!({"event": "classroom-data", "data": null}));

    send(
        &mut ws,
        json!({"event": "join-room", "data": {"roomId": "missing", "userName": "Bob", "isOwner": false}}),
    )
    .await;
    let frame = recv(&mut ws).await.expect("No response");
    assert!(frame["data"].is_null());
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let addr = spawn_server().await;
    let (mut ws, _) = connect(addr).await;

    ws.send(Message::Text("not json".to_string())).await.unwrap();
    send(&mut ws, json!({"event": "drop-tables", "data": null})).await;

    send(&mut ws, json!({"event": "get-classrooms"})).await;
    let frame = recv(&mut ws).await.expect("Connection should still be usable");
    assert_eq!(frame, json!({"event": "classrooms-update", "data": []}));
}
