use duelroom_web::{AppContext, AppSettings, ServerConfig, WebServer};
use serde_json::{json, Value};
use std::time::Duration;
use warp::filters::BoxedFilter;
use warp::test::WsClient;
use warp::ws::Message;

type Routes = BoxedFilter<(warp::reply::Response,)>;

fn routes(static_dir: &std::path::Path) -> Routes {
    let settings = AppSettings {
        countdown_secs: 0,
        ..AppSettings::default()
    };
    let context = AppContext::new(ServerConfig::new("127.0.0.1", 0, static_dir), settings)
        .expect("context");
    WebServer::routes(&context)
}

async fn connect(routes: &Routes) -> WsClient {
    warp::test::ws()
        .path("/socket")
        .handshake(routes.clone())
        .await
        .expect("websocket handshake")
}

async fn send(client: &mut WsClient, event: &str, data: Value) {
    client
        .send_text(json!({ "event": event, "data": data }).to_string())
        .await;
}

async fn recv(client: &mut WsClient) -> Value {
    let message = tokio::time::timeout(Duration::from_secs(5), client.recv())
        .await
        .expect("frame within timeout")
        .expect("open socket");
    let text = message.to_str().expect("text frame");
    serde_json::from_str(text).expect("json frame")
}

/// Registers `name` and returns the server-assigned connection id.
async fn join(client: &mut WsClient, name: &str) -> String {
    send(client, "joinPlayer", json!({ "name": name })).await;
    assert_eq!(
        recv(client).await,
        json!({ "event": "playerjoined", "data": { "name": name } })
    );

    send(client, "reconnected", json!({})).await;
    let echoed = recv(client).await;
    assert_eq!(echoed["event"], "reconnected");
    echoed["data"]["id"]
        .as_str()
        .expect("connection id")
        .to_string()
}

#[tokio::test]
async fn two_players_play_over_websocket() {
    let dir = tempfile::tempdir().expect("tempdir");
    let routes = routes(dir.path());
    let mut alice = connect(&routes).await;
    let mut bob = connect(&routes).await;

    let _alice_id = join(&mut alice, "Alice").await;
    let bob_id = join(&mut bob, "Bob").await;

    send(&mut alice, "createRoom", json!({ "roomName": "Den" })).await;
    let created = recv(&mut alice).await;
    assert_eq!(created["event"], "roomCreated");
    let room_id = created["data"]["roomId"]
        .as_str()
        .expect("room id")
        .to_string();
    assert_eq!(room_id.len(), 8);

    send(&mut bob, "joinRoom", json!({ "roomId": room_id })).await;
    let joined = json!({ "event": "playerJoined", "data": { "playersCount": 2 } });
    assert_eq!(recv(&mut alice).await, joined);
    assert_eq!(recv(&mut bob).await, joined);
    assert_eq!(
        recv(&mut bob).await,
        json!({ "event": "roomJoined", "data": { "roomId": room_id, "playersCount": 2 } })
    );

    send(&mut alice, "playerReady", json!({})).await;
    send(&mut bob, "playerReady", json!({})).await;
    for client in [&mut alice, &mut bob] {
        assert_eq!(
            recv(client).await,
            json!({ "event": "playerReady", "data": { "playersReady": 1 } })
        );
        assert_eq!(
            recv(client).await,
            json!({ "event": "playerReady", "data": { "playersReady": 2 } })
        );
        assert_eq!(recv(client).await["event"], "startRoom");
    }

    send(&mut alice, "makeMove", json!({ "roomId": room_id, "index": 4 })).await;
    let made = json!({
        "event": "moveMade",
        "data": {
            "board": [null, null, null, null, "x", null, null, null, null],
            "currentTurn": bob_id
        }
    });
    assert_eq!(recv(&mut alice).await, made);
    assert_eq!(recv(&mut bob).await, made);

    bob.send(Message::close()).await;
    assert_eq!(
        recv(&mut alice).await,
        json!({ "event": "playerLeft", "data": { "playersCount": 1 } })
    );
    assert_eq!(
        recv(&mut alice).await,
        json!({ "event": "roomCanceled", "data": { "playersCount": 1 } })
    );
}

#[tokio::test]
async fn invalid_frames_get_error_events() {
    let dir = tempfile::tempdir().expect("tempdir");
    let routes = routes(dir.path());
    let mut client = connect(&routes).await;

    client.send_text("{not json").await;
    assert_eq!(
        recv(&mut client).await,
        json!({ "event": "error", "data": { "message": "Malformed message" } })
    );

    send(&mut client, "createRoom", json!({ "roomName": "Den" })).await;
    assert_eq!(
        recv(&mut client).await,
        json!({ "event": "error", "data": { "message": "Please join as a player first" } })
    );

    // Unknown events are dropped; the next reply belongs to the later frame.
    send(&mut client, "dance", json!({})).await;
    send(&mut client, "joinRoom", json!({ "roomId": "00000000" })).await;
    assert_eq!(
        recv(&mut client).await,
        json!({ "event": "error", "data": { "message": "Please join as a player first" } })
    );
}

#[tokio::test]
async fn create_room_accepts_legacy_name_field() {
    let dir = tempfile::tempdir().expect("tempdir");
    let routes = routes(dir.path());
    let mut client = connect(&routes).await;
    join(&mut client, "Dana").await;

    send(&mut client, "createRoom", json!({ "name": "Legacy" })).await;
    assert_eq!(recv(&mut client).await["event"], "roomCreated");
}

#[tokio::test]
async fn non_cell_move_indices_are_dropped_silently() {
    let dir = tempfile::tempdir().expect("tempdir");
    let routes = routes(dir.path());
    let mut alice = connect(&routes).await;
    let mut bob = connect(&routes).await;
    join(&mut alice, "Alice").await;
    let bob_id = join(&mut bob, "Bob").await;

    send(&mut alice, "createRoom", json!({ "roomName": "Den" })).await;
    let room_id = recv(&mut alice).await["data"]["roomId"]
        .as_str()
        .expect("room id")
        .to_string();
    send(&mut bob, "joinRoom", json!({ "roomId": room_id })).await;
    assert_eq!(recv(&mut alice).await["event"], "playerJoined");
    assert_eq!(recv(&mut bob).await["event"], "playerJoined");
    assert_eq!(recv(&mut bob).await["event"], "roomJoined");

    send(&mut alice, "makeMove", json!({ "roomId": room_id, "index": -1 })).await;
    send(&mut alice, "makeMove", json!({ "roomId": room_id, "index": 1.5 })).await;
    send(&mut alice, "makeMove", json!({ "roomId": room_id, "index": 99 })).await;

    // Frames are handled in order, so the first reply after the dropped moves
    // is the legal one, applied to a still-empty board.
    send(&mut alice, "makeMove", json!({ "roomId": room_id, "index": 0 })).await;
    let made = json!({
        "event": "moveMade",
        "data": {
            "board": ["x", null, null, null, null, null, null, null, null],
            "currentTurn": bob_id
        }
    });
    assert_eq!(recv(&mut alice).await, made);
    assert_eq!(recv(&mut bob).await, made);
}
