//! End-to-end tests using a real WebSocket client.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use tether_auth::{TokenConfig, TokenIssuer};
use tether_rpc::AuditLog;
use tether_server::handlers::hash_password;
use tether_server::{
    BuiltinDeps, ServerConfig, ServiceOptions, ServiceRegistry, StaticDirectory, TetherServer,
    register_builtin,
};
use tether_settings::UserEntry;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Boot a server with one `rpc` service and return its base URL.
async fn boot_server() -> (String, Arc<TetherServer>) {
    let issuer =
        Arc::new(TokenIssuer::new(TokenConfig::new("integration-secret", "tether")).unwrap());
    let directory = StaticDirectory::new(&[UserEntry {
        uid: 7,
        login: "alice".into(),
        identity: Some("01HALICE".into()),
        password_sha256: hash_password("wonderland"),
    }]);
    let deps = BuiltinDeps {
        issuer,
        directory: Arc::new(directory),
    };

    let registry = Arc::new(ServiceRegistry::new());
    let service = registry.register("rpc", ServiceOptions::default()).unwrap();
    register_builtin(&service, &deps).unwrap();
    service.use_text_middleware(AuditLog).unwrap();

    let server = Arc::new(TetherServer::new(ServerConfig::default(), registry, None));
    let (addr, _handle) = server.listen().await.unwrap();
    (format!("ws://{addr}"), server)
}

async fn connect(base: &str) -> WsStream {
    let (ws, _) = connect_async(format!("{base}/ws/rpc")).await.unwrap();
    ws
}

/// Read the next text message as JSON.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn rpc_call(ws: &mut WsStream, id: i64, method: &str, params: Value) -> Value {
    let req = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
    ws.send(Message::text(req.to_string())).await.unwrap();
    loop {
        let parsed = read_json(ws).await;
        if parsed["id"] == id {
            return parsed;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_version() {
    let (url, server) = boot_server().await;
    let mut ws = connect(&url).await;

    let resp = rpc_call(&mut ws, 1, "version", json!({})).await;
    assert_eq!(resp["jsonrpc"], "2.0");
    assert_eq!(resp["result"]["protocol"], 1);

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_login_flow() {
    let (url, server) = boot_server().await;
    let mut ws = connect(&url).await;

    let denied = rpc_call(&mut ws, 1, "token", json!({})).await;
    assert_eq!(denied["error"]["code"], -32001);

    let login = rpc_call(
        &mut ws,
        2,
        "login",
        json!({"user": "alice", "password": "wonderland"}),
    )
    .await;
    assert_eq!(login["result"]["id"], 7);
    assert!(login["result"]["access_token"].is_string());

    let info = rpc_call(&mut ws, 3, "session", json!({})).await;
    assert_eq!(info["result"]["uid"], 7);
    assert_eq!(info["result"]["username"], "alice");

    let token = rpc_call(&mut ws, 4, "token", json!({})).await;
    assert_eq!(token["result"]["login"], "alice");

    let refresh = rpc_call(
        &mut ws,
        5,
        "refresh",
        json!({"refresh_token": login["result"]["refresh_token"]}),
    )
    .await;
    assert_eq!(refresh["result"]["ulid"], "01HALICE");

    let _ = rpc_call(&mut ws, 6, "logout", json!({})).await;
    let info = rpc_call(&mut ws, 7, "session", json!({})).await;
    assert_eq!(info["result"]["uid"], 0);

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_unknown_method() {
    let (url, server) = boot_server().await;
    let mut ws = connect(&url).await;

    let resp = rpc_call(&mut ws, 9, "no.such.method", json!({})).await;
    assert_eq!(resp["error"]["code"], -32601);
    assert!(resp.get("result").is_none());

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_garbage_is_dropped() {
    let (url, server) = boot_server().await;
    let mut ws = connect(&url).await;

    ws.send(Message::text("not json at all")).await.unwrap();
    ws.send(Message::text(r#"{"id":1,"method":"version"}"#))
        .await
        .unwrap();
    let follow_up = json!({"jsonrpc": "2.0", "id": 2, "method": "version", "params": {}});
    ws.send(Message::text(follow_up.to_string())).await.unwrap();

    // The first reply on the wire belongs to the follow-up request.
    let resp = read_json(&mut ws).await;
    assert_eq!(resp["id"], 2);
    assert!(resp["result"].is_object());

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_binary_echo() {
    let (url, server) = boot_server().await;
    let mut ws = connect(&url).await;

    ws.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    let echoed = loop {
        let msg = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Binary(bytes) = msg {
            break bytes;
        }
    };
    assert_eq!(&echoed[..], &[1, 2, 3]);

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_unknown_service_rejected() {
    let (url, server) = boot_server().await;
    assert!(connect_async(format!("{url}/ws/missing")).await.is_err());
    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_server_initiated_call() {
    let (url, server) = boot_server().await;
    let mut ws = connect(&url).await;
    let _ = rpc_call(
        &mut ws,
        1,
        "login",
        json!({"user": "alice", "password": "wonderland"}),
    )
    .await;

    let service = server.registry().lookup("rpc").unwrap();
    let session = service.sessions_for_uid(7).pop().unwrap();
    let call_id = session.call("ping", json!({})).unwrap();
    assert_eq!(session.pending().len(), 1);

    let request = read_json(&mut ws).await;
    assert_eq!(request["method"], "ping");
    assert_eq!(request["id"], call_id);

    let answer = json!({"jsonrpc": "2.0", "id": call_id, "result": {"epoch": 1}});
    ws.send(Message::text(answer.to_string())).await.unwrap();

    timeout(TIMEOUT, async {
        while !session.pending().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("pending call was not resolved");

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_health_counts_connections() {
    let (url, server) = boot_server().await;
    let mut ws = connect(&url).await;
    let _ = rpc_call(&mut ws, 1, "version", json!({})).await;
    assert_eq!(server.registry().session_count(), 1);

    ws.close(None).await.unwrap();
    timeout(TIMEOUT, async {
        while server.registry().session_count() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session was not removed");

    server.shutdown().shutdown();
}
