use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use graph_studio::gremlin::protocol::MIME_TYPE;
use graph_studio::{Bindings, GremlinClient, MultiValuePolicy, QueryClient, QueryError, Value};
use serde_json::{json, Value as Json};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type ServerStream = WebSocketStream<tokio::net::TcpStream>;

/// Next request body sent by the client, or `None` once it hangs up
async fn next_request(ws: &mut ServerStream) -> Option<Json> {
    while let Some(Ok(message)) = ws.next().await {
        if let Message::Binary(frame) = message {
            let mime_len = frame[0] as usize;
            assert_eq!(&frame[1..1 + mime_len], MIME_TYPE.as_bytes());
            return Some(serde_json::from_slice(&frame[1 + mime_len..]).unwrap());
        }
        if let Message::Close(_) = message {
            return None;
        }
    }
    None
}

fn request_id(request: &Json) -> String {
    request["requestId"]["@value"].as_str().unwrap().to_string()
}

async fn reply(ws: &mut ServerStream, request_id: &str, code: u16, data: Json) {
    let body = json!({
        "requestId": request_id,
        "status": {"code": code, "message": "", "attributes": {"@type": "g:Map", "@value": []}},
        "result": {"data": data, "meta": {"@type": "g:Map", "@value": []}}
    });
    ws.send(Message::Text(body.to_string())).await.unwrap();
}

async fn listen() -> (String, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/gremlin", listener.local_addr().unwrap());
    (url, listener)
}

fn vertex(id: i64, name: &str) -> Json {
    json!({"@type": "g:Vertex", "@value": {
        "id": {"@type": "g:Int64", "@value": id},
        "label": "person",
        "properties": {
            "name": [{"@type": "g:VertexProperty", "@value": {
                "id": {"@type": "g:Int64", "@value": id * 100},
                "value": name,
                "label": "name"
            }}]
        }
    }})
}

fn knows(id: i32, out_v: i64, in_v: i64) -> Json {
    json!({"@type": "g:Edge", "@value": {
        "id": {"@type": "g:Int32", "@value": id},
        "label": "knows",
        "outV": {"@type": "g:Int64", "@value": out_v},
        "outVLabel": "person",
        "inV": {"@type": "g:Int64", "@value": in_v},
        "inVLabel": "software",
        "properties": {
            "weight": {"@type": "g:Property", "@value": {"key": "weight", "value": {"@type": "g:Double", "@value": 0.5}}}
        }
    }})
}

fn list(items: Vec<Json>) -> Json {
    json!({"@type": "g:List", "@value": items})
}

#[tokio::test]
async fn test_gremlin_sasl_and_streamed_results() {
    let (url, listener) = listen().await;

    let server: JoinHandle<Vec<Json>> = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let mut seen = Vec::new();

        let eval = next_request(&mut ws).await.unwrap();
        let id = request_id(&eval);
        seen.push(eval);

        reply(&mut ws, &id, 407, Json::Null).await;
        let auth = next_request(&mut ws).await.unwrap();
        assert_eq!(request_id(&auth), id);
        seen.push(auth);

        // A frame for some other request is ignored
        reply(&mut ws, "00000000-0000-0000-0000-000000000000", 200, list(vec![vertex(99, "stale")])).await;
        reply(&mut ws, &id, 206, list(vec![vertex(1, "marko")])).await;
        reply(&mut ws, &id, 200, list(vec![knows(7, 1, 3), vertex(1, "marko")])).await;

        while next_request(&mut ws).await.is_some() {}
        seen
    });

    let mut client = GremlinClient::new(url, "stephen".to_string(), "password".to_string())
        .with_multi_value(MultiValuePolicy::First);
    client.open().await.unwrap();
    assert!(client.is_open());

    let mut bindings = Bindings::new();
    bindings.insert("name".to_string(), json!("marko"));
    let result = client.run("g.V().has('name', name).outE()", &bindings).await.unwrap();
    client.close().await;
    client.close().await;

    assert_eq!(result.len(), 3);
    let ids: Vec<&str> = result.graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);

    let marko = result.graph.node("1").unwrap();
    assert_eq!(marko.label, "person");
    assert_eq!(marko.get_property("~id"), Some(&Value::from("1")));
    assert_eq!(marko.get_property("name"), Some(&Value::from("marko")));

    let software = result.graph.node("3").unwrap();
    assert!(software.is_placeholder());
    assert_eq!(software.label, "software");

    let edge = result.graph.edge("7").unwrap();
    assert_eq!((edge.source.as_str(), edge.target.as_str()), ("1", "3"));
    assert_eq!(
        edge.properties.as_ref().and_then(|p| p.get("weight")),
        Some(&Value::Float(0.5))
    );

    let seen = server.await.unwrap();
    assert_eq!(seen[0]["op"], "eval");
    assert_eq!(seen[0]["args"]["bindings"]["name"], "marko");
    assert_eq!(seen[1]["op"], "authentication");
    assert_eq!(seen[1]["args"]["saslMechanism"], "PLAIN");
    let token = BASE64.decode(seen[1]["args"]["sasl"].as_str().unwrap()).unwrap();
    assert_eq!(token, b"\0stephen\0password");
}

#[tokio::test]
async fn test_gremlin_challenge_without_credentials() {
    let (url, listener) = listen().await;

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let eval = next_request(&mut ws).await.unwrap();
        reply(&mut ws, &request_id(&eval), 407, Json::Null).await;
        while next_request(&mut ws).await.is_some() {}
    });

    let mut client = GremlinClient::new(url, String::new(), String::new());
    let err = client.run("g.V()", &Bindings::new()).await.unwrap_err();
    assert!(matches!(err, QueryError::Authentication(_)));
    assert_eq!(err.status(), 401);

    client.close().await;
    server.await.unwrap();
}

#[tokio::test]
async fn test_gremlin_no_content() {
    let (url, listener) = listen().await;

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let eval = next_request(&mut ws).await.unwrap();
        reply(&mut ws, &request_id(&eval), 204, Json::Null).await;
        while next_request(&mut ws).await.is_some() {}
    });

    let mut client = GremlinClient::new(url, String::new(), String::new());
    let result = client.run("g.V().drop()", &Bindings::new()).await.unwrap();
    assert!(result.is_empty());
    assert_eq!(result.graph.node_count(), 0);

    client.close().await;
    server.await.unwrap();
}

#[tokio::test]
async fn test_gremlin_unreachable_server() {
    let (url, listener) = listen().await;
    drop(listener);

    let mut client = GremlinClient::new(url, String::new(), String::new());
    let err = client.open().await.unwrap_err();
    assert_eq!(err.status(), -1);
    assert!(!client.is_open());
}

#[tokio::test]
async fn test_gremlin_silent_server_times_out() {
    let (url, listener) = listen().await;

    // Accepts TCP but never answers the WebSocket upgrade
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });

    let mut client = GremlinClient::new(url, String::new(), String::new())
        .with_timeout(Duration::from_millis(200));
    let outcome = tokio::time::timeout(Duration::from_secs(3), client.run("g.V()", &Bindings::new())).await;

    let err = outcome.expect("run should settle within its own timeout").unwrap_err();
    assert_eq!(err, QueryError::Timeout);
    assert_eq!(err.status(), -1);
    assert!(!client.is_open());

    let err = tokio::time::timeout(Duration::from_secs(3), client.open())
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(err, QueryError::Timeout);

    server.abort();
}
