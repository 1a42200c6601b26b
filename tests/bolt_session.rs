use bytes::BytesMut;
use graph_studio::bolt::connection::{frame, BOLT_MAGIC};
use graph_studio::bolt::packstream::{BoltNode, BoltRelationship, PackStreamMap};
use graph_studio::bolt::{BoltRequest, BoltResponse, PackStreamValue};
use graph_studio::{Bindings, CypherClient, QueryClient, QueryError, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What the scripted server does after HELLO
enum Script {
    Records(Vec<Vec<PackStreamValue>>),
    RunFailure(&'static str),
    HelloRejected,
}

async fn read_message(stream: &mut TcpStream) -> Option<BoltRequest> {
    let mut body = BytesMut::new();
    loop {
        let size = stream.read_u16().await.ok()? as usize;
        if size == 0 {
            break;
        }
        let start = body.len();
        body.resize(start + size, 0);
        stream.read_exact(&mut body[start..]).await.ok()?;
    }
    BoltRequest::decode(&mut body.freeze()).ok()
}

async fn write_message(stream: &mut TcpStream, response: BoltResponse) {
    let mut body = BytesMut::new();
    response.encode(&mut body).unwrap();
    stream.write_all(&frame(&body)).await.unwrap();
}

fn success(entries: Vec<(&str, PackStreamValue)>) -> BoltResponse {
    BoltResponse::Success(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<PackStreamMap>(),
    )
}

/// Serve one session and return every request the client sent
async fn serve(script: Script) -> (String, JoinHandle<Vec<BoltRequest>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut seen = Vec::new();

        let mut preamble = [0u8; 20];
        stream.read_exact(&mut preamble).await.unwrap();
        assert_eq!(&preamble[..4], &BOLT_MAGIC.to_be_bytes());
        stream.write_all(&[0, 0, 4, 4]).await.unwrap();

        let hello = read_message(&mut stream).await.unwrap();
        seen.push(hello);
        if let Script::HelloRejected = script {
            write_message(
                &mut stream,
                BoltResponse::Failure {
                    code: "Neo.ClientError.Security.Unauthorized".to_string(),
                    message: "The client is unauthorized due to authentication failure.".to_string(),
                },
            )
            .await;
        } else {
            write_message(&mut stream, success(vec![("server", PackStreamValue::String("Neo4j/4.4.0".into()))])).await;

            seen.push(read_message(&mut stream).await.unwrap());
            seen.push(read_message(&mut stream).await.unwrap());

            match script {
                Script::Records(records) => {
                    let fields = ["a", "r", "b"]
                        .iter()
                        .map(|f| PackStreamValue::String(f.to_string()))
                        .collect();
                    write_message(&mut stream, success(vec![("fields", PackStreamValue::List(fields))])).await;
                    for record in records {
                        write_message(&mut stream, BoltResponse::Record(record)).await;
                    }
                    write_message(&mut stream, success(vec![("has_more", PackStreamValue::Boolean(false))])).await;
                }
                Script::RunFailure(message) => {
                    write_message(
                        &mut stream,
                        BoltResponse::Failure {
                            code: "Neo.ClientError.Statement.SyntaxError".to_string(),
                            message: message.to_string(),
                        },
                    )
                    .await;
                    write_message(&mut stream, BoltResponse::Ignored).await;
                }
                Script::HelloRejected => unreachable!(),
            }
        }

        // Drain until the client hangs up
        while let Some(request) = read_message(&mut stream).await {
            seen.push(request);
        }
        seen
    });

    (address, handle)
}

fn person(id: i64, name: &str) -> PackStreamValue {
    let mut props = PackStreamMap::new();
    props.insert("name".to_string(), PackStreamValue::String(name.to_string()));
    props.insert("age".to_string(), PackStreamValue::Integer(30 + id));
    PackStreamValue::Node(BoltNode {
        id,
        labels: vec!["Person".to_string()],
        properties: Some(props),
        element_id: None,
    })
}

fn knows(id: i64, start_id: i64, end_id: i64) -> PackStreamValue {
    PackStreamValue::Relationship(BoltRelationship {
        id,
        start_id,
        end_id,
        rel_type: "KNOWS".to_string(),
        properties: Some(PackStreamMap::new()),
        element_id: None,
    })
}

#[tokio::test]
async fn test_cypher_run_end_to_end() {
    let (address, server) = serve(Script::Records(vec![
        vec![person(1, "Alice"), knows(10, 1, 2), person(2, "Bob")],
        vec![person(1, "Alice"), knows(11, 1, 3), PackStreamValue::Null],
    ]))
    .await;

    let mut client = CypherClient::new(&format!("bolt://{}", address), "neo4j", "secret").unwrap();
    let mut bindings = Bindings::new();
    bindings.insert("limit".to_string(), serde_json::json!(2));

    let result = client
        .run("MATCH (a)-[r]->(b) RETURN a, r, b LIMIT $limit", &bindings)
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.columns(), vec!["a", "r", "b"]);

    let ids: Vec<&str> = result.graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert!(result.graph.node("3").unwrap().is_placeholder());
    assert_eq!(result.graph.edge_count(), 2);

    let alice = result.graph.node("1").unwrap();
    assert_eq!(alice.label, "Person");
    assert_eq!(alice.get_property("~id"), Some(&Value::from("1")));
    assert_eq!(alice.get_property("age"), Some(&Value::from("31")));

    let knows = result.graph.edge("11").unwrap();
    assert_eq!((knows.source.as_str(), knows.target.as_str()), ("1", "3"));

    drop(client);
    let seen = server.await.unwrap();
    match &seen[0] {
        BoltRequest::Hello { principal, credentials, .. } => {
            assert_eq!(principal, "neo4j");
            assert_eq!(credentials, "secret");
        }
        other => panic!("expected HELLO, got {:?}", other),
    }
    match &seen[1] {
        BoltRequest::Run { parameters, .. } => {
            assert_eq!(parameters.get("limit"), Some(&PackStreamValue::Integer(2)));
        }
        other => panic!("expected RUN, got {:?}", other),
    }
    assert_eq!(seen[2], BoltRequest::Pull { n: -1 });
    assert_eq!(seen.last(), Some(&BoltRequest::Goodbye));
}

#[tokio::test]
async fn test_cypher_failure_keeps_backend_message() {
    let (address, server) = serve(Script::RunFailure("Invalid input 'X'")).await;

    let mut client = CypherClient::new(&format!("bolt://{}", address), "neo4j", "secret").unwrap();
    let err = client.run("X", &Bindings::new()).await.unwrap_err();

    let failure = err.to_failure();
    assert_eq!(failure.status, -1);
    assert_eq!(failure.msg, "Invalid input 'X'");

    let seen = server.await.unwrap();
    assert_eq!(seen.last(), Some(&BoltRequest::Goodbye));
}

#[tokio::test]
async fn test_cypher_rejected_credentials() {
    let (address, server) = serve(Script::HelloRejected).await;

    let mut client = CypherClient::new(&format!("bolt://{}", address), "neo4j", "wrong").unwrap();
    let err = client.run("RETURN 1", &Bindings::new()).await.unwrap_err();

    assert!(matches!(err, QueryError::Authentication(_)));
    assert_eq!(err.status(), 401);
    server.await.unwrap();
}
