//! Integration tests: run the messaging endpoint against a fake backend (and a fake channel
//! service) on free ports and drive it over HTTP.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use deskbot::app;
use deskbot::config::Config;
use deskbot::gateway::{self, ServerState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Messages the fake backend received, in order.
type Received = Arc<Mutex<Vec<String>>>;

async fn fake_chat(
    State(received): State<Received>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let message = body["message"].as_str().unwrap_or_default().to_string();
    received.lock().unwrap().push(message.clone());
    match message.as_str() {
        "printer" => (
            StatusCode::OK,
            Json(json!({ "type": "incident_created", "sys_id": "INC001", "url": "http://x/INC001" })),
        ),
        "vpn" => (
            StatusCode::OK,
            Json(json!({
                "type": "kb_suggestions",
                "results": [{ "title": "A", "sys_id": "1", "url": "http://a" }]
            })),
        ),
        "nothing" => (
            StatusCode::OK,
            Json(json!({ "type": "kb_suggestions", "results": [] })),
        ),
        "crash" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "boom" })),
        ),
        _ => (StatusCode::OK, Json(json!({ "type": "ack" }))),
    }
}

/// Start a fake backend; returns its base URL and the record of received messages.
async fn start_fake_backend() -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route("/chat", post(fake_chat))
        .route("/health", get(|| async { "ok" }))
        .with_state(received.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake backend");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    (format!("http://{}", addr), received)
}

/// Start the bot endpoint for `config`; returns its base URL.
async fn start_bot(config: Config) -> String {
    let bot = app::build_bot(&config).await;
    let router = gateway::router(ServerState::new(config, bot));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind bot");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

fn config_for(backend_url: &str) -> Config {
    let mut config = Config::default();
    config.backend.base_url = backend_url.to_string();
    config.backend.endpoint = "/chat".to_string();
    config.backend.timeout_ms = 2_000;
    config
}

fn message(conversation: &str, text: &str) -> Value {
    json!({
        "type": "message",
        "id": format!("m-{}", uuid::Uuid::new_v4()),
        "channelId": "msteams",
        "from": { "id": "u1", "name": "Ada" },
        "recipient": { "id": "bot", "name": "Help Bot" },
        "conversation": { "id": conversation },
        "text": text
    })
}

async fn post_activity(bot: &str, activity: &Value) -> (StatusCode, Value) {
    let res = reqwest::Client::new()
        .post(format!("{}/api/messages", bot))
        .json(activity)
        .send()
        .await
        .expect("post activity");
    let status = res.status();
    let body = res.json().await.expect("parse JSON");
    (status, body)
}

fn reply_texts(body: &Value) -> Vec<String> {
    body["replies"]
        .as_array()
        .expect("replies array")
        .iter()
        .filter_map(|r| r["text"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn health_http_reports_backend_status() {
    let (backend_url, _) = start_fake_backend().await;
    let port = free_port();
    let mut config = config_for(&backend_url);
    config.server.port = port;
    config.server.bind = "127.0.0.1".to_string();

    let server_handle = tokio::spawn(async move {
        let _ = gateway::run_server(config).await;
    });

    let url = format!("http://127.0.0.1:{}/", port);
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: Value = resp.json().await.expect("parse JSON");
                assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
                assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));
                assert_eq!(json.get("backend").and_then(|v| v.as_bool()), Some(true));
                server_handle.abort();
                return;
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    server_handle.abort();
    panic!(
        "GET {} did not return 200 with health JSON within 5s; last error: {:?}",
        url, last_err
    );
}

#[tokio::test]
async fn health_reports_unreachable_backend() {
    let config = config_for(&format!("http://127.0.0.1:{}", free_port()));
    let bot = start_bot(config).await;
    let json: Value = reqwest::get(format!("{}/", bot))
        .await
        .expect("get health")
        .json()
        .await
        .expect("parse JSON");
    assert_eq!(json["backend"], false);
}

#[tokio::test]
async fn echoes_and_counts_when_backend_is_down() {
    let config = config_for(&format!("http://127.0.0.1:{}", free_port()));
    let bot = start_bot(config).await;

    let (status, body) = post_activity(&bot, &message("c1", "hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply_texts(&body), vec!["[1] you said: hello"]);

    let (_, body) = post_activity(&bot, &message("c1", "<at>Help Bot</at> again")).await;
    assert_eq!(reply_texts(&body), vec!["[2] you said: again"]);

    let (_, body) = post_activity(&bot, &message("c1", "/count")).await;
    assert_eq!(reply_texts(&body), vec!["The count is 2"]);

    let (_, body) = post_activity(&bot, &message("c1", "/reset")).await;
    assert_eq!(
        reply_texts(&body),
        vec!["Ok I've deleted the current conversation state."]
    );
    let (_, body) = post_activity(&bot, &message("c1", "/count")).await;
    assert_eq!(reply_texts(&body), vec!["The count is 0"]);
}

#[tokio::test]
async fn server_error_falls_back_to_echo() {
    let (backend_url, received) = start_fake_backend().await;
    let bot = start_bot(config_for(&backend_url)).await;
    let (_, body) = post_activity(&bot, &message("c1", "crash")).await;
    assert_eq!(reply_texts(&body), vec!["[1] you said: crash"]);
    assert_eq!(*received.lock().unwrap(), vec!["crash".to_string()]);
}

#[tokio::test]
async fn incident_created_notice() {
    let (backend_url, _) = start_fake_backend().await;
    let bot = start_bot(config_for(&backend_url)).await;
    let (_, body) = post_activity(&bot, &message("c1", "printer")).await;
    let texts = reply_texts(&body);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("INC001"));
    assert!(texts[0].contains("http://x/INC001"));
}

#[tokio::test]
async fn kb_card_then_article_selection() {
    let (backend_url, received) = start_fake_backend().await;
    let bot = start_bot(config_for(&backend_url)).await;

    let (_, body) = post_activity(&bot, &message("c1", "vpn")).await;
    let replies = body["replies"].as_array().expect("replies");
    assert_eq!(replies.len(), 1);
    let attachment = &replies[0]["attachments"][0];
    assert_eq!(
        attachment["contentType"],
        "application/vnd.microsoft.card.adaptive"
    );
    assert_eq!(replies[0]["from"]["id"], "bot");
    assert_eq!(replies[0]["recipient"]["id"], "u1");
    let submit = attachment["content"]["body"][1]["items"][1]["actions"][0]["data"].clone();
    assert_eq!(
        submit,
        json!({ "action": "select_article", "articleId": "1", "articleTitle": "A" })
    );

    let mut selection = message("c1", "");
    selection.as_object_mut().unwrap().remove("text");
    selection["value"] = submit;
    let (_, body) = post_activity(&bot, &selection).await;
    assert_eq!(reply_texts(&body), vec!["Marked as resolved. Thanks!"]);
    assert_eq!(
        *received.lock().unwrap(),
        vec!["vpn".to_string(), "1".to_string()]
    );
}

#[tokio::test]
async fn empty_kb_results_send_plain_notice() {
    let (backend_url, _) = start_fake_backend().await;
    let bot = start_bot(config_for(&backend_url)).await;
    let (_, body) = post_activity(&bot, &message("c1", "nothing")).await;
    assert_eq!(reply_texts(&body), vec!["No knowledge base articles found."]);
}

#[tokio::test]
async fn non_message_and_malformed_activities() {
    let config = config_for(&format!("http://127.0.0.1:{}", free_port()));
    let bot = start_bot(config).await;

    let update = json!({ "type": "conversationUpdate", "conversation": { "id": "c1" } });
    let (status, body) = post_activity(&bot, &update).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replies"], json!([]));

    let res = reqwest::Client::new()
        .post(format!("{}/api/messages", bot))
        .body("not json")
        .send()
        .await
        .expect("post");
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

/// Fake channel service: records (conversation, reply-to id, body, auth header) for each reply.
type Delivered = Arc<Mutex<Vec<(String, String, Value, Option<String>)>>>;

async fn fake_reply(
    State(delivered): State<Delivered>,
    Path((conversation, activity_id)): Path<(String, String)>,
    headers: axum::http::HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    delivered
        .lock()
        .unwrap()
        .push((conversation, activity_id, body, auth));
    Json(json!({ "id": "reply-1" }))
}

#[tokio::test]
async fn replies_go_through_connector_when_service_url_is_set() {
    let delivered: Delivered = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route(
            "/v3/conversations/:conversation/activities/:id",
            post(fake_reply),
        )
        .with_state(delivered.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind channel service");
    let service_url = format!("http://{}/", listener.local_addr().expect("local_addr"));
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let mut config = config_for(&format!("http://127.0.0.1:{}", free_port()));
    config.bot.connector_token = Some("tok".to_string());
    let bot = start_bot(config).await;

    let mut activity = message("c9", "hello");
    activity["id"] = json!("m-42");
    activity["serviceUrl"] = json!(service_url);
    let (status, body) = post_activity(&bot, &activity).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replies"], json!([]));

    let delivered = delivered.lock().unwrap().clone();
    assert_eq!(delivered.len(), 1);
    let (conversation, reply_to, reply, auth) = &delivered[0];
    assert_eq!(conversation, "c9");
    assert_eq!(reply_to, "m-42");
    assert_eq!(reply["text"], "[1] you said: hello");
    assert_eq!(reply["replyToId"], "m-42");
    assert_eq!(auth.as_deref(), Some("Bearer tok"));
}

async fn start_channel_service(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind channel service");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

/// Form fields of every token request the fake identity endpoint received.
type TokenRequests = Arc<Mutex<Vec<std::collections::HashMap<String, String>>>>;

#[tokio::test]
async fn connector_uses_client_credentials_token() {
    let delivered: Delivered = Arc::new(Mutex::new(Vec::new()));
    let token_requests: TokenRequests = Arc::new(Mutex::new(Vec::new()));
    let requests = token_requests.clone();
    let router = Router::new()
        .route(
            "/v3/conversations/:conversation/activities/:id",
            post(fake_reply),
        )
        .with_state(delivered.clone())
        .route(
            "/token",
            post(
                move |axum::Form(form): axum::Form<std::collections::HashMap<String, String>>| {
                    let requests = requests.clone();
                    async move {
                        requests.lock().unwrap().push(form);
                        Json(json!({ "token_type": "Bearer", "access_token": "minted", "expires_in": 3600 }))
                    }
                },
            ),
        );
    let service_url = start_channel_service(router).await;

    let mut config = config_for(&format!("http://127.0.0.1:{}", free_port()));
    config.bot.app_id = Some("app-id".to_string());
    config.bot.app_password = Some("app-secret".to_string());
    config.bot.token_endpoint = Some(format!("{}/token", service_url));
    let bot = start_bot(config).await;

    for text in ["one", "two"] {
        let mut activity = message("19:room@thread.skype", text);
        activity["serviceUrl"] = json!(service_url);
        let (status, _) = post_activity(&bot, &activity).await;
        assert_eq!(status, StatusCode::OK);
    }

    let delivered = delivered.lock().unwrap().clone();
    assert_eq!(delivered.len(), 2);
    for (conversation, _, _, auth) in &delivered {
        assert_eq!(conversation, "19:room@thread.skype");
        assert_eq!(auth.as_deref(), Some("Bearer minted"));
    }

    let token_requests = token_requests.lock().unwrap().clone();
    assert_eq!(token_requests.len(), 1);
    assert_eq!(token_requests[0]["grant_type"], "client_credentials");
    assert_eq!(token_requests[0]["client_id"], "app-id");
    assert_eq!(token_requests[0]["client_secret"], "app-secret");
    assert_eq!(
        token_requests[0]["scope"],
        "https://api.botframework.com/.default"
    );
}

#[tokio::test]
async fn hung_channel_service_does_not_stall_the_request() {
    let router = Router::new().route(
        "/v3/conversations/:conversation/activities/:id",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Json(json!({}))
        }),
    );
    let service_url = start_channel_service(router).await;

    let mut config = config_for(&format!("http://127.0.0.1:{}", free_port()));
    config.bot.connector_timeout_ms = 200;
    let bot = start_bot(config).await;

    let mut activity = message("c1", "hello");
    activity["serviceUrl"] = json!(service_url);
    let (status, body) = tokio::time::timeout(Duration::from_secs(5), post_activity(&bot, &activity))
        .await
        .expect("request finished despite the hung channel service");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replies"], json!([]));
}
