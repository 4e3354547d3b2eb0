//! Общий harness для интеграционных тестов Mini App API:
//! in-memory инстанс приложения + подписывание initData.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use sha2::Sha256;
use tempfile::TempDir;
use tower::ServiceExt;

use repka::storage::{create_pool, DbPool, MediaStore};
use repka::telegram::webapp::{create_webapp_router, WebAppState};

pub const TEST_TOKEN: &str = "7000000001:AAtestbottokenfortests";

pub struct TestApp {
    pub router: Router,
    pub pool: Arc<DbPool>,
    _dir: TempDir,
}

/// Поднимает приложение на временной базе и временном media-каталоге.
/// Бот не настроен: модерация в тестах — best-effort no-op.
pub fn test_app() -> TestApp {
    let dir = TempDir::new().expect("tempdir");
    let db_path = dir.path().join("test.sqlite");
    let pool = Arc::new(create_pool(db_path.to_str().unwrap()).expect("pool"));

    let media = MediaStore::new(dir.path().join("media"), "/media");

    let state = WebAppState {
        db_pool: Arc::clone(&pool),
        media,
        bot_token: TEST_TOKEN.to_string(),
        bot: None,
        admin_chat_id: None,
    };

    TestApp {
        router: create_webapp_router(state),
        pool,
        _dir: dir,
    }
}

/// Подписывает пары тем же алгоритмом, что и Telegram.
pub fn sign_init_data(pairs: &[(&str, &str)], bot_token: &str) -> String {
    let mut check_pairs: Vec<String> = pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    check_pairs.sort();
    let data_check_string = check_pairs.join("\n");

    let mut secret_key_mac = Hmac::<Sha256>::new_from_slice(b"WebAppData").unwrap();
    secret_key_mac.update(bot_token.as_bytes());
    let secret_key = secret_key_mac.finalize().into_bytes();

    let mut mac = Hmac::<Sha256>::new_from_slice(&secret_key).unwrap();
    mac.update(data_check_string.as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut encoded: Vec<String> = pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect();
    encoded.push(format!("hash={}", hash));
    encoded.join("&")
}

/// Валидный initData для пользователя с данным telegram_id.
pub fn init_data_for(telegram_id: i64, username: Option<&str>, premium: bool) -> String {
    let username_part = match username {
        Some(u) => format!(r#","username":"{}""#, u),
        None => String::new(),
    };
    let user_json = format!(
        r#"{{"id":{},"first_name":"Тест"{},"is_premium":{}}}"#,
        telegram_id, username_part, premium
    );
    sign_init_data(
        &[("auth_date", "1700000000"), ("user", &user_json)],
        TEST_TOKEN,
    )
}

/// POST JSON на роутер, возвращает (status, JSON body).
pub async fn post_json(
    router: &Router,
    path: &str,
    body: serde_json::Value,
) -> (axum::http::StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value =
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// POST multipart/form-data с полями initData и file.
pub async fn post_media(
    router: &Router,
    init_data: &str,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> (axum::http::StatusCode, serde_json::Value) {
    let boundary = "----repka-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"initData\"\r\n\r\n");
    body.extend_from_slice(init_data.as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            file_name, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri("/api/products/media")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value =
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Синкает профиль и возвращает его внутренний id.
pub async fn sync_profile(router: &Router, telegram_id: i64) -> i64 {
    let (status, body) = post_json(
        router,
        "/api/profile/sync",
        serde_json::json!({ "initData": init_data_for(telegram_id, None, false) }),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::OK, "sync failed: {}", body);
    body["profile"]["id"].as_i64().expect("profile id")
}
