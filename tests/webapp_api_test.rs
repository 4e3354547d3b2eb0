//! Интеграционные тесты Mini App API: весь путь от HTTP-запроса до SQLite.

mod common;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{init_data_for, post_json, post_media, sign_init_data, sync_profile, test_app, TEST_TOKEN};
use repka::storage::{db, get_connection};

#[tokio::test]
async fn health_check_responds() {
    let app = test_app();
    let request = axum::http::Request::builder()
        .uri("/api/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// АУТЕНТИФИКАЦИЯ
// ============================================================================

#[tokio::test]
async fn body_without_init_data_gets_error_envelope() {
    let app = test_app();
    let (status, body) = post_json(&app.router, "/api/profile/sync", json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "body: {}", body);
}

#[tokio::test]
async fn malformed_json_body_gets_error_envelope() {
    let app = test_app();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/reputation/give")
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("not-json{{"))
        .unwrap();

    let response = tower::ServiceExt::oneshot(app.router.clone(), request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string(), "body: {}", body);
}

#[tokio::test]
async fn rejects_init_data_without_hash() {
    let app = test_app();
    let (status, body) = post_json(
        &app.router,
        "/api/profile/sync",
        json!({ "initData": "auth_date=1700000000&user=%7B%22id%22%3A1%7D" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "missing_hash");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn rejects_init_data_signed_by_another_bot() {
    let app = test_app();
    let forged = sign_init_data(
        &[("auth_date", "1700000000"), ("user", r#"{"id":1}"#)],
        "8000000002:AAanotherbot",
    );
    let (status, body) = post_json(&app.router, "/api/profile/sync", json!({ "initData": forged })).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "hash_mismatch");
}

#[tokio::test]
async fn rejects_init_data_without_user() {
    let app = test_app();
    let signed = sign_init_data(&[("auth_date", "1700000000")], TEST_TOKEN);
    let (status, body) = post_json(&app.router, "/api/profile/sync", json!({ "initData": signed })).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "missing_user");
}

// ============================================================================
// СИНХРОНИЗАЦИЯ ПРОФИЛЯ
// ============================================================================

#[tokio::test]
async fn sync_creates_profile_with_zero_counters() {
    let app = test_app();
    let (status, body) = post_json(
        &app.router,
        "/api/profile/sync",
        json!({ "initData": init_data_for(42, Some("ann"), false) }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["telegram_id"], 42);
    assert_eq!(body["profile"]["username"], "ann");
    assert_eq!(body["profile"]["reputation"], 0);
    assert_eq!(body["profile"]["subscription_tier"], "free");
    assert_eq!(body["articlesCount"], 0);
}

#[tokio::test]
async fn sync_is_idempotent_per_telegram_id() {
    let app = test_app();
    let first = sync_profile(&app.router, 42).await;
    let second = sync_profile(&app.router, 42).await;
    assert_eq!(first, second);

    let other = sync_profile(&app.router, 43).await;
    assert_ne!(first, other);
}

// ============================================================================
// СТАТЬИ
// ============================================================================

#[tokio::test]
async fn article_requires_title_and_body() {
    let app = test_app();
    sync_profile(&app.router, 42).await;

    let (status, body) = post_json(
        &app.router,
        "/api/articles",
        json!({
            "initData": init_data_for(42, None, false),
            "article": { "title": "  ", "body": "текст" }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn article_is_created_pending_with_truncated_preview() {
    let app = test_app();
    sync_profile(&app.router, 42).await;

    let long_body = "ы".repeat(300);
    let (status, body) = post_json(
        &app.router,
        "/api/articles",
        json!({
            "initData": init_data_for(42, None, false),
            "article": {
                "title": "Заголовок",
                "body": long_body,
                "mediaUrl": "https://www.youtube.com/watch?v=abc"
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let article = &body["article"];
    assert_eq!(article["status"], "pending");
    assert_eq!(article["media_type"], "youtube");
    assert_eq!(article["preview"].as_str().unwrap().chars().count(), 200);
    assert_eq!(article["allow_comments"], true);
}

#[tokio::test]
async fn article_counts_toward_profile() {
    let app = test_app();
    sync_profile(&app.router, 42).await;

    for i in 0..2 {
        let (status, _) = post_json(
            &app.router,
            "/api/articles",
            json!({
                "initData": init_data_for(42, None, false),
                "article": { "title": format!("Статья {}", i), "body": "текст" }
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = post_json(
        &app.router,
        "/api/profile/sync",
        json!({ "initData": init_data_for(42, None, false) }),
    )
    .await;
    assert_eq!(body["articlesCount"], 2);
}

// ============================================================================
// РЕПУТАЦИЯ
// ============================================================================

#[tokio::test]
async fn reputation_self_grant_is_rejected() {
    let app = test_app();
    let me = sync_profile(&app.router, 42).await;

    let (status, body) = post_json(
        &app.router,
        "/api/reputation/give",
        json!({
            "initData": init_data_for(42, None, false),
            "targetUserId": me,
            "reason": "помог"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Нельзя дать репутацию самому себе");
}

#[tokio::test]
async fn reputation_grant_then_cooldown() {
    let app = test_app();
    sync_profile(&app.router, 42).await;
    let target = sync_profile(&app.router, 43).await;

    let grant = json!({
        "initData": init_data_for(42, Some("ann"), false),
        "targetUserId": target,
        "reason": "отличная статья"
    });

    let (status, body) = post_json(&app.router, "/api/reputation/give", grant.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // Повтор в течение 24 часов отклоняется
    let (status, body) = post_json(&app.router, "/api/reputation/give", grant).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Вы уже давали репутацию этому пользователю за последние 24 часа"
    );
}

#[tokio::test]
async fn reputation_read_returns_counter_and_history() {
    let app = test_app();
    // Display-поля истории берутся из профиля, поэтому отправитель
    // должен быть синхронизирован со своим username
    let (status, _) = post_json(
        &app.router,
        "/api/profile/sync",
        json!({ "initData": init_data_for(42, Some("ann"), false) }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let target = sync_profile(&app.router, 43).await;

    let (status, _) = post_json(
        &app.router,
        "/api/reputation/give",
        json!({
            "initData": init_data_for(42, Some("ann"), false),
            "targetUserId": target,
            "reason": "спасибо"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &app.router,
        "/api/reputation",
        json!({
            "initData": init_data_for(43, None, false),
            "userId": target
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reputation"], 1);
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["value"], 1);
    assert_eq!(history[0]["from_user"]["username"], "ann");
}

#[tokio::test]
async fn reputation_read_unknown_profile_is_404() {
    let app = test_app();
    sync_profile(&app.router, 42).await;

    let (status, _) = post_json(
        &app.router,
        "/api/reputation",
        json!({ "initData": init_data_for(42, None, false), "userId": 999 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reputation_requires_synced_sender_profile() {
    let app = test_app();
    let target = sync_profile(&app.router, 43).await;

    // telegram_id=42 подписан валидно, но профиля ещё нет
    let (status, _) = post_json(
        &app.router,
        "/api/reputation/give",
        json!({
            "initData": init_data_for(42, None, false),
            "targetUserId": target,
            "reason": "спасибо"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// МЕДИА ПРОДУКТОВ
// ============================================================================

fn make_premium(app: &common::TestApp, profile_id: i64) {
    let conn = get_connection(&app.pool).unwrap();
    db::set_subscription_tier(&conn, profile_id, "premium").unwrap();
}

#[tokio::test]
async fn media_upload_requires_premium() {
    let app = test_app();
    sync_profile(&app.router, 42).await;

    let (status, _) = post_media(
        &app.router,
        &init_data_for(42, None, false),
        "photo.png",
        "image/png",
        &[0u8; 16],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn media_upload_rejects_unsupported_mime() {
    let app = test_app();
    let me = sync_profile(&app.router, 42).await;
    make_premium(&app, me);

    let (status, body) = post_media(
        &app.router,
        &init_data_for(42, None, false),
        "movie.mp4",
        "video/mp4",
        &[0u8; 16],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("video/mp4"));
}

#[tokio::test]
async fn media_upload_rejects_oversize_file() {
    let app = test_app();
    let me = sync_profile(&app.router, 42).await;
    make_premium(&app, me);

    let oversize = vec![0u8; 5 * 1024 * 1024 + 1];
    let (status, _) = post_media(
        &app.router,
        &init_data_for(42, None, false),
        "big.png",
        "image/png",
        &oversize,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn media_upload_returns_namespaced_url() {
    let app = test_app();
    let me = sync_profile(&app.router, 42).await;
    make_premium(&app, me);

    let (status, body) = post_media(
        &app.router,
        &init_data_for(42, None, false),
        "photo.webp",
        "image/webp",
        &[1u8; 128],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with(&format!("/media/{}/", me)), "url: {}", url);
    assert!(url.ends_with(".webp"), "url: {}", url);
}

// ============================================================================
// ПРОДУКТЫ
// ============================================================================

#[tokio::test]
async fn product_limit_is_one_per_profile() {
    let app = test_app();
    sync_profile(&app.router, 42).await;

    let create = |title: &str| {
        json!({
            "initData": init_data_for(42, None, false),
            "action": "create",
            "product": { "title": title, "description": "описание", "price": 100.0 }
        })
    };

    let (status, body) = post_json(&app.router, "/api/products", create("Первый")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["product"]["currency"], "RUB");

    let (status, body) = post_json(&app.router, "/api/products", create("Второй")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Можно добавить только один продукт");
}

#[tokio::test]
async fn product_update_and_delete() {
    let app = test_app();
    sync_profile(&app.router, 42).await;

    let (_, body) = post_json(
        &app.router,
        "/api/products",
        json!({
            "initData": init_data_for(42, None, false),
            "action": "create",
            "product": { "title": "Товар", "description": "описание", "price": 100.0 }
        }),
    )
    .await;
    let product_id = body["product"]["id"].as_i64().unwrap();

    let (status, body) = post_json(
        &app.router,
        "/api/products",
        json!({
            "initData": init_data_for(42, None, false),
            "action": "update",
            "productId": product_id,
            "product": { "title": "Товар 2", "description": "новое", "price": 200.0 }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["product"]["title"], "Товар 2");
    assert_eq!(body["product"]["price"], 200.0);

    let (status, body) = post_json(
        &app.router,
        "/api/products",
        json!({
            "initData": init_data_for(42, None, false),
            "action": "delete",
            "productId": product_id
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // Повторное удаление — уже 404
    let (status, _) = post_json(
        &app.router,
        "/api/products",
        json!({
            "initData": init_data_for(42, None, false),
            "action": "delete",
            "productId": product_id
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_update_of_foreign_product_is_404() {
    let app = test_app();
    sync_profile(&app.router, 42).await;
    sync_profile(&app.router, 43).await;

    let (_, body) = post_json(
        &app.router,
        "/api/products",
        json!({
            "initData": init_data_for(42, None, false),
            "action": "create",
            "product": { "title": "Товар", "description": "описание", "price": 100.0 }
        }),
    )
    .await;
    let product_id = body["product"]["id"].as_i64().unwrap();

    // Чужой профиль не видит продукт
    let (status, _) = post_json(
        &app.router,
        "/api/products",
        json!({
            "initData": init_data_for(43, None, false),
            "action": "update",
            "productId": product_id,
            "product": { "title": "Чужой", "description": "описание", "price": 1.0 }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_unknown_action_is_rejected() {
    let app = test_app();
    sync_profile(&app.router, 42).await;

    let (status, _) = post_json(
        &app.router,
        "/api/products",
        json!({ "initData": init_data_for(42, None, false), "action": "archive" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
