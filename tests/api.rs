//! Requests against a server in demo mode with no database behind it.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;

use rocket::http::{ContentType, Header, Status};
use rocket::local::{Client, LocalResponse};

use serde_json::Value;

use creditboard::config::HumanDuration;
use creditboard::identity::hash_identity;
use creditboard::throttle::LoginThrottle;
use creditboard::{new_instance, Config};

fn client() -> Client {
    let config = Config {
        database_url: "postgres://creditboard@127.0.0.1:1/creditboard".into(),
        database_timeout: HumanDuration(Duration::from_secs(1)),
        demo_mode: true,
        log_file: None,
        ..Config::default()
    };

    let rocket = new_instance(config).expect("demo server should start without a database");
    Client::new(rocket).expect("valid rocket instance")
}

fn json(response: &mut LocalResponse) -> Value {
    let body = response.body_string().expect("response should have a body");
    serde_json::from_str(&body).expect("response should be JSON")
}

#[test]
fn nickname_is_generated() {
    let client = client();
    let mut response = client.get("/api/nickname").dispatch();

    assert_eq!(response.status(), Status::Ok);

    let body = json(&mut response);
    assert_eq!(body["ok"], true);
    assert!(!body["data"]["nickname"].as_str().unwrap_or("").is_empty());
}

#[test]
fn site_info_reports_demo_mode() {
    let client = client();
    let mut response = client.get("/api/site").dispatch();

    assert_eq!(response.status(), Status::Ok);

    let body = json(&mut response);
    assert_eq!(body["data"]["demoMode"], true);
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn long_title_is_a_bad_request() {
    let client = client();
    let post = serde_json::json!({
        "categoryId": 1,
        "title": "가".repeat(201),
        "content": "내용",
    });

    let mut response = client
        .post("/api/posts")
        .header(ContentType::JSON)
        .body(post.to_string())
        .dispatch();

    assert_eq!(response.status(), Status::BadRequest);

    let body = json(&mut response);
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap_or("").contains("title"));
}

#[test]
fn long_comment_is_a_bad_request() {
    let client = client();
    let comment = serde_json::json!({ "content": "a".repeat(1001) });

    let response = client
        .post("/api/posts/1/comments")
        .header(ContentType::JSON)
        .body(comment.to_string())
        .dispatch();

    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn system_chat_messages_need_an_admin() {
    let client = client();
    let message = serde_json::json!({ "message": "공지", "messageType": "system" });

    let response = client
        .post("/api/chat/rooms/1/messages")
        .header(ContentType::JSON)
        .body(message.to_string())
        .dispatch();

    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn demo_posts_are_served() {
    let client = client();
    let mut response = client.get("/api/posts?page=1&limit=2").dispatch();

    assert_eq!(response.status(), Status::Ok);

    let body = json(&mut response);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["data"]["total"], 5);
    assert_eq!(body["data"]["totalPages"], 3);
    assert!(body["data"]["items"][0].get("authorIpHash").is_none());
}

#[test]
fn demo_categories_are_served() {
    let client = client();
    let mut response = client.get("/api/categories").dispatch();

    assert_eq!(response.status(), Status::Ok);

    let body = json(&mut response);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(5));
}

#[test]
fn demo_ad_is_selected() {
    let client = client();
    let mut response = client.get("/api/ads/select?position=sidebar&random=true").dispatch();

    assert_eq!(response.status(), Status::Ok);

    let body = json(&mut response);
    assert_eq!(body["data"]["id"], 1);

    let mut response = client.get("/api/ads/select?position=footer").dispatch();
    let body = json(&mut response);
    assert_eq!(body["ok"], true);
    assert!(body["data"].is_null());
}

#[test]
fn ad_select_works_from_a_category_alone() {
    let client = client();
    let mut response = client.get("/api/ads/select?category=3").dispatch();

    assert_eq!(response.status(), Status::Ok);

    let body = json(&mut response);
    assert_eq!(body["data"]["id"], 1);
}

#[test]
fn ad_select_needs_a_position_or_a_category() {
    let client = client();
    let response = client.get("/api/ads/select").dispatch();

    assert_eq!(response.status(), Status::BadRequest);

    let response = client.get("/api/ads/select?random=true").dispatch();
    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn demo_premium_rotation_is_served() {
    let client = client();
    let mut response = client.get("/api/premium-ads/rotation?position=top&type=banner").dispatch();

    assert_eq!(response.status(), Status::Ok);

    let body = json(&mut response);
    assert_eq!(body["data"]["ads"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["data"]["intervalSecs"], 5);

    let current = body["data"]["current"].as_u64().expect("a current index");
    assert!(current < 3);
}

#[test]
fn other_reads_fail_without_a_database() {
    let client = client();
    let mut response = client.get("/api/posts/1").dispatch();

    assert_eq!(response.status(), Status::InternalServerError);

    let body = json(&mut response);
    assert_eq!(body["error"], "Internal server error");
}

#[test]
fn admin_routes_need_a_session() {
    let client = client();

    let response = client.get("/api/admin/session").dispatch();
    assert_eq!(response.status(), Status::Unauthorized);

    let response = client.delete("/api/admin/ads/1").dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn login_needs_a_password() {
    let client = client();
    let response = client
        .post("/api/admin/login")
        .header(ContentType::JSON)
        .body(r#"{"username":"root"}"#)
        .dispatch();

    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn unknown_route_is_json_not_found() {
    let client = client();
    let mut response = client.get("/api/nothing-here").dispatch();

    assert_eq!(response.status(), Status::NotFound);

    let body = json(&mut response);
    assert_eq!(body["ok"], false);
}

#[test]
fn blocked_clients_are_refused_before_credentials_are_checked() {
    let client = client();
    let peer: SocketAddr = "198.51.100.20:40000".parse().expect("valid address");

    let salt = client
        .rocket()
        .state::<Config>()
        .expect("config is managed")
        .identity_salt
        .clone();
    let key = hash_identity(peer.ip().to_string(), salt).expect("hashable address");

    let throttle = client
        .rocket()
        .state::<LoginThrottle>()
        .expect("throttle is managed");
    for _ in 0..5 {
        throttle.record_failure(&key, Utc::now());
    }

    // A new forwarded address each time doesn't get around the block. Nothing
    // reaches the database, which would fail with a 500 here.
    for i in 1..4 {
        let mut response = client
            .post("/api/admin/login")
            .remote(peer)
            .header(ContentType::JSON)
            .header(Header::new("X-Forwarded-For", format!("10.0.0.{}", i)))
            .body(r#"{"username":"root","password":"guess"}"#)
            .dispatch();

        assert_eq!(response.status(), Status::TooManyRequests);

        let retry_after: i64 = response
            .headers()
            .get_one("Retry-After")
            .and_then(|value| value.parse().ok())
            .expect("a Retry-After header");
        assert!(retry_after > 0 && retry_after <= 15 * 60);

        let body = json(&mut response);
        assert_eq!(body["ok"], false);
    }
}
