//! Requests through the whole server against a real PostgreSQL database.
//!
//! These are ignored by default, and unlike the store tests they commit what
//! they write. Run them against a scratch database with
//! `CREDITBOARD_TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use rocket::http::{ContentType, Header, Status};
use rocket::local::{Client, LocalResponse};

use serde_json::{json, Value};

use creditboard::models::{Admin, NewCategory, SingleConnection};
use creditboard::{new_instance, Config};

const TEST_DATABASE_URL_VAR: &str = "CREDITBOARD_TEST_DATABASE_URL";

fn database_url() -> String {
    std::env::var(TEST_DATABASE_URL_VAR)
        .unwrap_or_else(|_| panic!("{} must be set for flow tests", TEST_DATABASE_URL_VAR))
}

fn client() -> Client {
    let config = Config {
        database_url: database_url(),
        demo_mode: false,
        log_file: None,
        ..Config::default()
    };

    Client::new(new_instance(config).expect("server should start")).expect("valid rocket instance")
}

fn unique(prefix: &str) -> String {
    let suffix: String = thread_rng().sample_iter(&Alphanumeric).take(8).collect();
    format!("{}-{}", prefix, suffix.to_lowercase())
}

fn json(response: &mut LocalResponse) -> Value {
    let body = response.body_string().expect("response should have a body");
    serde_json::from_str(&body).expect("response should be JSON")
}

fn from(address: &str) -> Header<'static> {
    Header::new("X-Forwarded-For", address.to_string())
}

fn new_post(client: &Client, address: &str) -> i64 {
    let conn = SingleConnection::establish(database_url()).expect("database should be up");
    conn.run_migrations().expect("migrations should run");

    let category = conn
        .insert_category(NewCategory {
            slug: unique("flow"),
            name: "흐름 테스트".into(),
            description: String::new(),
            sort_order: 99,
        })
        .expect("category should insert");

    let mut response = client
        .post("/api/posts")
        .header(ContentType::JSON)
        .header(from(address))
        .body(
            json!({
                "categoryId": category.id,
                "title": "지울 글",
                "content": "내용",
            })
            .to_string(),
        )
        .dispatch();

    assert_eq!(response.status(), Status::Ok);
    json(&mut response)["data"]["id"].as_i64().expect("a post id")
}

#[test]
#[ignore]
fn only_the_author_or_an_admin_deletes_a_post() {
    let client = client();

    let post_id = new_post(&client, "198.51.100.1");
    let uri = format!("/api/posts/{}", post_id);

    let response = client.delete(uri.as_str()).header(from("198.51.100.2")).dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let response = client.delete(uri.as_str()).header(from("198.51.100.1")).dispatch();
    assert_eq!(response.status(), Status::Ok);

    let response = client.get(uri.as_str()).dispatch();
    assert_eq!(response.status(), Status::NotFound);

    // An admin may delete anyone's post.
    let post_id = new_post(&client, "198.51.100.3");
    let name = unique("flow-admin");

    let conn = SingleConnection::establish(database_url()).expect("database should be up");
    conn.insert_admin(&Admin::new(name.as_str(), "correct horse").expect("hashable password"))
        .expect("admin should insert");

    let admin = self::client();
    let response = admin
        .post("/api/admin/login")
        .header(ContentType::JSON)
        .body(json!({ "username": name, "password": "correct horse" }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let response = admin
        .delete(format!("/api/posts/{}", post_id))
        .header(from("198.51.100.4"))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    conn.delete_admin(name.as_str()).expect("admin should delete");
}

#[test]
#[ignore]
fn commenting_counts_on_the_post() {
    let client = client();
    let post_id = new_post(&client, "198.51.100.5");
    let comments = format!("/api/posts/{}/comments", post_id);

    let mut response = client
        .post(comments.as_str())
        .header(ContentType::JSON)
        .header(from("198.51.100.6"))
        .body(json!({ "content": "힘내세요" }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let top = json(&mut response)["data"]["id"].as_i64().expect("a comment id");

    let response = client
        .post(comments.as_str())
        .header(ContentType::JSON)
        .header(from("198.51.100.7"))
        .body(json!({ "content": "감사합니다", "parentId": top }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let mut response = client.get(format!("/api/posts/{}", post_id)).dispatch();
    assert_eq!(json(&mut response)["data"]["commentCount"], 2);

    // Deleting the thread takes its reply with it.
    let response = client
        .delete(format!("/api/comments/{}", top))
        .header(from("198.51.100.6"))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let mut response = client.get(format!("/api/posts/{}", post_id)).dispatch();
    assert_eq!(json(&mut response)["data"]["commentCount"], 0);
}
