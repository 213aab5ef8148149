//! Routes for admin login, and the guard that protects admin routes.

use chrono::Utc;

use log::{info, warn};

use rocket::http::{Cookie, Cookies, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::{get, post, State};

use rocket_contrib::json::Json;

use serde::Deserialize;

use crate::config::Config;
use crate::identity::LoginClient;
use crate::models::{Database, Session};
use crate::throttle::LoginThrottle;
use crate::views::{ok, ApiResult};
use crate::Error;

/// Name of the cookie holding the session ID.
pub const SESSION_COOKIE: &str = "session";

/// A logged in admin.
///
/// The session ID comes from the session cookie, or from an
/// `Authorization: Bearer` header for API clients.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

fn session_token(request: &Request) -> Option<String> {
    if let Some(cookie) = request.cookies().get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    request
        .headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

impl<'a, 'r> FromRequest<'a, 'r> for AdminSession {
    type Error = Error;

    fn from_request(request: &'a Request<'r>) -> Outcome<Self, Self::Error> {
        let token = match session_token(request) {
            Some(token) => token,
            None => return Outcome::Failure((Status::Unauthorized, Error::NotAuthenticated)),
        };

        let db = match request.guard::<State<Database>>() {
            Outcome::Success(db) => db,
            _ => {
                return Outcome::Failure((
                    Status::InternalServerError,
                    Error::StateNotManaged { name: "Database" },
                ))
            }
        };

        match db.get().and_then(|conn| conn.live_session(&token, Utc::now())) {
            Ok(session) => Outcome::Success(AdminSession(session)),
            Err(err) => Outcome::Failure((err.status(), err)),
        }
    }
}

/// Login request data.
#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Log in as an admin.
#[post("/api/admin/login", data = "<login_data>")]
pub fn login(
    login_data: Json<LoginData>,
    client: LoginClient,
    mut cookies: Cookies,
    config: State<Config>,
    throttle: State<LoginThrottle>,
    db: State<Database>,
) -> ApiResult<Session> {
    let login_data = login_data.into_inner();
    let username = super::required("username", login_data.username)?;
    let password = login_data.password.filter(|pass| !pass.is_empty()).ok_or(Error::MissingField {
        field: "password",
    })?;

    let now = Utc::now();

    throttle.check(&client.key, now)?;

    let conn = db.get()?;

    let verified = match conn.admin(&username) {
        Ok(admin) => admin.verify_password(&password)?,
        Err(Error::AdminNotFound { .. }) => false,
        Err(err) => return Err(err),
    };

    if !verified {
        throttle.record_failure(&client.key, now);
        return Err(Error::InvalidCredentials);
    }

    throttle.record_success(&client.key);

    match conn.delete_expired_sessions(now) {
        Ok(0) => {}
        Ok(count) => info!("Cleared {} expired admin sessions", count),
        Err(err) => warn!("Couldn't clear expired admin sessions: {}", err),
    }

    let session = Session::new(username, now + config.session_lifetime.to_chrono()?);
    conn.insert_session(&session)?;

    let session_cookie = Cookie::build(SESSION_COOKIE, session.id.clone())
        .path("/")
        .http_only(true)
        .finish();

    cookies.add(session_cookie);

    ok(session)
}

/// Log out.
#[post("/api/admin/logout")]
pub fn logout(
    admin: AdminSession,
    mut cookies: Cookies,
    db: State<Database>,
) -> ApiResult<()> {
    db.get()?.delete_session(&admin.0.id)?;

    cookies.remove(Cookie::build(SESSION_COOKIE, "").path("/").finish());

    ok(())
}

/// The current admin session.
#[get("/api/admin/session")]
pub fn session(admin: AdminSession) -> ApiResult<Session> {
    ok(admin.0)
}
