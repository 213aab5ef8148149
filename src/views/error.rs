//! Error responses for requests that never reach a route, or whose guards
//! fail.

use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{catch, catchers, Catcher, Request};

use rocket_contrib::json::Json;

use crate::views::Envelope;

/// A bare JSON error with a status.
#[derive(Debug)]
pub struct ErrorView {
    pub status: Status,
    pub message: String,
}

impl ErrorView {
    pub fn new<S>(status: Status, message: S) -> ErrorView
    where
        S: Into<String>,
    {
        ErrorView {
            status,
            message: message.into(),
        }
    }
}

impl<'r> Responder<'r> for ErrorView {
    fn respond_to(self, req: &Request) -> response::Result<'r> {
        let mut res = Json(Envelope::<()>::failure(self.message)).respond_to(req)?;
        res.set_status(self.status);
        Ok(res)
    }
}

#[catch(400)]
pub fn bad_request(_req: &Request) -> ErrorView {
    ErrorView::new(Status::BadRequest, "Bad request")
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> ErrorView {
    ErrorView::new(Status::Unauthorized, "Admin login required")
}

#[catch(403)]
pub fn forbidden(_req: &Request) -> ErrorView {
    ErrorView::new(Status::Forbidden, "Forbidden")
}

#[catch(404)]
pub fn not_found(req: &Request) -> ErrorView {
    ErrorView::new(Status::NotFound, format!("Nothing at {}", req.uri().path()))
}

#[catch(422)]
pub fn unprocessable_entity(_req: &Request) -> ErrorView {
    ErrorView::new(Status::UnprocessableEntity, "Malformed request body")
}

#[catch(429)]
pub fn too_many_requests(_req: &Request) -> ErrorView {
    ErrorView::new(Status::TooManyRequests, "Too many requests")
}

#[catch(500)]
pub fn internal_server_error(_req: &Request) -> ErrorView {
    ErrorView::new(Status::InternalServerError, "Internal server error")
}

#[catch(503)]
pub fn service_unavailable(_req: &Request) -> ErrorView {
    ErrorView::new(Status::ServiceUnavailable, "Service unavailable")
}

/// Get all catchers.
pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        unprocessable_entity,
        too_many_requests,
        internal_server_error,
        service_unavailable,
    ]
}
