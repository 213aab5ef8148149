//! Error types.

use log::{error, warn};

use rocket::http::{Header, Status};
use rocket::response::Responder;
use rocket::Request;

use rocket_contrib::json::Json;

use derive_more::{Display, From};

use crate::models::{AdId, ChatMessageId, ChatRoomId, CommentId, PostId};
use crate::views::Envelope;

/// Our error type.
#[derive(Debug, Display, From)]
pub enum Error {
    #[display(fmt = "Missing field '{}'", field)]
    MissingField { field: &'static str },
    #[display(fmt = "Field '{}' is longer than the max of {} characters", field, max)]
    FieldTooLong { field: &'static str, max: usize },
    #[display(fmt = "Invalid value for field '{}': {}", field, reason)]
    InvalidField { field: &'static str, reason: String },
    #[display(fmt = "Category #{} does not exist", category_id)]
    UnknownCategory { category_id: i32 },
    #[display(fmt = "Nothing to update")]
    NoChanges,
    #[display(fmt = "Chat room #{} is closed", room_id)]
    ChatRoomClosed { room_id: ChatRoomId },
    #[display(fmt = "Post #{} not found", post_id)]
    PostNotFound { post_id: PostId },
    #[display(fmt = "Comment #{} not found", comment_id)]
    CommentNotFound { comment_id: CommentId },
    #[display(fmt = "Chat room #{} not found", room_id)]
    ChatRoomNotFound { room_id: ChatRoomId },
    #[display(fmt = "Chat message #{} not found", message_id)]
    ChatMessageNotFound { message_id: ChatMessageId },
    #[display(fmt = "Ad #{} not found", ad_id)]
    AdNotFound { ad_id: AdId },
    #[display(fmt = "Premium ad #{} not found", ad_id)]
    PremiumAdNotFound { ad_id: AdId },
    #[display(fmt = "Only the author or an admin can do that")]
    NotOwner,
    #[display(fmt = "Tried to access an admin resource without authentication")]
    NotAuthenticated,
    #[display(fmt = "Invalid session token")]
    InvalidSession,
    #[display(fmt = "Session expired")]
    ExpiredSession,
    #[display(fmt = "Invalid username or password")]
    InvalidCredentials,
    #[display(fmt = "Too many failed logins, try again in {} seconds", retry_after)]
    LoginBlocked { retry_after: i64 },
    #[display(fmt = "No admin with username '{}'", admin_name)]
    AdminNotFound { admin_name: String },
    #[display(fmt = "The identity salt must be at least 8 bytes long")]
    SaltTooShort,
    #[display(fmt = "Unknown log level '{}'", level)]
    UnknownLogLevel { level: String },
    #[display(fmt = "Server state '{}' is not managed", name)]
    StateNotManaged { name: &'static str },
    #[display(fmt = "Duration out of range: {}", duration)]
    DurationOutOfRange { duration: String },
    #[display(fmt = "Couldn't hash with Argon2: {}", _0)]
    #[from]
    HashError(argon2::Error),
    #[display(fmt = "JSON error: {}", _0)]
    #[from]
    JsonError(serde_json::error::Error),
    #[display(fmt = "YAML error: {}", _0)]
    #[from]
    YamlError(serde_yaml::Error),
    #[display(fmt = "Couldn't initialize logging: {}", _0)]
    #[from]
    LogError(log::SetLoggerError),
    #[display(fmt = "Database connection pool error: {}", _0)]
    #[from]
    R2d2Error(r2d2::Error),
    #[display(fmt = "Database error: {}", _0)]
    #[from]
    DatabaseError(diesel::result::Error),
    #[display(fmt = "Database migration error: {}", _0)]
    #[from]
    DatabaseMigrationError(diesel_migrations::RunMigrationsError),
    #[display(fmt = "Couldn't connect to the PostgreSQL database: {}", _0)]
    #[from]
    ConnectionError(diesel::ConnectionError),
    #[display(fmt = "Server configuration error: {}", _0)]
    #[from]
    RocketConfigError(rocket::config::ConfigError),
    #[display(fmt = "Couldn't launch server: {}", _0)]
    #[from]
    LaunchError(rocket::error::LaunchError),
    #[display(fmt = "I/O error: {}", _0)]
    #[from]
    IoError(std::io::Error),
    #[display(fmt = "I/O error: {}: {}", msg, cause)]
    IoErrorMsg { cause: std::io::Error, msg: String },
}

impl Error {
    pub fn from_io_error<S>(cause: std::io::Error, msg: S) -> Error
    where
        S: Into<String>,
    {
        Error::IoErrorMsg {
            cause,
            msg: msg.into(),
        }
    }

    /// The HTTP status that this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Error::MissingField { .. }
            | Error::FieldTooLong { .. }
            | Error::InvalidField { .. }
            | Error::UnknownCategory { .. }
            | Error::NoChanges
            | Error::ChatRoomClosed { .. } => Status::BadRequest,

            Error::NotAuthenticated
            | Error::InvalidSession
            | Error::ExpiredSession
            | Error::InvalidCredentials => Status::Unauthorized,

            Error::NotOwner => Status::Forbidden,

            Error::PostNotFound { .. }
            | Error::CommentNotFound { .. }
            | Error::ChatRoomNotFound { .. }
            | Error::ChatMessageNotFound { .. }
            | Error::AdNotFound { .. }
            | Error::PremiumAdNotFound { .. } => Status::NotFound,

            Error::LoginBlocked { .. } => Status::TooManyRequests,

            _ => Status::InternalServerError,
        }
    }

    /// Whether this error means a database table is missing.
    pub fn is_missing_table(&self) -> bool {
        match self {
            Error::DatabaseError(diesel::result::Error::DatabaseError(_, info)) => {
                info.message().contains("does not exist")
            }
            _ => false,
        }
    }
}

impl<'r> Responder<'r> for Error {
    fn respond_to(self, req: &Request) -> rocket::response::Result<'r> {
        let status = self.status();

        let message = if status == Status::InternalServerError {
            error!("{}", &self);
            "Internal server error".to_string()
        } else {
            warn!("{}", &self);
            self.to_string()
        };

        let mut res = Json(Envelope::<()>::failure(message)).respond_to(req)?;
        res.set_status(status);

        if let Error::LoginBlocked { retry_after } = self {
            res.set_header(Header::new("Retry-After", retry_after.to_string()));
        }

        Ok(res)
    }
}

impl std::error::Error for Error {}

/// Our result type.
pub type Result<T> = std::result::Result<T, Error>;
