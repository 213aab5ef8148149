//! Rocket HTTP routes.

use rocket::{get, routes, Route, State};

use crate::config::Config;
use crate::identity::generate_display_name;
use crate::views::{ok, ApiResult, Nickname, SiteInfo};
use crate::{Error, Result};

pub mod admin;
pub mod ads;
pub mod chat;
pub mod posts;

/// Get all routes.
pub fn routes() -> Vec<Route> {
    routes![
        crate::routes::site,
        crate::routes::nickname,
        crate::routes::posts::list_posts,
        crate::routes::posts::get_post,
        crate::routes::posts::new_post,
        crate::routes::posts::delete_post,
        crate::routes::posts::set_post_flags,
        crate::routes::posts::list_comments,
        crate::routes::posts::new_comment,
        crate::routes::posts::delete_comment,
        crate::routes::posts::post_like_status,
        crate::routes::posts::toggle_post_like,
        crate::routes::posts::comment_like_status,
        crate::routes::posts::toggle_comment_like,
        crate::routes::posts::list_categories,
        crate::routes::posts::new_category,
        crate::routes::chat::list_rooms,
        crate::routes::chat::new_room,
        crate::routes::chat::list_messages,
        crate::routes::chat::new_message,
        crate::routes::chat::delete_message,
        crate::routes::ads::select_ad,
        crate::routes::ads::ad_impression,
        crate::routes::ads::ad_click,
        crate::routes::ads::ad_redirect,
        crate::routes::ads::list_ads,
        crate::routes::ads::new_ad,
        crate::routes::ads::update_ad,
        crate::routes::ads::delete_ad,
        crate::routes::ads::select_premium_ad,
        crate::routes::ads::premium_rotation,
        crate::routes::ads::premium_ad_impression,
        crate::routes::ads::premium_ad_click,
        crate::routes::ads::premium_ad_redirect,
        crate::routes::ads::list_premium_ads,
        crate::routes::ads::new_premium_ad,
        crate::routes::ads::update_premium_ad,
        crate::routes::ads::delete_premium_ad,
        crate::routes::admin::login,
        crate::routes::admin::logout,
        crate::routes::admin::session,
    ]
}

/// Public information about the site.
#[get("/api/site")]
pub fn site(config: State<Config>) -> ApiResult<SiteInfo> {
    ok(SiteInfo {
        site_url: config.site_url.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        demo_mode: config.demo_mode,
    })
}

/// Make up a display name for a visitor.
#[get("/api/nickname")]
pub fn nickname() -> ApiResult<Nickname> {
    ok(Nickname {
        nickname: generate_display_name(),
    })
}

/// A required text field, trimmed.
pub(crate) fn required(field: &'static str, value: Option<String>) -> Result<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(Error::MissingField { field })
}

/// Fail if a field is longer than `max` characters.
pub(crate) fn check_length(field: &'static str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(Error::FieldTooLong { field, max });
    }

    Ok(())
}

/// Fail unless a field is an http or https link.
pub(crate) fn check_link(field: &'static str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(());
    }

    Err(Error::InvalidField {
        field,
        reason: "must start with http:// or https://".into(),
    })
}

/// An optional nickname, or a generated one.
pub(crate) fn nickname_field(field: &'static str, value: Option<String>) -> Result<String> {
    let nickname = crate::identity::nickname_or_generated(value);
    check_length(field, &nickname, MAX_NICKNAME_LENGTH)?;
    Ok(nickname)
}

pub(crate) const MAX_NICKNAME_LENGTH: usize = 30;
