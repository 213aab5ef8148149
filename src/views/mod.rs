//! Views, the JSON shapes that routes answer with.
//!
//! Every API response is wrapped in an [`Envelope`], successful or not.

use rocket_contrib::json::Json;

use serde::Serialize;

use crate::models::Page;
use crate::Result;

pub mod error;

pub use crate::models::LikeStatus;

/// The wrapper around every API response.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    /// Whether the request succeeded.
    pub ok: bool,
    /// The result of the request, if it succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// What went wrong, if it didn't.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Envelope<T> {
        Envelope {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure<S>(message: S) -> Envelope<T>
    where
        S: Into<String>,
    {
        Envelope {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// What most routes return.
pub type ApiResult<T> = Result<Json<Envelope<T>>>;

/// Wrap a successful result.
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope::success(data)))
}

/// One page of a longer list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: Page, total: i64) -> Paginated<T> {
        Paginated {
            items,
            page: page.num,
            limit: page.width,
            total,
            total_pages: page.count(total),
        }
    }
}

/// Where a click on an ad goes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickThrough {
    pub link_url: String,
}

/// The ads shown by a rotating premium unit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationView<T> {
    pub ads: Vec<T>,
    pub interval_secs: u64,
    /// The index shown right now, if there is anything to show.
    pub current: Option<usize>,
}

/// Public information about the site.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfo {
    pub site_url: String,
    pub version: String,
    pub demo_mode: bool,
}

/// A generated display name.
#[derive(Debug, Clone, Serialize)]
pub struct Nickname {
    pub nickname: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_has_no_error_key() -> Result<()> {
        let value = serde_json::to_value(&Envelope::success(3))?;

        assert_eq!(value["ok"], true);
        assert_eq!(value["data"], 3);
        assert!(value.get("error").is_none());

        Ok(())
    }

    #[test]
    fn failure_has_no_data_key() -> Result<()> {
        let value = serde_json::to_value(&Envelope::<()>::failure("nope"))?;

        assert_eq!(value["ok"], false);
        assert_eq!(value["error"], "nope");
        assert!(value.get("data").is_none());

        Ok(())
    }

    #[test]
    fn pagination_counts_pages() -> Result<()> {
        let paginated = Paginated::new(vec![1; 10], Page { num: 2, width: 10 }, 25);
        let value = serde_json::to_value(&paginated)?;

        assert_eq!(value["items"].as_array().map(Vec::len), Some(10));
        assert_eq!(value["page"], 2);
        assert_eq!(value["limit"], 10);
        assert_eq!(value["total"], 25);
        assert_eq!(value["totalPages"], 3);

        Ok(())
    }
}
