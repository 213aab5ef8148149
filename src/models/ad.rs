//! Types related to ads and premium ads.
//!
//! Both kinds of ad share the same lifecycle: an admin creates one, it is
//! served while active and unexpired, and every impression and click is
//! counted. Premium ads have a type instead of category targeting.

use chrono::offset::Utc;
use chrono::DateTime;

use diesel::pg::Pg;
use diesel::{delete, insert_into, prelude::*, update};

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{CategoryId, Connection, InnerConnection, Page};
use crate::schema::{ad, premium_ad};
use crate::{Error, Result};

/// An ad ID. Ads and premium ads number separately.
pub type AdId = i32;

/// An ad.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ad {
    pub id: AdId,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    /// Where a click sends the visitor.
    pub link_url: String,
    /// The slot on the page the ad is shown in, like "sidebar".
    pub position: String,
    /// Only show the ad in this category. Untargeted ads show everywhere.
    pub category_id: Option<CategoryId>,
    /// Higher priority ads are preferred.
    pub priority: i32,
    pub is_active: bool,
    pub click_count: i32,
    pub impressions: i32,
    pub created_at: DateTime<Utc>,
    /// The ad isn't served from this point on.
    pub expires_at: Option<DateTime<Utc>>,
}

/// A new ad to be inserted in the database.
#[derive(Debug, Insertable, Deserialize)]
#[table_name = "ad"]
#[serde(rename_all = "camelCase")]
pub struct NewAd {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub link_url: String,
    #[serde(default)]
    pub position: String,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Changes to an ad. Missing fields are left alone, and fields that can be
/// empty are cleared with an explicit `null`.
#[derive(Debug, Default, AsChangeset, Deserialize)]
#[table_name = "ad"]
#[serde(rename_all = "camelCase")]
pub struct AdUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: Option<Option<String>>,
    pub link_url: Option<String>,
    pub position: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<CategoryId>>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl AdUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
            && self.link_url.is_none()
            && self.position.is_none()
            && self.category_id.is_none()
            && self.priority.is_none()
            && self.is_active.is_none()
            && self.expires_at.is_none()
    }
}

/// Which ads to list.
#[derive(Debug, Default, Clone)]
pub struct AdFilter {
    pub position: Option<String>,
    pub category_id: Option<CategoryId>,
    pub is_active: Option<bool>,
}

/// A premium ad.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumAd {
    pub id: AdId,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub link_url: String,
    pub position: String,
    /// The kind of unit, like "banner" or "popup".
    pub ad_type: String,
    pub priority: i32,
    pub is_active: bool,
    pub click_count: i32,
    pub impressions: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A new premium ad to be inserted in the database.
#[derive(Debug, Insertable, Deserialize)]
#[table_name = "premium_ad"]
#[serde(rename_all = "camelCase")]
pub struct NewPremiumAd {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub link_url: String,
    #[serde(default)]
    pub position: String,
    #[serde(rename = "type", default = "default_ad_type")]
    pub ad_type: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Changes to a premium ad, read like `AdUpdate`.
#[derive(Debug, Default, AsChangeset, Deserialize)]
#[table_name = "premium_ad"]
#[serde(rename_all = "camelCase")]
pub struct PremiumAdUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: Option<Option<String>>,
    pub link_url: Option<String>,
    pub position: Option<String>,
    #[serde(rename = "type")]
    pub ad_type: Option<String>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl PremiumAdUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
            && self.link_url.is_none()
            && self.position.is_none()
            && self.ad_type.is_none()
            && self.priority.is_none()
            && self.is_active.is_none()
            && self.expires_at.is_none()
    }
}

/// Which premium ads to list.
#[derive(Debug, Default, Clone)]
pub struct PremiumAdFilter {
    pub position: Option<String>,
    pub ad_type: Option<String>,
    pub is_active: Option<bool>,
}

/// Read a field that may be `null`, so that a present `null` is told apart
/// from a missing field.
fn nullable<'de, D, T>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

fn default_active() -> bool {
    true
}

fn default_ad_type() -> String {
    "banner".into()
}

fn conv_ad_error(ad_id: AdId) -> impl FnOnce(diesel::result::Error) -> Error {
    move |e: diesel::result::Error| match e {
        diesel::result::Error::NotFound => Error::AdNotFound { ad_id },
        _ => Error::from(e),
    }
}

fn conv_premium_ad_error(ad_id: AdId) -> impl FnOnce(diesel::result::Error) -> Error {
    move |e: diesel::result::Error| match e {
        diesel::result::Error::NotFound => Error::PremiumAdNotFound { ad_id },
        _ => Error::from(e),
    }
}

fn filtered_ads(filter: &AdFilter) -> ad::BoxedQuery<'static, Pg> {
    use crate::schema::ad::columns::{category_id, is_active, position};
    use crate::schema::ad::dsl::ad;

    let mut query = ad.into_boxed();

    if let Some(ref wanted) = filter.position {
        query = query.filter(position.eq(wanted.clone()));
    }

    if let Some(category) = filter.category_id {
        query = query.filter(category_id.eq(category));
    }

    if let Some(active) = filter.is_active {
        query = query.filter(is_active.eq(active));
    }

    query
}

fn filtered_premium_ads(filter: &PremiumAdFilter) -> premium_ad::BoxedQuery<'static, Pg> {
    use crate::schema::premium_ad::columns::{ad_type, is_active, position};
    use crate::schema::premium_ad::dsl::premium_ad;

    let mut query = premium_ad.into_boxed();

    if let Some(ref wanted) = filter.position {
        query = query.filter(position.eq(wanted.clone()));
    }

    if let Some(ref wanted) = filter.ad_type {
        query = query.filter(ad_type.eq(wanted.clone()));
    }

    if let Some(active) = filter.is_active {
        query = query.filter(is_active.eq(active));
    }

    query
}

impl<C: InnerConnection> Connection<C> {
    /// Get the ads that could be served right now, best first.
    ///
    /// Without a position, ads in any slot qualify. With a category, ads
    /// targeted at it and untargeted ads both qualify.
    pub fn ad_candidates(
        &self,
        wanted_position: Option<&str>,
        category: Option<CategoryId>,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Ad>> {
        use crate::schema::ad::columns::{
            category_id, created_at, expires_at, is_active, position, priority,
        };
        use crate::schema::ad::dsl::ad;

        let mut query = ad
            .filter(is_active.eq(true))
            .filter(expires_at.is_null().or(expires_at.gt(now)))
            .into_boxed();

        if let Some(wanted_position) = wanted_position {
            query = query.filter(position.eq(wanted_position.to_string()));
        }

        if let Some(category) = category {
            query = query.filter(category_id.eq(category).or(category_id.is_null()));
        }

        Ok(query
            .order_by(priority.desc())
            .then_order_by(created_at.desc())
            .limit(limit as i64)
            .load(&self.inner)?)
    }

    /// Get an ad.
    pub fn ad(&self, ad_id: AdId) -> Result<Ad> {
        use crate::schema::ad::columns::id;
        use crate::schema::ad::dsl::ad;

        ad.filter(id.eq(ad_id))
            .limit(1)
            .first(&self.inner)
            .map_err(conv_ad_error(ad_id))
    }

    /// Get a single page of ads, newest first, with the total that match.
    pub fn ad_page(&self, filter: &AdFilter, page: Page) -> Result<(Vec<Ad>, i64)> {
        use crate::schema::ad::columns::{created_at, id};

        let total: i64 = filtered_ads(filter).count().get_result(&self.inner)?;

        let ads = filtered_ads(filter)
            .order_by(created_at.desc())
            .then_order_by(id.desc())
            .limit(page.width as i64)
            .offset(page.offset())
            .load(&self.inner)?;

        Ok((ads, total))
    }

    /// Count one more impression of an ad.
    pub fn record_ad_impression(&self, ad_id: AdId) -> Result<()> {
        use crate::schema::ad::columns::{id, impressions};
        use crate::schema::ad::dsl::ad;

        let count = update(ad.filter(id.eq(ad_id)))
            .set(impressions.eq(impressions + 1))
            .execute(&self.inner)?;

        if count == 0 {
            return Err(Error::AdNotFound { ad_id });
        }

        Ok(())
    }

    /// Count one more click on an ad, returning where the click goes.
    pub fn record_ad_click(&self, ad_id: AdId) -> Result<String> {
        use crate::schema::ad::columns::{click_count, id, link_url};
        use crate::schema::ad::dsl::ad;

        update(ad.filter(id.eq(ad_id)))
            .set(click_count.eq(click_count + 1))
            .returning(link_url)
            .get_result(&self.inner)
            .map_err(conv_ad_error(ad_id))
    }

    /// Insert a new ad.
    pub fn insert_ad(&self, new_ad: &NewAd) -> Result<Ad> {
        use crate::schema::ad::dsl::ad;

        Ok(insert_into(ad).values(new_ad).get_result(&self.inner)?)
    }

    /// Change some fields of an ad.
    pub fn update_ad(&self, ad_id: AdId, changes: &AdUpdate) -> Result<Ad> {
        use crate::schema::ad::columns::id;
        use crate::schema::ad::dsl::ad;

        if changes.is_empty() {
            return Err(Error::NoChanges);
        }

        update(ad.filter(id.eq(ad_id)))
            .set(changes)
            .get_result(&self.inner)
            .map_err(conv_ad_error(ad_id))
    }

    /// Delete an ad for good.
    pub fn delete_ad(&self, ad_id: AdId) -> Result<()> {
        use crate::schema::ad::columns::id;
        use crate::schema::ad::dsl::ad;

        let count = delete(ad.filter(id.eq(ad_id))).execute(&self.inner)?;

        if count == 0 {
            return Err(Error::AdNotFound { ad_id });
        }

        Ok(())
    }

    /// Get the premium ads that could be served at a position right now, best
    /// first, optionally only of one type.
    pub fn premium_ad_candidates(
        &self,
        wanted_position: &str,
        wanted_type: Option<&str>,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<PremiumAd>> {
        use crate::schema::premium_ad::columns::{
            ad_type, created_at, expires_at, is_active, position, priority,
        };
        use crate::schema::premium_ad::dsl::premium_ad;

        let mut query = premium_ad
            .filter(is_active.eq(true))
            .filter(position.eq(wanted_position.to_string()))
            .filter(expires_at.is_null().or(expires_at.gt(now)))
            .into_boxed();

        if let Some(wanted_type) = wanted_type {
            query = query.filter(ad_type.eq(wanted_type.to_string()));
        }

        Ok(query
            .order_by(priority.desc())
            .then_order_by(created_at.desc())
            .limit(limit as i64)
            .load(&self.inner)?)
    }

    /// Get a premium ad.
    pub fn premium_ad(&self, ad_id: AdId) -> Result<PremiumAd> {
        use crate::schema::premium_ad::columns::id;
        use crate::schema::premium_ad::dsl::premium_ad;

        premium_ad
            .filter(id.eq(ad_id))
            .limit(1)
            .first(&self.inner)
            .map_err(conv_premium_ad_error(ad_id))
    }

    /// Get a single page of premium ads, newest first, with the total that
    /// match.
    pub fn premium_ad_page(
        &self,
        filter: &PremiumAdFilter,
        page: Page,
    ) -> Result<(Vec<PremiumAd>, i64)> {
        use crate::schema::premium_ad::columns::{created_at, id};

        let total: i64 = filtered_premium_ads(filter)
            .count()
            .get_result(&self.inner)?;

        let ads = filtered_premium_ads(filter)
            .order_by(created_at.desc())
            .then_order_by(id.desc())
            .limit(page.width as i64)
            .offset(page.offset())
            .load(&self.inner)?;

        Ok((ads, total))
    }

    /// Count one more impression of a premium ad.
    pub fn record_premium_ad_impression(&self, ad_id: AdId) -> Result<()> {
        use crate::schema::premium_ad::columns::{id, impressions};
        use crate::schema::premium_ad::dsl::premium_ad;

        let count = update(premium_ad.filter(id.eq(ad_id)))
            .set(impressions.eq(impressions + 1))
            .execute(&self.inner)?;

        if count == 0 {
            return Err(Error::PremiumAdNotFound { ad_id });
        }

        Ok(())
    }

    /// Count one more click on a premium ad, returning where the click goes.
    pub fn record_premium_ad_click(&self, ad_id: AdId) -> Result<String> {
        use crate::schema::premium_ad::columns::{click_count, id, link_url};
        use crate::schema::premium_ad::dsl::premium_ad;

        update(premium_ad.filter(id.eq(ad_id)))
            .set(click_count.eq(click_count + 1))
            .returning(link_url)
            .get_result(&self.inner)
            .map_err(conv_premium_ad_error(ad_id))
    }

    /// Insert a new premium ad.
    pub fn insert_premium_ad(&self, new_ad: &NewPremiumAd) -> Result<PremiumAd> {
        use crate::schema::premium_ad::dsl::premium_ad;

        Ok(insert_into(premium_ad)
            .values(new_ad)
            .get_result(&self.inner)?)
    }

    /// Change some fields of a premium ad.
    pub fn update_premium_ad(&self, ad_id: AdId, changes: &PremiumAdUpdate) -> Result<PremiumAd> {
        use crate::schema::premium_ad::columns::id;
        use crate::schema::premium_ad::dsl::premium_ad;

        if changes.is_empty() {
            return Err(Error::NoChanges);
        }

        update(premium_ad.filter(id.eq(ad_id)))
            .set(changes)
            .get_result(&self.inner)
            .map_err(conv_premium_ad_error(ad_id))
    }

    /// Delete a premium ad for good.
    pub fn delete_premium_ad(&self, ad_id: AdId) -> Result<()> {
        use crate::schema::premium_ad::columns::id;
        use crate::schema::premium_ad::dsl::premium_ad;

        let count = delete(premium_ad.filter(id.eq(ad_id))).execute(&self.inner)?;

        if count == 0 {
            return Err(Error::PremiumAdNotFound { ad_id });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ad_defaults() -> Result<()> {
        let new_ad: NewAd = serde_json::from_str(
            r#"{"title":"무료 상담","linkUrl":"https://example.com","position":"sidebar"}"#,
        )?;

        assert!(new_ad.is_active);
        assert_eq!(new_ad.priority, 0);
        assert_eq!(new_ad.category_id, None);
        assert_eq!(new_ad.description, "");

        Ok(())
    }

    #[test]
    fn premium_ad_type_is_read_from_type() -> Result<()> {
        let new_ad: NewPremiumAd = serde_json::from_str(
            r#"{"title":"x","linkUrl":"https://example.com","position":"top","type":"popup"}"#,
        )?;
        assert_eq!(new_ad.ad_type, "popup");

        let new_ad: NewPremiumAd = serde_json::from_str(
            r#"{"title":"x","linkUrl":"https://example.com","position":"top"}"#,
        )?;
        assert_eq!(new_ad.ad_type, "banner");

        Ok(())
    }

    #[test]
    fn null_clears_and_missing_keeps() -> Result<()> {
        let changes: AdUpdate = serde_json::from_str(
            r#"{"expiresAt":null,"categoryId":null,"imageUrl":"https://example.com/a.png"}"#,
        )?;

        assert_eq!(changes.expires_at, Some(None));
        assert_eq!(changes.category_id, Some(None));
        assert_eq!(changes.image_url, Some(Some("https://example.com/a.png".into())));
        assert_eq!(changes.title, None);
        assert!(!changes.is_empty());

        let changes: PremiumAdUpdate = serde_json::from_str(r#"{"imageUrl":null}"#)?;
        assert_eq!(changes.image_url, Some(None));
        assert_eq!(changes.expires_at, None);

        Ok(())
    }

    #[test]
    fn empty_updates_are_detected() -> Result<()> {
        let changes: AdUpdate = serde_json::from_str("{}")?;
        assert!(changes.is_empty());

        let changes: PremiumAdUpdate = serde_json::from_str(r#"{"priority":3}"#)?;
        assert!(!changes.is_empty());

        Ok(())
    }
}
