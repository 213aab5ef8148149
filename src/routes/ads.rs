//! Routes for serving, tracking and managing ads and premium ads.

use std::time::Duration;

use chrono::Utc;

use log::warn;

use rand::thread_rng;

use rocket::http::{hyper::header::Location, Status};
use rocket::request::{FromForm, LenientForm};
use rocket::response::Response;
use rocket::{delete, get, post, put, State};

use rocket_contrib::json::Json;

use crate::ads::{select_ad as choose_ad, Rotation, SelectMode};
use crate::config::Config;
use crate::demo::{self, or_demo};
use crate::models::*;
use crate::routes::admin::AdminSession;
use crate::routes::{check_length, check_link};
use crate::views::{ok, ApiResult, ClickThrough, Paginated, RotationView};
use crate::{Error, Result};

pub const MAX_AD_TITLE_LENGTH: usize = 100;

/// Check the fields every ad needs.
fn validate_ad_fields(title: &str, link_url: &str, position: &str, priority: i32) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::MissingField { field: "title" });
    }
    check_length("title", title, MAX_AD_TITLE_LENGTH)?;

    if link_url.trim().is_empty() {
        return Err(Error::MissingField { field: "linkUrl" });
    }
    check_link("linkUrl", link_url)?;

    if position.trim().is_empty() {
        return Err(Error::MissingField { field: "position" });
    }

    check_priority(priority)
}

fn check_priority(priority: i32) -> Result<()> {
    if priority < 0 {
        return Err(Error::InvalidField {
            field: "priority",
            reason: "must not be negative".into(),
        });
    }

    Ok(())
}

/// Check the fields an update changes.
fn validate_ad_changes(
    title: Option<&String>,
    link_url: Option<&String>,
    position: Option<&String>,
    priority: Option<i32>,
) -> Result<()> {
    if let Some(title) = title {
        if title.trim().is_empty() {
            return Err(Error::MissingField { field: "title" });
        }
        check_length("title", title, MAX_AD_TITLE_LENGTH)?;
    }

    if let Some(link_url) = link_url {
        check_link("linkUrl", link_url)?;
    }

    if let Some(position) = position {
        if position.trim().is_empty() {
            return Err(Error::MissingField { field: "position" });
        }
    }

    if let Some(priority) = priority {
        check_priority(priority)?;
    }

    Ok(())
}

/// Answer with a redirect to an ad's link.
fn see_other<'r>(link_url: String) -> Response<'r> {
    let mut res = Response::build();

    res.status(Status::SeeOther);
    res.header(Location(link_url));

    res.finalize()
}

/// Candidates are empty when the ad table doesn't exist yet.
fn or_missing_table<T>(result: Result<Vec<T>>, what: &str) -> Result<Vec<T>> {
    match result {
        Err(ref err) if err.is_missing_table() => {
            warn!("No {} table, serving nothing: {}", what, err);
            Ok(Vec::new())
        }
        result => result,
    }
}

/// Choose an ad to show in a slot, in a category, or both. Counts an
/// impression for the chosen ad.
#[get("/api/ads/select?<position>&<category>&<random>")]
pub fn select_ad(
    position: Option<String>,
    category: Option<CategoryId>,
    random: Option<bool>,
    config: State<Config>,
    db: State<Database>,
) -> ApiResult<Option<Ad>> {
    let position = position.filter(|position| !position.trim().is_empty());

    if position.is_none() && category.is_none() {
        return Err(Error::MissingField { field: "position" });
    }

    let position = position.as_ref().map(String::as_str);
    let now = Utc::now();

    let (candidates, conn) = match db.get() {
        Ok(conn) => (
            conn.ad_candidates(position, category, now, config.ad_candidate_limit),
            Some(conn),
        ),
        Err(err) => (Err(err), None),
    };

    let candidates = or_demo(
        or_missing_table(candidates, "ad"),
        &config,
        "ads",
        || demo::ads_for(position, category),
    )?;

    let selected = choose_ad(
        candidates,
        now,
        SelectMode::from_random_flag(random),
        &mut thread_rng(),
    );

    if let (Some(ad), Some(conn)) = (&selected, &conn) {
        if let Err(err) = conn.record_ad_impression(ad.id) {
            warn!("Couldn't count impression of ad #{}: {}", ad.id, err);
        }
    }

    ok(selected)
}

/// Count an impression of an ad.
#[post("/api/ads/<ad_id>/impression")]
pub fn ad_impression(ad_id: AdId, db: State<Database>) -> ApiResult<()> {
    db.get()?.record_ad_impression(ad_id)?;

    ok(())
}

/// Count a click on an ad, answering with where it goes.
#[post("/api/ads/<ad_id>/click")]
pub fn ad_click(ad_id: AdId, db: State<Database>) -> ApiResult<ClickThrough> {
    ok(ClickThrough {
        link_url: db.get()?.record_ad_click(ad_id)?,
    })
}

/// Count a click on an ad and send the visitor on.
#[get("/go/ad/<ad_id>")]
pub fn ad_redirect<'r>(ad_id: AdId, db: State<Database>) -> Result<Response<'r>> {
    Ok(see_other(db.get()?.record_ad_click(ad_id)?))
}

/// List ads.
#[get("/api/ads?<position>&<category>&<active>&<page>&<limit>")]
#[allow(clippy::too_many_arguments)]
pub fn list_ads(
    position: Option<String>,
    category: Option<CategoryId>,
    active: Option<bool>,
    page: Option<u32>,
    limit: Option<u32>,
    _admin: AdminSession,
    config: State<Config>,
    db: State<Database>,
) -> ApiResult<Paginated<Ad>> {
    let page = Page::from_params(page, limit, &config);
    let filter = AdFilter {
        position,
        category_id: category,
        is_active: active,
    };

    let (ads, total) = db.get()?.ad_page(&filter, page)?;

    ok(Paginated::new(ads, page, total))
}

/// Make a new ad.
#[post("/api/admin/ads", data = "<new_ad>")]
pub fn new_ad(new_ad: Json<NewAd>, _admin: AdminSession, db: State<Database>) -> ApiResult<Ad> {
    validate_ad_fields(&new_ad.title, &new_ad.link_url, &new_ad.position, new_ad.priority)?;

    let conn = db.get()?;

    if let Some(category_id) = new_ad.category_id {
        conn.category(category_id)?;
    }

    ok(conn.insert_ad(&new_ad)?)
}

/// Change an ad.
#[put("/api/admin/ads/<ad_id>", data = "<changes>")]
pub fn update_ad(
    ad_id: AdId,
    changes: Json<AdUpdate>,
    _admin: AdminSession,
    db: State<Database>,
) -> ApiResult<Ad> {
    if changes.is_empty() {
        return Err(Error::NoChanges);
    }

    validate_ad_changes(
        changes.title.as_ref(),
        changes.link_url.as_ref(),
        changes.position.as_ref(),
        changes.priority,
    )?;

    let conn = db.get()?;

    if let Some(Some(category_id)) = changes.category_id {
        conn.category(category_id)?;
    }

    ok(conn.update_ad(ad_id, &changes)?)
}

/// Delete an ad.
#[delete("/api/admin/ads/<ad_id>")]
pub fn delete_ad(ad_id: AdId, _admin: AdminSession, db: State<Database>) -> ApiResult<()> {
    db.get()?.delete_ad(ad_id)?;

    ok(())
}

/// Query for premium ads to serve.
#[derive(Debug, FromForm)]
pub struct PremiumSlotQuery {
    pub position: Option<String>,
    #[form(field = "type")]
    pub ad_type: Option<String>,
    pub random: Option<bool>,
}

/// Query for listing premium ads.
#[derive(Debug, FromForm)]
pub struct PremiumListQuery {
    pub position: Option<String>,
    #[form(field = "type")]
    pub ad_type: Option<String>,
    pub active: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Candidates for a premium slot, falling back to demo ads when allowed.
fn premium_candidates(
    query: &PremiumSlotQuery,
    config: &Config,
    db: &Database,
) -> Result<(Vec<PremiumAd>, Option<PooledConnection>)> {
    let position = crate::routes::required("position", query.position.clone())?;
    let ad_type = query.ad_type.as_ref().map(String::as_str);

    let (candidates, conn) = match db.get() {
        Ok(conn) => (
            conn.premium_ad_candidates(&position, ad_type, Utc::now(), config.ad_candidate_limit),
            Some(conn),
        ),
        Err(err) => (Err(err), None),
    };

    let candidates = or_demo(
        or_missing_table(candidates, "premium ad"),
        config,
        "premium ads",
        || demo::premium_ads_at(&position, ad_type),
    )?;

    Ok((candidates, conn))
}

/// Choose a premium ad to show. Counts an impression for the chosen ad.
#[get("/api/premium-ads/select?<query..>")]
pub fn select_premium_ad(
    query: LenientForm<PremiumSlotQuery>,
    config: State<Config>,
    db: State<Database>,
) -> ApiResult<Option<PremiumAd>> {
    let (candidates, conn) = premium_candidates(&query, &config, &db)?;

    let selected = choose_ad(
        candidates,
        Utc::now(),
        SelectMode::from_random_flag(query.random),
        &mut thread_rng(),
    );

    if let (Some(ad), Some(conn)) = (&selected, &conn) {
        if let Err(err) = conn.record_premium_ad_impression(ad.id) {
            warn!("Couldn't count impression of premium ad #{}: {}", ad.id, err);
        }
    }

    ok(selected)
}

/// The premium ads a rotating unit cycles through, and which one is up now.
#[get("/api/premium-ads/rotation?<query..>")]
pub fn premium_rotation(
    query: LenientForm<PremiumSlotQuery>,
    config: State<Config>,
    db: State<Database>,
) -> ApiResult<RotationView<PremiumAd>> {
    let (candidates, _conn) = premium_candidates(&query, &config, &db)?;

    let now = Utc::now();
    let servable = candidates
        .into_iter()
        .filter(|ad| crate::ads::Placement::is_servable(ad, now))
        .collect();

    let rotation = Rotation::new(servable, *config.ad_rotation_interval);
    let since_epoch = Duration::from_millis(now.timestamp_millis().max(0) as u64);

    ok(RotationView {
        current: rotation.at(since_epoch),
        interval_secs: rotation.interval().as_secs(),
        ads: rotation.into_ads(),
    })
}

/// Count an impression of a premium ad.
#[post("/api/premium-ads/<ad_id>/impression")]
pub fn premium_ad_impression(ad_id: AdId, db: State<Database>) -> ApiResult<()> {
    db.get()?.record_premium_ad_impression(ad_id)?;

    ok(())
}

/// Count a click on a premium ad, answering with where it goes.
#[post("/api/premium-ads/<ad_id>/click")]
pub fn premium_ad_click(ad_id: AdId, db: State<Database>) -> ApiResult<ClickThrough> {
    ok(ClickThrough {
        link_url: db.get()?.record_premium_ad_click(ad_id)?,
    })
}

/// Count a click on a premium ad and send the visitor on.
#[get("/go/premium/<ad_id>")]
pub fn premium_ad_redirect<'r>(ad_id: AdId, db: State<Database>) -> Result<Response<'r>> {
    Ok(see_other(db.get()?.record_premium_ad_click(ad_id)?))
}

/// List premium ads.
#[get("/api/premium-ads?<query..>")]
pub fn list_premium_ads(
    query: LenientForm<PremiumListQuery>,
    _admin: AdminSession,
    config: State<Config>,
    db: State<Database>,
) -> ApiResult<Paginated<PremiumAd>> {
    let query = query.into_inner();
    let page = Page::from_params(query.page, query.limit, &config);
    let filter = PremiumAdFilter {
        position: query.position,
        ad_type: query.ad_type,
        is_active: query.active,
    };

    let (ads, total) = db.get()?.premium_ad_page(&filter, page)?;

    ok(Paginated::new(ads, page, total))
}

/// Make a new premium ad.
#[post("/api/admin/premium-ads", data = "<new_ad>")]
pub fn new_premium_ad(
    new_ad: Json<NewPremiumAd>,
    _admin: AdminSession,
    db: State<Database>,
) -> ApiResult<PremiumAd> {
    validate_ad_fields(&new_ad.title, &new_ad.link_url, &new_ad.position, new_ad.priority)?;

    ok(db.get()?.insert_premium_ad(&new_ad)?)
}

/// Change a premium ad.
#[put("/api/admin/premium-ads/<ad_id>", data = "<changes>")]
pub fn update_premium_ad(
    ad_id: AdId,
    changes: Json<PremiumAdUpdate>,
    _admin: AdminSession,
    db: State<Database>,
) -> ApiResult<PremiumAd> {
    if changes.is_empty() {
        return Err(Error::NoChanges);
    }

    validate_ad_changes(
        changes.title.as_ref(),
        changes.link_url.as_ref(),
        changes.position.as_ref(),
        changes.priority,
    )?;

    ok(db.get()?.update_premium_ad(ad_id, &changes)?)
}

/// Delete a premium ad.
#[delete("/api/admin/premium-ads/<ad_id>")]
pub fn delete_premium_ad(ad_id: AdId, _admin: AdminSession, db: State<Database>) -> ApiResult<()> {
    db.get()?.delete_premium_ad(ad_id)?;

    ok(())
}
