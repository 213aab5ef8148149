//! Sample data served in demo mode when the database can't answer.
//!
//! Only a few read paths fall back to this: the post list, the category list,
//! ad selection and premium rotation. Everything else reports the error.

use std::convert::TryFrom;

use chrono::{TimeZone, Utc};

use log::warn;

use crate::config::Config;
use crate::models::{Ad, Category, CategoryId, Page, Post, PostFilter, PremiumAd};
use crate::Result;

/// Use `fixture` in place of a failed result, if the server is in demo mode.
pub fn or_demo<T, F>(result: Result<T>, config: &Config, what: &str, fixture: F) -> Result<T>
where
    F: FnOnce() -> T,
{
    match result {
        Err(err) if config.demo_mode => {
            warn!("Serving demo {} instead of failing: {}", what, err);
            Ok(fixture())
        }
        result => result,
    }
}

/// The sample categories.
pub fn categories() -> Vec<Category> {
    let category = |id: i32, slug: &str, name: &str, description: &str| Category {
        id,
        slug: slug.into(),
        name: name.into(),
        description: description.into(),
        sort_order: id,
    };

    vec![
        category(1, "free", "자유게시판", "무엇이든 이야기해요"),
        category(2, "rehabilitation", "개인회생", "개인회생 절차와 경험 나눔"),
        category(3, "bankruptcy", "개인파산", "파산 신청과 면책 이야기"),
        category(4, "success", "성공후기", "신용회복에 성공한 분들의 후기"),
        category(5, "qna", "질문답변", "궁금한 것을 물어보세요"),
    ]
}

/// The sample posts, newest first.
pub fn posts() -> Vec<Post> {
    let post = |id: i32, category_id: i32, title: &str, content: &str, nickname: &str, tags: &[&str]| {
        let created_at = Utc.ymd(2024, 3, 1).and_hms(9, 0, 0) + chrono::Duration::hours(id as i64);

        Post {
            id,
            category_id,
            title: title.into(),
            content: content.into(),
            author_nickname: nickname.into(),
            author_ip_hash: String::new(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            view_count: 10 * id,
            like_count: id,
            comment_count: 0,
            is_hot: id == 4,
            is_notice: id == 5,
            is_deleted: false,
            created_at,
            updated_at: created_at,
        }
    };

    vec![
        post(
            5,
            1,
            "커뮤니티 이용 안내",
            "서로 존중하는 대화를 부탁드립니다.",
            "운영자",
            &["공지"],
        ),
        post(
            4,
            4,
            "3년 만에 개인회생 변제를 마쳤습니다",
            "포기하지 않으면 끝은 옵니다. 모두 힘내세요.",
            "희망찬햇살12",
            &["개인회생", "후기"],
        ),
        post(
            3,
            5,
            "신용점수는 언제부터 오르나요?",
            "면책 결정 후 신용점수 회복 기간이 궁금합니다.",
            "궁금한다람쥐77",
            &["신용점수"],
        ),
        post(
            2,
            2,
            "개인회생 서류 준비 팁",
            "소득 증빙은 미리 준비해 두면 편합니다.",
            "꾸준한거북이5",
            &["개인회생", "서류"],
        ),
        post(
            1,
            1,
            "처음 인사드립니다",
            "같은 고민을 가진 분들과 이야기하고 싶어요.",
            "따뜻한곰301",
            &[],
        ),
    ]
}

/// A page of sample posts matching a filter, with the total that match.
///
/// The search text is matched without regard to case, like the database does.
pub fn post_page(filter: &PostFilter, page: Page) -> (Vec<Post>, i64) {
    let search = filter
        .search
        .as_ref()
        .map(|search| search.trim().to_lowercase())
        .filter(|search| !search.is_empty());

    let matching: Vec<Post> = posts()
        .into_iter()
        .filter(|post| filter.category_id.map(|id| post.category_id == id).unwrap_or(true))
        .filter(|post| match search {
            Some(ref search) => {
                post.title.to_lowercase().contains(search.as_str())
                    || post.content.to_lowercase().contains(search.as_str())
            }
            None => true,
        })
        .collect();

    let total = matching.len() as i64;

    let items = matching
        .into_iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(page.width as usize)
        .collect();

    (items, total)
}

/// The sample ads.
pub fn ads() -> Vec<Ad> {
    vec![Ad {
        id: 1,
        title: "무료 채무 상담".into(),
        description: "전문 상담사가 채무 조정 방법을 안내해 드립니다.".into(),
        image_url: None,
        link_url: "https://example.com/consult".into(),
        position: "sidebar".into(),
        category_id: None,
        priority: 10,
        is_active: true,
        click_count: 0,
        impressions: 0,
        created_at: Utc.ymd(2024, 3, 1).and_hms(0, 0, 0),
        expires_at: None,
    }]
}

/// The sample ads that could be served at a position and in a category.
pub fn ads_for(position: Option<&str>, category: Option<CategoryId>) -> Vec<Ad> {
    ads()
        .into_iter()
        .filter(|ad| position.map(|p| ad.position == p).unwrap_or(true))
        .filter(|ad| match (category, ad.category_id) {
            (Some(wanted), Some(target)) => wanted == target,
            _ => true,
        })
        .collect()
}

/// The sample premium ads.
pub fn premium_ads() -> Vec<PremiumAd> {
    let premium_ad = |id: i32, title: &str, link_url: &str| PremiumAd {
        id,
        title: title.into(),
        description: String::new(),
        image_url: None,
        link_url: link_url.into(),
        position: "top".into(),
        ad_type: "banner".into(),
        priority: 10 - id,
        is_active: true,
        click_count: 0,
        impressions: 0,
        created_at: Utc.ymd(2024, 3, 1).and_hms(0, 0, 0),
        expires_at: None,
    };

    vec![
        premium_ad(1, "신용회복 무료 진단", "https://example.com/diagnosis"),
        premium_ad(2, "개인회생 전문 법률 상담", "https://example.com/lawyer"),
        premium_ad(3, "재무 설계 클래스", "https://example.com/class"),
    ]
}

/// The sample premium ads that could be served at a position.
pub fn premium_ads_at(position: &str, ad_type: Option<&str>) -> Vec<PremiumAd> {
    premium_ads()
        .into_iter()
        .filter(|ad| ad.position == position)
        .filter(|ad| ad_type.map(|t| ad.ad_type == t).unwrap_or(true))
        .collect()
}
