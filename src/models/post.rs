//! Types related to posts.

use chrono::offset::Utc;
use chrono::DateTime;

use diesel::pg::Pg;
use diesel::{insert_into, prelude::*, update};

use serde::{Deserialize, Serialize};

use crate::models::{CategoryId, Connection, InnerConnection, Page};
use crate::schema::post;
use crate::{Error, Result};

/// A post ID.
pub type PostId = i32;

/// A user-made post.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// The ID of the post.
    pub id: PostId,
    /// The category the post was made in.
    pub category_id: CategoryId,
    /// The title of the post.
    pub title: String,
    /// The contents of the post.
    pub content: String,
    /// The display name the author posted under.
    pub author_nickname: String,
    /// The identity hash of the author.
    #[serde(skip_serializing, default)]
    pub author_ip_hash: String,
    /// Free-form tags, in the order the author gave them.
    pub tags: Vec<String>,
    /// How many times the post was viewed.
    pub view_count: i32,
    /// How many visitors like the post.
    pub like_count: i32,
    /// How many live comments the post has.
    pub comment_count: i32,
    /// Whether the post is featured as popular.
    pub is_hot: bool,
    /// Whether the post is an announcement.
    pub is_notice: bool,
    /// Whether the post was removed.
    #[serde(skip_serializing, default)]
    pub is_deleted: bool,
    /// When the post was created.
    pub created_at: DateTime<Utc>,
    /// When the post was last changed.
    pub updated_at: DateTime<Utc>,
}

/// A new post to be inserted in the database.
#[derive(Debug, Insertable)]
#[table_name = "post"]
pub struct NewPost {
    pub category_id: CategoryId,
    pub title: String,
    pub content: String,
    pub author_nickname: String,
    pub author_ip_hash: String,
    pub tags: Vec<String>,
}

/// Featured flags an admin can set on a post.
#[derive(Debug, Default, AsChangeset, Deserialize)]
#[table_name = "post"]
#[serde(rename_all = "camelCase")]
pub struct PostFlags {
    pub is_hot: Option<bool>,
    pub is_notice: Option<bool>,
}

impl PostFlags {
    pub fn is_empty(&self) -> bool {
        self.is_hot.is_none() && self.is_notice.is_none()
    }
}

/// Which posts to list.
#[derive(Debug, Default, Clone)]
pub struct PostFilter {
    /// Only posts in this category.
    pub category_id: Option<CategoryId>,
    /// Only posts with this text in the title or content, ignoring case.
    pub search: Option<String>,
}

impl PostFilter {
    /// The `ILIKE` pattern for the search text, if there is any.
    pub fn search_pattern(&self) -> Option<String> {
        self.search
            .as_ref()
            .map(|search| search.trim())
            .filter(|search| !search.is_empty())
            .map(|search| format!("%{}%", escape_like(search)))
    }
}

/// Escape the wildcard characters of a `LIKE` pattern.
fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());

    for c in s.chars() {
        if c == '\\' || c == '%' || c == '_' {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

/// Convenience function to convert from diesel's error type into our error
/// type, when we're querying for a post.
fn conv_post_error(post_id: PostId) -> impl FnOnce(diesel::result::Error) -> Error {
    move |e: diesel::result::Error| match e {
        diesel::result::Error::NotFound => Error::PostNotFound { post_id },
        _ => Error::from(e),
    }
}

/// Live posts matching a filter. Soft-deleted posts never match.
fn filtered_posts(filter: &PostFilter) -> post::BoxedQuery<'static, Pg> {
    use crate::schema::post::columns::{category_id, content, is_deleted, title};
    use crate::schema::post::dsl::post;

    let mut query = post.filter(is_deleted.eq(false)).into_boxed();

    if let Some(category) = filter.category_id {
        query = query.filter(category_id.eq(category));
    }

    if let Some(pattern) = filter.search_pattern() {
        query = query.filter(title.ilike(pattern.clone()).or(content.ilike(pattern)));
    }

    query
}

impl<C: InnerConnection> Connection<C> {
    /// Get a single page of posts, newest first, along with how many posts
    /// match the filter in total.
    pub fn post_page(&self, filter: &PostFilter, page: Page) -> Result<(Vec<Post>, i64)> {
        use crate::schema::post::columns::{created_at, id};

        let total: i64 = filtered_posts(filter).count().get_result(&self.inner)?;

        let posts = filtered_posts(filter)
            .order_by(created_at.desc())
            .then_order_by(id.desc())
            .limit(page.width as i64)
            .offset(page.offset())
            .load(&self.inner)?;

        Ok((posts, total))
    }

    /// Get a live post.
    pub fn post(&self, post_id: PostId) -> Result<Post> {
        use crate::schema::post::columns::{id, is_deleted};
        use crate::schema::post::dsl::post;

        post.filter(id.eq(post_id))
            .filter(is_deleted.eq(false))
            .limit(1)
            .first(&self.inner)
            .map_err(conv_post_error(post_id))
    }

    /// Get a live post for display, counting one more view.
    ///
    /// The view count is bumped in the same statement that reads the post, so
    /// concurrent views are never lost.
    pub fn view_post(&self, post_id: PostId) -> Result<Post> {
        use crate::schema::post::columns::{id, is_deleted, view_count};
        use crate::schema::post::dsl::post;

        update(post.filter(id.eq(post_id)).filter(is_deleted.eq(false)))
            .set(view_count.eq(view_count + 1))
            .get_result(&self.inner)
            .map_err(conv_post_error(post_id))
    }

    /// Insert a new post into the database.
    pub fn insert_post(&self, new_post: NewPost) -> Result<Post> {
        use crate::schema::post::dsl::post;

        Ok(insert_into(post)
            .values(&new_post)
            .get_result(&self.inner)?)
    }

    /// Hide a post from every listing. The row is kept.
    pub fn soft_delete_post(&self, post_id: PostId) -> Result<()> {
        use crate::schema::post::columns::{id, is_deleted, updated_at};
        use crate::schema::post::dsl::post;

        let count = update(post.filter(id.eq(post_id)).filter(is_deleted.eq(false)))
            .set((is_deleted.eq(true), updated_at.eq(Utc::now())))
            .execute(&self.inner)?;

        if count == 0 {
            return Err(Error::PostNotFound { post_id });
        }

        Ok(())
    }

    /// Set the featured flags of a post.
    pub fn set_post_flags(&self, post_id: PostId, flags: &PostFlags) -> Result<Post> {
        use crate::schema::post::columns::{id, is_deleted};
        use crate::schema::post::dsl::post;

        if flags.is_empty() {
            return Err(Error::NoChanges);
        }

        update(post.filter(id.eq(post_id)).filter(is_deleted.eq(false)))
            .set(flags)
            .get_result(&self.inner)
            .map_err(conv_post_error(post_id))
    }

    /// Add `delta` to a post's comment count.
    pub fn add_post_comment_count(&self, post_id: PostId, delta: i32) -> Result<()> {
        use crate::schema::post::columns::{comment_count, id};
        use crate::schema::post::dsl::post;

        update(post.filter(id.eq(post_id)))
            .set(comment_count.eq(comment_count + delta))
            .execute(&self.inner)?;

        Ok(())
    }

    /// Add `delta` to a post's like count, returning the new count.
    pub fn add_post_like_count(&self, post_id: PostId, delta: i32) -> Result<i32> {
        use crate::schema::post::columns::{id, like_count};
        use crate::schema::post::dsl::post;

        update(post.filter(id.eq(post_id)))
            .set(like_count.eq(like_count + delta))
            .returning(like_count)
            .get_result(&self.inner)
            .map_err(conv_post_error(post_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_pattern_escapes_wildcards() {
        let filter = PostFilter {
            category_id: None,
            search: Some(" 100%_done\\ ".into()),
        };

        assert_eq!(
            filter.search_pattern().as_deref(),
            Some("%100\\%\\_done\\\\%")
        );
    }

    #[test]
    fn blank_search_matches_everything() {
        let filter = PostFilter {
            category_id: Some(3),
            search: Some("   ".into()),
        };

        assert_eq!(filter.search_pattern(), None);
    }

    #[test]
    fn empty_flags_are_detected() {
        assert!(PostFlags::default().is_empty());
        assert!(!PostFlags {
            is_hot: Some(true),
            is_notice: None
        }
        .is_empty());
    }

    #[test]
    fn identity_hash_is_not_serialized() -> Result<()> {
        let post = Post {
            id: 1,
            category_id: 1,
            title: "첫 글".into(),
            content: "안녕하세요".into(),
            author_nickname: "행복한고양이".into(),
            author_ip_hash: "deadbeef".into(),
            tags: vec!["개인회생".into()],
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            is_hot: false,
            is_notice: false,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let value = serde_json::to_value(&post)?;

        assert!(value.get("authorIpHash").is_none());
        assert!(value.get("isDeleted").is_none());
        assert_eq!(value["authorNickname"], "행복한고양이");
        assert_eq!(value["tags"][0], "개인회생");

        Ok(())
    }
}
