//! Routes for posts, comments, likes and categories.

use log::error;

use rocket::{delete, get, post, put, State};

use rocket_contrib::json::Json;

use serde::Deserialize;

use crate::config::Config;
use crate::demo::{self, or_demo};
use crate::identity::Visitor;
use crate::models::*;
use crate::routes::admin::AdminSession;
use crate::routes::{check_length, nickname_field, required};
use crate::views::{ok, ApiResult, Paginated};
use crate::{Error, Result};

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_COMMENT_LENGTH: usize = 1000;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LENGTH: usize = 30;

/// New post request data.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPostData {
    pub category_id: Option<CategoryId>,
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(alias = "nickname")]
    pub author_nickname: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl NewPostData {
    /// Check the request and turn it into a post by the given visitor.
    pub fn validate(self, author_ip_hash: String) -> Result<NewPost> {
        let category_id = self.category_id.ok_or(Error::MissingField {
            field: "categoryId",
        })?;

        let title = required("title", self.title)?;
        check_length("title", &title, MAX_TITLE_LENGTH)?;

        let content = required("content", self.content)?;

        let author_nickname = nickname_field("authorNickname", self.author_nickname)?;

        let tags = normalize_tags(self.tags.unwrap_or_default())?;

        Ok(NewPost {
            category_id,
            title,
            content,
            author_nickname,
            author_ip_hash,
            tags,
        })
    }
}

/// Trim tags and drop blank ones, then check the limits.
pub fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>> {
    let tags: Vec<String> = tags
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();

    if tags.len() > MAX_TAGS {
        return Err(Error::InvalidField {
            field: "tags",
            reason: format!("at most {} tags are allowed", MAX_TAGS),
        });
    }

    for tag in &tags {
        check_length("tags", tag, MAX_TAG_LENGTH)?;
    }

    Ok(tags)
}

/// List posts, newest first.
#[get("/api/posts?<category>&<search>&<page>&<limit>")]
pub fn list_posts(
    category: Option<CategoryId>,
    search: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
    config: State<Config>,
    db: State<Database>,
) -> ApiResult<Paginated<Post>> {
    let page = Page::from_params(page, limit, &config);
    let filter = PostFilter {
        category_id: category,
        search,
    };

    let (posts, total) = or_demo(
        db.get().and_then(|conn| conn.post_page(&filter, page)),
        &config,
        "posts",
        || demo::post_page(&filter, page),
    )?;

    ok(Paginated::new(posts, page, total))
}

/// Read a post. Every read counts as a view.
#[get("/api/posts/<post_id>")]
pub fn get_post(post_id: PostId, db: State<Database>) -> ApiResult<Post> {
    ok(db.get()?.view_post(post_id)?)
}

/// Make a new post.
#[post("/api/posts", data = "<post_data>")]
pub fn new_post(
    post_data: Json<NewPostData>,
    visitor: Visitor,
    db: State<Database>,
) -> ApiResult<Post> {
    let new_post = post_data.into_inner().validate(visitor.ip_hash)?;

    let conn = db.get()?;
    conn.category(new_post.category_id)?;

    ok(conn.insert_post(new_post)?)
}

/// Only the author of something, or an admin, may delete it.
fn check_owner(author_ip_hash: &str, visitor: &Visitor, admin: Option<&AdminSession>) -> Result<()> {
    if admin.is_none() && author_ip_hash != visitor.ip_hash {
        return Err(Error::NotOwner);
    }

    Ok(())
}

/// Delete a post. Only its author or an admin may.
#[delete("/api/posts/<post_id>")]
pub fn delete_post(
    post_id: PostId,
    visitor: Visitor,
    admin: Option<AdminSession>,
    db: State<Database>,
) -> ApiResult<()> {
    let conn = db.get()?;
    let post = conn.post(post_id)?;

    check_owner(&post.author_ip_hash, &visitor, admin.as_ref())?;

    conn.soft_delete_post(post_id)?;

    ok(())
}

/// Feature a post as popular or as an announcement.
#[put("/api/admin/posts/<post_id>/flags", data = "<flags>")]
pub fn set_post_flags(
    post_id: PostId,
    flags: Json<PostFlags>,
    _admin: AdminSession,
    db: State<Database>,
) -> ApiResult<Post> {
    if flags.is_empty() {
        return Err(Error::NoChanges);
    }

    ok(db.get()?.set_post_flags(post_id, &flags.into_inner())?)
}

/// New comment request data.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommentData {
    pub content: Option<String>,
    pub parent_id: Option<CommentId>,
    #[serde(alias = "nickname")]
    pub author_nickname: Option<String>,
}

impl NewCommentData {
    /// Check the request and turn it into a comment by the given visitor.
    ///
    /// The parent still has to be checked against the post.
    pub fn validate(self, post_id: PostId, author_ip_hash: String) -> Result<NewComment> {
        let content = required("content", self.content)?;
        check_length("content", &content, MAX_COMMENT_LENGTH)?;

        let author_nickname = nickname_field("authorNickname", self.author_nickname)?;

        Ok(NewComment {
            post_id,
            parent_id: self.parent_id,
            content,
            author_nickname,
            author_ip_hash,
        })
    }
}

/// List the comments on a post as threads.
#[get("/api/posts/<post_id>/comments")]
pub fn list_comments(post_id: PostId, db: State<Database>) -> ApiResult<Vec<CommentNode>> {
    let conn = db.get()?;
    conn.post(post_id)?;

    ok(build_comment_tree(conn.comments_for_post(post_id)?))
}

/// Comment on a post, or reply to a comment.
#[post("/api/posts/<post_id>/comments", data = "<comment_data>")]
pub fn new_comment(
    post_id: PostId,
    comment_data: Json<NewCommentData>,
    visitor: Visitor,
    db: State<Database>,
) -> ApiResult<Comment> {
    let mut new_comment = comment_data.into_inner().validate(post_id, visitor.ip_hash)?;

    let conn = db.get()?;
    conn.post(post_id)?;

    if let Some(parent_id) = new_comment.parent_id {
        new_comment.parent_id = Some(conn.reply_parent(post_id, parent_id)?);
    }

    let comment = conn.insert_comment(new_comment)?;

    // The comment stands even if the count can't be updated.
    if let Err(err) = conn.add_post_comment_count(post_id, 1) {
        error!("Couldn't count comment #{} on post #{}: {}", comment.id, post_id, err);
    }

    ok(comment)
}

/// Delete a comment. Only its author or an admin may.
#[delete("/api/comments/<comment_id>")]
pub fn delete_comment(
    comment_id: CommentId,
    visitor: Visitor,
    admin: Option<AdminSession>,
    db: State<Database>,
) -> ApiResult<()> {
    let conn = db.get()?;
    let comment = conn.comment(comment_id)?;

    check_owner(&comment.author_ip_hash, &visitor, admin.as_ref())?;

    let hidden = conn.soft_delete_comment(comment_id)?;

    if let Err(err) = conn.add_post_comment_count(comment.post_id, -(hidden as i32)) {
        error!(
            "Couldn't uncount comment #{} on post #{}: {}",
            comment_id, comment.post_id, err
        );
    }

    ok(())
}

/// Whether the visitor likes a post.
#[get("/api/posts/<post_id>/like")]
pub fn post_like_status(post_id: PostId, visitor: Visitor, db: State<Database>) -> ApiResult<LikeStatus> {
    ok(db.get()?.like_status(LikeTarget::Post(post_id), &visitor.ip_hash)?)
}

/// Like a post, or take back a like.
#[post("/api/posts/<post_id>/like")]
pub fn toggle_post_like(post_id: PostId, visitor: Visitor, db: State<Database>) -> ApiResult<LikeStatus> {
    ok(db.get()?.toggle_like(LikeTarget::Post(post_id), &visitor.ip_hash)?)
}

/// Whether the visitor likes a comment.
#[get("/api/comments/<comment_id>/like")]
pub fn comment_like_status(
    comment_id: CommentId,
    visitor: Visitor,
    db: State<Database>,
) -> ApiResult<LikeStatus> {
    ok(db.get()?.like_status(LikeTarget::Comment(comment_id), &visitor.ip_hash)?)
}

/// Like a comment, or take back a like.
#[post("/api/comments/<comment_id>/like")]
pub fn toggle_comment_like(
    comment_id: CommentId,
    visitor: Visitor,
    db: State<Database>,
) -> ApiResult<LikeStatus> {
    ok(db.get()?.toggle_like(LikeTarget::Comment(comment_id), &visitor.ip_hash)?)
}

/// List all categories.
#[get("/api/categories")]
pub fn list_categories(config: State<Config>, db: State<Database>) -> ApiResult<Vec<Category>> {
    ok(or_demo(
        db.get().and_then(|conn| conn.all_categories()),
        &config,
        "categories",
        demo::categories,
    )?)
}

/// New category request data.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategoryData {
    pub slug: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
}

/// Make a new category.
#[post("/api/admin/categories", data = "<category_data>")]
pub fn new_category(
    category_data: Json<NewCategoryData>,
    _admin: AdminSession,
    db: State<Database>,
) -> ApiResult<Category> {
    let category_data = category_data.into_inner();

    let new_category = NewCategory {
        slug: required("slug", category_data.slug)?,
        name: required("name", category_data.name)?,
        description: category_data.description.unwrap_or_default(),
        sort_order: category_data.sort_order.unwrap_or(0),
    };

    ok(db.get()?.insert_category(new_category)?)
}
