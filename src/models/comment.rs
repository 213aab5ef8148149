//! Types related to comments.

use std::collections::HashMap;

use chrono::offset::Utc;
use chrono::DateTime;

use diesel::Connection as _;
use diesel::{insert_into, prelude::*, update};

use serde::{Deserialize, Serialize};

use crate::models::{Connection, InnerConnection, PostId};
use crate::schema::comment;
use crate::{Error, Result};

/// A comment ID.
pub type CommentId = i32;

/// A comment on a post, or a reply to a comment.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// The ID of the comment.
    pub id: CommentId,
    /// The post the comment is on.
    pub post_id: PostId,
    /// The top-level comment this one replies to, if it's a reply.
    pub parent_id: Option<CommentId>,
    /// The contents of the comment.
    pub content: String,
    /// The display name the author commented under.
    pub author_nickname: String,
    /// The identity hash of the author.
    #[serde(skip_serializing, default)]
    pub author_ip_hash: String,
    /// How many visitors like the comment.
    pub like_count: i32,
    /// Whether the comment was removed.
    #[serde(skip_serializing, default)]
    pub is_deleted: bool,
    /// When the comment was made.
    pub created_at: DateTime<Utc>,
}

/// A new comment to be inserted in the database.
#[derive(Debug, Insertable)]
#[table_name = "comment"]
pub struct NewComment {
    pub post_id: PostId,
    pub parent_id: Option<CommentId>,
    pub content: String,
    pub author_nickname: String,
    pub author_ip_hash: String,
}

/// A top-level comment with its replies.
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

/// Arrange a flat list of comments into one level of threads.
///
/// Comments without a parent become the roots, in the order given. Every other
/// comment is attached to its parent root, also in the order given. Replies
/// whose parent is not one of the roots are dropped.
pub fn build_comment_tree(comments: Vec<Comment>) -> Vec<CommentNode> {
    let (roots, replies): (Vec<Comment>, Vec<Comment>) = comments
        .into_iter()
        .partition(|comment| comment.parent_id.is_none());

    let mut nodes: Vec<CommentNode> = roots
        .into_iter()
        .map(|comment| CommentNode {
            comment,
            replies: Vec::new(),
        })
        .collect();

    let index: HashMap<CommentId, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.comment.id, i))
        .collect();

    for reply in replies {
        if let Some(&i) = reply.parent_id.and_then(|parent| index.get(&parent)) {
            nodes[i].replies.push(reply);
        }
    }

    nodes
}

fn conv_comment_error(comment_id: CommentId) -> impl FnOnce(diesel::result::Error) -> Error {
    move |e: diesel::result::Error| match e {
        diesel::result::Error::NotFound => Error::CommentNotFound { comment_id },
        _ => Error::from(e),
    }
}

impl<C: InnerConnection> Connection<C> {
    /// Get all live comments on a post, oldest first.
    pub fn comments_for_post(&self, post_id: PostId) -> Result<Vec<Comment>> {
        use crate::schema::comment::columns::{created_at, id, is_deleted, post_id as column_post_id};
        use crate::schema::comment::dsl::comment;

        Ok(comment
            .filter(column_post_id.eq(post_id))
            .filter(is_deleted.eq(false))
            .order_by(created_at.asc())
            .then_order_by(id.asc())
            .load(&self.inner)?)
    }

    /// Get a live comment.
    pub fn comment(&self, comment_id: CommentId) -> Result<Comment> {
        use crate::schema::comment::columns::{id, is_deleted};
        use crate::schema::comment::dsl::comment;

        comment
            .filter(id.eq(comment_id))
            .filter(is_deleted.eq(false))
            .limit(1)
            .first(&self.inner)
            .map_err(conv_comment_error(comment_id))
    }

    /// Find the comment a new reply on `post_id` should hang under.
    ///
    /// Threads are only one level deep, so replying to a reply puts the new
    /// comment under the reply's own parent.
    pub fn reply_parent(&self, post_id: PostId, parent_id: CommentId) -> Result<CommentId> {
        let parent = self.comment(parent_id).map_err(|e| match e {
            Error::CommentNotFound { .. } => Error::InvalidField {
                field: "parentId",
                reason: format!("comment #{} does not exist", parent_id),
            },
            e => e,
        })?;

        if parent.post_id != post_id {
            return Err(Error::InvalidField {
                field: "parentId",
                reason: format!("comment #{} is on another post", parent_id),
            });
        }

        Ok(parent.parent_id.unwrap_or(parent.id))
    }

    /// Insert a new comment into the database.
    pub fn insert_comment(&self, new_comment: NewComment) -> Result<Comment> {
        use crate::schema::comment::dsl::comment;

        Ok(insert_into(comment)
            .values(&new_comment)
            .get_result(&self.inner)?)
    }

    /// Hide a comment along with its replies, which would have nowhere to
    /// show without it. Returns how many comments were hidden.
    pub fn soft_delete_comment(&self, comment_id: CommentId) -> Result<usize> {
        use crate::schema::comment::columns::{id, is_deleted, parent_id};
        use crate::schema::comment::dsl::comment;

        self.inner.transaction::<_, Error, _>(|| {
            let hidden = update(comment.filter(id.eq(comment_id)).filter(is_deleted.eq(false)))
                .set(is_deleted.eq(true))
                .execute(&self.inner)?;

            if hidden == 0 {
                return Err(Error::CommentNotFound { comment_id });
            }

            let replies = update(
                comment
                    .filter(parent_id.eq(comment_id))
                    .filter(is_deleted.eq(false)),
            )
            .set(is_deleted.eq(true))
            .execute(&self.inner)?;

            Ok(hidden + replies)
        })
    }

    /// Add `delta` to a comment's like count, returning the new count.
    pub fn add_comment_like_count(&self, comment_id: CommentId, delta: i32) -> Result<i32> {
        use crate::schema::comment::columns::{id, like_count};
        use crate::schema::comment::dsl::comment;

        update(comment.filter(id.eq(comment_id)))
            .set(like_count.eq(like_count + delta))
            .returning(like_count)
            .get_result(&self.inner)
            .map_err(conv_comment_error(comment_id))
    }
}
