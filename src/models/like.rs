//! Likes on posts and comments.
//!
//! A visitor can like a post or comment at most once. Liking again takes the
//! like back.

use diesel::Connection as _;
use diesel::{delete, insert_into, prelude::*};

use serde::Serialize;

use crate::models::{CommentId, Connection, InnerConnection, PostId};
use crate::schema::{comment_like, post_like};
use crate::{Error, Result};

/// Something that can be liked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LikeTarget {
    Post(PostId),
    Comment(CommentId),
}

/// Whether a visitor likes something, and how many visitors do.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatus {
    pub is_liked: bool,
    pub like_count: i32,
}

#[derive(Insertable)]
#[table_name = "post_like"]
struct NewPostLike<'a> {
    post_id: PostId,
    ip_hash: &'a str,
}

#[derive(Insertable)]
#[table_name = "comment_like"]
struct NewCommentLike<'a> {
    comment_id: CommentId,
    ip_hash: &'a str,
}

/// How a toggle changes the like count, from the like rows it deleted and
/// inserted.
fn like_delta(removed: usize, inserted: usize) -> i32 {
    match (removed, inserted) {
        (0, 0) => 0,
        (0, _) => 1,
        _ => -1,
    }
}

impl<C: InnerConnection> Connection<C> {
    /// Whether the visitor with `ip_hash` has a like on the target.
    fn has_like(&self, target: LikeTarget, ip_hash: &str) -> Result<bool> {
        use diesel::dsl::{exists, select};

        let found = match target {
            LikeTarget::Post(id) => {
                use crate::schema::post_like::columns::{ip_hash as column_ip_hash, post_id};
                use crate::schema::post_like::dsl::post_like;

                select(exists(
                    post_like
                        .filter(post_id.eq(id))
                        .filter(column_ip_hash.eq(ip_hash)),
                ))
                .get_result(&self.inner)?
            }
            LikeTarget::Comment(id) => {
                use crate::schema::comment_like::columns::{comment_id, ip_hash as column_ip_hash};
                use crate::schema::comment_like::dsl::comment_like;

                select(exists(
                    comment_like
                        .filter(comment_id.eq(id))
                        .filter(column_ip_hash.eq(ip_hash)),
                ))
                .get_result(&self.inner)?
            }
        };

        Ok(found)
    }

    /// The current like count of the target. Deleted targets count as missing.
    fn like_count(&self, target: LikeTarget) -> Result<i32> {
        match target {
            LikeTarget::Post(id) => Ok(self.post(id)?.like_count),
            LikeTarget::Comment(id) => Ok(self.comment(id)?.like_count),
        }
    }

    /// Whether the visitor with `ip_hash` likes the target.
    pub fn like_status(&self, target: LikeTarget, ip_hash: &str) -> Result<LikeStatus> {
        let like_count = self.like_count(target)?;
        let is_liked = self.has_like(target, ip_hash)?;

        Ok(LikeStatus {
            is_liked,
            like_count,
        })
    }

    /// Like the target, or take back an existing like.
    ///
    /// The like row and the counter change together in one transaction.
    pub fn toggle_like(&self, target: LikeTarget, ip_hash: &str) -> Result<LikeStatus> {
        self.inner.transaction::<_, Error, _>(|| {
            // Fails with a not-found error before anything is changed.
            self.like_count(target)?;

            let removed = match target {
                LikeTarget::Post(id) => {
                    use crate::schema::post_like::columns::{ip_hash as column_ip_hash, post_id};
                    use crate::schema::post_like::dsl::post_like;

                    delete(
                        post_like
                            .filter(post_id.eq(id))
                            .filter(column_ip_hash.eq(ip_hash)),
                    )
                    .execute(&self.inner)?
                }
                LikeTarget::Comment(id) => {
                    use crate::schema::comment_like::columns::{comment_id, ip_hash as column_ip_hash};
                    use crate::schema::comment_like::dsl::comment_like;

                    delete(
                        comment_like
                            .filter(comment_id.eq(id))
                            .filter(column_ip_hash.eq(ip_hash)),
                    )
                    .execute(&self.inner)?
                }
            };

            let is_liked = removed == 0;

            // A like from the same visitor can land between the delete and
            // this insert. Then it's already liked and already counted.
            let inserted = if is_liked {
                match target {
                    LikeTarget::Post(post_id) => insert_into(post_like::table)
                        .values(&NewPostLike { post_id, ip_hash })
                        .on_conflict_do_nothing()
                        .execute(&self.inner)?,
                    LikeTarget::Comment(comment_id) => insert_into(comment_like::table)
                        .values(&NewCommentLike {
                            comment_id,
                            ip_hash,
                        })
                        .on_conflict_do_nothing()
                        .execute(&self.inner)?,
                }
            } else {
                0
            };

            let like_count = match (like_delta(removed, inserted), target) {
                (0, _) => self.like_count(target)?,
                (delta, LikeTarget::Post(id)) => self.add_post_like_count(id, delta)?,
                (delta, LikeTarget::Comment(id)) => self.add_comment_like_count(id, delta)?,
            };

            Ok(LikeStatus {
                is_liked,
                like_count,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_move_the_count_by_one() {
        assert_eq!(like_delta(0, 1), 1);
        assert_eq!(like_delta(1, 0), -1);
    }

    #[test]
    fn losing_a_race_to_like_changes_nothing() {
        assert_eq!(like_delta(0, 0), 0);
    }
}
