//! Types related to post categories.

use diesel::{insert_into, prelude::*};

use serde::{Deserialize, Serialize};

use crate::models::{Connection, InnerConnection};
use crate::schema::category;
use crate::{Error, Result};

/// A category ID.
pub type CategoryId = i32;

/// A section of the forum, like "free talk" or "success stories".
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The unique name of the category used in URLs.
    pub slug: String,
    /// The display name of the category.
    pub name: String,
    /// A description of what goes in the category.
    pub description: String,
    /// Categories are listed in ascending sort order.
    pub sort_order: i32,
}

/// A new category to be inserted in the database.
#[derive(Debug, Insertable)]
#[table_name = "category"]
pub struct NewCategory {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub sort_order: i32,
}

impl<C: InnerConnection> Connection<C> {
    /// Get all categories, in sort order.
    pub fn all_categories(&self) -> Result<Vec<Category>> {
        use crate::schema::category::columns::{id, sort_order};
        use crate::schema::category::dsl::category;

        Ok(category
            .order_by(sort_order.asc())
            .then_order_by(id.asc())
            .load(&self.inner)?)
    }

    /// Get a category.
    pub fn category(&self, category_id: CategoryId) -> Result<Category> {
        use crate::schema::category::columns::id;
        use crate::schema::category::dsl::category;

        category
            .filter(id.eq(category_id))
            .limit(1)
            .first(&self.inner)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => Error::UnknownCategory { category_id },
                _ => Error::from(e),
            })
    }

    /// Insert a new category.
    pub fn insert_category(&self, new_category: NewCategory) -> Result<Category> {
        use crate::schema::category::dsl::category;

        Ok(insert_into(category)
            .values(&new_category)
            .get_result(&self.inner)?)
    }
}
