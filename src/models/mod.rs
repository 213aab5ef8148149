//! Models and types related to the database.

use std::fmt::Debug;
use std::ops::{Deref, DerefMut};

use diesel::pg::{Pg, PgConnection};
use diesel::r2d2::ConnectionManager;

use log::warn;

use r2d2::Pool;

use crate::config::Config;
use crate::Result;

pub mod ad;
pub mod admin;
pub mod category;
pub mod chat;
pub mod comment;
pub mod like;
pub mod post;

pub use ad::*;
pub use admin::*;
pub use category::*;
pub use chat::*;
pub use comment::*;
pub use like::*;
pub use post::*;

embed_migrations!();

/// Any connection to the PostgreSQL database.
pub trait InnerConnection: diesel::Connection<Backend = Pg> {}

impl<C> InnerConnection for C where C: diesel::Connection<Backend = Pg> {}

/// A connection to the database. Used for creating and retrieving data.
///
/// The methods for each kind of record live next to the record's type, in the
/// submodules of this module.
pub struct Connection<C: InnerConnection> {
    pub(crate) inner: C,
}

impl<C: InnerConnection> Deref for Connection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner
    }
}

impl<C: InnerConnection> DerefMut for Connection<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.inner
    }
}

/// A connection borrowed from the pool.
pub type PooledConnection =
    Connection<r2d2::PooledConnection<ConnectionManager<PgConnection>>>;

/// A connection made without the pool.
pub type SingleConnection = Connection<PgConnection>;

impl PooledConnection {
    /// Run any migrations that haven't been run yet.
    pub fn run_migrations(&self) -> Result<()> {
        embedded_migrations::run(&*self.inner)?;
        Ok(())
    }
}

impl SingleConnection {
    /// Run any migrations that haven't been run yet.
    pub fn run_migrations(&self) -> Result<()> {
        embedded_migrations::run(&self.inner)?;
        Ok(())
    }

    /// Connect to the database at `url`.
    pub fn establish<S>(url: S) -> Result<SingleConnection>
    where
        S: AsRef<str>,
    {
        use diesel::Connection as _;

        Ok(Connection {
            inner: PgConnection::establish(url.as_ref())?,
        })
    }
}

/// A pool of connections to the database.
pub struct Database {
    pub pool: Pool<ConnectionManager<PgConnection>>,
}

impl Debug for Database {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        let state = self.pool.state();

        write!(
            fmt,
            "<#Database connections={} idle_connections={}>",
            state.connections, state.idle_connections,
        )?;

        Ok(())
    }
}

impl Database {
    /// Open a connection pool and bring the schema up to date.
    ///
    /// In demo mode the database is allowed to be missing; the pool is built
    /// without checking it, and a failed migration is only logged.
    pub fn open(config: &Config) -> Result<Database> {
        let manager = ConnectionManager::new(config.database_url.as_str());
        let builder = Pool::builder().connection_timeout(*config.database_timeout);

        if config.demo_mode {
            let database = Database {
                pool: builder.build_unchecked(manager),
            };

            if let Err(err) = database.get().and_then(|conn| conn.run_migrations()) {
                warn!("Database unavailable, continuing in demo mode: {}", err);
            }

            return Ok(database);
        }

        let database = Database {
            pool: builder.build(manager)?,
        };

        database.get()?.run_migrations()?;

        Ok(database)
    }

    /// Borrow a connection from the pool.
    pub fn get(&self) -> Result<PooledConnection> {
        Ok(Connection {
            inner: self.pool.get()?,
        })
    }
}

/// A page location for a paginated resource, for example a page of posts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page {
    /// The page number, starting at 1.
    pub num: u32,
    /// How many items can fit in a page.
    pub width: u32,
}

impl Page {
    /// Build a page from request parameters, filling in defaults and clamping
    /// to sane values.
    pub fn from_params(num: Option<u32>, width: Option<u32>, config: &Config) -> Page {
        Page {
            num: num.unwrap_or(1).max(1),
            width: width
                .unwrap_or(config.page_size)
                .max(1)
                .min(config.max_page_size),
        }
    }

    /// The offset in items to the start of the page.
    ///
    /// The offset to page 1 is 0. Page numbers come straight from clients, so
    /// this is computed wide enough that no page number can overflow it.
    pub fn offset(&self) -> i64 {
        (i64::from(self.num.max(1)) - 1).saturating_mul(i64::from(self.width))
    }

    /// How many pages it takes to hold `total` items.
    pub fn count(&self, total: i64) -> u32 {
        (total as f64 / self.width as f64).ceil() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            page_size: 20,
            max_page_size: 50,
            ..Config::default()
        }
    }

    #[test]
    fn first_page_starts_at_zero() {
        assert_eq!(Page { num: 1, width: 10 }.offset(), 0);
        assert_eq!(Page { num: 2, width: 10 }.offset(), 10);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let config = config();
        let page = Page::from_params(Some(100_000_000), Some(50), &config);

        assert_eq!(page.offset(), 4_999_999_950);
        assert_eq!(
            Page { num: u32::MAX, width: 100 }.offset(),
            (i64::from(u32::MAX) - 1) * 100
        );
        assert_eq!(Page { num: u32::MAX, width: u32::MAX }.offset(), i64::MAX);
        assert_eq!(Page { num: 0, width: 10 }.offset(), 0);
    }

    #[test]
    fn page_count_rounds_up() {
        let page = Page { num: 2, width: 10 };

        assert_eq!(page.count(25), 3);
        assert_eq!(page.count(20), 2);
        assert_eq!(page.count(0), 0);
    }

    #[test]
    fn params_are_defaulted_and_clamped() {
        let config = config();

        assert_eq!(
            Page::from_params(None, None, &config),
            Page { num: 1, width: 20 }
        );
        assert_eq!(
            Page::from_params(Some(0), Some(0), &config),
            Page { num: 1, width: 1 }
        );
        assert_eq!(
            Page::from_params(Some(3), Some(500), &config),
            Page { num: 3, width: 50 }
        );
    }
}
