//! Types for admins and their sessions.

use argon2::{hash_encoded, verify_encoded};

use chrono::{DateTime, Utc};

use diesel::{delete, insert_into, prelude::*};

use rand::{distributions::Alphanumeric, thread_rng, Rng};

use serde::Serialize;

use crate::models::{Connection, InnerConnection};
use crate::schema::{admin, session};
use crate::{Error, Result};

/// Length of a session ID.
const SESSION_ID_LENGTH: usize = 42;

/// An admin.
#[derive(Clone, Debug, Queryable, Insertable)]
#[table_name = "admin"]
pub struct Admin {
    pub name: String,
    pub password_hash: String,
}

impl Admin {
    /// Make a new admin, hashing their password.
    pub fn new<S1, S2>(name: S1, password: S2) -> Result<Admin>
    where
        S1: Into<String>,
        S2: AsRef<str>,
    {
        let salt: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .collect();

        let password_hash = hash_encoded(
            password.as_ref().as_bytes(),
            salt.as_bytes(),
            &argon2::Config::default(),
        )?;

        Ok(Admin {
            name: name.into(),
            password_hash,
        })
    }

    /// Check a password against the stored hash.
    pub fn verify_password<S>(&self, password: S) -> Result<bool>
    where
        S: AsRef<str>,
    {
        Ok(verify_encoded(
            &self.password_hash,
            password.as_ref().as_bytes(),
        )?)
    }
}

/// A logged in admin's session.
#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[table_name = "session"]
pub struct Session {
    #[serde(skip_serializing)]
    pub id: String,
    pub expires: DateTime<Utc>,
    #[serde(rename = "name")]
    pub admin_name: String,
}

impl Session {
    /// Start a new session for an admin that lasts until `expires`.
    pub fn new<S>(admin_name: S, expires: DateTime<Utc>) -> Session
    where
        S: Into<String>,
    {
        let id: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_ID_LENGTH)
            .collect();

        Session {
            id,
            expires,
            admin_name: admin_name.into(),
        }
    }

    /// Whether the session has run out at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

impl<C: InnerConnection> Connection<C> {
    /// Get an admin.
    pub fn admin<S>(&self, name: S) -> Result<Admin>
    where
        S: AsRef<str>,
    {
        use crate::schema::admin::columns::name as column_name;
        use crate::schema::admin::dsl::admin;

        admin
            .filter(column_name.eq(name.as_ref()))
            .limit(1)
            .first(&self.inner)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => Error::AdminNotFound {
                    admin_name: name.as_ref().to_string(),
                },
                _ => Error::from(e),
            })
    }

    /// Insert a new admin.
    pub fn insert_admin(&self, new_admin: &Admin) -> Result<()> {
        use crate::schema::admin::dsl::admin;

        insert_into(admin).values(new_admin).execute(&self.inner)?;

        Ok(())
    }

    /// Delete an admin along with their sessions.
    pub fn delete_admin<S>(&self, name: S) -> Result<()>
    where
        S: AsRef<str>,
    {
        use crate::schema::admin::columns::name as column_name;
        use crate::schema::admin::dsl::admin;

        use crate::schema::session::columns::admin_name;
        use crate::schema::session::dsl::session;

        let name = name.as_ref();

        delete(session.filter(admin_name.eq(name))).execute(&self.inner)?;

        let count = delete(admin.filter(column_name.eq(name))).execute(&self.inner)?;

        if count == 0 {
            return Err(Error::AdminNotFound {
                admin_name: name.to_string(),
            });
        }

        Ok(())
    }

    /// Get a session, expired or not.
    pub fn session<S>(&self, session_id: S) -> Result<Session>
    where
        S: AsRef<str>,
    {
        use crate::schema::session::columns::id;
        use crate::schema::session::dsl::session;

        session
            .filter(id.eq(session_id.as_ref()))
            .limit(1)
            .first(&self.inner)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => Error::InvalidSession,
                _ => Error::from(e),
            })
    }

    /// Get a session that is still good at `now`.
    ///
    /// An expired session is deleted on the way out.
    pub fn live_session<S>(&self, session_id: S, now: DateTime<Utc>) -> Result<Session>
    where
        S: AsRef<str>,
    {
        let session = self.session(session_id)?;

        if session.is_expired(now) {
            self.delete_session(&session.id)?;
            return Err(Error::ExpiredSession);
        }

        Ok(session)
    }

    /// Insert a session.
    pub fn insert_session(&self, new_session: &Session) -> Result<()> {
        use crate::schema::session::dsl::session;

        insert_into(session)
            .values(new_session)
            .execute(&self.inner)?;

        Ok(())
    }

    /// Delete a session.
    pub fn delete_session<S>(&self, session_id: S) -> Result<()>
    where
        S: AsRef<str>,
    {
        use crate::schema::session::columns::id;
        use crate::schema::session::dsl::session;

        delete(session.filter(id.eq(session_id.as_ref()))).execute(&self.inner)?;

        Ok(())
    }

    /// Delete every session that has run out. Returns how many were deleted.
    pub fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        use crate::schema::session::columns::expires;
        use crate::schema::session::dsl::session;

        Ok(delete(session.filter(expires.le(now))).execute(&self.inner)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trips() -> Result<()> {
        let admin = Admin::new("root", "correct horse")?;

        assert!(admin.verify_password("correct horse")?);
        assert!(!admin.verify_password("battery staple")?);

        Ok(())
    }

    #[test]
    fn sessions_get_fresh_ids() {
        let expires = Utc::now() + chrono::Duration::hours(8);
        let first = Session::new("root", expires);
        let second = Session::new("root", expires);

        assert_eq!(first.id.len(), SESSION_ID_LENGTH);
        assert!(first.id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn session_expiry() {
        let now = Utc::now();
        let session = Session::new("root", now + chrono::Duration::minutes(1));

        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + chrono::Duration::minutes(2)));
    }
}
