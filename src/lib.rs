//! creditboard, the server behind a credit recovery community site.
//!
//! Visitors post, comment, like and chat without accounts. They're told apart
//! by a salted hash of their address. Admins log in to moderate, to manage
//! categories and chat rooms, and to run the site's ads.

#![feature(proc_macro_hygiene, decl_macro)]

#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;

use rocket::config::{Environment, LoggingLevel};

pub mod ads;
pub mod config;
pub mod demo;
pub mod error;
pub mod identity;
pub mod models;
pub mod routes;
pub mod schema;
pub mod throttle;
pub mod views;

pub use crate::config::Config;
pub use crate::error::{Error, Result};

use crate::models::Database;
use crate::throttle::LoginThrottle;

/// Build a server instance from a config, ready to launch.
pub fn new_instance(config: Config) -> Result<rocket::Rocket> {
    let rocket_config = rocket::Config::build(Environment::active()?)
        .address(config.address.clone())
        .port(config.port)
        .log_level(LoggingLevel::Off)
        .finalize()?;

    let database = Database::open(&config)?;
    let throttle = LoginThrottle::from_config(&config)?;

    Ok(rocket::custom(rocket_config)
        .mount("/", routes::routes())
        .register(views::error::catchers())
        .manage(config)
        .manage(database)
        .manage(throttle))
}
