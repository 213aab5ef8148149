use std::path::PathBuf;

use clap::{App, AppSettings, Arg, SubCommand};

use creditboard::models::{Admin, NewCategory, SingleConnection};
use creditboard::{Config, Result};

fn main_res() -> Result<()> {
    let matches = App::new("boardctl")
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Control a creditboard server")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .takes_value(true)
                .help("Config file to use"),
        )
        .arg(
            Arg::with_name("database-url")
                .short("u")
                .long("database-url")
                .value_name("URL")
                .takes_value(true)
                .help("URL to use to connect to the database"),
        )
        .subcommand(
            SubCommand::with_name("add-admin")
                .about("Add a new admin")
                .arg(
                    Arg::with_name("name")
                        .short("n")
                        .long("name")
                        .help("The login name of the admin")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("pass")
                        .short("p")
                        .long("pass")
                        .help("The password for the admin")
                        .required(true)
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("remove-admin")
                .about("Remove an admin and end their sessions")
                .arg(
                    Arg::with_name("name")
                        .short("n")
                        .long("name")
                        .help("The login name of the admin")
                        .required(true)
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("add-category")
                .about("Add a new post category")
                .arg(
                    Arg::with_name("slug")
                        .short("s")
                        .long("slug")
                        .help("The name of the category used in URLs")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("name")
                        .short("n")
                        .long("name")
                        .help("The display name of the category")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("description")
                        .short("d")
                        .long("description")
                        .help("What goes in the category")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("order")
                        .short("o")
                        .long("order")
                        .help("Where the category goes in the list")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("prune-sessions")
                .about("Delete admin sessions that have expired"),
        )
        .subcommand(
            SubCommand::with_name("check-config")
                .about("Check the configuration file for errors"),
        )
        .subcommand(
            SubCommand::with_name("generate-config")
                .about("Print a configuration file with the default values"),
        )
        .get_matches();

    if matches.subcommand_matches("generate-config").is_some() {
        return Config::generate(std::io::stdout());
    }

    let config_path = matches
        .value_of("config")
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    let mut config = Config::open(&config_path)?;

    if let Some(url) = matches.value_of("database-url") {
        config.database_url = url.to_string();
    }

    if matches.subcommand_matches("check-config").is_some() {
        // Opening the config already validated it.
        println!("Configuration: {}", config_path.display());
        println!("\nThe config file is good.");
        return Ok(());
    }

    let db = SingleConnection::establish(&config.database_url)?;
    db.run_migrations()?;

    if let Some(matches) = matches.subcommand_matches("add-admin") {
        let name = matches.value_of("name").unwrap_or_default();
        let pass = matches.value_of("pass").unwrap_or_default();

        db.insert_admin(&Admin::new(name, pass)?)?;
        println!("Added admin {}", name);
    }

    if let Some(matches) = matches.subcommand_matches("remove-admin") {
        let name = matches.value_of("name").unwrap_or_default();

        db.delete_admin(name)?;
        println!("Removed admin {}", name);
    }

    if matches.subcommand_matches("prune-sessions").is_some() {
        let count = db.delete_expired_sessions(chrono::Utc::now())?;
        println!("Deleted {} expired sessions", count);
    }

    if let Some(matches) = matches.subcommand_matches("add-category") {
        let sort_order = match matches.value_of("order") {
            Some(order) => order.parse().map_err(|_| creditboard::Error::InvalidField {
                field: "order",
                reason: format!("'{}' is not a number", order),
            })?,
            None => 0,
        };

        let category = db.insert_category(NewCategory {
            slug: matches.value_of("slug").unwrap_or_default().to_string(),
            name: matches.value_of("name").unwrap_or_default().to_string(),
            description: matches.value_of("description").unwrap_or_default().to_string(),
            sort_order,
        })?;

        println!("Added category #{} {}", category.id, category.name);
    }

    Ok(())
}

fn main() {
    if let Err(e) = main_res() {
        eprintln!("{}", e);
        std::process::exit(-1);
    }
}
