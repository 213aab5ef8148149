use std::path::PathBuf;

use clap::{App, Arg};

use fern::colors::{Color, ColoredLevelConfig};

use log::info;

use creditboard::{new_instance, Config, Error, Result};

/// Send log messages to stdout, and to the log file if there is one.
fn setup_logging(config: &Config) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let stdout = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} {:5} [{}] {}",
                chrono::Local::now().format("%F %T"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stdout());

    let mut dispatch = fern::Dispatch::new()
        .level(config.level_filter()?)
        .chain(stdout);

    if let Some(ref path) = config.log_file {
        let msg = format!("Couldn't open log file at {}", path.display());
        let file = fern::log_file(path).map_err(|err| Error::from_io_error(err, msg))?;

        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} {:5} [{}] {}",
                        chrono::Local::now().format("%F %T"),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(file),
        );
    }

    dispatch.apply()?;

    Ok(())
}

fn main_res() -> Result<()> {
    let matches = App::new("creditboard")
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
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
        .get_matches();

    let config_path = matches
        .value_of("config")
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    let mut config = Config::open(&config_path)?;

    if let Some(url) = matches.value_of("database-url") {
        config.database_url = url.to_string();
    }

    setup_logging(&config)?;

    info!("Using config file {}", config_path.display());
    config.debug_log();

    let address = format!("{}:{}", config.address, config.port);
    let rocket = new_instance(config)?;

    info!("Listening on {}", address);

    Err(Error::from(rocket.launch()))
}

fn main() {
    if let Err(e) = main_res() {
        eprintln!("{}", e);
        std::process::exit(-1);
    }
}
