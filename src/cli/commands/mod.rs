use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

use crate::gateway::{SecretScheme, Zone};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn validator_zone() -> ValueParser {
    ValueParser::from(move |zone: &str| -> std::result::Result<Zone, String> {
        zone.parse::<Zone>().map_err(|err| err.to_string())
    })
}

pub fn validator_secret_scheme() -> ValueParser {
    ValueParser::from(move |scheme: &str| -> std::result::Result<SecretScheme, String> {
        scheme.parse::<SecretScheme>()
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("fieldgate")
        .about("Access-control gateway for field data collection servers")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_negates_reqs(true)
        .subcommand(
            Command::new("hash-secret")
                .about("Print an Argon2 hash for a users file entry")
                .arg(
                    Arg::new("secret")
                        .help("Secret to hash")
                        .required(true),
                ),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("FIELDGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("PostgreSQL connection string for the users table")
                .env("FIELDGATE_DSN"),
        )
        .arg(
            Arg::new("users-file")
                .long("users-file")
                .help("JSON file with [{id, username, password, role}] entries")
                .env("FIELDGATE_USERS_FILE")
                .required_unless_present("dsn")
                .conflicts_with("dsn"),
        )
        .arg(
            Arg::new("upstream")
                .long("upstream")
                .help("Base URL of the data service to forward admitted requests to")
                .env("FIELDGATE_UPSTREAM"),
        )
        .arg(
            Arg::new("realm")
                .long("realm")
                .help("Realm announced in Basic and Digest challenges")
                .default_value("fieldgate")
                .env("FIELDGATE_REALM"),
        )
        .arg(
            Arg::new("session-ttl")
                .long("session-ttl")
                .help("Session lifetime in seconds")
                .default_value("43200")
                .env("FIELDGATE_SESSION_TTL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("cookie-secure")
                .long("cookie-secure")
                .help("Mark the session cookie Secure")
                .env("FIELDGATE_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("secret-scheme")
                .long("secret-scheme")
                .help("How stored secrets are compared: plaintext or argon2")
                .default_value("plaintext")
                .env("FIELDGATE_SECRET_SCHEME")
                .value_parser(validator_secret_scheme()),
        )
        .arg(
            Arg::new("store-timeout")
                .long("store-timeout")
                .help("Credential store lookup timeout in seconds")
                .default_value("5")
                .env("FIELDGATE_STORE_TIMEOUT")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("zone")
                .long("zone")
                .help("Zone as PREFIX=public|authenticated|role:a,b (repeatable, replaces the defaults)")
                .env("FIELDGATE_ZONES")
                .value_delimiter(';')
                .action(ArgAction::Append)
                .value_parser(validator_zone()),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .help("Emit logs as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("FIELDGATE_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
