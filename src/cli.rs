use clap::{Args, Parser, Subcommand, ValueEnum};
use herald::config::{
    AppConfig, AuthConfig, DEFAULT_LISTEN, Environment, FileAuthConfig, FileConfig, PushConfig,
    parse_listen,
};
use herald::ports::UserStore;
use std::path::PathBuf;
use time::Duration;

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(AppConfig, LogFormat),
    Exit(i32),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormat {
    #[default]
    Text,
    Json,
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Init(ref args)) => return RunOutcome::Exit(run_init(args)),
        Some(Command::AuthKey) => return RunOutcome::Exit(run_auth_key()),
        Some(Command::ClearSubscriptions(ref args)) => {
            return RunOutcome::Exit(run_clear_subscriptions(args));
        }
        None => {}
    }

    match resolve_app_config(&cli) {
        Ok(config) => RunOutcome::Serve(config, cli.log_format),
        Err(err) => {
            eprintln!("error: {err}");
            RunOutcome::Exit(2)
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "herald",
    version,
    about = "Accounts and web push notification server"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    /// TOML file with defaults for the options below.
    #[arg(long, env = "HERALD_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "HERALD_LISTEN")]
    listen: Option<String>,
    #[arg(long, env = "HERALD_DATA_FILE")]
    data_file: Option<PathBuf>,
    #[arg(long, env = "HERALD_ENV")]
    environment: Option<String>,
    #[arg(long, value_enum, env = "HERALD_LOG_FORMAT", default_value_t = LogFormat::Text)]
    log_format: LogFormat,
    #[arg(long, env = "HERALD_VAPID_PRIVATE_KEY")]
    vapid_private_key: Option<String>,
    #[arg(long, env = "HERALD_VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, env = "HERALD_VAPID_SUBJECT")]
    vapid_subject: Option<String>,
    #[arg(long, env = "HERALD_AUTH_KEY")]
    auth_key: Option<String>,
    #[arg(long, env = "HERALD_AUTH_TOKEN_TTL")]
    auth_token_ttl: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a fresh set of VAPID credentials.
    Init(InitArgs),
    /// Print a random token signing key.
    AuthKey,
    /// Remove every stored push subscription, e.g. after rotating VAPID keys.
    ClearSubscriptions(ClearSubscriptionsArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Args, Debug)]
struct ClearSubscriptionsArgs {
    #[arg(long, env = "HERALD_DATA_FILE")]
    data_file: PathBuf,
}

fn run_init(args: &InitArgs) -> i32 {
    let credentials = match herald::generate_vapid_credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("failed to generate VAPID credentials: {err}");
            return 1;
        }
    };
    let (subject, show_subject_note) = match args.subject.as_deref() {
        Some(subject) => (subject.to_string(), false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!("HERALD_VAPID_PRIVATE_KEY=\"{}\"", credentials.private_key);
    println!("HERALD_VAPID_PUBLIC_KEY=\"{}\"", credentials.public_key);
    println!("HERALD_VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace HERALD_VAPID_SUBJECT with a contact URI you control.");
    }
    println!();
    println!("Existing subscriptions stop working with new keys; run `herald clear-subscriptions`.");
    0
}

fn run_auth_key() -> i32 {
    let secret = match herald::auth::generate_auth_key() {
        Ok(secret) => secret,
        Err(err) => {
            eprintln!("failed to generate auth key: {err}");
            return 1;
        }
    };
    println!("{secret}");
    0
}

fn run_clear_subscriptions(args: &ClearSubscriptionsArgs) -> i32 {
    let store = match herald::store::UserDirectory::open(&args.data_file) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("failed to open {}: {err}", args.data_file.display());
            return 1;
        }
    };
    match store.clear_subscriptions() {
        Ok(removed) => {
            println!("Removed {removed} push subscriptions.");
            0
        }
        Err(err) => {
            eprintln!("failed to clear subscriptions: {err}");
            1
        }
    }
}

fn resolve_app_config(cli: &Cli) -> Result<AppConfig, String> {
    let file = match cli.config.as_deref() {
        Some(path) => FileConfig::load(path).map_err(|err| err.to_string())?,
        None => FileConfig::default(),
    };

    let listen = cli
        .listen
        .as_deref()
        .or(file.listen.as_deref())
        .unwrap_or(DEFAULT_LISTEN);
    let listen = parse_listen(listen).map_err(|err| err.to_string())?;

    let environment = match cli.environment.as_deref().or(file.environment.as_deref()) {
        Some(raw) => raw.parse::<Environment>().map_err(|err| err.to_string())?,
        None => Environment::default(),
    };

    let auth = resolve_auth_config(cli, &file.auth)?;

    let vapid = herald::push::load_vapid_config(
        cli.vapid_private_key
            .as_deref()
            .or(file.vapid.private_key.as_deref()),
        cli.vapid_public_key
            .as_deref()
            .or(file.vapid.public_key.as_deref()),
        cli.vapid_subject.as_deref().or(file.vapid.subject.as_deref()),
    );

    Ok(AppConfig {
        listen,
        data_file: cli.data_file.clone().or(file.data_file),
        environment,
        auth,
        push: PushConfig { vapid },
    })
}

fn resolve_auth_config(cli: &Cli, file: &FileAuthConfig) -> Result<AuthConfig, String> {
    let auth_key = cli
        .auth_key
        .as_deref()
        .or(file.key.as_deref())
        .ok_or("--auth-key (or HERALD_AUTH_KEY) is required; generate one with `herald auth-key`")?
        .trim();
    if auth_key.is_empty() {
        return Err("auth key cannot be empty".to_string());
    }

    let token_ttl = match cli.auth_token_ttl.as_deref().or(file.token_ttl.as_deref()) {
        Some(raw) => parse_auth_token_ttl(raw)?,
        None => default_auth_token_ttl(),
    };

    Ok(AuthConfig {
        key: auth_key.to_string(),
        token_ttl,
    })
}

fn default_auth_token_ttl() -> Duration {
    Duration::days(7)
}

fn parse_auth_token_ttl(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("auth token ttl cannot be empty".to_string());
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("invalid auth token ttl '{value}'; expected <number>[s|m|h|d]"))?;

    if amount <= 0 {
        return Err("auth token ttl must be greater than 0".to_string());
    }

    match unit {
        's' => Ok(Duration::seconds(amount)),
        'm' => Ok(Duration::minutes(amount)),
        'h' => Ok(Duration::hours(amount)),
        'd' => Ok(Duration::days(amount)),
        _ => Err(format!(
            "invalid auth token ttl '{value}'; expected <number>[s|m|h|d]"
        )),
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use herald::push::VapidConfigStatus;

    fn base_cli() -> Cli {
        Cli {
            command: None,
            config: None,
            listen: None,
            data_file: None,
            environment: None,
            log_format: LogFormat::Text,
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
            auth_key: Some("c2VjcmV0".to_string()),
            auth_token_ttl: None,
        }
    }

    #[test]
    fn parse_auth_token_ttl__should_parse_seconds_when_unit_missing() {
        // When
        let duration = parse_auth_token_ttl("30").expect("parse ttl");

        // Then
        assert_eq!(duration, Duration::seconds(30));
    }

    #[test]
    fn parse_auth_token_ttl__should_parse_units() {
        // When
        let duration = parse_auth_token_ttl("15m").expect("parse ttl");

        // Then
        assert_eq!(duration, Duration::minutes(15));
    }

    #[test]
    fn parse_auth_token_ttl__should_reject_invalid_values() {
        // Then
        assert!(parse_auth_token_ttl("").is_err());
        assert!(parse_auth_token_ttl("0").is_err());
        assert!(parse_auth_token_ttl("abc").is_err());
    }

    #[test]
    fn resolve_auth_config__should_require_auth_key() {
        // Given
        let mut cli = base_cli();
        cli.auth_key = None;
        cli.auth_token_ttl = Some("1h".to_string());

        // When
        let result = resolve_auth_config(&cli, &FileAuthConfig::default());

        // Then
        assert!(result.is_err());
    }

    #[test]
    fn resolve_app_config__should_apply_defaults() {
        // When
        let config = resolve_app_config(&base_cli()).expect("resolve config");

        // Then
        assert_eq!(config.listen.to_string(), DEFAULT_LISTEN);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.auth.key, "c2VjcmV0");
        assert_eq!(config.auth.token_ttl, default_auth_token_ttl());
        assert!(config.data_file.is_none());
        assert!(matches!(config.push.vapid, VapidConfigStatus::Missing));
    }

    #[test]
    fn resolve_app_config__should_prefer_flags_over_config_file() {
        // Given
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("herald-cli-{nanos}.toml"));
        std::fs::write(
            &path,
            "listen = \"127.0.0.1:7000\"\nenvironment = \"production\"\n[auth]\ntoken_ttl = \"2d\"\n[vapid]\nprivate_key = \"private\"\n",
        )
        .expect("write config");
        let mut cli = base_cli();
        cli.config = Some(path.clone());
        cli.listen = Some("127.0.0.1:9000".to_string());
        cli.vapid_public_key = Some("public".to_string());
        cli.vapid_subject = Some("ops@example.com".to_string());

        // When
        let config = resolve_app_config(&cli).expect("resolve config");

        // Then
        assert_eq!(config.listen.to_string(), "127.0.0.1:9000");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.auth.token_ttl, Duration::days(2));
        assert!(config.push.is_configured());

        std::fs::remove_file(&path).expect("cleanup");
    }
}
