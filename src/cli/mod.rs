//! Command line interface

use crate::config::{MailConfig, DEFAULT_CHARSET, DEFAULT_TIMEOUT_MILLIS};
use crate::error::{ConfigError, SendError};
use crate::service::MailService;
use clap::{CommandFactory, Parser};
use std::io::Write;

/// Exit code for success
pub const EXIT_OK: u8 = 0;
/// Exit code for bad arguments or missing credentials
pub const EXIT_USAGE: u8 = 1;

/// Options that take a value
const VALUE_FLAGS: &[&str] = &[
    "host", "port", "user", "pw", "envPw", "from", "to", "subject", "message", "charset",
    "timeout",
];

/// Options without a value
const SWITCHES: &[&str] = &["html", "smtp", "noauth", "important"];

/// Sends a single mail message via SMTP or SMTPS to one or more receivers
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "smtp-send", version, about)]
pub struct Cli {
    /// Host
    #[arg(long, value_name = "HOST")]
    pub host: String,

    /// Port
    #[arg(long, value_name = "PORT")]
    pub port: u16,

    /// User
    #[arg(long, value_name = "USER")]
    pub user: String,

    /// Password
    #[arg(long, value_name = "PW", allow_hyphen_values = true)]
    pub pw: Option<String>,

    /// Name of an environment variable that contains the password
    #[arg(long = "envPw", value_name = "ENV_PW")]
    pub env_pw: Option<String>,

    /// Sender
    #[arg(long, value_name = "SEND", allow_hyphen_values = true)]
    pub from: String,

    /// Receivers, separated by ';'
    #[arg(long, value_name = "RCVR", allow_hyphen_values = true)]
    pub to: String,

    /// Subject
    #[arg(long, value_name = "SUBJ", allow_hyphen_values = true)]
    pub subject: String,

    /// Text or HTML message
    #[arg(long, value_name = "MSG", allow_hyphen_values = true)]
    pub message: String,

    /// HTML message (otherwise TEXT)
    #[arg(long)]
    pub html: bool,

    /// Message encoding
    #[arg(long, value_name = "CHARSET", default_value = DEFAULT_CHARSET)]
    pub charset: String,

    /// Use smtp (not smtps)
    #[arg(long)]
    pub smtp: bool,

    /// Timeout millis
    #[arg(long, value_name = "MILLIS", default_value_t = DEFAULT_TIMEOUT_MILLIS)]
    pub timeout: u64,

    /// SMTP without authentication
    #[arg(long)]
    pub noauth: bool,

    /// Send High Priority Email (X-Priority)
    #[arg(long)]
    pub important: bool,
}

impl TryFrom<Cli> for MailConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        MailConfig::builder()
            .host(cli.host)
            .port(cli.port)
            .user(cli.user)
            .password(cli.pw)
            .password_env_var(cli.env_pw)
            .from(cli.from)
            .to(cli.to)
            .subject(cli.subject)
            .body(cli.message)
            .html(cli.html)
            .charset(Some(cli.charset))
            .use_smtp(cli.smtp)
            .timeout_millis(cli.timeout)
            .no_auth(cli.noauth)
            .important(cli.important)
            .build()
    }
}

/// Rewrite single-dash long options (`-host`) into `--host`.
///
/// Only known option names are rewritten, and never in value position.
pub fn normalize_args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut expect_value = false;
    let mut normalized = Vec::new();

    for (i, arg) in args.into_iter().map(Into::into).enumerate() {
        if i == 0 || expect_value {
            expect_value = false;
            normalized.push(arg);
            continue;
        }

        let double_dash = arg.starts_with("--");
        let name = arg
            .strip_prefix("--")
            .or_else(|| arg.strip_prefix('-'))
            .unwrap_or_default();
        let (flag, inline_value) = match name.split_once('=') {
            Some((flag, value)) => (flag, Some(value)),
            None => (name, None),
        };

        let known = if VALUE_FLAGS.contains(&flag) {
            expect_value = inline_value.is_none();
            true
        } else {
            SWITCHES.contains(&flag)
        };

        if known && !double_dash {
            normalized.push(format!("-{}", arg));
        } else {
            normalized.push(arg);
        }
    }

    normalized
}

/// Parse `args`, send the message and return the process exit code.
///
/// The confirmation goes to `out`; errors and usage go to `err`.
pub async fn run<I, S, O, E>(args: I, out: &mut O, err: &mut E) -> u8
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    O: Write,
    E: Write,
{
    run_with(&MailService::new(), args, out, err).await
}

/// [`run`] with an explicit service
pub async fn run_with<I, S, O, E>(service: &MailService, args: I, out: &mut O, err: &mut E) -> u8
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    O: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(normalize_args(args)) {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = write!(err, "{}", e.render());
            return EXIT_USAGE;
        }
        Err(e) => {
            // --help and --version
            let _ = write!(out, "{}", e.render());
            return EXIT_OK;
        }
    };

    let config = match MailConfig::try_from(cli) {
        Ok(config) => config,
        Err(e) => {
            print_usage_error(err, &e.to_string());
            return EXIT_USAGE;
        }
    };

    match service.send(&config).await {
        Ok(report) => {
            let _ = writeln!(out, "{}", report.confirmation());
            EXIT_OK
        }
        Err(e) => report_failure(err, e),
    }
}

fn report_failure<E: Write>(err: &mut E, e: SendError) -> u8 {
    let code = e.exit_code();
    if code == EXIT_USAGE {
        print_usage_error(err, &e.to_string());
    } else {
        tracing::error!(error = %e, "Failed to send mail");
        let _ = writeln!(err, "{:?}", anyhow::Error::new(e));
    }
    code
}

fn print_usage_error<E: Write>(err: &mut E, message: &str) {
    let _ = writeln!(err, "{}", message);
    let _ = writeln!(err, "{}", Cli::command().render_usage());
}
