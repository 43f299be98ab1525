//! matrix-notifier - send Matrix notifications from the command line.
//!
//! # Usage
//!
//! Log in once to obtain the credentials to configure:
//!
//! ```bash
//! matrix-notifier --config config.yaml init bot --server-url matrix.example.com
//! ```
//!
//! Then send messages:
//!
//! ```bash
//! matrix-notifier --config config.yaml send "Deployment finished" --to @ops:example.com
//! matrix-notifier send "<b>Alert</b>" --render html --notice --dsn "smatrix://matrix.example.com:8448"
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`)
//! - `MATRIX_NOTIFIER_*` - Override configuration values, see `matrix_notifier::config`

use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use matrix_notifier::{
    bridge::{MessageKind, NativeLibrary, RenderKind},
    config::Config,
    login::{LoginFlow, LoginInput, LoginOutcome, TerminalConsole},
    message::ChatMessage,
    options::MatrixOptions,
    transport::TransportFactory,
};
use secrecy::SecretString;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    ///
    /// See `matrix_notifier::config` for the expected format. A missing file is
    /// treated as empty, so everything can come from the environment.
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and print the access token, device ID and a new pickle key.
    Init {
        /// Asked interactively when omitted.
        username: Option<String>,

        /// Prefer letting the command ask for it, arguments end up in the shell history.
        #[arg(long)]
        password: Option<String>,

        /// Must be given when `server_hostname` is not configured.
        #[arg(long)]
        server_url: Option<String>,
    },
    /// Send one message.
    Send {
        /// Message body.
        body: String,

        /// Connection string, defaults to `smatrix://{server_hostname}`.
        #[arg(long)]
        dsn: Option<String>,

        /// Recipient user (`@user:server`), room (`!room:server`) or alias (`#alias:server`).
        /// Defaults to the configured `default_recipient`.
        #[arg(long)]
        to: Option<String>,

        /// Send as `m.notice` instead of `m.text`.
        #[arg(long)]
        notice: bool,

        #[arg(long, value_enum, default_value_t = Render::Text)]
        render: Render,

        /// Print the receipt as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Render {
    Text,
    Html,
    Markdown,
}

impl From<Render> for RenderKind {
    fn from(render: Render) -> Self {
        match render {
            Render::Text => RenderKind::PlainText,
            Render::Html => RenderKind::Html,
            Render::Markdown => RenderKind::Markdown,
        }
    }
}

fn load_bridge(config: &Config) -> anyhow::Result<Arc<NativeLibrary>> {
    let library = NativeLibrary::load(&config.library_locator())?;
    Ok(Arc::new(library))
}

fn init(
    config: Config,
    username: Option<String>,
    password: Option<String>,
    server_url: Option<String>,
) -> anyhow::Result<ExitCode> {
    let bridge = load_bridge(&config)?;
    let flow = LoginFlow::new(bridge, config.server_hostname);
    let input = LoginInput {
        server_url,
        username,
        password: password.map(SecretString::from),
    };

    match flow.run(&mut TerminalConsole, input)? {
        LoginOutcome::Initialized(keys) => {
            info!("logged in with device {}", keys.device_id);
            Ok(ExitCode::SUCCESS)
        }
        LoginOutcome::Rejected(_) => Ok(ExitCode::FAILURE),
    }
}

fn send(
    config: Config,
    body: String,
    dsn: Option<String>,
    to: Option<String>,
    notice: bool,
    render: Render,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let dsn = match (dsn, &config.server_hostname) {
        (Some(dsn), _) => dsn,
        (None, Some(hostname)) => format!("smatrix://{}", hostname),
        (None, None) => {
            return Err(anyhow!(
                "no DSN given and server_hostname is not configured"
            ));
        }
    };

    let bridge = load_bridge(&config)?;
    let factory = TransportFactory::new(config.credentials(), bridge);
    let transport = factory
        .create_from_str(&dsn)
        .context("failed to create matrix transport")?;

    let options = MatrixOptions {
        recipient_id: to.or_else(|| transport.default_recipient().map(str::to_string)),
        message_kind: if notice {
            MessageKind::Notice
        } else {
            MessageKind::TextMessage
        },
        render_kind: render.into(),
    };
    let message = ChatMessage::new(&body).with_options(options.into());

    let sent = transport.send(&message.into())?;

    if json {
        let receipt = serde_json::json!({
            "message_id": sent.message_id,
            "transport": sent.transport,
        });
        println!("{}", receipt);
    } else {
        println!("{}", sent.message_id);
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load config file {}: {}", args.config, e);
            return ExitCode::FAILURE;
        }
    };

    let result = match args.command {
        Command::Init {
            username,
            password,
            server_url,
        } => init(config, username, password, server_url),
        Command::Send {
            body,
            dsn,
            to,
            notice,
            render,
            json,
        } => send(config, body, dsn, to, notice, render, json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
