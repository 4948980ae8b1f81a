//! Command-line client for the Ahuri chat service.
//!
//! # Usage
//!
//! ```bash
//! # Stream a channel until Ctrl-C
//! ahuri channel connect 64f1c0ffee
//!
//! # Send one message
//! ahuri channel send 64f1c0ffee --message "hello"
//!
//! # Inspect or change the configuration
//! ahuri config time_format
//! ahuri config time_format "%H:%M:%S"
//! ahuri config --reset
//! ```
//!
//! Exit status is 0 when a stream ends cleanly (interrupted or closed by the
//! server) and 1 on any error.

use std::io;

use arrrg::CommandLine;
use chrono::Local;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ahuri::cli::{
    Args, CONFIG_RESET_MESSAGE, Command, USAGE, config_set_message, parse_command,
};
use ahuri::config::{ConfigStore, SessionContext, TIME_FORMAT_KEY, validate_time_format};
use ahuri::render::{format_time, message_block};
use ahuri::{
    ApiClient, ChannelResolver, Error, PlainTextRenderer, Renderer, Result, StreamSession,
    unless_cancelled,
};

#[tokio::main]
async fn main() {
    let (args, free) = Args::from_command_line_relaxed(USAGE);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "warn" }));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let mut renderer = PlainTextRenderer::with_color(!args.no_color);
    let command = parse_command(&args, &free);
    let code = match execute(command, &mut renderer).await {
        Ok(code) => code,
        Err(err) => {
            renderer.print_error(&err.to_string());
            1
        }
    };
    std::process::exit(code);
}

async fn execute(command: Command, renderer: &mut PlainTextRenderer) -> Result<i32> {
    match command {
        Command::Version => {
            println!("ahuri {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        Command::Invalid(message) => {
            renderer.print_error(&message);
            eprintln!("USAGE: {USAGE}");
            Ok(1)
        }
        Command::Connect(id) => {
            let store = open_store(renderer)?;
            connect(&store, &id, renderer).await
        }
        Command::Send { id, message } => {
            let store = open_store(renderer)?;
            send(&store, &id, &message, renderer).await?;
            Ok(0)
        }
        Command::ConfigGet(key) => {
            let store = open_store(renderer)?;
            match store.get(&key) {
                Some(Value::String(value)) => println!("{value}"),
                Some(value) => println!("{value}"),
                None => renderer.print_info(&format!("'{key}' is not set")),
            }
            Ok(0)
        }
        Command::ConfigSet(key, value) => {
            let mut store = open_store(renderer)?;
            if key == TIME_FORMAT_KEY {
                validate_time_format(&value)?;
            }
            store.set(&key, Value::String(value.clone()))?;
            renderer.print_info(&config_set_message(&key, &value));
            Ok(0)
        }
        Command::ConfigReset => {
            let mut store = open_store(renderer)?;
            store.reset()?;
            renderer.print_info(CONFIG_RESET_MESSAGE);
            Ok(0)
        }
    }
}

fn open_store(renderer: &mut PlainTextRenderer) -> Result<ConfigStore> {
    let store = ConfigStore::open(ConfigStore::default_path()?)?;
    if store.was_reset() {
        renderer.print_notice(&format!(
            "Config file {} was unreadable and has been reset",
            store.path().display()
        ));
    }
    Ok(store)
}

async fn connect(store: &ConfigStore, id: &str, renderer: &mut PlainTextRenderer) -> Result<i32> {
    let context = SessionContext::from_store(store, id)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    ctrlc::set_handler(move || interrupt.cancel()).map_err(|e| {
        Error::io("could not install the interrupt handler", io::Error::other(e))
    })?;

    renderer.print_info(&format!("Getting channel from ID '{}'", context.channel_id()));
    let resolver = ChannelResolver::for_context(&context)?;
    let Some(channel) = unless_cancelled(&cancel, resolver.resolve(context.channel_id())).await
    else {
        return Ok(interrupted(renderer));
    };
    let channel = channel?;
    renderer.print_info(&format!("Connecting to channel '{}'", channel.name));

    let Some(session) = unless_cancelled(&cancel, StreamSession::connect(context)).await else {
        return Ok(interrupted(renderer));
    };
    let termination = session?.with_channel(channel).run(renderer, &cancel).await;
    Ok(if termination.is_clean() { 0 } else { 1 })
}

fn interrupted(renderer: &mut PlainTextRenderer) -> i32 {
    renderer.print_notice("Keyboard Interrupt sent. Exiting");
    0
}

async fn send(
    store: &ConfigStore,
    id: &str,
    message: &str,
    renderer: &mut PlainTextRenderer,
) -> Result<()> {
    let client = ApiClient::new(store.api_url()?, Some(store.auth_token()?))?;
    let time_format = store.time_format()?;

    renderer.print_info("Sending message");
    let sent = ahuri::send_message(&client, id, message).await?;
    renderer.print_info("Sent!");

    let time = format_time(&Local::now(), &time_format)?;
    let mut lines = vec!["Message preview:".to_string()];
    lines.extend(message_block(&sent, &time));
    renderer.print_lines(&lines);
    Ok(())
}
