//! Command-line arguments and subcommand parsing for the `ahuri` binary.
//!
//! Options are parsed by `arrrg`; whatever is left over is a subcommand such
//! as `channel connect <id>` and is turned into a [`Command`] here.

use arrrg_derive::CommandLine;

/// Usage line passed to `arrrg`.
pub const USAGE: &str = "ahuri [OPTIONS] <channel connect ID | channel send ID --message TEXT | config VARIABLE [VALUE] | config --reset>";

/// Command-line options for `ahuri`.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct Args {
    /// Log debug output to stderr.
    #[arrrg(flag, "Log requests and session state changes")]
    pub verbose: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Print the version and exit.
    #[arrrg(flag, "Print the version and exit")]
    pub version: bool,

    /// Reset the configuration file (with `config`).
    #[arrrg(flag, "Reset the configuration file to its defaults")]
    pub reset: bool,

    /// Message text (with `channel send`).
    #[arrrg(optional, "Message to send", "TEXT")]
    pub message: Option<String>,
}

/// A parsed subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stream a channel until interrupted.
    Connect(String),

    /// Send one message to a channel.
    Send {
        /// The channel identifier.
        id: String,
        /// The message text.
        message: String,
    },

    /// Print a configuration value.
    ConfigGet(String),

    /// Set a configuration value.
    ConfigSet(String, String),

    /// Rewrite the configuration file with its defaults.
    ConfigReset,

    /// Print the version.
    Version,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Printed after `config --reset`.
pub const CONFIG_RESET_MESSAGE: &str = "Reset config file!";

/// Printed after `config KEY VALUE` has been written.
pub fn config_set_message(key: &str, value: &str) -> String {
    format!("Successfully changed value of '{key}' in the config file to '{value}'.")
}

/// Turn the options and free arguments into a [`Command`].
pub fn parse_command(args: &Args, free: &[String]) -> Command {
    if args.version {
        return Command::Version;
    }
    let free: Vec<&str> = free.iter().map(String::as_str).collect();
    match free.as_slice() {
        ["channel", "connect", id] => Command::Connect(id.to_string()),
        ["channel", "connect"] => Command::Invalid("channel connect requires a channel ID".into()),
        ["channel", "send", id] => match &args.message {
            Some(message) => Command::Send {
                id: id.to_string(),
                message: message.clone(),
            },
            None => Command::Invalid("channel send requires --message".into()),
        },
        ["channel", "send"] => Command::Invalid("channel send requires a channel ID".into()),
        ["channel", other, ..] => Command::Invalid(format!("unknown channel command '{other}'")),
        ["channel"] => Command::Invalid("channel requires a command".into()),
        ["config"] if args.reset => Command::ConfigReset,
        ["config", key] => Command::ConfigGet(key.to_string()),
        ["config", key, value] => Command::ConfigSet(key.to_string(), value.to_string()),
        ["config", ..] => Command::Invalid("config takes a variable and an optional value".into()),
        [] => Command::Invalid("no command given".into()),
        [other, ..] => Command::Invalid(format!("unknown command '{other}'")),
    }
}
