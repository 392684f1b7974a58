//! Prefix command parsing.
//!
//! ```text
//! p;enable <#channel> [webhook-url]
//! p;migrate
//! p;disable
//! p;configure [nsfw on|off]
//! p;help
//! ```

use pins_core::ChannelId;

use crate::error::CommandError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Enable {
        channel: ChannelId,
        webhook_url: Option<String>,
    },
    Migrate,
    Disable,
    /// `None` shows the current settings.
    Configure(Option<Setting>),
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    IncludeNsfw(bool),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Enable { .. } => "enable",
            Command::Migrate => "migrate",
            Command::Disable => "disable",
            Command::Configure(_) => "configure",
            Command::Help => "help",
        }
    }

    /// Whether the invoking member needs Manage Webhooks + Manage Messages.
    pub fn requires_manager(&self) -> bool {
        !matches!(self, Command::Help)
    }
}

/// Parse a message body.
///
/// `None` when the message is not addressed to the bot (no prefix, or an
/// unknown command name). `Some(Err(_))` carries a usage reply.
pub fn parse(content: &str, prefixes: &[String]) -> Option<Result<Command, CommandError>> {
    let content = content.trim_start();
    let rest = prefixes
        .iter()
        .filter(|p| !p.is_empty())
        .find_map(|p| strip_prefix_ignore_case(content, p))?;

    let mut words = rest.split_whitespace();
    let name = words.next()?.to_ascii_lowercase();
    let args: Vec<&str> = words.collect();
    let prefix = &content[..content.len() - rest.len()];

    let parsed = match name.as_str() {
        "enable" => parse_enable(&args, prefix),
        "migrate" => Ok(Command::Migrate),
        "disable" => Ok(Command::Disable),
        "configure" | "config" => parse_configure(&args, prefix),
        "help" => Ok(Command::Help),
        _ => return None,
    };
    Some(parsed)
}

fn strip_prefix_ignore_case<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    let head = content.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &content[prefix.len()..])
}

fn parse_enable(args: &[&str], prefix: &str) -> Result<Command, CommandError> {
    let usage = || {
        CommandError::configuration(format!(
            "Usage: `{prefix}enable #channel [webhook url]`"
        ))
    };
    match args {
        [channel] => Ok(Command::Enable {
            channel: parse_channel(channel).ok_or_else(usage)?,
            webhook_url: None,
        }),
        [channel, url] => Ok(Command::Enable {
            channel: parse_channel(channel).ok_or_else(usage)?,
            webhook_url: Some(url.trim_matches(|c| c == '<' || c == '>').to_string()),
        }),
        _ => Err(usage()),
    }
}

fn parse_configure(args: &[&str], prefix: &str) -> Result<Command, CommandError> {
    match args {
        [] => Ok(Command::Configure(None)),
        [key, value] if key.eq_ignore_ascii_case("nsfw") => match parse_switch(value) {
            Some(on) => Ok(Command::Configure(Some(Setting::IncludeNsfw(on)))),
            None => Err(configure_usage(prefix)),
        },
        _ => Err(configure_usage(prefix)),
    }
}

fn configure_usage(prefix: &str) -> CommandError {
    CommandError::configuration(format!("Usage: `{prefix}configure nsfw <on|off>`"))
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "enable" => Some(true),
        "off" | "false" | "no" | "disable" => Some(false),
        _ => None,
    }
}

/// `<#123>` or a bare `123`. Zero is never a valid snowflake.
fn parse_channel(raw: &str) -> Option<ChannelId> {
    let digits = raw
        .strip_prefix("<#")
        .and_then(|r| r.strip_suffix('>'))
        .unwrap_or(raw);
    let id: ChannelId = digits.parse().ok()?;
    (id.get() != 0).then_some(id)
}
