//! Persistent client configuration and the per-connection session context.
//!
//! The configuration lives in a JSON file (by default
//! `~/.config/ahuri-cli/config.json`).  Keys may be dotted to reach into nested
//! objects, so the auth token is read and written as `user.token`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{Error, Result};

/// Default REST endpoint.
pub const DEFAULT_API_URL: &str = "http://18.169.99.65:81";

/// Default socket endpoint.
pub const DEFAULT_WS_URL: &str = "ws://18.169.99.65:81/ws";

/// Default strftime pattern used to timestamp rendered messages.
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M";

/// Key of the REST endpoint.
pub const API_URL_KEY: &str = "api_url";

/// Key of the socket endpoint.
pub const WS_URL_KEY: &str = "ws_url";

/// Key of the time display format.
pub const TIME_FORMAT_KEY: &str = "time_format";

/// Key of the auth token.
pub const TOKEN_KEY: &str = "user.token";

/// A key-value store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    values: Map<String, Value>,
    was_reset: bool,
}

impl ConfigStore {
    /// The default location of the configuration file.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| {
            Error::config_missing("home", "Could not determine the home directory.")
        })?;
        Ok(home.join(".config").join("ahuri-cli").join("config.json"))
    }

    /// Open the store at `path`.
    ///
    /// Missing directories and a missing file are created with the defaults.
    /// A file that is unreadable as a JSON object is replaced by the defaults;
    /// [`ConfigStore::was_reset`] reports when that happened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::io(format!("could not create {}: {e}", parent.display()), e)
            })?;
        }
        let mut store = Self {
            path,
            values: Self::defaults(),
            was_reset: false,
        };
        if !store.path.exists() {
            tracing::debug!(path = %store.path.display(), "writing default config file");
            store.save()?;
            return Ok(store);
        }
        let text = fs::read_to_string(&store.path)
            .map_err(|e| Error::io(format!("could not read {}: {e}", store.path.display()), e))?;
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(values)) => {
                store.values = values;
            }
            _ => {
                tracing::warn!(path = %store.path.display(), "config file is broken, resetting");
                store.save()?;
                store.was_reset = true;
            }
        }
        Ok(store)
    }

    /// The path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if [`ConfigStore::open`] had to replace a broken file.
    pub fn was_reset(&self) -> bool {
        self.was_reset
    }

    /// Look up `key`, following dots into nested objects.
    ///
    /// Absent keys and JSON nulls both read as `None`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        let mut value = self.values.get(first)?;
        for part in parts {
            value = value.as_object()?.get(part)?;
        }
        if value.is_null() { None } else { Some(value) }
    }

    /// Look up `key`, returning `default` when it is absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.get(key).unwrap_or(default)
    }

    /// Set `key` to `value` and persist the file.
    ///
    /// Intermediate objects of a dotted key are created as needed, replacing
    /// any non-object value in the way.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(Error::validation(
                format!("'{key}' is not a valid config key"),
                Some("key".to_string()),
            ));
        }
        let (last, parents) = match parts.split_last() {
            Some(split) => split,
            None => return Err(Error::validation("empty config key", Some("key".to_string()))),
        };
        let mut map = &mut self.values;
        for part in parents {
            let entry = map
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            map = entry.as_object_mut().ok_or_else(|| {
                Error::validation(format!("'{part}' is not an object"), Some(key.to_string()))
            })?;
        }
        map.insert(last.to_string(), value);
        tracing::debug!(key, "updating config file");
        self.save()
    }

    /// Replace the whole file with the defaults.
    pub fn reset(&mut self) -> Result<()> {
        self.values = Self::defaults();
        tracing::debug!(path = %self.path.display(), "resetting config file");
        self.save()
    }

    /// The REST endpoint.
    pub fn api_url(&self) -> Result<Url> {
        let raw = self.require_str(API_URL_KEY)?;
        parse_endpoint(API_URL_KEY, raw, &["http", "https"])
    }

    /// The socket endpoint.
    pub fn ws_url(&self) -> Result<Url> {
        let raw = self.require_str(WS_URL_KEY)?;
        parse_endpoint(WS_URL_KEY, raw, &["ws", "wss"])
    }

    /// The time display format, checked to be a valid strftime pattern.
    pub fn time_format(&self) -> Result<String> {
        let raw = self.require_str(TIME_FORMAT_KEY)?;
        validate_time_format(raw)?;
        Ok(raw.to_string())
    }

    /// The auth token of the logged-in user.
    pub fn auth_token(&self) -> Result<String> {
        if self.get("user").is_none() {
            return Err(Error::config_missing(
                TOKEN_KEY,
                "No 'user' found in config file. Please log in to fix this.",
            ));
        }
        match self.get(TOKEN_KEY) {
            None => Err(Error::config_missing(
                TOKEN_KEY,
                "Not logged in. Please log in.",
            )),
            Some(Value::String(token)) if !token.is_empty() => Ok(token.clone()),
            Some(Value::String(_)) => Err(Error::config_missing(
                TOKEN_KEY,
                "Not logged in. Please log in.",
            )),
            Some(_) => Err(Error::config_missing(
                TOKEN_KEY,
                "Invalid token, Log in again to fix this.",
            )),
        }
    }

    fn require_str(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            None => Err(Error::config_missing(
                key,
                format!("No '{key}' found in config file."),
            )),
            Some(Value::String(s)) if s.trim().is_empty() => Err(Error::config_missing(
                key,
                format!("'{key}' not set in config."),
            )),
            Some(Value::String(s)) => Ok(s.trim()),
            Some(_) => Err(Error::config_missing(
                key,
                format!("Invalid format for '{key}'. Please reset config file to fix this."),
            )),
        }
    }

    fn save(&self) -> Result<()> {
        let sorted = sort_keys(&Value::Object(self.values.clone()));
        let text = serde_json::to_string_pretty(&sorted)?;
        fs::write(&self.path, text)
            .map_err(|e| Error::io(format!("could not write {}: {e}", self.path.display()), e))
    }

    fn defaults() -> Map<String, Value> {
        let mut user = Map::new();
        user.insert("token".to_string(), Value::Null);
        let mut values = Map::new();
        values.insert(API_URL_KEY.to_string(), Value::from(DEFAULT_API_URL));
        values.insert(TIME_FORMAT_KEY.to_string(), Value::from(DEFAULT_TIME_FORMAT));
        values.insert("user".to_string(), Value::Object(user));
        values.insert(WS_URL_KEY.to_string(), Value::from(DEFAULT_WS_URL));
        values
    }
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn parse_endpoint(key: &str, raw: &str, schemes: &[&str]) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::url(format!("'{key}' is not a valid URL: {e}"), Some(e)))?;
    if !schemes.contains(&url.scheme()) {
        return Err(Error::validation(
            format!(
                "'{key}' must use one of the schemes {}, got '{}'",
                schemes.join(", "),
                url.scheme()
            ),
            Some(key.to_string()),
        ));
    }
    Ok(url)
}

/// Check that `format` is a strftime pattern chrono can render.
pub fn validate_time_format(format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::validation(
            format!("'{format}' is not a valid time format"),
            Some(TIME_FORMAT_KEY.to_string()),
        ));
    }
    Ok(())
}

/// Everything one stream session needs, resolved and validated up front.
///
/// Built once before connecting and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    token: String,
    channel_id: String,
    api_url: Url,
    ws_url: Url,
    time_format: String,
}

impl SessionContext {
    /// Create a context from explicit values, validating each of them.
    pub fn new(
        token: impl Into<String>,
        channel_id: impl Into<String>,
        api_url: Url,
        ws_url: Url,
        time_format: impl Into<String>,
    ) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::config_missing(TOKEN_KEY, "Not logged in. Please log in."));
        }
        let channel_id = channel_id.into().trim().to_string();
        if channel_id.is_empty() {
            return Err(Error::validation(
                "channel id must not be empty",
                Some("id".to_string()),
            ));
        }
        let time_format = time_format.into();
        if time_format.is_empty() {
            return Err(Error::config_missing(
                TIME_FORMAT_KEY,
                format!("'{TIME_FORMAT_KEY}' not set in config."),
            ));
        }
        validate_time_format(&time_format)?;
        Ok(Self {
            token,
            channel_id,
            api_url,
            ws_url,
            time_format,
        })
    }

    /// Resolve a context for `channel_id` from the configuration store.
    pub fn from_store(store: &ConfigStore, channel_id: &str) -> Result<Self> {
        let api_url = store.api_url()?;
        let ws_url = store.ws_url()?;
        let time_format = store.time_format()?;
        let token = store.auth_token()?;
        Self::new(token, channel_id, api_url, ws_url, time_format)
    }

    /// The auth token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The channel to subscribe to.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// The REST endpoint.
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// The socket endpoint.
    pub fn ws_url(&self) -> &Url {
        &self.ws_url
    }

    /// The strftime pattern for message timestamps.
    pub fn time_format(&self) -> &str {
        &self.time_format
    }
}
