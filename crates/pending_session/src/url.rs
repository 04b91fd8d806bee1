//! Travel URL handling.
//!
//! A [`ServerUrl`] is the structured address a connection attempt travels
//! to: host, port, map (level) identifier, and a list of `key=value` options.
//! The format is `host[:port]/Map?opt1?opt2=value`, with an optional scheme
//! prefix that is ignored. Unlike an RFC URL, every option is introduced by
//! its own `?`.
//!
//! The handshake mutates the stored URL as the server reveals information:
//! the challenge phase strips stale `game=` options and derives a host-less
//! partial URL for login, and the welcome phase merges the server's map name
//! and appends the authoritative game mode.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port assumed when an address does not name one.
pub const DEFAULT_PORT: u16 = 7777;

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("invalid port in address: {0}")]
    InvalidPort(String),
}

/// Structured travel address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerUrl {
    pub host: String,
    pub port: u16,
    pub map: String,
    pub options: Vec<String>,
    pub redirect_url: String,
}

impl Default for ServerUrl {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            map: String::new(),
            options: Vec::new(),
            redirect_url: String::new(),
        }
    }
}

impl ServerUrl {
    /// Parses a full travel address such as
    /// `127.0.0.1:7777/Highlands?team=blue`.
    ///
    /// The scheme (anything up to `://`) is ignored, the port defaults to
    /// [`DEFAULT_PORT`], and both the map and option list may be absent.
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let rest = input
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(input);

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| UrlError::InvalidPort(port.to_string()))?;
                (host.to_string(), port)
            }
            None => (authority.to_string(), DEFAULT_PORT),
        };

        let mut url = Self {
            host,
            port,
            ..Self::default()
        };
        url.merge_partial(path);
        Ok(url)
    }

    /// Merges a partial URL (`Map?opt1?opt2`) into this one.
    ///
    /// A non-empty map path replaces the stored map; options are appended
    /// after any existing ones. Existing non-map state is preserved.
    pub fn merge_partial(&mut self, partial: &str) {
        let mut parts = partial.split('?');
        if let Some(map) = parts.next() {
            if !map.is_empty() {
                self.map = map.to_string();
            }
        }
        self.options
            .extend(parts.filter(|opt| !opt.is_empty()).map(str::to_string));
    }

    /// Appends a `key=value` option.
    pub fn add_option(&mut self, option: impl Into<String>) {
        self.options.push(option.into());
    }

    /// Removes every option starting with `prefix` (case-insensitive).
    pub fn remove_options_with_prefix(&mut self, prefix: &str) {
        let prefix = prefix.to_ascii_lowercase();
        self.options
            .retain(|opt| !opt.to_ascii_lowercase().starts_with(&prefix));
    }

    /// Value of the first `key=value` option matching `key`
    /// (case-insensitive), if present.
    pub fn option_value(&self, key: &str) -> Option<&str> {
        self.options.iter().find_map(|opt| {
            let (name, value) = opt.split_once('=')?;
            name.eq_ignore_ascii_case(key).then_some(value)
        })
    }

    /// Clears the host portion, leaving a partial URL suitable for login.
    pub fn clear_host(&mut self) {
        self.host.clear();
        self.port = DEFAULT_PORT;
    }
}

impl std::fmt::Display for ServerUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.host.is_empty() {
            write!(f, "{}:{}", self.host, self.port)?;
        }
        write!(f, "/{}", self.map)?;
        for opt in &self.options {
            write!(f, "?{opt}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_address() {
        let url = ServerUrl::parse("198.51.100.4:9000/Highlands?team=blue?spectate").unwrap();
        assert_eq!(url.host, "198.51.100.4");
        assert_eq!(url.port, 9000);
        assert_eq!(url.map, "Highlands");
        assert_eq!(url.options, vec!["team=blue", "spectate"]);
    }

    #[test]
    fn port_and_path_are_optional() {
        let url = ServerUrl::parse("localhost").unwrap();
        assert_eq!(url.host, "localhost");
        assert_eq!(url.port, DEFAULT_PORT);
        assert!(url.map.is_empty());
        assert!(url.options.is_empty());
    }

    #[test]
    fn scheme_is_ignored() {
        let url = ServerUrl::parse("waypoint://localhost:7777/Dunes").unwrap();
        assert_eq!(url.host, "localhost");
        assert_eq!(url.map, "Dunes");
    }

    #[test]
    fn rejects_bad_port() {
        assert!(ServerUrl::parse("localhost:notaport/Map").is_err());
    }

    #[test]
    fn merge_overrides_map_and_appends_options() {
        let mut url = ServerUrl::parse("localhost/Lobby?team=red").unwrap();
        url.merge_partial("Highlands?biome=frost");
        assert_eq!(url.map, "Highlands");
        assert_eq!(url.options, vec!["team=red", "biome=frost"]);

        // An empty map part leaves the stored map alone.
        url.merge_partial("?late=1");
        assert_eq!(url.map, "Highlands");
        assert_eq!(url.option_value("late"), Some("1"));
    }

    #[test]
    fn prefix_removal_is_case_insensitive() {
        let mut url = ServerUrl::default();
        url.add_option("Game=old");
        url.add_option("game=older");
        url.add_option("team=blue");
        url.remove_options_with_prefix("game=");
        assert_eq!(url.options, vec!["team=blue"]);
    }

    #[test]
    fn partial_display_omits_host() {
        let mut url = ServerUrl::parse("localhost:7777/Highlands?team=blue").unwrap();
        url.clear_host();
        assert_eq!(url.to_string(), "/Highlands?team=blue");
    }
}
