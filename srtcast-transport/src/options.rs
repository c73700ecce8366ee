//! Transport tuning options
//!
//! Options are carried as query parameters on the connection URI
//! (`srt://host:port?latency=120&rcvbuf=1000000`) and applied to the
//! socket when it is opened.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::Debug;
use std::str::FromStr;
use url::Url;

/// Socket tuning options parsed from a connection URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrtSocketOptions {
    /// Receiver latency in milliseconds
    #[serde(default = "default_latency")]
    pub latency_ms: u32,
    /// Receive buffer size in bytes
    #[serde(default)]
    pub rcvbuf: Option<usize>,
    /// Send buffer size in bytes
    #[serde(default)]
    pub sndbuf: Option<usize>,
    /// Maximum segment size in bytes
    #[serde(default = "default_mss")]
    pub mss: u32,
    /// Maximum bandwidth cap in bytes per second
    #[serde(default)]
    pub maxbw: Option<u64>,
    /// Connect timeout in milliseconds
    #[serde(default = "default_conntimeo")]
    pub conntimeo_ms: u64,
    /// Stream identifier announced to the peer
    #[serde(default)]
    pub streamid: Option<String>,
    /// Encryption passphrase
    #[serde(default)]
    pub passphrase: Option<String>,
}

fn default_latency() -> u32 {
    120
}

fn default_mss() -> u32 {
    1500
}

fn default_conntimeo() -> u64 {
    3000
}

impl Default for SrtSocketOptions {
    fn default() -> Self {
        SrtSocketOptions {
            latency_ms: default_latency(),
            rcvbuf: None,
            sndbuf: None,
            mss: default_mss(),
            maxbw: None,
            conntimeo_ms: default_conntimeo(),
            streamid: None,
            passphrase: None,
        }
    }
}

impl SrtSocketOptions {
    /// Parse options from a connection URI's query parameters
    ///
    /// Unknown keys are ignored; values that fail to parse leave the
    /// corresponding field at its default.
    pub fn from_uri(uri: &Url) -> Self {
        Self::from_query(uri.query_pairs())
    }

    /// Parse options from raw key/value pairs
    pub fn from_query<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Self {
        let mut options = SrtSocketOptions::default();
        for (key, value) in pairs {
            match key.as_ref() {
                "latency" => set_parsed(&mut options.latency_ms, "latency", &value),
                "rcvbuf" => set_parsed_opt(&mut options.rcvbuf, "rcvbuf", &value),
                "sndbuf" => set_parsed_opt(&mut options.sndbuf, "sndbuf", &value),
                "mss" => set_parsed(&mut options.mss, "mss", &value),
                "maxbw" => set_parsed_opt(&mut options.maxbw, "maxbw", &value),
                "conntimeo" => set_parsed(&mut options.conntimeo_ms, "conntimeo", &value),
                "streamid" => options.streamid = Some(value.into_owned()),
                "passphrase" => options.passphrase = Some(value.into_owned()),
                other => {
                    tracing::debug!("ignoring unknown transport option: {}", other);
                }
            }
        }
        options
    }

    /// Connect timeout as a duration
    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.conntimeo_ms)
    }
}

fn set_parsed<T: FromStr>(slot: &mut T, key: &str, value: &str)
where
    T::Err: Debug,
{
    match value.parse() {
        Ok(parsed) => *slot = parsed,
        Err(err) => {
            tracing::warn!("invalid value {:?} for option {}: {:?}", value, key, err);
        }
    }
}

fn set_parsed_opt<T: FromStr>(slot: &mut Option<T>, key: &str, value: &str)
where
    T::Err: Debug,
{
    match value.parse() {
        Ok(parsed) => *slot = Some(parsed),
        Err(err) => {
            tracing::warn!("invalid value {:?} for option {}: {:?}", value, key, err);
        }
    }
}
