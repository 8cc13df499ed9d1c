//! LRCLIB lyrics provider.
//!
//! Two endpoints are used:
//! - `GET /api/search?q=<query>` returns an array of track records, best first
//! - `GET /api/get/<id>` returns one record with its lyrics
//!
//! Plain lyrics are preferred; synced (LRC) lyrics are used when a record
//! has no plain text. Instrumental records have no lyrics.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::error::ProviderError;
use crate::lyrics::LyricsProvider;
use crate::models::Track;

pub const DEFAULT_BASE_URL: &str = "https://lrclib.net";

const USER_AGENT: &str = concat!("lyrics-tagger/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Track record as returned by both endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LrclibRecord {
    id: i64,
    #[serde(default)]
    track_name: String,
    #[serde(default)]
    artist_name: String,
    album_name: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    instrumental: bool,
    plain_lyrics: Option<String>,
    synced_lyrics: Option<String>,
}

impl LrclibRecord {
    fn lyrics_text(self) -> String {
        if self.instrumental {
            return String::new();
        }
        match self.plain_lyrics {
            Some(plain) if !plain.trim().is_empty() => plain,
            _ => self.synced_lyrics.unwrap_or_default(),
        }
    }
}

impl From<LrclibRecord> for Track {
    fn from(r: LrclibRecord) -> Self {
        Track {
            id: r.id.to_string(),
            title: r.track_name,
            artist: r.artist_name,
            album: r.album_name,
            duration_sec: r.duration,
        }
    }
}

pub fn parse_search_response(body: &str) -> Result<Vec<Track>, ProviderError> {
    let records: Vec<LrclibRecord> = parse_json(body)?;
    Ok(records.into_iter().map(Track::from).collect())
}

pub fn parse_lyrics_response(body: &str) -> Result<String, ProviderError> {
    let record: LrclibRecord = parse_json(body)?;
    Ok(record.lyrics_text())
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError(format!("invalid LRCLIB response: {e}")))
}

/// Blocking LRCLIB client. The underlying agent pools connections and is
/// shared by all concurrent lookups.
#[derive(Clone)]
pub struct LrclibClient {
    agent: ureq::Agent,
    base_url: String,
}

impl LrclibClient {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_body(&self, request: ureq::Request) -> Result<Option<String>, ProviderError> {
        match request.call() {
            Ok(response) => response
                .into_string()
                .map(Some)
                .map_err(|e| ProviderError(format!("couldn't read LRCLIB response: {e}"))),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(ureq::Error::Status(code, response)) => Err(ProviderError(format!(
                "LRCLIB returned HTTP {code} for {}",
                response.get_url()
            ))),
            Err(ureq::Error::Transport(transport)) => {
                Err(ProviderError(format!("LRCLIB request failed: {transport}")))
            }
        }
    }
}

impl Default for LrclibClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl LyricsProvider for LrclibClient {
    fn search(&self, query: &str) -> Result<Vec<Track>, ProviderError> {
        let url = format!("{}/api/search", self.base_url);
        match self.get_body(self.agent.get(&url).query("q", query))? {
            Some(body) => parse_search_response(&body),
            None => Ok(Vec::new()),
        }
    }

    fn lyrics(&self, track_id: &str) -> Result<String, ProviderError> {
        let url = format!("{}/api/get/{}", self.base_url, track_id);
        match self.get_body(self.agent.get(&url))? {
            Some(body) => parse_lyrics_response(&body),
            None => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_BODY: &str = r#"[
        {
            "id": 3396226,
            "trackName": "I Want to Live",
            "artistName": "Borislav Slavov",
            "albumName": "Baldur's Gate 3",
            "duration": 233.0,
            "instrumental": false,
            "plainLyrics": "I feel your breath upon my neck",
            "syncedLyrics": "[00:17.12] I feel your breath upon my neck"
        },
        {
            "id": 42,
            "trackName": "I Want to Live (Live)",
            "artistName": "Borislav Slavov",
            "albumName": null,
            "duration": null,
            "instrumental": false,
            "plainLyrics": null,
            "syncedLyrics": null
        }
    ]"#;

    #[test]
    fn test_parse_search_response() {
        let tracks = parse_search_response(SEARCH_BODY).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id, "3396226");
        assert_eq!(tracks[0].title, "I Want to Live");
        assert_eq!(tracks[0].album.as_deref(), Some("Baldur's Gate 3"));
        assert_eq!(tracks[0].duration_sec, Some(233.0));
        assert_eq!(tracks[1].album, None);
    }

    #[test]
    fn test_parse_search_response_empty_and_invalid() {
        assert!(parse_search_response("[]").unwrap().is_empty());
        let err = parse_search_response("<html>").unwrap_err();
        assert!(err.to_string().contains("invalid LRCLIB response"));
    }

    #[test]
    fn test_lyrics_prefers_plain_text() {
        let body = r#"{"id": 1, "plainLyrics": "plain", "syncedLyrics": "[00:01.00] synced"}"#;
        assert_eq!(parse_lyrics_response(body).unwrap(), "plain");
    }

    #[test]
    fn test_lyrics_falls_back_to_synced() {
        let body = r#"{"id": 1, "plainLyrics": "  ", "syncedLyrics": "[00:01.00] synced"}"#;
        assert_eq!(parse_lyrics_response(body).unwrap(), "[00:01.00] synced");
    }

    #[test]
    fn test_instrumental_has_no_lyrics() {
        let body = r#"{"id": 1, "instrumental": true, "plainLyrics": "ignored"}"#;
        assert_eq!(parse_lyrics_response(body).unwrap(), "");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        assert_eq!(LrclibClient::new("http://localhost:3000/").base_url(), "http://localhost:3000");
        assert_eq!(LrclibClient::default().base_url(), DEFAULT_BASE_URL);
    }
}
