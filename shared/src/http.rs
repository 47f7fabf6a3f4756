//! Helpers shared by REST clients talking to the school API.

use serde::Deserialize;
use url::Url;

/// The parts of a non-2xx response body that callers act on.
///
/// The API reports failures as `{"code": "...", "detail": "..."}`. Older
/// endpoints use `error_code` and `message` instead; both spellings are
/// accepted. Unknown fields are ignored.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    #[serde(default, alias = "error_code")]
    pub code: Option<String>,
    #[serde(default, alias = "message")]
    pub detail: Option<String>,
}

/// Decodes an error body. Never fails: bodies that are not a JSON object
/// with the expected fields become a bare detail string, or nothing if the
/// body is empty.
pub fn parse_error_body(body: &[u8]) -> ErrorEnvelope {
    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) {
        return envelope;
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    ErrorEnvelope {
        code: None,
        detail: (!text.is_empty()).then_some(text),
    }
}

/// Joins a relative endpoint path onto the API base URL.
///
/// The base is treated as a directory even when it was configured without a
/// trailing slash, so `https://host/api` + `marks/` is `https://host/api/marks/`.
pub fn endpoint_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    base.join(path.trim_start_matches('/'))
}
