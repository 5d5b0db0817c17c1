//! Deep-link payload extraction and embedded identity parsing.
//!
//! The webapp deep link carries a `tgWebAppData` parameter whose value is a
//! URL-encoded blob. The blob itself is a query-string-shaped payload and
//! embeds a `user=` parameter holding a URL-encoded JSON identity object.
//! Both steps are pure string work with no network or retry concerns.

use crate::error::{FarmError, Result};
use serde::Deserialize;

/// Query parameter carrying the init payload in the deep link.
const INIT_DATA_PARAM: &str = "tgWebAppData=";

/// Identity object embedded in the init payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserIdentity {
    /// Numeric user id.
    pub id: i64,
    /// First name.
    pub first_name: String,
    /// Last name; absent for many accounts.
    #[serde(default)]
    pub last_name: String,
}

/// Extract and decode the init payload from a webapp deep link.
///
/// The parameter may appear in the query or the fragment; the link is
/// scanned as an opaque string, matching how the upstream front end builds
/// it. Returns [`FarmError::Malformed`] when the parameter is absent.
pub fn extract_init_payload(link: &str) -> Result<String> {
    let Some(start) = link.find(INIT_DATA_PARAM) else {
        return Err(FarmError::Malformed(
            "link has no tgWebAppData parameter".to_owned(),
        ));
    };

    let raw = &link[start + INIT_DATA_PARAM.len()..];
    let raw = raw.split('&').next().unwrap_or(raw);

    let decoded = urlencoding::decode(raw)
        .map_err(|e| FarmError::Malformed(format!("init payload is not valid UTF-8: {e}")))?;
    Ok(decoded.into_owned())
}

/// Parse the embedded `user=` object out of a decoded init payload as raw
/// JSON.
///
/// The registration call forwards the whole object verbatim, so fields we
/// do not model (username, language code) must survive. Returns
/// [`FarmError::Malformed`] when the parameter is absent or the JSON does
/// not decode.
pub fn parse_user_value(init_payload: &str) -> Result<serde_json::Value> {
    let encoded = init_payload
        .split('&')
        .find_map(|pair| pair.strip_prefix("user="))
        .ok_or_else(|| {
            FarmError::Malformed("init payload has no user parameter".to_owned())
        })?;

    let decoded = urlencoding::decode(encoded)
        .map_err(|e| FarmError::Malformed(format!("user blob is not valid UTF-8: {e}")))?;

    serde_json::from_str(&decoded)
        .map_err(|e| FarmError::Malformed(format!("user blob is not valid JSON: {e}")))
}

/// Parse the typed identity out of a decoded init payload.
pub fn parse_user_identity(init_payload: &str) -> Result<UserIdentity> {
    let value = parse_user_value(init_payload)?;
    serde_json::from_value(value)
        .map_err(|e| FarmError::Malformed(format!("user blob has unexpected shape: {e}")))
}
