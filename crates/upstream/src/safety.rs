//! URL checks and credential redaction for upstream requests.
//!
//! The API key travels in a header, never in the URL, but upstream-provided media URLs and
//! operator-supplied base URLs may still carry userinfo or query tokens. Anything that ends up in
//! logs or error messages goes through [`redact_url`] first.

use crate::error::UpstreamError;
use url::Url;

/// Validate the configured upstream base URL.
///
/// # Errors
///
/// Returns an error for non-`http(s)` schemes or URLs without a host.
pub fn check_base_url(url: &Url) -> Result<(), UpstreamError> {
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(UpstreamError::Config(format!(
            "unsupported URL scheme '{scheme}' for Sonarr base URL"
        )));
    }
    if url.host_str().is_none() {
        return Err(UpstreamError::Config(
            "Sonarr base URL is missing a host".to_string(),
        ));
    }
    Ok(())
}

/// Ensure a resolved media URL stays on the upstream origin.
///
/// Media paths come from upstream records; following one to a foreign host would leak the API
/// key header.
///
/// # Errors
///
/// Returns an error if `candidate` does not share `root`'s scheme, host and port.
pub fn check_same_origin(root: &Url, candidate: &Url) -> Result<(), UpstreamError> {
    if root.origin() == candidate.origin() {
        Ok(())
    } else {
        Err(UpstreamError::Decode(format!(
            "media URL '{}' is outside the upstream origin",
            redact_url(candidate)
        )))
    }
}

#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    // Best-effort: drop credentials + query + fragment.
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}
