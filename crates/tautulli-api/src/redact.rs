/// Replacement text for a redacted credential
pub const REDACTED: &str = "**REDACTED**";

/// Replace every occurrence of `secret` in `text`, raw or form-encoded the
/// way it appears inside a query string
pub fn redact_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    let mut redacted = text.replace(secret, REDACTED);
    if let Some(encoded) = form_encoded(secret) {
        redacted = redacted.replace(&encoded, REDACTED);
    }
    redacted
}

/// `secret` as a query value, when encoding changes it
fn form_encoded(secret: &str) -> Option<String> {
    let pair = serde_urlencoded::to_string([("", secret)]).ok()?;
    let value = pair.strip_prefix('=')?;
    (value != secret).then(|| value.to_string())
}
