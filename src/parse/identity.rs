use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};

/// Separator between hashed fields (ASCII unit separator)
const FIELD_SEP: &str = "\u{1f}";

/// Hex characters kept from a derived id
const DERIVED_LEN: usize = 12;

/// Hex characters in a persisted `id:` token
const TOKEN_LEN: usize = 8;

/// Derive a task's identity from its position and content. The same inputs
/// always give the same id; a line shift changes it.
pub fn derive_id(area: Option<&str>, description: &str, depth: usize, line: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(area.unwrap_or(""));
    hasher.update(FIELD_SEP);
    hasher.update(description);
    hasher.update(FIELD_SEP);
    hasher.update(depth.to_string());
    hasher.update(FIELD_SEP);
    hasher.update(line.to_string());
    let hex = format!("{:x}", hasher.finalize());
    hex[..DERIVED_LEN].to_string()
}

/// Generate a durable token for a newly created task
pub fn new_token(area: Option<&str>, description: &str, created: NaiveDateTime) -> String {
    let mut hasher = Sha256::new();
    hasher.update(area.unwrap_or(""));
    hasher.update(FIELD_SEP);
    hasher.update(description);
    hasher.update(FIELD_SEP);
    hasher.update(created.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    let hex = format!("{:x}", hasher.finalize());
    hex[..TOKEN_LEN].to_string()
}

/// Pick a token not already in use, re-hashing on collision
pub fn unique_token(
    area: Option<&str>,
    description: &str,
    created: NaiveDateTime,
    taken: &[&str],
) -> String {
    let mut token = new_token(area, description, created);
    let mut salt = 0u32;
    while taken.contains(&token.as_str()) {
        salt += 1;
        token = new_token(area, &format!("{}#{}", description, salt), created);
    }
    token
}
