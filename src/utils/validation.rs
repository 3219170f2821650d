//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Regex for a single DNS label
static DNS_LABEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$").unwrap()
});

/// Regex for environment file keys
static ENV_KEY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap()
});

/// Validate a fully-qualified domain name
pub fn validate_fqdn(name: &str) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > 253 {
        return false;
    }

    let labels: Vec<&str> = name.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| DNS_LABEL_REGEX.is_match(label))
}

/// Validate an environment variable name
pub fn validate_env_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= 128 && ENV_KEY_REGEX.is_match(key)
}

/// Validate a compose service name used as an upstream
pub fn validate_service_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '@')
}
