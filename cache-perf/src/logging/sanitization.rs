use regex::Regex;
use std::sync::OnceLock;

/// Sanitization patterns for removing token material from logs
pub struct SanitizationPatterns {
    email: Regex,
    bearer_token: Regex,
    jwt: Regex,
    secret_field: Regex,
}

static PATTERNS: OnceLock<SanitizationPatterns> = OnceLock::new();

/// Get compiled regex patterns for sanitization
pub fn get_patterns() -> &'static SanitizationPatterns {
    PATTERNS.get_or_init(|| SanitizationPatterns {
        // Email addresses and UPNs - keep domain visible
        email: Regex::new(r"\b([a-zA-Z0-9._%+-]+)@([a-zA-Z0-9.-]+\.[a-zA-Z]{2,})\b").unwrap(),

        // Bearer tokens
        bearer_token: Regex::new(r"Bearer\s+[a-zA-Z0-9\-_\.]+").unwrap(),

        // Compact JWTs (header.payload.signature)
        jwt: Regex::new(r"\beyJ[a-zA-Z0-9_-]*\.[a-zA-Z0-9_-]*\.[a-zA-Z0-9_-]*").unwrap(),

        // Secrets and tokens passed as fields
        secret_field: Regex::new(
            r"(?i)(client_secret|secret|password|access_token|refresh_token)\s*[:=]\s*\S+",
        )
        .unwrap(),
    })
}

/// Sanitize log message by removing credentials and token material
///
/// - Email addresses (shows ***@domain.com)
/// - Bearer tokens (shows Bearer [REDACTED])
/// - JWT-looking tokens (shows [REDACTED])
/// - Secret and token fields (shows field=[REDACTED])
pub fn sanitize_log_message(message: &str) -> String {
    let patterns = get_patterns();
    let mut result = message.to_string();

    result = patterns.email.replace_all(&result, "***@$2").to_string();
    result = patterns.bearer_token.replace_all(&result, "Bearer [REDACTED]").to_string();
    result = patterns.jwt.replace_all(&result, "[REDACTED]").to_string();
    result = patterns.secret_field.replace_all(&result, "$1=[REDACTED]").to_string();

    result
}
