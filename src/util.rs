const SMTP_PASSWORD: &str = "HOSTWATCH_SMTP_PASSWORD";

pub fn get_smtp_password() -> Option<String> {
    let password_from_env = std::env::var(SMTP_PASSWORD);
    password_from_env.ok()
}

const API_KEY: &str = "HOSTWATCH_API_KEY";

pub fn get_api_key() -> Option<String> {
    let key_from_env = std::env::var(API_KEY);
    key_from_env.ok()
}

/// Grace added on top of the probe timeout before the scheduler gives up on
/// a probe that ignores its own timeout.
pub const PROBE_TIMEOUT_SLACK_MS: u64 = 1000;
