use std::time::Duration;

/// Parse a boolean value from a raw string, accepting common env-style forms.
///
/// Accepted truthy values (case-insensitive): `"1"`, `"true"`, `"yes"`, `"on"`.
/// Accepted falsy values: `"0"`, `"false"`, `"no"`, `"off"`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Durations accept humantime text (`"10m"`, `"90s"`) or a bare number of
/// minutes, which is how the scheduler variables have always been written.
pub fn parse_duration_minutes(raw: &str) -> Option<Duration> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(minutes) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(minutes.saturating_mul(60)));
    }
    humantime::parse_duration(trimmed).ok()
}

pub fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bools_accept_env_forms() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" on "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn bare_numbers_are_minutes() {
        assert_eq!(
            parse_duration_minutes("10"),
            Some(Duration::from_secs(600))
        );
        assert_eq!(
            parse_duration_minutes("90s"),
            Some(Duration::from_secs(90))
        );
        assert_eq!(parse_duration_minutes("  "), None);
        assert_eq!(parse_duration_minutes("soon"), None);
    }
}
