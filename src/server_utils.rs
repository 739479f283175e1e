use crate::constants::{DEFAULT_PLAYER_COLOR, DEFAULT_PLAYER_NAME, MAX_PLAYER_NAME_CHARS};

pub fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return DEFAULT_PLAYER_NAME.to_string();
    }
    trimmed.chars().take(MAX_PLAYER_NAME_CHARS).collect()
}

/// Accepts `#rgb`, `#rrggbb` or a plain css color keyword.
pub fn sanitize_color(value: Option<&str>) -> String {
    let Some(raw) = value.map(str::trim) else {
        return DEFAULT_PLAYER_COLOR.to_string();
    };
    let valid = if let Some(hex) = raw.strip_prefix('#') {
        matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
    } else {
        !raw.is_empty() && raw.len() <= 20 && raw.chars().all(|c| c.is_ascii_alphabetic())
    };
    if valid {
        raw.to_ascii_lowercase()
    } else {
        DEFAULT_PLAYER_COLOR.to_string()
    }
}

pub fn player_order_key(player_id: &str) -> u64 {
    player_id
        .rsplit('_')
        .next()
        .and_then(|suffix| suffix.parse::<u64>().ok())
        .unwrap_or(u64::MAX)
}

pub fn normalize_player_count(value: Option<i64>) -> usize {
    value.unwrap_or(3).clamp(1, 32) as usize
}

pub fn parse_port(raw: Option<&str>) -> u16 {
    raw.and_then(|value| value.trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
        .unwrap_or(8080)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_order_key_uses_numeric_suffix() {
        assert!(player_order_key("player_2") < player_order_key("player_10"));
        assert_eq!(player_order_key("anonymous"), u64::MAX);
    }

    #[test]
    fn sanitize_name_applies_trim_empty_and_max_len() {
        assert_eq!(sanitize_name(""), "Player");
        assert_eq!(sanitize_name("   "), "Player");
        assert_eq!(sanitize_name(" Alice "), "Alice");
        assert_eq!(sanitize_name("12345678901234567890"), "1234567890123456");
    }

    #[test]
    fn sanitize_color_keeps_hex_and_keywords() {
        assert_eq!(sanitize_color(Some("#FF8800")), "#ff8800");
        assert_eq!(sanitize_color(Some(" #abc ")), "#abc");
        assert_eq!(sanitize_color(Some("Crimson")), "crimson");
    }

    #[test]
    fn sanitize_color_falls_back_on_garbage() {
        assert_eq!(sanitize_color(None), "#ffffff");
        assert_eq!(sanitize_color(Some("")), "#ffffff");
        assert_eq!(sanitize_color(Some("#12")), "#ffffff");
        assert_eq!(sanitize_color(Some("#zzzzzz")), "#ffffff");
        assert_eq!(sanitize_color(Some("red; background: url(x)")), "#ffffff");
    }

    #[test]
    fn normalize_player_count_clamps_range() {
        assert_eq!(normalize_player_count(None), 3);
        assert_eq!(normalize_player_count(Some(-10)), 1);
        assert_eq!(normalize_player_count(Some(5)), 5);
        assert_eq!(normalize_player_count(Some(999)), 32);
    }

    #[test]
    fn parse_port_is_lenient() {
        assert_eq!(parse_port(None), 8080);
        assert_eq!(parse_port(Some("3000")), 3000);
        assert_eq!(parse_port(Some("0")), 8080);
        assert_eq!(parse_port(Some("http")), 8080);
    }
}
