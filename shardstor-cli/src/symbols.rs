//! Styled status markers for terminal output
//!
//! Windows consoles get ASCII fallbacks for the Unicode glyphs.

use console::{style, StyledObject};
use shardstor_client::CheckStatus;

#[cfg(not(windows))]
mod glyph {
    pub const OK: &str = "\u{2713}";
    pub const FAIL: &str = "\u{2717}";
    pub const WARN: &str = "!";
    pub const HEALTH: &str = "\u{25CF}";
    pub const RULE: char = '\u{2500}';
}

#[cfg(windows)]
mod glyph {
    pub const OK: &str = "[OK]";
    pub const FAIL: &str = "[X]";
    pub const WARN: &str = "[!]";
    pub const HEALTH: &str = "(*)";
    pub const RULE: char = '-';
}

/// Green marker for a finished operation
pub fn ok() -> StyledObject<&'static str> {
    style(glyph::OK).green()
}

pub fn fail() -> StyledObject<&'static str> {
    style(glyph::FAIL).red()
}

pub fn warn() -> StyledObject<&'static str> {
    style(glyph::WARN).yellow()
}

/// Marker coloured by object health
pub fn health(status: CheckStatus) -> StyledObject<&'static str> {
    let marker = style(glyph::HEALTH);
    match status {
        CheckStatus::Optimal => marker.green(),
        CheckStatus::Valid => marker.yellow(),
        CheckStatus::Invalid => marker.red(),
    }
}

/// Underline sized to `title`
pub fn rule(title: &str) -> String {
    std::iter::repeat(glyph::RULE)
        .take(title.chars().count().max(12))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_covers_title() {
        assert_eq!(rule("k").chars().count(), 12);
        assert_eq!(rule("photos/2024/holiday.jpg").chars().count(), 23);
    }

    #[test]
    fn test_health_keeps_glyph() {
        for status in [CheckStatus::Optimal, CheckStatus::Valid, CheckStatus::Invalid] {
            assert_eq!(health(status).force_styling(false).to_string(), glyph::HEALTH);
        }
    }
}
