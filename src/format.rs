use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

static RICH_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<link>https?://\S+)|(?P<mention>@[\w.-]+)|(?P<tag>#\w+)")
        .expect("rich text pattern is valid")
});

const MINUTES_IN_DAY: i64 = 1440;
const MINUTES_IN_MONTH: i64 = 43200;
const MINUTES_IN_TWO_MONTHS: i64 = 86400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Mention,
    Link,
    Hashtag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

/// Splits post text into plain runs, `@mentions`, links and `#tags`.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for caps in RICH_TEXT_RE.captures_iter(text) {
        let (kind, m) = if let Some(m) = caps.name("link") {
            (TokenKind::Link, m)
        } else if let Some(m) = caps.name("mention") {
            (TokenKind::Mention, m)
        } else if let Some(m) = caps.name("tag") {
            (TokenKind::Hashtag, m)
        } else {
            continue;
        };
        if m.start() > last {
            tokens.push(Token {
                kind: TokenKind::Text,
                text: &text[last..m.start()],
            });
        }
        tokens.push(Token {
            kind,
            text: m.as_str(),
        });
        last = m.end();
    }
    if last < text.len() {
        tokens.push(Token {
            kind: TokenKind::Text,
            text: &text[last..],
        });
    }
    tokens
}

/// Shortens `text` to at most `max_width` terminal columns, ending in "...".
/// Wide glyphs count as two columns.
pub fn truncate_text(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    let budget = max_width.saturating_sub(3);
    let mut used = 0usize;
    let mut out = String::new();
    for ch in text.chars() {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + width > budget {
            break;
        }
        used += width;
        out.push(ch);
    }
    out.push_str("...");
    out
}

/// Relative time such as "5 minutes ago". Unparseable timestamps are shown
/// as-is.
pub fn time_ago(timestamp: &str) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(parsed) => time_ago_from(parsed.with_timezone(&Utc), Utc::now()),
        Err(_) => timestamp.to_string(),
    }
}

pub fn time_ago_from(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let seconds = delta.num_seconds();
    let distance = distance_words(seconds.abs());
    if seconds < 0 {
        format!("in {distance}")
    } else {
        format!("{distance} ago")
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

fn distance_words(seconds: i64) -> String {
    let minutes = (seconds as f64 / 60.0).round() as i64;

    if minutes < 1 {
        return "less than a minute".into();
    }
    if minutes < 45 {
        return plural(minutes, "minute");
    }
    if minutes < 90 {
        return "about 1 hour".into();
    }
    if minutes < MINUTES_IN_DAY {
        let hours = (minutes as f64 / 60.0).round() as i64;
        return format!("about {}", plural(hours, "hour"));
    }
    if minutes < 2520 {
        return "1 day".into();
    }
    if minutes < MINUTES_IN_MONTH {
        let days = (minutes as f64 / MINUTES_IN_DAY as f64).round() as i64;
        return plural(days, "day");
    }
    if minutes < MINUTES_IN_TWO_MONTHS {
        let months = (minutes as f64 / MINUTES_IN_MONTH as f64).round() as i64;
        return format!("about {}", plural(months, "month"));
    }

    let months = minutes / MINUTES_IN_MONTH;
    if months < 12 {
        return plural(months, "month");
    }
    let years = months / 12;
    match months % 12 {
        0..=2 => format!("about {}", plural(years, "year")),
        3..=8 => format!("over {}", plural(years, "year")),
        _ => format!("almost {}", plural(years + 1, "year")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ago(d: Duration) -> String {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        time_ago_from(now - d, now)
    }

    #[test]
    fn relative_times() {
        assert_eq!(ago(Duration::seconds(10)), "less than a minute ago");
        assert_eq!(ago(Duration::seconds(50)), "1 minute ago");
        assert_eq!(ago(Duration::minutes(5)), "5 minutes ago");
        assert_eq!(ago(Duration::minutes(60)), "about 1 hour ago");
        assert_eq!(ago(Duration::hours(5)), "about 5 hours ago");
        assert_eq!(ago(Duration::hours(30)), "1 day ago");
        assert_eq!(ago(Duration::days(3)), "3 days ago");
        assert_eq!(ago(Duration::days(40)), "about 1 month ago");
        assert_eq!(ago(Duration::days(100)), "3 months ago");
        assert_eq!(ago(Duration::days(400)), "about 1 year ago");
        assert_eq!(ago(Duration::days(200 + 365)), "over 1 year ago");
    }

    #[test]
    fn future_times_use_in() {
        assert_eq!(ago(Duration::minutes(-5)), "in 5 minutes");
    }

    #[test]
    fn bad_timestamp_passes_through() {
        assert_eq!(time_ago("yesterday"), "yesterday");
    }

    #[test]
    fn tokenize_marks_entities() {
        let tokens = tokenize("hi @alice.bsky.social see https://bsky.app #rust!");
        let kinds: Vec<_> = tokens.iter().map(|t| (t.kind, t.text)).collect();
        assert_eq!(
            kinds,
            vec![
                (TokenKind::Text, "hi "),
                (TokenKind::Mention, "@alice.bsky.social"),
                (TokenKind::Text, " see "),
                (TokenKind::Link, "https://bsky.app"),
                (TokenKind::Text, " "),
                (TokenKind::Hashtag, "#rust"),
                (TokenKind::Text, "!"),
            ]
        );
    }

    #[test]
    fn tokenize_plain_text() {
        let tokens = tokenize("just words");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Text);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdefghij", 8), "abcde...");
        assert_eq!(truncate_text("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn truncate_counts_display_columns() {
        let out = truncate_text("日本語のテキストです", 9);
        assert_eq!(out, "日本語...");
        assert!(UnicodeWidthStr::width(out.as_str()) <= 9);
        assert_eq!(truncate_text("🦀🦀🦀🦀", 6), "🦀...");
        assert_eq!(truncate_text("日本", 4), "日本");
    }
}
