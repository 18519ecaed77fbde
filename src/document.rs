//! Transcript to HTML document
//!
//! Builds the message region of the chat page: one bubble per message, in the
//! order given, with a day label in front of the first message and in front of
//! every message whose calendar day differs from the previous one. Building is
//! pure; the reference "now" is injected so day labels ("Today", "Yesterday",
//! or a `dd.mm.yyyy` date) are reproducible.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use crate::template::{self, PageParts};
use crate::{CaptureRequest, Message};

/// Naive layouts accepted besides RFC 3339, interpreted in the reference offset
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y, %H:%M:%S",
    "%d.%m.%Y, %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];

/// A fully built, self-contained page ready to be loaded by a surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    html: String,
}

impl Document {
    pub fn new(html: String) -> Self {
        Self { html }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

/// Build the complete page for a request at the given content width.
pub fn build_document(request: &CaptureRequest, width: u32, now: &DateTime<FixedOffset>) -> Document {
    let messages_html = build_message_markup(&request.messages, &request.current_user, now);
    let status_time = now.format("%H:%M").to_string();
    let html = template::render_page(&PageParts {
        width,
        status_time: &status_time,
        contact_name: &request.contact_name,
        messages_html: &messages_html,
    });
    Document::new(html)
}

/// Build the message region markup.
///
/// Messages whose sender equals `local_identity` are tagged `sender` (own,
/// right-aligned); all others `contact`. Never fails: a timestamp that cannot
/// be parsed is shown verbatim.
pub fn build_message_markup(messages: &[Message], local_identity: &str, now: &DateTime<FixedOffset>) -> String {
    let mut html = String::new();
    let mut last_label: Option<String> = None;

    for message in messages {
        let parsed = parse_timestamp(&message.timestamp, now.offset());
        let (label, time) = match parsed {
            Some(ts) => (day_label(ts.date_naive(), now.date_naive()), ts.format("%H:%M").to_string()),
            None => (raw_day_label(&message.timestamp), message.timestamp.clone()),
        };

        if last_label.as_deref() != Some(label.as_str()) {
            let class = if last_label.is_none() { "day-start" } else { "day-change" };
            html.push_str(&format!(
                "<div class=\"timestamp-separator {}\">{}</div>\n",
                class,
                escape_html(&label)
            ));
            last_label = Some(label);
        }

        let bubble = if message.sender == local_identity { "sender" } else { "contact" };
        html.push_str(&format!(
            "<div class=\"message-bubble {}\">{}<div class=\"message-time\">{}</div></div>\n",
            bubble,
            escape_html(&message.content),
            escape_html(&time)
        ));
    }

    html
}

/// Label for a message day relative to the reference day.
pub fn day_label(day: NaiveDate, today: NaiveDate) -> String {
    if day == today {
        "Today".to_string()
    } else if Some(day) == today.pred_opt() {
        "Yesterday".to_string()
    } else {
        day.format("%d.%m.%Y").to_string()
    }
}

// Date part of an unparseable timestamp, e.g. "01.03.2024" from "01.03.2024, 10:00".
fn raw_day_label(raw: &str) -> String {
    match raw.split(", ").next() {
        Some(head) if !head.is_empty() => head.to_string(),
        _ => raw.to_string(),
    }
}

/// Parse a caller timestamp.
///
/// RFC 3339 values keep their instant and are shifted into `offset`; naive
/// values are taken to already be in `offset`.
pub fn parse_timestamp(raw: &str, offset: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(offset));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    naive.and_local_timezone(*offset).single()
}

/// Escape the five characters that are reserved in HTML text and attributes.
pub fn escape_html(unsafe_text: &str) -> String {
    let mut out = String::with_capacity(unsafe_text.len());
    for ch in unsafe_text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-03-10T15:00:00+03:00").unwrap()
    }

    fn msg(ts: &str, sender: &str, content: &str) -> Message {
        Message {
            timestamp: ts.into(),
            sender: sender.into(),
            content: content.into(),
        }
    }

    #[test]
    fn escape_replaces_all_reserved_characters() {
        assert_eq!(escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#), "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;");
        assert_eq!(escape_html("plain"), "plain");
        assert_eq!(escape_html(""), "");
    }

    #[test]
    fn escaping_twice_escapes_the_ampersands() {
        assert_eq!(escape_html(&escape_html("<")), "&amp;lt;");
    }

    #[test]
    fn day_labels_relative_to_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(day_label(today, today), "Today");
        assert_eq!(day_label(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(), today), "Yesterday");
        assert_eq!(day_label(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(), today), "08.03.2024");
        assert_eq!(day_label(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(), today), "11.03.2024");
    }

    #[test]
    fn yesterday_crosses_month_boundary() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(day_label(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(), today), "Yesterday");
    }

    #[test]
    fn parses_supported_layouts() {
        let off = *now().offset();
        let a = parse_timestamp("2024-03-10T09:05:00Z", &off).unwrap();
        assert_eq!(a.format("%Y-%m-%d %H:%M").to_string(), "2024-03-10 12:05");
        let b = parse_timestamp("2024-03-10 09:05", &off).unwrap();
        assert_eq!(b.format("%H:%M").to_string(), "09:05");
        let c = parse_timestamp("10.03.2024 09:05:30", &off).unwrap();
        assert_eq!(c.format("%d %H:%M").to_string(), "10 09:05");
        let d = parse_timestamp("2024/03/10 23:59", &off).unwrap();
        assert_eq!(d.format("%H:%M").to_string(), "23:59");
        let e = parse_timestamp("2024-03-10", &off).unwrap();
        assert_eq!(e.format("%H:%M").to_string(), "00:00");
        assert!(parse_timestamp("not a date", &off).is_none());
        assert!(parse_timestamp("", &off).is_none());
    }

    #[test]
    fn utc_instant_lands_on_local_calendar_day() {
        // 22:30 UTC on the 9th is 01:30 on the 10th at +03:00.
        let html = build_message_markup(&[msg("2024-03-09T22:30:00Z", "a", "hi")], "a", &now());
        assert!(html.contains(">Today<"));
        assert!(html.contains(">01:30<"));
    }

    #[test]
    fn one_label_for_single_day() {
        let messages = vec![
            msg("2024-03-10T08:00:00+03:00", "me", "one"),
            msg("2024-03-10T09:00:00+03:00", "you", "two"),
            msg("2024-03-10T10:00:00+03:00", "me", "three"),
        ];
        let html = build_message_markup(&messages, "me", &now());
        assert_eq!(html.matches("day-start").count(), 1);
        assert_eq!(html.matches("day-change").count(), 0);
        assert_eq!(html.matches("message-bubble sender").count(), 2);
        assert_eq!(html.matches("message-bubble contact").count(), 1);
    }

    #[test]
    fn one_separator_per_day_change() {
        let messages = vec![
            msg("2024-03-01T08:00:00+03:00", "me", "a"),
            msg("2024-03-01T09:00:00+03:00", "me", "b"),
            msg("2024-03-09T09:00:00+03:00", "you", "c"),
            msg("2024-03-10T09:00:00+03:00", "you", "d"),
            msg("2024-03-10T11:00:00+03:00", "me", "e"),
        ];
        let html = build_message_markup(&messages, "me", &now());
        assert_eq!(html.matches("day-change").count(), 2);
        let first = html.find("01.03.2024").unwrap();
        let yesterday = html.find("Yesterday").unwrap();
        let today = html.find("Today").unwrap();
        assert!(first < yesterday && yesterday < today);
    }

    #[test]
    fn order_is_preserved_not_sorted() {
        let messages = vec![
            msg("2024-03-10T09:00:00+03:00", "me", "later"),
            msg("2024-03-09T09:00:00+03:00", "me", "earlier"),
        ];
        let html = build_message_markup(&messages, "me", &now());
        assert!(html.find("later").unwrap() < html.find("earlier").unwrap());
        assert_eq!(html.matches("day-change").count(), 1);
    }

    #[test]
    fn malformed_timestamp_is_shown_raw() {
        let html = build_message_markup(&[msg("sometime, soon", "x", "hey")], "me", &now());
        assert!(html.contains(">sometime<"));
        assert!(html.contains("<div class=\"message-time\">sometime, soon</div>"));
        assert!(html.contains("message-bubble contact"));
    }

    #[test]
    fn content_is_escaped() {
        let html = build_message_markup(&[msg("2024-03-10T09:00:00+03:00", "me", "<script>alert('x')</script>")], "me", &now());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#039;x&#039;)&lt;/script&gt;"));
    }

    #[test]
    fn empty_transcript_has_empty_region() {
        assert_eq!(build_message_markup(&[], "me", &now()), "");
    }
}
