//! Page template for the simulated phone chat screen
//!
//! The markup is static apart from the header (status-bar clock, contact name
//! and avatar) and the message region produced by [`crate::document`]. The
//! renderer relies on two hooks in this page: [`CONTAINER_SELECTOR`] for the
//! full content height and [`HEADER_SELECTOR`] for the sticky header.

use crate::document::escape_html;

/// Root element whose bounding height is the content height
pub const CONTAINER_SELECTOR: &str = "#chat-to-capture";

/// Sticky header (status bar + chat header) shown only in the first chunk
pub const HEADER_SELECTOR: &str = "#chat-header";

const STYLESHEET: &str = r#"
body {
    margin: 0;
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    -webkit-font-smoothing: antialiased;
    background-color: #F2F2F7;
}
.chat-container {
    width: {{WIDTH}}px;
    background-color: #F2F2F7;
    display: flex;
    flex-direction: column;
    position: relative;
}
.chat-top {
    position: sticky;
    top: 0;
    z-index: 100;
    background-color: #F2F2F7;
}
.status-bar {
    height: 44px;
    display: flex;
    justify-content: center;
    align-items: center;
    padding: 0 16px;
    font-size: 14px;
    font-weight: 600;
    color: #000;
    position: relative;
}
.status-bar-time {
    position: absolute;
    left: 50%;
    transform: translateX(-50%);
}
.status-icons {
    position: absolute;
    right: 16px;
    display: flex;
    align-items: center;
    gap: 4px;
}
.chat-header {
    height: 52px;
    display: flex;
    align-items: center;
    padding: 4px 16px;
}
.back-button {
    color: #007AFF;
    font-size: 32px;
    text-decoration: none;
    margin-right: 4px;
    line-height: 1;
    font-weight: 300;
}
.avatar {
    width: 36px;
    height: 36px;
    border-radius: 50%;
    margin: 0 8px;
    display: flex;
    align-items: center;
    justify-content: center;
    color: white;
    font-weight: 500;
    font-size: 15px;
    text-transform: uppercase;
}
.contact-name {
    font-size: 17px;
    font-weight: 600;
    color: #000;
}
.messages-container {
    flex: 1;
    padding: 8px 8px 16px;
    display: flex;
    flex-direction: column;
    gap: 2px;
}
.timestamp-separator {
    align-self: center;
    margin: 12px 0 6px;
    font-size: 12px;
    font-weight: 500;
    color: #8E8E93;
}
.message-bubble {
    max-width: 75%;
    padding: 8px 12px;
    margin: 1px 8px 18px;
    border-radius: 17px;
    font-size: 17px;
    line-height: 1.3125;
    position: relative;
    white-space: pre-wrap;
    word-wrap: break-word;
}
.message-bubble.sender {
    background-color: #007AFF;
    color: white;
    align-self: flex-end;
    margin-left: auto;
    border-bottom-right-radius: 5px;
}
.message-bubble.contact {
    background-color: #E9E9E9;
    color: #000;
    align-self: flex-start;
    margin-right: auto;
    border-bottom-left-radius: 5px;
}
.message-time {
    font-size: 11px;
    color: #8E8E93;
    text-align: right;
    position: absolute;
    right: 12px;
    bottom: -16px;
    white-space: nowrap;
}
"#;

const SIGNAL_ICON: &str = r#"<svg width="18" height="12" viewBox="0 0 18 12" fill="black"><path d="M1 4.5h2v3H1zM4.5 3h2v6h-2zM8 1.5h2v9H8zM11.5 0h2v12h-2zM15 2.5h2v7h-2z"/></svg>"#;

/// Inputs for one rendered page
#[derive(Debug, Clone)]
pub struct PageParts<'a> {
    /// Content width in CSS pixels
    pub width: u32,
    /// Clock shown in the status bar (already formatted)
    pub status_time: &'a str,
    /// Counterpart shown in the chat header
    pub contact_name: &'a str,
    /// Message region markup from [`crate::document::build_message_markup`]
    pub messages_html: &'a str,
}

/// Assemble the complete, self-contained HTML page.
pub fn render_page(parts: &PageParts<'_>) -> String {
    let style = STYLESHEET.replace("{{WIDTH}}", &parts.width.to_string());
    let color = avatar_color(parts.contact_name);
    let initials = escape_html(&initials(parts.contact_name));

    format!(
        r##"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width={width}, initial-scale=1.0">
<style>{style}</style>
</head>
<body>
<div class="chat-container" id="chat-to-capture">
<div class="chat-top" id="chat-header">
<div class="status-bar">
<div class="status-bar-time">{time}</div>
<div class="status-icons">{icon}</div>
</div>
<div class="chat-header">
<a href="#" class="back-button">&#8249;</a>
<div class="avatar" style="background-color: {color};">{initials}</div>
<div class="contact-name">{name}</div>
</div>
</div>
<div class="messages-container">
{messages}
</div>
</div>
</body>
</html>
"##,
        width = parts.width,
        style = style,
        time = escape_html(parts.status_time),
        icon = SIGNAL_ICON,
        color = color,
        initials = initials,
        name = escape_html(parts.contact_name),
        messages = parts.messages_html,
    )
}

/// Deterministic avatar background derived from a display name.
///
/// Hashes the UTF-16 code units with `h = c + (h << 5) - h` in wrapping
/// 32-bit arithmetic, then takes the low three bytes as RGB, each clamped to
/// `[100, 200]` so the color is never too dark or too washed out.
pub fn avatar_color(name: &str) -> String {
    let mut hash: i32 = 0;
    for unit in name.encode_utf16() {
        hash = (unit as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }

    let mut color = String::from("#");
    for i in 0..3 {
        let value = (hash >> (i * 8)) & 0xFF;
        let adjusted = value.clamp(100, 200);
        color.push_str(&format!("{:02x}", adjusted));
    }
    color
}

/// Up to two uppercase initials, one per space-separated word.
pub fn initials(name: &str) -> String {
    name.split(' ')
        .take(2)
        .filter_map(|word| word.chars().next())
        .collect::<String>()
        .to_uppercase()
}
