//! Message formatting for delivery channels.

use remindly_core::models::{Notification, NotificationKind};
use serde::Serialize;

/// Telegram messages are cut off past this many characters.
pub const TELEGRAM_MAX_LEN: usize = 4096;

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn kind_icon(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Reminder => "\u{1F514}",
        NotificationKind::DueToday => "\u{26A0}\u{FE0F}",
        NotificationKind::Daily => "\u{1F4CB}",
        NotificationKind::Medication => "\u{1F48A}",
    }
}

/// HTML body for Telegram `sendMessage`.
pub fn telegram_message(notification: &Notification) -> String {
    let mut message = format!(
        "{} <b>{}</b>\n\n{}",
        kind_icon(notification.kind),
        escape_html(&notification.title),
        escape_html(&notification.body)
    );

    if message.chars().count() > TELEGRAM_MAX_LEN {
        message = message.chars().take(TELEGRAM_MAX_LEN - 1).collect();
        // don't leave a dangling entity behind
        if let Some(amp) = message.rfind('&') {
            if !message[amp..].contains(';') {
                message.truncate(amp);
            }
        }
        message.push('\u{2026}');
    }
    message
}

/// One line of the desktop event stream.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopEvent<'a> {
    pub kind: NotificationKind,
    pub subject_id: &'a str,
    pub reference_date: chrono::NaiveDate,
    pub title: &'a str,
    pub body: &'a str,
}

impl<'a> From<&'a Notification> for DesktopEvent<'a> {
    fn from(n: &'a Notification) -> Self {
        Self {
            kind: n.kind,
            subject_id: &n.subject_id,
            reference_date: n.reference_date,
            title: &n.title,
            body: &n.body,
        }
    }
}

/// Serialize a notification as a single JSON line (no trailing newline).
pub fn desktop_line(notification: &Notification) -> Result<String, serde_json::Error> {
    serde_json::to_string(&DesktopEvent::from(notification))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn notification(title: &str, body: &str) -> Notification {
        Notification {
            kind: NotificationKind::Reminder,
            subject_id: "p1".into(),
            reference_date: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            title: title.into(),
            body: body.into(),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("Tom & Jerry <3"), "Tom &amp; Jerry &lt;3");
        assert_eq!(escape_html("\"quoted\""), "&quot;quoted&quot;");
    }

    #[test]
    fn test_telegram_message() {
        let message = telegram_message(&notification("Upcoming payment: <Rent>", "Due tomorrow"));
        assert!(message.contains("<b>Upcoming payment: &lt;Rent&gt;</b>"));
        assert!(message.ends_with("Due tomorrow"));
    }

    #[test]
    fn test_long_message_is_truncated() {
        let body = "&".repeat(TELEGRAM_MAX_LEN);
        let message = telegram_message(&notification("Digest", &body));
        assert!(message.chars().count() <= TELEGRAM_MAX_LEN);
        assert!(message.ends_with("&amp;\u{2026}"));
    }

    #[test]
    fn test_desktop_line() {
        let line = desktop_line(&notification("Rent", "Due")).unwrap();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["kind"], "reminder");
        assert_eq!(value["subjectId"], "p1");
        assert_eq!(value["referenceDate"], "2024-03-11");
    }
}
