//! Delivery channels and fan-out.

use std::io::Write;
use std::sync::Mutex;

use remindly_core::models::Notification;
use remindly_core::settings::NotificationSettings;
use remindly_core::sweep::{DispatchError, Dispatcher};

use crate::format::desktop_line;

/// What a channel did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The channel is turned off or not configured for this user
    Skipped,
}

/// One way of reaching the user.
pub trait Channel {
    fn name(&self) -> &str;

    fn send(
        &self,
        notification: &Notification,
        settings: &NotificationSettings,
    ) -> Result<Delivery, DispatchError>;
}

/// Sends every notification to all channels. Channels fail independently.
#[derive(Default)]
pub struct FanOut {
    channels: Vec<Box<dyn Channel>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel<C: Channel + 'static>(mut self, channel: C) -> Self {
        self.channels.push(Box::new(channel));
        self
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl Dispatcher for FanOut {
    fn dispatch(
        &self,
        notification: &Notification,
        settings: &NotificationSettings,
    ) -> Result<(), DispatchError> {
        let mut failures = Vec::new();

        for channel in &self.channels {
            match channel.send(notification, settings) {
                Ok(Delivery::Sent) => {
                    tracing::debug!(channel = channel.name(), subject = %notification.subject_id, "delivered");
                }
                Ok(Delivery::Skipped) => {
                    tracing::trace!(channel = channel.name(), "channel skipped");
                }
                Err(e) => failures.push(e),
            }
        }

        match failures.len() {
            0 => Ok(()),
            1 if self.channels.len() == 1 => Err(failures.remove(0)),
            _ => Err(DispatchError::Partial {
                total: self.channels.len(),
                failures,
            }),
        }
    }
}

/// Writes each notification as a JSON line, e.g. to stdout for the desktop host.
pub struct JsonLinesChannel<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesChannel<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl JsonLinesChannel<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> Channel for JsonLinesChannel<W> {
    fn name(&self) -> &str {
        "desktop"
    }

    fn send(&self, notification: &Notification, _: &NotificationSettings) -> Result<Delivery, DispatchError> {
        let failed = |reason: String| DispatchError::Channel {
            channel: self.name().to_string(),
            reason,
        };

        let line = desktop_line(notification).map_err(|e| failed(e.to_string()))?;
        let mut out = self.out.lock().map_err(|e| failed(e.to_string()))?;
        writeln!(out, "{}", line)
            .and_then(|_| out.flush())
            .map_err(|e| failed(e.to_string()))?;
        Ok(Delivery::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use remindly_core::models::NotificationKind;

    struct Broken;

    impl Channel for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn send(&self, _: &Notification, _: &NotificationSettings) -> Result<Delivery, DispatchError> {
            Err(DispatchError::Channel {
                channel: "broken".into(),
                reason: "offline".into(),
            })
        }
    }

    fn notification() -> Notification {
        Notification {
            kind: NotificationKind::DueToday,
            subject_id: "p1".into(),
            reference_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            title: "Payment due today: Rent".into(),
            body: "Rent of 950.00 is due today.".into(),
        }
    }

    #[test]
    fn test_json_lines_channel() {
        let channel = JsonLinesChannel::new(Vec::new());
        let settings = NotificationSettings::default();
        assert_eq!(channel.send(&notification(), &settings).unwrap(), Delivery::Sent);
        assert_eq!(channel.send(&notification(), &settings).unwrap(), Delivery::Sent);

        let output = String::from_utf8(channel.into_inner()).unwrap();
        assert_eq!(output.lines().count(), 2);
        assert!(output.contains("\"kind\":\"due-today\""));
    }

    #[test]
    fn test_fan_out_reports_partial_failure() {
        let fan_out = FanOut::new()
            .with_channel(JsonLinesChannel::new(Vec::new()))
            .with_channel(Broken);

        let err = fan_out
            .dispatch(&notification(), &NotificationSettings::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 channels failed");
    }

    #[test]
    fn test_fan_out_single_channel_error_passes_through() {
        let fan_out = FanOut::new().with_channel(Broken);
        let err = fan_out
            .dispatch(&notification(), &NotificationSettings::default())
            .unwrap_err();
        assert!(matches!(err, DispatchError::Channel { .. }));
    }

    #[test]
    fn test_empty_fan_out_is_ok() {
        let fan_out = FanOut::new();
        assert!(fan_out.is_empty());
        assert!(fan_out.dispatch(&notification(), &NotificationSettings::default()).is_ok());
    }
}
