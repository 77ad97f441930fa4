//! Notification delivery for remindly.
//!
//! This crate fans sweep notifications out to delivery channels (a JSON-lines
//! stream the desktop host turns into toasts, and optionally Telegram) and
//! hosts the `remindlyd` sweep loop.

pub mod channels;
pub mod daemon;
pub mod format;
#[cfg(feature = "telegram")]
pub mod telegram;

pub use channels::*;
pub use daemon::*;
pub use format::*;
#[cfg(feature = "telegram")]
pub use telegram::*;
