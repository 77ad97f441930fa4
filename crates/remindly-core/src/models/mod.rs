//! Domain models for the remindly system.

mod medication;
mod notification;
mod payment;

pub use medication::*;
pub use notification::*;
pub use payment::*;
