//! Background scheduling
//!
//! One-shot timers and the reminder poller. Both run independently of the
//! capture loop and only ever write to the speech output.

mod poller;
mod timer;

pub use poller::ReminderPoller;
pub use timer::{TimerInfo, TimerRegistry};
