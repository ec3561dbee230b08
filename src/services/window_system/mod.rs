//! Window system boundary: window search and focus notifications.
//!
//! Nothing in here knows about lifecycle transitions, hooks or the playtime
//! log. Backends only translate windowing-system state into `WindowHandle`s
//! and `RawWindowEvent`s.

pub mod criteria;
mod dry_run;
mod r#trait;
mod x11;

pub use self::criteria::MatchCriteria;
#[cfg(test)]
pub use self::dry_run::DryRunWindowSystem;
pub use self::r#trait::{create_window_system, FocusSubscription, WindowList, WindowSystem};
