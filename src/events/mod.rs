pub mod lifecycle;
pub mod window;

pub use lifecycle::{ExitCode, HookPoint, LifecycleEvent};
pub use window::{FocusDetail, FocusEvent, FocusMode, RawWindowEvent, WindowHandle, WindowInfo};
