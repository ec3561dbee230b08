pub mod focus_watcher;
pub mod hooks;
pub mod launcher;
pub mod lifecycle;
pub mod notify;
pub mod playtime_analysis;
pub mod playtime_log;
pub mod process_table;
pub mod run_flag;
pub mod window_matcher;
pub mod window_system;

pub use hooks::{HookContext, HookRegistry};
pub use lifecycle::LifecycleController;
pub use process_table::{ProcessTable, SystemProcessTable};
pub use run_flag::RunFlag;
pub use window_system::create_window_system;
