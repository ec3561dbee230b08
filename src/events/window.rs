use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque window identifier (an X11 window id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowHandle(pub u32);

impl WindowHandle {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Window properties as seen by a search pass
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub title: String,
    /// First WM_CLASS string (res_name)
    pub instance: String,
    /// Second WM_CLASS string (res_class)
    pub class: String,
    pub pid: Option<u32>,
    pub visible: bool,
}

impl WindowInfo {
    pub fn new(handle: WindowHandle, title: String) -> Self {
        Self {
            handle,
            title,
            instance: String::new(),
            class: String::new(),
            pid: None,
            visible: true,
        }
    }

    pub fn with_class(mut self, instance: String, class: String) -> Self {
        self.instance = instance;
        self.class = class;
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance.is_empty() {
            write!(f, "{} \"{}\"", self.handle, self.title)
        } else {
            write!(f, "{} \"{}\" ({})", self.handle, self.title, self.instance)
        }
    }
}

/// Focus notification mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FocusMode {
    Normal,
    Grab,
    Ungrab,
    WhileGrabbed,
}

/// Focus notification detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FocusDetail {
    Ancestor,
    Virtual,
    Inferior,
    Nonlinear,
    NonlinearVirtual,
    Pointer,
    PointerRoot,
    None,
}

/// Notification exactly as delivered by the window system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawWindowEvent {
    FocusIn {
        window: WindowHandle,
        mode: FocusMode,
        detail: FocusDetail,
    },
    FocusOut {
        window: WindowHandle,
        mode: FocusMode,
        detail: FocusDetail,
    },
    Destroyed {
        window: WindowHandle,
    },
}

/// Normalized focus event produced by the focus watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FocusEvent {
    FocusGained(WindowHandle),
    FocusLost(WindowHandle),
    WindowClosed(WindowHandle),
}

impl fmt::Display for FocusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FocusEvent::FocusGained(w) => write!(f, "focus gained on {}", w),
            FocusEvent::FocusLost(w) => write!(f, "focus lost on {}", w),
            FocusEvent::WindowClosed(w) => write!(f, "window {} closed", w),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_info_creation() {
        let window = WindowInfo::new(WindowHandle::new(0x4200001), "Infinifactory".to_string())
            .with_class("infinifactory.x86_64".to_string(), "Infinifactory".to_string())
            .with_pid(1234);

        assert_eq!(window.title, "Infinifactory");
        assert_eq!(window.instance, "infinifactory.x86_64");
        assert_eq!(window.pid, Some(1234));
        assert!(window.visible);
    }

    #[test]
    fn test_handle_display_is_hex() {
        assert_eq!(WindowHandle::new(0x4200001).to_string(), "0x4200001");
        assert_eq!(
            FocusEvent::WindowClosed(WindowHandle::new(0x10)).to_string(),
            "window 0x10 closed"
        );
    }
}
