use std::time::Duration;
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::xproto::{
    AtomEnum, ChangeWindowAttributesAux, ConnectionExt, EventMask, MapState, NotifyDetail,
    NotifyMode, Window,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use super::criteria::MatchCriteria;
use super::r#trait::{FocusSubscription, WindowList, WindowSystem};
use crate::error::{Result, WrapperError};
use crate::events::{FocusDetail, FocusMode, RawWindowEvent, WindowHandle, WindowInfo};
use crate::trace_if_enabled;

/// Longest property value read, in 32-bit units
const MAX_PROPERTY_LENGTH: u32 = 1024;

x11rb::atom_manager! {
    pub Atoms: AtomsCookie {
        _NET_WM_NAME,
        _NET_WM_PID,
        _NET_SUPPORTING_WM_CHECK,
        UTF8_STRING,
    }
}

pub struct X11WindowSystem {
    display: Option<String>,
    conn: RustConnection,
    roots: Vec<Window>,
    atoms: Atoms,
}

impl X11WindowSystem {
    /// Connect to `display`, or to `$DISPLAY` when `None`.
    pub fn connect(display: Option<&str>) -> Result<Self> {
        let (conn, _screen_num) = x11rb::connect(display)?;
        let roots = conn.setup().roots.iter().map(|screen| screen.root).collect();
        let atoms = Atoms::new(&conn)?.reply()?;

        let server = display.unwrap_or("$DISPLAY");
        info!("Connected to X server {}", server);

        Ok(Self {
            display: display.map(str::to_string),
            conn,
            roots,
            atoms,
        })
    }

    fn all_windows(&self) -> Result<Vec<Window>> {
        let mut found = Vec::new();
        let mut pending: Vec<Window> = self.roots.clone();

        while let Some(parent) = pending.pop() {
            // windows can vanish between the walk and the query
            let Ok(tree) = self.conn.query_tree(parent)?.reply() else {
                continue;
            };
            found.extend_from_slice(&tree.children);
            pending.extend_from_slice(&tree.children);
        }

        Ok(found)
    }

    fn string_property(&self, window: Window, property: impl Into<u32>, kind: impl Into<u32>) -> Option<String> {
        let reply = self
            .conn
            .get_property(false, window, property, kind, 0, MAX_PROPERTY_LENGTH)
            .ok()?
            .reply()
            .ok()?;

        if reply.value.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&reply.value).into_owned())
    }

    fn window_name(&self, window: Window) -> String {
        self.string_property(window, self.atoms._NET_WM_NAME, self.atoms.UTF8_STRING)
            .or_else(|| self.string_property(window, AtomEnum::WM_NAME, AtomEnum::ANY))
            .unwrap_or_default()
    }

    fn window_class(&self, window: Window) -> (String, String) {
        let raw = self
            .string_property(window, AtomEnum::WM_CLASS, AtomEnum::STRING)
            .unwrap_or_default();
        let mut parts = raw.split('\0');
        let instance = parts.next().unwrap_or_default().to_string();
        let class = parts.next().unwrap_or_default().to_string();
        (instance, class)
    }

    fn window_pid(&self, window: Window) -> Option<u32> {
        let reply = self
            .conn
            .get_property(false, window, self.atoms._NET_WM_PID, AtomEnum::CARDINAL, 0, 1)
            .ok()?
            .reply()
            .ok()?;
        let pid = reply.value32()?.next();
        pid
    }

    fn is_viewable(&self, window: Window) -> Option<bool> {
        let attrs = self.conn.get_window_attributes(window).ok()?.reply().ok()?;
        Some(attrs.map_state == MapState::VIEWABLE)
    }

    fn describe(&self, window: Window, visible: bool) -> WindowInfo {
        let (instance, class) = self.window_class(window);
        let info = WindowInfo::new(WindowHandle::new(window), self.window_name(window))
            .with_class(instance, class)
            .with_visible(visible);
        match self.window_pid(window) {
            Some(pid) => info.with_pid(pid),
            None => info,
        }
    }
}

impl WindowSystem for X11WindowSystem {
    fn search(&self, criteria: &MatchCriteria) -> Result<WindowList> {
        let mut matches = WindowList::new();

        for window in self.all_windows()? {
            let Some(visible) = self.is_viewable(window) else {
                continue;
            };
            if criteria.only_visible() && !visible {
                continue;
            }

            let info = self.describe(window, visible);
            trace_if_enabled!("Checking window {}", info);
            if criteria.matches(&info) {
                debug!("Window matches: {}", info);
                matches.push(info.handle);
            }
        }

        Ok(matches)
    }

    fn subscribe(&self, windows: &[WindowHandle]) -> Result<Box<dyn FocusSubscription>> {
        // a dedicated connection keeps this subscription's events separate
        let (conn, _) = x11rb::connect(self.display.as_deref())?;
        let focused = conn.get_input_focus()?.reply()?.focus;

        let aux = ChangeWindowAttributesAux::new()
            .event_mask(EventMask::FOCUS_CHANGE | EventMask::STRUCTURE_NOTIFY);
        for window in windows {
            match conn.change_window_attributes(window.value(), &aux)?.check() {
                Ok(()) => {}
                Err(ReplyError::X11Error(err)) => {
                    warn!("Cannot subscribe to {}: {:?}", window, err.error_kind);
                    return Err(WrapperError::InvalidWindow(*window));
                }
                Err(e) => return Err(e.into()),
            }
        }
        conn.flush()?;

        Ok(Box::new(X11FocusSubscription {
            conn,
            focused: (focused != x11rb::NONE).then(|| WindowHandle::new(focused)),
        }))
    }

    fn window_manager(&self) -> Option<String> {
        let root = *self.roots.first()?;
        let reply = self
            .conn
            .get_property(false, root, self.atoms._NET_SUPPORTING_WM_CHECK, AtomEnum::WINDOW, 0, 1)
            .ok()?
            .reply()
            .ok()?;
        let wm_window = reply.value32()?.next()?;

        self.string_property(wm_window, self.atoms._NET_WM_NAME, self.atoms.UTF8_STRING)
    }
}

struct X11FocusSubscription {
    conn: RustConnection,
    focused: Option<WindowHandle>,
}

impl FocusSubscription for X11FocusSubscription {
    fn focused_window(&self) -> Option<WindowHandle> {
        self.focused
    }

    fn next_event(&mut self, wait: Duration) -> Result<Option<RawWindowEvent>> {
        match self.conn.poll_for_event()? {
            Some(event) => Ok(translate(event)),
            None => {
                std::thread::sleep(wait);
                Ok(None)
            }
        }
    }
}

fn translate(event: Event) -> Option<RawWindowEvent> {
    match event {
        Event::FocusIn(e) => Some(RawWindowEvent::FocusIn {
            window: WindowHandle::new(e.event),
            mode: focus_mode(e.mode),
            detail: focus_detail(e.detail),
        }),
        Event::FocusOut(e) => Some(RawWindowEvent::FocusOut {
            window: WindowHandle::new(e.event),
            mode: focus_mode(e.mode),
            detail: focus_detail(e.detail),
        }),
        Event::DestroyNotify(e) => Some(RawWindowEvent::Destroyed {
            window: WindowHandle::new(e.window),
        }),
        _ => None,
    }
}

fn focus_mode(mode: NotifyMode) -> FocusMode {
    if mode == NotifyMode::GRAB {
        FocusMode::Grab
    } else if mode == NotifyMode::UNGRAB {
        FocusMode::Ungrab
    } else if mode == NotifyMode::WHILE_GRABBED {
        FocusMode::WhileGrabbed
    } else {
        FocusMode::Normal
    }
}

fn focus_detail(detail: NotifyDetail) -> FocusDetail {
    if detail == NotifyDetail::ANCESTOR {
        FocusDetail::Ancestor
    } else if detail == NotifyDetail::VIRTUAL {
        FocusDetail::Virtual
    } else if detail == NotifyDetail::INFERIOR {
        FocusDetail::Inferior
    } else if detail == NotifyDetail::NONLINEAR {
        FocusDetail::Nonlinear
    } else if detail == NotifyDetail::NONLINEAR_VIRTUAL {
        FocusDetail::NonlinearVirtual
    } else if detail == NotifyDetail::POINTER {
        FocusDetail::Pointer
    } else if detail == NotifyDetail::POINTER_ROOT {
        FocusDetail::PointerRoot
    } else {
        FocusDetail::None
    }
}
