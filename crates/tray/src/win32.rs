//! Win32 backend: a hidden window owns the notify icon and receives its
//! callbacks, popup menus are plain `HMENU`s, icons are `HICON`s.
//!
//! The window procedure cannot reach the engine, so it only translates
//! messages into [`NativeEvent`]s on a per-thread queue that
//! [`EventLoop::next_event`] drains after each dispatch.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ffi::CString;
use std::ptr;

use statray_icon_cache::{IconKind, IconLoadError, IconLoader};
use tracing::debug;
use windows_sys::Win32::Foundation::{GetLastError, HINSTANCE, HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows_sys::Win32::System::Diagnostics::Debug::{
    FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS, FormatMessageA,
};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleA;
use windows_sys::Win32::UI::Shell::{
    ExtractIconExA, NIF_GUID, NIF_ICON, NIF_INFO, NIF_MESSAGE, NIF_SHOWTIP, NIF_TIP,
    NIIF_LARGE_ICON, NIIF_NONE, NIIF_USER, NIM_ADD, NIM_DELETE, NIM_MODIFY, NIM_SETVERSION,
    NIN_BALLOONUSERCLICK, NOTIFYICON_VERSION_4, NOTIFYICONDATAA, Shell_NotifyIconA,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CreatePopupMenu, CreateWindowExA, DefWindowProcA, DestroyIcon, DestroyMenu, DestroyWindow,
    DispatchMessageA, GetCursorPos, GetMessageA, GetSystemMetrics, HICON, HMENU, IMAGE_ICON,
    InsertMenuItemA, LR_LOADFROMFILE, LoadImageA, MENUITEMINFOA, MFS_CHECKED, MFS_DISABLED,
    MFS_UNCHECKED, MFT_SEPARATOR, MFT_STRING, MIIM_FTYPE, MIIM_ID, MIIM_STATE, MIIM_STRING,
    MIIM_SUBMENU, MSG, PM_REMOVE, PeekMessageA, PostMessageA, PostQuitMessage, RegisterClassExA,
    RegisterWindowMessageA, SM_CXICON, SM_CYICON, SetForegroundWindow, SetMenuItemInfoA,
    TPM_LEFTALIGN, TPM_NONOTIFY, TPM_RETURNCMD, TPM_RIGHTBUTTON, TrackPopupMenu,
    TranslateMessage, UnregisterClassA, WM_CLOSE, WM_COMMAND, WM_CONTEXTMENU, WM_DESTROY,
    WM_LBUTTONUP, WM_NULL, WM_QUIT, WM_RBUTTONUP, WM_USER, WNDCLASSEXA,
};

use crate::error::PlatformError;
use crate::platform::{
    AppliedState, EventLoop, MenuApi, NativeEvent, NativeItem, NotifyApi, TrayIdentity,
};

const WM_TRAY_CALLBACK: u32 = WM_USER + 1;
const CLASS_NAME: &[u8] = b"STATRAY\0";

thread_local! {
    static PENDING: RefCell<VecDeque<NativeEvent>> = const { RefCell::new(VecDeque::new()) };
    static MENU: Cell<HMENU> = const { Cell::new(ptr::null_mut()) };
    static TASKBAR_CREATED: Cell<u32> = const { Cell::new(0) };
}

fn push_event(event: NativeEvent) {
    PENDING.with(|q| q.borrow_mut().push_back(event));
}

fn pop_event() -> Option<NativeEvent> {
    PENDING.with(|q| q.borrow_mut().pop_front())
}

/// Builds a [`PlatformError`] from `GetLastError` and the system message
/// table.
fn last_error(context: &str) -> PlatformError {
    let code = unsafe { GetLastError() };
    let mut buf = [0u8; 512];
    let len = unsafe {
        FormatMessageA(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
            ptr::null(),
            code,
            0,
            buf.as_mut_ptr(),
            buf.len() as u32,
            ptr::null(),
        )
    } as usize;
    let message = String::from_utf8_lossy(&buf[..len.min(buf.len())])
        .trim_end_matches(['\r', '\n'])
        .to_string();
    let message = if message.is_empty() {
        "no extended error message".to_string()
    } else {
        message
    };
    PlatformError::new(context, i64::from(code), message)
}

/// Copies `src` into a fixed NUL-terminated buffer, cutting at the buffer
/// size. Callers already truncated on character boundaries.
fn copy_sz(dst: *mut u8, cap: usize, src: &str) {
    if cap == 0 {
        return;
    }
    let dst = unsafe { std::slice::from_raw_parts_mut(dst, cap) };
    let n = src.len().min(cap - 1);
    dst[..n].copy_from_slice(&src.as_bytes()[..n]);
    dst[n] = 0;
}

fn c_text(text: &str) -> CString {
    CString::new(text.replace('\0', "")).unwrap_or_default()
}

fn loword(v: usize) -> u32 {
    (v & 0xFFFF) as u32
}

fn hiword(v: usize) -> u32 {
    ((v >> 16) & 0xFFFF) as u32
}

unsafe extern "system" fn wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_CLOSE => {
            unsafe { DestroyWindow(hwnd) };
            return 0;
        }
        WM_DESTROY => {
            unsafe { PostQuitMessage(0) };
            return 0;
        }
        WM_COMMAND => {
            if hiword(wparam) == 0 {
                push_event(NativeEvent::MenuCommand(loword(wparam)));
            }
            return 0;
        }
        WM_TRAY_CALLBACK => match loword(lparam as usize) {
            WM_LBUTTONUP | WM_RBUTTONUP | WM_CONTEXTMENU => {
                show_popup(hwnd);
                return 0;
            }
            NIN_BALLOONUSERCLICK => {
                push_event(NativeEvent::NotificationClicked);
                return 0;
            }
            _ => {}
        },
        _ => {}
    }

    let taskbar_created = TASKBAR_CREATED.with(Cell::get);
    if taskbar_created != 0 && msg == taskbar_created {
        push_event(NativeEvent::ShellRestarted);
        return 0;
    }

    unsafe { DefWindowProcA(hwnd, msg, wparam, lparam) }
}

fn show_popup(hwnd: HWND) {
    let menu = MENU.with(Cell::get);
    if menu.is_null() {
        return;
    }
    let mut p = POINT { x: 0, y: 0 };
    unsafe {
        GetCursorPos(&mut p);
        SetForegroundWindow(hwnd);
        let cmd = TrackPopupMenu(
            menu,
            TPM_LEFTALIGN | TPM_RIGHTBUTTON | TPM_RETURNCMD | TPM_NONOTIFY,
            p.x,
            p.y,
            0,
            hwnd,
            ptr::null(),
        );
        if cmd != 0 {
            push_event(NativeEvent::MenuCommand(cmd as u32));
        }
        // Lets the menu dismiss when the user clicks elsewhere.
        PostMessageA(hwnd, WM_NULL, 0, 0);
    }
}

/// Shell_NotifyIcon backend with a hidden top-level window.
///
/// Must be created, used and dropped on one thread.
#[derive(Debug)]
pub struct Win32Platform {
    hwnd: HWND,
    instance: HINSTANCE,
    class_registered: bool,
}

impl Win32Platform {
    pub fn new() -> Self {
        Self {
            hwnd: ptr::null_mut(),
            instance: ptr::null_mut(),
            class_registered: false,
        }
    }

    fn notify_data(&self, identity: &TrayIdentity) -> NOTIFYICONDATAA {
        let mut nid: NOTIFYICONDATAA = unsafe { std::mem::zeroed() };
        nid.cbSize = std::mem::size_of::<NOTIFYICONDATAA>() as u32;
        nid.hWnd = self.hwnd;
        nid.uID = identity.id;
        nid.guidItem = windows_sys::core::GUID::from_u128(identity.guid.as_u128());
        nid.uFlags = NIF_MESSAGE | NIF_GUID;
        nid.uCallbackMessage = WM_TRAY_CALLBACK;
        nid
    }

    fn notify(
        &self,
        message: u32,
        nid: &NOTIFYICONDATAA,
        context: &str,
    ) -> Result<(), PlatformError> {
        if unsafe { Shell_NotifyIconA(message, nid) } == 0 {
            return Err(last_error(context));
        }
        Ok(())
    }
}

impl Default for Win32Platform {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop for Win32Platform {
    fn open(&mut self) -> Result<(), PlatformError> {
        let taskbar_created = unsafe { RegisterWindowMessageA(b"TaskbarCreated\0".as_ptr()) };
        TASKBAR_CREATED.with(|c| c.set(taskbar_created));

        self.instance = unsafe { GetModuleHandleA(ptr::null()) };

        let mut wc: WNDCLASSEXA = unsafe { std::mem::zeroed() };
        wc.cbSize = std::mem::size_of::<WNDCLASSEXA>() as u32;
        wc.lpfnWndProc = Some(wnd_proc);
        wc.hInstance = self.instance;
        wc.lpszClassName = CLASS_NAME.as_ptr();
        if unsafe { RegisterClassExA(&wc) } == 0 {
            return Err(last_error("RegisterClassExA"));
        }
        self.class_registered = true;

        // Hidden top-level window; message-only windows miss shell broadcasts.
        let hwnd = unsafe {
            CreateWindowExA(
                0,
                CLASS_NAME.as_ptr(),
                ptr::null(),
                0,
                0,
                0,
                0,
                0,
                ptr::null_mut(),
                ptr::null_mut(),
                self.instance,
                ptr::null(),
            )
        };
        if hwnd.is_null() {
            let err = last_error("CreateWindowExA");
            self.close();
            return Err(err);
        }
        self.hwnd = hwnd;
        debug!("tray window created");
        Ok(())
    }

    fn close(&mut self) {
        if !self.hwnd.is_null() {
            unsafe { DestroyWindow(self.hwnd) };
            self.hwnd = ptr::null_mut();
        }
        if self.class_registered {
            unsafe { UnregisterClassA(CLASS_NAME.as_ptr(), self.instance) };
            self.class_registered = false;
        }
        MENU.with(|m| m.set(ptr::null_mut()));
    }

    fn next_event(&mut self, blocking: bool) -> Result<Option<NativeEvent>, PlatformError> {
        if let Some(event) = pop_event() {
            return Ok(Some(event));
        }

        let mut msg: MSG = unsafe { std::mem::zeroed() };
        if blocking {
            // Thread-wide, so WM_QUIT is seen as well.
            let r = unsafe { GetMessageA(&mut msg, ptr::null_mut(), 0, 0) };
            if r == -1 {
                return Err(last_error("GetMessageA"));
            }
            if r == 0 {
                return Ok(Some(NativeEvent::Quit));
            }
            unsafe {
                TranslateMessage(&msg);
                DispatchMessageA(&msg);
            }
            return Ok(pop_event());
        }

        while unsafe { PeekMessageA(&mut msg, ptr::null_mut(), 0, 0, PM_REMOVE) } != 0 {
            if msg.message == WM_QUIT {
                return Ok(Some(NativeEvent::Quit));
            }
            unsafe {
                TranslateMessage(&msg);
                DispatchMessageA(&msg);
            }
            if let Some(event) = pop_event() {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    fn post_quit(&mut self) {
        unsafe { PostQuitMessage(0) };
    }
}

impl MenuApi for Win32Platform {
    type Menu = HMENU;

    fn create_menu(&mut self) -> Result<HMENU, PlatformError> {
        let menu = unsafe { CreatePopupMenu() };
        if menu.is_null() {
            return Err(last_error("CreatePopupMenu"));
        }
        Ok(menu)
    }

    fn insert_separator(&mut self, menu: HMENU, id: u32) -> Result<(), PlatformError> {
        let mut info: MENUITEMINFOA = unsafe { std::mem::zeroed() };
        info.cbSize = std::mem::size_of::<MENUITEMINFOA>() as u32;
        info.fMask = MIIM_FTYPE | MIIM_ID;
        info.fType = MFT_SEPARATOR;
        info.wID = id;
        if unsafe { InsertMenuItemA(menu, u32::MAX, 1, &info) } == 0 {
            return Err(last_error("InsertMenuItemA"));
        }
        Ok(())
    }

    fn insert_item(
        &mut self,
        menu: HMENU,
        item: NativeItem<'_, HMENU>,
    ) -> Result<(), PlatformError> {
        let text = c_text(item.text);
        let mut info: MENUITEMINFOA = unsafe { std::mem::zeroed() };
        info.cbSize = std::mem::size_of::<MENUITEMINFOA>() as u32;
        info.fMask = MIIM_FTYPE | MIIM_ID | MIIM_STATE | MIIM_STRING;
        info.fType = MFT_STRING;
        info.wID = item.id;
        info.dwTypeData = text.as_ptr() as *mut u8;
        if item.disabled {
            info.fState |= MFS_DISABLED;
        }
        if item.checked {
            info.fState |= MFS_CHECKED;
        }
        if let Some(submenu) = item.submenu {
            info.fMask |= MIIM_SUBMENU;
            info.hSubMenu = submenu;
        }
        // Appends at the end: the position is past every existing entry.
        if unsafe { InsertMenuItemA(menu, u32::MAX, 1, &info) } == 0 {
            return Err(last_error("InsertMenuItemA"));
        }
        Ok(())
    }

    fn set_checked(&mut self, menu: HMENU, id: u32, checked: bool) -> Result<(), PlatformError> {
        let mut info: MENUITEMINFOA = unsafe { std::mem::zeroed() };
        info.cbSize = std::mem::size_of::<MENUITEMINFOA>() as u32;
        info.fMask = MIIM_STATE;
        info.fState = if checked { MFS_CHECKED } else { MFS_UNCHECKED };
        // By command id: the search descends into submenus.
        if unsafe { SetMenuItemInfoA(menu, id, 0, &info) } == 0 {
            return Err(last_error("SetMenuItemInfoA"));
        }
        Ok(())
    }

    fn install_menu(&mut self, menu: HMENU) {
        MENU.with(|m| m.set(menu));
    }

    fn destroy_menu(&mut self, menu: HMENU) {
        MENU.with(|m| {
            if m.get() == menu {
                m.set(ptr::null_mut());
            }
        });
        unsafe { DestroyMenu(menu) };
    }
}

impl IconLoader for Win32Platform {
    type Handle = HICON;

    fn load(&mut self, path: &str, kind: IconKind) -> Result<HICON, IconLoadError> {
        let decode = |reason: String| IconLoadError::Decode {
            path: path.to_string(),
            kind,
            reason,
        };
        let c_path = CString::new(path).map_err(|e| decode(e.to_string()))?;

        // Large and small must be separate calls, otherwise Windows may
        // hand back only one of the two sizes.
        let icon = match kind {
            IconKind::Large => {
                let mut large: HICON = ptr::null_mut();
                unsafe {
                    ExtractIconExA(c_path.as_ptr().cast(), 0, &mut large, ptr::null_mut(), 1)
                };
                large
            }
            IconKind::Regular => {
                let mut small: HICON = ptr::null_mut();
                unsafe {
                    ExtractIconExA(c_path.as_ptr().cast(), 0, ptr::null_mut(), &mut small, 1)
                };
                small
            }
            IconKind::Notification => unsafe {
                LoadImageA(
                    ptr::null_mut(),
                    c_path.as_ptr().cast(),
                    IMAGE_ICON,
                    GetSystemMetrics(SM_CXICON) * 2,
                    GetSystemMetrics(SM_CYICON) * 2,
                    LR_LOADFROMFILE,
                ) as HICON
            },
        };

        if icon.is_null() {
            let err = last_error("load icon");
            return Err(decode(err.message));
        }
        Ok(icon)
    }

    fn release(&mut self, handle: HICON) {
        unsafe { DestroyIcon(handle) };
    }
}

impl NotifyApi for Win32Platform {
    fn add(&mut self, identity: &TrayIdentity) -> Result<(), PlatformError> {
        let nid = self.notify_data(identity);
        self.notify(NIM_ADD, &nid, "Shell_NotifyIconA(NIM_ADD)")
    }

    fn set_version(&mut self, identity: &TrayIdentity) -> Result<(), PlatformError> {
        let mut nid = self.notify_data(identity);
        nid.Anonymous.uVersion = NOTIFYICON_VERSION_4;
        self.notify(NIM_SETVERSION, &nid, "Shell_NotifyIconA(NIM_SETVERSION)")
    }

    fn modify(
        &mut self,
        identity: &TrayIdentity,
        state: &AppliedState<HICON>,
    ) -> Result<(), PlatformError> {
        let mut nid = self.notify_data(identity);
        let flags = state.flags;

        if flags.icon
            && let Some(icon) = state.icon
        {
            nid.hIcon = icon;
            nid.uFlags |= NIF_ICON;
        }
        if flags.tooltip {
            copy_sz(nid.szTip.as_mut_ptr().cast(), nid.szTip.len(), &state.tooltip);
            nid.uFlags |= NIF_TIP;
        }
        if flags.show_tooltip {
            nid.uFlags |= NIF_SHOWTIP;
        }
        if flags.info {
            copy_sz(
                nid.szInfoTitle.as_mut_ptr().cast(),
                nid.szInfoTitle.len(),
                &state.info_title,
            );
            copy_sz(nid.szInfo.as_mut_ptr().cast(), nid.szInfo.len(), &state.info_text);
            nid.dwInfoFlags = NIIF_NONE;
            if let Some(balloon) = state.balloon_icon {
                nid.hBalloonIcon = balloon;
                nid.dwInfoFlags = if state.large_balloon {
                    NIIF_USER | NIIF_LARGE_ICON
                } else {
                    NIIF_USER
                };
            }
            nid.uFlags |= NIF_INFO;
        }

        self.notify(NIM_MODIFY, &nid, "Shell_NotifyIconA(NIM_MODIFY)")
    }

    fn remove(&mut self, identity: &TrayIdentity) -> Result<(), PlatformError> {
        let nid = self.notify_data(identity);
        self.notify(NIM_DELETE, &nid, "Shell_NotifyIconA(NIM_DELETE)")
    }
}
