//! Messages from generated code to the host.
//!
//! Generated C reports progress and errors through four C-ABI functions
//! exported by the host process (link the host with `-rdynamic` so a loaded
//! artifact can resolve them):
//!
//! ```c
//! void kiln_host_info(const char *msg);
//! void kiln_host_debug(const char *msg);
//! void kiln_host_notice(const char *msg);
//! void kiln_host_fatal(const char *msg);
//! ```
//!
//! Messages are logged under the `kiln::host` target and also recorded for
//! the thread that is running the entry point, so the pipeline can attach
//! them to the evaluation. A fatal message is recorded as pending; the
//! pipeline turns it into [`EvalError::Fatal`](crate::EvalError::Fatal)
//! once the entry point returns.

#![allow(
    unsafe_code,
    reason = "C-ABI callbacks are exported unmangled and read C strings"
)]
#![allow(
    clippy::not_unsafe_ptr_arg_deref,
    reason = "callbacks receive NUL-terminated strings from generated code"
)]

use std::cell::RefCell;
use std::ffi::{c_char, CStr};
use std::fmt;

/// Severity of a non-fatal message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageLevel {
    Info,
    Debug,
    Notice,
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageLevel::Info => "info",
            MessageLevel::Debug => "debug",
            MessageLevel::Notice => "notice",
        })
    }
}

/// One message sent by generated code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostMessage {
    pub level: MessageLevel,
    pub text: String,
}

#[derive(Default)]
struct Channel {
    messages: Vec<HostMessage>,
    fatal: Option<String>,
}

thread_local! {
    static CHANNEL: RefCell<Channel> = RefCell::new(Channel::default());
}

/// Record and log a message for the current thread.
pub fn post(level: MessageLevel, text: &str) {
    match level {
        MessageLevel::Info => tracing::info!(target: "kiln::host", "{text}"),
        MessageLevel::Debug => tracing::debug!(target: "kiln::host", "{text}"),
        MessageLevel::Notice => tracing::warn!(target: "kiln::host", "{text}"),
    }
    CHANNEL.with(|channel| {
        channel.borrow_mut().messages.push(HostMessage {
            level,
            text: text.to_string(),
        });
    });
}

/// Record a fatal error for the current thread. The first one wins.
pub fn raise_fatal(text: &str) {
    tracing::error!(target: "kiln::host", "{text}");
    CHANNEL.with(|channel| {
        let mut channel = channel.borrow_mut();
        if channel.fatal.is_none() {
            channel.fatal = Some(text.to_string());
        }
    });
}

/// Discard anything recorded on this thread.
pub(crate) fn reset() {
    CHANNEL.with(|channel| *channel.borrow_mut() = Channel::default());
}

/// Take the pending fatal error, if any.
pub(crate) fn take_fatal() -> Option<String> {
    CHANNEL.with(|channel| channel.borrow_mut().fatal.take())
}

/// Take the messages recorded since the last [`reset`].
pub(crate) fn take_messages() -> Vec<HostMessage> {
    CHANNEL.with(|channel| std::mem::take(&mut channel.borrow_mut().messages))
}

fn text(msg: *const c_char) -> String {
    if msg.is_null() {
        return String::new();
    }
    // SAFETY: generated code passes NUL-terminated strings that stay valid
    // for the duration of the call.
    unsafe { CStr::from_ptr(msg) }
        .to_string_lossy()
        .into_owned()
}

#[no_mangle]
pub extern "C" fn kiln_host_info(msg: *const c_char) {
    post(MessageLevel::Info, &text(msg));
}

#[no_mangle]
pub extern "C" fn kiln_host_debug(msg: *const c_char) {
    post(MessageLevel::Debug, &text(msg));
}

#[no_mangle]
pub extern "C" fn kiln_host_notice(msg: *const c_char) {
    post(MessageLevel::Notice, &text(msg));
}

#[no_mangle]
pub extern "C" fn kiln_host_fatal(msg: *const c_char) {
    raise_fatal(&text(msg));
}
