//! Process-wide signal state.
//!
//! Two pieces of state live here and nowhere else: the pid of the running
//! engine child (so SIGINT and SIGWINCH reach it) and the interrupt flag
//! that cancels in-flight bootstrap work.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Once;

static CHILD_PID: AtomicI32 = AtomicI32::new(0);
/// Set when the child runs in its own process group, where signals from
/// the terminal do not reach it.
static FORWARD_TO_CHILD: AtomicBool = AtomicBool::new(false);
static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INSTALL: Once = Once::new();

/// Install the SIGINT and SIGWINCH handlers. Idempotent.
///
/// While a child runs, the session decides what SIGINT means. A child in
/// our foreground process group already got it from the terminal; one in
/// its own group gets it forwarded. Otherwise the first SIGINT sets the interrupt flag so the
/// current stage can stop cleanly; a second one exits immediately.
pub fn install_handlers() {
    INSTALL.call_once(|| {
        let _ = ctrlc::set_handler(move || {
            let pid = CHILD_PID.load(Ordering::SeqCst);
            if pid > 0 {
                if FORWARD_TO_CHILD.load(Ordering::SeqCst) {
                    forward(pid, libc::SIGINT);
                }
                return;
            }
            if INTERRUPTED.swap(true, Ordering::SeqCst) {
                std::process::exit(130);
            }
            eprintln!("\ninterrupt received, stopping...");
        });
        install_winch_forwarder();
    });
}

#[allow(unsafe_code)]
fn install_winch_forwarder() {
    extern "C" fn on_winch(_sig: libc::c_int) {
        let pid = CHILD_PID.load(Ordering::SeqCst);
        if pid > 0 && FORWARD_TO_CHILD.load(Ordering::SeqCst) {
            forward(pid, libc::SIGWINCH);
        }
    }
    // SAFETY: the handler only performs an atomic load and kill(2), both
    // async-signal-safe. The function pointer lives for the whole program.
    unsafe {
        libc::signal(
            libc::SIGWINCH,
            on_winch as extern "C" fn(libc::c_int) as libc::sighandler_t,
        );
    }
}

#[allow(unsafe_code)]
fn forward(pid: i32, sig: libc::c_int) {
    // SAFETY: kill(2) has no memory-safety preconditions; a stale pid at
    // worst yields ESRCH, which is ignored.
    unsafe {
        libc::kill(pid, sig);
    }
}

/// The flag cancellable operations poll.
pub fn interrupt_flag() -> &'static AtomicBool {
    &INTERRUPTED
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

#[allow(unsafe_code)]
fn shares_process_group(pid: i32) -> bool {
    // SAFETY: getpgid(2) and getpgrp(2) only query process state; a dead
    // pid yields -1, which never equals our group.
    let (theirs, ours) = unsafe { (libc::getpgid(pid), libc::getpgrp()) };
    theirs == ours
}

pub(crate) fn set_child(pid: u32) {
    let pid = i32::try_from(pid).unwrap_or(0);
    let forward = pid > 0 && !shares_process_group(pid);
    FORWARD_TO_CHILD.store(forward, Ordering::SeqCst);
    CHILD_PID.store(pid, Ordering::SeqCst);
}

pub(crate) fn clear_child() {
    CHILD_PID.store(0, Ordering::SeqCst);
    FORWARD_TO_CHILD.store(false, Ordering::SeqCst);
}

pub fn current_child() -> Option<i32> {
    match CHILD_PID.load(Ordering::SeqCst) {
        0 => None,
        pid => Some(pid),
    }
}
