use std::io::Write;
use std::path::Path;

const OSC_START: &str = "\x1b]777;";
const OSC_END: &str = "\x1b\\";

/// Tell OSC-777 aware terminals that a container-like session started.
pub fn emit_session_push(rootfs: &Path) {
    if is_interactive_terminal() {
        let marker = format!(
            "{OSC_START}container;push;freeroot;freeroot;{}{OSC_END}",
            rootfs.display()
        );
        let _ = std::io::stderr().write_all(marker.as_bytes());
        let _ = std::io::stderr().flush();
    }
}

pub fn emit_session_pop() {
    if is_interactive_terminal() {
        let marker = format!("{OSC_START}container;pop;;{OSC_END}");
        let _ = std::io::stderr().write_all(marker.as_bytes());
        let _ = std::io::stderr().flush();
    }
}

pub fn print_session_banner(arch: &str, engine_version: Option<&str>) {
    if is_interactive_terminal() {
        let engine = engine_version.unwrap_or("engine");
        eprintln!(
            "\x1b[1;36m[freeroot]\x1b[0m entering \x1b[1mroot shell\x1b[0m ({arch}, {engine}); type \x1b[1mexit\x1b[0m to leave"
        );
    }
}

pub fn print_session_exit(code: i32) {
    if is_interactive_terminal() {
        eprintln!("\x1b[1;36m[freeroot]\x1b[0m session ended (exit {code})");
    }
}

#[allow(unsafe_code)]
pub fn is_interactive_terminal() -> bool {
    // SAFETY: isatty() only inspects the descriptor; no side effects.
    unsafe { libc::isatty(libc::STDERR_FILENO) != 0 }
}
