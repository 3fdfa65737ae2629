//! Styled CLI output.
//!
//! Status lines go to stderr so stdout stays clean for piping. Under `--color auto`
//! colors are used only on a terminal and never when `NO_COLOR` is set.

use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicU8, Ordering};

use crate::cli::args::ColorMode;

static COLOR_MODE: AtomicU8 = AtomicU8::new(ColorMode::Auto as u8);

/// Apply `--color` for the rest of the process.
pub fn set_color_mode(mode: ColorMode) {
    COLOR_MODE.store(mode as u8, Ordering::Relaxed);
}

fn color_mode() -> ColorMode {
    match COLOR_MODE.load(Ordering::Relaxed) {
        m if m == ColorMode::Always as u8 => ColorMode::Always,
        m if m == ColorMode::Never as u8 => ColorMode::Never,
        _ => ColorMode::Auto,
    }
}

/// Check if colors should be disabled based on NO_COLOR env var.
fn colors_disabled() -> bool {
    std::env::var("NO_COLOR")
        .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
        .unwrap_or(false)
}

fn use_colors() -> bool {
    should_color(color_mode(), colors_disabled(), std::io::stderr().is_terminal())
}

/// `always` and `never` win over `NO_COLOR` and terminal detection.
fn should_color(mode: ColorMode, no_color: bool, is_terminal: bool) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => !no_color && is_terminal,
    }
}

mod palette {
    pub const SUCCESS: &str = "\x1b[38;2;0;245;212m";
    pub const ERROR: &str = "\x1b[38;2;255;107;107m";
    pub const WARNING: &str = "\x1b[38;2;255;200;87m";
    pub const INFO: &str = "\x1b[38;2;72;202;228m";
    pub const DIM: &str = "\x1b[38;2;130;154;177m";
    pub const RESET: &str = "\x1b[0m";
}

/// Message type for styled output.
#[derive(Debug, Clone, Copy)]
pub enum MessageType {
    Success,
    Error,
    Warning,
    Info,
    /// Neutral/dimmed message
    Dim,
}

impl MessageType {
    fn icon(&self) -> &'static str {
        match self {
            MessageType::Success => "[OK]",
            MessageType::Error => "[ERROR]",
            MessageType::Warning => "[WARN]",
            MessageType::Info => "[INFO]",
            MessageType::Dim => "-",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            MessageType::Success => palette::SUCCESS,
            MessageType::Error => palette::ERROR,
            MessageType::Warning => palette::WARNING,
            MessageType::Info => palette::INFO,
            MessageType::Dim => palette::DIM,
        }
    }
}

/// Format a styled message and return the string.
fn format_styled(msg_type: MessageType, message: &str) -> String {
    if use_colors() {
        format!(
            "{}{} {}{}",
            msg_type.color(),
            msg_type.icon(),
            message,
            palette::RESET
        )
    } else {
        format!("{} {}", msg_type.icon(), message)
    }
}

fn print_styled(msg_type: MessageType, message: &str) {
    let _ = writeln!(std::io::stderr(), "{}", format_styled(msg_type, message));
}

/// Print a success message to stderr.
pub fn print_success(message: &str) {
    print_styled(MessageType::Success, message);
}

/// Print an error message to stderr.
pub fn print_error(message: &str) {
    print_styled(MessageType::Error, message);
}

/// Print a warning message to stderr.
pub fn print_warning(message: &str) {
    print_styled(MessageType::Warning, message);
}

/// Print an info message to stderr.
pub fn print_info(message: &str) {
    print_styled(MessageType::Info, message);
}

/// Print a dimmed/muted message to stderr.
pub fn print_dim(message: &str) {
    print_styled(MessageType::Dim, message);
}

/// Color `label` for inline use.
pub fn styled_label(msg_type: MessageType, label: &str) -> String {
    if use_colors() {
        format!("{}{}{}", msg_type.color(), label, palette::RESET)
    } else {
        label.to_string()
    }
}
