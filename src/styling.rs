//! Style constants and message helpers for terminal output.
//!
//! User-facing messages are built with `cformat!` using HTML-like tags:
//!
//! ```
//! use color_print::cformat;
//!
//! let branch = "feature";
//! let msg = cformat!("<green>Checked out <bold>{branch}</></>");
//! ```
//!
//! Semantic mapping: errors `<red>`, warnings `<yellow>`, hints `<dim>`,
//! progress `<cyan>`, success `<green>`, secondary `<bright-black>`.

use anstyle::{AnsiColor, Color, Style};
use color_print::cformat;

/// Pinned-slot marker style for list rendering.
pub const PINNED: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));

/// Dim style for secondary columns in list rendering.
pub const DIM: Style = Style::new().dimmed();

pub const SUCCESS_EMOJI: &str = "✅";
pub const ERROR_EMOJI: &str = "❌";
pub const WARNING_EMOJI: &str = "🟡";
pub const HINT_EMOJI: &str = "💡";
pub const PROGRESS_EMOJI: &str = "🔄";

/// Format an error message with emoji and red styling.
///
/// Content can include inner styling like `<bold>`:
/// ```
/// use color_print::cformat;
/// use grove::styling::error_message;
///
/// let name = "feature";
/// eprintln!("{}", error_message(cformat!("Branch <bold>{name}</> not found")));
/// ```
pub fn error_message(content: impl AsRef<str>) -> String {
    cformat!("{ERROR_EMOJI} <red>{}</>", content.as_ref())
}

/// Format a hint message with emoji and dim styling.
pub fn hint_message(content: impl AsRef<str>) -> String {
    cformat!("{HINT_EMOJI} <dim>{}</>", content.as_ref())
}

/// Format a warning message with emoji and yellow styling.
pub fn warning_message(content: impl AsRef<str>) -> String {
    cformat!("{WARNING_EMOJI} <yellow>{}</>", content.as_ref())
}

/// Format a success message with emoji and green styling.
pub fn success_message(content: impl AsRef<str>) -> String {
    cformat!("{SUCCESS_EMOJI} <green>{}</>", content.as_ref())
}

/// Format a progress message with emoji and cyan styling.
pub fn progress_message(content: impl AsRef<str>) -> String {
    cformat!("{PROGRESS_EMOJI} <cyan>{}</>", content.as_ref())
}

/// Humanize a duration for list output ("3m ago", "2d ago").
pub fn humanize_age(age: chrono::Duration) -> String {
    let secs = age.num_seconds().max(0);
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}
