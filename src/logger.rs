//! Terminal output: prefixed log lines and the batch progress bar.
//!
//! ```ignore
//! log!("cache"; "static entry {key}");
//!
//! let progress = Progress::start("extract", files.len());
//! for file in files {
//!     // ...
//!     if let Some(p) = &progress { p.inc(); }
//! }
//! ```
//!
//! While a bar is active it owns the last terminal line; log lines are
//! printed above it and the bar is redrawn underneath.

use colored::{ColoredString, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{Write, stdout},
    sync::{
        Mutex, OnceLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

/// Terminal width, read once.
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Set while a progress bar occupies the bottom line.
static BAR_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Last rendered bar, redrawn after each log line.
static BAR_LINE: Mutex<String> = Mutex::new(String::new());

const FALLBACK_WIDTH: u16 = 120;
const MIN_BAR_WIDTH: usize = 10;
const MAX_BAR_WIDTH: usize = 40;

fn terminal_width() -> usize {
    usize::from(*TERMINAL_WIDTH.get_or_init(|| size().map_or(FALLBACK_WIDTH, |(w, _)| w)))
}

/// `[module] ` takes the module name plus brackets and a space.
#[inline]
const fn prefix_len(module: &str) -> usize {
    module.len() + 3
}

/// Log a message with a colored `[module]` prefix.
///
/// ```ignore
/// log!("query"; "{} nodes loaded", dataset.len());
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Print one log line. Single-line messages are cut to the terminal width;
/// multi-line messages (engine stderr, query text) are printed whole.
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);
    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::CurrentLine)).ok();
    write!(stdout, "\r").ok();

    if message.contains('\n') {
        writeln!(stdout, "{prefix} {message}").ok();
    } else {
        let max = terminal_width().saturating_sub(prefix_len(module));
        writeln!(stdout, "{prefix} {}", truncate_str(message, max)).ok();
    }

    if BAR_ACTIVE.load(Ordering::SeqCst)
        && let Ok(line) = BAR_LINE.lock()
    {
        write!(stdout, "{line}").ok();
    }
    stdout.flush().ok();
}

/// Single progress bar on the bottom terminal line.
pub struct Progress {
    module: &'static str,
    total: usize,
    current: AtomicUsize,
}

impl Progress {
    /// Start a bar, or `None` when there is at most one item to show.
    pub fn start(module: &'static str, total: usize) -> Option<Self> {
        if total <= 1 {
            return None;
        }
        let progress = Self {
            module,
            total,
            current: AtomicUsize::new(0),
        };
        BAR_ACTIVE.store(true, Ordering::SeqCst);
        progress.draw(0);
        Some(progress)
    }

    #[inline]
    pub fn inc(&self) {
        let current = self.current.fetch_add(1, Ordering::Relaxed) + 1;
        self.draw(current);
    }

    fn draw(&self, current: usize) {
        let line = render_bar(
            &colorize_prefix(self.module).to_string(),
            prefix_len(self.module),
            current,
            self.total,
            terminal_width(),
        );

        let mut stdout = stdout().lock();
        execute!(stdout, Clear(ClearType::CurrentLine)).ok();
        write!(stdout, "\r{line}").ok();
        stdout.flush().ok();

        if let Ok(mut last) = BAR_LINE.lock() {
            *last = line;
        }
    }

    /// Remove the bar. Called on drop.
    pub fn finish(&self) {
        if !BAR_ACTIVE.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut stdout = stdout().lock();
        execute!(stdout, Clear(ClearType::CurrentLine), cursor::MoveToColumn(0)).ok();
        stdout.flush().ok();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish();
    }
}

/// `[extract] [████░░░░] 42/100`, sized to the terminal.
fn render_bar(prefix: &str, prefix_len: usize, current: usize, total: usize, width: usize) -> String {
    let count = format!("{current}/{total}");
    // " [" + "] " around the bar
    let overhead = prefix_len + 3 + count.len();
    let bar_width = width
        .saturating_sub(overhead)
        .clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH);

    let filled = (current.min(total) * bar_width).checked_div(total).unwrap_or(0);
    let bar = "█".repeat(filled) + &"░".repeat(bar_width - filled);
    format!("{prefix} [{bar}] {count}")
}

fn colorize_prefix(module: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "watch" => prefix.bright_green().bold(),
        "cache" | "pages" => prefix.bright_blue().bold(),
        "fragments" | "query" => prefix.bright_cyan().bold(),
        "warn" => prefix.bright_magenta().bold(),
        "error" => prefix.bright_red().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Cut `s` to at most `max_len` bytes on a char boundary.
#[inline]
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_len() {
        assert_eq!(prefix_len("extract"), "[extract] ".len());
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 5), "hello");
        assert_eq!(truncate_str("hello", 0), "");
        // 3 bytes per char
        assert_eq!(truncate_str("你好", 4), "你");
    }

    #[test]
    fn test_render_bar() {
        let line = render_bar("[extract]", 10, 5, 10, 80);
        assert!(line.starts_with("[extract] ["));
        assert!(line.ends_with("] 5/10"));
        assert_eq!(line.matches('█').count(), line.matches('░').count());

        // Narrow terminals keep the minimum width
        let line = render_bar("[extract]", 10, 10, 10, 20);
        assert_eq!(line.matches('█').count(), MIN_BAR_WIDTH);
    }

    #[test]
    fn test_single_item_has_no_bar() {
        assert!(Progress::start("extract", 1).is_none());
        assert!(Progress::start("extract", 0).is_none());
    }
}
