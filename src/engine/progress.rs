//! Load-progress bar.

/// Number of dot positions in the bar.
pub const PROGRESS_DIVISIONS: usize = 15;

/// Render `\r[.....     ]` for `loaded` out of `total`.
///
/// The bar is redrawn from scratch on each event (the leading `\r` returns
/// to column zero). Returns `None` when the total is unknown or zero.
pub fn render_progress(loaded: u64, total: Option<u64>) -> Option<String> {
    let total = total.filter(|&t| t > 0)?;
    let fraction = loaded as f64 / total as f64;
    let dots = ((fraction * PROGRESS_DIVISIONS as f64).floor() as usize).min(PROGRESS_DIVISIONS);
    let spaces = PROGRESS_DIVISIONS - dots;
    Some(format!("\r[{}{}]", ".".repeat(dots), " ".repeat(spaces)))
}
