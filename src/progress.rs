//! Download progress bar for the CLI.

use indicatif::{ProgressBar, ProgressStyle};

/// Creates the bar, drawn on stderr, or a hidden one when not requested.
pub(crate) fn progress_bar(enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::no_length();
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

/// Progress callback that moves `bar` to the reported byte count.
pub(crate) fn observer(bar: &ProgressBar) -> impl Fn(u64, Option<u64>) + Send + Sync + 'static {
    let bar = bar.clone();
    move |read, total| {
        if let Some(total) = total {
            if bar.length() != Some(total) {
                bar.set_length(total);
            }
        }
        bar.set_position(read);
    }
}
