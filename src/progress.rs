//! Optional progress bars around row sequences

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressIterator, ProgressStyle};

pub const READING: &str = "Reading";
pub const LAZY_READING: &str = "Lazy Reading";
pub const WRITING: &str = "Writing";
pub const LAZY_WRITING: &str = "Lazy Writing";

/// Wrap `iter` in a progress bar labelled `label`.
///
/// When `enabled` is false the iterator is returned untouched. Items are
/// passed through one at a time in their original order.
pub fn track<'a, I>(
    iter: I,
    label: &'static str,
    total: Option<u64>,
    enabled: bool,
) -> Box<dyn Iterator<Item = I::Item> + 'a>
where
    I: Iterator + 'a,
{
    if !enabled {
        return Box::new(iter);
    }
    Box::new(iter.progress_with(new_bar(label, total)))
}

fn new_bar(label: &'static str, total: Option<u64>) -> ProgressBar {
    let bar = match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            let style = ProgressStyle::with_template(
                "{msg}: {percent:>3}% |{wide_bar}| {pos}/{len} [{elapsed_precise}<{eta_precise}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner} {msg}: {pos} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar
        }
    };
    bar.set_draw_target(ProgressDrawTarget::stderr());
    bar.with_message(label)
}
