use autopot::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Bridges the library's progress events onto indicatif bars.
///
/// Phases render as a steady-tick spinner, bulk work as a position bar.
/// Free-form messages print above whatever bar is active so they survive
/// redraws.
pub struct UiManager {
    bar: Mutex<Option<ProgressBar>>,
}

impl UiManager {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    pub fn callback(&self) -> ProgressCallback<'_> {
        Box::new(move |event| self.handle(event))
    }

    fn handle(&self, event: Progress) {
        let mut slot = match self.bar.lock() {
            Ok(slot) => slot,
            Err(_) => return,
        };
        match event {
            Progress::PhaseStart { name } => {
                if let Some(old) = slot.take() {
                    old.finish_and_clear();
                }
                let spinner = ProgressBar::new_spinner().with_message(name);
                spinner.enable_steady_tick(Duration::from_millis(120));
                *slot = Some(spinner);
            }
            Progress::PhaseFinish => {
                if let Some(bar) = slot.take() {
                    bar.finish_and_clear();
                }
            }
            Progress::TaskStart { total } => {
                if let Some(old) = slot.take() {
                    old.finish_and_clear();
                }
                let bar = ProgressBar::new(total);
                if let Ok(style) =
                    ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                {
                    bar.set_style(style);
                }
                *slot = Some(bar);
            }
            Progress::TaskIncrement { amount } => {
                if let Some(bar) = slot.as_ref() {
                    bar.inc(amount);
                }
            }
            Progress::TaskFinish => {
                if let Some(bar) = slot.take() {
                    bar.finish_and_clear();
                }
            }
            Progress::StatusUpdate { text } => {
                if let Some(bar) = slot.as_ref() {
                    bar.set_message(text);
                } else {
                    eprintln!("{text}");
                }
            }
            Progress::Message(text) => {
                if let Some(bar) = slot.as_ref() {
                    bar.println(text);
                } else {
                    println!("{text}");
                }
            }
        }
    }
}

impl Default for UiManager {
    fn default() -> Self {
        Self::new()
    }
}
