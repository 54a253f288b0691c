use {
    crate::term::{clear_status, set_status},
    byte_unit::{Byte, Unit, UnitType},
    eph_sdk::Progress,
    parking_lot::Mutex,
    std::time::{Duration, Instant},
};

const REDRAW_INTERVAL: Duration = Duration::from_millis(200);

#[must_use]
#[inline]
pub fn pretty_size(size: u64) -> String {
    let adjusted = Byte::from_u64(size).get_appropriate_unit(UnitType::Binary);
    if matches!(adjusted.get_unit(), Unit::B) {
        format!("{size} B")
    } else {
        format!("{:.2} {}", adjusted.get_value(), adjusted.get_unit())
    }
}

#[derive(Debug)]
struct State {
    label: String,
    total: u64,
    done: u64,
    last_redraw: Option<Instant>,
}

impl State {
    fn render(&self) -> String {
        let percent = self
            .done
            .saturating_mul(100)
            .checked_div(self.total)
            .unwrap_or(100);
        format!(
            "{}: {} / {} ({percent}%)",
            self.label,
            pretty_size(self.done),
            pretty_size(self.total),
        )
    }
}

/// Shows transfer progress in the terminal status line.
#[derive(Debug)]
pub struct TermProgress {
    enabled: bool,
    state: Mutex<State>,
}

impl TermProgress {
    #[must_use]
    #[inline]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            state: Mutex::new(State {
                label: String::new(),
                total: 0,
                done: 0,
                last_redraw: None,
            }),
        }
    }
}

impl Progress for TermProgress {
    #[inline]
    fn start(&self, label: &str, total: u64) {
        let mut state = self.state.lock();
        *state = State {
            label: label.to_owned(),
            total,
            done: 0,
            last_redraw: Some(Instant::now()),
        };
        if self.enabled {
            set_status(state.render());
        }
    }

    #[inline]
    fn advance(&self, bytes: u64) {
        let mut state = self.state.lock();
        state.done = state.done.saturating_add(bytes);
        let now = Instant::now();
        let due = state
            .last_redraw
            .is_none_or(|last| now.duration_since(last) >= REDRAW_INTERVAL);
        if self.enabled && (due || state.done >= state.total) {
            state.last_redraw = Some(now);
            set_status(state.render());
        }
    }

    #[inline]
    fn finish(&self) {
        if self.enabled {
            clear_status();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(pretty_size(0), "0 B");
        assert_eq!(pretty_size(1000), "1000 B");
        assert_eq!(pretty_size(1536), "1.50 KiB");
        assert_eq!(pretty_size(128 * 1024 * 1024), "128.00 MiB");
    }

    #[test]
    fn render() {
        let progress = TermProgress::new(false);
        progress.start("report.pdf", 4 * 1024 * 1024);
        progress.advance(1024 * 1024);
        assert_eq!(
            progress.state.lock().render(),
            "report.pdf: 1.00 MiB / 4.00 MiB (25%)"
        );
        progress.advance(3 * 1024 * 1024);
        assert_eq!(
            progress.state.lock().render(),
            "report.pdf: 4.00 MiB / 4.00 MiB (100%)"
        );
        progress.finish();
    }

    #[test]
    fn empty_transfer_is_complete() {
        let progress = TermProgress::new(false);
        progress.start("empty", 0);
        assert_eq!(progress.state.lock().render(), "empty: 0 B / 0 B (100%)");
    }
}
