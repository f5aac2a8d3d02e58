pub mod format;
pub mod pinning;

use std::io;
use std::time::Duration;

use futures::StreamExt;
use ratatui::{Terminal, backend::Backend, text::Line};
use tokio_util::time::DelayQueue;

use crate::journal::JournalEntry;
use crate::palette::Palette;
use crate::widgets::log_view::LogView;

pub use pinning::{Admission, Expiry, PinState};

/// How long an error line stays eligible to be held at the top.
pub const DEFAULT_VISIBILITY_WINDOW: Duration = Duration::from_secs(8);

/// Renders journal entries as a scrolling log in which error lines are
/// held at the top of the screen for a while.
///
/// Geometry is read once from the terminal and never changes afterwards.
/// Each recorded error line arms its own timer in `timers`; dropping the
/// engine cancels all of them.
pub struct DisplayEngine<B: Backend> {
    terminal: Terminal<B>,
    view: LogView,
    pins: PinState,
    timers: DelayQueue<u16>,
    window: Duration,
    palette: Palette,
}

impl<B: Backend> DisplayEngine<B> {
    pub fn new(terminal: Terminal<B>, window: Duration, palette: Palette) -> io::Result<Self> {
        let size = terminal.size()?;
        let mut view = LogView::new(size.height, size.width);
        view.set_row(0, Line::raw("Starting ..."));

        let mut engine = Self {
            terminal,
            view,
            pins: PinState::new(size.height),
            timers: DelayQueue::new(),
            window,
            palette,
        };
        engine.refresh()?;
        Ok(engine)
    }

    pub fn pins(&self) -> &PinState {
        &self.pins
    }

    pub fn view(&self) -> &LogView {
        &self.view
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    /// Prints one entry. Returns `false` if it was dropped because the
    /// pinned area fills the screen.
    pub fn add_entry(&mut self, entry: &JournalEntry) -> io::Result<bool> {
        let scroll_top = match self.pins.admit() {
            Admission::Drop => {
                tracing::trace!("screen full of pinned errors, dropping line");
                return Ok(false);
            }
            Admission::Print { scroll_top } => scroll_top,
        };
        self.view
            .set_scroll_region(scroll_top, self.pins.rows().saturating_sub(1));

        let level = entry.level();
        let text = format::compose_line(entry, self.view.width());
        self.view
            .push_line(Line::styled(text, self.palette.style(level)));

        if let Some(row) = self.pins.line_printed(level.is_pinnable()) {
            self.timers.insert(row, self.window);
        }

        self.refresh()?;
        if let Some((top, bottom)) = self.pins.scroll_region() {
            self.view.set_scroll_region(top, bottom);
        }
        Ok(true)
    }

    /// Waits for the next visibility timer. Resolves to `None` right away
    /// when no timer is armed.
    pub async fn next_timeout(&mut self) -> Option<u16> {
        self.timers.next().await.map(|expired| expired.into_inner())
    }

    /// Handles a visibility timer returned by [`Self::next_timeout`].
    pub fn on_timeout(&mut self, row: u16) -> Expiry {
        let expiry = self.pins.expire();
        tracing::trace!(row, ?expiry, "error line visibility elapsed");
        expiry
    }

    pub fn refresh(&mut self) -> io::Result<()> {
        let view = &self.view;
        self.terminal
            .draw(|frame| frame.render_widget(view, frame.area()))?;
        Ok(())
    }
}
