use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::Line,
    widgets::Widget,
};

/// Fixed-size grid of terminal rows with a scroll region, the way a
/// plain scrolling terminal behaves.
///
/// Lines are written on the bottom row and the scroll region is then moved
/// up by one, so the written line ends up on the row above the bottom and
/// the bottom row is blank again. Rows outside the region never move.
#[derive(Debug, Clone)]
pub struct LogView {
    rows: Vec<Line<'static>>,
    width: u16,
    scroll_top: u16,
    scroll_bottom: u16,
}

impl LogView {
    pub fn new(height: u16, width: u16) -> Self {
        Self {
            rows: vec![Line::default(); height as usize],
            width,
            scroll_top: 0,
            scroll_bottom: height.saturating_sub(1),
        }
    }

    pub fn height(&self) -> u16 {
        self.rows.len() as u16
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn scroll_region(&self) -> (u16, u16) {
        (self.scroll_top, self.scroll_bottom)
    }

    /// Restricts scrolling to rows `top..=bottom`. Out-of-range values are
    /// clamped to the grid.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let last = self.height().saturating_sub(1);
        self.scroll_bottom = bottom.min(last);
        self.scroll_top = top.min(self.scroll_bottom);
    }

    pub fn row(&self, index: u16) -> Option<&Line<'static>> {
        self.rows.get(index as usize)
    }

    /// Plain text of a row, without styling.
    pub fn row_text(&self, index: u16) -> String {
        self.row(index).map(ToString::to_string).unwrap_or_default()
    }

    pub fn set_row(&mut self, index: u16, line: Line<'static>) {
        if let Some(row) = self.rows.get_mut(index as usize) {
            *row = line;
        }
    }

    /// Writes `line` on the bottom row, then scrolls the region up by one.
    pub fn push_line(&mut self, line: Line<'static>) {
        if self.rows.is_empty() {
            return;
        }
        let bottom = self.rows.len() - 1;
        self.rows[bottom] = line;
        if self.scroll_bottom as usize == bottom {
            self.scroll_up();
        }
    }

    fn scroll_up(&mut self) {
        let top = self.scroll_top as usize;
        let bottom = self.scroll_bottom as usize;
        if top >= bottom {
            self.rows[bottom] = Line::default();
            return;
        }
        self.rows[top..=bottom].rotate_left(1);
        self.rows[bottom] = Line::default();
    }
}

impl Widget for &LogView {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for (offset, line) in self.rows.iter().enumerate().take(area.height as usize) {
            buf.set_line(area.x, area.y + offset as u16, line, area.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(view: &LogView) -> Vec<String> {
        (0..view.height()).map(|i| view.row_text(i)).collect()
    }

    #[test]
    fn pushed_line_sits_above_bottom_row() {
        let mut view = LogView::new(4, 20);
        view.push_line(Line::raw("a"));
        assert_eq!(texts(&view), ["", "", "a", ""]);
        view.push_line(Line::raw("b"));
        assert_eq!(texts(&view), ["", "a", "b", ""]);
    }

    #[test]
    fn rows_above_scroll_region_stay_put() {
        let mut view = LogView::new(4, 20);
        view.push_line(Line::raw("pinned"));
        view.push_line(Line::raw("x"));
        assert_eq!(texts(&view), ["", "pinned", "x", ""]);
        view.push_line(Line::raw("y"));
        assert_eq!(texts(&view), ["pinned", "x", "y", ""]);

        view.set_scroll_region(1, 3);
        view.push_line(Line::raw("z"));
        assert_eq!(texts(&view), ["pinned", "y", "z", ""]);

        view.set_scroll_region(0, 3);
        view.push_line(Line::raw("w"));
        assert_eq!(texts(&view), ["y", "z", "w", ""]);
    }

    #[test]
    fn region_is_clamped() {
        let mut view = LogView::new(3, 10);
        view.set_scroll_region(7, 40);
        assert_eq!(view.scroll_region(), (2, 2));
        view.push_line(Line::raw("gone"));
        assert_eq!(texts(&view), ["", "", ""]);
    }

    #[test]
    fn renders_rows_into_buffer() {
        let mut view = LogView::new(3, 5);
        view.set_row(0, Line::raw("top"));
        view.push_line(Line::raw("hello world"));

        let area = Rect::new(0, 0, 5, 3);
        let mut buf = Buffer::empty(area);
        (&view).render(area, &mut buf);

        assert_eq!(buf, Buffer::with_lines(["     ", "hello", "     "]));
    }
}
