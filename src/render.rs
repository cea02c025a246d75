//! Table rendering
//!
//! Tables are drawn with ratatui into an off-screen buffer sized to the
//! terminal, then printed line by line.

use crate::inventory::table::TableData;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Style, Stylize};
use ratatui::widgets::{Block, Cell, Row, Table, Widget};
use std::io::{self, Write};

/// Width used when the terminal size cannot be queried (pipes, CI)
const DEFAULT_WIDTH: u16 = 160;

/// Widest a single column may grow before its content is cut
const MAX_COLUMN_WIDTH: u16 = 48;

/// Something that can show a table to the user
pub trait Renderer {
    fn render(&mut self, table: &TableData, caption: &str) -> io::Result<()>;
}

/// Renders bordered, captioned tables to a writer
pub struct TableRenderer<W: Write> {
    out: W,
    max_width: u16,
}

impl TableRenderer<io::Stdout> {
    /// Render to stdout, fitting the current terminal width
    pub fn stdout() -> Self {
        let max_width = crossterm::terminal::size()
            .map(|(w, _)| w)
            .unwrap_or(DEFAULT_WIDTH);
        Self::new(io::stdout(), max_width)
    }
}

impl<W: Write> TableRenderer<W> {
    pub fn new(out: W, max_width: u16) -> Self {
        Self { out, max_width }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for TableRenderer<W> {
    fn render(&mut self, table: &TableData, caption: &str) -> io::Result<()> {
        for line in draw_table(table, caption, self.max_width) {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()
    }
}

/// Lay out a table as text lines no wider than `max_width`
pub fn draw_table(table: &TableData, caption: &str, max_width: u16) -> Vec<String> {
    if table.is_empty() {
        return vec![format!("{}: no resources found", caption)];
    }

    let widths = column_widths(table);
    let natural: u16 = widths
        .iter()
        .sum::<u16>()
        .saturating_add(widths.len().saturating_sub(1) as u16)
        .saturating_add(2)
        .max(caption.chars().count() as u16 + 2);
    let width = natural.min(max_width.max(10));
    let height = (table.len() as u16).saturating_add(3);

    let header = Row::new(table.header().iter().map(|h| Cell::from(h.as_str())))
        .style(Style::new().bold());
    let rows = table
        .body()
        .iter()
        .map(|r| Row::new(r.iter().map(|c| Cell::from(c.as_str()))));
    let widget = Table::new(rows, widths.iter().map(|w| Constraint::Length(*w)))
        .header(header)
        .column_spacing(1)
        .block(Block::bordered().title(caption));

    let area = Rect::new(0, 0, width, height);
    let mut buf = Buffer::empty(area);
    widget.render(area, &mut buf);

    (0..height)
        .map(|y| {
            let line: String = (0..width).map(|x| buf[(x, y)].symbol()).collect();
            line.trim_end().to_string()
        })
        .collect()
}

fn column_widths(table: &TableData) -> Vec<u16> {
    table
        .header()
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let longest = table
                .body()
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0);
            (longest as u16).min(MAX_COLUMN_WIDTH)
        })
        .collect()
}
