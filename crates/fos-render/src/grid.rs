//! Terminal Renderer - cell grid backed rendering surface
//!
//! Every terminal cell covers a block of surface pixels (`CellMetrics`).
//! The upper half of the block is averaged into the cell's top color and
//! the lower half into its bottom color; text is laid over the cells as
//! graphemes. Only cells that changed since the last render are painted.

use crate::painter::Painter;
use crate::renderer::Renderer;
use crate::text::Text;
use fos_gfx::{Bitmap, Color, Point, Rect};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::ops::Range;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Surface pixels covered by one terminal cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellMetrics {
    pub width: u32,
    pub height: u32,
}

impl Default for CellMetrics {
    fn default() -> Self {
        Self {
            width: 1,
            height: 2,
        }
    }
}

/// A grapheme occupying one or more cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grapheme {
    pub symbol: String,
    /// Width in cells
    pub width: usize,
    /// Offset of this cell within the grapheme, 0 for the leading cell
    pub index: usize,
    pub color: Color,
}

/// One terminal cell: two stacked pixels and optional text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub top: Color,
    pub bottom: Color,
    pub grapheme: Option<Grapheme>,
}

pub struct TerminalRenderer<W: Write> {
    columns: u32,
    rows: u32,
    metrics: CellMetrics,
    cells: Vec<Cell>,
    dirty: Vec<bool>,
    /// Cell the text cursor is shown in
    cursor: Option<(u32, u32)>,
    cursor_moved: bool,
    painter: Painter<W>,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(columns: u32, rows: u32, metrics: CellMetrics, painter: Painter<W>) -> Self {
        let metrics = CellMetrics {
            width: metrics.width.max(1),
            height: metrics.height.max(1),
        };
        let len = columns as usize * rows as usize;

        debug!("Terminal grid {}x{} cells", columns, rows);

        Self {
            columns,
            rows,
            metrics,
            cells: vec![Cell::default(); len],
            dirty: vec![true; len],
            cursor: None,
            cursor_moved: false,
            painter,
        }
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cell(&self, column: u32, row: u32) -> Option<&Cell> {
        self.index(column, row).map(|i| &self.cells[i])
    }

    pub fn cursor(&self) -> Option<(u32, u32)> {
        self.cursor
    }

    pub fn output(&self) -> &W {
        self.painter.output()
    }

    fn index(&self, column: u32, row: u32) -> Option<usize> {
        (column < self.columns && row < self.rows)
            .then(|| row as usize * self.columns as usize + column as usize)
    }

    /// Cells whose pixel blocks overlap `[start, end)` along one axis
    fn cell_span(start: i64, end: i64, cell: u32, limit: u32) -> Range<u32> {
        let cell = cell as i64;
        let first = start.max(0) / cell;
        let last = ((end.max(0) + cell - 1) / cell).min(limit as i64);
        first as u32..(last.max(first)) as u32
    }

    fn clear_text(&mut self) {
        for (cell, dirty) in self.cells.iter_mut().zip(self.dirty.iter_mut()) {
            if cell.grapheme.take().is_some() {
                *dirty = true;
            }
        }
    }

    fn place_text(&mut self, text: &Text) {
        let bounds = text.bounds;
        if bounds.is_empty() {
            return;
        }

        let left = bounds.x as i64;
        let right = left + bounds.width as i64;
        let center = bounds.y as i64 + bounds.height as i64 / 2;
        if center < 0 {
            return;
        }

        let row = (center / self.metrics.height as i64) as u32;
        let mut column = left.div_euclid(self.metrics.width as i64);
        let end = (right + self.metrics.width as i64 - 1)
            .div_euclid(self.metrics.width as i64)
            .min(self.columns as i64);

        for symbol in text.contents.graphemes(true) {
            let width = symbol.width();
            if width == 0 {
                continue;
            }
            if column + width as i64 > end {
                break;
            }

            if column >= 0 && !symbol.trim().is_empty() {
                for index in 0..width {
                    let Some(i) = self.index(column as u32 + index as u32, row) else {
                        continue;
                    };
                    self.cells[i].grapheme = Some(Grapheme {
                        symbol: symbol.to_string(),
                        width,
                        index,
                        color: text.color,
                    });
                    self.dirty[i] = true;
                }
            }

            column += width as i64;
        }
    }
}

/// Mean color of the bitmap pixels inside both `rect` and the pixel block
fn average(bitmap: &Bitmap, rect: Rect, xs: Range<i64>, ys: Range<i64>) -> Option<Color> {
    let (mut r, mut g, mut b, mut a, mut n) = (0u32, 0u32, 0u32, 0u32, 0u32);

    for y in ys.start.max(rect.y as i64)..ys.end.min(rect.y as i64 + rect.height as i64) {
        for x in xs.start.max(rect.x as i64)..xs.end.min(rect.x as i64 + rect.width as i64) {
            let Some(pixel) = bitmap.pixel((x - rect.x as i64) as u32, (y - rect.y as i64) as u32)
            else {
                continue;
            };
            r += pixel.r as u32;
            g += pixel.g as u32;
            b += pixel.b as u32;
            a += pixel.a as u32;
            n += 1;
        }
    }

    (n > 0).then(|| Color::rgba((r / n) as u8, (g / n) as u8, (b / n) as u8, (a / n) as u8))
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn draw_text(&mut self, texts: Vec<Text>) {
        self.clear_text();
        for text in &texts {
            self.place_text(text);
        }
    }

    fn draw_bitmap(&mut self, rect: Rect, bitmap: &Bitmap) {
        // The bitmap may be smaller than the rect it claims to cover
        let rect = Rect::new(
            rect.x,
            rect.y,
            rect.width.min(bitmap.width()),
            rect.height.min(bitmap.height()),
        );
        if rect.is_empty() {
            return;
        }

        let CellMetrics { width, height } = self.metrics;
        let columns = Self::cell_span(
            rect.x as i64,
            rect.x as i64 + rect.width as i64,
            width,
            self.columns,
        );
        let rows = Self::cell_span(
            rect.y as i64,
            rect.y as i64 + rect.height as i64,
            height,
            self.rows,
        );
        let split = (height as i64 / 2).max(1);

        for row in rows {
            let y0 = row as i64 * height as i64;
            let (top_ys, bottom_ys) = if height == 1 {
                (y0..y0 + 1, y0..y0 + 1)
            } else {
                (y0..y0 + split, y0 + split..y0 + height as i64)
            };

            for column in columns.clone() {
                let x0 = column as i64 * width as i64;
                let xs = x0..x0 + width as i64;
                let Some(i) = self.index(column, row) else {
                    continue;
                };

                let cell = &mut self.cells[i];
                let before = (cell.top, cell.bottom);
                if let Some(top) = average(bitmap, rect, xs.clone(), top_ys.clone()) {
                    cell.top = top;
                }
                if let Some(bottom) = average(bitmap, rect, xs, bottom_ys.clone()) {
                    cell.bottom = bottom;
                }
                if before != (cell.top, cell.bottom) {
                    self.dirty[i] = true;
                }
            }
        }
    }

    fn set_cursor(&mut self, cursor: Option<Point>) {
        let cell = cursor.and_then(|point| {
            if point.x < 0 || point.y < 0 {
                return None;
            }
            let column = point.x as u32 / self.metrics.width;
            let row = point.y as u32 / self.metrics.height;
            self.index(column, row).map(|_| (column, row))
        });

        if cell != self.cursor {
            self.cursor = cell;
            self.cursor_moved = true;
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        self.painter.finish()
    }

    fn render(&mut self) -> io::Result<()> {
        if !self.cursor_moved && !self.dirty.iter().any(|dirty| *dirty) {
            return Ok(());
        }
        self.cursor_moved = false;

        self.painter.begin()?;
        for row in 0..self.rows {
            for column in 0..self.columns {
                let i = row as usize * self.columns as usize + column as usize;
                if self.dirty[i] {
                    self.painter.paint(column, row, &self.cells[i])?;
                    self.dirty[i] = false;
                }
            }
        }
        self.painter.end(self.cursor)
    }
}
