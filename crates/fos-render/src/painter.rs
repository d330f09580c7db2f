//! Painter - ANSI escape output for terminal cells
//!
//! Pixel cells are drawn as a lower half block: the top pixel becomes the
//! background, the bottom pixel the foreground. Text cells draw their
//! grapheme over the average of both pixels.
//!
//! Pixel cells are drawn bold and underlined, text cells plain; the
//! attributes are only switched when the kind of cell changes.
//!
//! A frame is buffered in memory and written in one go on `end`.

use crate::grid::Cell;
use fos_gfx::Color;
use std::io::{self, Write};

const HALF_BLOCK: &str = "\u{2584}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaintMode {
    Text,
    Bitmap,
}

/// Whether the terminal advertises 24-bit color through `COLORTERM`
pub fn detect_true_color() -> bool {
    matches!(
        std::env::var("COLORTERM").unwrap_or_default().as_str(),
        "truecolor" | "24bit"
    )
}

pub struct Painter<W: Write> {
    mode: PaintMode,
    output: W,
    /// Pending frame bytes
    buffer: Vec<u8>,
    /// Where the terminal cursor will be after the buffered output
    cursor: Option<(u32, u32)>,
    true_color: bool,
    background: Option<Color>,
    foreground: Option<Color>,
    background_code: Option<u8>,
    foreground_code: Option<u8>,
}

impl<W: Write> Painter<W> {
    pub fn new(output: W, true_color: bool) -> Self {
        Self {
            mode: PaintMode::Text,
            output,
            buffer: Vec::new(),
            cursor: None,
            true_color,
            background: None,
            foreground: None,
            background_code: None,
            foreground_code: None,
        }
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    /// Start a frame, hiding the cursor while it moves around
    pub fn begin(&mut self) -> io::Result<()> {
        self.buffer.write_all(b"\x1b[?25l\x1b[?12l")
    }

    /// Paint one cell at `(column, row)`
    pub fn paint(&mut self, column: u32, row: u32, cell: &Cell) -> io::Result<()> {
        let (symbol, width, background, foreground, mode) = match &cell.grapheme {
            // Covered by the wide grapheme to its left
            Some(grapheme) if grapheme.index > 0 => return Ok(()),
            Some(grapheme) => (
                grapheme.symbol.as_str(),
                grapheme.width as u32,
                cell.top.avg_with(cell.bottom),
                grapheme.color,
                PaintMode::Text,
            ),
            None => (HALF_BLOCK, 1, cell.top, cell.bottom, PaintMode::Bitmap),
        };

        if self.cursor != Some((column, row)) {
            write!(self.buffer, "\x1b[{};{}H", row + 1, column + 1)?;
        }
        self.cursor = Some((column + width, row));

        self.set_background(background)?;
        self.set_foreground(foreground)?;

        if self.mode != mode {
            self.mode = mode;
            match mode {
                PaintMode::Text => self.buffer.write_all(b"\x1b[22m\x1b[24m")?,
                PaintMode::Bitmap => self.buffer.write_all(b"\x1b[1m\x1b[4m")?,
            }
        }

        self.buffer.write_all(symbol.as_bytes())
    }

    /// Write out the frame and flush the output.
    ///
    /// With a `cursor` cell, the terminal cursor is shown there blinking;
    /// otherwise it stays hidden.
    pub fn end(&mut self, cursor: Option<(u32, u32)>) -> io::Result<()> {
        self.cursor = None;
        self.output.write_all(&self.buffer)?;
        self.buffer.clear();

        if let Some((column, row)) = cursor {
            write!(self.output, "\x1b[{};{}H\x1b[?25h\x1b[?12h", row + 1, column + 1)?;
        }

        self.output.flush()
    }

    /// Hand the terminal back: reset attributes and show the cursor
    pub fn finish(&mut self) -> io::Result<()> {
        self.buffer.clear();
        self.cursor = None;
        self.mode = PaintMode::Text;
        self.background = None;
        self.foreground = None;
        self.background_code = None;
        self.foreground_code = None;

        self.output.write_all(b"\x1b[0m\x1b[?25h")?;
        self.output.flush()
    }

    fn set_background(&mut self, color: Color) -> io::Result<()> {
        if self.true_color {
            if self.background != Some(color) {
                self.background = Some(color);
                write!(self.buffer, "\x1b[48;2;{};{};{}m", color.r, color.g, color.b)?;
            }
        } else {
            let code = color.to_xterm();
            if self.background_code != Some(code) {
                self.background_code = Some(code);
                write!(self.buffer, "\x1b[48;5;{code}m")?;
            }
        }
        Ok(())
    }

    fn set_foreground(&mut self, color: Color) -> io::Result<()> {
        if self.true_color {
            if self.foreground != Some(color) {
                self.foreground = Some(color);
                write!(self.buffer, "\x1b[38;2;{};{};{}m", color.r, color.g, color.b)?;
            }
        } else {
            let code = color.to_xterm();
            if self.foreground_code != Some(code) {
                self.foreground_code = Some(code);
                write!(self.buffer, "\x1b[38;5;{code}m")?;
            }
        }
        Ok(())
    }
}
