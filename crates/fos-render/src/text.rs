//! Text draw commands and their renderer-side projection.

use fos_gfx::{Color, Rect};
use serde::{Deserialize, Serialize};

const TAB: &str = "    ";

/// Characters that start terminal escape sequences
fn is_escape(c: char) -> bool {
    c == '\x1b' || ('\u{80}'..='\u{9f}').contains(&c)
}

/// A text record as it arrives over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDrawCommand {
    pub contents: String,
    pub bounds: Rect,
    pub color: Color,
}

impl TextDrawCommand {
    pub fn new(contents: impl Into<String>, bounds: Rect, color: Color) -> Self {
        Self {
            contents: contents.into(),
            bounds,
            color,
        }
    }

    /// Reject records that can't be laid out or would inject escapes
    pub fn validate(&self) -> Result<(), String> {
        if let Some(c) = self.contents.chars().find(|c| is_escape(*c)) {
            return Err(format!("contents contain escape character {:?}", c));
        }
        if self.bounds.checked_right().is_none() || self.bounds.checked_bottom().is_none() {
            return Err(format!("bounds {} overflow", self.bounds));
        }
        Ok(())
    }
}

/// A run of text the renderer draws
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub contents: String,
    pub bounds: Rect,
    pub color: Color,
}

impl Text {
    pub fn new(contents: impl Into<String>, bounds: Rect, color: Color) -> Self {
        Self {
            contents: contents.into(),
            bounds,
            color,
        }
    }
}

impl TryFrom<TextDrawCommand> for Text {
    type Error = String;

    fn try_from(command: TextDrawCommand) -> Result<Self, Self::Error> {
        command.validate()?;

        let TextDrawCommand {
            contents,
            bounds,
            color,
        } = command;

        // Tabs expand, any other layout control becomes a single space
        let contents = if contents.chars().any(char::is_control) {
            contents
                .chars()
                .map(|c| match c {
                    '\t' => TAB.to_string(),
                    c if c.is_control() => " ".to_string(),
                    c => c.to_string(),
                })
                .collect()
        } else {
            contents
        };

        Ok(Self {
            contents,
            bounds,
            color,
        })
    }
}
