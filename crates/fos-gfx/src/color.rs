//! Color utilities

use serde::{Deserialize, Serialize};

/// Channel levels of the xterm 6x6x6 color cube
const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

/// RGBA color, 8 bits per channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(C)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "opaque")]
    pub a: u8,
}

fn opaque() -> u8 {
    0xFF
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const RED: Color = Color::rgb(0xFF, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Channel-wise mean of two colors
    pub fn avg_with(&self, other: Color) -> Self {
        let avg = |a: u8, b: u8| ((a as u16 + b as u16) / 2) as u8;

        Self {
            r: avg(self.r, other.r),
            g: avg(self.g, other.g),
            b: avg(self.b, other.b),
            a: avg(self.a, other.a),
        }
    }

    /// Closest entry of the xterm 256-color palette (cube or gray ramp)
    pub fn to_xterm(&self) -> u8 {
        let cube_index = |v: u8| match v {
            0..=47 => 0,
            48..=114 => 1,
            _ => (v - 35) / 40,
        };

        let (ri, gi, bi) = (cube_index(self.r), cube_index(self.g), cube_index(self.b));
        let cube = Color::rgb(
            CUBE_LEVELS[ri as usize],
            CUBE_LEVELS[gi as usize],
            CUBE_LEVELS[bi as usize],
        );

        let mean = ((self.r as u16 + self.g as u16 + self.b as u16) / 3) as u8;
        let gray_index = if mean > 238 { 23 } else { mean.saturating_sub(3) / 10 };
        let gray_level = 8 + 10 * gray_index;
        let gray = Color::rgb(gray_level, gray_level, gray_level);

        if self.distance(&gray) < self.distance(&cube) {
            232 + gray_index
        } else {
            16 + 36 * ri + 6 * gi + bi
        }
    }

    fn distance(&self, other: &Color) -> u32 {
        let d = |a: u8, b: u8| (a as i32 - b as i32).pow(2) as u32;
        d(self.r, other.r) + d(self.g, other.g) + d(self.b, other.b)
    }
}

unsafe impl bytemuck::Pod for Color {}
unsafe impl bytemuck::Zeroable for Color {}
