//! Cold-to-hot colour scale for heatmap cells
//!
//! Five discrete bands rather than a continuous gradient so intensity tiers
//! stay distinguishable:
//!
//! | value        | colour                                   | alpha |
//! |--------------|------------------------------------------|-------|
//! | 0            | transparent                              | 0     |
//! | (0, 10)      | blue                                     | v/20  |
//! | [10, 30)     | blue shifting to cyan, G=(v-10)*8        | 0.5   |
//! | [30, 60)     | red up, green down                       | 0.6   |
//! | [60, 80)     | red fixed, green fades from 165          | 0.7   |
//! | >= 80        | solid red                                | 0.8   |

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba { r: 0, g: 0, b: 0, a: 0.0 };

    pub fn to_css(&self) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorBand {
    Transparent,
    Blue,
    Green,
    Amber,
    Orange,
    Red,
}

pub fn band_of(value: f64) -> ColorBand {
    // NaN lands here too
    if !(value > 0.0) {
        return ColorBand::Transparent;
    }
    match value {
        v if v < 10.0 => ColorBand::Blue,
        v if v < 30.0 => ColorBand::Green,
        v if v < 60.0 => ColorBand::Amber,
        v if v < 80.0 => ColorBand::Orange,
        _ => ColorBand::Red,
    }
}

fn channel(value: f64) -> u8 {
    value.floor().clamp(0.0, 255.0) as u8
}

pub fn color_of(value: f64) -> Rgba {
    match band_of(value) {
        ColorBand::Transparent => Rgba::TRANSPARENT,
        ColorBand::Blue => Rgba { r: 0, g: 0, b: 255, a: (value / 20.0) as f32 },
        ColorBand::Green => {
            let ramp = (value - 10.0) * 8.0;
            Rgba { r: 0, g: channel(ramp), b: channel(255.0 - ramp), a: 0.5 }
        }
        ColorBand::Amber => {
            let ramp = (value - 30.0) * 8.5;
            Rgba { r: channel(ramp), g: channel(255.0 - ramp), b: 0, a: 0.6 }
        }
        ColorBand::Orange => Rgba {
            r: 255,
            g: channel(165.0 - (value - 60.0) * 8.25),
            b: 0,
            a: 0.7,
        },
        ColorBand::Red => Rgba { r: 255, g: 0, b: 0, a: 0.8 },
    }
}
