//! Blue-green-red intensity colormap
//!
//! Each channel is piecewise linear with breakpoints at 0.25, 0.5 and 0.75:
//!
//! ```text
//! x:    0     0.25   0.5   0.75    1
//! r:    0      0      0    255    255
//! g:    0     255    255   255     0
//! b:   255    255     0     0      0
//! ```
//!
//! Channel values are truncated, not rounded. Input is clamped to [0, 1].

use serde::{Deserialize, Serialize};

/// 8-bit RGB colour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

fn level(val: f64) -> u8 {
    (255.0 * val) as u8
}

pub fn colormap_r(x: f64) -> u8 {
    let x = x.clamp(0.0, 1.0);
    let val = if x < 0.5 {
        0.0
    } else if x > 0.75 {
        1.0
    } else {
        4.0 * x - 2.0
    };
    level(val)
}

pub fn colormap_g(x: f64) -> u8 {
    let x = x.clamp(0.0, 1.0);
    let val = if x < 0.25 {
        4.0 * x
    } else if x > 0.75 {
        -4.0 * x + 4.0
    } else {
        1.0
    };
    level(val)
}

pub fn colormap_b(x: f64) -> u8 {
    let x = x.clamp(0.0, 1.0);
    let val = if x < 0.25 {
        1.0
    } else if x > 0.5 {
        0.0
    } else {
        -4.0 * x + 2.0
    };
    level(val)
}

/// Colour for an intensity in [0, 1]
pub fn colormap(x: f64) -> Rgb {
    Rgb {
        r: colormap_r(x),
        g: colormap_g(x),
        b: colormap_b(x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_breakpoints() {
        assert_eq!(colormap_g(0.25), 255);
        assert_eq!(colormap_r(0.5), 0);
        assert_eq!(colormap_b(0.75), 0);

        assert_eq!(colormap(0.0), Rgb { r: 0, g: 0, b: 255 });
        assert_eq!(colormap(0.5), Rgb { r: 0, g: 255, b: 0 });
        assert_eq!(colormap(0.75), Rgb { r: 255, g: 255, b: 0 });
        assert_eq!(colormap(1.0), Rgb { r: 255, g: 0, b: 0 });
    }

    #[test]
    fn test_truncates() {
        // 255 * 0.5 = 127.5
        assert_eq!(colormap_g(0.125), 127);
        assert_eq!(colormap_b(0.375), 127);
    }

    #[test]
    fn test_out_of_range_clamped() {
        assert_eq!(colormap(-3.0), colormap(0.0));
        assert_eq!(colormap(7.5), colormap(1.0));
        assert_eq!(colormap(f64::INFINITY), colormap(1.0));
    }

    proptest! {
        #[test]
        fn test_red_and_blue_never_overlap(x in 0.0f64..=1.0) {
            let c = colormap(x);
            prop_assert!(c.r == 0 || c.b == 0);
        }
    }
}
