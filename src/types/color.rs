//! HSBK color representation used by LIFX devices.

use serde::{Deserialize, Serialize};

/// Default color temperature applied when a preset does not specify one.
pub const DEFAULT_KELVIN: u16 = 3500;

/// A hue/saturation/brightness/kelvin color.
///
/// All channels are full-scale `u16` values as sent on the wire. Hue wraps
/// around the color wheel; kelvin only matters at low saturation.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Hsbk {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: u16,
}

impl Hsbk {
    pub const fn new(hue: u16, saturation: u16, brightness: u16, kelvin: u16) -> Self {
        Self {
            hue,
            saturation,
            brightness,
            kelvin,
        }
    }

    /// Rotate the hue by the given number of degrees, wrapping around the
    /// color wheel. Saturation, brightness, and kelvin are unchanged.
    pub fn offset_hue(self, degrees: i32) -> Self {
        let scale = u16::MAX as i64 + 1;
        let offset = degrees as i64 * scale / 360;
        let hue = (self.hue as i64 + offset).rem_euclid(scale) as u16;
        Self { hue, ..self }
    }
}

/// Named preset colors.
pub mod colors {
    use super::{DEFAULT_KELVIN, Hsbk};

    pub const DEFAULT: Hsbk = Hsbk::new(43520, 0, 39321, DEFAULT_KELVIN);
    pub const RED: Hsbk = Hsbk::new(65535, 65535, 65535, 3500);
    pub const ORANGE: Hsbk = Hsbk::new(6500, 65535, 65535, 3500);
    pub const YELLOW: Hsbk = Hsbk::new(9000, 65535, 65535, 3500);
    pub const GREEN: Hsbk = Hsbk::new(16173, 65535, 65535, 3500);
    pub const CYAN: Hsbk = Hsbk::new(29814, 65535, 65535, 3500);
    pub const BLUE: Hsbk = Hsbk::new(43634, 65535, 65535, 3500);
    pub const PURPLE: Hsbk = Hsbk::new(50486, 65535, 65535, 3500);
    pub const PINK: Hsbk = Hsbk::new(58275, 65535, 47142, 3500);
    pub const WHITE: Hsbk = Hsbk::new(58275, 0, 65535, 5500);
    pub const COLD_WHITE: Hsbk = Hsbk::new(58275, 0, 65535, 9000);
    pub const WARM_WHITE: Hsbk = Hsbk::new(58275, 0, 65535, DEFAULT_KELVIN);
    pub const GOLD: Hsbk = Hsbk::new(58275, 0, 65535, 2500);

    pub const RAINBOW: [Hsbk; 8] = [RED, ORANGE, YELLOW, GREEN, CYAN, BLUE, PURPLE, PINK];

    /// Look up a preset by name, case-insensitively.
    pub fn by_name(name: &str) -> Option<Hsbk> {
        let preset = match name.to_ascii_uppercase().as_str() {
            "DEFAULT" => DEFAULT,
            "RED" => RED,
            "ORANGE" => ORANGE,
            "YELLOW" => YELLOW,
            "GREEN" => GREEN,
            "CYAN" => CYAN,
            "BLUE" => BLUE,
            "PURPLE" => PURPLE,
            "PINK" => PINK,
            "WHITE" => WHITE,
            "COLD_WHITE" => COLD_WHITE,
            "WARM_WHITE" => WARM_WHITE,
            "GOLD" => GOLD,
            _ => return None,
        };
        Some(preset)
    }
}

/// A color paired with a power state, applied together by
/// [`Light::set_color_power`](crate::Light::set_color_power).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ColorPower {
    /// Color to apply, if any. `None` changes power alone.
    pub color: Option<Hsbk>,
    pub power: super::PowerLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_hue_wraps() {
        let c = colors::RED; // hue 65535
        let shifted = c.offset_hue(360);
        assert_eq!(shifted.hue, c.hue);

        let quarter = Hsbk::new(0, 65535, 65535, 3500).offset_hue(90);
        assert_eq!(quarter.hue, 16384);

        let negative = Hsbk::new(0, 65535, 65535, 3500).offset_hue(-90);
        assert_eq!(negative.hue as u32, 65536 - 16384);
    }

    #[test]
    fn test_offset_hue_preserves_other_channels() {
        let c = colors::PINK.offset_hue(30);
        assert_eq!(c.saturation, colors::PINK.saturation);
        assert_eq!(c.brightness, colors::PINK.brightness);
        assert_eq!(c.kelvin, colors::PINK.kelvin);
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(colors::by_name("warm_white"), Some(colors::WARM_WHITE));
        assert_eq!(colors::by_name("RED"), Some(colors::RED));
        assert_eq!(colors::by_name("mauve"), None);
    }
}
