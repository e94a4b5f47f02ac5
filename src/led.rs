//! The single RGB pixel the tester drives.
//!
//! The controller only ever calls [`LedDriver::set_color`]; bringing the
//! pixel up and choosing its brightness happens once at startup.

use std::fmt;

pub const DEFAULT_BRIGHTNESS: u8 = 255 / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Off,
    Green,
    Red,
}

impl LedColor {
    /// Full-intensity channel values, before brightness scaling.
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            LedColor::Off => (0, 0, 0),
            LedColor::Green => (0, 255, 0),
            LedColor::Red => (255, 0, 0),
        }
    }
}

impl fmt::Display for LedColor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            LedColor::Off => "off",
            LedColor::Green => "green",
            LedColor::Red => "red",
        };
        write!(f, "{}", name)
    }
}

pub trait LedDriver: Send {
    fn init(&mut self);

    fn is_initialized(&self) -> bool;

    fn set_brightness(&mut self, brightness: u8);

    fn set_color(&mut self, color: LedColor);
}

/// Host stand-in for the pixel: keeps the last applied state and reports
/// every change on the log.
#[derive(Debug, Default)]
pub struct ConsolePixel {
    initialized: bool,
    brightness: u8,
    color: Option<LedColor>,
}

impl ConsolePixel {
    pub fn new() -> Self {
        ConsolePixel::default()
    }

    pub fn color(&self) -> LedColor {
        self.color.unwrap_or(LedColor::Off)
    }

    /// Channel values as they would be latched into the pixel.
    pub fn output(&self) -> (u8, u8, u8) {
        let (r, g, b) = self.color().rgb();
        let scale = |c: u8| ((c as u16 * self.brightness as u16) / 255) as u8;
        (scale(r), scale(g), scale(b))
    }
}

impl LedDriver for ConsolePixel {
    fn init(&mut self) {
        self.initialized = true;
        self.brightness = DEFAULT_BRIGHTNESS;
        self.color = Some(LedColor::Off);
        log::debug!("Pixel initialized");
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
        log::debug!("Pixel brightness {brightness}");
    }

    fn set_color(&mut self, color: LedColor) {
        self.color = Some(color);
        let (r, g, b) = self.output();
        log::debug!("Pixel {color} rgb({r}, {g}, {b})");
    }
}
