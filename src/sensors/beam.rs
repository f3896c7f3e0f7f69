//! IR beam-break sensors: the pellet well and the two nose pokes.
//!
//! Each beam is an active-low digital input with a pull-up; a broken
//! beam reads LOW.  The edge interrupts live in [`crate::events`]; this
//! driver is the live level read the control loop trusts.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads real GPIO levels via hw_init helpers.
//! On host/test: reads the simulated pin table (idle HIGH).

use crate::drivers::hw_init;

pub struct BeamSensor {
    gpio: i32,
    last_broken: bool,
}

impl BeamSensor {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            last_broken: false,
        }
    }

    /// Read the pin now.  `true` = beam broken.
    pub fn read(&mut self) -> bool {
        self.last_broken = !hw_init::gpio_read(self.gpio);
        self.last_broken
    }

    /// Result of the most recent [`read`](Self::read).
    pub fn last(&self) -> bool {
        self.last_broken
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }
}
