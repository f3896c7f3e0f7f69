//! Sensor subsystem: beam-break inputs, battery gauge, and the
//! aggregating [`SensorHub`].

pub mod battery;
pub mod beam;

use battery::BatterySensor;
use beam::BeamSensor;

use crate::pins;
use crate::schedule::Side;

/// Owns every sensor driver.  Reads are live; nothing is cached between
/// calls except the battery average.
pub struct SensorHub {
    pub pellet_well: BeamSensor,
    pub left_poke: BeamSensor,
    pub right_poke: BeamSensor,
    pub battery: BatterySensor,
}

impl SensorHub {
    pub fn new() -> Self {
        Self {
            pellet_well: BeamSensor::new(pins::PELLET_WELL_GPIO),
            left_poke: BeamSensor::new(pins::LEFT_POKE_GPIO),
            right_poke: BeamSensor::new(pins::RIGHT_POKE_GPIO),
            battery: BatterySensor::new(),
        }
    }

    pub fn pellet_present(&mut self) -> bool {
        self.pellet_well.read()
    }

    pub fn poke(&mut self, side: Side) -> bool {
        match side {
            Side::Left => self.left_poke.read(),
            Side::Right => self.right_poke.read(),
        }
    }

    pub fn battery_volts(&mut self) -> f32 {
        self.battery.read()
    }
}

impl Default for SensorHub {
    fn default() -> Self {
        Self::new()
    }
}
