/// Source of raw analog readings from the battery voltage pin.
pub trait Adc {
    fn read_raw(&mut self) -> u16;
}

/// Calibration offset added after the divider math; determined empirically
/// per board.
#[derive(Debug, Clone, Copy)]
pub struct VoltCalibration(pub f64);

impl Default for VoltCalibration {
    fn default() -> Self {
        Self(0.382)
    }
}

/// One point-in-time battery reading derived from a raw ADC value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReading {
    pub raw: u16,
    pub volts: f64,
    pub batt_percent: i64,
}

// The ADC maps 0..=1024 onto 0..3.3 V, and the pin sits behind a divider of
// two 100k resistors, so the pack voltage is twice the pin voltage.
const ADC_FULL_SCALE: f64 = 1024.0;
const ADC_REFERENCE_VOLTS: f64 = 3.3;
const DIVIDER_RATIO: f64 = 2.0;
const BATT_EMPTY_VOLTS: f64 = 2.5;
const BATT_FULL_VOLTS: f64 = 4.2;

pub fn derive_reading(raw: u16, calibration: VoltCalibration) -> PowerReading {
    if raw == 0 {
        return PowerReading {
            raw,
            volts: 0.0,
            batt_percent: 0,
        };
    }
    let volts = f64::from(raw) * (ADC_REFERENCE_VOLTS / ADC_FULL_SCALE) * DIVIDER_RATIO
        + calibration.0;
    let batt_percent =
        ((volts - BATT_EMPTY_VOLTS) * 100.0 / (BATT_FULL_VOLTS - BATT_EMPTY_VOLTS)) as i64;
    PowerReading {
        raw,
        volts,
        batt_percent,
    }
}
