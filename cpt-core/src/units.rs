/// Offset between the Kelvin and Celsius scales.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Convert a raw gateway temperature (Kelvin) to degrees Celsius.
pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}
