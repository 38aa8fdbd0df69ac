use crate::types::DMX_MAX;

/// Linearly remap `value` from `[in_low, in_high]` to `[out_low, out_high]`
/// without clamping, mirroring the classic `map` helper.
pub fn value_map(value: f64, in_low: f64, in_high: f64, out_low: f64, out_high: f64) -> f64 {
    if in_high == in_low {
        return out_low;
    }
    (value - in_low) / (in_high - in_low) * (out_high - out_low) + out_low
}

pub fn constrain(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Collapse a mixed channel value onto the transport's `0..=255` slot range.
pub fn clamp_dmx(value: f64) -> u8 {
    constrain(value.round(), 0.0, DMX_MAX) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_map() {
        assert_eq!(value_map(0.5, 0.0, 1.0, 0.0, 255.0), 127.5);
        assert_eq!(value_map(2.0, 0.0, 1.0, 0.0, 100.0), 200.0);
        assert_eq!(value_map(-1.0, 0.0, 1.0, 0.0, 100.0), -100.0);
        // Degenerate input span maps everything to the low output edge.
        assert_eq!(value_map(7.0, 3.0, 3.0, 0.0, 100.0), 0.0);
    }

    #[test]
    fn test_constrain() {
        assert_eq!(constrain(5.0, 0.0, 10.0), 5.0);
        assert_eq!(constrain(-5.0, 0.0, 10.0), 0.0);
        assert_eq!(constrain(15.0, 0.0, 10.0), 10.0);
    }

    #[test]
    fn test_clamp_dmx() {
        assert_eq!(clamp_dmx(-20.0), 0);
        assert_eq!(clamp_dmx(0.0), 0);
        assert_eq!(clamp_dmx(127.4), 127);
        assert_eq!(clamp_dmx(127.5), 128);
        assert_eq!(clamp_dmx(255.0), 255);
        assert_eq!(clamp_dmx(300.0), 255);
        assert_eq!(clamp_dmx(f64::NAN), 0);
        // Idempotent: re-clamping a clamped value changes nothing.
        for v in [-20.0, 0.0, 127.4, 300.0] {
            assert_eq!(clamp_dmx(clamp_dmx(v) as f64), clamp_dmx(v));
        }
    }
}
