use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// All litre and rate arithmetic in the balance pass uses this type so that
/// every host computes identical results regardless of platform.
pub type Fixed64 = I32F32;

/// Host frames are the atomic unit of scheduling time.
pub type Frames = u64;

/// Convert an f64 to Fixed64. Use only at init/display boundaries, never in
/// the balance pass.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only at init/display boundaries.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Litres a node can move over `dt` seconds at `rate` litres per second.
#[inline]
pub fn quantity_over(rate: Fixed64, dt: Fixed64) -> Fixed64 {
    rate * dt
}

/// Clamp a quantity at zero. Spare-output math can go negative when a
/// producer is oversubscribed by the host's own distributor.
#[inline]
pub fn non_negative(v: Fixed64) -> Fixed64 {
    if v < Fixed64::from_num(0) {
        Fixed64::from_num(0)
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed64_basic_arithmetic() {
        let a = f64_to_fixed64(1.5);
        let b = f64_to_fixed64(2.0);
        assert_eq!(fixed64_to_f64(a + b), 3.5);
    }

    #[test]
    fn quantity_over_scales_by_dt() {
        let rate = f64_to_fixed64(4.0);
        let dt = f64_to_fixed64(0.5);
        assert_eq!(fixed64_to_f64(quantity_over(rate, dt)), 2.0);
    }

    #[test]
    fn non_negative_clamps() {
        assert_eq!(non_negative(f64_to_fixed64(-3.0)), f64_to_fixed64(0.0));
        assert_eq!(non_negative(f64_to_fixed64(3.0)), f64_to_fixed64(3.0));
    }

    #[test]
    fn fixed64_determinism() {
        let a = f64_to_fixed64(1.0 / 3.0);
        let b = f64_to_fixed64(1.0 / 3.0);
        assert_eq!(a, b);
        assert_eq!(a * f64_to_fixed64(3.0), b * f64_to_fixed64(3.0));
    }

    #[test]
    fn frames_type() {
        let f: Frames = 60;
        assert_eq!(f, 60u64);
    }
}
