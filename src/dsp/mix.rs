//! Summing bus.

/*
Summing
=======

A node with several inputs hears their sum. Any number of generators can be
connected into the same sink (the master gain, a filter, the destination)
and the renderer adds their outputs sample by sample:

    Pop voice 1:  [ 0.4,  0.1, -0.3]
    Pop voice 2:  [ 0.5,  0.6, -0.2]
    Bus:          [ 0.9,  0.7, -0.5]

Sums are not normalized, so many loud inputs can exceed ±1.0. The pitched
pop generator puts a compressor after its voice bus for exactly this case,
and the output device clamps whatever is left.
*/

/// Add signal B into signal A in-place.
///
/// ⚠️ WARNING: Can exceed [-1.0, +1.0] range!
#[inline]
pub fn sum_in_place(a: &mut [f32], b: &[f32]) {
    debug_assert_eq!(a.len(), b.len());

    for (sa, &sb) in a.iter_mut().zip(b.iter()) {
        *sa += sb;
    }
}

/// Clamp a bus to the range an output device accepts.
#[inline]
pub fn clamp_in_place(signal: &mut [f32]) {
    for sample in signal.iter_mut() {
        *sample = sample.clamp(-1.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_can_exceed_one() {
        let mut a = [1.0, 0.5];
        let b = [1.0, 0.8];

        sum_in_place(&mut a, &b);

        assert_eq!(a[0], 2.0);
        assert_eq!(a[1], 1.3);
    }

    #[test]
    fn test_clamp_limits_bus() {
        let mut bus = [2.0, -1.5, 0.25];
        clamp_in_place(&mut bus);
        assert_eq!(bus, [1.0, -1.0, 0.25]);
    }
}
