//! Bounded random noise

use rand::Rng;
use std::cell::RefCell;

// Thread-local RNG
thread_local! {
    static RNG: RefCell<rand::rngs::ThreadRng> = RefCell::new(rand::rng());
}

/// Random XOR mask in `0..=max`
fn xor_mask(max: u8) -> u8 {
    RNG.with(|rng| rng.borrow_mut().random_range(0..=max))
}

/// `(r - 0.5) * amplitude` for uniform `r` in `[0, 1)`
pub fn jitter(amplitude: f32) -> f32 {
    RNG.with(|rng| (rng.borrow_mut().random::<f32>() - 0.5) * amplitude)
}

/// XOR each red, green and blue byte of an RGBA buffer with a mask up to `max`
///
/// Only the low bits flip, so no channel moves by more than `max`; alpha is
/// never touched.
#[inline]
pub fn perturb_pixels(pixels: &mut [u8], max: u8) {
    for px in pixels.chunks_exact_mut(4) {
        for channel in &mut px[..3] {
            *channel ^= xor_mask(max);
        }
    }
}

/// Add `jitter(amplitude)` to every sample
#[inline]
pub fn jitter_samples(samples: &mut [f32], amplitude: f32) {
    for s in samples {
        *s += jitter(amplitude);
    }
}
