//! Level measurement helpers.

use super::amplify::apply_gain;

/// Root-mean-square energy of a window.
#[inline]
pub fn rms(buffer: &[f32]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    (buffer.iter().map(|&x| x * x).sum::<f32>() / buffer.len() as f32).sqrt()
}

/// Largest absolute sample value.
#[inline]
pub fn peak(buffer: &[f32]) -> f32 {
    buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
}

/// Rescale in place so the peak sits at 1.0.
///
/// Returns the peak found. Buffers already within full scale are untouched.
pub fn normalize_peak(buffer: &mut [f32]) -> f32 {
    let p = peak(buffer);
    if p > 1.0 {
        apply_gain(buffer, 1.0 / p);
    }
    p
}

/// Average interleaved frames down to mono.
pub fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    out.clear();
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}
