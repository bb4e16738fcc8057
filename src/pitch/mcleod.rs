use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/*
McLeod Pitch Method (MPM)
=========================

MPM is an autocorrelation-family period estimator. It finds how far the
signal has to be shifted before it lines up with itself again; that shift
(the lag, τ) is one period, and frequency = sample_rate / τ.

Vocabulary
----------

  lag (τ)       Shift in samples between the window and a copy of itself.

  ACF r(τ)      Autocorrelation: Σ x[j]·x[j+τ]. Large when the shifted copy
                lines up with the original.

  m(τ)          Σ (x[j]² + x[j+τ]²) over the overlapping part. The largest
                value r can reach for that overlap, used to normalise.

  NSDF n(τ)     Normalised square difference function, 2·r(τ)/m(τ).
                Ranges over [-1, 1]; 1 means a perfect repeat.

  clarity       NSDF value at the chosen peak. How periodic (tonal) the
                window is: a sung vowel sits around 0.9, breath noise well
                below 0.5.


Computing r(τ) with an FFT
--------------------------

Direct autocorrelation is O(N²). Zero-padding to 2N, taking the power
spectrum and transforming back gives all lags in O(N log N):

    X = FFT(x padded to 2N)
    r = IFFT(|X|²) / 2N

The padding keeps the circular correlation from wrapping around.


Peak Picking
------------

    n(τ)
     1 ┤╲                 ╱╲                ╱╲
       │ ╲      key max  ╱  ╲    key max   ╱  ╲
     0 ┼──╲────────────╱────╲────────────╱────╲───→ τ
       │   ╲    ╱╲    ╱      ╲    ╱╲    ╱
    -1 ┤    ╲__╱  ╲__╱        ╲__╱  ╲__╱

The lobe around τ=0 is skipped. For every positive region between a
rising and a falling zero crossing, its maximum is a "key maximum". The
first key maximum within K (0.9) of the highest one wins. Taking the
*first* rather than the highest avoids picking a multiple of the period,
which would report the pitch an octave (or more) too low.

A parabola through the winning sample and its neighbours refines τ to a
fractional lag.
*/

/// Fraction of the highest key maximum the chosen peak must reach.
const PEAK_THRESHOLD_K: f32 = 0.9;

/// One period estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodEstimate {
    pub frequency: f32,
    pub clarity: f32,
}

/// MPM detector with pre-planned FFTs and reusable scratch buffers.
pub struct McLeod {
    size: usize,
    sample_rate: f32,
    min_lag: usize,
    max_lag: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    spectrum: Vec<Complex<f32>>,
    nsdf: Vec<f32>,
    key_maxima: Vec<(usize, f32)>,
}

impl McLeod {
    /// Create a detector for windows of `size` samples, searching
    /// frequencies between `min_freq` and `max_freq`.
    pub fn new(size: usize, sample_rate: f32, min_freq: f32, max_freq: f32) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size * 2);
        let inverse = planner.plan_fft_inverse(size * 2);

        let min_lag = ((sample_rate / max_freq).floor() as usize).max(2);
        let max_lag = ((sample_rate / min_freq).ceil() as usize).min(size.saturating_sub(2));

        Self {
            size,
            sample_rate,
            min_lag,
            max_lag,
            forward,
            inverse,
            spectrum: vec![Complex::new(0.0, 0.0); size * 2],
            nsdf: vec![0.0; size],
            key_maxima: Vec::with_capacity(64),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Estimate the period of `window`. `None` when no periodic peak exists.
    pub fn estimate(&mut self, window: &[f32]) -> Option<PeriodEstimate> {
        debug_assert_eq!(window.len(), self.size);

        self.normalized_square_difference(window);
        self.collect_key_maxima();

        let highest = self
            .key_maxima
            .iter()
            .map(|&(_, v)| v)
            .fold(f32::MIN, f32::max);
        if highest <= 0.0 {
            return None;
        }

        let threshold = highest * PEAK_THRESHOLD_K;
        let &(tau, _) = self.key_maxima.iter().find(|&&(_, v)| v >= threshold)?;

        let (lag, clarity) = self.refine_peak(tau);
        if lag <= 0.0 {
            return None;
        }

        Some(PeriodEstimate {
            frequency: self.sample_rate / lag,
            clarity: clarity.clamp(0.0, 1.0),
        })
    }

    fn normalized_square_difference(&mut self, window: &[f32]) {
        let n = self.size;

        for (slot, &x) in self.spectrum.iter_mut().zip(window.iter()) {
            *slot = Complex::new(x, 0.0);
        }
        for slot in self.spectrum[n..].iter_mut() {
            *slot = Complex::new(0.0, 0.0);
        }

        self.forward.process(&mut self.spectrum);
        for bin in self.spectrum.iter_mut() {
            *bin = Complex::new(bin.norm_sqr(), 0.0);
        }
        self.inverse.process(&mut self.spectrum);

        // rustfft does not normalise; scale by 1 / 2N
        let scale = 1.0 / (2 * n) as f32;

        let mut m: f32 = 2.0 * window.iter().map(|&x| x * x).sum::<f32>();
        for tau in 0..n {
            let r = self.spectrum[tau].re * scale;
            self.nsdf[tau] = if m > f32::EPSILON { 2.0 * r / m } else { 0.0 };

            // Shrink the overlap for the next lag
            let head = window[tau];
            let tail = window[n - 1 - tau];
            m -= head * head + tail * tail;
        }
    }

    fn collect_key_maxima(&mut self) {
        self.key_maxima.clear();

        let limit = (self.max_lag + 1).min(self.nsdf.len().saturating_sub(1));

        // Skip the lobe around zero lag
        let mut tau = 1;
        while tau < limit && self.nsdf[tau] > 0.0 {
            tau += 1;
        }

        let mut current: Option<(usize, f32)> = None;
        while tau < limit {
            let v = self.nsdf[tau];
            let prev = self.nsdf[tau - 1];

            if prev <= 0.0 && v > 0.0 {
                current = Some((tau, v));
            } else if prev > 0.0 && v <= 0.0 {
                if let Some(peak) = current.take() {
                    self.push_key_maximum(peak);
                }
            } else if v > 0.0 {
                if let Some((_, best)) = current {
                    if v > best {
                        current = Some((tau, v));
                    }
                }
            }
            tau += 1;
        }

        // A region still open at the search limit counts too
        if let Some(peak) = current {
            self.push_key_maximum(peak);
        }
    }

    fn push_key_maximum(&mut self, (tau, value): (usize, f32)) {
        if tau >= self.min_lag && tau <= self.max_lag {
            self.key_maxima.push((tau, value));
        }
    }

    /// Parabolic interpolation around `tau`: (fractional lag, peak value).
    fn refine_peak(&self, tau: usize) -> (f32, f32) {
        if tau == 0 || tau + 1 >= self.nsdf.len() {
            return (tau as f32, self.nsdf[tau]);
        }
        let a = self.nsdf[tau - 1];
        let b = self.nsdf[tau];
        let c = self.nsdf[tau + 1];
        let denom = a - 2.0 * b + c;
        if denom.abs() < f32::EPSILON {
            return (tau as f32, b);
        }
        let shift = 0.5 * (a - c) / denom;
        (tau as f32 + shift, b - 0.25 * (a - c) * shift)
    }
}
