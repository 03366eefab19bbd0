//! Butterworth band-pass design and zero-phase filtering.
//!
//! Filters are cascades of second-order sections in Direct Form II
//! Transposed. A band-pass of order N is an N-th order high-pass followed by
//! an N-th order low-pass, each designed with the bilinear transform and
//! frequency prewarping. Frequencies are normalized to Nyquist (0..1).

use std::f64::consts::PI;

/// One second-order section, `a0` normalized to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    fn lowpass(wn: f64, q: f64) -> Self {
        let w2 = wn * wn;
        let d = 1.0 + q * wn + w2;
        let g = w2 / d;
        Self {
            b0: g,
            b1: 2.0 * g,
            b2: g,
            a1: 2.0 * (w2 - 1.0) / d,
            a2: (1.0 - q * wn + w2) / d,
        }
    }

    fn highpass(wn: f64, q: f64) -> Self {
        let w2 = wn * wn;
        let d = 1.0 + q * wn + w2;
        Self {
            b0: 1.0 / d,
            b1: -2.0 / d,
            b2: 1.0 / d,
            a1: 2.0 * (w2 - 1.0) / d,
            a2: (1.0 - q * wn + w2) / d,
        }
    }

    fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }

    /// Gain at z = 1.
    pub fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < f64::EPSILON {
            return 0.0;
        }
        (self.b0 + self.b1 + self.b2) / den
    }

    /// Delay-line state of this section after settling on constant input `x`.
    fn steady_state(&self, x: f64) -> [f64; 2] {
        let y = self.dc_gain() * x;
        [y - self.b0 * x, self.b2 * x - self.a2 * y]
    }

    #[inline]
    fn tick(&self, x: f64, z: &mut [f64; 2]) -> f64 {
        let y = self.b0 * x + z[0];
        z[0] = self.b1 * x - self.a1 * y + z[1];
        z[1] = self.b2 * x - self.a2 * y;
        y
    }
}

/// A cascade of second-order sections.
#[derive(Debug, Clone, PartialEq)]
pub struct Sos {
    sections: Vec<Biquad>,
}

impl Sos {
    /// Butterworth band-pass between normalized edges `low` and `high`.
    ///
    /// `order` must be even and non-zero; returns `None` when the edges are
    /// out of order or out of range, or the coefficients are not finite.
    pub fn butter_bandpass(order: usize, low: f64, high: f64) -> Option<Self> {
        if order == 0 || order % 2 != 0 {
            return None;
        }
        if !(low > 0.0 && low < high && high < 1.0) {
            return None;
        }
        let wl = (PI * low / 2.0).tan();
        let wh = (PI * high / 2.0).tan();
        let mut sections = Vec::with_capacity(order);
        for k in 0..order / 2 {
            sections.push(Biquad::highpass(wl, pole_q(order, k)));
        }
        for k in 0..order / 2 {
            sections.push(Biquad::lowpass(wh, pole_q(order, k)));
        }
        if !sections.iter().all(Biquad::is_finite) {
            return None;
        }
        Some(Self { sections })
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Edge padding used by [`Sos::filtfilt`].
    pub fn padlen(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Per-section initial state for a signal that starts at `x0`.
    fn initial_state(&self, x0: f64) -> Vec<[f64; 2]> {
        let mut input = x0;
        self.sections
            .iter()
            .map(|s| {
                let z = s.steady_state(input);
                input *= s.dc_gain();
                z
            })
            .collect()
    }

    fn run_in_place(&self, data: &mut [f64]) {
        let Some(&first) = data.first() else {
            return;
        };
        let mut state = self.initial_state(first);
        for x in data.iter_mut() {
            let mut v = *x;
            for (s, z) in self.sections.iter().zip(state.iter_mut()) {
                v = s.tick(v, z);
            }
            *x = v;
        }
    }

    /// Forward-backward (zero-phase) filtering with odd-extension padding.
    ///
    /// Returns `None` when `x` is not longer than [`Sos::padlen`].
    pub fn filtfilt(&self, x: &[f64]) -> Option<Vec<f64>> {
        let pad = self.padlen();
        let n = x.len();
        if n <= pad {
            return None;
        }
        let first = x[0];
        let last = x[n - 1];
        let mut ext = Vec::with_capacity(n + 2 * pad);
        ext.extend((1..=pad).rev().map(|k| 2.0 * first - x[k]));
        ext.extend_from_slice(x);
        ext.extend((1..=pad).map(|k| 2.0 * last - x[n - 1 - k]));

        self.run_in_place(&mut ext);
        ext.reverse();
        self.run_in_place(&mut ext);
        ext.reverse();

        Some(ext[pad..pad + n].to_vec())
    }
}

/// Damping of the k-th conjugate pole pair of an order-N Butterworth prototype.
fn pole_q(order: usize, k: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let theta = PI * (2 * k + 1) as f64 / (2 * order) as f64;
    2.0 * theta.sin()
}

/// Centered box average with output length equal to the input length.
///
/// Samples beyond the edges count as zero. Inputs shorter than `window` are
/// returned unchanged.
pub fn moving_average_same(x: &[f64], window: usize) -> Vec<f64> {
    let n = x.len();
    if window == 0 || n < window {
        return x.to_vec();
    }
    #[allow(clippy::cast_precision_loss)]
    let w = window as f64;
    let lead = (window - 1) / 2;
    (0..n)
        .map(|i| {
            let hi = (i + lead).min(n - 1);
            let lo = (i + lead + 1).saturating_sub(window);
            x[lo..=hi].iter().sum::<f64>() / w
        })
        .collect()
}
