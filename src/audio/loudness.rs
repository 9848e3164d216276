//! Integrated loudness measurement (ITU-R BS.1770).
//!
//! K-weighting is a +4 dB high shelf at 1500 Hz followed by a 38 Hz
//! high-pass. Mean-square energy is taken over 400 ms blocks with 75%
//! overlap, then gated absolutely at -70 LUFS and relatively at -10 LU.

use crate::types::Waveform;

const BLOCK_SEC: f64 = 0.4;
const OVERLAP: f64 = 0.75;
const ABSOLUTE_GATE: f64 = -70.0;
const RELATIVE_GATE: f64 = -10.0;
const CHANNEL_WEIGHTS: [f64; 5] = [1.0, 1.0, 1.0, 1.41, 1.41];

/// Normalized biquad coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy)]
struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
}

impl Biquad {
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b: [b0 / a0, b1 / a0, b2 / a0],
            a: [a1 / a0, a2 / a0],
        }
    }

    fn treble(sample_rate: f64, gain_db: f64, center_hz: f64, q: f64) -> Self {
        let w0 = 2.0 * std::f64::consts::PI * center_hz / sample_rate;
        let a = (gain_db / 40.0 * std::f64::consts::LN_10).exp();
        let alpha = w0.sin() / 2.0 / q;
        let cos = w0.cos();

        let temp1 = 2.0 * a.sqrt() * alpha;
        let temp2 = (a - 1.0) * cos;
        let temp3 = (a + 1.0) * cos;

        Self::normalized(
            a * ((a + 1.0) + temp2 + temp1),
            -2.0 * a * ((a - 1.0) + temp3),
            a * ((a + 1.0) + temp2 - temp1),
            (a + 1.0) - temp2 + temp1,
            2.0 * ((a - 1.0) - temp3),
            (a + 1.0) - temp2 - temp1,
        )
    }

    fn highpass(sample_rate: f64, cutoff_hz: f64, q: f64) -> Self {
        let w0 = 2.0 * std::f64::consts::PI * cutoff_hz / sample_rate;
        let alpha = w0.sin() / 2.0 / q;
        let cos = w0.cos();

        Self::normalized(
            (1.0 + cos) / 2.0,
            -1.0 - cos,
            (1.0 + cos) / 2.0,
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
        )
    }

    /// Direct form I filtering; the output is clamped to [-1, 1].
    fn apply(&self, input: &[f64]) -> Vec<f64> {
        let mut out = Vec::with_capacity(input.len());
        let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
        for &x in input {
            let y = self.b[0] * x + self.b[1] * x1 + self.b[2] * x2 - self.a[0] * y1 - self.a[1] * y2;
            x2 = x1;
            x1 = x;
            y2 = y1;
            y1 = y;
            out.push(y);
        }
        for y in &mut out {
            *y = y.clamp(-1.0, 1.0);
        }
        out
    }
}

fn block_loudness(weighted_energy: f64) -> f64 {
    -0.691 + 10.0 * weighted_energy.log10()
}

/// Measures integrated loudness in LUFS.
///
/// Returns None when the signal is shorter than one 400 ms block or when
/// every block falls below the gates.
pub fn integrated_loudness(wav: &Waveform) -> Option<f64> {
    let sample_rate = f64::from(wav.sample_rate());
    let block = (BLOCK_SEC * sample_rate) as usize;
    let stride = (block as f64 * (1.0 - OVERLAP)) as usize;
    if block == 0 || stride == 0 || wav.num_frames() < block {
        return None;
    }
    let num_blocks = (wav.num_frames() - block) / stride + 1;

    let shelf = Biquad::treble(sample_rate, 4.0, 1500.0, std::f64::consts::FRAC_1_SQRT_2);
    let highpass = Biquad::highpass(sample_rate, 38.0, 0.5);

    // energy[c][j]: mean square of channel c over block j
    let energy: Vec<Vec<f64>> = wav
        .channels()
        .iter()
        .map(|channel| {
            let samples: Vec<f64> = channel.iter().map(|&s| f64::from(s)).collect();
            let filtered = highpass.apply(&shelf.apply(&samples));
            (0..num_blocks)
                .map(|j| {
                    let start = j * stride;
                    filtered[start..start + block].iter().map(|s| s * s).sum::<f64>()
                        / block as f64
                })
                .collect()
        })
        .collect();

    let weight = |c: usize| CHANNEL_WEIGHTS.get(c).copied().unwrap_or(1.0);

    let loudness: Vec<f64> = (0..num_blocks)
        .map(|j| {
            let weighted: f64 = energy.iter().enumerate().map(|(c, e)| weight(c) * e[j]).sum();
            block_loudness(weighted)
        })
        .collect();

    let gated_energy = |gate: &dyn Fn(usize) -> bool| -> Option<f64> {
        let kept: Vec<usize> = (0..num_blocks).filter(|&j| gate(j)).collect();
        if kept.is_empty() {
            return None;
        }
        let weighted = energy
            .iter()
            .enumerate()
            .map(|(c, e)| weight(c) * kept.iter().map(|&j| e[j]).sum::<f64>() / kept.len() as f64)
            .sum();
        Some(weighted)
    };

    let above_absolute = |j: usize| loudness[j] > ABSOLUTE_GATE;
    let relative_gate = block_loudness(gated_energy(&above_absolute)?) + RELATIVE_GATE;
    let above_both = |j: usize| above_absolute(j) && loudness[j] > relative_gate;

    let lufs = block_loudness(gated_energy(&above_both)?);
    lufs.is_finite().then_some(lufs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, amplitude: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|t| {
                amplitude
                    * (2.0 * std::f32::consts::PI * freq * t as f32 / sample_rate as f32).sin()
            })
            .collect()
    }

    #[test]
    fn quarter_amplitude_997hz_sine() {
        // A 0 dBFS 997 Hz sine in one channel reads -3.01 LKFS; -12 dBFS reads -15.05
        let wav = Waveform::mono(sine(997.0, 0.25, 48000, 3.0), 48000);
        let lufs = integrated_loudness(&wav).unwrap();
        assert!((lufs + 15.05).abs() < 0.5, "got {lufs}");
    }

    #[test]
    fn half_amplitude_is_6db_quieter() {
        let wav = Waveform::mono(sine(997.0, 0.5, 32000, 3.0), 32000);
        let lufs = integrated_loudness(&wav).unwrap();
        assert!((lufs + 9.03).abs() < 0.5, "got {lufs}");
    }

    #[test]
    fn stereo_sums_channel_energy() {
        let mono = Waveform::mono(sine(997.0, 0.5, 32000, 2.0), 32000);
        let both = sine(997.0, 0.5, 32000, 2.0);
        let stereo = Waveform::new(vec![both.clone(), both], 32000);
        let diff = integrated_loudness(&stereo).unwrap() - integrated_loudness(&mono).unwrap();
        assert!((diff - 3.01).abs() < 0.1, "got {diff}");
    }

    #[test]
    fn silence_is_gated_out() {
        let wav = Waveform::mono(vec![0.0; 32000], 32000);
        assert!(integrated_loudness(&wav).is_none());
    }

    #[test]
    fn shorter_than_one_block() {
        let wav = Waveform::mono(sine(997.0, 0.5, 32000, 0.2), 32000);
        assert!(integrated_loudness(&wav).is_none());
    }
}
