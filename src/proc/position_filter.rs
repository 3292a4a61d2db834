// PositionFilter - FIR smoother for band-power samples
//
// A true filter in the sense that it outputs a value for every input sample.
// Smooths the (x, y) values coming out of BandFilter with a 6-tap symmetric
// linear-phase lowpass, 0.5 Hz cutoff at a 4 Hz power-sample rate, designed
// with firpm in Matlab (remez in Octave): f = 4, cutoff = 0.5, order = 5,
// transition = +/- 0.05.

use crate::position::Position;

const KERNEL: [f64; 6] = [0.150793, 0.258509, 0.224878, 0.224878, 0.258509, 0.150793];

/// Stateful two-channel FIR smoother. One instance per signal stream; the
/// delay lines carry history across calls.
#[derive(Debug, Clone)]
pub struct PositionFilter {
    inputs_x: [f32; KERNEL.len()],
    inputs_y: [f32; KERNEL.len()],
}

impl PositionFilter {
    pub fn new() -> Self {
        Self {
            inputs_x: [0.0; KERNEL.len()],
            inputs_y: [0.0; KERNEL.len()],
        }
    }

    /// Run one (x, y) power sample through the filter and return the smoothed
    /// position.
    pub fn filter(&mut self, x: f32, y: f32) -> Position {
        let n = KERNEL.len();
        for i in 1..n {
            self.inputs_x[i - 1] = self.inputs_x[i];
            self.inputs_y[i - 1] = self.inputs_y[i];
        }
        self.inputs_x[n - 1] = x;
        self.inputs_y[n - 1] = y;

        let mut output = Position::zero();
        for i in 0..n {
            output.translate(
                (KERNEL[i] * self.inputs_x[n - 1 - i] as f64) as f32,
                (KERNEL[i] * self.inputs_y[n - 1 - i] as f64) as f32,
            );
        }

        output
    }

    /// Zero the delay lines.
    pub fn reset(&mut self) {
        self.inputs_x = [0.0; KERNEL.len()];
        self.inputs_y = [0.0; KERNEL.len()];
    }
}

impl Default for PositionFilter {
    fn default() -> Self {
        Self::new()
    }
}
