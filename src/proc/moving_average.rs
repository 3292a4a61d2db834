// MovingAverageFilter - scalar smoothing, updated point by point
//
// The interchangeable simpler alternative to PositionFilter, used where only
// a single combined effort scalar is needed downstream. The window length
// determines the number of past inputs averaged into each output.

/// Simple moving average over the last `m` inputs.
#[derive(Debug, Clone)]
pub struct MovingAverageFilter {
    inputs: Vec<f32>,
}

impl MovingAverageFilter {
    /// Create a filter averaging over `m` input samples.
    ///
    /// # Panics
    /// Panics if `m` is 0.
    pub fn new(m: usize) -> Self {
        assert!(m > 0, "window length must be greater than 0");
        Self {
            inputs: vec![0.0; m],
        }
    }

    /// Add a new input and return the current output.
    pub fn update(&mut self, x: f32) -> f32 {
        let m = self.inputs.len();
        for i in 0..m - 1 {
            self.inputs[i] = self.inputs[i + 1];
        }
        self.inputs[m - 1] = x;

        self.inputs.iter().sum::<f32>() / m as f32
    }

    /// Zero the window.
    pub fn reset(&mut self) {
        self.inputs.iter_mut().for_each(|v| *v = 0.0);
    }
}
