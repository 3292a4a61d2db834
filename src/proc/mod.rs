// Signal processing building blocks: band-power extraction, smoothing, and
// the numeric helpers shared with the controller.

pub mod band_filter;
pub mod moving_average;
pub mod position_filter;
pub mod util;

pub use band_filter::{BandCoefficients, BandFilter};
pub use moving_average::MovingAverageFilter;
pub use position_filter::PositionFilter;
