//! Live terminal chart of the raw and aggregate series

pub mod layout;
pub mod renderer;
pub mod terminal;

pub use layout::{chart_bounds, ChartView};
pub use terminal::{log_target, run_ui};
