mod capture;
mod detector;
mod frame;
mod frame_pipeline;
mod overlay;

pub use capture::*;
pub use detector::*;
pub use frame::*;
pub use frame_pipeline::*;
pub use overlay::*;
