pub mod helpers;
pub mod mock_engine;
pub mod recording_sink;

pub use helpers::*;
pub use mock_detector::*;
pub use mock_engine::*;
pub use recording_sink::*;
