mod audio;
mod call;
mod controller;
mod pipeline;
mod signaling;
mod transport;

pub use audio::*;
pub use call::*;
pub use controller::*;
pub use pipeline::*;
pub use signaling::*;
pub use transport::*;
