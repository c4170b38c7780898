mod layout;
mod memory_signaling;
mod signaling_channel;

pub use layout::*;
pub use memory_signaling::*;
pub use signaling_channel::*;
