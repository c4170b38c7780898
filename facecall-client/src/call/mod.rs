mod call_coordinator;
mod call_session;

pub use call_coordinator::*;
pub use call_session::*;
