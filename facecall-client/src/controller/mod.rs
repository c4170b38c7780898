mod connection_controller;
mod fanout;
mod negotiation;
mod remote_candidates;

pub use connection_controller::*;
pub use negotiation::*;
