pub use facecall_core::model::{PeerId, RoomId};
pub use facecall_core::{Error, Result};

pub mod model {
    pub use facecall_core::model::*;
    pub use facecall_core::utils::default_ice_servers;
}

#[cfg(feature = "client")]
pub mod client {
    pub use facecall_client::*;
}
