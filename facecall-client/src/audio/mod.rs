mod audio_session;

pub use audio_session::*;
