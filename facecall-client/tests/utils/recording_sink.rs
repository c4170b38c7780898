use facecall_client::{AudioPacket, AudioSink, FrameSink, VideoFrame};
use std::sync::Mutex;

/// FrameSink that keeps every emitted frame.
#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<VideoFrame>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<VideoFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<VideoFrame> {
        self.frames.lock().unwrap().last().cloned()
    }
}

impl FrameSink for RecordingSink {
    fn emit(&self, frame: VideoFrame) {
        self.frames.lock().unwrap().push(frame);
    }
}

/// AudioSink that keeps every emitted packet.
#[derive(Default)]
pub struct RecordingAudioSink {
    packets: Mutex<Vec<AudioPacket>>,
}

impl RecordingAudioSink {
    pub fn len(&self) -> usize {
        self.packets.lock().unwrap().len()
    }
}

impl AudioSink for RecordingAudioSink {
    fn emit(&self, packet: AudioPacket) {
        self.packets.lock().unwrap().push(packet);
    }
}
