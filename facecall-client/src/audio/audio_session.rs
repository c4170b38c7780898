use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCommand {
    SpeakerOn,
    SpeakerOff,
    Reset,
}

/// Mode of the play-and-record session category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    VideoChat,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPort {
    Speaker,
    Receiver,
}

/// Platform audio session. Calls arrive on the audio-session thread only,
/// bracketed by [`lock`](Self::lock) and [`unlock`](Self::unlock).
pub trait AudioSessionBackend: Send {
    fn lock(&mut self);

    fn unlock(&mut self);

    /// Switches to the play-and-record category in `mode`.
    fn set_play_and_record(&mut self, mode: AudioMode) -> anyhow::Result<()>;

    fn override_output_port(&mut self, port: OutputPort) -> anyhow::Result<()>;

    fn set_active(&mut self, active: bool) -> anyhow::Result<()>;
}

/// Backend with no platform session behind it.
#[derive(Debug, Default)]
pub struct NullAudioBackend;

impl AudioSessionBackend for NullAudioBackend {
    fn lock(&mut self) {}

    fn unlock(&mut self) {}

    fn set_play_and_record(&mut self, _: AudioMode) -> anyhow::Result<()> {
        Ok(())
    }

    fn override_output_port(&mut self, _: OutputPort) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_active(&mut self, _: bool) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Serializes audio-session configuration on a dedicated thread.
///
/// Commands run in submission order. Failures are logged. Dropping the
/// queue runs the pending commands, then stops the thread.
pub struct AudioSessionQueue {
    tx: Option<mpsc::UnboundedSender<AudioCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl AudioSessionQueue {
    pub fn spawn(backend: Box<dyn AudioSessionBackend>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = std::thread::Builder::new()
            .name("audio-session".to_owned())
            .spawn(move || run(backend, rx))?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    pub fn speaker_on(&self) {
        self.submit(AudioCommand::SpeakerOn);
    }

    pub fn speaker_off(&self) {
        self.submit(AudioCommand::SpeakerOff);
    }

    pub fn reset(&self) {
        self.submit(AudioCommand::Reset);
    }

    pub fn submit(&self, command: AudioCommand) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(command).is_err() {
            warn!("Audio session thread gone, dropping {:?}", command);
        }
    }

    /// Runs the pending commands and waits for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Audio session thread panicked");
            }
        }
    }
}

impl Drop for AudioSessionQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(mut backend: Box<dyn AudioSessionBackend>, mut rx: mpsc::UnboundedReceiver<AudioCommand>) {
    info!("Audio session queue started");
    while let Some(command) = rx.blocking_recv() {
        debug!("Audio command: {:?}", command);
        backend.lock();
        if let Err(e) = configure(backend.as_mut(), command) {
            warn!("Audio session configuration failed for {:?}: {:?}", command, e);
        }
        backend.unlock();
    }
    info!("Audio session queue stopped");
}

fn configure(backend: &mut dyn AudioSessionBackend, command: AudioCommand) -> anyhow::Result<()> {
    match command {
        AudioCommand::SpeakerOn => {
            backend.set_play_and_record(AudioMode::VideoChat)?;
            backend.override_output_port(OutputPort::Speaker)?;
            backend.set_active(true)
        }
        AudioCommand::SpeakerOff => {
            backend.set_play_and_record(AudioMode::VideoChat)?;
            backend.override_output_port(OutputPort::Receiver)
        }
        AudioCommand::Reset => {
            backend.set_play_and_record(AudioMode::Default)?;
            backend.set_active(false)
        }
    }
}
