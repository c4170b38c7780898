use async_trait::async_trait;
use webrtc::media::Sample;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Destination of encoded media samples.
#[async_trait]
pub trait SampleWriter: Send + Sync {
    async fn write(&self, sample: &Sample) -> anyhow::Result<()>;
}

#[async_trait]
impl SampleWriter for TrackLocalStaticSample {
    async fn write(&self, sample: &Sample) -> anyhow::Result<()> {
        self.write_sample(sample).await?;
        Ok(())
    }
}
