use std::time::Duration;

/// Playback tuning parameters shared by the engine and output line.
#[derive(Clone, Debug)]
pub struct PlaybackTuning {
    /// Target buffer duration used to size the output line queue.
    pub buffer_seconds: f32,
    /// Interval at which a paused engine re-checks the stop flag.
    pub pause_poll: Duration,
}

impl Default for PlaybackTuning {
    /// Defaults tuned for low-risk playback across common devices.
    fn default() -> Self {
        Self {
            buffer_seconds: 2.0,
            pause_poll: Duration::from_millis(500),
        }
    }
}
