//! Playback engine: walks the track list on a dedicated thread.
//!
//! Per track: open the container, bind a decoder to the track's codec, open an
//! output line sized to the track's format, then stream frame by frame while
//! honoring the live transport flags. Failures abort the whole run; they are
//! logged here and never cross the thread boundary.

use anyhow::{Context, Result};

use crate::config::PlaybackTuning;
use crate::line::OutputLine;
use crate::source::{FrameDecoder, MediaFile, TrackSource};
use crate::transport::TransportFlags;

/// How a single track run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrackEnd {
    /// The track played to its last frame.
    Completed,
    /// A stop request interrupted it.
    Stopped,
}

/// Seam between the playlist walk and the per-track setup/stream work.
///
/// The production implementation is [`PlaylistRunner`]; tests substitute a
/// recording mock to observe the sequencing policy.
pub(crate) trait TrackRunner {
    fn run_track(&mut self, index: usize) -> Result<TrackEnd>;
}

/// Index of the track to play after `current` completed normally.
///
/// Loop replays the same index; repeat wraps the last index to the first;
/// otherwise advance, with `None` ending the run past the final track.
/// Stop takes priority over all of these, but that is the caller's check.
pub(crate) fn next_index(
    current: usize,
    track_count: usize,
    loop_current: bool,
    repeat_all: bool,
) -> Option<usize> {
    if loop_current {
        return Some(current);
    }
    if repeat_all && current + 1 == track_count {
        return Some(0);
    }
    let next = current + 1;
    (next < track_count).then_some(next)
}

/// Walk the track list until it is exhausted, stopped, or a track fails.
///
/// Loop/repeat flags are re-read at every advance decision, so toggles made
/// mid-track take effect at the next boundary.
pub(crate) fn run_playlist(runner: &mut dyn TrackRunner, track_count: usize, flags: &TransportFlags) {
    let mut index = 0;
    while index < track_count {
        if flags.stop_requested() {
            tracing::info!("stop requested before track start");
            break;
        }
        match runner.run_track(index) {
            Ok(TrackEnd::Completed) => {}
            Ok(TrackEnd::Stopped) => {
                tracing::info!(index, "playback stopped");
                break;
            }
            Err(e) => {
                tracing::error!(index, "playback aborted: {e:#}");
                break;
            }
        }
        match next_index(index, track_count, flags.loop_enabled(), flags.repeat_enabled()) {
            Some(next) => index = next,
            None => break,
        }
    }
    tracing::debug!("playback engine finished");
}

/// Production track runner: Symphonia decode into a CPAL output line.
pub(crate) struct PlaylistRunner<'a> {
    tracks: &'a [MediaFile],
    flags: &'a TransportFlags,
    tuning: &'a PlaybackTuning,
}

impl<'a> PlaylistRunner<'a> {
    pub(crate) fn new(
        tracks: &'a [MediaFile],
        flags: &'a TransportFlags,
        tuning: &'a PlaybackTuning,
    ) -> Self {
        Self {
            tracks,
            flags,
            tuning,
        }
    }
}

impl TrackRunner for PlaylistRunner<'_> {
    fn run_track(&mut self, index: usize) -> Result<TrackEnd> {
        let file = &self.tracks[index];

        // Reopened on every call: sources are not restartable, so looping a
        // track goes through full setup again.
        let mut source = TrackSource::open(file.path())?;
        let format = source.format().clone();
        let mut decoder = FrameDecoder::new(&source)?;
        let line = OutputLine::open(&format, self.tuning)
            .with_context(|| format!("output line for {}", file.path().display()))?;

        tracing::info!(
            path = %file.path().display(),
            rate_hz = format.sample_rate,
            channels = format.channels,
            "track started"
        );

        loop {
            if self.flags.stop_requested() {
                line.close();
                return Ok(TrackEnd::Stopped);
            }

            let Some(packet) = source.next_frame()? else {
                break;
            };

            // Muted playback still decodes so position and timing advance.
            let samples = decoder.decode(&packet)?;
            if !self.flags.muted() {
                line.write(&samples);
            }

            if self.flags.paused() && !self.flags.wait_while_paused(self.tuning.pause_poll) {
                line.close();
                return Ok(TrackEnd::Stopped);
            }
        }

        if !line.drain(|| self.flags.stop_requested()) {
            return Ok(TrackEnd::Stopped);
        }
        tracing::debug!(path = %file.path().display(), "track completed");
        Ok(TrackEnd::Completed)
    }
}
