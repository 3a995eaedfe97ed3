//! Sequential audio-file playback with live transport control.
//!
//! Given an ordered list of media files, a [`Transport`] decodes and streams
//! them to the default output device on a dedicated thread while the caller
//! pauses, resumes, mutes, stops, or toggles loop/repeat mid-flight.
//!
//! ## Pipeline
//! 1. **Probe**: construction validates each file with Symphonia and drops
//!    the ones without a decodable audio track.
//! 2. **Decode**: the engine thread pulls encoded frames and decodes them to
//!    interleaved `f32` per track.
//! 3. **Playback**: a CPAL output line sized to the track's format drains a
//!    bounded queue; the engine's writes block on that queue, which is what
//!    paces decoding to the device.
//!
//! Transport flags are plain atomics shared between the caller and the
//! engine; only the pause wait needs a wake signal, so a stop request is
//! honored within one poll interval even mid-pause.

pub mod config;
mod engine;
mod line;
mod queue;
mod source;
mod transport;

pub use config::PlaybackTuning;
pub use transport::Transport;
