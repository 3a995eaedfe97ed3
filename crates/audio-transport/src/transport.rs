//! Transport controller: the public playback surface.
//!
//! Holds the validated file list, the shared transport flags, and the handle
//! of the single in-flight engine run. All methods are safe to call from any
//! thread while the engine is running.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::PlaybackTuning;
use crate::engine::{PlaylistRunner, run_playlist};
use crate::source::MediaFile;

/// Shared transport state written by [`Transport`] methods and read by the
/// engine on every frame or advance boundary.
///
/// Each flag is an independent atomic; no transition spans more than one.
/// The condvar exists solely to wake the engine's pause wait, so a stop (or
/// resume) lands within one poll interval instead of one pause.
#[derive(Default)]
pub(crate) struct TransportFlags {
    paused: AtomicBool,
    muted: AtomicBool,
    loop_current: AtomicBool,
    repeat_all: AtomicBool,
    stop: AtomicBool,
    wake_lock: Mutex<()>,
    wake: Condvar,
}

impl TransportFlags {
    pub(crate) fn paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub(crate) fn muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub(crate) fn loop_enabled(&self) -> bool {
        self.loop_current.load(Ordering::Relaxed)
    }

    pub(crate) fn repeat_enabled(&self) -> bool {
        self.repeat_all.load(Ordering::Relaxed)
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
        if !paused {
            self.notify();
        }
    }

    /// Flip the mute flag, returning the new value.
    pub(crate) fn toggle_mute(&self) -> bool {
        !self.muted.fetch_xor(true, Ordering::Relaxed)
    }

    pub(crate) fn set_loop(&self, enabled: bool) {
        self.loop_current.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn set_repeat(&self, enabled: bool) {
        self.repeat_all.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        self.notify();
    }

    pub(crate) fn clear_stop(&self) {
        self.stop.store(false, Ordering::Relaxed);
    }

    fn notify(&self) {
        // Taking the lock orders the notify after any in-progress wait entry.
        let _guard = self.wake_lock.lock().unwrap();
        self.wake.notify_all();
    }

    /// Block while paused, re-checking the stop flag at least every `poll`.
    ///
    /// Returns `true` when playback may resume, `false` when a stop request
    /// ended the wait.
    pub(crate) fn wait_while_paused(&self, poll: Duration) -> bool {
        let mut guard = self.wake_lock.lock().unwrap();
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return false;
            }
            if !self.paused.load(Ordering::Relaxed) {
                return true;
            }
            let (next, _timeout) = self.wake.wait_timeout(guard, poll).unwrap();
            guard = next;
        }
    }
}

/// The single in-flight engine run, or its finished remains until reaped.
struct RunHandle {
    join: JoinHandle<()>,
}

impl RunHandle {
    fn is_alive(&self) -> bool {
        !self.join.is_finished()
    }

    fn reap(self) {
        let _ = self.join.join();
    }
}

/// Sequential playback controller over a fixed list of media files.
///
/// Construction probes every candidate path and keeps the ones that expose a
/// decodable audio track; the list is immutable afterwards. One background
/// engine run exists at a time; mute/loop/repeat settings survive across
/// play/stop cycles.
///
/// ```no_run
/// use audio_transport::Transport;
///
/// let transport = Transport::new(["a.flac", "b.mp3"]);
/// transport.play();
/// transport.pause();
/// transport.resume();
/// transport.stop();
/// ```
pub struct Transport {
    tracks: Vec<MediaFile>,
    flags: Arc<TransportFlags>,
    tuning: PlaybackTuning,
    run: Mutex<Option<RunHandle>>,
}

impl Transport {
    /// Build a controller from candidate paths.
    ///
    /// Files that cannot be opened as a media container, or that contain no
    /// decodable audio track, are skipped with a warning. Never fails; an
    /// all-invalid list yields a controller whose runs end immediately.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::with_tuning(paths, PlaybackTuning::default())
    }

    /// Single-file convenience constructor.
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self::new([path.into()])
    }

    /// As [`Transport::new`] with explicit tuning.
    pub fn with_tuning<I, P>(paths: I, tuning: PlaybackTuning) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut tracks = Vec::new();
        for path in paths {
            let path: PathBuf = path.into();
            match MediaFile::probe(&path) {
                Ok(file) => tracks.push(file),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unplayable file: {e:#}");
                }
            }
        }
        tracing::debug!(accepted = tracks.len(), "transport constructed");

        Self {
            tracks,
            flags: Arc::new(TransportFlags::default()),
            tuning,
            run: Mutex::new(None),
        }
    }

    /// Start playback from the first track.
    ///
    /// Rejected with a warning while a run is already alive; a finished run
    /// is reaped and replaced. Returns without blocking on playback.
    pub fn play(&self) {
        let mut run = self.run.lock().unwrap();
        if let Some(handle) = run.take() {
            if handle.is_alive() {
                tracing::warn!("already playing; stop the current run before starting another");
                *run = Some(handle);
                return;
            }
            handle.reap();
        }

        // A stop left over from the previous run must not kill this one.
        self.flags.clear_stop();

        let tracks = self.tracks.clone();
        let flags = Arc::clone(&self.flags);
        let tuning = self.tuning.clone();
        let join = std::thread::spawn(move || {
            let count = tracks.len();
            let mut runner = PlaylistRunner::new(&tracks, &flags, &tuning);
            run_playlist(&mut runner, count, &flags);
        });

        *run = Some(RunHandle { join });
    }

    /// Request the current run to halt.
    ///
    /// No-op when idle. The engine observes the request within one frame
    /// while streaming, or one poll interval while paused; `is_playing`
    /// turns false once the run has actually wound down.
    pub fn stop(&self) {
        let run = self.run.lock().unwrap();
        let alive = run.as_ref().map(RunHandle::is_alive).unwrap_or(false);
        if !alive {
            return;
        }
        tracing::info!("stop requested");
        self.flags.request_stop();
    }

    /// Suspend decoding and output. Idempotent; does not touch a pending stop.
    pub fn pause(&self) {
        self.flags.set_paused(true);
    }

    /// Resume from a pause, waking the engine immediately. Idempotent.
    pub fn resume(&self) {
        self.flags.set_paused(false);
    }

    /// Flip mute and return the new state.
    ///
    /// Observed at the next frame write; audio already buffered in the
    /// output line keeps playing.
    pub fn toggle_mute(&self) -> bool {
        let muted = self.flags.toggle_mute();
        tracing::info!(muted, "mute toggled");
        muted
    }

    /// Replay the current track instead of advancing.
    pub fn enable_loop(&self) {
        self.flags.set_loop(true);
    }

    pub fn disable_loop(&self) {
        self.flags.set_loop(false);
    }

    /// Restart the list from the first track after the last one completes.
    pub fn enable_repeat(&self) {
        self.flags.set_repeat(true);
    }

    pub fn disable_repeat(&self) {
        self.flags.set_repeat(false);
    }

    /// Whether an engine run is currently alive.
    pub fn is_playing(&self) -> bool {
        self.run
            .lock()
            .unwrap()
            .as_ref()
            .map(RunHandle::is_alive)
            .unwrap_or(false)
    }

    pub fn is_muted(&self) -> bool {
        self.flags.muted()
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused()
    }

    pub fn is_loop_enabled(&self) -> bool {
        self.flags.loop_enabled()
    }

    pub fn is_repeat_enabled(&self) -> bool {
        self.flags.repeat_enabled()
    }

    /// Number of files that survived construction-time validation.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::thread;

    fn write_wav(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..441 {
            let sample = ((i as f32 * 0.05).sin() * 8_000.0) as i16;
            writer.write_sample(sample).unwrap();
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    fn wait_until_idle(transport: &Transport) {
        for _ in 0..200 {
            if !transport.is_playing() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("run did not wind down");
    }

    #[test]
    fn construction_keeps_only_decodable_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_wav(dir.path(), "first.wav");
        let garbage = dir.path().join("garbage.wav");
        std::fs::write(&garbage, b"not a container").unwrap();
        let second = write_wav(dir.path(), "second.wav");
        let missing = dir.path().join("missing.wav");

        let transport = Transport::new([first.clone(), garbage, second.clone(), missing]);
        assert_eq!(transport.track_count(), 2);
        assert_eq!(transport.tracks[0].path(), first.as_path());
        assert_eq!(transport.tracks[1].path(), second.as_path());
    }

    #[test]
    fn single_constructor_accepts_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "one.wav");
        let transport = Transport::single(path);
        assert_eq!(transport.track_count(), 1);
    }

    #[test]
    fn loop_and_repeat_toggles_are_idempotent() {
        let transport = Transport::new(Vec::<PathBuf>::new());

        transport.enable_loop();
        transport.enable_loop();
        assert!(transport.is_loop_enabled());
        transport.disable_loop();
        assert!(!transport.is_loop_enabled());

        transport.enable_repeat();
        transport.enable_repeat();
        assert!(transport.is_repeat_enabled());
        transport.disable_repeat();
        assert!(!transport.is_repeat_enabled());
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let transport = Transport::new(Vec::<PathBuf>::new());
        transport.pause();
        transport.pause();
        assert!(transport.is_paused());
        transport.resume();
        transport.resume();
        assert!(!transport.is_paused());
    }

    #[test]
    fn toggle_mute_flips_and_reports_the_new_state() {
        let transport = Transport::new(Vec::<PathBuf>::new());
        assert!(!transport.is_muted());
        assert!(transport.toggle_mute());
        assert!(transport.is_muted());
        assert!(!transport.toggle_mute());
        assert!(!transport.is_muted());
    }

    #[test]
    fn stop_when_idle_is_a_no_op() {
        let transport = Transport::new(Vec::<PathBuf>::new());
        assert!(!transport.is_playing());
        transport.stop();
        assert!(!transport.is_playing());
        // A stale stop must not poison the next play.
        assert!(!transport.flags.stop_requested());
    }

    #[test]
    fn play_with_empty_playlist_finishes_immediately() {
        let transport = Transport::new(Vec::<PathBuf>::new());
        transport.play();
        wait_until_idle(&transport);

        // The finished run is reaped and a new one is accepted.
        transport.play();
        wait_until_idle(&transport);
    }

    #[test]
    fn second_play_is_rejected_while_a_run_is_alive() {
        let transport = Transport::new(Vec::<PathBuf>::new());

        // Stand in for an engine run that only exits on a stop request.
        let flags = Arc::clone(&transport.flags);
        let join = thread::spawn(move || {
            while !flags.stop_requested() {
                thread::sleep(Duration::from_millis(5));
            }
        });
        *transport.run.lock().unwrap() = Some(RunHandle { join });
        assert!(transport.is_playing());

        transport.play();
        assert!(transport.is_playing());
        // The rejected play must not have cleared flags for the live run.
        assert!(!transport.flags.stop_requested());

        transport.stop();
        let handle = transport.run.lock().unwrap().take().unwrap();
        handle.reap();
        assert!(!transport.is_playing());
    }

    #[test]
    fn stop_interrupts_an_indefinite_pause() {
        let flags = Arc::new(TransportFlags::default());
        flags.set_paused(true);

        let waiter = Arc::clone(&flags);
        let join = thread::spawn(move || waiter.wait_while_paused(Duration::from_millis(500)));

        thread::sleep(Duration::from_millis(50));
        flags.request_stop();
        // join returning at all proves the wait was unblocked.
        assert!(!join.join().unwrap());
    }

    #[test]
    fn resume_wakes_the_pause_wait() {
        let flags = Arc::new(TransportFlags::default());
        flags.set_paused(true);

        let waiter = Arc::clone(&flags);
        let join = thread::spawn(move || waiter.wait_while_paused(Duration::from_millis(500)));

        thread::sleep(Duration::from_millis(50));
        flags.set_paused(false);
        assert!(join.join().unwrap());
    }

    #[test]
    fn mute_and_loop_settings_survive_a_stop() {
        let transport = Transport::new(Vec::<PathBuf>::new());
        transport.toggle_mute();
        transport.enable_loop();
        transport.play();
        wait_until_idle(&transport);
        transport.stop();
        assert!(transport.is_muted());
        assert!(transport.is_loop_enabled());
    }
}
