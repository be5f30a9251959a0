//! The answering-machine state machine
//!
//! One cooperative loop samples both buttons every poll interval and
//! decides between three behaviors: greet-and-record (receiver picked up,
//! play button untouched), play back the last message (receiver picked up
//! with the play button held), or idle. Levels are interpreted raw on
//! every tick; there is no debouncing and no edge detection, and the two
//! lines are never cached across ticks.
//!
//! The machine is deliberately single-threaded: the blocking chunk read
//! during a recording session and the wait for playback completion are
//! accepted suspension points, not missing concurrency.

use crate::audio::{AudioAdapter, AudioChunk, CaptureStream};
use crate::config::Config;
use crate::error::{AnsaphoneError, Result};
use crate::gpio::{InputSampler, Line};
use crate::store::RecordingStore;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::sleep;

/// Machine states. Exactly one instance exists, owned by [`Machine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// Receiver on hook; sampling both lines
    Idle,
    /// Receiver just picked up with the play line idle: the greeting is
    /// being started and a capture session opened
    Prompting,
    /// Capture session open; chunks are appended until the hook drops
    Recording,
    /// Playing back the most recent recording
    Playback,
    /// Playback done; waiting for the receiver to go back on hook
    AwaitingHangup,
}

impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineState::Idle => write!(f, "idle"),
            MachineState::Prompting => write!(f, "prompting"),
            MachineState::Recording => write!(f, "recording"),
            MachineState::Playback => write!(f, "playback"),
            MachineState::AwaitingHangup => write!(f, "awaiting hangup"),
        }
    }
}

/// An open capture session. At most one exists at any time; the buffer
/// belongs to the session alone and is flushed when the session closes.
struct RecordSession {
    stream: Box<dyn CaptureStream>,
    buffer: Vec<AudioChunk>,
}

/// Context object owning every collaborator the loop drives.
///
/// Constructed once at startup; dropping it releases the input lines and
/// any open audio stream on every exit path.
pub struct Machine {
    config: Config,
    sampler: Box<dyn InputSampler>,
    audio: Box<dyn AudioAdapter>,
    store: RecordingStore,
    state: MachineState,
    session: Option<RecordSession>,
}

impl Machine {
    pub fn new(
        config: Config,
        sampler: Box<dyn InputSampler>,
        audio: Box<dyn AudioAdapter>,
        store: RecordingStore,
    ) -> Self {
        Self {
            config,
            sampler,
            audio,
            store,
            state: MachineState::Idle,
            session: None,
        }
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Advance the machine by one step and return the next state.
    ///
    /// The caller paces the loop: one poll-interval sleep after every
    /// tick except while recording, where the blocking chunk read paces
    /// the loop at hardware buffer granularity.
    pub async fn tick(&mut self) -> Result<MachineState> {
        let next = match self.state {
            MachineState::Idle => self.tick_idle()?,
            MachineState::Prompting => self.tick_prompting().await?,
            MachineState::Recording => self.tick_recording().await?,
            MachineState::Playback => self.tick_playback().await?,
            MachineState::AwaitingHangup => self.tick_awaiting_hangup()?,
        };
        self.state = next;
        Ok(next)
    }

    fn tick_idle(&mut self) -> Result<MachineState> {
        let hook = self.sampler.read_line(Line::Hook)?;
        let play = self.sampler.read_line(Line::Play)?;

        // Active-low: false means pressed/connected. Both gestures start
        // with the receiver off hook; the play line picks between them.
        Ok(match (hook, play) {
            (false, true) => MachineState::Prompting,
            (false, false) => MachineState::Playback,
            _ => MachineState::Idle,
        })
    }

    async fn tick_prompting(&mut self) -> Result<MachineState> {
        tracing::info!("Recording new message!");

        // Fire and forget: the greeting plays while capture already runs.
        let greeting = self.store.greeting_path(&self.config.storage.greeting);
        let _ = self.audio.play(&greeting).await;

        let stream = self.audio.open_capture().await?;
        self.session = Some(RecordSession {
            stream,
            buffer: Vec::new(),
        });
        Ok(MachineState::Recording)
    }

    async fn tick_recording(&mut self) -> Result<MachineState> {
        let Some(mut session) = self.session.take() else {
            tracing::error!("Recording state without an open session");
            return Ok(MachineState::Idle);
        };

        if !self.sampler.read_line(Line::Hook)? {
            // Still off hook: pull one chunk.
            let chunk = session.stream.read(self.config.audio.chunk_frames).await?;
            if chunk.overflowed {
                tracing::warn!("Capture overflow, keeping partial chunk");
            }
            session.buffer.push(chunk);
            self.session = Some(session);
            return Ok(MachineState::Recording);
        }

        // Receiver back on hook: close the session and flush the buffer.
        session.stream.stop().await?;
        tracing::info!("Recording stopped!");

        let recording = self
            .store
            .persist(&session.buffer, self.config.audio.sample_rate)?;
        tracing::info!("Saved message to {:?}", recording.path);

        Ok(MachineState::Idle)
    }

    async fn tick_playback(&mut self) -> Result<MachineState> {
        tracing::info!("Playing back last recording!");

        match self.store.most_recent()? {
            Some(recording) => {
                tracing::info!("Last message: {:?}", recording.path);
                if let Some(handle) = self.audio.play(&recording.path).await {
                    // Block until the audio subsystem signals completion.
                    handle.wait().await;
                }
            }
            None => {
                tracing::info!(
                    "No recording starting with '{}' found in {:?}",
                    self.config.storage.prefix,
                    self.config.storage.dir
                );
            }
        }

        tracing::info!("Hang up to reset state machine!");
        Ok(MachineState::AwaitingHangup)
    }

    fn tick_awaiting_hangup(&mut self) -> Result<MachineState> {
        if self.sampler.read_line(Line::Hook)? {
            tracing::info!("Pick up to start recording!");
            Ok(MachineState::Idle)
        } else {
            Ok(MachineState::AwaitingHangup)
        }
    }

    /// Run the controller until interrupted.
    ///
    /// SIGINT and SIGTERM both terminate the loop; any open capture
    /// session is stopped before returning, and dropping the machine
    /// releases the input lines.
    pub async fn run(&mut self) -> Result<()> {
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| AnsaphoneError::Config(format!("Failed to set up SIGINT handler: {}", e)))?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| AnsaphoneError::Config(format!("Failed to set up SIGTERM handler: {}", e)))?;

        let poll = self.config.gpio.poll_interval();

        // Guard against starting mid-call: wait for the receiver to be
        // back on the hook before entering the loop.
        if !self.sampler.read_line(Line::Hook)? {
            tracing::info!("Hang up first!");
            loop {
                tokio::select! {
                    _ = sigint.recv() => return Ok(()),
                    _ = sigterm.recv() => return Ok(()),
                    _ = sleep(poll) => {
                        if self.sampler.read_line(Line::Hook)? {
                            break;
                        }
                    }
                }
            }
        }
        tracing::info!("Initialization completed!");

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, exiting.");
                    break;
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, exiting.");
                    break;
                }
                next = self.tick() => {
                    // The capture read paces the recording state on its own.
                    if next? != MachineState::Recording {
                        sleep(poll).await;
                    }
                }
            }
        }

        // Release the capture device if an interrupt landed mid-session.
        if let Some(mut session) = self.session.take() {
            let _ = session.stream.stop().await;
        }
        self.state = MachineState::Idle;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PlaybackHandle;
    use crate::error::{AudioError, GpioError};
    use std::path::{Path, PathBuf};
    use std::result::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Line levels shared between the test and the machine's sampler
    #[derive(Clone)]
    struct Levels(Arc<Mutex<(bool, bool)>>);

    impl Levels {
        fn new(hook: bool, play: bool) -> Self {
            Self(Arc::new(Mutex::new((hook, play))))
        }

        fn set(&self, hook: bool, play: bool) {
            *self.0.lock().unwrap() = (hook, play);
        }
    }

    struct FakeSampler {
        levels: Levels,
    }

    impl InputSampler for FakeSampler {
        fn read_line(&mut self, line: Line) -> Result<bool, GpioError> {
            let (hook, play) = *self.levels.0.lock().unwrap();
            Ok(match line {
                Line::Hook => hook,
                Line::Play => play,
            })
        }
    }

    struct FakeCapture {
        chunk: Vec<i16>,
        open: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl CaptureStream for FakeCapture {
        async fn read(&mut self, frames: usize) -> Result<AudioChunk, AudioError> {
            let mut samples = self.chunk.clone();
            samples.truncate(frames);
            Ok(AudioChunk {
                samples,
                sample_rate: 44100,
                overflowed: false,
            })
        }

        async fn stop(&mut self) -> Result<(), AudioError> {
            self.open.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Adapter recording every play call and counting capture sessions
    struct FakeAudio {
        chunk: Vec<i16>,
        resolve_device: bool,
        played: Arc<Mutex<Vec<PathBuf>>>,
        sessions_opened: Arc<AtomicUsize>,
        open: Arc<AtomicUsize>,
        /// When set, the next play call hands out this receiver instead
        /// of an already-completed one.
        gate: Arc<Mutex<Option<oneshot::Receiver<()>>>>,
    }

    impl FakeAudio {
        fn new() -> Self {
            Self {
                chunk: vec![1, 2, 3, 4],
                resolve_device: true,
                played: Arc::new(Mutex::new(Vec::new())),
                sessions_opened: Arc::new(AtomicUsize::new(0)),
                open: Arc::new(AtomicUsize::new(0)),
                gate: Arc::new(Mutex::new(None)),
            }
        }
    }

    #[async_trait::async_trait]
    impl AudioAdapter for FakeAudio {
        async fn open_capture(&self) -> Result<Box<dyn CaptureStream>, AudioError> {
            self.sessions_opened.fetch_add(1, Ordering::SeqCst);
            let open = self.open.clone();
            assert_eq!(open.fetch_add(1, Ordering::SeqCst), 0, "second concurrent session");
            Ok(Box::new(FakeCapture {
                chunk: self.chunk.clone(),
                open,
            }))
        }

        async fn play(&self, path: &Path) -> Option<PlaybackHandle> {
            if !self.resolve_device {
                return None;
            }
            self.played.lock().unwrap().push(path.to_path_buf());

            let rx = match self.gate.lock().unwrap().take() {
                Some(rx) => rx,
                None => {
                    let (tx, rx) = oneshot::channel();
                    let _ = tx.send(());
                    rx
                }
            };
            Some(PlaybackHandle::new(rx))
        }
    }

    fn machine_with(
        dir: &Path,
        levels: Levels,
        audio: FakeAudio,
    ) -> Machine {
        let mut config = Config::default();
        config.storage.dir = dir.to_path_buf();
        config.audio.chunk_frames = 4;

        let store = RecordingStore::new(dir, config.storage.prefix.clone());
        Machine::new(config, Box::new(FakeSampler { levels }), Box::new(audio), store)
    }

    #[tokio::test]
    async fn test_idle_stays_idle_while_on_hook() {
        let dir = tempfile::tempdir().unwrap();
        let levels = Levels::new(true, true);
        let mut machine = machine_with(dir.path(), levels, FakeAudio::new());

        for _ in 0..3 {
            assert_eq!(machine.tick().await.unwrap(), MachineState::Idle);
        }
    }

    #[tokio::test]
    async fn test_record_session_persists_three_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let levels = Levels::new(false, true);
        let audio = FakeAudio::new();
        let played = audio.played.clone();
        let sessions = audio.sessions_opened.clone();
        let open = audio.open.clone();
        let mut machine = machine_with(dir.path(), levels.clone(), audio);

        assert_eq!(machine.tick().await.unwrap(), MachineState::Prompting);
        assert_eq!(machine.tick().await.unwrap(), MachineState::Recording);

        // Greeting was fired off before capture opened.
        assert_eq!(
            played.lock().unwrap().as_slice(),
            &[dir.path().join("hello.wav")]
        );
        assert_eq!(sessions.load(Ordering::SeqCst), 1);

        for _ in 0..3 {
            assert_eq!(machine.tick().await.unwrap(), MachineState::Recording);
        }

        // Hang up: the very next tick closes and persists the session.
        levels.set(true, true);
        assert_eq!(machine.tick().await.unwrap(), MachineState::Idle);
        assert_eq!(open.load(Ordering::SeqCst), 0);

        let wavs: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with("recording_")
            })
            .collect();
        assert_eq!(wavs.len(), 1, "exactly one file persisted");

        let mut reader = hound::WavReader::open(wavs[0].path()).unwrap();
        assert_eq!(reader.spec().sample_rate, 44100);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_no_second_session_across_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let levels = Levels::new(false, true);
        let audio = FakeAudio::new();
        let sessions = audio.sessions_opened.clone();
        let mut machine = machine_with(dir.path(), levels.clone(), audio);

        // First full cycle.
        machine.tick().await.unwrap(); // Prompting
        machine.tick().await.unwrap(); // Recording
        machine.tick().await.unwrap();
        levels.set(true, true);
        assert_eq!(machine.tick().await.unwrap(), MachineState::Idle);

        // Second cycle opens a fresh session; FakeAudio asserts they
        // never overlap.
        levels.set(false, true);
        machine.tick().await.unwrap();
        machine.tick().await.unwrap();
        levels.set(true, true);
        assert_eq!(machine.tick().await.unwrap(), MachineState::Idle);

        assert_eq!(sessions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_playback_empty_store_skips_to_awaiting_hangup() {
        let dir = tempfile::tempdir().unwrap();
        let levels = Levels::new(false, false);
        let audio = FakeAudio::new();
        let played = audio.played.clone();
        let mut machine = machine_with(dir.path(), levels.clone(), audio);

        assert_eq!(machine.tick().await.unwrap(), MachineState::Playback);
        assert_eq!(machine.tick().await.unwrap(), MachineState::AwaitingHangup);
        assert!(played.lock().unwrap().is_empty(), "no playback call issued");

        // Still held: stay put. Released: back to idle.
        assert_eq!(machine.tick().await.unwrap(), MachineState::AwaitingHangup);
        levels.set(true, true);
        assert_eq!(machine.tick().await.unwrap(), MachineState::Idle);
    }

    #[tokio::test]
    async fn test_playback_selects_most_recent_file() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "recording_20240101_100000.wav",
            "recording_20240101_120000.wav",
            "recording_20240101_110000.wav",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let levels = Levels::new(false, false);
        let audio = FakeAudio::new();
        let played = audio.played.clone();
        let mut machine = machine_with(dir.path(), levels, audio);

        assert_eq!(machine.tick().await.unwrap(), MachineState::Playback);
        assert_eq!(machine.tick().await.unwrap(), MachineState::AwaitingHangup);
        assert_eq!(
            played.lock().unwrap().as_slice(),
            &[dir.path().join("recording_20240101_120000.wav")]
        );
    }

    #[tokio::test]
    async fn test_playback_blocks_until_completion() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("recording_20240101_100000.wav"), b"").unwrap();

        let levels = Levels::new(false, false);
        let audio = FakeAudio::new();
        let (gate_tx, gate_rx) = oneshot::channel();
        *audio.gate.lock().unwrap() = Some(gate_rx);
        let mut machine = machine_with(dir.path(), levels, audio);

        assert_eq!(machine.tick().await.unwrap(), MachineState::Playback);

        let task = tokio::spawn(async move {
            let state = machine.tick().await.unwrap();
            (machine, state)
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished(), "tick returned before playback completed");

        gate_tx.send(()).unwrap();
        let (machine, state) = task.await.unwrap();
        assert_eq!(state, MachineState::AwaitingHangup);
        assert_eq!(machine.state(), MachineState::AwaitingHangup);
    }

    #[tokio::test]
    async fn test_unresolved_device_does_not_disturb_flow() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("recording_20240101_100000.wav"), b"").unwrap();

        let levels = Levels::new(false, false);
        let mut audio = FakeAudio::new();
        audio.resolve_device = false;
        let played = audio.played.clone();
        let mut machine = machine_with(dir.path(), levels.clone(), audio);

        assert_eq!(machine.tick().await.unwrap(), MachineState::Playback);
        assert_eq!(machine.tick().await.unwrap(), MachineState::AwaitingHangup);
        assert!(played.lock().unwrap().is_empty());

        levels.set(true, true);
        assert_eq!(machine.tick().await.unwrap(), MachineState::Idle);
    }

    #[tokio::test]
    async fn test_unresolved_device_still_records() {
        // A missing playback device must not stop message capture.
        let dir = tempfile::tempdir().unwrap();
        let levels = Levels::new(false, true);
        let mut audio = FakeAudio::new();
        audio.resolve_device = false;
        let mut machine = machine_with(dir.path(), levels.clone(), audio);

        assert_eq!(machine.tick().await.unwrap(), MachineState::Prompting);
        assert_eq!(machine.tick().await.unwrap(), MachineState::Recording);
        machine.tick().await.unwrap();
        levels.set(true, true);
        assert_eq!(machine.tick().await.unwrap(), MachineState::Idle);

        let count = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("recording_"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", MachineState::Idle), "idle");
        assert_eq!(format!("{}", MachineState::Recording), "recording");
        assert_eq!(format!("{}", MachineState::AwaitingHangup), "awaiting hangup");
    }
}
