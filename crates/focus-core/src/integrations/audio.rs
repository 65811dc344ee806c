//! Alert and ambient sound playback with rodio.
//!
//! A dedicated thread owns the output stream, which is not `Send`; the
//! engine only sends it commands, so decoding never stalls the countdown.
//! The ambient track loops on its own sink and pauses in place.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, warn};

use super::traits::SoundPlayer;
use crate::config::{validate_sound, Paths, SOUND_EXTENSIONS};
use crate::error::{CoreError, Result};

enum AudioCommand {
    Alert(PathBuf),
    StartAmbient(PathBuf),
    StopAmbient,
    PauseAmbient,
    ResumeAmbient,
}

/// Path of a sound file inside `dir`. Bare names mean `.ogg`.
pub fn resolve_sound(dir: &Path, name: &str) -> Result<PathBuf> {
    let file = validate_sound(name)?;
    let path = dir.join(&file);
    if !path.is_file() {
        return Err(CoreError::AudioFailure(format!("unknown sound: {file}")));
    }
    Ok(path)
}

/// Sound names (file stems) available in `dir`, sorted.
pub fn list_sounds(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SOUND_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    names.dedup();
    names
}

fn audio_err(e: impl std::fmt::Display) -> CoreError {
    CoreError::AudioFailure(e.to_string())
}

/// Play `file` once on a detached sink.
fn play_once(handle: &OutputStreamHandle, file: &Path) -> Result<()> {
    let sink = Sink::try_new(handle).map_err(audio_err)?;
    let source = Decoder::new(BufReader::new(File::open(file)?)).map_err(audio_err)?;
    sink.append(source);
    sink.detach();
    Ok(())
}

/// Loop `file` on a sink of its own until it is stopped.
fn play_looped(handle: &OutputStreamHandle, file: &Path) -> Result<Sink> {
    let sink = Sink::try_new(handle).map_err(audio_err)?;
    let source = Decoder::new_looped(BufReader::new(File::open(file)?)).map_err(audio_err)?;
    sink.append(source);
    Ok(sink)
}

/// Handle to the audio thread.
pub struct AudioPlayer {
    tx: Sender<AudioCommand>,
    alert_dir: PathBuf,
    ambient_dir: PathBuf,
}

impl AudioPlayer {
    /// Start the audio thread on the default output device.
    ///
    /// # Errors
    /// [`CoreError::AudioFailure`] if no output device can be opened.
    pub fn spawn(paths: &Paths) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<std::result::Result<(), String>>(1);

        thread::Builder::new()
            .name("focus-audio".to_string())
            .spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => {
                        let _ = ready_tx.send(Ok(()));
                        pair
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let mut ambient: Option<Sink> = None;

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Alert(file) => {
                            if let Err(e) = play_once(&handle, &file) {
                                warn!(error = %e, file = %file.display(), "failed to play alert");
                            }
                        }
                        AudioCommand::StartAmbient(file) => {
                            if let Some(old) = ambient.take() {
                                old.stop();
                            }
                            match play_looped(&handle, &file) {
                                Ok(sink) => ambient = Some(sink),
                                Err(e) => {
                                    warn!(error = %e, file = %file.display(), "failed to play ambient sound")
                                }
                            }
                        }
                        AudioCommand::StopAmbient => {
                            if let Some(old) = ambient.take() {
                                old.stop();
                            }
                        }
                        AudioCommand::PauseAmbient => {
                            if let Some(sink) = &ambient {
                                sink.pause();
                            }
                        }
                        AudioCommand::ResumeAmbient => {
                            if let Some(sink) = &ambient {
                                sink.play();
                            }
                        }
                    }
                }
                debug!("audio thread stopped");
            })?;

        ready_rx
            .recv()
            .map_err(|_| audio_err("audio thread exited during startup"))?
            .map_err(|e| audio_err(format!("no audio output: {e}")))?;

        Ok(Self {
            tx,
            alert_dir: paths.alert_sound_dir(),
            ambient_dir: paths.ambient_sound_dir(),
        })
    }

    fn send(&self, cmd: AudioCommand) -> Result<()> {
        self.tx
            .send(cmd)
            .map_err(|_| audio_err("audio thread is gone"))
    }
}

impl SoundPlayer for AudioPlayer {
    fn play_alert(&self, sound: &str) -> Result<()> {
        let file = resolve_sound(&self.alert_dir, sound)?;
        self.send(AudioCommand::Alert(file))
    }

    fn start_ambient(&self, sound: &str) -> Result<()> {
        let file = resolve_sound(&self.ambient_dir, sound)?;
        self.send(AudioCommand::StartAmbient(file))
    }

    fn stop_ambient(&self) -> Result<()> {
        self.send(AudioCommand::StopAmbient)
    }

    fn pause_ambient(&self) -> Result<()> {
        self.send(AudioCommand::PauseAmbient)
    }

    fn resume_ambient(&self) -> Result<()> {
        self.send(AudioCommand::ResumeAmbient)
    }
}
