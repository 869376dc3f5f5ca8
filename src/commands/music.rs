//! Music playback through the desktop's default handlers

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;

use super::{Command, CommandContext};
use crate::config::MusicConfig;
use crate::{Error, Result};

/// Opens files and URLs with whatever the desktop associates with them
pub trait Launcher: Send + Sync {
    /// Open `target` without waiting for the handler to exit
    ///
    /// # Errors
    ///
    /// Returns error if no handler could be started
    fn open(&self, target: &str) -> Result<()>;
}

/// Opener program and the arguments preceding the target
#[cfg(target_os = "macos")]
const OPENER: (&str, &[&str]) = ("open", &[]);
#[cfg(target_os = "windows")]
const OPENER: (&str, &[&str]) = ("cmd", &["/C", "start", ""]);
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const OPENER: (&str, &[&str]) = ("xdg-open", &[]);

/// Launcher using the platform opener command
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open(&self, target: &str) -> Result<()> {
        let (program, args) = OPENER;
        let program = which::which(program)
            .map_err(|e| Error::Command(format!("{program} not available: {e}")))?;

        std::process::Command::new(program)
            .args(args)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        tracing::debug!(target, "opened with system handler");
        Ok(())
    }
}

/// "play music"
pub struct MusicCommand {
    directory: PathBuf,
    extensions: Vec<String>,
    fallback_url: String,
    launcher: Box<dyn Launcher>,
}

impl MusicCommand {
    #[must_use]
    pub fn from_config(config: &MusicConfig, launcher: Box<dyn Launcher>) -> Self {
        Self {
            directory: config.directory.clone(),
            extensions: config.extensions.clone(),
            fallback_url: config.fallback_url.clone(),
            launcher,
        }
    }

    /// Playable files in the music directory, sorted by name
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be read
    pub fn tracks(&self) -> Result<Vec<PathBuf>> {
        let mut tracks = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.is_file() && self.is_playable(&path) {
                tracks.push(path);
            }
        }
        tracks.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(tracks)
    }

    fn is_playable(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|allowed| *allowed == ext)
            })
    }
}

#[async_trait]
impl Command for MusicCommand {
    fn name(&self) -> &'static str {
        "music"
    }

    fn matches(&self, utterance: &str) -> bool {
        utterance.contains("play music")
    }

    async fn handle(&self, _utterance: &str, ctx: &CommandContext) -> Result<()> {
        let tracks = self.tracks()?;

        if let Some(track) = tracks.first() {
            tracing::info!(track = %track.display(), "playing music");
            self.launcher.open(&track.to_string_lossy())?;
            ctx.announce("🎶 Playing music.", "Playing music.").await;
        } else {
            tracing::info!(directory = %self.directory.display(), "no music files found");
            self.launcher.open(&self.fallback_url)?;
            ctx.announce(
                "🎶 No music files found. Opening music in the browser.",
                "No music files found. Opening music in the browser.",
            )
            .await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::DEFAULT_MUSIC_URL;

    #[derive(Clone, Default)]
    struct RecordingLauncher {
        opened: Arc<Mutex<Vec<String>>>,
    }

    impl Launcher for RecordingLauncher {
        fn open(&self, target: &str) -> Result<()> {
            self.opened.lock().unwrap().push(target.to_string());
            Ok(())
        }
    }

    fn command(dir: &Path) -> (MusicCommand, RecordingLauncher) {
        let launcher = RecordingLauncher::default();
        let config = MusicConfig {
            directory: dir.to_path_buf(),
            ..MusicConfig::default()
        };
        (
            MusicCommand::from_config(&config, Box::new(launcher.clone())),
            launcher,
        )
    }

    #[test]
    fn test_tracks_filtered_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp3", "a.WAV", "notes.txt", "c.flac"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("d.mp3")).unwrap();

        let (cmd, _) = command(dir.path());
        let names: Vec<_> = cmd
            .tracks()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.WAV", "b.mp3"]);
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let (cmd, _) = command(&dir.path().join("missing"));
        assert!(matches!(cmd.tracks(), Err(Error::Io(_))));
    }

    #[test]
    fn test_empty_directory_has_no_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let (cmd, launcher) = command(dir.path());
        assert!(cmd.tracks().unwrap().is_empty());
        assert!(launcher.opened.lock().unwrap().is_empty());
        assert_eq!(cmd.fallback_url, DEFAULT_MUSIC_URL);
    }
}
