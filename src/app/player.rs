use tracing::{debug, warn};

use crate::error::PlaybackError;

/// Below this position a fresh stream counts as "not yet played".
const RESUME_THRESHOLD_MS: u64 = 1000;

/// Millisecond-based control surface of a media player.
pub(crate) trait MediaBackend {
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self) -> Result<(), PlaybackError>;
    fn stop(&mut self) -> Result<(), PlaybackError>;
    fn time_ms(&mut self) -> Result<u64, PlaybackError>;
    fn set_time_ms(&mut self, ms: u64) -> Result<(), PlaybackError>;
    /// 0 while the length is unknown.
    fn length_ms(&mut self) -> Result<u64, PlaybackError>;
}

pub(crate) trait MediaOpener {
    fn open(&mut self, stream_url: &str) -> Result<Box<dyn MediaBackend>, PlaybackError>;
}

/// Final position of a stopped session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StoppedAt {
    pub(crate) position_ms: u64,
    pub(crate) duration_ms: u64,
}

/// Exclusive owner of one player handle, bound to one episode stream.
pub(crate) struct PlaybackController {
    backend: Box<dyn MediaBackend>,
    resume_ms: u64,
    resume_checked: bool,
    playing: bool,
    stopped: bool,
}

impl PlaybackController {
    pub(crate) fn new(backend: Box<dyn MediaBackend>, resume_ms: u64) -> Self {
        Self {
            backend,
            resume_ms,
            resume_checked: false,
            playing: false,
            stopped: false,
        }
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.playing
    }

    /// True once `play()` has been called at least once.
    pub(crate) fn has_started(&self) -> bool {
        self.resume_checked
    }

    pub(crate) fn play(&mut self) -> Result<(), PlaybackError> {
        if !self.resume_checked {
            self.resume_checked = true;
            if self.resume_ms > 0 && self.backend.time_ms()? < RESUME_THRESHOLD_MS {
                debug!(resume_ms = self.resume_ms, "resuming from stored position");
                self.backend.set_time_ms(self.resume_ms)?;
            }
        }
        self.backend.play()?;
        self.playing = true;
        Ok(())
    }

    pub(crate) fn pause(&mut self) -> Result<(), PlaybackError> {
        self.backend.pause()?;
        self.playing = false;
        Ok(())
    }

    pub(crate) fn toggle(&mut self) -> Result<(), PlaybackError> {
        if self.playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Moves by `delta_ms`. Targets before the start clamp to 0; targets at
    /// or past the end are ignored.
    pub(crate) fn seek(&mut self, delta_ms: i64) -> Result<(), PlaybackError> {
        let position = self.backend.time_ms()?;
        let duration = self.backend.length_ms()?;
        let target = i64::try_from(position)
            .unwrap_or(i64::MAX)
            .saturating_add(delta_ms);

        if target <= 0 {
            self.backend.set_time_ms(0)
        } else if (target as u64) < duration {
            self.backend.set_time_ms(target as u64)
        } else {
            debug!(target, duration, "seek past end ignored");
            Ok(())
        }
    }

    pub(crate) fn position_ms(&mut self) -> Result<u64, PlaybackError> {
        self.backend.time_ms()
    }

    pub(crate) fn duration_ms(&mut self) -> Result<u64, PlaybackError> {
        self.backend.length_ms()
    }

    /// Reads the final position, then stops and releases the player.
    pub(crate) fn stop(mut self) -> Result<StoppedAt, PlaybackError> {
        let position_ms = self.backend.time_ms()?;
        let duration_ms = self.backend.length_ms()?;
        self.stopped = true;
        self.backend.stop()?;
        Ok(StoppedAt {
            position_ms,
            duration_ms,
        })
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        if let Err(err) = self.backend.stop() {
            warn!("failed to stop abandoned player: {err}");
        }
    }
}

#[cfg(not(unix))]
pub(crate) struct UnsupportedOpener;

#[cfg(not(unix))]
impl MediaOpener for UnsupportedOpener {
    fn open(&mut self, _stream_url: &str) -> Result<Box<dyn MediaBackend>, PlaybackError> {
        Err(PlaybackError::Unsupported)
    }
}
