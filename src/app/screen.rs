use anyhow::Result;

/// Result of a single-selection list screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChoiceOutcome {
    Ok(usize),
    Cancel,
    Prev,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ChoiceScreen<'a> {
    pub(crate) heading: &'a str,
    pub(crate) items: &'a [String],
    pub(crate) back_label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlayerCommand {
    PlayPause,
    SkipBack,
    SkipForward,
    Shows,
    Back,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PlayerView<'a> {
    pub(crate) show: &'a str,
    pub(crate) episode: &'a str,
    pub(crate) playing: bool,
    pub(crate) started: bool,
    pub(crate) position_ms: u64,
    pub(crate) duration_ms: u64,
    pub(crate) resume_ms: u64,
    pub(crate) skip_secs: u64,
}

/// The widget layer as seen by the navigator.
pub(crate) trait Interaction {
    fn show_choice(&mut self, screen: &ChoiceScreen<'_>) -> Result<ChoiceOutcome>;

    /// Draws the player and waits briefly for input; `None` means the poll
    /// timed out and the caller should refresh the view.
    fn player_input(&mut self, view: &PlayerView<'_>) -> Result<Option<PlayerCommand>>;

    fn notify(&mut self, status: String);
}

pub(crate) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(crate) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

pub(crate) fn format_clock(ms: u64) -> String {
    let total_secs = ms / 1000;
    let (hours, minutes, seconds) = (total_secs / 3600, (total_secs / 60) % 60, total_secs % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}
