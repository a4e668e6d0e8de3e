mod render;
mod session;

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseButton, MouseEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;

use super::screen::{ChoiceOutcome, ChoiceScreen, Interaction, PlayerCommand, PlayerView};

use self::render::{HitAreas, Pill, draw_choice, draw_player};
use self::session::TuiSession;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Button row of the player screen, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlayerControl {
    PlayPause,
    SkipBack,
    SkipForward,
    Back,
    Shows,
}

impl PlayerControl {
    pub(crate) const ALL: [Self; 5] = [
        Self::PlayPause,
        Self::SkipBack,
        Self::SkipForward,
        Self::Back,
        Self::Shows,
    ];

    pub(crate) fn label(self, playing: bool, skip_secs: u64) -> String {
        match self {
            Self::PlayPause if playing => "PAUSE".to_string(),
            Self::PlayPause => "PLAY".to_string(),
            Self::SkipBack => format!("-{skip_secs}s"),
            Self::SkipForward => format!("+{skip_secs}s"),
            Self::Back => "BACK".to_string(),
            Self::Shows => "SHOWS".to_string(),
        }
    }

    pub(crate) fn command(self) -> PlayerCommand {
        match self {
            Self::PlayPause => PlayerCommand::PlayPause,
            Self::SkipBack => PlayerCommand::SkipBack,
            Self::SkipForward => PlayerCommand::SkipForward,
            Self::Back => PlayerCommand::Back,
            Self::Shows => PlayerCommand::Shows,
        }
    }

    pub(crate) fn move_left(self) -> Self {
        match self {
            Self::PlayPause | Self::SkipBack => Self::PlayPause,
            Self::SkipForward => Self::SkipBack,
            Self::Back => Self::SkipForward,
            Self::Shows => Self::Back,
        }
    }

    pub(crate) fn move_right(self) -> Self {
        match self {
            Self::PlayPause => Self::SkipBack,
            Self::SkipBack => Self::SkipForward,
            Self::SkipForward => Self::Back,
            Self::Back | Self::Shows => Self::Shows,
        }
    }
}

/// Status line text. A message stays until the next accepted input.
#[derive(Debug, Default)]
struct StatusLine {
    text: String,
}

impl StatusLine {
    fn show(&mut self, text: String) {
        self.text = text;
    }

    fn as_str(&self) -> &str {
        &self.text
    }

    /// Clears the message once `input` produced an outcome.
    fn settle<T>(&mut self, input: Option<T>) -> Option<T> {
        if input.is_some() {
            self.text.clear();
        }
        input
    }
}

/// Full-screen ratatui front end.
pub(crate) struct TuiInteraction {
    session: TuiSession,
    terminal: Terminal<CrosstermBackend<Stdout>>,
    status: StatusLine,
    focus: PlayerControl,
}

impl TuiInteraction {
    pub(crate) fn start(status: String) -> Result<Self> {
        let session = TuiSession::enter()?;
        let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
            .context("failed to initialize terminal backend")?;
        terminal.clear()?;
        Ok(Self {
            session,
            terminal,
            status: StatusLine { text: status },
            focus: PlayerControl::PlayPause,
        })
    }

    pub(crate) fn finish(mut self) -> Result<()> {
        self.terminal.show_cursor()?;
        self.session.leave()
    }
}

impl Interaction for TuiInteraction {
    fn show_choice(&mut self, screen: &ChoiceScreen<'_>) -> Result<ChoiceOutcome> {
        let mut list_state = ListState::default();
        list_state.select((!screen.items.is_empty()).then_some(0));
        self.focus = PlayerControl::PlayPause;

        let len = screen.items.len();
        loop {
            let status = self.status.as_str();
            let mut hits = HitAreas::default();
            self.terminal
                .draw(|frame| hits = draw_choice(frame, screen, &mut list_state, status))?;

            if !event::poll(POLL_INTERVAL)? {
                continue;
            }
            let outcome = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    choice_key(key.code, &mut list_state, len)
                }
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => choice_key(KeyCode::Up, &mut list_state, len),
                    MouseEventKind::ScrollDown => choice_key(KeyCode::Down, &mut list_state, len),
                    MouseEventKind::Down(MouseButton::Left) => {
                        choice_click(&hits, mouse.column, mouse.row, &mut list_state, len)
                    }
                    _ => None,
                },
                _ => None,
            };
            if let Some(outcome) = self.status.settle(outcome) {
                return Ok(outcome);
            }
        }
    }

    fn player_input(&mut self, view: &PlayerView<'_>) -> Result<Option<PlayerCommand>> {
        let status = self.status.as_str();
        let focus = self.focus;
        let mut hits = HitAreas::default();
        self.terminal
            .draw(|frame| hits = draw_player(frame, view, focus, status))?;

        if !event::poll(POLL_INTERVAL)? {
            return Ok(None);
        }
        let command = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                player_key(key.code, &mut self.focus)
            }
            Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                player_click(&hits, mouse.column, mouse.row, &mut self.focus)
            }
            _ => None,
        };
        Ok(self.status.settle(command))
    }

    fn notify(&mut self, status: String) {
        self.status.show(status);
    }
}

fn choice_key(code: KeyCode, list_state: &mut ListState, len: usize) -> Option<ChoiceOutcome> {
    match code {
        KeyCode::Up => {
            if let Some(selected) = list_state.selected() {
                list_state.select(Some(selected.saturating_sub(1)));
            }
            None
        }
        KeyCode::Down => {
            if let Some(selected) = list_state.selected()
                && len > 0
            {
                list_state.select(Some((selected + 1).min(len - 1)));
            }
            None
        }
        KeyCode::Home => {
            list_state.select((len > 0).then_some(0));
            None
        }
        KeyCode::End => {
            list_state.select(len.checked_sub(1));
            None
        }
        KeyCode::Enter => list_state
            .selected()
            .filter(|selected| *selected < len)
            .map(ChoiceOutcome::Ok),
        KeyCode::Esc | KeyCode::Char('q') => Some(ChoiceOutcome::Cancel),
        KeyCode::Backspace | KeyCode::Left => Some(ChoiceOutcome::Prev),
        _ => None,
    }
}

/// A click on a row picks it; the pills act like their keys.
fn choice_click(
    hits: &HitAreas,
    column: u16,
    row: u16,
    list_state: &mut ListState,
    len: usize,
) -> Option<ChoiceOutcome> {
    if let Some(index) = hits.row_at(column, row, list_state.offset()) {
        if index >= len {
            return None;
        }
        list_state.select(Some(index));
        return Some(ChoiceOutcome::Ok(index));
    }
    match hits.pill_at(column, row)? {
        Pill::Select => choice_key(KeyCode::Enter, list_state, len),
        Pill::Leave => Some(ChoiceOutcome::Cancel),
        Pill::Control(_) => None,
    }
}

fn player_click(
    hits: &HitAreas,
    column: u16,
    row: u16,
    focus: &mut PlayerControl,
) -> Option<PlayerCommand> {
    match hits.pill_at(column, row)? {
        Pill::Control(control) => {
            *focus = control;
            Some(control.command())
        }
        Pill::Select | Pill::Leave => None,
    }
}

fn player_key(code: KeyCode, focus: &mut PlayerControl) -> Option<PlayerCommand> {
    match code {
        KeyCode::Char(' ') => Some(PlayerCommand::PlayPause),
        KeyCode::Left => {
            *focus = focus.move_left();
            None
        }
        KeyCode::Right => {
            *focus = focus.move_right();
            None
        }
        KeyCode::Enter => Some(focus.command()),
        KeyCode::Char('-' | '[') => Some(PlayerCommand::SkipBack),
        KeyCode::Char('+' | '=' | ']') => Some(PlayerCommand::SkipForward),
        KeyCode::Char('b') | KeyCode::Backspace => Some(PlayerCommand::Back),
        KeyCode::Char('s' | 'q') | KeyCode::Esc => Some(PlayerCommand::Shows),
        _ => None,
    }
}
