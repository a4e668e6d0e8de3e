use anyhow::Result;
use tracing::{debug, error, warn};

use crate::error::{PersistenceError, PlaybackError};
use crate::feed::{Catalog, Episode, Feed};
use crate::http::StreamResolver;
use crate::store::ListenStore;

use super::player::{MediaOpener, PlaybackController};
use super::screen::{
    ChoiceOutcome, ChoiceScreen, Interaction, PlayerCommand, PlayerView, format_clock,
    status_error, status_info,
};

const MAX_DEPTH: usize = 3;

/// One screen on the navigation stack, with the selection it was entered for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Frame<'a> {
    ShowList,
    EpisodeList {
        feed: &'a Feed,
    },
    Player {
        feed: &'a Feed,
        episode: &'a Episode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    ShowList,
    EpisodeList,
    Player,
}

impl Frame<'_> {
    pub(crate) fn kind(&self) -> FrameKind {
        match self {
            Self::ShowList => FrameKind::ShowList,
            Self::EpisodeList { .. } => FrameKind::EpisodeList,
            Self::Player { .. } => FrameKind::Player,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Selection<'a> {
    Show(&'a Feed),
    Episode(&'a Episode),
}

/// What a screen handler decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Action<'a> {
    Select(Selection<'a>),
    Back,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Pushed(FrameKind),
    Popped(FrameKind),
    /// Player frame left through "Shows": popped back down to the show list.
    Unwound { popped: usize },
    Ignored,
}

/// Push/pop-only stack of frames, starting at `[ShowList]`.
#[derive(Debug, Clone)]
pub(crate) struct NavigationStack<'a> {
    frames: Vec<Frame<'a>>,
}

impl<'a> NavigationStack<'a> {
    pub(crate) fn new() -> Self {
        let mut frames = Vec::with_capacity(MAX_DEPTH);
        frames.push(Frame::ShowList);
        Self { frames }
    }

    pub(crate) fn top(&self) -> Option<Frame<'a>> {
        self.frames.last().copied()
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub(crate) fn kinds(&self) -> Vec<FrameKind> {
        self.frames.iter().map(Frame::kind).collect()
    }

    pub(crate) fn apply(&mut self, action: Action<'a>) -> Transition {
        let Some(top) = self.top() else {
            return Transition::Ignored;
        };

        match (top, action) {
            (Frame::ShowList, Action::Select(Selection::Show(feed))) => {
                self.push(Frame::EpisodeList { feed })
            }
            (Frame::EpisodeList { feed }, Action::Select(Selection::Episode(episode))) => {
                self.push(Frame::Player { feed, episode })
            }
            (Frame::ShowList, Action::Back) => Transition::Ignored,
            (Frame::ShowList, Action::Cancel)
            | (Frame::EpisodeList { .. }, Action::Back | Action::Cancel)
            | (Frame::Player { .. }, Action::Back) => self.pop(),
            (Frame::Player { .. }, Action::Cancel) => self.unwind_to_show_list(),
            (frame, Action::Select(selection)) => {
                warn!(frame = ?frame.kind(), ?selection, "selection does not fit the current screen");
                Transition::Ignored
            }
        }
    }

    fn push(&mut self, frame: Frame<'a>) -> Transition {
        if self.frames.len() >= MAX_DEPTH {
            warn!(frame = ?frame.kind(), "navigation stack full; push ignored");
            return Transition::Ignored;
        }
        let kind = frame.kind();
        self.frames.push(frame);
        Transition::Pushed(kind)
    }

    fn pop(&mut self) -> Transition {
        match self.frames.pop() {
            Some(frame) => Transition::Popped(frame.kind()),
            None => Transition::Ignored,
        }
    }

    fn unwind_to_show_list(&mut self) -> Transition {
        let mut popped = 0;
        while let Some(frame) = self.top() {
            if frame.kind() == FrameKind::ShowList {
                break;
            }
            self.frames.pop();
            popped += 1;
        }
        Transition::Unwound { popped }
    }
}

/// Skip distance in milliseconds, saturating for absurd configured values.
fn skip_delta_ms(skip_secs: u64) -> i64 {
    i64::try_from(skip_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}

/// Drives the screen handlers until the stack runs empty.
pub(crate) struct Navigator<'a, 'c> {
    catalog: &'a Catalog,
    store: &'c mut ListenStore,
    ui: &'c mut dyn Interaction,
    media: &'c mut dyn MediaOpener,
    resolver: &'c dyn StreamResolver,
    skip_secs: u64,
}

impl<'a, 'c> Navigator<'a, 'c> {
    pub(crate) fn new(
        catalog: &'a Catalog,
        store: &'c mut ListenStore,
        ui: &'c mut dyn Interaction,
        media: &'c mut dyn MediaOpener,
        resolver: &'c dyn StreamResolver,
        skip_secs: u64,
    ) -> Self {
        Self {
            catalog,
            store,
            ui,
            media,
            resolver,
            skip_secs,
        }
    }

    pub(crate) fn run(&mut self) -> Result<()> {
        let mut stack = NavigationStack::new();
        while let Some(frame) = stack.top() {
            let action = match frame {
                Frame::ShowList => self.show_list()?,
                Frame::EpisodeList { feed } => self.episode_list(feed)?,
                Frame::Player { feed, episode } => self.player(feed, episode)?,
            };
            let transition = stack.apply(action);
            debug!(?transition, depth = stack.depth(), stack = ?stack.kinds(), "navigation");
        }
        debug_assert!(stack.is_empty());
        Ok(())
    }

    fn show_list(&mut self) -> Result<Action<'a>> {
        let catalog = self.catalog;
        let labels = catalog.labels();
        let screen = ChoiceScreen {
            heading: "Shows",
            items: &labels,
            back_label: "Exit",
        };
        let action = match self.ui.show_choice(&screen)? {
            ChoiceOutcome::Ok(index) => match catalog.feeds().get(index) {
                Some(feed) => Action::Select(Selection::Show(feed)),
                None => Action::Back,
            },
            ChoiceOutcome::Cancel => Action::Cancel,
            ChoiceOutcome::Prev => Action::Back,
        };
        Ok(action)
    }

    fn episode_list(&mut self, feed: &'a Feed) -> Result<Action<'a>> {
        let labels: Vec<String> = feed
            .episodes
            .iter()
            .map(|episode| match self.store.get(&episode.title) {
                0 => episode.title.clone(),
                elapsed => format!("{}  [{}]", episode.title, format_clock(elapsed)),
            })
            .collect();
        let screen = ChoiceScreen {
            heading: &feed.title,
            items: &labels,
            back_label: "Back",
        };
        let action = match self.ui.show_choice(&screen)? {
            ChoiceOutcome::Ok(index) => match feed.episodes.get(index) {
                Some(episode) => Action::Select(Selection::Episode(episode)),
                None => Action::Back,
            },
            ChoiceOutcome::Cancel => Action::Cancel,
            ChoiceOutcome::Prev => Action::Back,
        };
        Ok(action)
    }

    /// Playback and persistence failures end the screen with an error
    /// status and land back on the show list; anything else is fatal.
    fn player(&mut self, feed: &'a Feed, episode: &'a Episode) -> Result<Action<'a>> {
        match self.play_episode(feed, episode) {
            Ok(action) => Ok(action),
            Err(err)
                if err.is::<PlaybackError>() || err.is::<PersistenceError>() =>
            {
                error!(episode = %episode.title, "player screen failed: {err:#}");
                self.ui.notify(status_error(&format!("{}: {err}", episode.title)));
                Ok(Action::Cancel)
            }
            Err(err) => Err(err),
        }
    }

    fn play_episode(&mut self, feed: &'a Feed, episode: &'a Episode) -> Result<Action<'a>> {
        self.store.refresh()?;
        let resume_ms = self.store.get(&episode.title);

        let link = episode
            .audio_link()
            .ok_or_else(|| PlaybackError::NoAudioLink {
                title: episode.title.clone(),
            })?;
        let stream_url = self.resolver.resolve(&link.url)?;
        let backend = self.media.open(&stream_url)?;
        let mut controller = PlaybackController::new(backend, resume_ms);
        let skip_ms = skip_delta_ms(self.skip_secs);

        loop {
            let view = PlayerView {
                show: &feed.title,
                episode: &episode.title,
                playing: controller.is_playing(),
                started: controller.has_started(),
                position_ms: controller.position_ms()?,
                duration_ms: controller.duration_ms()?,
                resume_ms,
                skip_secs: self.skip_secs,
            };
            let Some(command) = self.ui.player_input(&view)? else {
                continue;
            };

            match command {
                PlayerCommand::PlayPause => controller.toggle()?,
                PlayerCommand::SkipBack => controller.seek(-skip_ms)?,
                PlayerCommand::SkipForward => controller.seek(skip_ms)?,
                PlayerCommand::Back if !controller.has_started() => {
                    controller.stop()?;
                    return Ok(Action::Back);
                }
                PlayerCommand::Back | PlayerCommand::Shows => break,
            }
        }

        let stopped = controller.stop()?;
        let stored = self
            .store
            .put(&episode.title, stopped.position_ms, stopped.duration_ms)?;
        let message = if stored == 0 {
            format!("Finished {}", episode.title)
        } else {
            format!("Saved {} at {}", episode.title, format_clock(stored))
        };
        self.ui.notify(status_info(&message));
        Ok(Action::Cancel)
    }
}
