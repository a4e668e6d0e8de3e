use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Clear, Gauge, List, ListItem, ListState, Padding, Paragraph, Wrap,
};

use super::super::screen::{ChoiceScreen, PlayerView, format_clock, truncate};
use super::PlayerControl;

/// Pill buttons that react to a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Pill {
    Select,
    Leave,
    Control(PlayerControl),
}

/// Clickable regions of the last drawn frame.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(super) struct HitAreas {
    /// List rows, inside the panel border.
    pub(super) rows: Option<Rect>,
    pub(super) pills: Vec<(Rect, Pill)>,
}

impl HitAreas {
    /// List index under the cell, given the list's scroll offset.
    pub(super) fn row_at(&self, column: u16, row: u16, offset: usize) -> Option<usize> {
        let rows = self.rows?;
        rows.contains(Position::new(column, row))
            .then(|| offset + usize::from(row - rows.y))
    }

    pub(super) fn pill_at(&self, column: u16, row: u16) -> Option<Pill> {
        self.pills
            .iter()
            .find(|(area, _)| area.contains(Position::new(column, row)))
            .map(|(_, pill)| *pill)
    }
}

pub(super) fn draw_choice(
    frame: &mut Frame,
    screen: &ChoiceScreen<'_>,
    list_state: &mut ListState,
    status: &str,
) -> HitAreas {
    let chunks = base_layout(frame, Constraint::Min(6));

    let selected_text = list_state
        .selected()
        .filter(|_| !screen.items.is_empty())
        .map(|idx| (idx + 1).to_string())
        .unwrap_or_else(|| "-".to_string());
    let header = header_line(vec![
        Span::styled(
            truncate(screen.heading, 48),
            Style::default().fg(Color::Rgb(230, 235, 242)),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("{} entries", screen.items.len()),
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("selected {selected_text}"),
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
    ]);
    frame.render_widget(header, chunks[0]);

    let items: Vec<ListItem> = screen
        .items
        .iter()
        .map(|item| ListItem::new(item.as_str()))
        .collect();
    let list = List::new(items)
        .block(panel_block("Select"))
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .highlight_style(pill_active())
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, chunks[1], list_state);

    let mut hits = HitAreas {
        rows: Some(panel_block("Select").inner(chunks[1])),
        pills: Vec::new(),
    };
    let line = pill_line(
        chunks[2],
        vec![
            (Span::styled(" OK ", pill_active()), Some(Pill::Select)),
            (Span::styled(" ", Style::default()), None),
            (
                Span::styled(format!(" {} ", screen.back_label.to_uppercase()), pill_inactive()),
                Some(Pill::Leave),
            ),
            (
                Span::styled(
                    "   ↑/↓ move  Enter select  Backspace back  Esc/q cancel",
                    Style::default().fg(Color::Rgb(185, 195, 210)),
                ),
                None,
            ),
        ],
        &mut hits.pills,
    );
    let controls = Paragraph::new(line)
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[2]);

    render_status(frame, chunks[3], status);

    if screen.items.is_empty() {
        let text = "Nothing to choose from.\n\nCheck the feed list, then press Esc.";
        render_notice(frame, text, "Empty");
        hits.rows = None;
    }
    hits
}

pub(super) fn draw_player(
    frame: &mut Frame,
    view: &PlayerView<'_>,
    focus: PlayerControl,
    status: &str,
) -> HitAreas {
    let chunks = base_layout(frame, Constraint::Min(9));

    let state_text = match (view.started, view.playing) {
        (false, _) => "ready",
        (true, true) => "playing",
        (true, false) => "paused",
    };
    let header = header_line(vec![
        Span::styled(
            truncate(view.show, 48),
            Style::default().fg(Color::Rgb(230, 235, 242)),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(state_text, Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(3)])
        .split(chunks[1]);

    let resume_text = if view.resume_ms > 0 {
        format_clock(view.resume_ms)
    } else {
        "start".to_string()
    };
    let details = Paragraph::new(format!(
        "Episode\n{}\n\nResume from\n{}",
        truncate(view.episode, 72),
        resume_text
    ))
    .style(Style::default().fg(Color::Rgb(230, 230, 230)))
    .wrap(Wrap { trim: true })
    .block(panel_block("Now Playing"));
    frame.render_widget(details, body[0]);

    let ratio = if view.duration_ms > 0 {
        (view.position_ms as f64 / view.duration_ms as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let label = if view.duration_ms > 0 {
        format!(
            "{} / {}",
            format_clock(view.position_ms),
            format_clock(view.duration_ms)
        )
    } else {
        format_clock(view.position_ms)
    };
    let progress = Gauge::default()
        .block(panel_block("Progress"))
        .gauge_style(
            Style::default()
                .fg(Color::Rgb(130, 190, 255))
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .label(label)
        .ratio(ratio);
    frame.render_widget(progress, body[1]);

    let mut hits = HitAreas::default();
    let line = pill_line(chunks[2], control_selector_parts(view, focus), &mut hits.pills);
    let controls = Paragraph::new(line)
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[2]);

    render_status(frame, chunks[3], status);
    hits
}

fn base_layout(frame: &mut Frame, body: Constraint) -> std::rc::Rc<[Rect]> {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            body,
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area())
}

fn header_line(mut spans: Vec<Span<'static>>) -> Paragraph<'static> {
    let mut line = vec![
        Span::styled(
            "TERMCAST",
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
    ];
    line.append(&mut spans);
    Paragraph::new(Line::from(line))
        .alignment(Alignment::Center)
        .block(panel_block("termcast"))
}

fn render_status(frame: &mut Frame, area: Rect, status: &str) {
    let status_widget = Paragraph::new(status.to_string())
        .style(status_style(status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, area);
}

fn render_notice(frame: &mut Frame, text: &str, title: &'static str) {
    let popup_area = popup_rect_for_text(frame.area(), text);
    render_popup_shadow(frame, popup_area);
    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new(text.to_string())
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(modal_block(title));
    frame.render_widget(popup, popup_area);
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn pill_active() -> Style {
    Style::default()
        .bg(Color::Rgb(110, 170, 255))
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn pill_inactive() -> Style {
    Style::default()
        .bg(Color::Rgb(72, 82, 96))
        .fg(Color::Rgb(230, 235, 242))
}

fn control_pill_style(control: PlayerControl, current: PlayerControl) -> Style {
    if control == current {
        pill_active()
    } else {
        pill_inactive()
    }
}

fn control_selector_parts(
    view: &PlayerView<'_>,
    current: PlayerControl,
) -> Vec<(Span<'static>, Option<Pill>)> {
    let mut parts = Vec::new();
    for control in PlayerControl::ALL {
        if !parts.is_empty() {
            parts.push((Span::styled(" ", Style::default()), None));
        }
        parts.push((
            Span::styled(
                format!(" {} ", control.label(view.playing, view.skip_secs)),
                control_pill_style(control, current),
            ),
            Some(Pill::Control(control)),
        ));
    }
    parts.push((
        Span::styled(
            "   ←/→ move  Enter run  Space play  b back  s shows",
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
        None,
    ));
    parts
}

/// Builds a centered line for a bordered panel at `area` and records where
/// each pill lands on screen.
fn pill_line(
    area: Rect,
    parts: Vec<(Span<'static>, Option<Pill>)>,
    pills: &mut Vec<(Rect, Pill)>,
) -> Line<'static> {
    let inner = panel_block("Controls").inner(area);
    let width: usize = parts.iter().map(|(span, _)| span.width()).sum();
    let width = u16::try_from(width).unwrap_or(u16::MAX);
    let mut x = inner.x + inner.width.saturating_sub(width) / 2;

    let mut spans = Vec::with_capacity(parts.len());
    for (span, pill) in parts {
        let span_width = u16::try_from(span.width()).unwrap_or(u16::MAX);
        if let Some(pill) = pill {
            let hit = Rect::new(x, inner.y, span_width, 1.min(inner.height)).intersection(inner);
            if !hit.is_empty() {
                pills.push((hit, pill));
            }
        }
        x = x.saturating_add(span_width);
        spans.push(span);
    }
    Line::from(spans)
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let max_line_width = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let line_count = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let min_width = 40.min(available_width);
    let max_width = 72.min(available_width);
    let width = max_line_width.saturating_add(12).clamp(min_width, max_width);

    let available_height = area.height.saturating_sub(2).max(1);
    let min_height = 7.min(available_height);
    let max_height = 14.min(available_height);
    let height = line_count.saturating_add(5).clamp(min_height, max_height);

    centered_fixed_rect(width, height, area)
}

#[cfg(test)]
mod tests {
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use super::*;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn choice_screen_lists_items_and_status() {
        let items = vec!["Show A - Updated 01 Jan 2024".to_string(), "Show B".to_string()];
        let screen = ChoiceScreen {
            heading: "Shows",
            items: &items,
            back_label: "Exit",
        };
        let mut state = ListState::default();
        state.select(Some(1));
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).expect("terminal");

        terminal
            .draw(|frame| {
                draw_choice(frame, &screen, &mut state, "INFO: Ready.");
            })
            .expect("draw");

        let text = buffer_text(&terminal);
        assert!(text.contains("Show A - Updated 01 Jan 2024"));
        assert!(text.contains("selected 2"));
        assert!(text.contains("EXIT"));
        assert!(text.contains("INFO: Ready."));
    }

    #[test]
    fn player_screen_shows_progress_and_focus() {
        let view = PlayerView {
            show: "Show A",
            episode: "Episode 2",
            playing: true,
            started: true,
            position_ms: 65_000,
            duration_ms: 600_000,
            resume_ms: 5_000,
            skip_secs: 10,
        };
        let mut terminal = Terminal::new(TestBackend::new(100, 22)).expect("terminal");

        terminal
            .draw(|frame| {
                draw_player(frame, &view, PlayerControl::Shows, "");
            })
            .expect("draw");

        let text = buffer_text(&terminal);
        assert!(text.contains("Episode 2"));
        assert!(text.contains("01:05 / 10:00"));
        assert!(text.contains("PAUSE"));
        assert!(text.contains("+10s"));
        assert!(text.contains("playing"));
    }

    /// Screen cell of the first occurrence of `needle`.
    fn locate(terminal: &Terminal<TestBackend>, needle: &str) -> (u16, u16) {
        let text = buffer_text(terminal);
        text.lines()
            .enumerate()
            .find_map(|(y, line)| {
                line.find(needle).map(|byte| {
                    let x = line[..byte].chars().count();
                    (x as u16, y as u16)
                })
            })
            .unwrap_or_else(|| panic!("{needle} not on screen"))
    }

    fn sample_view() -> PlayerView<'static> {
        PlayerView {
            show: "Show A",
            episode: "Episode 2",
            playing: false,
            started: false,
            position_ms: 0,
            duration_ms: 0,
            resume_ms: 0,
            skip_secs: 10,
        }
    }

    #[test]
    fn player_pills_are_hit_where_they_are_drawn() {
        let view = sample_view();
        let mut terminal = Terminal::new(TestBackend::new(100, 22)).expect("terminal");
        let mut hits = HitAreas::default();
        terminal
            .draw(|frame| hits = draw_player(frame, &view, PlayerControl::PlayPause, ""))
            .expect("draw");

        assert_eq!(hits.pills.len(), PlayerControl::ALL.len());
        for (label, control) in [
            ("PLAY", PlayerControl::PlayPause),
            ("-10s", PlayerControl::SkipBack),
            ("+10s", PlayerControl::SkipForward),
            ("BACK", PlayerControl::Back),
            ("SHOWS", PlayerControl::Shows),
        ] {
            let (x, y) = locate(&terminal, label);
            assert_eq!(hits.pill_at(x, y), Some(Pill::Control(control)), "{label}");
        }
        let (x, y) = locate(&terminal, "←/→ move");
        assert_eq!(hits.pill_at(x, y), None);
    }

    #[test]
    fn choice_rows_and_pills_are_hit_where_they_are_drawn() {
        let items = vec!["Show A".to_string(), "Show B".to_string(), "Show C".to_string()];
        let screen = ChoiceScreen {
            heading: "Shows",
            items: &items,
            back_label: "Exit",
        };
        let mut state = ListState::default();
        state.select(Some(0));
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).expect("terminal");
        let mut hits = HitAreas::default();
        terminal
            .draw(|frame| hits = draw_choice(frame, &screen, &mut state, ""))
            .expect("draw");

        let (x, y) = locate(&terminal, "Show C");
        assert_eq!(hits.row_at(x, y, state.offset()), Some(2));
        let (x, y) = locate(&terminal, " OK ");
        assert_eq!(hits.pill_at(x + 1, y), Some(Pill::Select));
        let (x, y) = locate(&terminal, "EXIT");
        assert_eq!(hits.pill_at(x, y), Some(Pill::Leave));
        assert_eq!(hits.row_at(0, 0, 0), None);
    }

    #[test]
    fn empty_choice_has_no_rows_to_click() {
        let items: Vec<String> = Vec::new();
        let screen = ChoiceScreen {
            heading: "Shows",
            items: &items,
            back_label: "Exit",
        };
        let mut state = ListState::default();
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).expect("terminal");
        let mut hits = HitAreas::default();
        terminal
            .draw(|frame| hits = draw_choice(frame, &screen, &mut state, ""))
            .expect("draw");

        assert_eq!(hits.rows, None);
        assert_eq!(hits.pills.len(), 2);
    }

    #[test]
    fn status_colors_follow_prefix() {
        assert_eq!(
            status_style("ERROR: boom").fg,
            Some(Color::Rgb(255, 145, 120))
        );
        assert_eq!(status_style("INFO: ok").fg, Some(Color::Rgb(205, 165, 255)));
    }
}
