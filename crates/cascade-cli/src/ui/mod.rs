//! TUI rendering: header, current card, status bar.

pub mod card;

use cascade_core::backend::FeedBackend;
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};

use crate::app::App;

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw<B: FeedBackend + 'static>(f: &mut Frame, app: &App<B>) {
  let area = f.area();

  // Vertical stack: header, body, status bar.
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(area);

  draw_header(f, rows[0], app);
  draw_body(f, rows[1], app);
  draw_status(f, rows[2], app);
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header<B: FeedBackend + 'static>(f: &mut Frame, area: Rect, app: &App<B>) {
  let session = &app.session;
  let subject = session.active_subject().unwrap_or("for you");
  let summary = session.summary();

  let left = Span::styled(
    format!(" cascade  {subject}"),
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  );
  let generating = if session.is_generating() { "generating…  " } else { "" };
  let right = Span::styled(
    format!("{generating}XP {} ", summary.summary_xp + summary.quiz_xp),
    Style::default().fg(Color::Gray),
  );

  // Simple left-right header: pad the middle.
  let left_width = left.content.chars().count() as u16;
  let right_width = right.content.chars().count() as u16;
  let pad = area
    .width
    .saturating_sub(left_width)
    .saturating_sub(right_width);

  let line = Line::from(vec![
    left,
    Span::raw(" ".repeat(pad as usize)),
    right,
  ]);

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(line), inner);
}

// ─── Body ─────────────────────────────────────────────────────────────────────

fn draw_body<B: FeedBackend + 'static>(f: &mut Frame, area: Rect, app: &App<B>) {
  let session = &app.session;
  match session.current_item() {
    Some(item) => card::draw(f, area, app, item),
    None => {
      let msg = if !session.is_loaded() {
        "Loading your feed…"
      } else if session.is_generating() {
        "Generating fresh content…"
      } else {
        "Nothing here yet. New cards will appear shortly."
      };
      let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
      let inner = block.inner(area);
      f.render_widget(block, area);
      f.render_widget(
        Paragraph::new(msg).style(Style::default().fg(Color::DarkGray)),
        inner,
      );
    }
  }
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status<B: FeedBackend + 'static>(f: &mut Frame, area: Rect, app: &App<B>) {
  let quiz = app.session.current_item().is_some_and(|i| i.is_quiz());
  let (mode_label, hints) = if app.session.has_subject_override() {
    ("CLASS", "↑↓/jk scroll  u/d vote  c leave class mode  q quit")
  } else if quiz {
    ("QUIZ", "1-9 answer  ↑↓/jk scroll  u/d vote  q quit")
  } else {
    ("FEED", "↑↓/jk scroll  u/d vote  q quit")
  };

  let status = if app.status_msg.is_empty() {
    hints.to_string()
  } else {
    app.status_msg.clone()
  };

  let mode_span = Span::styled(
    format!(" {mode_label} "),
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let hint_span = Span::styled(
    format!("  {status}"),
    Style::default().fg(Color::DarkGray),
  );

  let line = Line::from(vec![mode_span, hint_span]);
  f.render_widget(
    Paragraph::new(line).style(Style::default().bg(Color::Black)),
    area,
  );
}
