//! One feed card: the payload body plus its vote and comment footer.

use cascade_core::{
  backend::FeedBackend,
  item::{FeedItem, ItemPayload, VoteDirection},
};
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::App;

// ─── Public entry ─────────────────────────────────────────────────────────────

/// Render `item` into `area`.
pub fn draw<B: FeedBackend + 'static>(
  f: &mut Frame,
  area: Rect,
  app: &App<B>,
  item: &FeedItem,
) {
  let session = &app.session;
  let position = session.position().map_or(0, |p| p + 1);
  let subject = item.subject.as_deref().unwrap_or("for you");

  let block = Block::default()
    .title(format!(
      " {position}/{}  {}  ·  {subject} ",
      session.items().len(),
      item.topic
    ))
    .title_bottom(footer(app, item))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let inner = block.inner(area);
  f.render_widget(block, area);

  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Length(1), Constraint::Min(0)])
    .split(inner);

  f.render_widget(
    Paragraph::new(Span::styled(
      item.kind().as_str().replace('_', " ").to_uppercase(),
      Style::default().fg(Color::DarkGray),
    )),
    rows[0],
  );

  let lines = match &item.payload {
    ItemPayload::Summary { title, points } => summary_lines(title, points),
    ItemPayload::Post { hook, content } => post_lines(hook, content),
    ItemPayload::VisualConcept { title, analogy, explanation } => {
      concept_lines(title, analogy, explanation)
    }
    ItemPayload::Quiz { question, options, .. } => quiz_lines(app, item, question, options),
  };

  f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), rows[1]);
}

// ─── Payloads ─────────────────────────────────────────────────────────────────

fn heading(text: &str) -> Line<'static> {
  Line::from(Span::styled(
    text.to_owned(),
    Style::default()
      .fg(Color::Yellow)
      .add_modifier(Modifier::BOLD),
  ))
}

fn summary_lines(title: &str, points: &[String]) -> Vec<Line<'static>> {
  let mut lines = vec![heading(title), Line::from("")];
  lines.extend(points.iter().map(|p| Line::from(format!("  • {p}"))));
  lines
}

fn post_lines(hook: &str, content: &str) -> Vec<Line<'static>> {
  vec![heading(hook), Line::from(""), Line::from(content.to_owned())]
}

fn concept_lines(title: &str, analogy: &str, explanation: &str) -> Vec<Line<'static>> {
  vec![
    heading(title),
    Line::from(""),
    Line::from(vec![
      Span::styled("Imagine: ", Style::default().fg(Color::Cyan)),
      Span::styled(
        analogy.to_owned(),
        Style::default().add_modifier(Modifier::ITALIC),
      ),
    ]),
    Line::from(""),
    Line::from(explanation.to_owned()),
  ]
}

fn quiz_lines<B: FeedBackend + 'static>(
  app: &App<B>,
  item: &FeedItem,
  question: &str,
  options: &[String],
) -> Vec<Line<'static>> {
  let chosen = app.session.answer_of(&item.id);
  let feedback = app.feedback.get(&item.id);

  let mut lines = vec![heading(question), Line::from("")];
  for (i, option) in options.iter().enumerate() {
    let style = match feedback {
      Some(fb) if i == fb.correct_index => Style::default().fg(Color::Green),
      Some(_) if chosen == Some(i) => Style::default().fg(Color::Red),
      Some(_) => Style::default().fg(Color::DarkGray),
      None => Style::default(),
    };
    lines.push(Line::from(Span::styled(format!("  {}. {option}", i + 1), style)));
  }

  if let Some(fb) = feedback {
    let verdict = if fb.correct {
      Span::styled("Correct!", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
    } else {
      Span::styled("Not quite.", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
    };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![verdict, Span::raw(format!(" {}", fb.explanation))]));
  }
  lines
}

// ─── Footer ───────────────────────────────────────────────────────────────────

fn footer<B: FeedBackend + 'static>(app: &App<B>, item: &FeedItem) -> Line<'static> {
  let Some(tally) = app.session.tally(&item.id) else {
    return Line::from("");
  };
  let marker = |dir: VoteDirection, symbol: &str, count: u64| {
    let style = if tally.vote == Some(dir) {
      Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(Color::Gray)
    };
    Span::styled(format!(" {symbol} {count} "), style)
  };

  Line::from(vec![
    marker(VoteDirection::Up, "▲", tally.up),
    marker(VoteDirection::Down, "▼", tally.down),
    Span::styled(
      format!(" score {}  comments {} ", tally.score(), item.comment_count),
      Style::default().fg(Color::DarkGray),
    ),
  ])
}
