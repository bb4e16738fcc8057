//! Lyrics widget - current line highlighted, next line dimmed

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use pitch_trainer::lyrics::Lyrics;

pub fn render_lyrics(frame: &mut Frame, area: Rect, lyrics: &Lyrics, position_ms: f64) {
    let block = Block::default().title(" Lyrics ").borders(Borders::ALL);
    let singing = lyrics.current_index(position_ms).is_some();

    let lines: Vec<Line> = lyrics
        .lines_at(position_ms, 2)
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let style = if i == 0 && singing {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Line::styled(line.text.clone(), style)
        })
        .collect();

    let paragraph = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}
