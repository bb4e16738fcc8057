//! Transport bar widget - shows play state, position, stem and capture stats

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use pitch_trainer::transport::BufferState;

/// Everything the transport bar shows
pub struct TransportView<'a> {
    pub state: &'static str,
    pub position_ms: f64,
    pub total_ms: f64,
    pub guide: bool,
    pub buffers: BufferState,
    pub delay_ms: i32,
    pub input_level: f32,
    pub score: Option<u8>,
    pub output_rate: u32,
    pub status: &'a str,
}

/// `m:ss.s`
fn clock(ms: f64) -> String {
    let secs = (ms.max(0.0) / 1000.0) as f32;
    let minutes = (secs / 60.0).floor();
    format!("{}:{:04.1}", minutes as u32, secs - minutes * 60.0)
}

/// Render the transport bar
pub fn render_transport(frame: &mut Frame, area: Rect, view: &TransportView<'_>) {
    let block = Block::default()
        .title(" trainer ")
        .borders(Borders::ALL);

    let state_color = match view.state {
        "Recording" => Color::Red,
        "Playing" | "Reviewing" => Color::Green,
        "Calibrating" => Color::Magenta,
        _ => Color::Yellow,
    };
    let buffers = match view.buffers {
        BufferState::Idle => "idle",
        BufferState::Loading => "loading",
        BufferState::Loaded => "loaded",
        BufferState::Error => "error",
    };
    let score = view
        .score
        .map_or_else(|| "--".to_string(), |s| format!("{s}%"));

    let line = Line::from(vec![
        Span::styled(
            format!(" {}  ", view.state),
            Style::default().fg(state_color),
        ),
        Span::styled(
            format!("{} / {}  ", clock(view.position_ms), clock(view.total_ms)),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("{}  ", if view.guide { "Guide" } else { "Instrumental" }),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!("Tracks: {buffers}  "),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("{:.1}kHz  ", view.output_rate as f32 / 1000.0),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("Mic: {:.2}  Delay: {} ms  ", view.input_level, view.delay_ms),
            Style::default().fg(Color::Magenta),
        ),
        Span::styled(
            format!("Score: {score}  "),
            Style::default().fg(Color::LightGreen),
        ),
        Span::styled(view.status.to_string(), Style::default().fg(Color::Gray)),
    ]);

    let paragraph = Paragraph::new(line).block(block);
    frame.render_widget(paragraph, area);
}
