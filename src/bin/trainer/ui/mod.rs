//! TUI module for trainer
//!
//! Drives the take session once per frame and draws the pitch bar, the
//! transport state and the lyrics.

mod lyrics;
mod pitch_bar;
mod transport;

use std::time::Duration;

use color_eyre::eyre::Result as EyreResult;
use crossbeam_channel::Receiver;
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Style},
    widgets::Paragraph,
    DefaultTerminal, Frame,
};

use pitch_trainer::{
    calibration::{self, LatencyProbe},
    render::{PanGesture, PitchBarScene, SceneInput, WindowLayout},
    session::SessionEvent,
    store::{CalibrationStore, FileCalibrationStore, JsonTakeStore, MicDelay, TakeStore},
    transport::BufferState,
};

use super::app::{Backing, LiveSession};
use lyrics::render_lyrics;
use pitch_bar::render_pitch_bar;
use transport::{render_transport, TransportView};

/// Seek step for the arrow keys
const SEEK_STEP_MS: f64 = 5000.0;
/// Mic delay step for `+`/`-`
const DELAY_STEP_MS: i32 = 10;

/// UI application state
pub struct UiApp {
    session: LiveSession,
    backing: Backing,
    delay: MicDelay,
    takes: JsonTakeStore,
    calibration: FileCalibrationStore,
    output_rate: u32,
    /// Capture failures reported from the pipeline callback
    errors: Receiver<String>,
    pan: PanGesture,
    /// Panned view time; `None` follows the playback position
    view_ms: Option<f64>,
    /// Where the pitch bar was last drawn, for mouse hit-testing
    pitch_area: Rect,
    status: String,
    should_quit: bool,
}

impl UiApp {
    pub fn new(
        session: LiveSession,
        backing: Backing,
        delay: MicDelay,
        takes: JsonTakeStore,
        calibration: FileCalibrationStore,
        output_rate: u32,
        errors: Receiver<String>,
    ) -> Self {
        let melody = session.melody();
        let pan = PanGesture::new(1.0, melody.bar_ms(), melody.total_duration_ms);
        Self {
            session,
            backing,
            delay,
            takes,
            calibration,
            output_rate,
            errors,
            pan,
            view_ms: None,
            pitch_area: Rect::default(),
            status: "Loading tracks...".to_string(),
            should_quit: false,
        }
    }

    /// Run the UI event loop
    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.poll_session();

            terminal.draw(|frame| self.render(frame))?;

            // Handle input (non-blocking, ~60fps)
            if event::poll(Duration::from_millis(16))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key.code)
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
        }

        self.session.stop_take();
        self.session.cancel_calibration();
        Ok(())
    }

    fn poll_session(&mut self) {
        let was_loading = self.session.transport().buffer_state() == BufferState::Loading;

        match self.session.poll() {
            Some(SessionEvent::TakeFinished(result)) => {
                self.status = format!("Take finished: {}%  [S] to save", result.percentage);
            }
            Some(SessionEvent::Calibration(outcome)) => {
                self.status =
                    match calibration::apply(outcome, &self.delay, &mut self.calibration) {
                        Ok(ms) => format!("Mic delay calibrated: {ms} ms"),
                        Err(err) => format!("Calibration failed: {err}"),
                    };
            }
            None => {}
        }

        if was_loading {
            let transport = self.session.transport();
            match transport.buffer_state() {
                BufferState::Loaded => self.status = "Ready".to_string(),
                BufferState::Error => {
                    self.status = match transport.load_error() {
                        Some(err) => format!("Load failed: {err}"),
                        None => "Load failed".to_string(),
                    }
                }
                _ => {}
            }
        }

        // Keep only the newest capture error
        while let Ok(err) = self.errors.try_recv() {
            self.status = err;
        }
    }

    /// Handle keyboard input
    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char(' ') => self.toggle_play(),
            KeyCode::Enter => self.toggle_take(),
            KeyCode::Char('g') | KeyCode::Char('G') => {
                match self.session.transport_mut().toggle_guide_vocal() {
                    Ok(true) => self.status = "Guide vocal on".to_string(),
                    Ok(false) => self.status = "Instrumental".to_string(),
                    Err(err) => self.status = err.to_string(),
                }
            }
            KeyCode::Left => self.seek_by(-SEEK_STEP_MS),
            KeyCode::Right => self.seek_by(SEEK_STEP_MS),
            KeyCode::Char('s') | KeyCode::Char('S') => {
                self.status = match self.session.save(&mut self.takes) {
                    Ok(true) => "Take saved".to_string(),
                    Ok(false) => "Nothing to save yet".to_string(),
                    Err(err) => format!("Save failed: {err}"),
                };
            }
            KeyCode::Char('p') | KeyCode::Char('P') => self.toggle_review(),
            KeyCode::Char('c') | KeyCode::Char('C') => {
                self.status = match self.session.start_calibration(LatencyProbe::default()) {
                    Ok(()) => "Calibrating: hold the microphone near the speaker".to_string(),
                    Err(err) => format!("Calibration failed: {err}"),
                };
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.adjust_delay(DELAY_STEP_MS),
            KeyCode::Char('-') => self.adjust_delay(-DELAY_STEP_MS),
            _ => {}
        }
    }

    fn toggle_play(&mut self) {
        if self.session.is_active() {
            self.status = "Recording: [Enter] stops the take".to_string();
            return;
        }
        let transport = self.session.transport_mut();
        if transport.is_playing() {
            transport.pause();
        } else if let Err(err) = transport.play() {
            self.status = err.to_string();
        } else {
            self.view_ms = None;
        }
    }

    fn toggle_take(&mut self) {
        if self.session.is_active() {
            if let Some(result) = self.session.stop_take() {
                self.status = format!("Take stopped: {}%  [S] to save", result.percentage);
            }
            return;
        }
        match self.session.start_take() {
            Ok(()) => {
                self.view_ms = None;
                self.status = "Recording".to_string();
            }
            Err(err) => self.status = format!("Cannot start take: {err}"),
        }
    }

    fn seek_by(&mut self, delta_ms: f64) {
        if self.session.is_active() {
            return;
        }
        let target = self.current_view_ms() + delta_ms;
        self.view_ms = None;
        if let Err(err) = self.session.transport_mut().seek_to_ms(target) {
            self.status = err.to_string();
        }
    }

    fn toggle_review(&mut self) {
        let Backing {
            instrumental,
            guide,
        } = self.backing.clone();

        if self.session.review().is_some() {
            self.session.load(instrumental, guide);
            self.status = "Back to practice".to_string();
            return;
        }
        self.status = match self.takes.get() {
            Ok(Some(take)) => match self.session.enter_review(take, instrumental, guide) {
                Ok(_) => "Reviewing saved take: [Space] to play, [P] to leave".to_string(),
                Err(err) => format!("Review failed: {err}"),
            },
            Ok(None) => "No saved take".to_string(),
            Err(err) => format!("Reading saved take: {err}"),
        };
    }

    fn adjust_delay(&mut self, delta_ms: i32) {
        let ms = self.delay.adjust(delta_ms);
        self.status = match self.calibration.save(ms) {
            Ok(()) => format!("Mic delay {ms} ms"),
            Err(err) => format!("Mic delay {ms} ms (not saved: {err})"),
        };
    }

    /// Handle mouse input: drag pans the pitch bar while stopped
    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let area = self.pitch_area;
        let x = f64::from(mouse.column.saturating_sub(area.x));
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if area.contains(Position::new(mouse.column, mouse.row)) {
                    let playing = self.session.transport().is_playing();
                    let view = self.current_view_ms();
                    self.pan.press(x, view, playing);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(view) = self.pan.drag(x) {
                    self.view_ms = Some(view);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => self.pan.release(),
            _ => {}
        }
    }

    /// Time the pitch bar is built around
    fn current_view_ms(&self) -> f64 {
        let position = self.session.transport().position_ms();
        if self.session.transport().is_playing() {
            return position;
        }
        self.view_ms.unwrap_or(position)
    }

    /// Render the UI
    fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();

        // Main layout: transport, pitch bar, lyrics, help
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Transport bar
                Constraint::Min(10),   // Pitch bar
                Constraint::Length(4), // Lyrics
                Constraint::Length(1), // Help bar
            ])
            .split(area);

        let transport = self.session.transport();
        let position_ms = transport.position_ms();
        let state = if self.session.is_calibrating() {
            "Calibrating"
        } else if self.session.is_active() {
            "Recording"
        } else if transport.is_reviewing() && transport.is_playing() {
            "Reviewing"
        } else if transport.is_playing() {
            "Playing"
        } else {
            "Paused"
        };
        render_transport(
            frame,
            chunks[0],
            &TransportView {
                state,
                position_ms,
                total_ms: transport.total_duration_ms(),
                guide: transport.guide_active(),
                buffers: transport.buffer_state(),
                delay_ms: self.delay.get_ms(),
                input_level: self.session.capture().input_level(),
                score: self.session.last_result().map(|r| r.percentage),
                output_rate: self.output_rate,
                status: &self.status,
            },
        );

        self.pitch_area = chunks[1];
        self.pan.set_width(f64::from(chunks[1].width.max(1)));
        let scene = PitchBarScene::build(&SceneInput {
            melody: self.session.melody(),
            samples: self.session.display_samples(),
            view_ms: self.current_view_ms(),
            position_ms,
            sample_interval_ms: self.session.emit_interval_ms(),
            layout: WindowLayout::default(),
        });
        render_pitch_bar(frame, chunks[1], &scene);

        render_lyrics(frame, chunks[2], self.session.lyrics(), position_ms);

        let help = Paragraph::new(
            " [Q] Quit  [Space] Play/Pause  [Enter] Take  [G] Guide  [←/→] Seek  \
             [S] Save  [P] Review  [C] Calibrate  [+/-] Mic delay",
        )
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[3]);
    }
}
