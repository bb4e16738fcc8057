//! Pitch bar widget - melody notes, sung pitch and playhead on a staff

use ratatui::{
    layout::Rect,
    style::Color,
    symbols,
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Rectangle},
        Block, Borders,
    },
    Frame,
};

use pitch_trainer::{pitch::semitone_name, render::PitchBarScene};

/// Render a scene built in normalised coordinates
pub fn render_pitch_bar(frame: &mut Frame, area: Rect, scene: &PitchBarScene) {
    let title = format!(
        " Pitch {}-{} ",
        semitone_name(scene.range.low),
        semitone_name(scene.range.high)
    );
    let block = Block::default().title(title).borders(Borders::ALL);

    // Notes are half a semitone tall
    let note_height = scene.range.y(f64::from(scene.range.low) + 1.0) * 0.5;

    let canvas = Canvas::default()
        .block(block)
        .marker(symbols::Marker::Braille)
        .x_bounds([0.0, 1.0])
        .y_bounds([0.0, 1.0])
        .paint(|ctx| {
            for line in &scene.semitones {
                let y = scene.range.y(f64::from(line.semitone));
                let color = if line.is_c { Color::Gray } else { Color::Rgb(40, 40, 40) };
                ctx.draw(&CanvasLine::new(0.0, y, 1.0, y, color));
            }
            for &x in &scene.measures {
                ctx.draw(&CanvasLine::new(x, 0.0, x, 1.0, Color::DarkGray));
            }
            ctx.layer();

            for note in &scene.notes {
                ctx.draw(&Rectangle {
                    x: note.x0,
                    y: note.y - note_height / 2.0,
                    width: note.x1 - note.x0,
                    height: note_height,
                    color: Color::Blue,
                });
            }
            ctx.layer();

            for seg in &scene.sung {
                let color = if seg.matched { Color::Green } else { Color::Red };
                ctx.draw(&CanvasLine::new(seg.x0, seg.y, seg.x1, seg.y, color));
            }
            if let Some(x) = scene.playhead {
                ctx.draw(&CanvasLine::new(x, 0.0, x, 1.0, Color::Yellow));
            }
        });

    frame.render_widget(canvas, area);
}
