use pitch_trainer::{
    melody::{Melody, MelodyNote},
    render::{PitchBarScene, SceneInput, WindowLayout},
    scoring::{score, tally, ScoreResult},
    timeline::{PitchSample, PitchTimeline},
};

fn melody() -> Melody {
    let mut melody = Melody::new(
        vec![
            MelodyNote::new(0.0, 1000.0, 60),
            MelodyNote::new(1000.0, 2000.0, 64),
            MelodyNote::new(3000.0, 4000.0, 67),
        ],
        4000.0,
    );
    melody.bpm = Some(120.0);
    melody
}

/// Emit one sample every 20 ms over `[from, to)`.
fn sing(timeline: &mut PitchTimeline, from: u32, to: u32, note: i32) {
    for t in (from..to).step_by(20) {
        assert!(timeline.stage(PitchSample::new(f64::from(t), note)));
    }
    timeline.commit();
}

#[test]
fn breathing_between_phrases_costs_nothing() {
    let melody = melody();
    let mut timeline = PitchTimeline::with_capacity_for(melody.total_duration_ms, 20.0);
    sing(&mut timeline, 0, 2000, 0);
    sing(&mut timeline, 2000, 3000, 62);
    sing(&mut timeline, 3000, 4000, 68);

    // Samples in the gap and silence are not comparable
    let t = tally(timeline.samples(), &melody.notes);
    assert_eq!(t.total, 50);
    assert_eq!(t.matched, 50);
    assert_eq!(score(timeline.samples(), &melody.notes), 100);
}

#[test]
fn note_boundaries_belong_to_the_later_note() {
    let melody = melody();
    let samples = [PitchSample::new(1000.0, 64), PitchSample::new(999.0, 64)];
    // 999 ms still belongs to C4: E4 is four semitones off
    assert_eq!(tally(&samples[..1], &melody.notes).matched, 1);
    assert_eq!(tally(&samples[1..], &melody.notes).matched, 0);
}

#[test]
fn half_right_take() {
    let melody = melody();
    let mut timeline = PitchTimeline::new();
    sing(&mut timeline, 0, 1000, 61);
    sing(&mut timeline, 1000, 2000, 70);

    let result = ScoreResult::new(timeline.snapshot(), &melody.notes, None, 2000.0, -12.0);
    assert_eq!(result.percentage, 50);
    assert_eq!(result.tally.total, 100);
    assert_eq!(result.recording_offset_ms, -12.0);
    assert_eq!(result.timeline.len(), 100);
}

#[test]
fn scene_colours_follow_the_score() {
    let melody = melody();
    let mut timeline = PitchTimeline::new();
    sing(&mut timeline, 0, 1000, 60);
    sing(&mut timeline, 1000, 2000, 68);

    let scene = PitchBarScene::build(&SceneInput {
        melody: &melody,
        samples: timeline.samples(),
        view_ms: 1000.0,
        position_ms: 1000.0,
        sample_interval_ms: 20.0,
        layout: WindowLayout::default(),
    });

    assert_eq!(scene.window.start_ms, 0.0);
    assert_eq!(scene.notes.len(), 3);
    assert_eq!(scene.sung.len(), 2);
    assert!(scene.sung[0].matched);
    assert!(!scene.sung[1].matched);
    assert!(scene.sung[1].y > scene.sung[0].y);
    assert_eq!(scene.playhead, Some(0.25));
}
