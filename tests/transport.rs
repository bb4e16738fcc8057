mod common;

use std::time::Duration;

use common::{silent_buffer, RecordingSink, SinkEvent};
use pitch_trainer::{
    transport::{
        BufferSource, BufferState, LoadRequest, ManualClock, PlayState, PlaybackTransport,
        SourceId,
    },
    TrainerError,
};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn loaded(guide: bool) -> (PlaybackTransport<ManualClock, RecordingSink>, ManualClock, RecordingSink) {
    let clock = ManualClock::new();
    let sink = RecordingSink::default();
    let mut transport = PlaybackTransport::new(clock.clone(), sink.clone(), Duration::from_secs(5));
    transport.set_total_duration_ms(10_000.0);
    assert!(transport.start_loading(LoadRequest {
        instrumental: BufferSource::Pcm(silent_buffer(10_000)),
        guide: guide.then(|| BufferSource::Pcm(silent_buffer(10_000))),
        take: None,
    }));
    assert_eq!(transport.wait_loading(), BufferState::Loaded);
    (transport, clock, sink)
}

#[test]
fn play_before_load_is_refused() {
    let mut transport = PlaybackTransport::new(
        ManualClock::new(),
        RecordingSink::default(),
        Duration::from_secs(1),
    );
    assert!(matches!(transport.play(), Err(TrainerError::NotLoaded)));
    assert!(!transport.is_playing());
    assert_eq!(transport.position_ms(), 0.0);
}

#[test]
fn position_follows_the_clock_and_pause_freezes_it() {
    let (mut transport, clock, _sink) = loaded(false);
    transport.play_from_start().unwrap();
    clock.advance(ms(1500));
    assert_eq!(transport.position_ms(), 1500.0);

    transport.pause();
    clock.advance(ms(5000));
    assert_eq!(transport.position_ms(), 1500.0);
    assert_eq!(transport.state(), PlayState::Stopped);

    transport.play().unwrap();
    clock.advance(ms(500));
    assert_eq!(transport.position_ms(), 2000.0);
}

#[test]
fn seek_while_paused_does_not_start_sources() {
    let (mut transport, _clock, sink) = loaded(false);
    transport.seek_to_ms(4200.0).unwrap();
    assert!(!transport.is_playing());
    assert_eq!(transport.position_ms(), 4200.0);
    assert!(sink.starts().is_empty());

    transport.seek_to_ms(-10.0).unwrap();
    assert_eq!(transport.position_ms(), 0.0);
    transport.seek_to_ms(99_000.0).unwrap();
    assert_eq!(transport.position_ms(), 10_000.0);
}

#[test]
fn seek_while_playing_restarts_at_target() {
    let (mut transport, clock, sink) = loaded(false);
    transport.play_from_start().unwrap();
    clock.advance(ms(1000));
    sink.clear();

    transport.seek_to_ms(6000.0).unwrap();
    assert!(transport.is_playing());
    assert_eq!(
        sink.events(),
        vec![
            SinkEvent::Stop(SourceId::Instrumental),
            SinkEvent::Start {
                id: SourceId::Instrumental,
                offset_secs: 6.0,
                delay_secs: 0.0
            },
        ]
    );
    clock.advance(ms(250));
    assert_eq!(transport.position_ms(), 6250.0);
}

#[test]
fn toggling_guide_twice_returns_to_instrumental() {
    let (mut transport, clock, sink) = loaded(true);
    transport.play_from_start().unwrap();
    clock.advance(ms(2000));

    assert!(transport.toggle_guide_vocal().unwrap());
    assert!(sink.is_sounding(SourceId::Guide));
    assert!(!sink.is_sounding(SourceId::Instrumental));
    assert_eq!(transport.position_ms(), 2000.0);

    clock.advance(ms(1000));
    assert!(!transport.toggle_guide_vocal().unwrap());
    assert!(sink.is_sounding(SourceId::Instrumental));
    assert!(!sink.is_sounding(SourceId::Guide));

    let last = *sink.starts().last().unwrap();
    assert_eq!(
        last,
        SinkEvent::Start {
            id: SourceId::Instrumental,
            offset_secs: 3.0,
            delay_secs: 0.0
        }
    );
}

#[test]
fn toggling_without_guide_changes_nothing() {
    let (mut transport, _clock, sink) = loaded(false);
    transport.play_from_start().unwrap();
    sink.clear();
    assert!(!transport.toggle_guide_vocal().unwrap());
    assert!(sink.events().is_empty());
}

#[test]
fn toggling_while_paused_selects_stem_for_next_play() {
    let (mut transport, _clock, sink) = loaded(true);
    assert!(transport.toggle_guide_vocal().unwrap());
    assert!(sink.starts().is_empty());
    transport.play().unwrap();
    assert!(sink.is_sounding(SourceId::Guide));
}

#[test]
fn end_of_song_is_reported_once() {
    let (mut transport, clock, sink) = loaded(false);
    transport.play_from_start().unwrap();
    clock.advance(ms(9_990));
    assert!(!transport.poll_ended());

    clock.advance(ms(20));
    assert_eq!(transport.position_ms(), 10_000.0);
    assert!(transport.poll_ended());
    assert!(!transport.poll_ended());
    assert!(!transport.is_playing());
    assert!(!sink.is_sounding(SourceId::Instrumental));
}

#[test]
fn late_take_is_started_with_a_delay() {
    let clock = ManualClock::new();
    let sink = RecordingSink::default();
    let mut transport = PlaybackTransport::new(clock.clone(), sink.clone(), Duration::from_secs(5));
    transport.set_take_offset_ms(250.0);
    transport.start_loading(LoadRequest {
        instrumental: BufferSource::Pcm(silent_buffer(4000)),
        guide: None,
        take: Some(BufferSource::Pcm(silent_buffer(4000))),
    });
    assert_eq!(transport.wait_loading(), BufferState::Loaded);
    assert!(transport.is_reviewing());
    // Length comes from the instrumental when none was configured
    assert_eq!(transport.total_duration_ms(), 4000.0);

    transport.play_from_start().unwrap();
    assert!(sink.starts().contains(&SinkEvent::Start {
        id: SourceId::Take,
        offset_secs: 0.0,
        delay_secs: 0.25
    }));

    transport.seek_to_ms(1000.0).unwrap();
    assert!(sink.starts().contains(&SinkEvent::Start {
        id: SourceId::Take,
        offset_secs: 0.75,
        delay_secs: 0.0
    }));
}

#[test]
fn loading_is_ignored_while_in_flight() {
    let clock = ManualClock::new();
    let mut transport =
        PlaybackTransport::new(clock, RecordingSink::default(), Duration::from_secs(5));
    let request = LoadRequest {
        instrumental: BufferSource::Pcm(silent_buffer(100)),
        guide: None,
        take: None,
    };
    assert!(transport.start_loading(request.clone()));
    if transport.buffer_state() == BufferState::Loading {
        assert!(!transport.start_loading(request));
    }
    assert_eq!(transport.wait_loading(), BufferState::Loaded);
}
