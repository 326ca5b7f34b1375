//! Wall-clock pacing tests for the playback scheduler
//!
//! These measure real elapsed time between sink deliveries, so they run
//! serially to keep scheduling noise down.

mod helpers;

use helpers::*;
use serial_test::serial;
use std::time::{Duration, Instant};
use tpr_player::{
    CollectingSink, Notification, PlaybackSession, Recording, SessionOptions, SessionState,
};

fn start_session(
    builder: &RecordingBuilder,
    options: SessionOptions,
) -> (PlaybackSession, CollectingSink) {
    let sink = CollectingSink::new();
    let recording = Recording::open(builder.path()).unwrap();
    let mut session = PlaybackSession::new(recording, sink.clone(), options).unwrap();
    session.start().unwrap();
    (session, sink)
}

fn gaps(times: &[Instant]) -> Vec<Duration> {
    times.windows(2).map(|w| w[1] - w[0]).collect()
}

#[test]
#[serial]
fn test_skip_idle_caps_long_gap() {
    let mut builder = RecordingBuilder::new();
    builder.data_file(1, &[0, 5000]);

    let options = SessionOptions {
        skip_idle: true,
        ..SessionOptions::default()
    };
    let (mut session, sink) = start_session(&builder, options);
    let report = session.wait().unwrap();

    assert_eq!(report.state, SessionState::Ended);
    let gaps = gaps(&data_times(&sink));
    assert_eq!(gaps.len(), 1);
    assert_duration_near(gaps[0], 3000, 10, 150);
}

#[test]
#[serial]
fn test_speed_scales_gaps() {
    let mut builder = RecordingBuilder::new();
    builder.data_file(1, &[0, 1000, 2000]);

    let options = SessionOptions {
        speed: 2.0,
        ..SessionOptions::default()
    };
    let (mut session, sink) = start_session(&builder, options);
    session.wait().unwrap();

    let gaps = gaps(&data_times(&sink));
    assert_eq!(gaps.len(), 2);
    for gap in gaps {
        assert_duration_near(gap, 500, 10, 100);
    }
}

#[test]
#[serial]
fn test_full_gap_honoured_without_skip_idle() {
    // At 8x a 4000ms gap takes 500ms; capping would have made it 375ms
    let mut builder = RecordingBuilder::new();
    builder.data_file(1, &[0, 4000]);

    let options = SessionOptions {
        speed: 8.0,
        ..SessionOptions::default()
    };
    let (mut session, sink) = start_session(&builder, options);
    session.wait().unwrap();

    let gaps = gaps(&data_times(&sink));
    assert_duration_near(gaps[0], 500, 10, 100);
}

#[test]
#[serial]
fn test_short_gaps_not_affected_by_skip_idle() {
    let mut builder = RecordingBuilder::new();
    builder.data_file(1, &[0, 400]);

    let options = SessionOptions {
        speed: 2.0,
        skip_idle: true,
        ..SessionOptions::default()
    };
    let (mut session, sink) = start_session(&builder, options);
    session.wait().unwrap();

    let gaps = gaps(&data_times(&sink));
    assert_duration_near(gaps[0], 200, 10, 100);
}

#[test]
#[serial]
fn test_pause_extends_gap_by_pause_duration() {
    let mut builder = RecordingBuilder::new();
    builder.data_file(1, &[0, 1000]);

    let (mut session, sink) = start_session(&builder, SessionOptions::default());
    wait_for_data(&sink, 1, Duration::from_secs(2));

    session.pause();
    let paused_at = Instant::now();
    std::thread::sleep(Duration::from_millis(500));
    assert_eq!(session.state(), SessionState::Paused);
    assert_eq!(data_times(&sink).len(), 1);
    session.resume();
    let resumed_at = Instant::now();

    let report = session.wait().unwrap();
    assert_eq!(report.state, SessionState::Ended);

    // 1000ms of recording plus the 500ms pause
    let times = data_times(&sink);
    assert_duration_near(times[1] - times[0], 1500, 20, 150);

    // Position does not move while paused
    let settle = paused_at + Duration::from_millis(60);
    let progress_while_paused: Vec<u64> = sink
        .entries()
        .into_iter()
        .filter(|(t, _)| *t > settle && *t < resumed_at)
        .filter_map(|(_, n)| match n {
            Notification::Progress(ms) => Some(ms),
            _ => None,
        })
        .collect();
    assert!(
        progress_while_paused.is_empty(),
        "progress reported while paused: {:?}",
        progress_while_paused
    );
}

#[test]
#[serial]
fn test_speed_change_applies_to_pending_gap() {
    let mut builder = RecordingBuilder::new();
    builder.data_file(1, &[0, 2000]);

    let (mut session, sink) = start_session(&builder, SessionOptions::default());
    wait_for_data(&sink, 1, Duration::from_secs(2));
    session.set_speed(4.0).unwrap();
    assert_eq!(session.speed(), 4.0);

    session.wait().unwrap();

    let times = data_times(&sink);
    assert_duration_near(times[1] - times[0], 500, 10, 150);
}

#[test]
#[serial]
fn test_enabling_skip_idle_mid_gap() {
    let mut builder = RecordingBuilder::new();
    builder.data_file(1, &[0, 8000]);

    let options = SessionOptions {
        speed: 2.0,
        ..SessionOptions::default()
    };
    let (mut session, sink) = start_session(&builder, options);
    wait_for_data(&sink, 1, Duration::from_secs(2));
    session.set_skip_idle(true);

    session.wait().unwrap();

    // Cap applies as soon as the flag flips: 3000ms at 2x
    let times = data_times(&sink);
    assert_duration_near(times[1] - times[0], 1500, 10, 150);
}

#[test]
#[serial]
fn test_progress_reports_are_monotone_and_spaced() {
    let mut builder = RecordingBuilder::new();
    let offsets: Vec<u32> = (0..=20).map(|i| i * 100).collect();
    builder.data_file(1, &offsets);

    let options = SessionOptions {
        speed: 2.0,
        ..SessionOptions::default()
    };
    let (mut session, sink) = start_session(&builder, options);
    let report = session.wait().unwrap();
    assert_eq!(report.state, SessionState::Ended);
    assert_eq!(report.scheduler.unwrap().played_ms, 2000);

    let notifications = sink.notifications();
    let progress = progress_values(&notifications);
    assert!(progress.len() >= 2, "{:?}", progress);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);

    // Regular reports are at least one interval apart; only the final
    // flush may be closer
    let regular = &progress[..progress.len() - 1];
    assert!(
        regular.windows(2).all(|w| w[1] - w[0] >= 200),
        "{:?}",
        progress
    );
    assert_eq!(*progress.last().unwrap(), 2000);

    // The last progress report precedes END
    let last_progress = notifications
        .iter()
        .rposition(|n| matches!(n, Notification::Progress(_)))
        .unwrap();
    let end = notifications
        .iter()
        .position(|n| *n == Notification::End)
        .unwrap();
    assert!(last_progress < end);
}
