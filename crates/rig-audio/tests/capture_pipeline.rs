//! Capture engine and supervisor against the scripted backend

use std::time::Duration;

use rig_audio::scripted::{tone, BackendCall, ScriptedBackend};
use rig_audio::{
    bin_frequency, AudioError, CaptureEngine, CaptureError, CaptureEvent, CaptureParams,
    CaptureState, CaptureSupervisor, HardwareCaps, SupervisorConfig,
};

const RATE: u32 = 48_000;
const N: usize = 4096;

fn caps(max_period: u32) -> HardwareCaps {
    HardwareCaps {
        channels: vec![1, 2],
        rate_range: (8_000, 48_000),
        period_range: (256, max_period),
    }
}

/// Period clamps to 4096 frames, buffer to two periods
fn params() -> CaptureParams {
    CaptureParams {
        buffer_time_us: 50_000,
        ..Default::default()
    }
}

fn signal() -> Vec<Vec<i16>> {
    let freq = bin_frequency(300, RATE, N);
    let samples = tone(RATE, freq, 0.5, 2 * N);
    samples.chunks(1000).map(|c| c.to_vec()).collect()
}

#[test]
fn short_period_fails_before_callback_is_armed() {
    let backend = ScriptedBackend::new(caps(2048));
    let calls = backend.calls();

    let err = CaptureEngine::initialize(backend, CaptureParams::default())
        .err()
        .unwrap();

    assert!(matches!(err, AudioError::UnsupportedConfiguration(_)));
    assert_eq!(*calls.lock().unwrap(), vec![BackendCall::Open]);
}

#[test]
fn rate_outside_device_range_is_fatal() {
    let params = CaptureParams {
        sample_rate: 192_000,
        ..params()
    };
    let err = CaptureEngine::initialize(ScriptedBackend::new(caps(4096)), params)
        .err()
        .unwrap();
    assert!(matches!(err, AudioError::RateMismatch { .. }));
}

#[tokio::test]
async fn engine_delivers_windows() {
    let backend = ScriptedBackend::new(caps(4096)).with_chunks(signal());
    let mut engine = CaptureEngine::initialize(backend, params()).unwrap();
    assert_eq!(engine.hw_params().period_frames, 4096);
    assert_eq!(engine.sw_params().start_threshold, 8192);

    let mut stream = engine.start().unwrap();
    assert_eq!(engine.state(), CaptureState::Running);

    for expected in 0..2 {
        match stream.next_event().await {
            Some(CaptureEvent::Window(w)) => {
                assert_eq!(w.sequence, expected);
                assert_eq!(w.samples.len(), N);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    assert!(matches!(
        engine.start(),
        Err(AudioError::InvalidState(_))
    ));

    engine.stop().unwrap();
    assert_eq!(engine.state(), CaptureState::Prepared);
    assert!(stream.next_event().await.is_none());

    let _stream = engine.start().unwrap();
    assert_eq!(
        *engine.backend().calls().lock().unwrap(),
        vec![
            BackendCall::Open,
            BackendCall::Arm,
            BackendCall::Start,
            BackendCall::Stop,
            BackendCall::Arm,
            BackendCall::Start,
        ]
    );
}

#[tokio::test]
async fn supervisor_publishes_spectrum() {
    let backend = ScriptedBackend::new(caps(4096)).with_chunks(signal());
    let engine = CaptureEngine::initialize(backend, params()).unwrap();
    let supervisor = CaptureSupervisor::spawn(engine, SupervisorConfig::default());
    let mut frames = supervisor.frames();

    let frame = {
        let latest = tokio::time::timeout(
            Duration::from_secs(1),
            frames.wait_for(|f| !f.magnitudes.is_empty()),
        )
        .await
        .unwrap()
        .unwrap();
        (*latest).clone()
    };

    assert_eq!(frame.magnitudes.len(), N / 2 + 1);
    assert_eq!(frame.row.len(), N / 2 + 1);
    let (freq, _db) = frame.peak().unwrap();
    assert_eq!(freq, bin_frequency(300, RATE, N));

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn supervisor_restarts_after_stream_failure() {
    let backend = ScriptedBackend::new(caps(4096))
        .with_chunks(signal())
        .failing(CaptureError::Stream("device went away".into()), 1);
    let calls = backend.calls();
    let engine = CaptureEngine::initialize(backend, params()).unwrap();
    let supervisor = CaptureSupervisor::spawn(engine, SupervisorConfig::default());
    let mut frames = supervisor.frames();

    tokio::time::timeout(
        Duration::from_secs(1),
        frames.wait_for(|f| !f.magnitudes.is_empty()),
    )
    .await
    .unwrap()
    .unwrap();

    supervisor.shutdown().await.unwrap();
    let starts = calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| **c == BackendCall::Start)
        .count();
    assert_eq!(starts, 2);
}

#[tokio::test]
async fn supervisor_gives_up_after_max_restarts() {
    let backend = ScriptedBackend::new(caps(4096))
        .with_chunks(signal())
        .failing(CaptureError::Stream("device went away".into()), 10);
    let calls = backend.calls();
    let engine = CaptureEngine::initialize(backend, params()).unwrap();
    let config = SupervisorConfig {
        max_restarts: 2,
        ..Default::default()
    };
    let supervisor = CaptureSupervisor::spawn(engine, config);

    tokio::time::timeout(Duration::from_secs(1), async {
        while !supervisor.is_finished() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let err = supervisor.shutdown().await.unwrap_err();
    assert!(matches!(err, AudioError::Capture(CaptureError::Stream(_))));

    let calls = calls.lock().unwrap();
    assert_eq!(calls.iter().filter(|c| **c == BackendCall::Start).count(), 3);
    assert_eq!(calls.last(), Some(&BackendCall::Stop));
}

#[tokio::test]
async fn overrun_does_not_restart() {
    let backend = ScriptedBackend::new(caps(4096))
        .with_chunks(signal())
        .failing(CaptureError::Overrun { dropped: 3 }, 1);
    let calls = backend.calls();
    let engine = CaptureEngine::initialize(backend, params()).unwrap();
    let supervisor = CaptureSupervisor::spawn(engine, SupervisorConfig::default());
    let mut frames = supervisor.frames();

    tokio::time::timeout(Duration::from_secs(1), frames.wait_for(|f| f.sequence == 1))
        .await
        .unwrap()
        .unwrap();

    supervisor.shutdown().await.unwrap();
    let starts = calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| **c == BackendCall::Start)
        .count();
    assert_eq!(starts, 1);
}
