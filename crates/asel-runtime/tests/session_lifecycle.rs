#![forbid(unsafe_code)]
#![cfg(unix)]

//! Session lifecycle integration tests.
//!
//! Every async selection acquires an output buffer, optionally a refresh
//! ticker, and a child process. These tests drive the orchestrator with the
//! scripted picker and check, through the observer and the buffer handle the
//! picker captured, that all three are released on every exit path.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use asel_core::{CandidateSource, LinesFromProcess, SelectError, StaticSource, lines_from_process};
use asel_runtime::{
    AsyncSelect, AsyncSelectConfig, RecordingObserver, RefreshAction, ScriptStep, ScriptedSelect,
    SelectOptions, SessionEvent, Transcript,
};

fn session(
    steps: Vec<ScriptStep>,
    refresh: RefreshAction,
) -> (AsyncSelect, Transcript, Arc<RecordingObserver>) {
    let script = ScriptedSelect::new(steps);
    let transcript = script.transcript();
    let observer = Arc::new(RecordingObserver::new());
    let select = AsyncSelect::new(
        AsyncSelectConfig::default()
            .with_refresh(refresh)
            .with_refresh_period(Duration::from_millis(10))
            .with_delegate(script)
            .with_observer(observer.clone()),
    );
    (select, transcript, observer)
}

fn run(select: &AsyncSelect, source: &mut dyn CandidateSource) -> Result<String, SelectError> {
    select.run("> ", source, None, &SelectOptions::new())
}

fn slow_source() -> LinesFromProcess {
    lines_from_process("sh", ["-c", "echo first; exec sleep 30"])
}

#[track_caller]
fn assert_released(observer: &RecordingObserver, transcript: &Transcript, ticker_expected: bool) {
    let events = observer.events();
    let count = |pred: fn(&SessionEvent) -> bool| events.iter().filter(|e| pred(e)).count();

    assert_eq!(count(|e| matches!(e, SessionEvent::BufferAllocated { .. })), 1);
    assert_eq!(count(|e| matches!(e, SessionEvent::BufferDestroyed { .. })), 1);
    assert_eq!(count(|e| matches!(e, SessionEvent::ProcessSpawned { .. })), 1);
    assert_eq!(count(|e| matches!(e, SessionEvent::ProcessReaped { .. })), 1);
    let tickers = usize::from(ticker_expected);
    assert_eq!(count(|e| matches!(e, SessionEvent::TickerStarted { .. })), tickers);
    assert_eq!(count(|e| matches!(e, SessionEvent::TickerStopped { .. })), tickers);

    let stopped = events
        .iter()
        .position(|e| matches!(e, SessionEvent::TickerStopped { .. }));
    let reaped = events
        .iter()
        .position(|e| matches!(e, SessionEvent::ProcessReaped { .. }));
    let destroyed = events
        .iter()
        .position(|e| matches!(e, SessionEvent::BufferDestroyed { .. }));
    if let Some(stopped) = stopped {
        assert!(stopped < reaped.unwrap());
    }
    assert!(reaped.unwrap() < destroyed.unwrap());
    assert_eq!(destroyed, Some(events.len() - 1));

    let buffer = transcript.buffer().expect("picker saw the session buffer");
    assert!(buffer.is_destroyed());

    #[cfg(target_os = "linux")]
    {
        let pid = observer.spawned_pid().unwrap();
        assert!(
            !std::path::Path::new(&format!("/proc/{pid}")).exists(),
            "process {pid} still present"
        );
    }
}

/// Whether `pid` is gone or only a zombie awaiting its new parent.
#[cfg(target_os = "linux")]
fn wait_dead(pid: &str) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let dead = match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => true,
            Ok(stat) => stat
                .rsplit_once(')')
                .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
        };
        if dead || std::time::Instant::now() >= deadline {
            return dead;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn normal_return_releases_everything() {
    let (select, transcript, observer) = session(
        vec![ScriptStep::wait_for_candidates(1), ScriptStep::Accept],
        RefreshAction::Redisplay,
    );
    let mut source = slow_source();
    assert_eq!(run(&select, &mut source).unwrap(), "first");
    assert_released(&observer, &transcript, true);

    let killed = observer.events().into_iter().find_map(|e| match e {
        SessionEvent::ProcessReaped { killed, .. } => Some(killed),
        _ => None,
    });
    assert_eq!(killed, Some(true));
}

#[test]
fn delegate_error_releases_everything() {
    let (select, transcript, observer) = session(
        vec![
            ScriptStep::wait_for_candidates(1),
            ScriptStep::Fail("picker broke".into()),
        ],
        RefreshAction::Redisplay,
    );
    let mut source = slow_source();
    let err = run(&select, &mut source).unwrap_err();
    assert_eq!(err.to_string(), "selection failed: picker broke");
    assert_released(&observer, &transcript, true);
}

#[test]
fn cancellation_releases_everything() {
    let (select, transcript, observer) =
        session(vec![ScriptStep::Cancel], RefreshAction::Redisplay);
    let mut source = slow_source();
    assert!(run(&select, &mut source).unwrap_err().is_cancelled());
    assert_released(&observer, &transcript, true);
}

#[test]
fn panic_in_delegate_releases_everything() {
    let (select, transcript, observer) = session(
        vec![ScriptStep::Panic("picker exploded".into())],
        RefreshAction::Redisplay,
    );
    let mut source = slow_source();
    let outcome = catch_unwind(AssertUnwindSafe(|| run(&select, &mut source)));
    assert!(outcome.is_err());
    assert_released(&observer, &transcript, true);
}

#[test]
fn spawn_failure_skips_delegate_and_cleans_up() {
    let (select, transcript, observer) =
        session(vec![ScriptStep::Accept], RefreshAction::Redisplay);
    let mut source = lines_from_process("asel-missing-program-for-tests", Vec::<String>::new());
    let err = run(&select, &mut source).unwrap_err();
    assert_eq!(
        err.spawn_error().map(std::io::Error::kind),
        Some(std::io::ErrorKind::NotFound)
    );
    assert!(transcript.snapshots().is_empty());

    let events = observer.events();
    assert!(events.iter().any(|e| matches!(e, SessionEvent::SpawnFailed { .. })));
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::ProcessSpawned { .. })));
    assert!(matches!(events.last(), Some(SessionEvent::BufferDestroyed { .. })));
}

#[test]
fn disabled_refresh_starts_no_ticker() {
    let (select, transcript, observer) = session(
        vec![
            ScriptStep::wait_for_candidates(3),
            ScriptStep::Select(2),
            ScriptStep::Accept,
        ],
        RefreshAction::Disabled,
    );
    let mut source = lines_from_process("printf", ["a\\nb\\nc\\n"]);
    assert_eq!(run(&select, &mut source).unwrap(), "c");
    assert_released(&observer, &transcript, false);
    assert_eq!(transcript.redisplays(), 0);
}

#[test]
fn custom_refresh_action_runs_until_session_ends() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let (select, transcript, observer) = session(
        vec![ScriptStep::wait_for_candidates(1), ScriptStep::Accept],
        RefreshAction::custom(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    let mut source = lines_from_process("sh", ["-c", "sleep 0.1; echo late; exec sleep 30"]);
    assert_eq!(run(&select, &mut source).unwrap(), "late");
    assert_released(&observer, &transcript, true);

    let after = hits.load(Ordering::SeqCst);
    assert!(after > 0);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(hits.load(Ordering::SeqCst), after);
}

#[test]
fn redisplay_reaches_the_picker() {
    let (select, transcript, observer) = session(
        vec![
            ScriptStep::wait_for_redisplay(),
            ScriptStep::wait_for_candidates(1),
            ScriptStep::Accept,
        ],
        RefreshAction::Redisplay,
    );
    let mut source = slow_source();
    assert_eq!(run(&select, &mut source).unwrap(), "first");
    assert_eq!(transcript.redisplays(), 1);
    assert_released(&observer, &transcript, true);
}

#[test]
fn printf_lines_are_collected_exactly_once() {
    let (select, transcript, _observer) = session(
        vec![ScriptStep::wait_for_candidates(3), ScriptStep::Refresh],
        RefreshAction::Redisplay,
    );
    let mut source = lines_from_process("printf", ["x\\ny\\nz\\n"]);
    assert!(run(&select, &mut source).unwrap_err().is_cancelled());
    let last = transcript.last().unwrap();
    assert_eq!(last.candidates, ["x", "y", "z"]);
    assert_eq!(source.lines(), ["x", "y", "z"]);
}

#[cfg(target_os = "linux")]
#[test]
fn background_jobs_of_the_program_are_killed() {
    let (select, transcript, observer) = session(
        vec![ScriptStep::wait_for_candidates(1), ScriptStep::Accept],
        RefreshAction::Redisplay,
    );
    let mut source = lines_from_process("sh", ["-c", "sleep 30 & echo $!; wait"]);
    let background = run(&select, &mut source).unwrap();
    assert_released(&observer, &transcript, true);
    assert!(wait_dead(&background), "background sleep {background} survived");
}

#[test]
fn reused_source_parses_each_session_from_scratch() {
    let steps = vec![ScriptStep::wait_for_candidates(1), ScriptStep::Accept];
    let (select, _, _) = session(steps, RefreshAction::Disabled);
    let mut source = lines_from_process("sh", ["-c", "echo $$"]);

    let first = run(&select, &mut source).unwrap();
    assert_eq!(source.lines(), [first.clone()]);

    let second = run(&select, &mut source).unwrap();
    assert_ne!(first, second, "second session saw the first session's lines");
    assert_eq!(source.lines(), [second.clone()]);
    assert_eq!(source.cursor(), second.len() + 1);
}

#[test]
fn sync_source_matches_direct_delegate_call() {
    let steps = vec![ScriptStep::Type("b".into()), ScriptStep::Accept];

    let (select, _, observer) = session(steps.clone(), RefreshAction::Redisplay);
    let mut wrapped = StaticSource::new(["apple", "banana", "blueberry"]);
    let via_orchestrator = run(&select, &mut wrapped).unwrap();

    let direct = ScriptedSelect::new(steps);
    let mut plain = StaticSource::new(["apple", "banana", "blueberry"]);
    let channel = asel_core::QueryChannel::passthrough(None);
    let options = SelectOptions::new();
    let redisplay = asel_runtime::RedisplaySignal::new();
    let via_delegate = asel_runtime::SelectFn::select(
        &direct,
        asel_runtime::SelectRequest {
            prompt: "> ",
            source: &mut plain,
            channel: &channel,
            options: &options,
            redisplay: &redisplay,
        },
    )
    .unwrap();

    assert_eq!(via_orchestrator, via_delegate);
    assert_eq!(via_orchestrator, "banana");
    assert!(observer.events().is_empty());
}
