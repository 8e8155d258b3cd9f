//! The worker transport seen from both ends: raw envelopes against the host
//! loop, and the proxy against a real worker thread.

mod common;

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{names, partials_rendered, record, score};
use pretty_assertions::assert_eq;
use scoreflow::worker::{decode, encode, host, WorkerCommand, WorkerResult};
use scoreflow::{FontSizes, RenderError, RenderEvent, ScoreRendererApi, Settings, WorkerScoreRenderer};
use serde_json::{json, Value};

const WAIT: Duration = Duration::from_secs(10);

fn start_host() -> (mpsc::Sender<Value>, mpsc::Receiver<Value>, thread::JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel();
    let (result_tx, result_rx) = mpsc::channel();
    let handle = thread::spawn(move || host::run(command_rx, result_tx));
    (command_tx, result_rx, handle)
}

fn next(results: &mpsc::Receiver<Value>) -> WorkerResult {
    decode(results.recv_timeout(WAIT).unwrap()).unwrap()
}

#[test]
fn one_bar_over_raw_envelopes() {
    let (commands, results, handle) = start_host();
    let settings = Settings::default().to_worker_json().unwrap();
    commands
        .send(encode(&WorkerCommand::Initialize { settings }).unwrap())
        .unwrap();
    commands
        .send(json!({ "cmd": "setWidth", "width": 500.0 }))
        .unwrap();
    commands
        .send(
            encode(&WorkerCommand::RenderScore {
                score: Some(serde_json::to_value(score(1, 1)).unwrap()),
                track_indexes: Some(vec![0]),
                font_sizes: FontSizes::default(),
            })
            .unwrap(),
        )
        .unwrap();

    let received: Vec<WorkerResult> = (0..5).map(|_| next(&results)).collect();
    let tags: Vec<&str> = received.iter().map(|r| r.name()).collect();
    assert_eq!(
        tags,
        vec![
            "preRender",
            "partialLayoutFinished",
            "partialRenderFinished",
            "renderFinished",
            "postRenderFinished",
        ]
    );
    assert_eq!(received[0], WorkerResult::PreRender { resize: false });
    match &received[2] {
        WorkerResult::PartialRenderFinished { result } => {
            assert_eq!((result.first_master_bar_index, result.last_master_bar_index), (0, 0));
            assert!(result.render_result.is_some());
        }
        other => panic!("unexpected {other:?}"),
    }
    match &received[4] {
        WorkerResult::PostRenderFinished { bounds_lookup } => {
            assert!(bounds_lookup["staveGroups"].is_array());
        }
        other => panic!("unexpected {other:?}"),
    }

    drop(commands);
    handle.join().unwrap();
}

#[test]
fn garbage_envelopes_are_answered_with_errors() {
    let (commands, results, handle) = start_host();
    commands.send(json!({ "cmd": "render" })).unwrap();
    commands.send(json!({ "nothing": true })).unwrap();

    for _ in 0..2 {
        assert!(matches!(next(&results), WorkerResult::Error { .. }));
    }
    drop(commands);
    handle.join().unwrap();
}

#[test]
fn proxy_mirrors_the_local_event_sequence() {
    let mut settings = Settings::default();
    settings.display.bar_count_per_partial = 2;
    let mut renderer = WorkerScoreRenderer::new(&settings);
    let seen = record(renderer.events());

    renderer.render_score(Some(Arc::new(score(2, 5))), None);
    assert!(renderer.pump_until("postRenderFinished", WAIT));

    assert_eq!(
        names(&seen),
        vec![
            "preRender",
            "partialLayoutFinished",
            "partialRenderFinished",
            "partialLayoutFinished",
            "partialRenderFinished",
            "partialLayoutFinished",
            "partialRenderFinished",
            "renderFinished",
            "postRenderFinished",
        ]
    );
    assert_eq!(partials_rendered(&seen).len(), 3);

    let lookup = renderer.bounds_lookup().unwrap();
    let bar = lookup.find_master_bar_by_index(3).unwrap();
    assert_eq!(bar.bars.len(), 2);
}

#[test]
fn lazy_partials_are_painted_on_request() {
    let mut settings = Settings::default();
    settings.core.enable_lazy_loading = true;
    let mut renderer = WorkerScoreRenderer::new(&settings);
    let seen = record(renderer.events());

    renderer.render_score(Some(Arc::new(score(1, 1))), None);
    assert!(renderer.pump_until("postRenderFinished", WAIT));
    assert!(partials_rendered(&seen).is_empty());

    let id = seen
        .lock()
        .unwrap()
        .iter()
        .find_map(|e| match e {
            RenderEvent::PartialLayoutFinished(args) => Some(args.id.clone()),
            _ => None,
        })
        .unwrap();
    renderer.render_result(&id);
    assert!(renderer.pump_until("partialRenderFinished", WAIT));

    let rendered = partials_rendered(&seen);
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].id, id);
}

#[test]
fn invalid_scores_fail_on_the_worker() {
    let mut broken = score(1, 2);
    broken.tracks[0].staves[0].bars.pop();
    let mut renderer = WorkerScoreRenderer::new(&Settings::default());
    let seen = record(renderer.events());

    renderer.render_score(Some(Arc::new(broken)), None);
    assert!(renderer.pump_until("postRenderFinished", WAIT));

    let events = seen.lock().unwrap();
    assert!(matches!(events.as_slice(), [RenderEvent::Error(RenderError::Model(_))]));
    assert!(renderer.bounds_lookup().is_none());
}
