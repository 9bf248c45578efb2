use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use pretty_assertions::assert_eq;
use scribe_core::{
    JobId, Phase, PollPolicy, ProgressEvent, ServerStatus, TerminalEvent, TerminalOutcome,
    TranscriptResult,
};
use scribe_engine::{
    ApiError, ApiSettings, FailureKind, HttpClient, JobApi, JobClient, JobObserver, PollError,
    SubmitError, Upload, WatchObserver,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One scripted answer to a status request.
enum Step {
    Reply(Result<ServerStatus, PollError>),
    Delayed(Duration, Result<ServerStatus, PollError>),
}

/// Fake server: submit answers come from a queue, status answers from a
/// per-job script. An exhausted script keeps answering "processing".
#[derive(Default)]
struct ScriptedApi {
    submits: Mutex<VecDeque<(Duration, Result<JobId, SubmitError>)>>,
    scripts: Mutex<Vec<(JobId, VecDeque<Step>)>>,
    polled: Mutex<Vec<JobId>>,
}

impl ScriptedApi {
    fn new() -> Self {
        Self::default()
    }

    fn accept(self, job_id: &str) -> Self {
        self.submits
            .lock()
            .unwrap()
            .push_back((Duration::ZERO, Ok(JobId::from(job_id))));
        self
    }

    fn accept_after(self, delay: Duration, job_id: &str) -> Self {
        self.submits
            .lock()
            .unwrap()
            .push_back((delay, Ok(JobId::from(job_id))));
        self
    }

    fn reject(self, err: ApiError) -> Self {
        self.submits.lock().unwrap().push_back((Duration::ZERO, Err(err)));
        self
    }

    fn script(self, job_id: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .push((JobId::from(job_id), steps.into_iter().collect()));
        self
    }

    fn polled(&self) -> Vec<JobId> {
        self.polled.lock().unwrap().clone()
    }

    fn next_step(&self, job_id: &JobId) -> Option<Step> {
        let mut scripts = self.scripts.lock().unwrap();
        scripts
            .iter_mut()
            .find(|(id, _)| id == job_id)
            .and_then(|(_, steps)| steps.pop_front())
    }
}

#[async_trait::async_trait]
impl JobApi for ScriptedApi {
    async fn submit(&self, _upload: &Upload) -> Result<JobId, SubmitError> {
        let next = self.submits.lock().unwrap().pop_front();
        let (delay, result) =
            next.unwrap_or_else(|| (Duration::ZERO, Err(ApiError::rejected("no scripted submit"))));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn poll(&self, job_id: &JobId) -> Result<ServerStatus, PollError> {
        self.polled.lock().unwrap().push(job_id.clone());
        match self.next_step(job_id) {
            Some(Step::Reply(result)) => result,
            Some(Step::Delayed(delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Ok(processing(None)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Recorded {
    Progress(ProgressEvent),
    Terminal(TerminalEvent),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Recorded>>,
}

impl Recorder {
    fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    fn percents(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Recorded::Progress(progress) => Some(progress.percent),
                Recorded::Terminal(_) => None,
            })
            .collect()
    }

    fn terminals(&self) -> Vec<TerminalEvent> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Recorded::Terminal(terminal) => Some(terminal),
                Recorded::Progress(_) => None,
            })
            .collect()
    }
}

impl JobObserver for Recorder {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events
            .lock()
            .unwrap()
            .push(Recorded::Progress(event.clone()));
    }

    fn on_terminal(&self, event: &TerminalEvent) {
        self.events
            .lock()
            .unwrap()
            .push(Recorded::Terminal(event.clone()));
    }
}

fn processing(progress: Option<u8>) -> ServerStatus {
    ServerStatus::Processing {
        progress,
        filename: Some("talk.mp3".to_string()),
    }
}

fn completed(text: &str) -> ServerStatus {
    ServerStatus::Completed(TranscriptResult {
        text: text.to_string(),
        saved_as: Some("opinion_1.txt".to_string()),
        file_path: None,
    })
}

fn audio() -> Upload {
    Upload::new("talk.mp3", b"ID3fake-audio".to_vec())
}

fn network_down() -> ApiError {
    ApiError::new(FailureKind::Network, "connection refused")
}

fn client(api: &Arc<ScriptedApi>, recorder: &Arc<Recorder>, policy: PollPolicy) -> JobClient {
    JobClient::new(api.clone(), recorder.clone(), policy)
}

async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn progress_is_clamped_then_completes() {
    let api = Arc::new(ScriptedApi::new().accept("abc").script(
        "abc",
        vec![
            Step::Reply(Ok(processing(Some(40)))),
            Step::Reply(Ok(processing(Some(97)))),
            Step::Reply(Ok(completed("hello"))),
        ],
    ));
    let recorder = Arc::new(Recorder::default());
    let client = client(&api, &recorder, PollPolicy::default());

    let handle = client.submit(audio()).await.expect("accepted");
    assert_eq!(handle.job_id(), &JobId::from("abc"));
    assert_eq!(client.current_state().phase, Phase::Processing);

    advance(7).await;

    assert_eq!(recorder.percents(), vec![40, 95, 100]);
    let terminals = recorder.terminals();
    assert_eq!(terminals.len(), 1);
    assert_eq!(terminals[0].job_id, Some(JobId::from("abc")));
    match &terminals[0].outcome {
        TerminalOutcome::Completed(result) => assert_eq!(result.text, "hello"),
        other => panic!("unexpected outcome {other:?}"),
    }

    let job = client.current_state();
    assert_eq!(job.phase, Phase::Completed);
    assert_eq!(job.progress_percent, 100);
    assert_eq!(api.polled().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn rejected_submit_stays_idle_without_polling() {
    let api = Arc::new(ScriptedApi::new().reject(ApiError::rejected("bad file")));
    let recorder = Arc::new(Recorder::default());
    let client = client(&api, &recorder, PollPolicy::default());

    let err = client.submit(audio()).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Rejected);
    assert_eq!(err.message, "bad file");
    assert_eq!(client.current_state().phase, Phase::Idle);

    advance(10).await;
    assert!(api.polled().is_empty());
    assert!(recorder.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_discards_the_outstanding_response() {
    let api = Arc::new(ScriptedApi::new().accept("abc").script(
        "abc",
        vec![
            Step::Reply(Ok(processing(Some(30)))),
            Step::Delayed(Duration::from_secs(5), Ok(completed("too late"))),
        ],
    ));
    let recorder = Arc::new(Recorder::default());
    let client = client(&api, &recorder, PollPolicy::default());

    client.submit(audio()).await.expect("accepted");
    // Second poll goes out at 4s and would answer at 9s.
    advance(5).await;
    client.cancel();
    assert_eq!(client.current_state().phase, Phase::Cancelled);

    advance(20).await;

    assert_eq!(recorder.percents(), vec![30]);
    let terminals = recorder.terminals();
    assert_eq!(terminals.len(), 1);
    assert_eq!(terminals[0].outcome, TerminalOutcome::Cancelled);
    assert_eq!(client.current_state().phase, Phase::Cancelled);
    assert_eq!(api.polled().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn new_submit_supersedes_previous_job() {
    let api = Arc::new(
        ScriptedApi::new()
            .accept("first")
            .accept("second")
            .script(
                "first",
                vec![
                    Step::Reply(Ok(processing(Some(10)))),
                    Step::Reply(Ok(completed("stale"))),
                ],
            )
            .script(
                "second",
                vec![
                    Step::Reply(Ok(processing(Some(60)))),
                    Step::Reply(Ok(completed("fresh"))),
                ],
            ),
    );
    let recorder = Arc::new(Recorder::default());
    let client = client(&api, &recorder, PollPolicy::default());

    client.submit(audio()).await.expect("first accepted");
    advance(3).await;
    let handle = client.submit(audio()).await.expect("second accepted");
    assert_eq!(handle.job_id(), &JobId::from("second"));

    advance(10).await;

    let polled = api.polled();
    assert_eq!(
        polled,
        vec![
            JobId::from("first"),
            JobId::from("second"),
            JobId::from("second")
        ]
    );
    assert_eq!(recorder.percents(), vec![10, 60, 100]);
    let terminals = recorder.terminals();
    assert_eq!(terminals.len(), 1);
    assert_eq!(terminals[0].job_id, Some(JobId::from("second")));
    assert!(handle.epoch() > 0);
}

#[tokio::test(start_paused = true)]
async fn job_times_out_on_the_first_tick_past_the_deadline() {
    let api = Arc::new(ScriptedApi::new().accept("slow"));
    let recorder = Arc::new(Recorder::default());
    let policy = PollPolicy::default().with_max_duration(Duration::from_secs(10));
    let client = client(&api, &recorder, policy);

    client.submit(audio()).await.expect("accepted");
    advance(13).await;

    // Ticks at 2, 4, 6, 8 and 10 poll; the tick at 12 times out.
    assert_eq!(api.polled().len(), 5);
    let terminals = recorder.terminals();
    assert_eq!(terminals.len(), 1);
    assert_eq!(terminals[0].phase, Phase::TimedOut);
    assert!(matches!(terminals[0].outcome, TerminalOutcome::TimedOut(_)));

    advance(30).await;
    assert_eq!(api.polled().len(), 5);
    assert_eq!(recorder.terminals().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_errors_keep_polling() {
    let api = Arc::new(ScriptedApi::new().accept("abc").script(
        "abc",
        vec![
            Step::Reply(Err(network_down())),
            Step::Reply(Ok(processing(Some(20)))),
            Step::Reply(Err(ApiError::new(FailureKind::HttpStatus(503), "busy"))),
            Step::Reply(Ok(completed("done"))),
        ],
    ));
    let recorder = Arc::new(Recorder::default());
    let client = client(&api, &recorder, PollPolicy::default());

    client.submit(audio()).await.expect("accepted");
    advance(9).await;

    assert_eq!(api.polled().len(), 4);
    assert_eq!(recorder.percents(), vec![20, 100]);
    assert_eq!(client.current_state().phase, Phase::Completed);
}

#[tokio::test(start_paused = true)]
async fn server_failure_is_terminal() {
    let api = Arc::new(ScriptedApi::new().accept("abc").script(
        "abc",
        vec![
            Step::Reply(Ok(processing(Some(50)))),
            Step::Reply(Ok(ServerStatus::Failed {
                error: Some("whisper crashed".to_string()),
            })),
        ],
    ));
    let recorder = Arc::new(Recorder::default());
    let client = client(&api, &recorder, PollPolicy::default());

    client.submit(audio()).await.expect("accepted");
    advance(20).await;

    let terminals = recorder.terminals();
    assert_eq!(terminals.len(), 1);
    assert_eq!(
        terminals[0].outcome,
        TerminalOutcome::Failed("whisper crashed".to_string())
    );
    let job = client.current_state();
    assert_eq!(job.phase, Phase::Failed);
    assert_eq!(job.progress_percent, 50);
    assert_eq!(job.error.as_deref(), Some("whisper crashed"));
    assert_eq!(api.polled().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_upload_supersedes_the_submission() {
    let api = Arc::new(ScriptedApi::new().accept_after(Duration::from_secs(3), "abc"));
    let recorder = Arc::new(Recorder::default());
    let client = Arc::new(client(&api, &recorder, PollPolicy::default()));

    let canceller = {
        let client = client.clone();
        tokio::spawn(async move {
            advance(1).await;
            client.cancel();
        })
    };

    let err = client.submit(audio()).await.unwrap_err();
    canceller.await.unwrap();
    assert_eq!(err.kind, FailureKind::Superseded);

    advance(10).await;
    assert!(api.polled().is_empty());
    let terminals = recorder.terminals();
    assert_eq!(terminals.len(), 1);
    assert_eq!(terminals[0].job_id, None);
    assert_eq!(terminals[0].phase, Phase::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn clear_stops_polling_without_events() {
    let api = Arc::new(ScriptedApi::new().accept("abc"));
    let recorder = Arc::new(Recorder::default());
    let client = client(&api, &recorder, PollPolicy::default());

    client.submit(audio()).await.expect("accepted");
    advance(3).await;
    client.clear();
    let polled_before = api.polled().len();
    let events_before = recorder.events().len();

    advance(10).await;
    assert_eq!(client.current_state().phase, Phase::Idle);
    assert_eq!(api.polled().len(), polled_before);
    assert_eq!(recorder.events().len(), events_before);
    assert!(recorder.terminals().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_client_stops_the_loop() {
    let api = Arc::new(ScriptedApi::new().accept("abc"));
    let recorder = Arc::new(Recorder::default());
    let client = client(&api, &recorder, PollPolicy::default());

    client.submit(audio()).await.expect("accepted");
    advance(3).await;
    drop(client);
    let polled_before = api.polled().len();

    advance(10).await;
    assert_eq!(api.polled().len(), polled_before);
}

#[tokio::test(start_paused = true)]
async fn view_is_dirty_only_after_changes() {
    let api = Arc::new(
        ScriptedApi::new()
            .accept("abc")
            .script("abc", vec![Step::Reply(Ok(processing(Some(25))))]),
    );
    let recorder = Arc::new(Recorder::default());
    let client = client(&api, &recorder, PollPolicy::default());

    client.submit(audio()).await.expect("accepted");
    let view = client.take_view_if_dirty().expect("dirty after submit");
    assert_eq!(view.phase, Phase::Processing);
    assert!(client.take_view_if_dirty().is_none());

    advance(3).await;
    let view = client.take_view_if_dirty().expect("dirty after progress");
    assert_eq!(view.progress_percent, 25);
    assert!(view.show_progress);
}

/// Presses cancel from inside the progress callback once `threshold` is
/// reached, the way a UI forwards a click it handles during a redraw.
struct CancelAt {
    threshold: u8,
    client: OnceLock<Weak<JobClient>>,
    recorder: Recorder,
}

impl JobObserver for CancelAt {
    fn on_progress(&self, event: &ProgressEvent) {
        self.recorder.on_progress(event);
        if event.percent >= self.threshold {
            if let Some(client) = self.client.get().and_then(Weak::upgrade) {
                client.cancel();
            }
        }
    }

    fn on_terminal(&self, event: &TerminalEvent) {
        self.recorder.on_terminal(event);
    }
}

#[tokio::test(start_paused = true)]
async fn observer_can_cancel_from_progress_callback() {
    let api = Arc::new(ScriptedApi::new().accept("abc").script(
        "abc",
        vec![
            Step::Reply(Ok(processing(Some(20)))),
            Step::Reply(Ok(processing(Some(60)))),
            Step::Reply(Ok(completed("never seen"))),
        ],
    ));
    let observer = Arc::new(CancelAt {
        threshold: 50,
        client: OnceLock::new(),
        recorder: Recorder::default(),
    });
    let client = Arc::new(JobClient::new(
        api.clone(),
        observer.clone(),
        PollPolicy::default(),
    ));
    assert!(observer.client.set(Arc::downgrade(&client)).is_ok());

    client.submit(audio()).await.expect("accepted");
    advance(20).await;

    assert_eq!(observer.recorder.percents(), vec![20, 60]);
    let terminals = observer.recorder.terminals();
    assert_eq!(terminals.len(), 1);
    assert_eq!(terminals[0].outcome, TerminalOutcome::Cancelled);
    assert_eq!(terminals[0].job_id, Some(JobId::from("abc")));
    assert_eq!(client.current_state().phase, Phase::Cancelled);
    assert_eq!(api.polled().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_racing_acceptance_never_leaves_a_live_handle_behind() {
    for _ in 0..50 {
        let api = Arc::new(ScriptedApi::new().accept("abc"));
        let recorder = Arc::new(Recorder::default());
        let client = Arc::new(client(&api, &recorder, PollPolicy::default()));

        let canceller = {
            let client = client.clone();
            tokio::spawn(async move {
                while client.current_state().phase != Phase::Cancelled {
                    client.cancel();
                    tokio::task::yield_now().await;
                }
            })
        };
        let submitted = client.submit(audio()).await;
        canceller.await.unwrap();

        let terminals = recorder.terminals();
        assert_eq!(terminals.len(), 1);
        assert_eq!(terminals[0].outcome, TerminalOutcome::Cancelled);
        match submitted {
            Ok(handle) => assert_eq!(terminals[0].job_id.as_ref(), Some(handle.job_id())),
            Err(err) => assert_eq!(err.kind, FailureKind::Superseded),
        }
        assert!(api.polled().is_empty());
    }
}

#[tokio::test]
async fn http_client_drives_a_job_to_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribir"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "abc"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/estado/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "processing",
            "filename": "talk.mp3",
            "progress": 40
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/estado/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "completed",
            "progress": 100,
            "transcripcion": "hello",
            "saved_as": "opinion_1.txt"
        })))
        .mount(&server)
        .await;

    let api = HttpClient::new(ApiSettings {
        base_url: server.uri(),
        ..ApiSettings::default()
    })
    .unwrap();
    let (observer, mut receivers) = WatchObserver::new();
    let policy = PollPolicy::default().with_interval(Duration::from_millis(20));
    let client = JobClient::new(Arc::new(api), Arc::new(observer), policy);

    client.submit(audio()).await.expect("accepted");
    let terminal = tokio::time::timeout(
        Duration::from_secs(5),
        receivers.terminal.wait_for(|event| event.is_some()),
    )
    .await
    .expect("finished in time")
    .expect("observer alive")
    .clone()
    .expect("terminal event");

    assert_eq!(terminal.phase, Phase::Completed);
    match terminal.outcome {
        TerminalOutcome::Completed(result) => {
            assert_eq!(result.text, "hello");
            assert_eq!(result.saved_as.as_deref(), Some("opinion_1.txt"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let latest = receivers.progress.borrow().clone().expect("progress seen");
    assert_eq!(latest.percent, 100);
}
