// tests/fake_process_host.rs

use std::sync::Arc;

use vreactor::errors::ReactorError;
use vreactor::process::{
    capture_output, is_same_transport, FakeProcessHost, ProcessEnded, ProcessHost,
    ProcessTransport, SpawnRequest, STDERR_FD, STDOUT_FD,
};
use vreactor_test_utils::{init_tracing, FiringLog, HandlerEvent, RecordingHandler};

#[test]
fn spawn_records_the_request() {
    init_tracing();
    let host = FakeProcessHost::new();
    let handler = RecordingHandler::new();

    let transport = host.spawn(
        handler.clone(),
        SpawnRequest::new("echo")
            .arg("hi")
            .working_path("/tmp")
            .uid(0)
            .gid(0)
            .use_pty(false),
    );

    let records = host.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].request.executable, "echo");
    assert_eq!(records[0].request.args, vec!["hi"]);
    assert!(records[0].request.env.is_empty());
    assert!(records[0].request.child_fds.is_none());
    assert!(is_same_transport(&records[0].transport, &transport));
}

#[test]
fn handler_gets_the_returned_transport_before_spawn_returns() {
    let host = FakeProcessHost::new();
    let handler = RecordingHandler::new();

    let transport = host.spawn(handler.clone(), SpawnRequest::new("true"));

    let seen = handler.transport().expect("connection_made was not called");
    assert!(is_same_transport(&seen, &transport));
    assert_eq!(
        handler.events(),
        vec![HandlerEvent::Connected {
            pid: transport.pid()
        }]
    );

    let record = host.record_for(&seen).expect("record for transport");
    assert!(is_same_transport(&record.transport, &transport));
}

#[test]
fn signals_through_the_transport_and_the_host_are_both_recorded() {
    let host = FakeProcessHost::new();
    let first = host.spawn(RecordingHandler::new(), SpawnRequest::new("a"));
    let second = host.spawn(RecordingHandler::new(), SpawnRequest::new("b"));

    first.signal_process("TERM").unwrap();
    host.signal(&first, "KILL");
    host.signal(&second, "INT");

    assert_eq!(first.signals(), vec!["TERM", "KILL"]);
    assert_eq!(second.signals(), vec!["INT"]);
}

#[test]
fn injected_output_and_exit_reach_the_handler_in_order() {
    init_tracing();
    let host = FakeProcessHost::new();
    let handler = RecordingHandler::new();
    let transport = host.spawn(handler.clone(), SpawnRequest::new("worker"));

    host.deliver_output(&transport, STDOUT_FD, b"hello ").unwrap();
    host.deliver_output(&transport, STDERR_FD, b"warn").unwrap();
    host.deliver_output(&transport, STDOUT_FD, b"world").unwrap();
    host.end_process(&transport, ProcessEnded::from_exit_code(2)).unwrap();

    assert_eq!(handler.output(STDOUT_FD), b"hello world");
    assert_eq!(handler.output(STDERR_FD), b"warn");
    assert_eq!(
        handler.ended(),
        Some(ProcessEnded::Terminated {
            exit_code: Some(2),
            signal: None
        })
    );
    assert_eq!(transport.ended(), handler.ended());

    assert!(matches!(
        host.deliver_output(&transport, STDOUT_FD, b"late"),
        Err(ReactorError::ProcessExitedAlready)
    ));
}

#[test]
fn capture_output_resolves_on_clean_exit() {
    let host = FakeProcessHost::new();
    let (result, handler) = capture_output();
    let transport = ProcessHost::spawn(&host, handler, SpawnRequest::new("echo").arg("hi")).unwrap();

    host.deliver_output(&transport, STDOUT_FD, b"hi\n").unwrap();
    assert!(result.is_pending());

    host.end_process(&transport, ProcessEnded::Done).unwrap();
    assert_eq!(result.value().as_deref(), Some(&b"hi\n".to_vec()));
}

#[test]
fn capture_output_fails_when_killed() {
    let host = FakeProcessHost::new();
    let (result, handler) = capture_output();
    let transport = host.spawn(handler, SpawnRequest::new("sleep").arg("100"));

    host.end_process(&transport, ProcessEnded::from_signal("KILL")).unwrap();

    let error = result.error().expect("capture should fail");
    assert!(matches!(
        error.as_ref(),
        ReactorError::ProcessTerminated { signal: Some(s), .. } if s == "KILL"
    ));
}

#[test]
fn the_host_is_also_a_virtual_scheduler() {
    let host = FakeProcessHost::new();
    let log = FiringLog::new();

    // A consumer that kills its child after a grace period.
    let transport = host.spawn(RecordingHandler::new(), SpawnRequest::new("server"));
    let victim: Arc<dyn ProcessTransport> = transport.clone();
    let killed = log.clone();
    host.clock()
        .schedule_after(30.0, move || {
            victim.signal_process("KILL").unwrap();
            killed.push("killed");
        })
        .unwrap();

    assert_eq!(host.timeout(), Some(30.0));
    host.advance(29.0).unwrap();
    assert!(transport.signals().is_empty());

    host.advance(1.0).unwrap();
    assert_eq!(transport.signals(), vec!["KILL"]);
    assert_eq!(log.entries(), vec!["killed"]);
    assert_eq!(host.timeout(), None);
}
