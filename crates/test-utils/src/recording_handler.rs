use std::sync::{Arc, Mutex};

use vreactor::process::{ProcessEnded, ProcessHandler, ProcessTransport};

/// One notification seen by a [`RecordingHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerEvent {
    Connected { pid: Option<u32> },
    Data { fd: u32, data: Vec<u8> },
    Ended(ProcessEnded),
}

/// A process handler that:
/// - records every notification in order
/// - keeps the transport it was handed in `connection_made`.
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<HandlerEvent>>,
    transport: Mutex<Option<Arc<dyn ProcessTransport>>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<HandlerEvent> {
        self.events.lock().unwrap().clone()
    }

    /// The transport passed to `connection_made`, if it was called.
    pub fn transport(&self) -> Option<Arc<dyn ProcessTransport>> {
        self.transport.lock().unwrap().clone()
    }

    /// All bytes received on `fd`, concatenated.
    pub fn output(&self, fd: u32) -> Vec<u8> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                HandlerEvent::Data { fd: f, data } if *f == fd => Some(data.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn ended(&self) -> Option<ProcessEnded> {
        self.events.lock().unwrap().iter().find_map(|e| match e {
            HandlerEvent::Ended(reason) => Some(reason.clone()),
            _ => None,
        })
    }
}

impl ProcessHandler for RecordingHandler {
    fn connection_made(&self, transport: Arc<dyn ProcessTransport>) {
        self.events.lock().unwrap().push(HandlerEvent::Connected {
            pid: transport.pid(),
        });
        *self.transport.lock().unwrap() = Some(transport);
    }

    fn child_data_received(&self, fd: u32, data: &[u8]) {
        self.events.lock().unwrap().push(HandlerEvent::Data {
            fd,
            data: data.to_vec(),
        });
    }

    fn process_ended(&self, reason: &ProcessEnded) {
        self.events
            .lock()
            .unwrap()
            .push(HandlerEvent::Ended(reason.clone()));
    }
}
