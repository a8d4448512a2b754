//! Background thread for segmentation calls.
//!
//! The UI thread submits requests and polls for results without blocking.
//! Requests are served one at a time in submission order.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use super::{
    RequestTicket, SegmentationBackend, SegmentationError, SegmentationRequest, SegmentationResult,
};

/// Message sent to the worker thread.
enum WorkerMessage {
    Segment {
        ticket: RequestTicket,
        request: SegmentationRequest,
    },
    Shutdown,
}

/// Owns the background thread that runs a [`SegmentationBackend`].
pub struct SegmentationWorker {
    request_tx: Sender<WorkerMessage>,
    result_rx: Receiver<SegmentationResult>,
    thread_handle: Option<JoinHandle<()>>,
    /// Submitted but not yet collected, oldest first
    in_flight: VecDeque<RequestTicket>,
    disconnected: bool,
}

impl SegmentationWorker {
    /// Spawn a worker thread that owns `backend`.
    pub fn spawn(backend: Box<dyn SegmentationBackend>) -> Result<Self, SegmentationError> {
        let (request_tx, request_rx) = mpsc::channel::<WorkerMessage>();
        let (result_tx, result_rx) = mpsc::channel::<SegmentationResult>();

        let thread_handle = thread::Builder::new()
            .name("segmentation".to_string())
            .spawn(move || {
                log::debug!("Segmentation worker started");
                Self::thread_loop(backend, request_rx, result_tx);
                log::debug!("Segmentation worker exiting");
            })?;

        Ok(Self {
            request_tx,
            result_rx,
            thread_handle: Some(thread_handle),
            in_flight: VecDeque::new(),
            disconnected: false,
        })
    }

    fn thread_loop(
        backend: Box<dyn SegmentationBackend>,
        request_rx: Receiver<WorkerMessage>,
        result_tx: Sender<SegmentationResult>,
    ) {
        loop {
            match request_rx.recv() {
                Ok(WorkerMessage::Segment { ticket, request }) => {
                    let outcome = backend.segment(&request);
                    if let Err(e) = &outcome {
                        log::debug!("Segmentation {:?} failed: {}", ticket, e);
                    }
                    if result_tx.send(SegmentationResult { ticket, outcome }).is_err() {
                        log::warn!("Result channel closed, segmentation worker exiting");
                        break;
                    }
                }
                Ok(WorkerMessage::Shutdown) => break,
                // Channel closed, exit
                Err(_) => break,
            }
        }
    }

    /// Queue a request. If the thread is gone, the failure is reported
    /// through [`Self::try_result`] like any other failed call.
    pub fn submit(&mut self, ticket: RequestTicket, request: SegmentationRequest) -> Result<(), SegmentationError> {
        self.request_tx
            .send(WorkerMessage::Segment { ticket, request })
            .map_err(|_| {
                self.disconnected = true;
                SegmentationError::Disconnected
            })?;
        self.in_flight.push_back(ticket);
        log::debug!("Submitted segmentation {:?}", ticket);
        Ok(())
    }

    /// Take one finished result, if any. Non-blocking.
    ///
    /// Once the thread is gone every request still in flight comes back as
    /// [`SegmentationError::Disconnected`].
    pub fn try_result(&mut self) -> Option<SegmentationResult> {
        match self.result_rx.try_recv() {
            Ok(result) => {
                self.collected(result.ticket);
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if !self.disconnected {
                    log::warn!(
                        "Segmentation worker disconnected with {} pending",
                        self.in_flight.len()
                    );
                    self.disconnected = true;
                }
                let ticket = self.in_flight.pop_front()?;
                Some(SegmentationResult {
                    ticket,
                    outcome: Err(SegmentationError::Disconnected),
                })
            }
        }
    }

    /// Wait for the next result. Used by tests and headless tools.
    pub fn wait_result(&mut self) -> Option<SegmentationResult> {
        let result = self.result_rx.recv().ok()?;
        self.collected(result.ticket);
        Some(result)
    }

    fn collected(&mut self, ticket: RequestTicket) {
        if let Some(pos) = self.in_flight.iter().position(|t| *t == ticket) {
            self.in_flight.remove(pos);
        }
    }

    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether the thread has stopped answering.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Shut the worker down and hand back the tickets it never answered.
    pub fn abandon(mut self) -> Vec<RequestTicket> {
        // Detached, the thread ends once its current call returns
        self.thread_handle.take();
        self.in_flight.drain(..).collect()
    }
}

impl Drop for SegmentationWorker {
    fn drop(&mut self) {
        let _ = self.request_tx.send(WorkerMessage::Shutdown);
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        if !self.in_flight.is_empty() {
            // A call is still running and may never return. The thread exits
            // on its own once it finds the result channel closed.
            log::debug!(
                "Detaching segmentation worker with {} pending",
                self.in_flight.len()
            );
            return;
        }
        if handle.join().is_err() {
            log::error!("Segmentation worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Point;
    use crate::segmentation::SegmentationProposal;
    use std::time::{Duration, Instant};

    struct Echo;

    impl SegmentationBackend for Echo {
        fn segment(
            &self,
            request: &SegmentationRequest,
        ) -> Result<SegmentationProposal, SegmentationError> {
            if request.x < 0 {
                return Err(SegmentationError::rejected("negative click"));
            }
            let (x, y) = (request.x as f32, request.y as f32);
            Ok(SegmentationProposal {
                points: vec![Point::new(x, y), Point::new(x + 1.0, y), Point::new(x, y + 1.0)],
                confidence: 0.75,
                algorithm: "echo".to_string(),
            })
        }
    }

    struct Panics;

    impl SegmentationBackend for Panics {
        fn segment(
            &self,
            _request: &SegmentationRequest,
        ) -> Result<SegmentationProposal, SegmentationError> {
            panic!("backend crashed");
        }
    }

    struct Slow(Duration);

    impl SegmentationBackend for Slow {
        fn segment(
            &self,
            _request: &SegmentationRequest,
        ) -> Result<SegmentationProposal, SegmentationError> {
            thread::sleep(self.0);
            Err(SegmentationError::EmptyResult)
        }
    }

    fn poll(worker: &mut SegmentationWorker) -> SegmentationResult {
        for _ in 0..500 {
            if let Some(result) = worker.try_result() {
                return result;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("no result from worker");
    }

    fn request(x: f32) -> SegmentationRequest {
        SegmentationRequest::new("img", Point::new(x, 5.0), 100, 100)
    }

    #[test]
    fn test_results_come_back_in_order() {
        let mut worker = SegmentationWorker::spawn(Box::new(Echo)).unwrap();
        worker.submit(RequestTicket(1), request(10.0)).unwrap();
        worker.submit(RequestTicket(2), request(-3.0)).unwrap();
        assert_eq!(worker.pending(), 2);

        let first = worker.wait_result().unwrap();
        assert_eq!(first.ticket, RequestTicket(1));
        assert_eq!(first.outcome.unwrap().points[0], Point::new(10.0, 5.0));

        let second = worker.wait_result().unwrap();
        assert_eq!(second.ticket, RequestTicket(2));
        assert!(matches!(second.outcome, Err(SegmentationError::Rejected(_))));
        assert_eq!(worker.pending(), 0);
        assert!(worker.try_result().is_none());
    }

    #[test]
    fn test_dead_thread_fails_pending_requests() {
        let mut worker = SegmentationWorker::spawn(Box::new(Panics)).unwrap();
        worker.submit(RequestTicket(7), request(10.0)).unwrap();

        let result = poll(&mut worker);
        assert_eq!(result.ticket, RequestTicket(7));
        assert!(matches!(result.outcome, Err(SegmentationError::Disconnected)));
        assert!(worker.is_disconnected());
        assert_eq!(worker.pending(), 0);
        assert!(worker.try_result().is_none());
    }

    #[test]
    fn test_drop_does_not_wait_for_running_call() {
        let mut worker = SegmentationWorker::spawn(Box::new(Slow(Duration::from_secs(3)))).unwrap();
        worker.submit(RequestTicket(1), request(10.0)).unwrap();
        // Let the thread pick the request up
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        drop(worker);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_abandon_returns_unanswered_tickets() {
        let mut worker = SegmentationWorker::spawn(Box::new(Slow(Duration::from_secs(3)))).unwrap();
        worker.submit(RequestTicket(1), request(10.0)).unwrap();
        worker.submit(RequestTicket(2), request(20.0)).unwrap();
        assert_eq!(worker.abandon(), vec![RequestTicket(1), RequestTicket(2)]);
    }
}
