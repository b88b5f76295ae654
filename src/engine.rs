use crate::error::{RecognizeError, Result};
use crate::model::{InferenceModel, ProbabilityVector};
use crate::preprocess::InputTensor;
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
        mpsc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};
use tokio::sync::oneshot;

/// Represents the current state of the inference engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InferenceEngineState {
    /// The engine is waiting for work.
    Idle,
    /// The engine is currently running a forward pass.
    Processing,
}

impl InferenceEngineState {
    /// Returns the state as a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            InferenceEngineState::Idle => "idle",
            InferenceEngineState::Processing => "processing",
        }
    }
}

/// Reply sent back by the worker for one request.
pub struct InferenceEngineResponse {
    /// Identifier assigned when the request was scheduled.
    pub id: u64,
    /// Time at which the forward pass started.
    pub start_time: Instant,
    /// Time spent inside the model.
    pub duration: Duration,
    /// The model output, or the model's error message.
    pub result: std::result::Result<ProbabilityVector, String>,
}

struct InferenceEngineRequest {
    id: u64,
    tensor: InputTensor,
    reply: oneshot::Sender<InferenceEngineResponse>,
}

/// Runs a single [`InferenceModel`] on a dedicated worker thread.
///
/// Callers from any number of tasks share one engine; their requests are
/// queued and executed one at a time, so throughput is that of a single model
/// instance. Each request carries its own reply channel, which lets a caller
/// that gives up (disconnect, deadline) drop its receiver and have the worker
/// skip the request.
///
/// Dropping the engine joins the worker thread and blocks until the forward
/// pass in progress finishes. Drop the last handle outside async worker
/// threads (e.g. after the runtime has shut down or on `spawn_blocking`) when
/// the model is slow.
pub struct InferenceEngine {
    state: Arc<Mutex<InferenceEngineState>>,
    req_tx: Option<mpsc::Sender<InferenceEngineRequest>>,
    inference_handle: Option<JoinHandle<()>>,
    id_counter: AtomicU64,
}

impl InferenceEngine {
    /// Creates a new engine and moves `model` onto its worker thread.
    pub fn new<M>(mut model: M) -> Self
    where
        M: InferenceModel + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<InferenceEngineRequest>();
        let state = Arc::new(Mutex::new(InferenceEngineState::Idle));

        let inference_handle = std::thread::spawn({
            let state = state.clone();
            move || {
                while let Ok(req) = req_rx.recv() {
                    if req.reply.is_closed() {
                        log::debug!("Skipping inference {}: caller went away", req.id);
                        continue;
                    }

                    log::debug!("Scheduling inference {}", req.id);
                    set_state(&state, InferenceEngineState::Processing);
                    let start_time = Instant::now();

                    // A panicking model fails only its own request; the
                    // worker keeps serving and the state returns to idle.
                    let result = match panic::catch_unwind(AssertUnwindSafe(|| {
                        model.run(&req.tensor)
                    })) {
                        Ok(output) => output.map_err(|e| e.to_string()),
                        Err(payload) => Err(format!("model panicked: {}", panic_message(&*payload))),
                    };
                    let duration = start_time.elapsed();
                    set_state(&state, InferenceEngineState::Idle);

                    match &result {
                        Ok(probabilities) => log::debug!(
                            "Inference {} completed in {:?} with {} scores",
                            req.id,
                            duration,
                            probabilities.len()
                        ),
                        Err(e) => log::error!("Inference {} failed: {}", req.id, e),
                    }

                    let response = InferenceEngineResponse {
                        id: req.id,
                        start_time,
                        duration,
                        result,
                    };
                    if req.reply.send(response).is_err() {
                        log::debug!("Inference {} finished after its caller went away", req.id);
                    }
                }
                log::debug!("Inference worker stopped");
            }
        });

        Self {
            state,
            req_tx: Some(req_tx),
            inference_handle: Some(inference_handle),
            id_counter: AtomicU64::new(0),
        }
    }

    /// Returns the current state of the inference engine.
    pub fn state(&self) -> InferenceEngineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `tensor` and returns a receiver for the reply.
    pub fn schedule_inference(
        &self,
        tensor: InputTensor,
    ) -> Result<oneshot::Receiver<InferenceEngineResponse>> {
        let tx = self
            .req_tx
            .as_ref()
            .ok_or_else(|| RecognizeError::Inference("inference engine is stopped".to_string()))?;

        let id = self.id_counter.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        tx.send(InferenceEngineRequest { id, tensor, reply })
            .map_err(|_| {
                RecognizeError::Inference("inference worker is not running".to_string())
            })?;
        Ok(rx)
    }

    /// Runs `tensor` through the model and waits for the scores.
    pub async fn infer(&self, tensor: InputTensor) -> Result<ProbabilityVector> {
        let rx = self.schedule_inference(tensor)?;
        let response = rx.await.map_err(|_| {
            RecognizeError::Inference("inference worker exited before replying".to_string())
        })?;
        response.result.map_err(RecognizeError::Inference)
    }

    /// Stops the engine and waits for the worker thread to finish.
    ///
    /// Requests already queued are still processed before the worker exits.
    /// This blocks the calling thread.
    pub fn stop(&mut self) {
        self.req_tx.take();
        if let Some(handle) = self.inference_handle.take() {
            if handle.join().is_err() {
                log::error!("Inference worker panicked");
            }
        }
    }
}

impl Drop for InferenceEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

fn set_state(state: &Mutex<InferenceEngineState>, value: InferenceEngineState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = value;
}
