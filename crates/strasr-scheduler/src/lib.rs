//! The dynamic micro-batching scheduler: a single FIFO queue of
//! `(stream, completion)` items, drained into bounded-size batches and
//! handed to a bounded pool of inference workers. Idle-sleep when the
//! queue is empty, otherwise drain non-blockingly up to the batch cap and
//! dispatch immediately. `max_wait_ms` bounds idle latency; it is not a
//! coalescing window.

mod config;
mod error;

pub use config::SchedulerConfig;
pub use error::SchedulerError;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use strasr_base::log_error;
use strasr_core::{Decoder, StreamState};
use strasr_model::{EncoderModel, JoinerModel, PredictorModel};
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;

type Completion<S> = oneshot::Sender<(StreamState<S>, Result<(), SchedulerError>)>;

struct QueueItem<S> {
    stream: StreamState<S>,
    completion: Completion<S>,
}

/// A handle to a running scheduler loop. Cloning shares the same queue;
/// dropping every clone (and the loop's receiver observing that) ends the
/// loop once its current batch, if any, finishes.
#[derive(Clone)]
pub struct BatchScheduler<S> {
    sender: mpsc::UnboundedSender<QueueItem<S>>,
}

impl<S: Send + 'static> BatchScheduler<S> {
    /// Spawns the scheduler's poll loop as a tokio task and returns a handle
    /// to submit work to it, plus the loop's `JoinHandle` for shutdown.
    pub fn spawn<E, P, J>(
        encoder: Arc<E>,
        decoder: Arc<Decoder<P, J>>,
        config: SchedulerConfig,
    ) -> (Self, JoinHandle<()>)
    where
        E: EncoderModel<State = S> + 'static,
        P: PredictorModel + 'static,
        J: JoinerModel + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(scheduler_loop(receiver, encoder, decoder, config));
        (Self { sender }, handle)
    }

    /// Enqueues `stream` for the next batch and awaits its completion.
    /// Returns the stream back to the caller regardless of outcome. On
    /// `Err`, the stream's state was left untouched by this round and the
    /// caller (the connection handler) closes with an error.
    ///
    /// Panics if the scheduler loop has already exited; callers only ever
    /// submit while the server is still running.
    pub async fn submit(&self, mut stream: StreamState<S>) -> (StreamState<S>, Result<(), SchedulerError>) {
        stream.pending = true;
        let (completion, receiver) = oneshot::channel();
        self.sender
            .send(QueueItem { stream, completion })
            .unwrap_or_else(|_| panic!("scheduler loop task has exited"));
        let (mut stream, result) = receiver
            .await
            .expect("scheduler loop dropped a completion sender without replying");
        stream.pending = false;
        (stream, result)
    }
}

async fn scheduler_loop<S, E, P, J>(
    mut receiver: mpsc::UnboundedReceiver<QueueItem<S>>,
    encoder: Arc<E>,
    decoder: Arc<Decoder<P, J>>,
    config: SchedulerConfig,
) where
    S: Send + 'static,
    E: EncoderModel<State = S> + 'static,
    P: PredictorModel + 'static,
    J: JoinerModel + 'static,
{
    let permits = Arc::new(Semaphore::new(config.pool_size.max(1)));

    loop {
        let mut batch = Vec::with_capacity(config.max_batch_size);
        while batch.len() < config.max_batch_size {
            match receiver.try_recv() {
                Ok(item) => batch.push(item),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if batch.is_empty() {
                        return;
                    }
                    break;
                }
            }
        }

        if batch.is_empty() {
            tokio::time::sleep(Duration::from_millis(config.max_wait_ms)).await;
            continue;
        }

        for item in &batch {
            debug_assert!(
                item.stream.feature_count() >= item.stream.chunk_length(),
                "scheduler precondition violated: stream enqueued without a full chunk"
            );
        }

        let encoder = Arc::clone(&encoder);
        let decoder = Arc::clone(&decoder);
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .expect("semaphore is never closed");

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            run_batch(&encoder, &decoder, batch);
        });
    }
}

fn run_batch<S, E, P, J>(encoder: &E, decoder: &Decoder<P, J>, batch: Vec<QueueItem<S>>)
where
    E: EncoderModel<State = S>,
    P: PredictorModel,
    J: JoinerModel,
{
    let chunks: Vec<_> = batch.iter().map(|item| item.stream.take_chunk()).collect();
    let states: Vec<S> = batch.iter().map(|item| item.stream.encoder_state.clone()).collect();
    let stacked = encoder.stack_states(states);

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        encoder.forward(&chunks, stacked)
    }));

    match outcome {
        Ok((outputs, new_stacked)) => {
            let new_states = encoder.unstack_states(new_stacked);
            for ((mut item, encoder_out), new_state) in
                batch.into_iter().zip(outputs).zip(new_states)
            {
                item.stream.encoder_state = new_state;
                decoder.process(item.stream.decode_target(), &encoder_out);
                item.stream.advance();
                let _ = item.completion.send((item.stream, Ok(())));
            }
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            log_error!("inference batch of {} streams failed: {message}", batch_len_hint(&batch));
            for item in batch {
                let _ = item
                    .completion
                    .send((item.stream, Err(SchedulerError::InferenceFailure(message.clone()))));
            }
        }
    }
}

fn batch_len_hint<S>(batch: &[QueueItem<S>]) -> usize {
    batch.len()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use strasr_model::fakes::{
        FakeEncoderModel, FakeFeatureExtractor, FakeJoinerModel, FakePredictorModel, FakeTokenizer,
        HOP_SAMPLES,
    };
    use std::time::Duration;

    /// Wraps `FakeEncoderModel` with an invocation counter so tests can
    /// assert how many batched `forward` calls a round of submissions
    /// actually produced.
    struct CountingEncoder {
        inner: FakeEncoderModel,
        calls: AtomicUsize,
    }

    impl CountingEncoder {
        fn new() -> Self {
            Self { inner: FakeEncoderModel, calls: AtomicUsize::new(0) }
        }
    }

    impl EncoderModel for CountingEncoder {
        type State = <FakeEncoderModel as EncoderModel>::State;
        type StackedState = <FakeEncoderModel as EncoderModel>::StackedState;

        fn segment_length(&self) -> usize {
            self.inner.segment_length()
        }

        fn right_context_length(&self) -> usize {
            self.inner.right_context_length()
        }

        fn feature_dim(&self) -> usize {
            self.inner.feature_dim()
        }

        fn hidden_dim(&self) -> usize {
            self.inner.hidden_dim()
        }

        fn initial_state(&self) -> Self::State {
            self.inner.initial_state()
        }

        fn stack_states(&self, states: Vec<Self::State>) -> Self::StackedState {
            self.inner.stack_states(states)
        }

        fn unstack_states(&self, stacked: Self::StackedState) -> Vec<Self::State> {
            self.inner.unstack_states(stacked)
        }

        fn forward(
            &self,
            chunks: &[Vec<Vec<f32>>],
            stacked_state: Self::StackedState,
        ) -> (Vec<Vec<Vec<f32>>>, Self::StackedState) {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.inner.forward(chunks, stacked_state)
        }
    }

    fn build_stream<E: EncoderModel<State = Vec<f32>>>(
        encoder: &E,
        decoder: &Decoder<FakePredictorModel, FakeJoinerModel>,
    ) -> StreamState<Vec<f32>> {
        StreamState::new(
            Box::new(FakeFeatureExtractor::new()),
            encoder.initial_state(),
            decoder.init_state(),
            encoder.chunk_length(),
            encoder.segment_length(),
        )
    }

    #[tokio::test]
    async fn submit_returns_advanced_stream() {
        let encoder = Arc::new(FakeEncoderModel);
        let decoder = Arc::new(Decoder::Greedy { predictor: FakePredictorModel, joiner: FakeJoinerModel });
        let config = SchedulerConfig { max_batch_size: 4, max_wait_ms: 5, pool_size: 1 };
        let (scheduler, _handle) = BatchScheduler::spawn(Arc::clone(&encoder), Arc::clone(&decoder), config);

        let mut stream = build_stream(encoder.as_ref(), &decoder);
        let samples = vec![15.0f32; HOP_SAMPLES * encoder.chunk_length()];
        stream.accept_waveform(16_000, &samples).unwrap();
        let before = stream.feature_count();

        let (stream, result) = scheduler.submit(stream).await;
        assert!(result.is_ok());
        assert_eq!(stream.feature_count(), before - encoder.segment_length());
        assert!(!stream.pending);
    }

    #[tokio::test]
    async fn batches_concurrent_submissions_together() {
        let encoder = Arc::new(CountingEncoder::new());
        let decoder = Arc::new(Decoder::Greedy { predictor: FakePredictorModel, joiner: FakeJoinerModel });
        let config = SchedulerConfig { max_batch_size: 4, max_wait_ms: 50, pool_size: 1 };
        let (scheduler, _handle) = BatchScheduler::spawn(Arc::clone(&encoder), Arc::clone(&decoder), config);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let mut stream = build_stream(encoder.as_ref(), &decoder);
            let samples = vec![15.0f32; HOP_SAMPLES * encoder.chunk_length()];
            stream.accept_waveform(16_000, &samples).unwrap();
            let scheduler = scheduler.clone();
            handles.push(tokio::spawn(async move { scheduler.submit(stream).await }));
        }

        for handle in handles {
            let (_stream, result) = handle.await.unwrap();
            assert!(result.is_ok());
        }

        assert_eq!(
            encoder.calls.load(AtomicOrdering::SeqCst),
            1,
            "four concurrently-submitted streams should collapse into one batched encoder call"
        );
    }

    #[tokio::test]
    async fn decoded_text_is_nonempty_for_loud_audio() {
        let encoder = Arc::new(FakeEncoderModel);
        let decoder = Arc::new(Decoder::Greedy { predictor: FakePredictorModel, joiner: FakeJoinerModel });
        let config = SchedulerConfig { max_batch_size: 4, max_wait_ms: 5, pool_size: 1 };
        let (scheduler, _handle) = BatchScheduler::spawn(Arc::clone(&encoder), Arc::clone(&decoder), config);

        let mut stream = build_stream(encoder.as_ref(), &decoder);
        let samples = vec![25.0f32; HOP_SAMPLES * encoder.chunk_length()];
        stream.accept_waveform(16_000, &samples).unwrap();

        let (stream, result) = scheduler.submit(stream).await;
        assert!(result.is_ok());
        let tokenizer = FakeTokenizer;
        assert!(!stream.current_text(&tokenizer).is_empty());
        // idle poll should not busy-loop; give the loop a tick to settle.
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
