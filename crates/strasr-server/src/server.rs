use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use strasr_base::{log_info, log_warn};
use strasr_core::{Decoder, StreamState};
use strasr_model::{EncoderModel, FeatureExtractor, JoinerModel, PredictorModel, Tokenizer};
use strasr_scheduler::{BatchScheduler, SchedulerConfig};
use strasr_wire::{framing, ServerFrame};
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handler::{log_handler_error, run_connection};

const OVERLOAD_HINT: &str = "The server is overloaded. Please retry later.";

/// Admission control, the listener accept loop, and ownership of the single
/// `BatchScheduler` worker loop for the process's lifetime.
pub struct Server<E, P, J, T> {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    active_connections: Arc<AtomicUsize>,
    encoder: Arc<E>,
    decoder: Arc<Decoder<P, J>>,
    scheduler: BatchScheduler<E::State>,
    tokenizer: Arc<T>,
}

impl<E, P, J, T> Server<E, P, J, T>
where
    E: EncoderModel + 'static,
    P: PredictorModel + 'static,
    J: JoinerModel + 'static,
    T: Tokenizer + 'static,
{
    /// Validates `config`, binds the listener, and starts the scheduler's
    /// worker loop. Fails fast on a bad config or an unavailable port; model
    /// construction (`ModelLoadFailure`) happens in the caller before this is
    /// reached, so `encoder`/`decoder`/`tokenizer` are assumed already valid.
    pub async fn bind(
        config: ServerConfig,
        encoder: E,
        decoder: Decoder<P, J>,
        tokenizer: T,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .map_err(ServerError::Bind)?;

        let scheduler_config = SchedulerConfig {
            max_batch_size: config.max_batch_size,
            max_wait_ms: config.max_wait_ms,
            pool_size: config.nn_pool_size,
        };

        let encoder = Arc::new(encoder);
        let decoder = Arc::new(decoder);
        let (scheduler, _loop_handle) =
            BatchScheduler::spawn(Arc::clone(&encoder), Arc::clone(&decoder), scheduler_config);

        log_info!("server bound on port {}", config.port);

        Ok(Self {
            listener,
            config: Arc::new(config),
            active_connections: Arc::new(AtomicUsize::new(0)),
            encoder,
            decoder,
            scheduler,
            tokenizer: Arc::new(tokenizer),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Runs the accept loop forever. `feature_extractor_factory` builds a
    /// fresh per-connection `FeatureExtractor` (it carries its own PCM
    /// buffering state, so it cannot be shared across streams).
    pub async fn serve<F>(self: Arc<Self>, feature_extractor_factory: F)
    where
        F: Fn() -> Box<dyn FeatureExtractor> + Send + Sync + 'static,
    {
        let feature_extractor_factory = Arc::new(feature_extractor_factory);
        loop {
            let (mut socket, _addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    log_warn!("accept failed: {err}");
                    continue;
                }
            };

            if !self.try_admit() {
                log_warn!(
                    "rejecting connection: at capacity ({})",
                    self.config.max_active_connections
                );
                let _ = framing::write_message(
                    &mut socket,
                    &ServerFrame::Error(OVERLOAD_HINT.to_string()),
                    self.config.max_message_size,
                )
                .await;
                continue;
            }

            log_info!(
                "connection admitted ({}/{})",
                self.active_connections(),
                self.config.max_active_connections
            );

            let this = Arc::clone(&self);
            let feature_extractor_factory = Arc::clone(&feature_extractor_factory);
            tokio::spawn(async move {
                let feature_extractor = (feature_extractor_factory)();
                this.run_one(socket, feature_extractor).await;
            });
        }
    }

    fn try_admit(&self) -> bool {
        self.active_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n < self.config.max_active_connections {
                    Some(n + 1)
                } else {
                    None
                }
            })
            .is_ok()
    }

    async fn run_one(self: Arc<Self>, socket: TcpStream, feature_extractor: Box<dyn FeatureExtractor>) {
        let stream = StreamState::new(
            feature_extractor,
            self.encoder.initial_state(),
            self.decoder.init_state(),
            self.encoder.chunk_length(),
            self.encoder.segment_length(),
        );

        let result = run_connection(
            socket,
            stream,
            self.scheduler.clone(),
            self.tokenizer.as_ref(),
            self.config.max_message_size,
            16_000,
            self.config.max_queue_size,
        )
        .await;

        self.active_connections.fetch_sub(1, Ordering::SeqCst);

        if let Err(err) = result {
            log_handler_error(&err);
        }
    }
}
