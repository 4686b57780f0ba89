use std::sync::Arc;

use strasr_base::log_info;
use strasr_core::Decoder;
use strasr_model::fakes::{FakeEncoderModel, FakeFeatureExtractor, FakeJoinerModel, FakePredictorModel, FakeTokenizer};
use strasr_server::{DecodingMethod, Server, ServerConfig};

/// Reference entrypoint. The real `EncoderModel`/`PredictorModel`/
/// `JoinerModel`/`Tokenizer` quartet is an opaque external collaborator this
/// workspace doesn't implement. A production deployment swaps the `Fake*`
/// adapters below for ones backed by a real neural runtime without touching
/// `strasr-core` or `strasr-scheduler`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    strasr_base::init_stdout_logger();

    let mut config = ServerConfig::default();
    if let Ok(port) = std::env::var("STRASR_PORT") {
        config.port = port.parse()?;
    }

    let decoder = match config.decoding_method {
        DecodingMethod::Greedy => Decoder::Greedy { predictor: FakePredictorModel, joiner: FakeJoinerModel },
        DecodingMethod::ModifiedBeam => Decoder::ModifiedBeam {
            predictor: FakePredictorModel,
            joiner: FakeJoinerModel,
            beam_size: config.num_active_paths,
        },
        DecodingMethod::FastBeam => Decoder::FastBeam {
            predictor: FakePredictorModel,
            joiner: FakeJoinerModel,
            beam: config.beam,
            max_states: config.max_states,
            max_contexts: config.max_contexts,
        },
    };

    let port = config.port;
    let server = Arc::new(Server::bind(config, FakeEncoderModel, decoder, FakeTokenizer).await?);
    log_info!("listening on port {port}");

    server.serve(|| Box::new(FakeFeatureExtractor::new())).await;
    Ok(())
}
