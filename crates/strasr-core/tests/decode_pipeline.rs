use strasr_core::{Decoder, StreamState};
use strasr_model::fakes::{
    FakeEncoderModel, FakeFeatureExtractor, FakeJoinerModel, FakePredictorModel, FakeTokenizer,
    HOP_SAMPLES, SEGMENT_LENGTH,
};
use strasr_model::{EncoderModel, Tokenizer};

fn build_stream(decoder: &Decoder<FakePredictorModel, FakeJoinerModel>) -> StreamState<Vec<f32>> {
    let encoder = FakeEncoderModel;
    StreamState::new(
        Box::new(FakeFeatureExtractor::new()),
        encoder.initial_state(),
        decoder.init_state(),
        encoder.chunk_length(),
        encoder.segment_length(),
    )
}

/// Feeds one full chunk of loud audio through feature extraction, the fake
/// encoder, and greedy decoding, and checks the pipeline round-trips to
/// non-empty text.
#[test]
fn full_chunk_round_trips_to_text() {
    let decoder = Decoder::Greedy { predictor: FakePredictorModel, joiner: FakeJoinerModel };
    let encoder = FakeEncoderModel;
    let mut stream = build_stream(&decoder);

    let samples = vec![20.0f32; HOP_SAMPLES * encoder.chunk_length()];
    stream.accept_waveform(16_000, &samples).unwrap();
    assert_eq!(stream.feature_count(), encoder.chunk_length());

    let chunk = stream.take_chunk();
    let (mut outputs, mut state) = encoder.forward(&[chunk], vec![stream.encoder_state.clone()]);
    let encoder_frames = outputs.remove(0);
    stream.encoder_state = state.remove(0);
    stream.advance();

    decoder.process(stream.decode_target(), &encoder_frames);

    let tokenizer = FakeTokenizer;
    let text = stream.current_text(&tokenizer);
    assert!(!text.is_empty());
}

/// Silence should never produce a non-blank token under the fake joiner's
/// energy scoring, so the transcription should stay empty across several
/// chunks.
#[test]
fn silence_stays_empty_across_chunks() {
    let decoder = Decoder::Greedy { predictor: FakePredictorModel, joiner: FakeJoinerModel };
    let encoder = FakeEncoderModel;
    let mut stream = build_stream(&decoder);

    for _ in 0..3 {
        let samples = vec![0.0f32; HOP_SAMPLES * SEGMENT_LENGTH];
        stream.accept_waveform(16_000, &samples).unwrap();
        if stream.feature_count() < stream.chunk_length() {
            continue;
        }
        let chunk = stream.take_chunk();
        let (mut outputs, mut state) = encoder.forward(&[chunk], vec![stream.encoder_state.clone()]);
        let encoder_frames = outputs.remove(0);
        stream.encoder_state = state.remove(0);
        stream.advance();
        decoder.process(stream.decode_target(), &encoder_frames);
    }

    let tokenizer = FakeTokenizer;
    assert_eq!(stream.current_text(&tokenizer), "");
}
