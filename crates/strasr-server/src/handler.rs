use crate::error::HandlerError;
use strasr_base::{log_info, log_warn};
use strasr_core::StreamState;
use strasr_model::Tokenizer;
use strasr_scheduler::BatchScheduler;
use strasr_wire::{framing, ClientFrame, ServerFrame, WireError};
use tokio::net::TcpStream;

/// Drives one admitted connection through `Streaming` then `Flushing`,
/// returning when the client disconnects or the final `"Done"` frame has
/// been sent. The caller (`Server::serve`) handles `Admitted` (constructing
/// `stream`) and `Closed` (decrementing the connection counter).
///
/// `sample_rate_hz` is fixed per connection rather than carried on the wire
/// (`ClientFrame::Audio` is payload-only); a future handshake extension
/// would thread a negotiated rate in here instead of a server-wide constant.
///
/// `max_queue_size` bounds how many feature frames may sit in `stream`
/// unsubmitted at once. A single `Audio` message can carry far more than
/// one chunk's worth of PCM; without this cap a client that writes faster
/// than the scheduler drains would grow the per-connection buffer without
/// limit.
pub async fn run_connection<S: Send + 'static>(
    mut socket: TcpStream,
    mut stream: StreamState<S>,
    scheduler: BatchScheduler<S>,
    tokenizer: &dyn Tokenizer,
    max_message_size: u32,
    sample_rate_hz: u32,
    max_queue_size: usize,
) -> Result<(), HandlerError> {
    let chunk_length = stream.chunk_length();

    loop {
        let frame: ClientFrame = match framing::read_message(&mut socket, max_message_size).await {
            Ok(frame) => frame,
            Err(WireError::ConnectionClosed) => return Ok(()),
            Err(err) => {
                let _ = framing::write_message(
                    &mut socket,
                    &ServerFrame::Error(err.to_string()),
                    max_message_size,
                )
                .await;
                return Err(HandlerError::MalformedFrame(err.to_string()));
            }
        };

        match frame {
            ClientFrame::Done => break,
            ClientFrame::Audio(samples) => {
                if let Err(rate_err) = stream.accept_waveform(sample_rate_hz, &samples) {
                    let _ = framing::write_message(
                        &mut socket,
                        &ServerFrame::Error(rate_err.to_string()),
                        max_message_size,
                    )
                    .await;
                    return Err(HandlerError::RateMismatch(rate_err.to_string()));
                }

                if stream.feature_count() > max_queue_size {
                    let err = HandlerError::QueueOverflow {
                        cap: max_queue_size,
                        got: stream.feature_count(),
                    };
                    let _ = framing::write_message(
                        &mut socket,
                        &ServerFrame::Error(err.to_string()),
                        max_message_size,
                    )
                    .await;
                    return Err(err);
                }

                while stream.feature_count() >= chunk_length {
                    let (returned, result) = scheduler.submit(stream).await;
                    stream = returned;
                    result?;
                    let text = stream.current_text(tokenizer);
                    framing::write_message(&mut socket, &ServerFrame::Transcript(text), max_message_size)
                        .await?;
                }
            }
        }
    }

    stream.input_finished();

    while stream.feature_count() > chunk_length {
        let (returned, result) = scheduler.submit(stream).await;
        stream = returned;
        result?;
    }

    if stream.feature_count() > 0 && stream.feature_count() <= chunk_length {
        if stream.feature_count() < chunk_length {
            let pad = chunk_length - stream.feature_count();
            stream.add_tail_padding(pad);
        }
        let (returned, result) = scheduler.submit(stream).await;
        stream = returned;
        result?;
    }

    let final_text = stream.current_text(tokenizer);
    framing::write_message(&mut socket, &ServerFrame::Transcript(final_text), max_message_size).await?;
    framing::write_message(&mut socket, &ServerFrame::Done, max_message_size).await?;

    log_info!("connection finished cleanly");
    Ok(())
}

pub(crate) fn log_handler_error(err: &HandlerError) {
    log_warn!("connection closed with error: {err}");
}
