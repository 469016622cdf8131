//! Per-broker forwarding into the shared inbound channel.

use hal_core::Event;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Copies events from one broker's channel into the router's inbound channel.
///
/// Events are moved one at a time and in order; a full inbound channel
/// suspends the copy, which in turn fills the broker's channel and suspends
/// the broker. Returns the number of events forwarded once the source or the
/// sink closes or `token` is cancelled.
pub async fn forward(
    broker: &str,
    mut source: mpsc::Receiver<Event>,
    sink: mpsc::Sender<Event>,
    token: CancellationToken,
) -> usize {
    let mut forwarded = 0;

    loop {
        let event = tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!(broker, "Forwarding cancelled");
                break;
            }
            event = source.recv() => match event {
                Some(event) => event,
                None => {
                    debug!(broker, "Broker channel closed");
                    break;
                }
            },
        };

        trace!(broker, room = event.room_id(), "Forwarding event");

        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!(broker, "Forwarding cancelled");
                break;
            }
            result = sink.send(event) => {
                if result.is_err() {
                    debug!(broker, "Inbound channel closed");
                    break;
                }
                forwarded += 1;
            }
        }
    }

    forwarded
}
