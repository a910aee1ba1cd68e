pub mod audio;
pub use audio::{HEX_WINDOW, decode_hex, decode_hex_windows, resample_pcm16};
pub mod endpoint;
pub use endpoint::{EndpointError, http_url_with_group, validate_http_endpoint, validate_ws_endpoint};

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::error::Elapsed;

/// Polls the next item of `stream`, bounded by `limit` when set.
pub async fn next_within<S>(stream: &mut S, limit: Option<Duration>) -> Result<Option<S::Item>, Elapsed>
where
    S: Stream + Unpin,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, stream.next()).await,
        None => Ok(stream.next().await),
    }
}
