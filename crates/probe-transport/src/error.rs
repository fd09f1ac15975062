/// Transport-kind errors, per §7: "connection timeout, non-2xx HTTP, TLS
/// failure." Retried only by the retrieval strategy's own retry policy —
/// this crate never retries internally.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("non-2xx response {status} from {url}: {preview}")]
    BadStatus {
        url: String,
        status: u16,
        preview: String,
    },

    #[error("probe aborted before completion")]
    Aborted,

    #[error("request to {url} timed out after {elapsed_ms}ms")]
    Timeout { url: String, elapsed_ms: u64 },
}
