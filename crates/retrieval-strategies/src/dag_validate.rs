use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use cid::Cid;
use content_codec::{decode_links, is_supported_codec, is_supported_hash_code, sha256_multihash};
use probe_transport::{FetchRequest, ProbeHttpClient};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Outcome of a full DAG traversal from a declared root, per §4.4's
/// "IPFS-block validation (C4 + C3)" section.
#[derive(Debug, Clone, Default)]
pub struct DagValidationOutcome {
    pub is_valid: bool,
    pub bytes_read: u64,
    pub ttfb_ms: Option<u64>,
    pub blocks_visited: usize,
    pub errors: Vec<String>,
}

/// Traverse the block DAG rooted at `root`, fetching each block via
/// `GET <service_url>/ipfs/<cid>?format=raw` with bounded concurrency.
///
/// Per §4.4: "For each block received: parse its CID; require SHA-256 hash
/// algorithm; require the codec to be one of {raw-leaf, dag-pb-interior};
/// recompute the hash and compare to the CID multihash; decode; enqueue any
/// link CIDs not yet visited." Validity requires zero block fetches to
/// fail; `bytesRead` totals leaf bytes, `ttfb` is that of the first block.
pub async fn validate_dag(
    client: &ProbeHttpClient,
    service_url: &str,
    root: Cid,
    concurrency: usize,
    token: &CancellationToken,
) -> DagValidationOutcome {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut visited: HashSet<Cid> = HashSet::new();
    let mut frontier: Vec<Cid> = vec![root];
    let mut outcome = DagValidationOutcome {
        is_valid: true,
        ..Default::default()
    };
    let overall_start = Instant::now();

    while !frontier.is_empty() {
        if token.is_cancelled() {
            outcome.is_valid = false;
            outcome.errors.push("aborted".to_string());
            return outcome;
        }

        let batch: Vec<Cid> = frontier
            .drain(..)
            .filter(|cid| visited.insert(*cid))
            .collect();
        if batch.is_empty() {
            break;
        }

        let fetches = batch.into_iter().map(|cid| {
            let semaphore = Arc::clone(&semaphore);
            let token = token.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                fetch_and_verify_block(client, service_url, cid, &token).await
            }
        });

        let results = futures::future::join_all(fetches).await;
        for result in results {
            match result {
                Ok(verified) => {
                    outcome.blocks_visited += 1;
                    if outcome.ttfb_ms.is_none() {
                        outcome.ttfb_ms = Some(overall_start.elapsed().as_millis() as u64);
                    }
                    if verified.is_leaf {
                        outcome.bytes_read += verified.data_len as u64;
                    } else {
                        frontier.extend(verified.links);
                    }
                }
                Err(e) => {
                    warn!(service_url, error = %e, "ipfs block validation failure");
                    outcome.is_valid = false;
                    outcome.errors.push(e);
                }
            }
        }
    }

    outcome
}

struct VerifiedBlock {
    is_leaf: bool,
    data_len: usize,
    links: Vec<Cid>,
}

async fn fetch_and_verify_block(
    client: &ProbeHttpClient,
    service_url: &str,
    cid: Cid,
    token: &CancellationToken,
) -> Result<VerifiedBlock, String> {
    if !is_supported_codec(cid.codec()) {
        return Err(format!("unsupported codec for {cid}"));
    }
    if !is_supported_hash_code(cid.hash().code()) {
        return Err(format!("unsupported hash algorithm for {cid}"));
    }

    let base = service_url.trim_end_matches('/');
    let request = FetchRequest::new(format!("{base}/ipfs/{cid}?format=raw"))
        .with_accept("application/vnd.ipld.raw");
    let fetched = client
        .fetch(&request, token)
        .await
        .map_err(|e| format!("fetch {cid} failed: {e}"))?;

    let recomputed = sha256_multihash(&fetched.body);
    if recomputed.digest() != cid.hash().digest() {
        return Err(format!("cid-verify-error: block {cid} failed hash recomputation"));
    }

    let is_leaf = cid.codec() == content_codec::RAW_CODEC;
    let links = if is_leaf {
        Vec::new()
    } else {
        decode_links(&fetched.body).map_err(|e| format!("bad links in {cid}: {e}"))?
    };

    Ok(VerifiedBlock {
        is_leaf,
        data_len: fetched.body.len(),
        links,
    })
}
