use cid::Cid;

use crate::block::{interior_node, raw_leaf, Block};
use crate::error::ArchiveBuildError;

/// Default leaf size for chunking an uploaded object into blocks, per
/// §4.3's "strategy-specific fields (e.g. blockCount, carSize)".
pub const DEFAULT_LEAF_SIZE: usize = 256 * 1024;

/// Metadata about a built archive, written onto `Deal.metadata` per §4.3
/// step 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveStats {
    pub block_count: usize,
    pub archive_size: usize,
}

/// Build a content-addressed archive from `bytes`, chunked into leaves of
/// at most `leaf_size` bytes. Returns the framed archive bytes (root block
/// first, then every other block in the DAG, depth-first) and the root CID.
///
/// This is the encode half of §8's round-trip property: `encode(bytes) ->
/// decode(root)` must yield the original bytes back.
pub fn build_archive(bytes: &[u8], leaf_size: usize) -> Result<(Vec<u8>, Cid, ArchiveStats), ArchiveBuildError> {
    let leaf_size = leaf_size.max(1);
    let leaves: Vec<Block> = if bytes.is_empty() {
        vec![raw_leaf(Vec::new())]
    } else {
        bytes.chunks(leaf_size).map(|c| raw_leaf(c.to_vec())).collect()
    };

    let (root, blocks): (Cid, Vec<Block>) = if leaves.len() == 1 {
        let only = leaves.into_iter().next().unwrap();
        let root = only.cid;
        (root, vec![only])
    } else {
        let interior = interior_node(&leaves.iter().map(|b| b.cid).collect::<Vec<_>>());
        let root = interior.cid;
        let mut blocks = vec![interior];
        blocks.extend(leaves);
        (root, blocks)
    };

    let mut archive_size = 0usize;
    let mut out = Vec::new();
    for block in &blocks {
        let cid_bytes = block.cid.to_bytes();
        let frame_len = (cid_bytes.len() + block.data.len()) as u32;
        out.extend_from_slice(&frame_len.to_le_bytes());
        out.extend_from_slice(&cid_bytes);
        out.extend_from_slice(&block.data);
        archive_size += 4 + cid_bytes.len() + block.data.len();
    }

    Ok((
        out,
        root,
        ArchiveStats {
            block_count: blocks.len(),
            archive_size,
        },
    ))
}

/// Decode an archive built by [`build_archive`] back into blocks, in framing
/// order (root first). Used by tests and by [`decode_content`] to recover
/// the original bytes.
pub fn decode_blocks(archive: &[u8]) -> Result<Vec<Block>, crate::error::ArchiveValidationError> {
    use crate::error::ArchiveValidationError as E;

    let mut blocks = Vec::new();
    let mut cursor = 0usize;
    while cursor < archive.len() {
        if cursor + 4 > archive.len() {
            return Err(E::CarReadError("truncated frame length".into()));
        }
        let len = u32::from_le_bytes(archive[cursor..cursor + 4].try_into().unwrap()) as usize;
        cursor += 4;
        if cursor + len > archive.len() {
            return Err(E::CarReadError("truncated frame body".into()));
        }
        let frame = &archive[cursor..cursor + len];
        cursor += len;

        let mut frame_cursor = std::io::Cursor::new(frame);
        let cid = Cid::read_bytes(&mut frame_cursor)
            .map_err(|e| E::CarReadError(format!("bad cid: {e}")))?;
        let data_start = frame_cursor.position() as usize;
        let data = frame[data_start..].to_vec();
        blocks.push(Block { cid, data });
    }
    Ok(blocks)
}

/// Reassemble the original bytes from a decoded archive, concatenating leaf
/// data in the order it appears (skipping the interior node, if present).
pub fn decode_content(archive: &[u8]) -> Result<Vec<u8>, crate::error::ArchiveValidationError> {
    let blocks = decode_blocks(archive)?;
    let mut out = Vec::new();
    for block in &blocks {
        if block.cid.codec() == crate::block::RAW_CODEC {
            out.extend_from_slice(&block.data);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_single_leaf() {
        let payload = b"small payload".to_vec();
        let (archive, root, stats) = build_archive(&payload, DEFAULT_LEAF_SIZE).unwrap();
        assert_eq!(stats.block_count, 1);
        let recovered = decode_content(&archive).unwrap();
        assert_eq!(recovered, payload);
        let blocks = decode_blocks(&archive).unwrap();
        assert_eq!(blocks[0].cid, root);
    }

    #[test]
    fn round_trip_multi_leaf() {
        let payload = vec![7u8; DEFAULT_LEAF_SIZE * 3 + 17];
        let (archive, root, stats) = build_archive(&payload, DEFAULT_LEAF_SIZE).unwrap();
        assert_eq!(stats.block_count, 5); // 1 interior + 4 leaves
        let recovered = decode_content(&archive).unwrap();
        assert_eq!(recovered, payload);
        let blocks = decode_blocks(&archive).unwrap();
        assert_eq!(blocks[0].cid, root);
    }

    #[test]
    fn empty_payload_is_a_single_empty_leaf() {
        let (archive, _root, stats) = build_archive(&[], DEFAULT_LEAF_SIZE).unwrap();
        assert_eq!(stats.block_count, 1);
        let recovered = decode_content(&archive).unwrap();
        assert!(recovered.is_empty());
    }
}
