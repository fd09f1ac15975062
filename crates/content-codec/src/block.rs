use cid::Cid;
use multihash::Multihash;
use sha2::{Digest, Sha256};

/// Multicodec code for raw binary leaves (`raw`), per the multicodec table.
pub const RAW_CODEC: u64 = 0x55;
/// Multicodec code for an interior DAG node referencing leaves (`dag-pb`-shaped).
pub const DAG_PB_CODEC: u64 = 0x70;
/// Multicodec code for SHA2-256, the only hash algorithm this codec supports
/// (§4.4: "Require SHA-256 hash algorithm").
pub const SHA2_256_CODE: u64 = 0x12;

/// One content-addressed block: a CID and its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub cid: Cid,
    pub data: Vec<u8>,
}

/// Multihash-wrap the SHA-256 digest of `data`.
pub fn sha256_multihash(data: &[u8]) -> Multihash<64> {
    let digest = Sha256::digest(data);
    // SHA-256 always produces 32 bytes, well under the 64-byte inline
    // capacity `Multihash<64>` reserves, so this cannot fail.
    Multihash::wrap(SHA2_256_CODE, &digest).expect("sha256 digest fits multihash capacity")
}

/// Build a raw-leaf block (codec `raw`) from `data`.
pub fn raw_leaf(data: Vec<u8>) -> Block {
    let mh = sha256_multihash(&data);
    let cid = Cid::new_v1(RAW_CODEC, mh);
    Block { cid, data }
}

/// Build an interior node (codec `dag-pb`-shaped) whose "data" is the
/// concatenated CID bytes of its children, in order.
pub fn interior_node(children: &[Cid]) -> Block {
    let mut data = Vec::new();
    for child in children {
        data.extend_from_slice(&child.to_bytes());
    }
    let mh = sha256_multihash(&data);
    let cid = Cid::new_v1(DAG_PB_CODEC, mh);
    Block { cid, data }
}

/// Parse the CID-linked children out of an interior node's raw data. Returns
/// an error if the bytes do not decode into a whole number of CIDs.
pub fn decode_links(data: &[u8]) -> Result<Vec<Cid>, cid::Error> {
    let mut cursor = std::io::Cursor::new(data);
    let mut links = Vec::new();
    while (cursor.position() as usize) < data.len() {
        let cid = Cid::read_bytes(&mut cursor)?;
        links.push(cid);
    }
    Ok(links)
}

/// §4.4: "Require the codec to be one of {raw-leaf, dag-pb-interior}."
pub fn is_supported_codec(codec: u64) -> bool {
    matches!(codec, RAW_CODEC | DAG_PB_CODEC)
}

/// §4.4: "Require SHA-256 hash algorithm."
pub fn is_supported_hash_code(code: u64) -> bool {
    code == SHA2_256_CODE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_leaf_cid_is_deterministic() {
        let a = raw_leaf(b"hello world".to_vec());
        let b = raw_leaf(b"hello world".to_vec());
        assert_eq!(a.cid, b.cid);
    }

    #[test]
    fn interior_links_round_trip() {
        let leaf1 = raw_leaf(b"one".to_vec());
        let leaf2 = raw_leaf(b"two".to_vec());
        let node = interior_node(&[leaf1.cid, leaf2.cid]);
        let links = decode_links(&node.data).unwrap();
        assert_eq!(links, vec![leaf1.cid, leaf2.cid]);
    }
}
