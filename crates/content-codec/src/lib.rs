//! Content-addressed archive construction and streaming validation (C3).

mod archive;
mod block;
mod error;
mod validate;

pub use archive::{build_archive, decode_blocks, decode_content, ArchiveStats, DEFAULT_LEAF_SIZE};
pub use block::{
    decode_links, interior_node, is_supported_codec, is_supported_hash_code, raw_leaf,
    sha256_multihash, Block, DAG_PB_CODEC, RAW_CODEC, SHA2_256_CODE,
};
pub use error::{ArchiveBuildError, ArchiveValidationError};
pub use validate::{validate_car_content_stream, CarByteStream, ValidationResult};
