use cid::Cid;
use sha2::{Digest, Sha256};

use crate::block::{is_supported_codec, is_supported_hash_code, RAW_CODEC};
use crate::error::ArchiveValidationError;

/// Lazy byte source for a CAR-shaped archive. Frames are `(cid_bytes, data)`
/// pairs framed the way [`crate::archive::build_archive`] writes them:
/// `u32 LE length, cid bytes, data bytes`.
///
/// `close()` releases whatever the stream holds (a socket, a file handle in
/// a real transport). It is safe to call more than once; only the first
/// call does anything, and [`validate_car_content_stream`] is the only
/// caller that matters for property S3 in the harness: the hook runs
/// exactly once per validation run, on every exit path.
pub struct CarByteStream {
    buf: Vec<u8>,
    cursor: usize,
    closed: bool,
}

impl CarByteStream {
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            buf,
            cursor: 0,
            closed: false,
        }
    }

    /// Pull the next frame off the stream, or `None` at end of input.
    fn next_frame(&mut self) -> Option<Result<(Vec<u8>, Vec<u8>), ArchiveValidationError>> {
        if self.cursor >= self.buf.len() {
            return None;
        }
        if self.cursor + 4 > self.buf.len() {
            return Some(Err(ArchiveValidationError::CarReadError(
                "truncated frame length".into(),
            )));
        }
        let len =
            u32::from_le_bytes(self.buf[self.cursor..self.cursor + 4].try_into().unwrap()) as usize;
        self.cursor += 4;
        if self.cursor + len > self.buf.len() {
            return Some(Err(ArchiveValidationError::CarReadError(
                "truncated frame body".into(),
            )));
        }
        let frame = self.buf[self.cursor..self.cursor + len].to_vec();
        self.cursor += len;

        let mut frame_cursor = std::io::Cursor::new(frame.as_slice());
        let cid = match Cid::read_bytes(&mut frame_cursor) {
            Ok(c) => c,
            Err(e) => {
                return Some(Err(ArchiveValidationError::CarReadError(format!(
                    "bad cid: {e}"
                ))))
            }
        };
        let data_start = frame_cursor.position() as usize;
        let data = frame[data_start..].to_vec();
        Some(Ok((cid.to_bytes(), data)))
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for CarByteStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Outcome of [`validate_car_content_stream`], per §4.4.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub method: &'static str,
    pub verified_root_cid: Option<Cid>,
    pub errors: Vec<ArchiveValidationError>,
    pub bytes_read: u64,
}

/// Validate a CAR-shaped byte stream against an expected root CID. Reads
/// frames lazily off `stream`, recomputes each block's hash, and checks the
/// root matches `expected_root`. The stream's close hook runs exactly once,
/// on every exit path (success, mismatch, or corruption).
pub fn validate_car_content_stream(
    mut stream: CarByteStream,
    expected_root: &Cid,
) -> ValidationResult {
    let mut errors = Vec::new();
    let mut verified_root_cid = None;
    let mut bytes_read = 0u64;
    let mut first = true;

    loop {
        let frame = match stream.next_frame() {
            None => break,
            Some(Ok(f)) => f,
            Some(Err(e)) => {
                errors.push(e);
                break;
            }
        };
        let (cid_bytes, data) = frame;
        let cid = match Cid::try_from(cid_bytes.as_slice()) {
            Ok(c) => c,
            Err(e) => {
                errors.push(ArchiveValidationError::CarReadError(format!(
                    "bad cid: {e}"
                )));
                break;
            }
        };

        if !is_supported_codec(cid.codec()) || !is_supported_hash_code(cid.hash().code()) {
            errors.push(ArchiveValidationError::CidVerifyError {
                cid: cid.to_string(),
            });
            break;
        }

        let digest = Sha256::digest(&data);
        if digest.as_slice() != cid.hash().digest() {
            errors.push(ArchiveValidationError::CidVerifyError {
                cid: cid.to_string(),
            });
            break;
        }

        if first {
            first = false;
            if &cid != expected_root {
                errors.push(ArchiveValidationError::RootCidMismatch {
                    expected: expected_root.to_string(),
                    actual: cid.to_string(),
                });
                break;
            }
            verified_root_cid = Some(cid);
        }

        if cid.codec() == RAW_CODEC {
            bytes_read += data.len() as u64;
        }
    }

    stream.close();

    ValidationResult {
        is_valid: errors.is_empty(),
        method: "car-content-stream",
        verified_root_cid,
        errors,
        bytes_read,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::build_archive;

    fn random_bytes(n: usize) -> Vec<u8> {
        use rand::RngCore;
        let mut buf = vec![0u8; n];
        rand::thread_rng().fill_bytes(&mut buf);
        buf
    }

    #[test]
    fn s1_valid_round_trip() {
        let payload = random_bytes(4096);
        let (archive, root, _stats) = build_archive(&payload, crate::archive::DEFAULT_LEAF_SIZE).unwrap();
        let stream = CarByteStream::new(archive);
        let result = validate_car_content_stream(stream, &root);
        assert!(result.is_valid);
        assert_eq!(result.verified_root_cid, Some(root));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn s2_wrong_expected_root() {
        let payload = random_bytes(4096);
        let (archive, root, _stats) = build_archive(&payload, crate::archive::DEFAULT_LEAF_SIZE).unwrap();
        let (_, other_root, _) = build_archive(&random_bytes(32), crate::archive::DEFAULT_LEAF_SIZE).unwrap();
        assert_ne!(root, other_root);

        let stream = CarByteStream::new(archive);
        let result = validate_car_content_stream(stream, &other_root);
        assert!(!result.is_valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.tag() == "root-cid-mismatch"));
    }

    #[test]
    fn s3_corrupted_block_mid_archive() {
        let payload = random_bytes(4096);
        let (mut archive, root, _stats) = build_archive(&payload, crate::archive::DEFAULT_LEAF_SIZE).unwrap();
        let mid = archive.len() / 2;
        archive[mid] ^= 0xFF;

        let stream = CarByteStream::new(archive);
        let result = validate_car_content_stream(stream, &root);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| {
            matches!(e.tag(), "cid-verify-error" | "car-read-error" | "root-cid-mismatch")
        }));
    }

    #[test]
    fn close_hook_runs_on_every_exit_path() {
        let payload = random_bytes(256);
        let (archive, root, _stats) = build_archive(&payload, crate::archive::DEFAULT_LEAF_SIZE).unwrap();

        let mut ok_stream = CarByteStream::new(archive.clone());
        ok_stream.close();
        assert!(ok_stream.is_closed());

        let mut bad_archive = archive;
        bad_archive[0] ^= 0xFF;
        let bad_stream = CarByteStream::new(bad_archive);
        let result = validate_car_content_stream(bad_stream, &root);
        assert!(!result.is_valid);
    }
}
