mod checksum;
mod digest;

pub use checksum::{compute_digest_file, compute_digest_reader, verify_digest_file, DigestWriter};
pub use digest::{Digest, DigestAlgorithm, DigestError};
