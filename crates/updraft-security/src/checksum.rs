use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use sha2::Digest as _;

use crate::{Digest, DigestAlgorithm};

enum Hasher {
    Md5(md5::Md5),
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
}

/// A `Write` sink that hashes everything written through it.
pub struct DigestWriter {
    algorithm: DigestAlgorithm,
    hasher: Hasher,
    written: u64,
}

impl DigestWriter {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        let hasher = match algorithm {
            DigestAlgorithm::Md5 => Hasher::Md5(md5::Md5::new()),
            DigestAlgorithm::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
            DigestAlgorithm::Sha512 => Hasher::Sha512(sha2::Sha512::new()),
        };
        Self {
            algorithm,
            hasher,
            written: 0,
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match &mut self.hasher {
            Hasher::Md5(hasher) => hasher.update(bytes),
            Hasher::Sha256(hasher) => hasher.update(bytes),
            Hasher::Sha512(hasher) => hasher.update(bytes),
        }
        self.written += bytes.len() as u64;
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn finish(self) -> Digest {
        let bytes = match self.hasher {
            Hasher::Md5(hasher) => hasher.finalize().to_vec(),
            Hasher::Sha256(hasher) => hasher.finalize().to_vec(),
            Hasher::Sha512(hasher) => hasher.finalize().to_vec(),
        };
        Digest::from_hasher_output(self.algorithm, bytes)
    }
}

impl Write for DigestWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn compute_digest_reader<R: Read>(
    algorithm: DigestAlgorithm,
    reader: &mut R,
) -> io::Result<(Digest, u64)> {
    let mut writer = DigestWriter::new(algorithm);
    io::copy(reader, &mut writer)?;
    let len = writer.bytes_written();
    Ok((writer.finish(), len))
}

pub fn compute_digest_file(algorithm: DigestAlgorithm, path: &Path) -> io::Result<(Digest, u64)> {
    let mut file = File::open(path)?;
    compute_digest_reader(algorithm, &mut file)
}

/// Returns whether the file at `path` hashes to `expected` using `expected`'s algorithm.
pub fn verify_digest_file(path: &Path, expected: &Digest) -> io::Result<bool> {
    let (actual, _) = compute_digest_file(expected.algorithm(), path)?;
    Ok(&actual == expected)
}
