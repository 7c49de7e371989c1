use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DigestError {
    #[error("unsupported digest algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid {algorithm} digest hex: {reason}")]
    InvalidHex {
        algorithm: DigestAlgorithm,
        reason: String,
    },

    #[error("invalid {algorithm} digest length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        algorithm: DigestAlgorithm,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Parses the algorithm names catalogs use (`MD5`, `SHA256`, `SHA-512`, ...).
    pub fn parse(value: &str) -> Result<Self, DigestError> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|ch| *ch != '-' && *ch != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(DigestError::UnknownAlgorithm(value.trim().to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    pub fn byte_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    bytes: Vec<u8>,
}

impl Digest {
    pub fn from_bytes(algorithm: DigestAlgorithm, bytes: Vec<u8>) -> Result<Self, DigestError> {
        if bytes.len() != algorithm.byte_len() {
            return Err(DigestError::InvalidLength {
                algorithm,
                expected: algorithm.byte_len(),
                actual: bytes.len(),
            });
        }
        Ok(Self { algorithm, bytes })
    }

    pub(crate) fn from_hasher_output(algorithm: DigestAlgorithm, bytes: Vec<u8>) -> Self {
        Self { algorithm, bytes }
    }

    pub fn from_hex(algorithm: DigestAlgorithm, value: &str) -> Result<Self, DigestError> {
        let bytes = hex::decode(value.trim()).map_err(|err| DigestError::InvalidHex {
            algorithm,
            reason: err.to_string(),
        })?;
        Self::from_bytes(algorithm, bytes)
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// `ALG:hex`, the form used in logs and error messages.
    pub fn describe(&self) -> String {
        format!("{}:{}", self.algorithm, self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.describe())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip_preserves_bytes_for_every_algorithm() {
        for algorithm in [
            DigestAlgorithm::Md5,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha512,
        ] {
            let bytes: Vec<u8> = (0..algorithm.byte_len()).map(|i| (i * 7 + 3) as u8).collect();
            let digest = Digest::from_bytes(algorithm, bytes.clone()).expect("must build digest");
            let decoded = Digest::from_hex(algorithm, &digest.to_hex()).expect("must decode hex");
            assert_eq!(decoded.as_bytes(), bytes.as_slice());
            assert_eq!(decoded, digest);
        }
    }

    #[test]
    fn from_hex_accepts_upper_case_input() {
        let digest = Digest::from_hex(DigestAlgorithm::Md5, "D41D8CD98F00B204E9800998ECF8427E")
            .expect("must decode");
        assert_eq!(digest.to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn from_hex_rejects_wrong_length_for_algorithm() {
        let err = Digest::from_hex(DigestAlgorithm::Sha256, "d41d8cd98f00b204e9800998ecf8427e")
            .expect_err("md5-sized hex must not decode as sha256");
        assert_eq!(
            err,
            DigestError::InvalidLength {
                algorithm: DigestAlgorithm::Sha256,
                expected: 32,
                actual: 16,
            }
        );
    }

    #[test]
    fn equality_includes_algorithm() {
        let bytes = vec![0_u8; 32];
        let sha = Digest::from_bytes(DigestAlgorithm::Sha256, bytes).expect("must build");
        let other =
            Digest::from_hex(DigestAlgorithm::Sha256, &"00".repeat(32)).expect("must build");
        assert_eq!(sha, other);
        assert_ne!(
            Digest::from_bytes(DigestAlgorithm::Md5, vec![0_u8; 16]).expect("must build"),
            Digest::from_bytes(DigestAlgorithm::Sha256, vec![0_u8; 32]).expect("must build")
        );
    }

    #[test]
    fn parse_algorithm_is_case_insensitive() {
        assert_eq!(DigestAlgorithm::parse("md5"), Ok(DigestAlgorithm::Md5));
        assert_eq!(DigestAlgorithm::parse("SHA-256"), Ok(DigestAlgorithm::Sha256));
        assert_eq!(DigestAlgorithm::parse("Sha512"), Ok(DigestAlgorithm::Sha512));
        assert!(matches!(
            DigestAlgorithm::parse("crc32"),
            Err(DigestError::UnknownAlgorithm(name)) if name == "crc32"
        ));
    }
}
