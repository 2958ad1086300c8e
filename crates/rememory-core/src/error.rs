use thiserror::Error;

pub type RememoryResult<T> = Result<T, RememoryError>;

#[derive(Debug, Error)]
pub enum RememoryError {
    #[error("passphrase cannot be empty")]
    EmptyPassphrase,

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("share is not well-formed: {0}")]
    NotWellFormed(String),

    #[error("unknown compact share version tag: {0}")]
    UnknownCompactVersion(String),

    #[error("share index {0} is already present")]
    DuplicateIndex(u8),

    #[error("share does not belong to this cohort: {0}")]
    CohortMismatch(String),

    #[error("need at least 2 shares, got {0}")]
    Insufficient(usize),

    #[error("splitting secret failed: {0}")]
    SplitFailed(String),

    #[error("combining shares failed: {0}")]
    CombineFailed(String),

    #[error("encryption failed: {0}")]
    EncryptFailed(String),

    #[error("decryption failed: wrong passphrase or not enough correct shares")]
    WrongPassphrase,

    #[error("ciphertext is not a valid age stream: {0}")]
    MalformedCiphertext(String),

    #[error("archive error: {0}")]
    ArchiveFailed(String),

    #[error("recovery session is not ready: {0}")]
    NotReady(String),

    #[error("seal self-test failed: {0}")]
    SealSelfTest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
