pub type CardResult<T> = Result<T, CardError>;

#[derive(thiserror::Error, Debug)]
pub enum CardError {
    /// Bad user input (file type, extension, dimensions). Surfaced
    /// synchronously, before any pipeline work.
    #[error("validation error: {0}")]
    Validation(String),

    /// Input bytes could not be decoded as a raster image.
    #[error("decode error: {0}")]
    Decode(String),

    /// A composited surface could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// An embedded image failed to load. Absorbed by the readiness barrier
    /// during export; only surfaced by synchronous load entry points.
    #[error("load error: {0}")]
    Load(String),

    /// Rasterization failed or an export was rejected; no file is produced.
    #[error("export error: {0}")]
    Export(String),

    /// A remote storage or listing write failed; local state is untouched.
    #[error("remote write error: {0}")]
    RemoteWrite(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CardError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    pub fn remote_write(msg: impl Into<String>) -> Self {
        Self::RemoteWrite(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            CardError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(CardError::decode("x").to_string().contains("decode error:"));
        assert!(CardError::encode("x").to_string().contains("encode error:"));
        assert!(CardError::load("x").to_string().contains("load error:"));
        assert!(CardError::export("x").to_string().contains("export error:"));
        assert!(
            CardError::remote_write("x")
                .to_string()
                .contains("remote write error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = CardError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
