use std::fmt;
use std::io::SeekFrom;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::TransferError;

/// Stable identifier of one upload, used as the session store key.
///
/// SHA-256 over the media name, a zero byte, the little-endian length
/// and the content, so the same file uploaded again after a restart maps
/// to the same stored session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps a caller-supplied identifier.
    ///
    /// Only ASCII alphanumerics, `-` and `_` are accepted so that every
    /// fingerprint is also a safe file name.
    pub fn new(value: impl Into<String>) -> Result<Self, TransferError> {
        let value = value.into();
        let valid = !value.is_empty()
            && value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(TransferError::InvalidFingerprint(value));
        }
        Ok(Self(value))
    }

    /// Computes the fingerprint of an in-memory payload.
    pub fn from_bytes(name: &str, data: &[u8]) -> Self {
        let mut hasher = header_hasher(name, data.len() as u64);
        hasher.update(data);
        Self(hex::encode(hasher.finalize()))
    }

    /// Streams `reader` from the start and returns its fingerprint and length.
    ///
    /// The length goes into the digest before the content, so it is taken
    /// from the end position first. Matches [`from_bytes`](Self::from_bytes)
    /// for the same name and content.
    pub async fn from_reader<R>(name: &str, mut reader: R) -> Result<(Self, u64), TransferError>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        let size = reader.seek(SeekFrom::End(0)).await?;
        reader.seek(SeekFrom::Start(0)).await?;

        let mut hasher = header_hasher(name, size);
        let mut read = 0u64;
        let mut buf = vec![0u8; 8192];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            read += n as u64;
        }
        if read != size {
            return Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("read {read} of {size} bytes"),
            )));
        }

        Ok((Self(hex::encode(hasher.finalize())), size))
    }

    /// Fingerprints a file on disk, named by its final path component.
    pub async fn for_file(path: &Path) -> Result<(Self, u64), TransferError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = tokio::fs::File::open(path).await?;
        Self::from_reader(&name, tokio::io::BufReader::new(file)).await
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn header_hasher(name: &str, size: u64) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(size.to_le_bytes());
    hasher
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = TransferError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn same_content_and_name_match() {
        let a = Fingerprint::from_bytes("IMG_0001.jpg", b"pixels");
        let b = Fingerprint::from_bytes("IMG_0001.jpg", b"pixels");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn name_is_part_of_the_identity() {
        let a = Fingerprint::from_bytes("a.jpg", b"pixels");
        let b = Fingerprint::from_bytes("b.jpg", b"pixels");
        assert_ne!(a, b);
    }

    #[test]
    fn content_is_part_of_the_identity() {
        let a = Fingerprint::from_bytes("a.jpg", b"pixels");
        let b = Fingerprint::from_bytes("a.jpg", b"pixelz");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn reader_fingerprint_is_stable() {
        let data = vec![7u8; 20_000];
        let (a, size) = Fingerprint::from_reader("clip.mp4", Cursor::new(&data[..]))
            .await
            .unwrap();
        let (b, _) = Fingerprint::from_reader("clip.mp4", Cursor::new(&data[..]))
            .await
            .unwrap();
        assert_eq!(size, 20_000);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn file_fingerprint_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holiday.png");
        std::fs::write(&path, b"png bytes").unwrap();

        let (from_file, size) = Fingerprint::for_file(&path).await.unwrap();
        let (from_reader, _) = Fingerprint::from_reader("holiday.png", Cursor::new(b"png bytes"))
            .await
            .unwrap();
        assert_eq!(size, 9);
        assert_eq!(from_file, from_reader);
    }

    #[tokio::test]
    async fn reader_and_bytes_agree() {
        let (streamed, size) = Fingerprint::from_reader("a.jpg", Cursor::new(b"pixels"))
            .await
            .unwrap();
        assert_eq!(size, 6);
        assert_eq!(streamed, Fingerprint::from_bytes("a.jpg", b"pixels"));

        // Large enough to span several read buffers.
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let (streamed, _) = Fingerprint::from_reader("clip.mp4", Cursor::new(&data[..]))
            .await
            .unwrap();
        assert_eq!(streamed, Fingerprint::from_bytes("clip.mp4", &data));
    }

    #[test]
    fn bytes_follow_documented_layout() {
        let mut hasher = Sha256::new();
        hasher.update(b"a.jpg");
        hasher.update([0u8]);
        hasher.update(6u64.to_le_bytes());
        hasher.update(b"pixels");
        let expected = hex::encode(hasher.finalize());
        assert_eq!(Fingerprint::from_bytes("a.jpg", b"pixels").as_str(), expected);
    }

    #[tokio::test]
    async fn reader_fingerprint_ignores_current_position() {
        let mut cursor = Cursor::new(b"pixels".to_vec());
        cursor.set_position(3);
        let (fp, _) = Fingerprint::from_reader("a.jpg", cursor).await.unwrap();
        assert_eq!(fp, Fingerprint::from_bytes("a.jpg", b"pixels"));
    }

    #[test]
    fn explicit_fingerprints_are_validated() {
        assert!(Fingerprint::new("abc123").is_ok());
        assert!(Fingerprint::new("a_b-C").is_ok());
        assert!(Fingerprint::new("").is_err());
        assert!(Fingerprint::new("../etc").is_err());
        assert!(Fingerprint::new("with space").is_err());
    }

    #[test]
    fn serde_rejects_invalid_values() {
        let fp: Fingerprint = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(fp.as_str(), "abc123");
        assert!(serde_json::from_str::<Fingerprint>("\"a/b\"").is_err());
    }
}
