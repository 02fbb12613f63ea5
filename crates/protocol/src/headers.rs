//! Parsers for the acknowledgment headers of the upload protocol.

/// Error returned when a protocol header cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("malformed {header} header: {value:?}")]
    Malformed { header: &'static str, value: String },
}

fn malformed(header: &'static str, value: &str) -> HeaderError {
    HeaderError::Malformed {
        header,
        value: value.to_string(),
    }
}

/// Parses a confirmed-range header (`bytes=0-N`) and returns the number
/// of bytes it covers, i.e. `N + 1`.
///
/// Only ranges starting at zero are meaningful for a resumable session.
pub fn parse_range_end(value: &str) -> Result<u64, HeaderError> {
    let range = value
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(|| malformed("Range", value))?;
    let (start, end) = range
        .split_once('-')
        .ok_or_else(|| malformed("Range", value))?;

    let start: u64 = start.trim().parse().map_err(|_| malformed("Range", value))?;
    let end: u64 = end.trim().parse().map_err(|_| malformed("Range", value))?;
    if start != 0 || end < start {
        return Err(malformed("Range", value));
    }
    Ok(end + 1)
}

/// Parses `X-Goog-Upload-Size-Received`.
pub fn parse_size_received(value: &str) -> Result<u64, HeaderError> {
    value
        .trim()
        .parse()
        .map_err(|_| malformed("X-Goog-Upload-Size-Received", value))
}

/// Parses `X-Goog-Upload-Chunk-Granularity`. Zero is rejected.
pub fn parse_chunk_granularity(value: &str) -> Result<u64, HeaderError> {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(malformed("X-Goog-Upload-Chunk-Granularity", value)),
        Ok(n) => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_covers_inclusive_end() {
        assert_eq!(parse_range_end("bytes=0-1048575").unwrap(), 1_048_576);
        assert_eq!(parse_range_end("bytes=0-0").unwrap(), 1);
    }

    #[test]
    fn range_must_start_at_zero() {
        assert!(parse_range_end("bytes=10-20").is_err());
    }

    #[test]
    fn range_rejects_garbage() {
        assert!(parse_range_end("").is_err());
        assert!(parse_range_end("0-10").is_err());
        assert!(parse_range_end("bytes=0-").is_err());
        assert!(parse_range_end("bytes=a-b").is_err());
    }

    #[test]
    fn size_received() {
        assert_eq!(parse_size_received(" 5242880 ").unwrap(), 5_242_880);
        assert!(parse_size_received("-1").is_err());
    }

    #[test]
    fn granularity_must_be_positive() {
        assert_eq!(parse_chunk_granularity("262144").unwrap(), 262_144);
        assert!(parse_chunk_granularity("0").is_err());
        assert!(parse_chunk_granularity("x").is_err());
    }
}
