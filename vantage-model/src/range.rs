use std::fmt::{Display, Formatter};

use crate::error::{ModelError, Result};

/// Byte range of an HTTP `Range` request.
///
/// `end` is inclusive, matching the header syntax; `None` reads to the end
/// of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    pub const fn starting_at(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Range covering `len` bytes from `start`; `len` must be non-zero.
    pub fn with_len(start: u64, len: u64) -> Result<Self> {
        if len == 0 {
            return Err(ModelError::InvalidRange(format!(
                "empty range at offset {start}"
            )));
        }
        Ok(Self {
            start,
            end: Some(start.saturating_add(len - 1)),
        })
    }

    /// Number of bytes covered, when bounded
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start) + 1)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.end, Some(end) if end < self.start)
    }

    /// Value for the `Range` header, e.g. `bytes=0-1023` or `bytes=512-`
    pub fn header_value(&self) -> String {
        self.to_string()
    }
}

impl Display for ByteRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.end {
            Some(end) => write!(f, "bytes={}-{}", self.start, end),
            None => write!(f, "bytes={}-", self.start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_value_omits_open_end() {
        assert_eq!(ByteRange::starting_at(512).header_value(), "bytes=512-");
        let bounded = ByteRange::with_len(0, 1024).unwrap();
        assert_eq!(bounded.header_value(), "bytes=0-1023");
        assert_eq!(bounded.len(), Some(1024));
    }

    #[test]
    fn zero_length_is_rejected() {
        assert!(ByteRange::with_len(10, 0).is_err());
    }
}
