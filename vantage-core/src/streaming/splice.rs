use std::ops::Range;

use vantage_model::ByteRange;

use crate::error::{EngineError, Result};

/// How one player request splits between the pre-buffered prefix and the
/// network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplicePlan {
    /// Slice of the prefix to deliver first
    pub buffered: Option<Range<usize>>,
    /// Remainder to fetch, starting exactly where the prefix ends
    pub remote: Option<ByteRange>,
}

/// Split `[offset, end)` against a prefix of `buffered_len` bytes.
///
/// `end` is exclusive; `None` reads to the end of the resource, bounded by
/// `total` when known.
pub fn plan_splice(
    offset: u64,
    end: Option<u64>,
    buffered_len: u64,
    total: Option<u64>,
) -> Result<SplicePlan> {
    if let Some(end) = end
        && end <= offset
    {
        return Err(EngineError::InvalidRange(format!(
            "request [{offset}, {end}) is empty"
        )));
    }
    let end = match (end, total) {
        (Some(end), Some(total)) => Some(end.min(total)),
        (Some(end), None) => Some(end),
        (None, total) => total,
    };
    if let Some(end) = end
        && offset >= end
    {
        return Err(EngineError::InvalidRange(format!(
            "offset {offset} is past the end of the resource ({end})"
        )));
    }

    let mut next = offset;
    let buffered = if offset < buffered_len {
        let stop = end.map_or(buffered_len, |e| e.min(buffered_len));
        next = stop;
        Some(offset as usize..stop as usize)
    } else {
        None
    };

    let remote = match end {
        Some(end) if next >= end => None,
        Some(end) => Some(ByteRange {
            start: next,
            end: Some(end - 1),
        }),
        None => Some(ByteRange::starting_at(next)),
    };

    Ok(SplicePlan { buffered, remote })
}
