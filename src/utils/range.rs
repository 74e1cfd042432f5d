//! Single-span `Range: bytes=...` handling for file downloads.

/// Inclusive byte span within an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn to_header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnsatisfiableRange;

/// Resolves a `Range` header against an object of `size` bytes.
///
/// Accepts `bytes=a-b`, `bytes=a-` and the suffix form `bytes=-n`. An end
/// beyond the object is clamped to the last byte. Anything else, including
/// multiple ranges, is rejected.
pub fn parse_range(value: &str, size: u64) -> Result<ByteRange, UnsatisfiableRange> {
    let spec = value.trim().strip_prefix("bytes=").ok_or(UnsatisfiableRange)?;
    if spec.contains(',') || size == 0 {
        return Err(UnsatisfiableRange);
    }

    let (first, second) = spec.split_once('-').ok_or(UnsatisfiableRange)?;
    let (first, second) = (first.trim(), second.trim());

    let (start, end) = if first.is_empty() {
        let suffix: u64 = second.parse().map_err(|_| UnsatisfiableRange)?;
        if suffix == 0 {
            return Err(UnsatisfiableRange);
        }
        (size.saturating_sub(suffix), size - 1)
    } else {
        let start: u64 = first.parse().map_err(|_| UnsatisfiableRange)?;
        let end: u64 = if second.is_empty() {
            size - 1
        } else {
            second.parse().map_err(|_| UnsatisfiableRange)?
        };
        (start, end)
    };

    if start > end || start >= size {
        return Err(UnsatisfiableRange);
    }

    Ok(ByteRange {
        start,
        end: end.min(size - 1),
    })
}
