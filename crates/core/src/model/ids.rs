use std::fmt;
use std::str::FromStr;

/// Unique identifier for a curriculum block.
///
/// Block ids are positive and ordered; block `n + 1` follows block `n`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

impl BlockId {
    /// The first block, which is always unlocked.
    pub const FIRST: BlockId = BlockId(1);

    /// Creates a new `BlockId`
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Returns the id of the block that follows this one.
    #[must_use]
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Unique identifier for a lesson, formatted as `<blockId>-<n>`.
///
/// The ordinal `n` starts at 1 within each block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LessonId {
    block: BlockId,
    ordinal: u32,
}

impl LessonId {
    /// Creates a new `LessonId`
    #[must_use]
    pub fn new(block: BlockId, ordinal: u32) -> Self {
        Self { block, ordinal }
    }

    /// The block this lesson id is namespaced under.
    #[must_use]
    pub fn block(&self) -> BlockId {
        self.block
    }

    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Debug for LessonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LessonId({}-{})", self.block.0, self.ordinal)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LessonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.block.0, self.ordinal)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
    raw: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from {:?}", self.kind, self.raw)
    }
}

impl std::error::Error for ParseIdError {}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().filter(|value| *value > 0)
}

impl FromStr for BlockId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_positive(s.trim())
            .map(BlockId::new)
            .ok_or_else(|| ParseIdError {
                kind: "BlockId",
                raw: s.to_string(),
            })
    }
}

impl FromStr for LessonId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError {
            kind: "LessonId",
            raw: s.to_string(),
        };
        let (block, ordinal) = s.trim().split_once('-').ok_or_else(err)?;
        let block = parse_positive(block).ok_or_else(err)?;
        let ordinal = parse_positive(ordinal).ok_or_else(err)?;
        Ok(LessonId::new(BlockId::new(block), ordinal))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_display() {
        let id = BlockId::new(4);
        assert_eq!(id.to_string(), "4");
    }

    #[test]
    fn test_block_id_rejects_zero() {
        assert!("0".parse::<BlockId>().is_err());
        assert!("x".parse::<BlockId>().is_err());
    }

    #[test]
    fn test_block_id_next() {
        assert_eq!(BlockId::new(2).next(), BlockId::new(3));
    }

    #[test]
    fn test_lesson_id_display() {
        let id = LessonId::new(BlockId::new(3), 2);
        assert_eq!(id.to_string(), "3-2");
    }

    #[test]
    fn test_lesson_id_from_str() {
        let id: LessonId = "6-4".parse().unwrap();
        assert_eq!(id.block(), BlockId::new(6));
        assert_eq!(id.ordinal(), 4);
    }

    #[test]
    fn test_lesson_id_from_str_invalid() {
        for raw in ["", "1", "1-", "-1", "a-b", "0-1", "1-0", "1-2-3"] {
            assert!(raw.parse::<LessonId>().is_err(), "{raw} should not parse");
        }
    }
}
