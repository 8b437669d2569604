//! Runtime options of the indexer.

use serde::{Deserialize, Serialize};

use crate::algs::communicator::{CommTag, NumberingCommTags};
use crate::algs::resolver::OwnershipPolicy;

/// Options for building global unknowns.
///
/// Every rank of a communicator must use the same options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerOptions {
    /// Message tags of the collective phases (derived from one base tag).
    pub tags: NumberingCommTags,
    /// Owner of entities touched by several ranks.
    pub ownership: OwnershipPolicy,
}

impl IndexerOptions {
    /// Default options with all phase tags derived from `base`.
    pub fn with_base_tag(base: CommTag) -> Self {
        Self {
            tags: NumberingCommTags::from_base(base),
            ..Self::default()
        }
    }

    pub fn with_ownership(mut self, ownership: OwnershipPolicy) -> Self {
        self.ownership = ownership;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_tag_moves_every_phase() {
        let opts = IndexerOptions::with_base_tag(CommTag::new(100));
        assert_eq!(opts.tags.claim.as_u16(), 100);
        assert_eq!(opts.tags.transfer.as_u16(), 116);
        assert_eq!(opts.ownership, OwnershipPolicy::LowestRank);
    }

    #[test]
    fn json_roundtrip() {
        let opts = IndexerOptions::default().with_ownership(OwnershipPolicy::HighestRank);
        let json = serde_json::to_string(&opts).unwrap();
        let back: IndexerOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, opts);
    }
}
