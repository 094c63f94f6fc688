//! Structural deltas.
//!
//! The synchronizer describes how a raw snapshot differs from the canonical tree as a list of
//! tagged [`StructuralChange`]s. Consumers (the session, tests, hosts mirroring the tree) can
//! react to the delta without diffing documents themselves.
//!
//! Positions in [`StructuralChange::Reordered`] are flat document positions: the index of the
//! block when all pages are concatenated, sentinels included.

use crate::block::{BlockId, BlockKind};

/// One structural difference between the canonical tree and a raw snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralChange {
    /// A block that the canonical tree did not have.
    Inserted {
        /// Id of the new block (generated if the surface did not provide a usable one).
        id: BlockId,
        /// Page index in the snapshot.
        page: usize,
        /// Index within that page.
        index: usize,
    },
    /// A block that is no longer present.
    Removed {
        /// Id of the removed block.
        id: BlockId,
    },
    /// A block that changed its position relative to the other retained blocks.
    Reordered {
        /// Id of the moved block.
        id: BlockId,
        /// Flat position before.
        from: usize,
        /// Flat position after.
        to: usize,
    },
    /// Text, formatting or metadata changed.
    ContentChanged {
        /// Id of the changed block.
        id: BlockId,
    },
    /// The block kind changed.
    Retyped {
        /// Id of the retyped block.
        id: BlockId,
        /// Previous kind.
        from: BlockKind,
        /// New kind.
        to: BlockKind,
    },
    /// A degenerate block was repaired by assigning it a kind.
    Normalized {
        /// Id of the repaired block.
        id: BlockId,
        /// The kind it received.
        kind: BlockKind,
    },
}

impl StructuralChange {
    /// Id of the affected block.
    pub fn id(&self) -> &BlockId {
        match self {
            Self::Inserted { id, .. }
            | Self::Removed { id }
            | Self::Reordered { id, .. }
            | Self::ContentChanged { id }
            | Self::Retyped { id, .. }
            | Self::Normalized { id, .. } => id,
        }
    }

    /// Check whether the change can affect page assignment on its own.
    ///
    /// Content changes only matter through the block's height, which the flow engine measures
    /// anyway.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::ContentChanged { .. })
    }
}

/// The full set of differences found by one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentDelta {
    /// Changes, in snapshot order; removals come last.
    pub changes: Vec<StructuralChange>,
    /// Lowest page index touched by any change.
    pub first_page: Option<usize>,
}

impl DocumentDelta {
    /// Returns `true` if the snapshot matched the canonical tree.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Iterate the changes.
    pub fn iter(&self) -> std::slice::Iter<'_, StructuralChange> {
        self.changes.iter()
    }

    /// Ids of inserted blocks.
    pub fn inserted(&self) -> impl Iterator<Item = &BlockId> {
        self.changes.iter().filter_map(|change| match change {
            StructuralChange::Inserted { id, .. } => Some(id),
            _ => None,
        })
    }

    /// Ids of removed blocks.
    pub fn removed(&self) -> impl Iterator<Item = &BlockId> {
        self.changes.iter().filter_map(|change| match change {
            StructuralChange::Removed { id } => Some(id),
            _ => None,
        })
    }

    pub(crate) fn push(&mut self, change: StructuralChange, page: usize) {
        self.first_page = Some(self.first_page.map_or(page, |first| first.min(page)));
        self.changes.push(change);
    }
}

impl<'a> IntoIterator for &'a DocumentDelta {
    type Item = &'a StructuralChange;
    type IntoIter = std::slice::Iter<'a, StructuralChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_tracks_minimum() {
        let mut delta = DocumentDelta::default();
        assert!(delta.is_empty());
        delta.push(StructuralChange::ContentChanged { id: "b".into() }, 3);
        delta.push(StructuralChange::Removed { id: "a".into() }, 1);
        assert_eq!(delta.first_page, Some(1));
        assert_eq!(delta.removed().collect::<Vec<_>>(), vec![&BlockId::new("a")]);
        assert!(!delta.changes[0].is_structural());
        assert!(delta.changes[1].is_structural());
    }
}
