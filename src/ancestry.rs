//! Cycle detection along the current branch
//!
//! The ancestry set holds the digests of every form between the root and the
//! node being resolved. A digest may appear in any number of unrelated
//! branches (diamond references), but never twice on one chain from the root
//! down. Entering a form therefore produces a *new* set: siblings and other
//! branches never observe each other's ancestry.

use std::collections::BTreeSet;

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::path::Path;

/// Digests of the forms on the current ancestor chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ancestry {
    digests: BTreeSet<Digest>,
}

impl Ancestry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ancestry seeded with the root form's digest.
    pub fn rooted(root: Digest) -> Self {
        let mut digests = BTreeSet::new();
        digests.insert(root);
        Self { digests }
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.digests.contains(digest)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Descend into the form with `digest`, found at `path`.
    ///
    /// Fails with [`Error::CycleDetected`] if the digest is already on the
    /// chain; `self` is left unchanged either way.
    pub fn enter(&self, digest: &Digest, path: &Path) -> Result<Ancestry> {
        if self.digests.contains(digest) {
            return Err(Error::CycleDetected {
                digest: digest.to_string(),
                path: path.to_string(),
            });
        }
        let mut digests = self.digests.clone();
        digests.insert(digest.clone());
        Ok(Self { digests })
    }
}
