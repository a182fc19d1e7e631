//! Growable bitsets.
//!
//! Used for an entity's component presence, the clauses of a [`Family`](crate::Family),
//! and the families an entity currently belongs to.

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use fixedbitset::FixedBitSet;
pub use fixedbitset::Ones;

/// A growable set of small integers.
///
/// Equality and hashing look only at the members, never at the capacity the set
/// has grown to, so two sets with the same members compare and hash equal no
/// matter how they were built. That makes a `Bits` usable directly as a hash key.
#[derive(Clone, Default)]
pub struct Bits(FixedBitSet);

impl Bits {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `index` is in the set.
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        self.0.contains(index)
    }

    /// Add `index` to the set.
    pub fn set(&mut self, index: usize) {
        self.0.grow(index + 1);
        self.0.insert(index);
    }

    /// Remove `index` from the set.
    pub fn unset(&mut self, index: usize) {
        if index < self.0.len() {
            self.0.set(index, false);
        }
    }

    /// Remove every member, keeping the allocation.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Check if the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_clear()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.count_ones(..)
    }

    /// Check whether every member of `other` is also in `self`.
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        other.0.is_subset(&self.0)
    }

    /// Check whether the two sets share at least one member.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    /// Add every member of `other`.
    pub fn union_with(&mut self, other: &Self) {
        self.0.union_with(&other.0);
    }

    /// Iterate the members in ascending order.
    #[must_use]
    pub fn iter(&self) -> Ones<'_> {
        self.0.ones()
    }
}

impl PartialEq for Bits {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for Bits {}

impl Hash for Bits {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for index in self.iter() {
            index.hash(state);
        }
        self.len().hash(state);
    }
}

impl FromIterator<usize> for Bits {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bits = Self::new();
        for i in iter {
            bits.set(i);
        }
        bits
    }
}

impl<'a> IntoIterator for &'a Bits {
    type Item = usize;
    type IntoIter = Ones<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::hash::BuildHasher;

    use rustc_hash::FxBuildHasher;

    use super::*;

    #[test]
    fn test_set_get_unset() {
        let mut bits = Bits::new();
        assert!(bits.is_empty());

        bits.set(3);
        bits.set(130);
        assert!(bits.get(3));
        assert!(bits.get(130));
        assert!(!bits.get(4));
        assert!(!bits.get(4000));
        assert_eq!(bits.len(), 2);

        bits.unset(130);
        bits.unset(4000);
        assert!(!bits.get(130));
        assert_eq!(bits.len(), 1);
    }

    #[test]
    fn test_equal_members_compare_and_hash_equal() {
        let mut grown = Bits::new();
        grown.set(200);
        grown.set(1);
        grown.unset(200);

        let mut small = Bits::new();
        small.set(1);

        assert_eq!(grown, small);
        assert_eq!(FxBuildHasher.hash_one(&grown), FxBuildHasher.hash_one(&small));

        grown.unset(1);
        assert!(grown.is_empty());
        assert_eq!(grown, Bits::new());
        assert_eq!(FxBuildHasher.hash_one(&grown), FxBuildHasher.hash_one(Bits::new()));
    }

    #[test]
    fn test_iter_ascending_across_words() {
        let bits: Bits = [70, 0, 64, 5, 191].into_iter().collect();
        let members: Vec<usize> = bits.iter().collect();
        assert_eq!(members, vec![0, 5, 64, 70, 191]);
    }

    #[test]
    fn test_subset_and_intersection() {
        let present: Bits = [1, 2, 3, 100].into_iter().collect();
        let all: Bits = [1, 100].into_iter().collect();
        let other: Bits = [4, 5].into_iter().collect();

        assert!(present.contains_all(&all));
        assert!(!all.contains_all(&present));
        assert!(present.contains_all(&Bits::new()));
        assert!(present.intersects(&all));
        assert!(!present.intersects(&other));
        assert!(!present.intersects(&Bits::new()));
    }

    #[test]
    fn test_union() {
        let mut a: Bits = [1].into_iter().collect();
        let b: Bits = [65, 2].into_iter().collect();
        a.union_with(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 2, 65]);
    }
}
