use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Generational identifier of a body slot.
///
/// The slot index is recycled once a body is destroyed, but the sequence number increments each time, so an id
/// kept past its body's destruction never aliases the body that reuses the slot.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId {
    index: u32,
    sequence: u32,
}

impl BodyId {
    /// Id of a body that was never added.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        sequence: u32::MAX,
    };

    #[inline(always)]
    pub(crate) fn new(index: u32, sequence: u32) -> Self {
        Self { index, sequence }
    }

    /// Slot index of the body.
    #[inline(always)]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Reuse counter of the slot when this id was handed out.
    #[inline(always)]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    #[inline(always)]
    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }
}

/// Generational identifier of a user-created constraint.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ConstraintId {
    index: u32,
    sequence: u32,
}

impl ConstraintId {
    #[inline(always)]
    pub(crate) fn new(index: u32, sequence: u32) -> Self {
        Self { index, sequence }
    }

    #[inline(always)]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline(always)]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BodyId<{}:{}>", self.index, self.sequence)
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConstraintId<{}:{}>", self.index, self.sequence)
    }
}

/// Path to a leaf shape inside a compound or mesh hierarchy, packed as bit fields.
///
/// Each level of the hierarchy appends the child index using just enough bits to address every child of that
/// level. The root shape itself is [`SubShapeId::EMPTY`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SubShapeId(u32);

impl SubShapeId {
    /// Identifies the root shape.
    pub const EMPTY: Self = Self(u32::MAX);

    /// Raw packed value.
    #[inline(always)]
    pub fn value(&self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub fn from_value(value: u32) -> Self {
        Self(value)
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Pops the child index of the top level, returning it together with the remainder of the path.
    ///
    /// `bits` must equal the value [`SubShapeIdCreator::push`] used for this level.
    pub fn pop(&self, bits: u32) -> (u32, SubShapeId) {
        let mask = if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 };
        let value = self.0 & mask;
        let remainder = if bits >= 32 {
            Self::EMPTY
        } else {
            Self((self.0 >> bits) | !(u32::MAX >> bits))
        };
        (value, remainder)
    }
}

impl Default for SubShapeId {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for SubShapeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            write!(f, "SubShapeId<root>")
        } else {
            write!(f, "SubShapeId<{:#x}>", self.0)
        }
    }
}

/// Builds [`SubShapeId`]s while descending a shape hierarchy.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SubShapeIdCreator {
    id: u32,
    current_bit: u32,
}

impl SubShapeIdCreator {
    /// Appends `value` using `bits` bits. Levels that no longer fit in 32 bits are dropped.
    #[must_use]
    pub fn push(&self, value: u32, bits: u32) -> Self {
        if self.current_bit + bits > 32 {
            return *self;
        }
        let masked = if bits >= 32 { value } else { value & ((1u32 << bits) - 1) };
        Self {
            id: self.id | (masked << self.current_bit),
            current_bit: self.current_bit + bits,
        }
    }

    /// The id of the path pushed so far. Unused high bits are set so they decode as the empty remainder.
    pub fn id(&self) -> SubShapeId {
        if self.current_bit == 0 {
            SubShapeId::EMPTY
        } else if self.current_bit >= 32 {
            SubShapeId(self.id)
        } else {
            SubShapeId(self.id | (u32::MAX << self.current_bit))
        }
    }

    #[inline(always)]
    pub fn bits_used(&self) -> u32 {
        self.current_bit
    }
}

/// Number of bits needed to address `child_count` children.
#[inline]
pub fn bits_for_child_count(child_count: usize) -> u32 {
    if child_count <= 1 {
        1
    } else {
        usize::BITS - (child_count - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_sequence() {
        assert_eq!(BodyId::new(3, 7).to_string(), "BodyId<3:7>");
    }

    #[test]
    fn sub_shape_path_round_trips_through_levels() {
        let bits_outer = bits_for_child_count(5);
        let bits_inner = bits_for_child_count(300);
        assert_eq!(bits_outer, 3);
        assert_eq!(bits_inner, 9);

        let id = SubShapeIdCreator::default().push(4, bits_outer).push(257, bits_inner).id();
        let (outer, rest) = id.pop(bits_outer);
        assert_eq!(outer, 4);
        let (inner, rest) = rest.pop(bits_inner);
        assert_eq!(inner, 257);
        assert!(rest.is_empty());
    }

    #[test]
    fn empty_creator_yields_root() {
        assert!(SubShapeIdCreator::default().id().is_empty());
    }
}
