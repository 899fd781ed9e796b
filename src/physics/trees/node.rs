use crate::utilities::bounding_box::BoundingBox;

/// Index used in place of a node for "no node".
pub const NULL_NODE: u32 = u32::MAX;

/// Binary tree node. Leaves carry a payload and no children; internal nodes carry two children and no payload.
#[derive(Clone, Debug)]
pub struct Node<T> {
    /// Bounds of the node. For leaves this is the fattened bounds of the payload.
    pub bounds: BoundingBox,
    pub parent: u32,
    pub children: [u32; 2],
    /// Zero for leaves, one more than the taller child otherwise. Free nodes hold -1.
    pub height: i32,
    pub payload: Option<T>,
}

impl<T> Node<T> {
    pub(crate) fn leaf(bounds: BoundingBox, payload: T) -> Self {
        Self {
            bounds,
            parent: NULL_NODE,
            children: [NULL_NODE; 2],
            height: 0,
            payload: Some(payload),
        }
    }

    pub(crate) fn internal() -> Self {
        Self {
            bounds: BoundingBox::default(),
            parent: NULL_NODE,
            children: [NULL_NODE; 2],
            height: 0,
            payload: None,
        }
    }

    pub(crate) fn free() -> Self {
        Self {
            height: -1,
            ..Self::internal()
        }
    }

    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        self.children[0] == NULL_NODE
    }

    /// Which child slot of this node holds `child`.
    #[inline(always)]
    pub(crate) fn index_of_child(&self, child: u32) -> usize {
        if self.children[0] == child {
            0
        } else {
            1
        }
    }
}
