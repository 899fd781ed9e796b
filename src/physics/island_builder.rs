//! Groups the moving bodies of a step into islands of bodies coupled through constraints.
//!
//! Islands are recomputed every step with a union-find over body indices and discarded afterwards. Static and
//! kinematic bodies never join islands together: they do not transmit impulses, so two stacks resting on the same
//! ground are independent.

use std::collections::HashMap;

use crate::physics::handles::BodyId;
use crate::utilities::temp_allocator::TempAllocator;

/// Bodies and constraints solved together by one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Island {
    /// Members in the order they were passed to the builder.
    pub bodies: Vec<BodyId>,
    /// Indices into the contact constraint list, in registration order.
    pub contacts: Vec<usize>,
    /// Indices into the joint list, in registration order.
    pub joints: Vec<usize>,
}

fn find(parents: &mut [u32], mut i: u32) -> u32 {
    while parents[i as usize] != i {
        let grandparent = parents[parents[i as usize] as usize];
        parents[i as usize] = grandparent;
        i = grandparent;
    }
    i
}

fn union(parents: &mut [u32], a: u32, b: u32) {
    let (ra, rb) = (find(parents, a), find(parents, b));
    if ra != rb {
        // The smaller root wins so island order follows body order.
        let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parents[high as usize] = low;
    }
}

/// Builds the islands of `bodies`, the awake dynamic bodies of the step.
///
/// Constraints whose bodies are both outside `bodies` are dropped. Islands come out ordered by their first member.
pub fn build_islands(
    bodies: &[BodyId],
    contacts: &[(BodyId, BodyId)],
    joints: &[(BodyId, BodyId)],
    allocator: &mut TempAllocator,
) -> Vec<Island> {
    let index_of: HashMap<BodyId, u32> = bodies.iter().enumerate().map(|(i, &b)| (b, i as u32)).collect();
    allocator.record::<(BodyId, u32)>(bodies.len());
    let mut parents = allocator.take_indices(bodies.len(), 0);
    for (i, parent) in parents.iter_mut().enumerate() {
        *parent = i as u32;
    }

    for &(a, b) in contacts.iter().chain(joints) {
        if let (Some(&ia), Some(&ib)) = (index_of.get(&a), index_of.get(&b)) {
            union(&mut parents, ia, ib);
        }
    }

    let mut island_of_root: HashMap<u32, usize> = HashMap::new();
    let mut islands: Vec<Island> = Vec::new();
    for (i, &body) in bodies.iter().enumerate() {
        let root = find(&mut parents, i as u32);
        let island = *island_of_root.entry(root).or_insert_with(|| {
            islands.push(Island::default());
            islands.len() - 1
        });
        islands[island].bodies.push(body);
    }

    let root_island = |body: &BodyId, parents: &mut [u32]| {
        index_of
            .get(body)
            .map(|&i| find(parents, i))
            .and_then(|root| island_of_root.get(&root).copied())
    };
    for (index, (a, b)) in contacts.iter().enumerate() {
        if let Some(island) = root_island(a, &mut parents).or_else(|| root_island(b, &mut parents)) {
            islands[island].contacts.push(index);
        }
    }
    for (index, (a, b)) in joints.iter().enumerate() {
        if let Some(island) = root_island(a, &mut parents).or_else(|| root_island(b, &mut parents)) {
            islands[island].joints.push(index);
        }
    }

    allocator.return_indices(parents);
    islands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: u32) -> BodyId {
        BodyId::new(i, 0)
    }

    #[test]
    fn constraints_merge_islands() {
        let mut allocator = TempAllocator::default();
        let bodies = [id(0), id(1), id(2), id(3)];
        let contacts = [(id(0), id(2)), (id(3), id(9))];
        let joints = [(id(2), id(1))];
        let islands = build_islands(&bodies, &contacts, &joints, &mut allocator);
        assert_eq!(islands.len(), 2);
        assert_eq!(islands[0].bodies, vec![id(0), id(1), id(2)]);
        assert_eq!(islands[0].contacts, vec![0]);
        assert_eq!(islands[0].joints, vec![0]);
        assert_eq!(islands[1].bodies, vec![id(3)]);
        assert_eq!(islands[1].contacts, vec![1]);
    }

    #[test]
    fn static_bodies_do_not_bridge_islands() {
        let mut allocator = TempAllocator::default();
        let ground = id(100);
        let bodies = [id(0), id(1)];
        let contacts = [(ground, id(0)), (ground, id(1))];
        let islands = build_islands(&bodies, &contacts, &[], &mut allocator);
        assert_eq!(islands.len(), 2);
        assert_eq!(islands[0].contacts, vec![0]);
        assert_eq!(islands[1].contacts, vec![1]);
    }

    #[test]
    fn constraints_between_outsiders_are_dropped() {
        let mut allocator = TempAllocator::default();
        let islands = build_islands(&[id(0)], &[(id(5), id(6))], &[], &mut allocator);
        assert_eq!(islands.len(), 1);
        assert!(islands[0].contacts.is_empty());
    }
}
