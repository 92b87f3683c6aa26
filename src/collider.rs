use cgmath::Vector3;
use encase::ShaderType;

use crate::error::{Error, Result};

/// A moving sphere that pushes particles away and swirls them around.
///
/// Laid out as a single `vec4<f32>` on the GPU side (center in xyz, radius in w).
#[derive(Clone, Copy, Debug, PartialEq, ShaderType)]
pub struct Collider {
    pub center: Vector3<f32>,
    pub radius: f32,
}

impl Collider {
    /// Padding slot with no influence on any particle.
    pub const INERT: Collider = Collider {
        center: Vector3 {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        },
        radius: 0.0,
    };

    pub fn new(center: Vector3<f32>, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn is_inert(&self) -> bool {
        self.radius <= 0.0
    }
}

/// Fixed-capacity collider slots, replaced wholesale every frame.
#[derive(Clone, Debug)]
pub struct ColliderSet {
    slots: Vec<Collider>,
    active: usize,
}

impl ColliderSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Collider::INERT; capacity],
            active: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Replaces the set. On error the previous contents are kept.
    pub fn replace(&mut self, colliders: &[Collider]) -> Result<()> {
        if colliders.len() > self.slots.len() {
            return Err(Error::TooManyColliders {
                given: colliders.len(),
                max: self.slots.len(),
            });
        }
        for (index, c) in colliders.iter().enumerate() {
            let center = c.center;
            if !(center.x.is_finite() && center.y.is_finite() && center.z.is_finite()) {
                return Err(Error::InvalidCollider {
                    index,
                    reason: "center is not finite",
                });
            }
            if !c.radius.is_finite() {
                return Err(Error::InvalidCollider {
                    index,
                    reason: "radius is not finite",
                });
            }
        }

        self.slots[..colliders.len()].copy_from_slice(colliders);
        self.slots[colliders.len()..].fill(Collider::INERT);
        self.active = colliders.len();
        Ok(())
    }

    /// Every slot, padding included, in index order.
    pub fn slots(&self) -> &[Collider] {
        &self.slots
    }

    /// Only the slots filled by the last [`replace`](Self::replace).
    pub fn active(&self) -> &[Collider] {
        &self.slots[..self.active]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(x: f32, r: f32) -> Collider {
        Collider::new(Vector3::new(x, 0.0, 0.0), r)
    }

    #[test]
    fn short_lists_are_padded_with_inert_slots() -> Result<()> {
        let mut set = ColliderSet::new(4);
        set.replace(&[sphere(1.0, 0.5), sphere(2.0, 0.25)])?;
        assert_eq!(set.slots().len(), 4);
        assert_eq!(set.active().len(), 2);
        assert!(set.slots()[2..].iter().all(Collider::is_inert));
        Ok(())
    }

    #[test]
    fn oversize_list_keeps_previous_set() -> Result<()> {
        let mut set = ColliderSet::new(2);
        set.replace(&[sphere(1.0, 0.5)])?;
        let err = set.replace(&[sphere(0.0, 1.0); 3]);
        assert!(matches!(
            err,
            Err(Error::TooManyColliders { given: 3, max: 2 })
        ));
        assert_eq!(set.active(), &[sphere(1.0, 0.5)]);
        Ok(())
    }

    #[test]
    fn non_finite_collider_rejected() -> Result<()> {
        let mut set = ColliderSet::new(2);
        set.replace(&[sphere(1.0, 0.5)])?;
        let err = set.replace(&[sphere(0.0, 0.5), sphere(f32::NAN, 0.5)]);
        assert!(matches!(err, Err(Error::InvalidCollider { index: 1, .. })));
        assert_eq!(set.active(), &[sphere(1.0, 0.5)]);
        Ok(())
    }

    #[test]
    fn shrinking_clears_stale_slots() -> Result<()> {
        let mut set = ColliderSet::new(3);
        set.replace(&[sphere(1.0, 0.5); 3])?;
        set.replace(&[])?;
        assert!(set.slots().iter().all(Collider::is_inert));
        Ok(())
    }

    #[test]
    fn negative_radius_is_inert() {
        assert!(sphere(0.0, -1.0).is_inert());
        assert!(!sphere(0.0, 0.1).is_inert());
    }
}
