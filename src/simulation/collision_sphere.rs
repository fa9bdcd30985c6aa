use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    floating_type_mod::FT,
    normalize_or_zero, V3,
};

/// Static spherical obstacle. Cells are pushed out of it, the sphere never moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionSphere {
    pub center: V3,
    pub radius: FT,
}

impl CollisionSphere {
    pub fn new(center: V3, radius: FT) -> Result<CollisionSphere> {
        let sphere = CollisionSphere { center, radius };
        sphere.validate()?;
        Ok(sphere)
    }

    /// Deserialized spheres bypass [`CollisionSphere::new`], so scene loading calls this.
    pub fn validate(&self) -> Result<()> {
        if !(self.radius > 0.) || !self.radius.is_finite() {
            return Err(ConfigError::NonPositiveRadius(self.radius));
        }
        Ok(())
    }

    /// A point on the surface counts as touching.
    #[inline(always)]
    pub fn is_in_contact(&self, x: V3) -> bool {
        (x - self.center).norm() <= self.radius
    }

    /// Removes the part of `velocity` pointing into the sphere if `x` touches it.
    ///
    /// Outward and tangential motion is left alone. Contact exactly at the center
    /// has no defined normal and leaves the velocity unchanged.
    #[inline(always)]
    pub fn resolve_contact(&self, x: V3, velocity: &mut V3) -> bool {
        if !self.is_in_contact(x) {
            return false;
        }
        let normal = normalize_or_zero(x - self.center);
        *velocity -= FT::min(velocity.dot(&normal), 0.) * normal;
        true
    }
}

impl Default for CollisionSphere {
    fn default() -> Self {
        CollisionSphere {
            center: V3::zeros(),
            radius: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CollisionSphere;
    use crate::{error::ConfigError, vec3f, V3};

    #[test]
    fn rejects_non_positive_radius() {
        assert_eq!(
            CollisionSphere::new(V3::zeros(), 0.).unwrap_err(),
            ConfigError::NonPositiveRadius(0.)
        );
        assert!(CollisionSphere::new(V3::zeros(), -1.).is_err());
        assert!(CollisionSphere::new(V3::zeros(), crate::floating_type_mod::FT::NAN).is_err());
        assert!(CollisionSphere::new(V3::zeros(), 0.3).is_ok());
    }

    #[test]
    fn inward_velocity_loses_normal_component() {
        let sphere = CollisionSphere::default();
        let x = vec3f(0.29, 0., 0.);
        let mut v = vec3f(-1., 0.5, 0.25);
        assert!(sphere.resolve_contact(x, &mut v));
        let normal = vec3f(1., 0., 0.);
        assert!(v.dot(&normal) >= 0.);
        assert_eq!(v, vec3f(0., 0.5, 0.25));
    }

    #[test]
    fn tangential_and_outward_velocity_untouched() {
        let sphere = CollisionSphere::default();
        let x = vec3f(0., 0.29, 0.);

        let mut tangential = vec3f(1., 0., -2.);
        sphere.resolve_contact(x, &mut tangential);
        assert_eq!(tangential, vec3f(1., 0., -2.));

        let mut outward = vec3f(0.5, 3., 0.);
        sphere.resolve_contact(x, &mut outward);
        assert_eq!(outward, vec3f(0.5, 3., 0.));
    }

    #[test]
    fn no_contact_outside() {
        let sphere = CollisionSphere::default();
        let mut v = vec3f(0., -1., 0.);
        assert!(!sphere.resolve_contact(vec3f(0., 0.6, 0.), &mut v));
        assert_eq!(v, vec3f(0., -1., 0.));
        assert!(!sphere.is_in_contact(vec3f(0., 0.6, 0.)));
        assert!(sphere.is_in_contact(vec3f(0., 0.1, 0.)));
        assert!(sphere.is_in_contact(vec3f(0., 0.3, 0.)));
    }

    #[test]
    fn center_contact_has_no_normal() {
        let sphere = CollisionSphere::default();
        let mut v = vec3f(0., -1., 0.);
        assert!(sphere.resolve_contact(V3::zeros(), &mut v));
        assert_eq!(v, vec3f(0., -1., 0.));
        assert!(v.iter().all(|c| c.is_finite()));
    }
}
