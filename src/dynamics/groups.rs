use crate::math::{Real, Rotation, Vector};

/// Rigid transform of a scripted group, with the value it had at the last
/// applied step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GroupTransform {
    pub rotation: Rotation<Real>,
    pub translation: Vector<Real>,
    pub prev_rotation: Rotation<Real>,
    pub prev_translation: Vector<Real>,
}

impl Default for GroupTransform {
    fn default() -> Self {
        Self {
            rotation: Rotation::identity(),
            translation: Vector::zeros(),
            prev_rotation: Rotation::identity(),
            prev_translation: Vector::zeros(),
        }
    }
}

impl GroupTransform {
    /// Rotation applied since the last step.
    #[inline]
    pub fn rotation_diff(&self) -> Rotation<Real> {
        self.rotation * self.prev_rotation.inverse()
    }
}

/// Per-group rigid transforms driven by the animation scripts.
#[derive(Clone, Debug, Default)]
pub struct GroupTransforms {
    transforms: Vec<GroupTransform>,
}

impl GroupTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn resize_groups(&mut self, num_groups: usize) {
        self.transforms
            .resize(num_groups, GroupTransform::default());
    }

    #[inline]
    pub fn get(&self, group: usize) -> Option<&GroupTransform> {
        self.transforms.get(group)
    }

    /// Sets the target transform of a group for the next scripted step.
    pub fn set_transform(
        &mut self,
        group: usize,
        rotation: Rotation<Real>,
        translation: Vector<Real>,
    ) -> anyhow::Result<()> {
        let len = self.transforms.len();
        let t = self
            .transforms
            .get_mut(group)
            .ok_or_else(|| anyhow::anyhow!("group {} out of range ({} groups)", group, len))?;
        t.rotation = rotation;
        t.translation = translation;
        Ok(())
    }

    /// Marks the current transforms as applied.
    pub fn commit(&mut self) {
        for t in &mut self.transforms {
            t.prev_rotation = t.rotation;
            t.prev_translation = t.translation;
        }
    }
}
