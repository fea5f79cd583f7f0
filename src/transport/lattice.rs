//! Dense per-voxel fields over the tissue lattice.

use std::ops::{Index, IndexMut};

use glam::IVec3;

use crate::geometry::LatticeShape;

/// One value per lattice voxel, stored x fastest, then y, then z
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeField<T> {
    shape: LatticeShape,
    values: Vec<T>,
}

impl<T: Clone + Default> LatticeField<T> {
    pub fn new(shape: LatticeShape) -> Self {
        Self::filled(shape, T::default())
    }

    /// Resets every voxel to the default value
    pub fn clear(&mut self) {
        self.fill(T::default());
    }
}

impl<T: Clone> LatticeField<T> {
    pub fn filled(shape: LatticeShape, value: T) -> Self {
        Self {
            shape,
            values: vec![value; shape.voxel_count()],
        }
    }

    pub fn fill(&mut self, value: T) {
        self.values.fill(value);
    }
}

impl<T> LatticeField<T> {
    pub fn shape(&self) -> LatticeShape {
        self.shape
    }

    pub fn contains(&self, voxel: IVec3) -> bool {
        voxel.x >= 0
            && voxel.y >= 0
            && voxel.z >= 0
            && voxel.x < self.shape.length
            && voxel.y < self.shape.width
            && voxel.z < self.shape.height
    }

    fn offset(&self, voxel: IVec3) -> usize {
        let (l, w) = (self.shape.length as usize, self.shape.width as usize);
        (voxel.z as usize * w + voxel.y as usize) * l + voxel.x as usize
    }

    pub fn get(&self, voxel: IVec3) -> Option<&T> {
        self.contains(voxel).then(|| &self.values[self.offset(voxel)])
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.values.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.values.iter_mut()
    }
}

impl<T> Index<IVec3> for LatticeField<T> {
    type Output = T;

    fn index(&self, voxel: IVec3) -> &T {
        assert!(self.contains(voxel), "voxel {:?} outside lattice", voxel);
        &self.values[self.offset(voxel)]
    }
}

impl<T> IndexMut<IVec3> for LatticeField<T> {
    fn index_mut(&mut self, voxel: IVec3) -> &mut T {
        assert!(self.contains(voxel), "voxel {:?} outside lattice", voxel);
        let offset = self.offset(voxel);
        &mut self.values[offset]
    }
}
