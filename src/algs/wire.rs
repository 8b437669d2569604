//! Fixed, little-endian wire records for the numbering exchanges.
//!
//! All multi-byte integers are stored pre-LE with `.to_le()` and decoded with
//! `.from_le()`, so the byte layout is identical on every rank.

use bytemuck::{Pod, Zeroable};

use crate::dof::FieldId;
use crate::dof_error::DofError;
use crate::topology::ownership::DofKey;
use crate::topology::point::PointId;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32, // count of following records
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// `(entity, field)` pair carried on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct WireKey {
    pub point_le: u64,
    pub field_le: u64,
}

impl WireKey {
    pub fn of(key: DofKey) -> Self {
        Self {
            point_le: key.point.get().to_le(),
            field_le: (key.field as u64).to_le(),
        }
    }

    pub fn key(&self) -> Result<DofKey, DofError> {
        Ok(DofKey::new(
            PointId::new(u64::from_le(self.point_le))?,
            u64::from_le(self.field_le) as FieldId,
        ))
    }
}

/// Numbering request: `slots` DOFs of one field on one entity.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct WireClaim {
    pub key: WireKey,
    pub slots_le: u32,
    pub reserved_le: u32, // keep zero
}

impl WireClaim {
    pub fn new(key: DofKey, slots: u32) -> Self {
        Self {
            key: WireKey::of(key),
            slots_le: slots.to_le(),
            reserved_le: 0,
        }
    }
    pub fn slots(&self) -> u32 {
        u32::from_le(self.slots_le)
    }
}

/// Owner decided by the directory rank for one claim.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct WireOwner {
    pub owner_le: u32,
}

impl WireOwner {
    pub fn new(owner: usize) -> Self {
        Self {
            owner_le: (owner as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.owner_le) as usize
    }
}

/// A global index (first GID of a slot run, or a plain row/column id).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct WireGid {
    pub gid_le: u64,
}

impl WireGid {
    pub fn of(gid: u64) -> Self {
        Self { gid_le: gid.to_le() }
    }
    pub fn get(&self) -> u64 {
        u64::from_le(self.gid_le)
    }
}

/// One `(row, column)` coupling of a sparsity graph.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct WireCoupling {
    pub row_le: u64,
    pub col_le: u64,
}

impl WireCoupling {
    pub fn new(row: u64, col: u64) -> Self {
        Self {
            row_le: row.to_le(),
            col_le: col.to_le(),
        }
    }
    pub fn row(&self) -> u64 {
        u64::from_le(self.row_le)
    }
    pub fn col(&self) -> u64 {
        u64::from_le(self.col_le)
    }
}
