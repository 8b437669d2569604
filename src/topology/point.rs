//! `PointId`: a strong, zero-cost key for mesh entities
//!
//! Every mesh entity a DOF can live on (vertex, edge, face, cell interior)
//! is named by one `PointId`. Vertices, edges, faces and cells share a single
//! key space, and the key is *global*: two ranks that both touch a shared
//! vertex name it with the same `PointId`. That is what lets the numbering
//! step recognise shared entities without knowing local indices.
//!
//! `PointId` wraps a nonzero `u64`; 0 is reserved as the invalid sentinel.

use std::{fmt, num::NonZeroU64};

use crate::dof_error::DofError;

/// Global key for one mesh entity.
///
/// # Memory layout
/// This type is `repr(transparent)`, meaning it has the same ABI and
/// alignment as its single field (`NonZeroU64`) and can be sent over the
/// wire exactly like a `u64`.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct PointId(NonZeroU64);

impl PointId {
    /// Creates a new `PointId` from a raw `u64` value.
    ///
    /// Returns [`DofError::InvalidPointId`] if `raw == 0`.
    ///
    /// ```rust
    /// # use mesh_dofs::topology::point::PointId;
    /// let p = PointId::new(1).unwrap();
    /// assert_eq!(p.get(), 1);
    /// assert!(PointId::new(0).is_err());
    /// ```
    #[inline]
    pub fn new(raw: u64) -> Result<Self, DofError> {
        NonZeroU64::new(raw)
            .map(PointId)
            .ok_or(DofError::InvalidPointId)
    }

    /// Returns the inner `u64` value of this `PointId`.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PointId").field(&self.get()).finish()
    }
}

/// Prints the numeric ID without any wrapper text.
impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl TryFrom<u64> for PointId {
    type Error = DofError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        PointId::new(raw)
    }
}

/// `PointId` can be sent over MPI as a `u64`.
#[cfg(feature = "mpi-support")]
unsafe impl mpi::datatype::Equivalence for PointId {
    type Out = <u64 as mpi::datatype::Equivalence>::Out;

    fn equivalent_datatype() -> Self::Out {
        u64::equivalent_datatype()
    }
}
