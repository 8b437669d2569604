//! Field patterns: where a field's DOFs live on one cell.
//!
//! A pattern is a query-only capability. It answers, for each sub-cell
//! `(dim, sub_cell)` of its cell type, which of the field's local DOF indices
//! sit there. Interpolation order and element family only change the answers,
//! never the interface.

use std::fmt;

use crate::topology::cell_type::CellType;

/// Query contract shared by every field pattern.
pub trait FieldPattern: fmt::Debug + Send + Sync {
    /// Cell type the pattern is defined on.
    fn cell_topology(&self) -> CellType;

    /// Topological dimension of the cell.
    fn dimension(&self) -> usize {
        self.cell_topology().dimension()
    }

    /// Number of sub-cells of dimension `dim`.
    fn sub_cell_count(&self, dim: usize) -> usize {
        self.cell_topology().sub_cell_count(dim)
    }

    /// Local DOF indices on sub-cell `sub_cell` of dimension `dim`, in the
    /// order the slots are laid out on that entity. Empty when the sub-cell
    /// carries nothing or does not exist.
    fn sub_cell_indices(&self, dim: usize, sub_cell: usize) -> &[usize];

    /// Total number of local DOF indices.
    fn num_ids(&self) -> usize {
        (0..=self.dimension())
            .map(|dim| {
                (0..self.sub_cell_count(dim))
                    .map(|sc| self.sub_cell_indices(dim, sc).len())
                    .sum::<usize>()
            })
            .sum()
    }

    /// Do both patterns describe the same cell geometry?
    fn same_geometry(&self, other: &dyn FieldPattern) -> bool {
        self.cell_topology() == other.cell_topology()
    }

    /// Same geometry and identical slot layout on every sub-cell.
    fn equals(&self, other: &dyn FieldPattern) -> bool {
        self.same_geometry(other)
            && (0..=self.dimension()).all(|dim| {
                (0..self.sub_cell_count(dim))
                    .all(|sc| self.sub_cell_indices(dim, sc) == other.sub_cell_indices(dim, sc))
            })
    }
}

/// Pattern with a fixed number of DOFs on every sub-cell of a dimension.
///
/// Local indices run dimension-major: all vertex slots first (vertex 0, then
/// vertex 1, ...), then edges, faces and the interior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubCellPattern {
    cell_type: CellType,
    /// `indices[dim][sub_cell]`
    indices: Vec<Vec<Vec<usize>>>,
}

impl SubCellPattern {
    /// `per_dim[d]` DOFs on every sub-cell of dimension `d`; missing trailing
    /// entries count as zero.
    pub fn with_counts(cell_type: CellType, per_dim: &[usize]) -> Self {
        let mut next = 0usize;
        let indices = cell_type
            .sub_cell_counts()
            .into_iter()
            .enumerate()
            .map(|(dim, count)| {
                let n = per_dim.get(dim).copied().unwrap_or(0);
                (0..count)
                    .map(|_| {
                        let ids: Vec<usize> = (next..next + n).collect();
                        next += n;
                        ids
                    })
                    .collect()
            })
            .collect();
        Self { cell_type, indices }
    }

    /// One DOF per vertex (P1/Q1 Lagrange).
    pub fn nodal(cell_type: CellType) -> Self {
        Self::with_counts(cell_type, &[1])
    }

    /// One DOF per edge (lowest-order edge elements).
    pub fn edge(cell_type: CellType) -> Self {
        Self::with_counts(cell_type, &[0, 1])
    }

    /// One DOF per face of a 3D cell (lowest-order face elements).
    pub fn face(cell_type: CellType) -> Self {
        Self::with_counts(cell_type, &[0, 0, 1])
    }

    /// `n` DOFs in the cell interior (discontinuous fields).
    pub fn interior(cell_type: CellType, n: usize) -> Self {
        let mut per_dim = vec![0; cell_type.dimension() + 1];
        per_dim[cell_type.dimension()] = n;
        Self::with_counts(cell_type, &per_dim)
    }
}

impl FieldPattern for SubCellPattern {
    fn cell_topology(&self) -> CellType {
        self.cell_type
    }

    fn sub_cell_indices(&self, dim: usize, sub_cell: usize) -> &[usize] {
        self.indices
            .get(dim)
            .and_then(|d| d.get(sub_cell))
            .map_or(&[][..], Vec::as_slice)
    }
}
