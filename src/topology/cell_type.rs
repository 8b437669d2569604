//! Cell type metadata for element blocks.
//!
//! A block's cell type fixes how many sub-cells of each dimension an element
//! has, which is what field patterns and connectivity are checked against.

use std::fmt;

/// Common cell types for mesh elements.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize,
)]
pub enum CellType {
    /// 0D vertex.
    #[default]
    Vertex,
    /// 1D segment/edge.
    Segment,
    /// 2D simplex (triangle).
    Triangle,
    /// 2D tensor-product cell (quad).
    Quadrilateral,
    /// 2D polygon with `n` vertices.
    Polygon(u8),
    /// 3D simplex (tet).
    Tetrahedron,
    /// 3D tensor-product cell (hex).
    Hexahedron,
    /// 3D wedge/prism.
    Prism,
    /// 3D pyramid.
    Pyramid,
}

impl CellType {
    /// Returns the topological dimension of the cell.
    pub fn dimension(self) -> usize {
        match self {
            CellType::Vertex => 0,
            CellType::Segment => 1,
            CellType::Triangle | CellType::Quadrilateral | CellType::Polygon(_) => 2,
            CellType::Tetrahedron | CellType::Hexahedron | CellType::Prism | CellType::Pyramid => 3,
        }
    }

    /// Number of sub-cells of dimension `dim`.
    ///
    /// `dim == self.dimension()` is the cell interior and always counts 1;
    /// dimensions above the cell's own are empty.
    pub fn sub_cell_count(self, dim: usize) -> usize {
        let d = self.dimension();
        if dim > d {
            return 0;
        }
        if dim == d {
            return 1;
        }
        match (self, dim) {
            (CellType::Segment, 0) => 2,
            (CellType::Triangle, 0) | (CellType::Triangle, 1) => 3,
            (CellType::Quadrilateral, 0) | (CellType::Quadrilateral, 1) => 4,
            (CellType::Polygon(n), _) => n as usize,
            (CellType::Tetrahedron, 0) => 4,
            (CellType::Tetrahedron, 1) => 6,
            (CellType::Tetrahedron, 2) => 4,
            (CellType::Hexahedron, 0) => 8,
            (CellType::Hexahedron, 1) => 12,
            (CellType::Hexahedron, 2) => 6,
            (CellType::Prism, 0) => 6,
            (CellType::Prism, 1) => 9,
            (CellType::Prism, 2) => 5,
            (CellType::Pyramid, 0) => 5,
            (CellType::Pyramid, 1) => 8,
            (CellType::Pyramid, 2) => 5,
            _ => 0,
        }
    }

    /// Sub-cell counts for every dimension `0..=dimension()`.
    pub fn sub_cell_counts(self) -> Vec<usize> {
        (0..=self.dimension())
            .map(|dim| self.sub_cell_count(dim))
            .collect()
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellType::Polygon(n) => write!(f, "Polygon({n})"),
            other => write!(f, "{other:?}"),
        }
    }
}
