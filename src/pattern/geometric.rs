//! Geometric pattern: which sub-cells of a block carry any DOF at all.

use crate::pattern::field_pattern::FieldPattern;
use crate::topology::cell_type::CellType;

/// Union of several field patterns' footprints, with one id per sub-cell
/// that at least one field places a DOF on.
///
/// This is the pattern connectivity is gathered for: only sub-cells with an
/// id need a global entity key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeometricAggPattern {
    cell_type: CellType,
    indices: Vec<Vec<Vec<usize>>>,
    num_ids: usize,
}

impl GeometricAggPattern {
    /// Build from patterns that all share `cell_type`; callers check
    /// [`FieldPattern::same_geometry`] beforehand.
    pub fn new<'a, I, P>(cell_type: CellType, patterns: I) -> Self
    where
        I: IntoIterator<Item = &'a P>,
        P: FieldPattern + ?Sized + 'a,
    {
        let counts = cell_type.sub_cell_counts();
        let mut used: Vec<Vec<bool>> = counts.iter().map(|&c| vec![false; c]).collect();
        for pattern in patterns {
            for (dim, flags) in used.iter_mut().enumerate() {
                for (sc, flag) in flags.iter_mut().enumerate() {
                    *flag |= !pattern.sub_cell_indices(dim, sc).is_empty();
                }
            }
        }

        let mut next = 0usize;
        let indices = used
            .into_iter()
            .map(|flags| {
                flags
                    .into_iter()
                    .map(|on| {
                        if on {
                            next += 1;
                            vec![next - 1]
                        } else {
                            Vec::new()
                        }
                    })
                    .collect()
            })
            .collect();
        Self {
            cell_type,
            indices,
            num_ids: next,
        }
    }

    /// Does sub-cell `(dim, sub_cell)` carry DOFs?
    pub fn has_ids(&self, dim: usize, sub_cell: usize) -> bool {
        !self.sub_cell_indices(dim, sub_cell).is_empty()
    }

    /// Sub-cells with ids, in canonical order (vertices, edges, faces, interior).
    pub fn active_sub_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.indices.iter().enumerate().flat_map(|(dim, scs)| {
            scs.iter()
                .enumerate()
                .filter(|(_, ids)| !ids.is_empty())
                .map(move |(sc, _)| (dim, sc))
        })
    }
}

impl FieldPattern for GeometricAggPattern {
    fn cell_topology(&self) -> CellType {
        self.cell_type
    }

    fn sub_cell_indices(&self, dim: usize, sub_cell: usize) -> &[usize] {
        self.indices
            .get(dim)
            .and_then(|d| d.get(sub_cell))
            .map_or(&[][..], Vec::as_slice)
    }

    fn num_ids(&self) -> usize {
        self.num_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::field_pattern::SubCellPattern;

    #[test]
    fn union_of_nodal_and_edge() {
        let a = SubCellPattern::nodal(CellType::Triangle);
        let b = SubCellPattern::edge(CellType::Triangle);
        let geo = GeometricAggPattern::new(
            CellType::Triangle,
            [&a as &dyn FieldPattern, &b as &dyn FieldPattern],
        );
        assert_eq!(geo.num_ids(), 6);
        assert!(geo.has_ids(1, 2));
        assert!(!geo.has_ids(2, 0));
        let active: Vec<_> = geo.active_sub_cells().collect();
        assert_eq!(active, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn no_fields_means_no_ids() {
        let geo = GeometricAggPattern::new(CellType::Quadrilateral, std::iter::empty::<&SubCellPattern>());
        assert_eq!(geo.num_ids(), 0);
        assert_eq!(geo.active_sub_cells().count(), 0);
    }
}
