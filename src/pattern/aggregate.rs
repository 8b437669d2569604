//! Aggregated pattern: every active field of a block merged into one
//! element-local DOF layout.
//!
//! Layout rule: sub-cells are visited in canonical order (all vertices, then
//! edges, faces and the interior). On each sub-cell the fields follow in
//! ascending field id, and each field contributes its slots in the order its
//! own pattern lists them. The rule only looks at field ids and sub-cell
//! positions, so every rank derives the same layout for the same block.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::dof::FieldId;
use crate::pattern::field_pattern::FieldPattern;
use crate::pattern::geometric::GeometricAggPattern;
use crate::topology::cell_type::CellType;

/// Where one entry of an element's DOF array comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LayoutEntry {
    pub dim: usize,
    pub sub_cell: usize,
    pub field: FieldId,
    /// Position among this field's slots on the sub-cell.
    pub slot: usize,
}

/// Per-block union of all active field patterns.
#[derive(Clone, Debug)]
pub struct FieldAggPattern {
    geometric: Arc<GeometricAggPattern>,
    fields: Vec<(FieldId, Arc<dyn FieldPattern>)>,
    layout: Vec<LayoutEntry>,
    /// Aggregated offsets per sub-cell, all fields: `indices[dim][sub_cell]`.
    indices: Vec<Vec<Vec<usize>>>,
    /// Offsets of each field, indexed by the field's local DOF index.
    field_offsets: BTreeMap<FieldId, Vec<usize>>,
    sub_cell_offsets: HashMap<(FieldId, usize, usize), Vec<usize>>,
}

impl FieldAggPattern {
    /// Merge `fields` over `geometric`. Every pattern must share the
    /// geometric pattern's cell type; field order in the input is irrelevant.
    pub fn new(
        geometric: Arc<GeometricAggPattern>,
        fields: impl IntoIterator<Item = (FieldId, Arc<dyn FieldPattern>)>,
    ) -> Self {
        let mut fields: Vec<_> = fields.into_iter().collect();
        fields.sort_by_key(|(fid, _)| *fid);
        fields.dedup_by_key(|(fid, _)| *fid);

        let counts = geometric.cell_topology().sub_cell_counts();
        let mut layout = Vec::new();
        let mut indices: Vec<Vec<Vec<usize>>> =
            counts.iter().map(|&c| vec![Vec::new(); c]).collect();
        let mut by_local: BTreeMap<FieldId, Vec<(usize, usize)>> = BTreeMap::new();
        let mut sub_cell_offsets: HashMap<(FieldId, usize, usize), Vec<usize>> = HashMap::new();

        for (dim, &count) in counts.iter().enumerate() {
            for sub_cell in 0..count {
                for (field, pattern) in &fields {
                    for (slot, &local) in pattern.sub_cell_indices(dim, sub_cell).iter().enumerate()
                    {
                        let offset = layout.len();
                        layout.push(LayoutEntry {
                            dim,
                            sub_cell,
                            field: *field,
                            slot,
                        });
                        indices[dim][sub_cell].push(offset);
                        by_local.entry(*field).or_default().push((local, offset));
                        sub_cell_offsets
                            .entry((*field, dim, sub_cell))
                            .or_default()
                            .push(offset);
                    }
                }
            }
        }

        let mut field_offsets: BTreeMap<FieldId, Vec<usize>> = fields
            .iter()
            .map(|(fid, _)| (*fid, Vec::new()))
            .collect();
        for (field, mut pairs) in by_local {
            pairs.sort_unstable();
            field_offsets.insert(field, pairs.into_iter().map(|(_, off)| off).collect());
        }

        Self {
            geometric,
            fields,
            layout,
            indices,
            field_offsets,
            sub_cell_offsets,
        }
    }

    /// Geometric pattern this aggregate was built over.
    pub fn geometric_pattern(&self) -> &Arc<GeometricAggPattern> {
        &self.geometric
    }

    /// Active field ids, ascending.
    pub fn field_ids(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.fields.iter().map(|(fid, _)| *fid)
    }

    /// Pattern of one active field.
    pub fn field_pattern(&self, field: FieldId) -> Option<&Arc<dyn FieldPattern>> {
        self.fields
            .binary_search_by_key(&field, |(fid, _)| *fid)
            .ok()
            .map(|i| &self.fields[i].1)
    }

    /// Number of DOFs on one element of the block.
    pub fn num_dofs(&self) -> usize {
        self.layout.len()
    }

    /// Source of every entry of an element's DOF array.
    pub fn layout(&self) -> &[LayoutEntry] {
        &self.layout
    }

    /// Offsets into the element DOF array that belong to `field`, ordered by
    /// the field's local DOF index.
    pub fn local_offsets(&self, field: FieldId) -> Option<&[usize]> {
        self.field_offsets.get(&field).map(Vec::as_slice)
    }

    /// Offsets of `field` restricted to one sub-cell, in slot order.
    /// Empty when the field places nothing on that sub-cell.
    pub fn sub_cell_offsets(&self, field: FieldId, dim: usize, sub_cell: usize) -> Option<&[usize]> {
        if !self.field_offsets.contains_key(&field) || sub_cell >= self.sub_cell_count(dim) {
            return None;
        }
        Some(
            self.sub_cell_offsets
                .get(&(field, dim, sub_cell))
                .map_or(&[][..], Vec::as_slice),
        )
    }

    /// Slots `field` places on sub-cell `(dim, sub_cell)`.
    pub fn num_slots(&self, field: FieldId, dim: usize, sub_cell: usize) -> usize {
        self.sub_cell_offsets
            .get(&(field, dim, sub_cell))
            .map_or(0, Vec::len)
    }
}

impl FieldPattern for FieldAggPattern {
    fn cell_topology(&self) -> CellType {
        self.geometric.cell_topology()
    }

    fn sub_cell_indices(&self, dim: usize, sub_cell: usize) -> &[usize] {
        self.indices
            .get(dim)
            .and_then(|d| d.get(sub_cell))
            .map_or(&[][..], Vec::as_slice)
    }

    fn num_ids(&self) -> usize {
        self.layout.len()
    }
}

impl fmt::Display for FieldAggPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "FieldAggPattern: {} with {} DOFs",
            self.cell_topology(),
            self.num_dofs()
        )?;
        for (field, offsets) in &self.field_offsets {
            writeln!(f, "  field {field}: offsets {offsets:?}")?;
        }
        for (dim, scs) in self.indices.iter().enumerate() {
            for (sc, offs) in scs.iter().enumerate().filter(|(_, o)| !o.is_empty()) {
                let owners: Vec<FieldId> = offs.iter().map(|&o| self.layout[o].field).collect();
                writeln!(f, "  sub-cell ({dim},{sc}): offsets {offs:?} fields {owners:?}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::field_pattern::SubCellPattern;

    fn aggregate(fields: Vec<(FieldId, SubCellPattern)>) -> FieldAggPattern {
        let cell = fields[0].1.cell_topology();
        let patterns: Vec<(FieldId, Arc<dyn FieldPattern>)> = fields
            .into_iter()
            .map(|(f, p)| (f, Arc::new(p) as Arc<dyn FieldPattern>))
            .collect();
        let geo = GeometricAggPattern::new(cell, patterns.iter().map(|(_, p)| &**p));
        FieldAggPattern::new(Arc::new(geo), patterns)
    }

    #[test]
    fn nodal_plus_edge_on_triangle() {
        let agg = aggregate(vec![
            (0, SubCellPattern::nodal(CellType::Triangle)),
            (1, SubCellPattern::edge(CellType::Triangle)),
        ]);
        assert_eq!(agg.num_dofs(), 6);
        assert_eq!(agg.local_offsets(0), Some(&[0, 1, 2][..]));
        assert_eq!(agg.local_offsets(1), Some(&[3, 4, 5][..]));
        assert_eq!(agg.local_offsets(2), None);
    }

    #[test]
    fn fields_interleave_per_sub_cell_by_id() {
        // two nodal fields registered in reverse order still interleave by id
        let agg = aggregate(vec![
            (3, SubCellPattern::nodal(CellType::Segment)),
            (1, SubCellPattern::nodal(CellType::Segment)),
        ]);
        assert_eq!(agg.local_offsets(1), Some(&[0, 2][..]));
        assert_eq!(agg.local_offsets(3), Some(&[1, 3][..]));
        assert_eq!(agg.layout()[1].field, 3);
        assert_eq!(agg.sub_cell_indices(0, 1), &[2, 3]);
    }

    #[test]
    fn sub_cell_offsets_narrow_to_one_entity() {
        let agg = aggregate(vec![
            (0, SubCellPattern::with_counts(CellType::Quadrilateral, &[1, 0, 0])),
            (1, SubCellPattern::with_counts(CellType::Quadrilateral, &[0, 2, 0])),
        ]);
        assert_eq!(agg.sub_cell_offsets(1, 1, 2), Some(&[8, 9][..]));
        assert_eq!(agg.sub_cell_offsets(0, 1, 2), Some(&[][..]));
        assert_eq!(agg.sub_cell_offsets(0, 1, 4), None);
        assert_eq!(agg.sub_cell_offsets(7, 0, 0), None);
        assert_eq!(agg.num_slots(1, 1, 0), 2);
    }

    #[test]
    fn display_lists_fields() {
        let agg = aggregate(vec![(0, SubCellPattern::nodal(CellType::Segment))]);
        let text = agg.to_string();
        assert!(text.contains("Segment with 2 DOFs"));
        assert!(text.contains("field 0: offsets [0, 1]"));
    }
}
