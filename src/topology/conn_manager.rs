//! Mesh connectivity providers.
//!
//! The DOF manager never owns the mesh. It asks a [`ConnManager`] which
//! element blocks exist, which local elements each block holds, and which
//! globally keyed sub-cells (vertices, edges, faces, interior) each element
//! is built from. Two ranks that share an entity must report the same
//! [`PointId`] for it.

use std::collections::{BTreeMap, HashMap};

use crate::dof_error::DofError;
use crate::topology::cell_type::CellType;
use crate::topology::point::PointId;

/// Identifier of an element block.
pub type BlockId = usize;
/// Rank-local element identifier.
pub type ElementId = usize;

/// Read-only element-to-entity connectivity for the local partition.
pub trait ConnManager: Send + Sync {
    /// Ids of all element blocks, ascending.
    ///
    /// Every rank must report the same block ids, even for blocks that hold
    /// no local elements.
    fn element_block_ids(&self) -> Vec<BlockId>;

    /// Local elements of `block`, or `None` for an unknown block.
    fn element_block(&self, block: BlockId) -> Option<&[ElementId]>;

    /// Block that `element` belongs to.
    fn block_id(&self, element: ElementId) -> Option<BlockId>;

    /// Cell type shared by every element of `block`.
    fn block_topology(&self, block: BlockId) -> Option<CellType>;

    /// Global keys of the element's sub-cells of dimension `dim`, in the cell
    /// type's local order. At `dim == dimension` this is the element itself.
    fn sub_cells(&self, element: ElementId, dim: usize) -> Option<&[PointId]>;

    /// Number of local elements over all blocks.
    fn num_elements(&self) -> usize {
        self.element_block_ids()
            .into_iter()
            .filter_map(|b| self.element_block(b).map(<[ElementId]>::len))
            .sum()
    }
}

#[derive(Clone, Debug)]
struct BlockEntry {
    cell_type: CellType,
    elements: Vec<ElementId>,
}

#[derive(Clone, Debug)]
struct ElementEntry {
    block: BlockId,
    /// `sub_cells[dim]` lists the keys of dimension `dim`.
    sub_cells: Vec<Vec<PointId>>,
}

/// Connectivity held in memory, filled in element by element.
#[derive(Clone, Debug, Default)]
pub struct InMemoryConnManager {
    blocks: BTreeMap<BlockId, BlockEntry>,
    elements: HashMap<ElementId, ElementEntry>,
}

impl InMemoryConnManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an element block. Re-declaring keeps the existing elements and
    /// replaces the cell type.
    pub fn add_block(&mut self, block: BlockId, cell_type: CellType) -> &mut Self {
        self.blocks
            .entry(block)
            .and_modify(|b| b.cell_type = cell_type)
            .or_insert_with(|| BlockEntry {
                cell_type,
                elements: Vec::new(),
            });
        self
    }

    /// Add a local element with its sub-cell keys, one list per dimension
    /// `0..=dimension` of the block's cell type.
    pub fn add_element(
        &mut self,
        element: ElementId,
        block: BlockId,
        sub_cells: Vec<Vec<PointId>>,
    ) -> Result<(), DofError> {
        if self.elements.contains_key(&element) {
            return Err(DofError::DuplicateElement(element));
        }
        let entry = self
            .blocks
            .get_mut(&block)
            .ok_or(DofError::UnknownBlock(block))?;
        let counts = entry.cell_type.sub_cell_counts();
        if sub_cells.len() != counts.len() {
            return Err(DofError::ConnectivityMismatch {
                element,
                dim: sub_cells.len().min(counts.len()),
                expected: counts.len(),
                got: sub_cells.len(),
            });
        }
        for (dim, (keys, &expected)) in sub_cells.iter().zip(&counts).enumerate() {
            if keys.len() != expected {
                return Err(DofError::ConnectivityMismatch {
                    element,
                    dim,
                    expected,
                    got: keys.len(),
                });
            }
        }
        entry.elements.push(element);
        self.elements
            .insert(element, ElementEntry { block, sub_cells });
        Ok(())
    }

    /// Add a local element whose sub-cell keys are produced by
    /// `key_of(dim, local_index)` for every sub-cell of the block's cell type.
    pub fn add_element_with<F>(
        &mut self,
        element: ElementId,
        block: BlockId,
        mut key_of: F,
    ) -> Result<(), DofError>
    where
        F: FnMut(usize, usize) -> Result<PointId, DofError>,
    {
        let cell_type = self
            .blocks
            .get(&block)
            .ok_or(DofError::UnknownBlock(block))?
            .cell_type;
        let mut sub_cells = Vec::with_capacity(cell_type.dimension() + 1);
        for (dim, count) in cell_type.sub_cell_counts().into_iter().enumerate() {
            let keys = (0..count)
                .map(|i| key_of(dim, i))
                .collect::<Result<Vec<_>, _>>()?;
            sub_cells.push(keys);
        }
        self.add_element(element, block, sub_cells)
    }
}

impl ConnManager for InMemoryConnManager {
    fn element_block_ids(&self) -> Vec<BlockId> {
        self.blocks.keys().copied().collect()
    }

    fn element_block(&self, block: BlockId) -> Option<&[ElementId]> {
        self.blocks.get(&block).map(|b| b.elements.as_slice())
    }

    fn block_id(&self, element: ElementId) -> Option<BlockId> {
        self.elements.get(&element).map(|e| e.block)
    }

    fn block_topology(&self, block: BlockId) -> Option<CellType> {
        self.blocks.get(&block).map(|b| b.cell_type)
    }

    fn sub_cells(&self, element: ElementId, dim: usize) -> Option<&[PointId]> {
        self.elements
            .get(&element)
            .and_then(|e| e.sub_cells.get(dim))
            .map(Vec::as_slice)
    }

    fn num_elements(&self) -> usize {
        self.elements.len()
    }
}
