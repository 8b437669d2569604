//! `DofManager`: field registration, the collective numbering pass and the
//! distributed objects derived from it.
//!
//! A manager is either *unbuilt* or *built*. Fields can be registered at any
//! time; [`DofManager::build_global_unknowns`] is the one collective step and
//! moves the manager to the built state, where element GIDs, offsets, maps,
//! graphs and transfer operators can be queried. [`DofManager::reset_indices`]
//! drops every numbering artifact but keeps the registered fields.
//!
//! Maps, graphs and transfer operators are built on first request from the
//! build output and cached until the next reset or rebuild. Building them
//! never communicates.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info, warn};
use once_cell::sync::OnceCell;

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::all_to_all;
use crate::algs::resolver::{ConsistencyResolver, DofRequest, Numbering, RendezvousResolver};
use crate::algs::wire::WireCoupling;
use crate::dof::field_registry::FieldRegistry;
use crate::dof::options::IndexerOptions;
use crate::dof::FieldId;
use crate::dof_error::DofError;
use crate::linalg::crs_graph::CrsGraph;
use crate::linalg::factory::{CsrFactory, LinearAlgebraFactory};
use crate::linalg::index_map::IndexMap;
use crate::linalg::transfer::{Export, Import, TransferPlan};
use crate::pattern::aggregate::FieldAggPattern;
use crate::pattern::field_pattern::FieldPattern;
use crate::pattern::geometric::GeometricAggPattern;
use crate::topology::conn_manager::{BlockId, ConnManager, ElementId};
use crate::topology::ownership::DofKey;
use crate::topology::point::PointId;

/// Graph rows keyed by row GID.
type Rows = BTreeMap<u64, BTreeSet<u64>>;

/// Everything `build_global_unknowns` produces.
struct BuiltIndices {
    patterns: BTreeMap<BlockId, Arc<FieldAggPattern>>,
    numbering: Numbering,
    element_gids: HashMap<ElementId, Vec<u64>>,
    field_elements: BTreeMap<FieldId, Vec<ElementId>>,
    owned_gids: Vec<u64>,
    overlapped_gids: Vec<u64>,
    owned_rows: Rows,
    overlap_rows: Rows,
    transfer_tag: CommTag,

    map: OnceCell<Arc<IndexMap>>,
    overlap_map: OnceCell<Arc<IndexMap>>,
    graph: OnceCell<Arc<CrsGraph>>,
    overlap_graph: OnceCell<Arc<CrsGraph>>,
    plan: OnceCell<Arc<TransferPlan>>,
    import: OnceCell<Arc<Import>>,
    export: OnceCell<Arc<Export>>,
}

enum IndexState {
    Unbuilt,
    Built(Box<BuiltIndices>),
}

/// Distributed DOF indexer over one communicator.
pub struct DofManager<C: Communicator, R: ConsistencyResolver = RendezvousResolver> {
    registry: FieldRegistry,
    conn: Option<Arc<dyn ConnManager>>,
    comm: C,
    resolver: R,
    factory: Arc<dyn LinearAlgebraFactory>,
    opts: IndexerOptions,
    state: IndexState,
}

impl<C: Communicator, R: ConsistencyResolver + Default> DofManager<C, R> {
    /// Manager without a connectivity provider and with default options.
    pub fn new(comm: C) -> Self {
        Self::with_resolver(comm, R::default())
    }

    pub fn with_options(comm: C, opts: IndexerOptions) -> Self {
        let mut dm = Self::new(comm);
        dm.opts = opts;
        dm
    }

    /// Manager bound to a connectivity provider.
    pub fn with_conn_manager(conn: Arc<dyn ConnManager>, comm: C) -> Self {
        let mut dm = Self::new(comm);
        dm.conn = Some(conn);
        dm
    }
}

impl<C: Communicator, R: ConsistencyResolver> DofManager<C, R> {
    /// Manager using a custom consistency resolver.
    pub fn with_resolver(comm: C, resolver: R) -> Self {
        Self {
            registry: FieldRegistry::new(),
            conn: None,
            comm,
            resolver,
            factory: Arc::new(CsrFactory),
            opts: IndexerOptions::default(),
            state: IndexState::Unbuilt,
        }
    }

    /// Replace the factory used for maps, graphs and transfer operators.
    /// Cached objects are dropped.
    pub fn set_factory(&mut self, factory: Arc<dyn LinearAlgebraFactory>) {
        self.factory = factory;
        if let IndexState::Built(b) = &mut self.state {
            b.map = OnceCell::new();
            b.overlap_map = OnceCell::new();
            b.graph = OnceCell::new();
            b.overlap_graph = OnceCell::new();
            b.plan = OnceCell::new();
            b.import = OnceCell::new();
            b.export = OnceCell::new();
        }
    }

    pub fn options(&self) -> &IndexerOptions {
        &self.opts
    }

    /// New options apply to the next build.
    pub fn set_options(&mut self, opts: IndexerOptions) {
        self.opts = opts;
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    /// Swap the communicator, returning the previous one. Indices are reset.
    pub fn set_communicator(&mut self, comm: C) -> C {
        self.state = IndexState::Unbuilt;
        std::mem::replace(&mut self.comm, comm)
    }

    /// Bind a connectivity provider. Any existing numbering is dropped;
    /// registered fields are kept.
    pub fn set_conn_manager(&mut self, conn: Arc<dyn ConnManager>) {
        self.state = IndexState::Unbuilt;
        self.conn = Some(conn);
    }

    pub fn conn_manager(&self) -> Option<&Arc<dyn ConnManager>> {
        self.conn.as_ref()
    }

    /// Drop all numbering state and hand back the connectivity provider.
    /// Fields and their patterns survive.
    pub fn reset_indices(&mut self) -> Option<Arc<dyn ConnManager>> {
        self.state = IndexState::Unbuilt;
        self.conn.take()
    }

    pub fn is_built(&self) -> bool {
        matches!(self.state, IndexState::Built(_))
    }

    fn built(&self) -> Result<&BuiltIndices, DofError> {
        match &self.state {
            IndexState::Built(b) => Ok(b),
            IndexState::Unbuilt => Err(DofError::NotBuilt),
        }
    }

    // ---- fields ----

    /// Register `name` on every element block. A registration that changes
    /// the field set drops any existing numbering.
    pub fn add_field(
        &mut self,
        name: &str,
        pattern: Arc<dyn FieldPattern>,
    ) -> Result<FieldId, DofError> {
        let known = self
            .registry
            .field_num(name)
            .is_some_and(|f| self.registry.is_global(f));
        let field = self.registry.add_field(name, pattern)?;
        if !known {
            self.state = IndexState::Unbuilt;
        }
        Ok(field)
    }

    /// Register `name` on `block` only. Same reset rule as [`Self::add_field`].
    pub fn add_field_to_block(
        &mut self,
        block: BlockId,
        name: &str,
        pattern: Arc<dyn FieldPattern>,
    ) -> Result<FieldId, DofError> {
        let known = self
            .registry
            .field_num(name)
            .is_some_and(|f| self.registry.pattern(block, f).is_some());
        let field = self.registry.add_field_to_block(block, name, pattern)?;
        if !known {
            self.state = IndexState::Unbuilt;
        }
        Ok(field)
    }

    pub fn field_num(&self, name: &str) -> Option<FieldId> {
        self.registry.field_num(name)
    }

    pub fn field_string(&self, field: FieldId) -> Option<&str> {
        self.registry.field_string(field)
    }

    pub fn num_fields(&self) -> usize {
        self.registry.num_fields()
    }

    /// `(id, name)` of every registered field, by ascending id.
    pub fn fields(&self) -> impl Iterator<Item = (FieldId, &str)> + '_ {
        self.registry.fields()
    }

    pub fn field_registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Pattern of `field` on `block`, or `None` if it is not active there.
    pub fn field_pattern(&self, block: BlockId, field: FieldId) -> Option<&Arc<dyn FieldPattern>> {
        self.registry.pattern(block, field)
    }

    pub fn field_pattern_by_name(
        &self,
        block: BlockId,
        name: &str,
    ) -> Option<&Arc<dyn FieldPattern>> {
        self.field_num(name)
            .and_then(|field| self.registry.pattern(block, field))
    }

    // ---- the collective step ----

    /// Number every `(entity, field slot)` touched by local elements.
    ///
    /// Collective over the communicator. Calling it on a built manager
    /// discards the previous numbering first.
    pub fn build_global_unknowns(&mut self) -> Result<(), DofError> {
        self.state = IndexState::Unbuilt;
        let provider = self.conn.clone().ok_or(DofError::MissingConnManager)?;
        let conn: &dyn ConnManager = &*provider;
        let rank = self.comm.rank();

        let patterns = self.build_patterns(conn)?;
        debug!("rank {rank}: aggregated patterns for {} blocks", patterns.len());

        let requests = declare_requests(conn, &patterns)?;
        debug!("rank {rank}: {} numbering requests", requests.len());

        let numbering = self.resolver.resolve(&requests, &self.comm, &self.opts)?;

        let jobs: Vec<(ElementId, Arc<FieldAggPattern>)> = patterns
            .iter()
            .flat_map(|(&block, pattern)| {
                conn.element_block(block)
                    .unwrap_or(&[])
                    .iter()
                    .map(move |&e| (e, Arc::clone(pattern)))
            })
            .collect();
        let element_gids = materialise_gids(conn, &jobs, &numbering)?;

        let overlap_rows = element_couplings(&element_gids);
        let owned_rows =
            complete_owned_rows(&overlap_rows, &numbering, &self.comm, self.opts.tags.graph)?;

        let mut field_elements: BTreeMap<FieldId, Vec<ElementId>> =
            self.registry.fields().map(|(f, _)| (f, Vec::new())).collect();
        for (&block, pattern) in &patterns {
            let elements = conn.element_block(block).unwrap_or(&[]);
            for field in pattern.field_ids() {
                field_elements
                    .entry(field)
                    .or_default()
                    .extend_from_slice(elements);
            }
        }

        let owned_gids: Vec<u64> = numbering.owned_range().collect();
        let mut overlapped_gids = owned_gids.clone();
        overlapped_gids.extend(numbering.ghost_gids());
        info!(
            "rank {rank}: {} owned, {} overlapped of {} global DOFs",
            owned_gids.len(),
            overlapped_gids.len(),
            numbering.ranges.global_size()
        );

        self.state = IndexState::Built(Box::new(BuiltIndices {
            patterns,
            numbering,
            element_gids,
            field_elements,
            owned_gids,
            overlapped_gids,
            owned_rows,
            overlap_rows,
            transfer_tag: self.opts.tags.transfer,
            map: OnceCell::new(),
            overlap_map: OnceCell::new(),
            graph: OnceCell::new(),
            overlap_graph: OnceCell::new(),
            plan: OnceCell::new(),
            import: OnceCell::new(),
            export: OnceCell::new(),
        }));
        Ok(())
    }

    fn build_patterns(
        &self,
        conn: &dyn ConnManager,
    ) -> Result<BTreeMap<BlockId, Arc<FieldAggPattern>>, DofError> {
        let blocks = conn.element_block_ids();
        for block in self.registry.scoped_blocks() {
            if !blocks.contains(&block) {
                warn!("fields registered on block {block}, which the connectivity does not know");
            }
        }

        let mut patterns = BTreeMap::new();
        for block in blocks {
            let cell = conn
                .block_topology(block)
                .ok_or(DofError::UnknownBlock(block))?;
            let active = self.registry.active_fields(block);
            if let Some((field, p)) = active.iter().find(|(_, p)| p.cell_topology() != cell) {
                return Err(DofError::IncompatibleGeometry {
                    name: self.registry.field_string(*field).unwrap_or("?").to_owned(),
                    block,
                    expected: cell.to_string(),
                    found: p.cell_topology().to_string(),
                });
            }
            if active.is_empty() {
                warn!("block {block} has no active fields");
            }
            let geometric = GeometricAggPattern::new(cell, active.iter().map(|(_, p)| &**p));
            patterns.insert(
                block,
                Arc::new(FieldAggPattern::new(Arc::new(geometric), active)),
            );
        }
        Ok(patterns)
    }

    // ---- element and offset queries ----

    /// GIDs of an element's DOFs in the block's aggregated layout order.
    /// `None` for elements outside every block.
    pub fn element_gids(&self, element: ElementId) -> Result<Option<&[u64]>, DofError> {
        Ok(self
            .built()?
            .element_gids
            .get(&element)
            .map(Vec::as_slice))
    }

    /// Positions in [`element_gids`](Self::element_gids) that belong to
    /// `field` on `block`.
    pub fn gid_field_offsets(
        &self,
        block: BlockId,
        field: FieldId,
    ) -> Result<Option<&[usize]>, DofError> {
        Ok(self
            .built()?
            .patterns
            .get(&block)
            .and_then(|p| p.local_offsets(field)))
    }

    /// Offsets of `field` on one sub-cell `(dim, sub_cell)` of the block's
    /// elements, in slot order. Empty when the field has nothing there.
    pub fn gid_field_offsets_for_sub_cell(
        &self,
        block: BlockId,
        field: FieldId,
        dim: usize,
        sub_cell: usize,
    ) -> Result<Option<&[usize]>, DofError> {
        Ok(self
            .built()?
            .patterns
            .get(&block)
            .and_then(|p| p.sub_cell_offsets(field, dim, sub_cell)))
    }

    pub fn aggregated_pattern(
        &self,
        block: BlockId,
    ) -> Result<Option<&Arc<FieldAggPattern>>, DofError> {
        Ok(self.built()?.patterns.get(&block))
    }

    /// Local elements on which `field` is active, by ascending block.
    pub fn field_elements(&self, field: FieldId) -> Result<Option<&[ElementId]>, DofError> {
        Ok(self
            .built()?
            .field_elements
            .get(&field)
            .map(Vec::as_slice))
    }

    /// Raw output of the consistency resolver.
    pub fn numbering(&self) -> Result<&Numbering, DofError> {
        Ok(&self.built()?.numbering)
    }

    pub fn num_owned_dofs(&self) -> Result<usize, DofError> {
        Ok(self.built()?.owned_gids.len())
    }

    pub fn num_overlapped_dofs(&self) -> Result<usize, DofError> {
        Ok(self.built()?.overlapped_gids.len())
    }

    pub fn num_global_dofs(&self) -> Result<u64, DofError> {
        Ok(self.built()?.numbering.ranges.global_size())
    }

    // ---- derived distributed objects ----

    /// Owned GIDs of this rank (one contiguous range).
    pub fn map(&self) -> Result<Arc<IndexMap>, DofError> {
        let b = self.built()?;
        let global = b.numbering.ranges.global_size();
        Ok(Arc::clone(b.map.get_or_init(|| {
            self.factory.build_map(&b.owned_gids, global)
        })))
    }

    /// Owned GIDs followed by ghost GIDs, ascending.
    pub fn overlap_map(&self) -> Result<Arc<IndexMap>, DofError> {
        let b = self.built()?;
        let global = b.numbering.ranges.global_size();
        Ok(Arc::clone(b.overlap_map.get_or_init(|| {
            self.factory.build_map(&b.overlapped_gids, global)
        })))
    }

    /// Complete rows for owned GIDs, including couplings from elements on
    /// other ranks.
    pub fn graph(&self) -> Result<Arc<CrsGraph>, DofError> {
        let b = self.built()?;
        let map = self.map()?;
        Ok(Arc::clone(b.graph.get_or_init(|| {
            self.factory.build_graph(map, &b.owned_rows)
        })))
    }

    /// Rows for every overlapped GID with couplings from local elements only.
    pub fn overlap_graph(&self) -> Result<Arc<CrsGraph>, DofError> {
        let b = self.built()?;
        let map = self.overlap_map()?;
        Ok(Arc::clone(b.overlap_graph.get_or_init(|| {
            self.factory.build_graph(map, &b.overlap_rows)
        })))
    }

    fn transfer_plan(&self) -> Result<Arc<TransferPlan>, DofError> {
        let b = self.built()?;
        let owned = self.map()?;
        let overlapped = self.overlap_map()?;
        let plan = b.plan.get_or_try_init(|| {
            let expand = |lists: &BTreeMap<usize, Vec<DofKey>>| -> BTreeMap<usize, Vec<u64>> {
                lists
                    .iter()
                    .map(|(&rank, keys)| (rank, b.numbering.expand(keys)))
                    .collect()
            };
            TransferPlan::new(
                &owned,
                &overlapped,
                &expand(&b.numbering.recvs),
                &expand(&b.numbering.sends),
                b.transfer_tag,
            )
            .map(Arc::new)
        })?;
        Ok(Arc::clone(plan))
    }

    /// Owned → overlapped operator.
    pub fn overlap_import(&self) -> Result<Arc<Import>, DofError> {
        let b = self.built()?;
        let plan = self.transfer_plan()?;
        let (owned, overlapped) = (self.map()?, self.overlap_map()?);
        Ok(Arc::clone(b.import.get_or_init(|| {
            self.factory.build_import(owned, overlapped, plan)
        })))
    }

    /// Overlapped → owned operator.
    pub fn overlap_export(&self) -> Result<Arc<Export>, DofError> {
        let b = self.built()?;
        let plan = self.transfer_plan()?;
        let (owned, overlapped) = (self.map()?, self.overlap_map()?);
        Ok(Arc::clone(b.export.get_or_init(|| {
            self.factory.build_export(overlapped, owned, plan)
        })))
    }

    // ---- diagnostics ----

    /// Human-readable dump of the registered fields and, once built, the
    /// aggregated pattern of every block.
    pub fn print_field_information<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "DofManager: {} fields", self.num_fields())?;
        for (field, name) in self.fields() {
            if self.registry.is_global(field) {
                writeln!(out, "  field {field} `{name}`: all blocks")?;
            } else {
                let blocks = self
                    .registry
                    .scoped_blocks()
                    .into_iter()
                    .filter(|&b| self.registry.pattern(b, field).is_some())
                    .join(", ");
                writeln!(out, "  field {field} `{name}`: blocks [{blocks}]")?;
            }
        }
        match &self.state {
            IndexState::Unbuilt => writeln!(out, "global unknowns not built"),
            IndexState::Built(b) => {
                for (block, pattern) in &b.patterns {
                    write!(out, "block {block}: {pattern}")?;
                }
                Ok(())
            }
        }
    }
}

/// One request per `(sub-cell key, field)` the aggregated patterns place
/// slots on, for every local element.
fn declare_requests(
    conn: &dyn ConnManager,
    patterns: &BTreeMap<BlockId, Arc<FieldAggPattern>>,
) -> Result<Vec<DofRequest>, DofError> {
    let mut requests = Vec::new();
    for (&block, pattern) in patterns {
        let geometric = pattern.geometric_pattern();
        for &element in conn.element_block(block).unwrap_or(&[]) {
            for (dim, sc) in geometric.active_sub_cells() {
                let point = sub_cell_key(conn, pattern, element, dim, sc)?;
                for field in pattern.field_ids() {
                    let slots = pattern.num_slots(field, dim, sc);
                    if slots > 0 {
                        requests.push(DofRequest::new(DofKey::new(point, field), slots as u32));
                    }
                }
            }
        }
    }
    Ok(requests)
}

fn sub_cell_key(
    conn: &dyn ConnManager,
    pattern: &FieldAggPattern,
    element: ElementId,
    dim: usize,
    sub_cell: usize,
) -> Result<PointId, DofError> {
    let keys = conn.sub_cells(element, dim).unwrap_or(&[]);
    keys.get(sub_cell)
        .copied()
        .ok_or(DofError::ConnectivityMismatch {
            element,
            dim,
            expected: pattern.sub_cell_count(dim),
            got: keys.len(),
        })
}

fn element_gids_of(
    conn: &dyn ConnManager,
    pattern: &FieldAggPattern,
    numbering: &Numbering,
    element: ElementId,
) -> Result<Vec<u64>, DofError> {
    pattern
        .layout()
        .iter()
        .map(|entry| {
            let point = sub_cell_key(conn, pattern, element, entry.dim, entry.sub_cell)?;
            numbering
                .gid(DofKey::new(point, entry.field), entry.slot)
                .ok_or(DofError::MissingGhost {
                    point,
                    field: entry.field,
                })
        })
        .collect()
}

fn materialise_gids(
    conn: &dyn ConnManager,
    jobs: &[(ElementId, Arc<FieldAggPattern>)],
    numbering: &Numbering,
) -> Result<HashMap<ElementId, Vec<u64>>, DofError> {
    #[cfg(feature = "rayon")]
    use rayon::prelude::*;

    #[cfg(feature = "rayon")]
    let jobs = jobs.par_iter();
    #[cfg(not(feature = "rayon"))]
    let jobs = jobs.iter();

    jobs.map(|(element, pattern)| {
        element_gids_of(conn, pattern, numbering, *element).map(|gids| (*element, gids))
    })
    .collect()
}

/// Every pair of GIDs that share a local element.
fn element_couplings(element_gids: &HashMap<ElementId, Vec<u64>>) -> Rows {
    fn couple(mut rows: Rows, gids: &[u64]) -> Rows {
        for &row in gids {
            rows.entry(row).or_default().extend(gids.iter().copied());
        }
        rows
    }

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        element_gids
            .par_iter()
            .fold(Rows::new, |rows, (_, gids)| couple(rows, gids))
            .reduce(Rows::new, |mut a, b| {
                for (row, cols) in b {
                    a.entry(row).or_default().extend(cols);
                }
                a
            })
    }
    #[cfg(not(feature = "rayon"))]
    {
        element_gids
            .values()
            .fold(Rows::new(), |rows, gids| couple(rows, gids))
    }
}

/// Keep owned rows and ship ghost rows to their owners, so each owned row
/// ends up with the couplings of every element touching it on any rank.
fn complete_owned_rows<C: Communicator>(
    overlap_rows: &Rows,
    numbering: &Numbering,
    comm: &C,
    tag: CommTag,
) -> Result<Rows, DofError> {
    let owned = numbering.owned_range();
    let mut rows = Rows::new();
    let mut outgoing: Vec<Vec<WireCoupling>> = vec![Vec::new(); comm.size().max(1)];
    for (&row, cols) in overlap_rows {
        if owned.contains(&row) {
            rows.entry(row).or_default().extend(cols.iter().copied());
        } else {
            let owner = numbering
                .ranges
                .owner_of(row)
                .ok_or(DofError::GidNotInMap(row))?;
            outgoing[owner].extend(cols.iter().map(|&col| WireCoupling::new(row, col)));
        }
    }
    for batch in all_to_all(comm, tag, outgoing)? {
        for coupling in batch {
            rows.entry(coupling.row())
                .or_default()
                .insert(coupling.col());
        }
    }
    Ok(rows)
}
