//! Field registry: field names, ids and the patterns active on each block.
//!
//! Ids are handed out in registration order starting at zero and are never
//! reused. A field registered without a block is active on every block; a
//! block-scoped registration activates it on that block only.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::dof::FieldId;
use crate::dof_error::DofError;
use crate::pattern::field_pattern::FieldPattern;
use crate::topology::conn_manager::BlockId;

/// Name/id bookkeeping plus the pattern of every `(block, field)` pair.
#[derive(Clone, Debug, Default)]
pub struct FieldRegistry {
    ids: BTreeMap<String, FieldId>,
    names: Vec<String>,
    global: BTreeMap<FieldId, Arc<dyn FieldPattern>>,
    scoped: BTreeMap<(BlockId, FieldId), Arc<dyn FieldPattern>>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` on every block.
    ///
    /// Re-adding with an equal pattern returns the existing id. A pattern that
    /// differs from any earlier registration of `name` is a conflict.
    pub fn add_field(
        &mut self,
        name: &str,
        pattern: Arc<dyn FieldPattern>,
    ) -> Result<FieldId, DofError> {
        if let Some(&id) = self.ids.get(name) {
            let clash = self
                .global
                .get(&id)
                .into_iter()
                .chain(self.scoped_patterns(id).map(|(_, p)| p))
                .any(|p| !p.equals(pattern.as_ref()));
            if clash {
                return Err(DofError::FieldConflict {
                    name: name.to_owned(),
                    block: None,
                });
            }
            self.global.insert(id, pattern);
            return Ok(id);
        }
        let id = self.allocate(name);
        self.global.insert(id, pattern);
        Ok(id)
    }

    /// Register `name` on `block` only, reusing the id if the name is known.
    pub fn add_field_to_block(
        &mut self,
        block: BlockId,
        name: &str,
        pattern: Arc<dyn FieldPattern>,
    ) -> Result<FieldId, DofError> {
        let id = match self.ids.get(name) {
            Some(&id) => {
                let existing = self
                    .scoped
                    .get(&(block, id))
                    .or_else(|| self.global.get(&id));
                if existing.is_some_and(|p| !p.equals(pattern.as_ref())) {
                    return Err(DofError::FieldConflict {
                        name: name.to_owned(),
                        block: Some(block),
                    });
                }
                id
            }
            None => self.allocate(name),
        };
        self.scoped.insert((block, id), pattern);
        Ok(id)
    }

    fn allocate(&mut self, name: &str) -> FieldId {
        let id = self.names.len();
        self.names.push(name.to_owned());
        self.ids.insert(name.to_owned(), id);
        id
    }

    fn scoped_patterns(
        &self,
        field: FieldId,
    ) -> impl Iterator<Item = (BlockId, &Arc<dyn FieldPattern>)> + '_ {
        self.scoped
            .iter()
            .filter(move |((_, f), _)| *f == field)
            .map(|((b, _), p)| (*b, p))
    }

    /// Id of `name`, or `None` if it was never registered.
    pub fn field_num(&self, name: &str) -> Option<FieldId> {
        self.ids.get(name).copied()
    }

    /// Name of `field`, or `None` for ids this registry never produced.
    pub fn field_string(&self, field: FieldId) -> Option<&str> {
        self.names.get(field).map(String::as_str)
    }

    pub fn num_fields(&self) -> usize {
        self.names.len()
    }

    /// `(id, name)` of every field, by ascending id.
    pub fn fields(&self) -> impl Iterator<Item = (FieldId, &str)> + '_ {
        self.names.iter().enumerate().map(|(id, n)| (id, n.as_str()))
    }

    /// Is `field` active on every block?
    pub fn is_global(&self, field: FieldId) -> bool {
        self.global.contains_key(&field)
    }

    /// Pattern of `field` on `block`, if the field is active there.
    pub fn pattern(&self, block: BlockId, field: FieldId) -> Option<&Arc<dyn FieldPattern>> {
        self.scoped
            .get(&(block, field))
            .or_else(|| self.global.get(&field))
    }

    /// Fields active on `block` with their patterns, by ascending id.
    pub fn active_fields(&self, block: BlockId) -> Vec<(FieldId, Arc<dyn FieldPattern>)> {
        let mut active: BTreeMap<FieldId, Arc<dyn FieldPattern>> = self
            .global
            .iter()
            .map(|(&f, p)| (f, Arc::clone(p)))
            .collect();
        let scoped = self
            .scoped
            .range((block, FieldId::MIN)..=(block, FieldId::MAX))
            .map(|(&(_, f), p)| (f, Arc::clone(p)));
        active.extend(scoped);
        active.into_iter().collect()
    }

    /// Blocks named by block-scoped registrations.
    pub fn scoped_blocks(&self) -> BTreeSet<BlockId> {
        self.scoped.keys().map(|&(b, _)| b).collect()
    }
}
