//! Working copy and shadow copy bookkeeping.

use crate::entity::tracked::AnyEntity;
use crate::error::{CoreError, CoreResult};
use crate::graph::DescriptorCache;
use crate::types::EntityKey;
use std::collections::{HashMap, HashSet};

/// Which side of the mirror a clone is created on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    /// Store-owned canonical copies.
    Shadow,
    /// Caller-visible copies.
    Working,
}

/// One-to-one map between working copies and their shadows.
#[derive(Default)]
pub(crate) struct Mirror {
    to_shadow: HashMap<EntityKey, AnyEntity>,
    to_working: HashMap<EntityKey, AnyEntity>,
    descriptors: DescriptorCache,
}

impl Mirror {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.to_shadow.len()
    }

    pub(crate) fn shadow_of(&self, working: EntityKey) -> Option<&AnyEntity> {
        self.to_shadow.get(&working)
    }

    pub(crate) fn working_of(&self, shadow: EntityKey) -> Option<&AnyEntity> {
        self.to_working.get(&shadow)
    }

    /// Snapshot of every `(working, shadow)` pair.
    pub(crate) fn pairs(&self) -> Vec<(AnyEntity, AnyEntity)> {
        self.to_working
            .values()
            .filter_map(|working| {
                self.to_shadow
                    .get(&working.key())
                    .map(|shadow| (working.clone(), shadow.clone()))
            })
            .collect()
    }

    fn counterpart(&self, entity: EntityKey, side: Side) -> Option<&AnyEntity> {
        match side {
            Side::Shadow => self.to_shadow.get(&entity),
            Side::Working => self.to_working.get(&entity),
        }
    }

    fn bind(&mut self, original: AnyEntity, copy: AnyEntity, side: Side) {
        let (working, shadow) = match side {
            Side::Shadow => (original, copy),
            Side::Working => (copy, original),
        };
        self.to_working.insert(shadow.key(), working.clone());
        self.to_shadow.insert(working.key(), shadow);
    }

    /// Drops pairs whose shadow fails `keep`.
    pub(crate) fn retain_shadows(&mut self, keep: impl Fn(&AnyEntity) -> bool) {
        let dropped: Vec<AnyEntity> = self
            .to_working
            .iter()
            .filter(|(_, working)| {
                self.to_shadow
                    .get(&working.key())
                    .is_some_and(|shadow| !keep(shadow))
            })
            .map(|(_, working)| working.clone())
            .collect();
        for working in dropped {
            if let Some(shadow) = self.to_shadow.remove(&working.key()) {
                self.to_working.remove(&shadow.key());
            }
        }
    }

    /// Returns the counterpart of `source` on `side`, cloning the graph
    /// reachable from it where no counterpart exists yet.
    ///
    /// Every declared relationship is followed, back references included.
    /// Clones are rewired to point at counterparts only, never at entities
    /// of the other side.
    pub(crate) fn mirror(&mut self, source: &AnyEntity, side: Side) -> CoreResult<AnyEntity> {
        if let Some(existing) = self.counterpart(source.key(), side) {
            return Ok(existing.clone());
        }

        let mut created = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![source.clone()];
        while let Some(original) = stack.pop() {
            if !seen.insert(original.key()) || self.counterpart(original.key(), side).is_some() {
                continue;
            }
            let descriptor = self.descriptors.get(&original);
            let copy = (descriptor.detach)(&original).ok_or_else(|| {
                CoreError::invariant(format!("cannot clone {original:?}: type mismatch"))
            })?;
            for relation in &descriptor.relations {
                stack.extend(relation.targets(&original));
            }
            self.bind(original.clone(), copy.clone(), side);
            created.push((original, copy, descriptor));
        }

        for (original, copy, descriptor) in &created {
            for relation in &descriptor.relations {
                let targets: Vec<AnyEntity> = relation
                    .targets(original)
                    .iter()
                    .filter_map(|t| self.counterpart(t.key(), side).cloned())
                    .collect();
                relation.replace(copy, &targets);
            }
        }
        tracing::trace!(root = ?source, cloned = created.len(), ?side, "graph mirrored");

        self.counterpart(source.key(), side)
            .cloned()
            .ok_or_else(|| CoreError::invariant(format!("{source:?} was not mirrored")))
    }

    /// Makes every relationship of `into` match the one of `from`.
    ///
    /// `into` lives on `side`; targets of `from` without a counterpart
    /// there are mirrored first. Fields already in sync are not written.
    /// Returns the number of fields rewritten.
    pub(crate) fn reconcile(
        &mut self,
        from: &AnyEntity,
        into: &AnyEntity,
        side: Side,
    ) -> CoreResult<usize> {
        let descriptor = self.descriptors.get(from);
        let mut rewritten = 0;
        for relation in &descriptor.relations {
            let mut wanted = Vec::new();
            for target in relation.targets(from) {
                wanted.push(self.mirror(&target, side)?);
            }
            let current = relation.targets(into);
            let in_sync = current.len() == wanted.len()
                && current.iter().zip(&wanted).all(|(a, b)| a.key() == b.key());
            if !in_sync {
                relation.replace(into, &wanted);
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    /// Copies non-relationship fields from `from` into `into`.
    pub(crate) fn copy_scalars(&mut self, from: &AnyEntity, into: &AnyEntity) {
        let descriptor = self.descriptors.get(from);
        (descriptor.copy_scalars)(&descriptor, from, into);
    }
}

impl std::fmt::Debug for Mirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mirror").field("pairs", &self.len()).finish()
    }
}
