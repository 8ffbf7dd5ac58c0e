use super::RecordStore;
use crate::domain::{GroupId, StructureGroup};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::warn;

/// Per-id resolution outcome. A fetch failure degrades to `NotFound` so a
/// single bad record never aborts the batch; the skip decision is an explicit
/// branch at the call site.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found(Rc<StructureGroup>),
    NotFound,
}

/// Per-run memoization of group lookups, owned by exactly one run.
///
/// Ids recur constantly inside a composition batch (every pair touches two
/// groups), so the cache keeps backing-store fetches at one per distinct id.
/// Whether a NotFound outcome is memoized is a configuration choice
/// (`cache_missing`); the default leaves misses uncached, so repeated misses
/// re-query the store. Fetch errors are never cached.
pub struct GroupResolver<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    cache: HashMap<GroupId, Option<Rc<StructureGroup>>>,
    cache_missing: bool,
}

impl<'a, S: RecordStore + ?Sized> GroupResolver<'a, S> {
    pub fn new(store: &'a S, cache_missing: bool) -> Self {
        Self {
            store,
            cache: HashMap::new(),
            cache_missing,
        }
    }

    pub fn resolve(&mut self, id: GroupId) -> Resolution {
        if let Some(cached) = self.cache.get(&id) {
            return match cached {
                Some(group) => Resolution::Found(Rc::clone(group)),
                None => Resolution::NotFound,
            };
        }

        match self.store.fetch_group(id) {
            Ok(Some(group)) => {
                let group = Rc::new(group);
                self.cache.insert(id, Some(Rc::clone(&group)));
                Resolution::Found(group)
            }
            Ok(None) => {
                warn!(group_id = %id, "group not found in store");
                if self.cache_missing {
                    self.cache.insert(id, None);
                }
                Resolution::NotFound
            }
            Err(error) => {
                warn!(group_id = %id, error = %error, "group fetch failed; treating as not found");
                Resolution::NotFound
            }
        }
    }

    pub fn cached_groups(&self) -> usize {
        self.cache.len()
    }
}
