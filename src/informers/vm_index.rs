//! Bidirectional index between VMs and the templates they were created from.
//!
//! Answers "which VMs reference template `ns/name`" without scanning every
//! VM. Fed by the VM watcher; read by the template deletion handler.
//!
//! Both maps and the synced flag live behind a single lock so readers always
//! observe them consistent with each other.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use parking_lot::RwLock;
use tracing::trace;

use crate::labels::{
    TemplateKeys, VM_SKIP_VALIDATIONS_KEY, VM_VALIDATIONS_KEY, has_annotation,
};

/// Decides whether an object is tracked at all
pub type Filter = Arc<dyn Fn(&ObjectMeta) -> bool + Send + Sync>;

/// One tracked VM, both sides as `namespace/name`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VmIndexEntry {
    pub vm: String,
    pub template: String,
}

impl VmIndexEntry {
    fn from_meta(meta: &ObjectMeta) -> Self {
        Self {
            vm: object_key(meta),
            template: TemplateKeys::from_meta(meta).get().to_string(),
        }
    }
}

/// `namespace/name` of an object
pub fn object_key(meta: &ObjectMeta) -> String {
    format!(
        "{}/{}",
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default()
    )
}

/// Track VMs validated against a parent template: no skip annotation, no
/// inline rules and a resolvable template reference.
pub fn default_filter() -> Filter {
    Arc::new(|meta: &ObjectMeta| {
        !has_annotation(meta, VM_SKIP_VALIDATIONS_KEY)
            && !has_annotation(meta, VM_VALIDATIONS_KEY)
            && TemplateKeys::from_meta(meta).is_valid()
    })
}

#[derive(Default)]
struct IndexState {
    store: HashMap<String, VmIndexEntry>,
    by_template: HashMap<String, HashSet<String>>,
    has_synced: bool,
}

impl IndexState {
    fn link(&mut self, entry: &VmIndexEntry) {
        self.by_template
            .entry(entry.template.clone())
            .or_default()
            .insert(entry.vm.clone());
    }

    fn unlink(&mut self, entry: &VmIndexEntry) {
        if let Some(vms) = self.by_template.get_mut(&entry.template) {
            vms.remove(&entry.vm);
            if vms.is_empty() {
                self.by_template.remove(&entry.template);
            }
        }
    }
}

pub struct VmTemplateIndex {
    state: RwLock<IndexState>,
    filter: Filter,
}

impl fmt::Debug for VmTemplateIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("VmTemplateIndex")
            .field("vms", &state.store.len())
            .field("templates", &state.by_template.len())
            .field("has_synced", &state.has_synced)
            .finish()
    }
}

impl Default for VmTemplateIndex {
    fn default() -> Self {
        Self::new(default_filter())
    }
}

impl VmTemplateIndex {
    pub fn new(filter: Filter) -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
            filter,
        }
    }

    pub fn add<K: Resource>(&self, obj: &K) {
        let meta = obj.meta();
        if !(self.filter)(meta) {
            return;
        }
        let entry = VmIndexEntry::from_meta(meta);
        trace!(vm = %entry.vm, template = %entry.template, "indexing VM");

        let mut state = self.state.write();
        if let Some(old) = state.store.insert(entry.vm.clone(), entry.clone()) {
            state.unlink(&old);
        }
        state.link(&entry);
    }

    /// Re-index an object. Objects the filter rejects are dropped.
    pub fn update<K: Resource>(&self, obj: &K) {
        let meta = obj.meta();
        if !(self.filter)(meta) {
            self.delete(obj);
            return;
        }
        let entry = VmIndexEntry::from_meta(meta);

        let mut state = self.state.write();
        match state.store.get(&entry.vm) {
            Some(old) if *old == entry => {}
            Some(old) => {
                let old = old.clone();
                state.unlink(&old);
                state.link(&entry);
                state.store.insert(entry.vm.clone(), entry);
            }
            None => {
                state.link(&entry);
                state.store.insert(entry.vm.clone(), entry);
            }
        }
    }

    pub fn delete<K: Resource>(&self, obj: &K) {
        let key = object_key(obj.meta());
        let mut state = self.state.write();
        if let Some(old) = state.store.remove(&key) {
            trace!(vm = %old.vm, template = %old.template, "unindexing VM");
            state.unlink(&old);
        }
    }

    pub fn get<K: Resource>(&self, obj: &K) -> Option<VmIndexEntry> {
        self.get_by_key(&object_key(obj.meta()))
    }

    pub fn get_by_key(&self, key: &str) -> Option<VmIndexEntry> {
        self.state.read().store.get(key).cloned()
    }

    pub fn list(&self) -> Vec<VmIndexEntry> {
        self.state.read().store.values().cloned().collect()
    }

    pub fn list_keys(&self) -> Vec<String> {
        self.state.read().store.keys().cloned().collect()
    }

    /// Swap the whole content for `objects` and mark the index synced.
    ///
    /// The new maps are built before the lock is taken. The filter applies
    /// here as it does in [`add`](Self::add).
    pub fn replace<K: Resource>(&self, objects: &[K]) {
        let mut next = IndexState {
            has_synced: true,
            ..IndexState::default()
        };
        for obj in objects {
            let meta = obj.meta();
            if !(self.filter)(meta) {
                continue;
            }
            let entry = VmIndexEntry::from_meta(meta);
            if let Some(old) = next.store.insert(entry.vm.clone(), entry.clone()) {
                next.unlink(&old);
            }
            next.link(&entry);
        }

        *self.state.write() = next;
    }

    pub fn has_synced(&self) -> bool {
        self.state.read().has_synced
    }

    /// Keys of the VMs referencing `template`, in no particular order
    pub fn vms_for_template(&self, template: &str) -> Vec<String> {
        self.state
            .read()
            .by_template
            .get(template)
            .map(|vms| vms.iter().cloned().collect())
            .unwrap_or_default()
    }
}
