//! Watch streams keeping the Template cache and the VM index current.
//!
//! Templates are mirrored in full by a reflector store. VMs only need their
//! labels and annotations, so they are followed with a metadata watcher that
//! feeds the [`VmTemplateIndex`].

pub mod vm_index;

pub use vm_index::{Filter, VmIndexEntry, VmTemplateIndex, default_filter, object_key};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use kube::api::ListParams;
use kube::core::PartialObjectMeta;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::runtime::watcher::{Config as WatcherConfig, Event};
use kube::runtime::{WatchStreamExt, metadata_watcher, reflector, watcher};
use kube::{Api, Client};
use tracing::{debug, info, warn};

use crate::crd::{Template, VirtualMachine};

/// Read access to templates by `namespace/name`
pub trait TemplateStore: Send + Sync {
    fn get_by_key(&self, key: &str) -> Option<Arc<Template>>;
}

impl TemplateStore for Store<Template> {
    fn get_by_key(&self, key: &str) -> Option<Arc<Template>> {
        let (namespace, name) = key.split_once('/')?;
        self.get(&ObjectRef::new(name).within(namespace))
    }
}

impl TemplateStore for HashMap<String, Arc<Template>> {
    fn get_by_key(&self, key: &str) -> Option<Arc<Template>> {
        self.get(key).cloned()
    }
}

/// Watcher configuration shared by both streams.
///
/// - `any_semantic()`: serve the initial list from the API server cache
fn default_watcher_config() -> WatcherConfig {
    WatcherConfig::default().any_semantic()
}

/// Reflector-backed stream of templates.
///
/// Returns the store (for lookups by the admission handlers) and the stream
/// that must be polled to keep it filled.
pub fn template_reflector(
    api: Api<Template>,
) -> (
    Store<Template>,
    impl Stream<Item = Result<Template, watcher::Error>>,
) {
    let (reader, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, default_watcher_config()))
        .default_backoff()
        .applied_objects();
    (reader, stream)
}

/// Whether the Template API is served at all (plain Kubernetes has none).
pub async fn templates_available(api: &Api<Template>) -> bool {
    match api.list(&ListParams::default().limit(1)).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "Template API unavailable, template-based validation disabled");
            false
        }
    }
}

/// Drive the template reflector until the stream ends.
pub async fn run_template_informer(
    stream: impl Stream<Item = Result<Template, watcher::Error>>,
) {
    info!("Starting template informer");
    stream
        .for_each(|result| async move {
            match result {
                Ok(template) => debug!(template = %template.key(), "Template cached"),
                Err(e) => warn!(error = %e, "Template watch error"),
            }
        })
        .await;
    warn!("Template informer stream ended unexpectedly");
}

/// Apply one watch event to the index.
///
/// Events of an initial list are buffered and swapped in at once when the
/// list completes, so the index never exposes a half-listed state.
pub fn apply_vm_event(
    index: &VmTemplateIndex,
    buffer: &mut Vec<PartialObjectMeta<VirtualMachine>>,
    event: Event<PartialObjectMeta<VirtualMachine>>,
) {
    match event {
        Event::Apply(vm) => index.update(&vm),
        Event::Delete(vm) => index.delete(&vm),
        Event::Init => buffer.clear(),
        Event::InitApply(vm) => buffer.push(vm),
        Event::InitDone => {
            index.replace(buffer);
            debug!(vms = buffer.len(), "VM index resynced");
            buffer.clear();
        }
    }
}

/// Feed the VM index from a metadata watch until the stream ends.
pub async fn run_vm_informer(client: Client, index: Arc<VmTemplateIndex>) {
    info!("Starting VM informer");
    let api: Api<VirtualMachine> = Api::all(client);
    let mut stream = metadata_watcher(api, default_watcher_config())
        .default_backoff()
        .boxed();

    let mut buffer = Vec::new();
    while let Some(result) = stream.next().await {
        match result {
            Ok(event) => apply_vm_event(&index, &mut buffer, event),
            Err(e) => warn!(error = %e, "VM watch error"),
        }
    }
    warn!("VM informer stream ended unexpectedly");
}

/// Wait until the VM index has completed its first list.
pub async fn wait_for_vm_index(index: &VmTemplateIndex) {
    let mut interval = tokio::time::interval(Duration::from_millis(200));
    while !index.has_synced() {
        interval.tick().await;
    }
}
