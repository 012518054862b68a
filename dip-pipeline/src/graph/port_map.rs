//! Port-to-owner lookup tables.
//!
//! Ports have no back-reference to their processor, so a pipeline keeps one
//! map for outputs and one for inputs. Only available processors contribute
//! outputs; every processor contributes inputs, so wiring checks can still
//! see the inputs of unavailable processors.

use super::processor::ProcessorNode;
use crate::core::{PortHandle, ProcessorId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Owner of a port: the processor id and the port key on that processor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortMapEntry {
    /// The owning processor.
    pub processor: ProcessorId,
    /// The port key on that processor.
    pub port: String,
}

impl PortMapEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(processor: ProcessorId, port: impl Into<String>) -> Self {
        Self {
            processor,
            port: port.into(),
        }
    }
}

/// Lookup table from port handle to owning processor.
#[derive(Debug, Clone, Default)]
pub struct PortMap {
    entries: HashMap<PortHandle, PortMapEntry>,
    owners: HashMap<ProcessorId, Vec<PortHandle>>,
}

impl PortMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the owner of a port. `None` means the port was never
    /// registered.
    #[must_use]
    pub fn get(&self, handle: &PortHandle) -> Option<&PortMapEntry> {
        self.entries.get(handle)
    }

    /// Returns true if the port is registered.
    #[must_use]
    pub fn contains(&self, handle: &PortHandle) -> bool {
        self.entries.contains_key(handle)
    }

    /// Returns the number of registered ports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no port is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the handles registered for a processor.
    #[must_use]
    pub fn ports_of(&self, processor: ProcessorId) -> &[PortHandle] {
        self.owners.get(&processor).map_or(&[], Vec::as_slice)
    }

    /// Iterates over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&PortHandle, &PortMapEntry)> {
        self.entries.iter()
    }

    /// Registers the outputs of a processor, replacing any earlier
    /// registration. Unavailable processors end up with no outputs.
    pub fn register_outputs(&mut self, node: &ProcessorNode) {
        self.unregister(node.id());
        if !node.is_available() {
            return;
        }
        for (key, port) in node.ports().outputs() {
            self.insert(node.id(), port.handle(), key);
        }
    }

    /// Registers the inputs of a processor, replacing any earlier
    /// registration. Availability is ignored.
    pub fn register_inputs(&mut self, node: &ProcessorNode) {
        self.unregister(node.id());
        for (key, port) in node.ports().inputs() {
            self.insert(node.id(), port.handle(), key);
        }
    }

    /// Removes every port of a processor. Returns the number removed.
    pub fn unregister(&mut self, processor: ProcessorId) -> usize {
        let Some(handles) = self.owners.remove(&processor) else {
            return 0;
        };
        for handle in &handles {
            self.entries.remove(handle);
        }
        handles.len()
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.owners.clear();
    }

    fn insert(&mut self, processor: ProcessorId, handle: PortHandle, key: &str) {
        self.entries.insert(handle, PortMapEntry::new(processor, key));
        self.owners.entry(processor).or_default().push(handle);
    }
}

/// Builds the output port map of a set of processors.
pub fn build_output_port_map<'a>(nodes: impl IntoIterator<Item = &'a ProcessorNode>) -> PortMap {
    let mut map = PortMap::new();
    for node in nodes {
        map.register_outputs(node);
    }
    map
}

/// Builds the input port map of a set of processors.
pub fn build_input_port_map<'a>(nodes: impl IntoIterator<Item = &'a ProcessorNode>) -> PortMap {
    let mut map = PortMap::new();
    for node in nodes {
        map.register_inputs(node);
    }
    map
}
