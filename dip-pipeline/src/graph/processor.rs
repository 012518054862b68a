//! Processor nodes.

use super::port::{DataType, InputPort, OutputPort, PortSet};
use crate::core::{ProcessorId, ProcessorState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Capability supplied by a processor implementation: whether it can run
/// without further user input.
#[cfg_attr(test, mockall::automock)]
pub trait AutoProcess: Send + Sync {
    /// Returns true if the processor can process on its own.
    fn can_auto_process(&self) -> bool;
}

/// Editor coordinates of a processor. Only used to order processors within
/// a stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutPosition {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl LayoutPosition {
    /// Creates a position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One step in a pipeline.
#[derive(Clone)]
pub struct ProcessorNode {
    id: ProcessorId,
    name: String,
    ports: PortSet,
    available: bool,
    state: ProcessorState,
    position: LayoutPosition,
    auto_process: Option<Arc<dyn AutoProcess>>,
}

impl fmt::Debug for ProcessorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("inputs", &self.ports.inputs().len())
            .field("outputs", &self.ports.outputs().len())
            .field("available", &self.available)
            .field("state", &self.state)
            .field("has_auto_process", &self.auto_process.is_some())
            .finish()
    }
}

impl fmt::Display for ProcessorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

impl ProcessorNode {
    /// Creates an available processor without ports.
    #[must_use]
    pub fn new(id: ProcessorId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ports: PortSet::new(),
            available: true,
            state: ProcessorState::default(),
            position: LayoutPosition::default(),
            auto_process: None,
        }
    }

    /// Replaces the port set.
    #[must_use]
    pub fn with_ports(mut self, ports: PortSet) -> Self {
        self.ports = ports;
        self
    }

    /// Adds an input port.
    #[must_use]
    pub fn with_input(
        mut self,
        key: impl Into<String>,
        data_type: impl Into<DataType>,
        required: bool,
    ) -> Self {
        self.ports = self.ports.with_input(key, data_type, required);
        self
    }

    /// Adds an output port.
    #[must_use]
    pub fn with_output(mut self, key: impl Into<String>, data_type: impl Into<DataType>) -> Self {
        self.ports = self.ports.with_output(key, data_type);
        self
    }

    /// Marks the processor as unavailable (implementation missing).
    #[must_use]
    pub const fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Sets the editor position.
    #[must_use]
    pub const fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = LayoutPosition::new(x, y);
        self
    }

    /// Sets the auto-process capability.
    #[must_use]
    pub fn with_auto_process(mut self, capability: Arc<dyn AutoProcess>) -> Self {
        self.auto_process = Some(capability);
        self
    }

    /// Sets the initial runtime state.
    #[must_use]
    pub const fn with_state(mut self, state: ProcessorState) -> Self {
        self.state = state;
        self
    }

    /// Returns the processor id.
    #[must_use]
    pub const fn id(&self) -> ProcessorId {
        self.id
    }

    /// Returns the processor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the port set.
    #[must_use]
    pub const fn ports(&self) -> &PortSet {
        &self.ports
    }

    /// Returns an input port by key.
    #[must_use]
    pub fn input(&self, key: &str) -> Option<&InputPort> {
        self.ports.inputs().get(key)
    }

    /// Returns an output port by key.
    #[must_use]
    pub fn output(&self, key: &str) -> Option<&OutputPort> {
        self.ports.outputs().get(key)
    }

    /// Returns true if the processor implementation is present.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.available
    }

    /// Returns the current runtime state.
    #[must_use]
    pub const fn state(&self) -> ProcessorState {
        self.state
    }

    /// Returns the editor position.
    #[must_use]
    pub const fn position(&self) -> LayoutPosition {
        self.position
    }

    /// Asks the processor implementation whether it can run on its own.
    ///
    /// Processors without the capability never auto-process.
    #[must_use]
    pub fn can_auto_process(&self) -> bool {
        self.auto_process
            .as_ref()
            .is_some_and(|capability| capability.can_auto_process())
    }

    /// Returns true if at least one input is connected.
    #[must_use]
    pub fn has_connected_inputs(&self) -> bool {
        self.ports.inputs().values().any(InputPort::is_connected)
    }

    /// Returns the state implied by the node's structure alone.
    ///
    /// `Unavailable` if the implementation is missing, `Unconnected` if a
    /// required input is not wired, otherwise `None`.
    #[must_use]
    pub fn structural_state(&self) -> Option<ProcessorState> {
        if !self.available {
            return Some(ProcessorState::Unavailable);
        }
        let missing = self
            .ports
            .inputs()
            .values()
            .any(|input| input.is_required() && !input.is_connected());
        missing.then_some(ProcessorState::Unconnected)
    }

    pub(crate) fn input_mut(&mut self, key: &str) -> Option<&mut InputPort> {
        self.ports.inputs_mut().get_mut(key)
    }

    pub(crate) fn inputs_mut(&mut self) -> impl Iterator<Item = &mut InputPort> {
        self.ports.inputs_mut().values_mut()
    }

    /// Disconnects every input, returning how many were connected.
    pub(crate) fn disconnect_all_inputs(&mut self) -> usize {
        self.inputs_mut()
            .filter_map(InputPort::disconnect)
            .count()
    }

    pub(crate) fn replace_ports(&mut self, ports: PortSet) -> PortSet {
        std::mem::replace(&mut self.ports, ports)
    }

    pub(crate) fn ports_mut(&mut self) -> &mut PortSet {
        &mut self.ports
    }

    pub(crate) fn set_state(&mut self, state: ProcessorState) {
        self.state = state;
    }

    pub(crate) fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub(crate) fn set_position(&mut self, position: LayoutPosition) {
        self.position = position;
    }
}
