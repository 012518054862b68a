//! Typed ports.
//!
//! An output port fans out to any number of inputs; an input port holds at
//! most one connection. Connections are stored on the input side only, as the
//! handle of the output they read from.

use crate::core::PortHandle;
use crate::errors::ConnectionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Declared data type of a port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataType(String);

impl DataType {
    /// Creates a data type tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if data of `self` can be fed into a port of type `other`.
    ///
    /// Only exact matches are compatible.
    #[must_use]
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self == other
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for DataType {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// A port producing data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPort {
    handle: PortHandle,
    data_type: DataType,
}

impl OutputPort {
    /// Creates an output port with a fresh handle.
    #[must_use]
    pub fn new(data_type: impl Into<DataType>) -> Self {
        Self {
            handle: PortHandle::new(),
            data_type: data_type.into(),
        }
    }

    /// Returns the port handle.
    #[must_use]
    pub const fn handle(&self) -> PortHandle {
        self.handle
    }

    /// Returns the declared data type.
    #[must_use]
    pub const fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

/// A port consuming data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPort {
    handle: PortHandle,
    data_type: DataType,
    required: bool,
    connection: Option<PortHandle>,
}

impl InputPort {
    /// Creates an unconnected input port with a fresh handle.
    #[must_use]
    pub fn new(data_type: impl Into<DataType>, required: bool) -> Self {
        Self {
            handle: PortHandle::new(),
            data_type: data_type.into(),
            required,
            connection: None,
        }
    }

    /// Returns the port handle.
    #[must_use]
    pub const fn handle(&self) -> PortHandle {
        self.handle
    }

    /// Returns the declared data type.
    #[must_use]
    pub const fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Returns true if the processor cannot run without this input.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns true if the input is connected to an output.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns the handle of the connected output, if any.
    #[must_use]
    pub const fn connection(&self) -> Option<PortHandle> {
        self.connection
    }

    /// Connects this input to `output`, replacing any previous connection.
    ///
    /// Returns the handle of the replaced connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::TypeMismatch`] if the data types differ.
    pub fn connect_to(
        &mut self,
        output: &OutputPort,
    ) -> Result<Option<PortHandle>, ConnectionError> {
        if !output.data_type.is_compatible_with(&self.data_type) {
            return Err(ConnectionError::TypeMismatch {
                output: output.data_type.to_string(),
                input: self.data_type.to_string(),
            });
        }
        Ok(self.connection.replace(output.handle))
    }

    /// Disconnects the input, returning the previous connection.
    pub fn disconnect(&mut self) -> Option<PortHandle> {
        self.connection.take()
    }
}

/// The named ports of one processor, keyed and ordered by port key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet {
    inputs: BTreeMap<String, InputPort>,
    outputs: BTreeMap<String, OutputPort>,
}

impl PortSet {
    /// Creates an empty port set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an input port.
    #[must_use]
    pub fn with_input(
        mut self,
        key: impl Into<String>,
        data_type: impl Into<DataType>,
        required: bool,
    ) -> Self {
        self.inputs.insert(key.into(), InputPort::new(data_type, required));
        self
    }

    /// Adds an output port.
    #[must_use]
    pub fn with_output(mut self, key: impl Into<String>, data_type: impl Into<DataType>) -> Self {
        self.outputs.insert(key.into(), OutputPort::new(data_type));
        self
    }

    /// Returns the input ports.
    #[must_use]
    pub const fn inputs(&self) -> &BTreeMap<String, InputPort> {
        &self.inputs
    }

    /// Returns the output ports.
    #[must_use]
    pub const fn outputs(&self) -> &BTreeMap<String, OutputPort> {
        &self.outputs
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut BTreeMap<String, InputPort> {
        &mut self.inputs
    }

    /// Carries identity over from the port set this one replaces.
    ///
    /// Ports whose key and data type are unchanged keep their handle (and,
    /// for inputs, their connection). Returns the handles of outputs that no
    /// longer exist.
    pub(crate) fn adopt_from(&mut self, previous: Self) -> Vec<PortHandle> {
        for (key, old) in previous.inputs {
            if let Some(new) = self.inputs.get_mut(&key) {
                if new.data_type == old.data_type {
                    new.handle = old.handle;
                    new.connection = old.connection;
                }
            }
        }

        let mut dropped = Vec::new();
        for (key, old) in previous.outputs {
            match self.outputs.get_mut(&key) {
                Some(new) if new.data_type == old.data_type => new.handle = old.handle,
                _ => dropped.push(old.handle),
            }
        }
        dropped
    }
}
