//! Graph model: processors, typed ports and port ownership maps.

mod port;
mod port_map;
mod processor;

pub use port::{DataType, InputPort, OutputPort, PortSet};
pub use port_map::{build_input_port_map, build_output_port_map, PortMap, PortMapEntry};
pub use processor::{AutoProcess, LayoutPosition, ProcessorNode};

#[cfg(test)]
pub use processor::MockAutoProcess;
