//! Pipeline fixtures.

use crate::core::ProcessorId;
use crate::errors::PipelineError;
use crate::graph::ProcessorNode;
use crate::pipeline::Pipeline;

/// Data type used by fixture processors.
pub const IMAGE: &str = "image";

/// Creates a processor with one required `"in"` input and one `"out"`
/// output, both of type [`IMAGE`].
#[must_use]
pub fn filter(id: u32) -> ProcessorNode {
    ProcessorNode::new(ProcessorId(id), format!("filter{id}"))
        .with_input("in", IMAGE, true)
        .with_output("out", IMAGE)
}

/// Creates a processor with a single `"out"` output.
#[must_use]
pub fn source(id: u32) -> ProcessorNode {
    ProcessorNode::new(ProcessorId(id), format!("source{id}")).with_output("out", IMAGE)
}

/// Creates a processor with two required inputs `"a"` and `"b"` and one
/// `"out"` output.
#[must_use]
pub fn merge(id: u32) -> ProcessorNode {
    ProcessorNode::new(ProcessorId(id), format!("merge{id}"))
        .with_input("a", IMAGE, true)
        .with_input("b", IMAGE, true)
        .with_output("out", IMAGE)
}

/// Builds pipelines from fixture processors and `"out"`-to-input edges.
#[derive(Debug, Default)]
pub struct TestPipeline {
    nodes: Vec<ProcessorNode>,
    edges: Vec<(u32, u32, String)>,
}

impl TestPipeline {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a processor.
    #[must_use]
    pub fn with(mut self, node: ProcessorNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Connects `from`'s `"out"` to `to`'s `input`.
    #[must_use]
    pub fn edge(mut self, from: u32, to: u32, input: impl Into<String>) -> Self {
        self.edges.push((from, to, input.into()));
        self
    }

    /// A source followed by `len - 1` chained filters.
    #[must_use]
    pub fn chain(len: u32) -> Self {
        let mut fixture = Self::new();
        for id in 0..len {
            fixture = if id == 0 {
                fixture.with(source(0))
            } else {
                fixture.with(filter(id)).edge(id - 1, id, "in")
            };
        }
        fixture
    }

    /// `layers` layers of `width` processors each; every processor reads
    /// from the processor above it and its right neighbour above.
    #[must_use]
    pub fn grid(width: u32, layers: u32) -> Self {
        let mut fixture = Self::new();
        for layer in 0..layers {
            for column in 0..width {
                let id = layer * width + column;
                if layer == 0 {
                    fixture = fixture.with(source(id));
                    continue;
                }
                let above = id - width;
                let right = (layer - 1) * width + (column + 1) % width;
                fixture = fixture
                    .with(merge(id))
                    .edge(above, id, "a")
                    .edge(right, id, "b");
            }
        }
        fixture
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Fails on duplicate ids or invalid edges.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let mut pipeline = Pipeline::new(0, "test");
        for node in self.nodes {
            pipeline.add_processor(node)?;
        }
        for (from, to, input) in self.edges {
            pipeline.connect(ProcessorId(from), "out", ProcessorId(to), &input)?;
        }
        Ok(pipeline)
    }
}
