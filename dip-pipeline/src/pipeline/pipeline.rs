//! The pipeline: processors, their wiring, derived stages and aggregate state.

use super::aggregator::PipelineStateAggregator;
use super::layout::LayoutStrategy;
use super::stages::PipelineStages;
use super::version_policy::VersionPolicy;
use crate::config::PipelineSettings;
use crate::core::{PipelineState, PortHandle, ProcessorId, ProcessorState};
use crate::errors::{ConnectionError, PipelineError};
use crate::events::{names, EventSink, NoOpEventSink};
use crate::graph::{LayoutPosition, OutputPort, PortMap, PortSet, ProcessorNode};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// A named, owned collection of processors and their connections.
///
/// Structural mutations (processors added or removed, connections changed,
/// ports or availability changed) mark the stages dirty; the next read of
/// [`stages`](Self::stages) rebuilds them from scratch. Port maps are kept
/// up to date on every mutation.
///
/// A pipeline is not internally synchronized. Share it through
/// [`SharedPipeline`](super::SharedPipeline) and feed state updates from
/// worker threads through a [`StateUpdateReceiver`](super::StateUpdateReceiver).
pub struct Pipeline {
    id: u32,
    name: String,
    processors: Vec<ProcessorNode>,
    max_processor_id: Option<u32>,
    layout_strategy: LayoutStrategy,
    version_policy: VersionPolicy,
    output_ports: PortMap,
    input_ports: PortMap,
    stages: PipelineStages,
    dirty: bool,
    aggregator: PipelineStateAggregator,
    state_tx: watch::Sender<PipelineState>,
    releasing: bool,
    event_sink: Arc<dyn EventSink>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("processors", &self.processors.len())
            .field("layout_strategy", &self.layout_strategy)
            .field("version_policy", &self.version_policy)
            .field("dirty", &self.dirty)
            .field("state", &self.aggregator.state())
            .field("releasing", &self.releasing)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pipeline{{id={}, name={}, processors({})=[",
            self.id,
            self.name,
            self.processors.len()
        )?;
        for (i, node) in self.processors.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{node}")?;
        }
        write!(f, "]}}")
    }
}

impl Pipeline {
    /// Creates an empty pipeline with default layout and version policy.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self::with_settings(id, name, &PipelineSettings::default())
    }

    /// Creates an empty pipeline using the given defaults.
    #[must_use]
    pub fn with_settings(id: u32, name: impl Into<String>, settings: &PipelineSettings) -> Self {
        let (state_tx, _) = watch::channel(PipelineState::None);
        Self {
            id,
            name: name.into(),
            processors: Vec::new(),
            max_processor_id: None,
            layout_strategy: settings.layout_strategy,
            version_policy: settings.version_policy,
            output_ports: PortMap::new(),
            input_ports: PortMap::new(),
            stages: PipelineStages::empty(),
            dirty: false,
            aggregator: PipelineStateAggregator::new(),
            state_tx,
            releasing: false,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the layout strategy.
    #[must_use]
    pub const fn with_layout_strategy(mut self, strategy: LayoutStrategy) -> Self {
        self.layout_strategy = strategy;
        self
    }

    /// Sets the version policy.
    #[must_use]
    pub const fn with_version_policy(mut self, policy: VersionPolicy) -> Self {
        self.version_policy = policy;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the pipeline id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the pipeline.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns the layout strategy.
    #[must_use]
    pub const fn layout_strategy(&self) -> LayoutStrategy {
        self.layout_strategy
    }

    /// Changes the layout strategy. Intra-stage order depends on it, so the
    /// stages are marked dirty.
    pub fn set_layout_strategy(&mut self, strategy: LayoutStrategy) {
        if self.layout_strategy != strategy {
            self.layout_strategy = strategy;
            self.invalidate();
        }
    }

    /// Returns the version policy.
    #[must_use]
    pub const fn version_policy(&self) -> VersionPolicy {
        self.version_policy
    }

    /// Changes the version policy.
    pub fn set_version_policy(&mut self, policy: VersionPolicy) {
        self.version_policy = policy;
    }

    /// Returns all processors in pipeline order.
    #[must_use]
    pub fn processors(&self) -> &[ProcessorNode] {
        &self.processors
    }

    /// Returns a processor by id.
    #[must_use]
    pub fn processor(&self, id: ProcessorId) -> Option<&ProcessorNode> {
        self.processors.iter().find(|node| node.id() == id)
    }

    /// Returns the number of processors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Returns true if the pipeline has no processors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Allocates a fresh processor id, one above the highest id seen.
    ///
    /// Once `u32::MAX` has been seen, the lowest id not used by a processor
    /// of this pipeline is returned instead.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IdsExhausted`] if every id is in use.
    pub fn new_processor_id(&mut self) -> Result<ProcessorId, PipelineError> {
        let Some(max) = self.max_processor_id else {
            self.max_processor_id = Some(0);
            return Ok(ProcessorId(0));
        };
        if let Some(id) = max.checked_add(1) {
            self.max_processor_id = Some(id);
            return Ok(ProcessorId(id));
        }

        let used: HashSet<u32> = self.processors.iter().map(|node| node.id().get()).collect();
        let id = (0..=u32::MAX)
            .find(|id| !used.contains(id))
            .ok_or(PipelineError::IdsExhausted)?;
        debug!(
            pipeline = self.id,
            processor = id,
            "Processor ids wrapped, reusing lowest free id"
        );
        Ok(ProcessorId(id))
    }

    /// Adds a processor and registers its ports.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DuplicateProcessor`] if the id is taken, or
    /// [`PipelineError::Released`] after [`release`](Self::release).
    pub fn add_processor(&mut self, node: ProcessorNode) -> Result<ProcessorId, PipelineError> {
        if self.releasing {
            return Err(PipelineError::Released);
        }
        let id = node.id();
        if self.processor(id).is_some() {
            return Err(PipelineError::DuplicateProcessor(id));
        }

        self.level_max_processor_id(id);
        self.output_ports.register_outputs(&node);
        self.input_ports.register_inputs(&node);
        let (state, can_auto) = (node.state(), node.can_auto_process());
        self.processors.push(node);
        self.invalidate();

        debug!(pipeline = self.id, processor = %id, "Added processor");
        self.record_state(id, state, can_auto);
        Ok(id)
    }

    /// Removes a processor, purging its ports from both port maps.
    ///
    /// With `disconnect`, the processor's inputs and every input reading
    /// from its outputs are disconnected. Without it, downstream inputs keep
    /// pointing at the removed outputs (useful if the caller still needs the
    /// connections); they can never be satisfied until rewired.
    pub fn remove_processor(
        &mut self,
        id: ProcessorId,
        disconnect: bool,
    ) -> Option<ProcessorNode> {
        let index = self.index_of(id)?;
        let mut node = self.processors.remove(index);

        let mut dependents = Vec::new();
        if disconnect {
            let outputs = output_handles(&node);
            dependents = self.readers_of(&outputs);
            let dropped = self.disconnect_readers_of(&outputs);
            let own = node.disconnect_all_inputs();
            debug!(
                processor = %id,
                downstream = dropped,
                inputs = own,
                "Disconnected removed processor"
            );
        }

        self.output_ports.unregister(id);
        self.input_ports.unregister(id);
        self.invalidate();

        let previous = self.aggregator.state();
        let state = self.aggregator.remove(id);
        self.publish(previous, state);
        self.event_sink.try_emit(
            names::PROCESSOR_REMOVED,
            Some(serde_json::json!({ "pipeline": self.id, "processor": id })),
        );
        self.refresh_structural_states(dependents);
        Some(node)
    }

    /// Connects an output of `source` to an input of `target`, replacing any
    /// previous connection of that input.
    ///
    /// # Errors
    ///
    /// Fails if a processor or port does not exist, a processor is
    /// unavailable, or the data types differ.
    pub fn connect(
        &mut self,
        source: ProcessorId,
        output: &str,
        target: ProcessorId,
        input: &str,
    ) -> Result<(), PipelineError> {
        let source_node = self.available_processor(source)?;
        let output_port = source_node
            .output(output)
            .cloned()
            .ok_or_else(|| ConnectionError::unknown_output(source, output))?;

        self.available_processor(target)?;
        let index = self.index_of(target).ok_or(PipelineError::UnknownProcessor(target))?;
        let input_port = self.processors[index]
            .input_mut(input)
            .ok_or_else(|| ConnectionError::unknown_input(target, input))?;
        input_port.connect_to(&output_port)?;

        debug!(
            pipeline = self.id,
            "Connected {}::{} -> {}::{}", source, output, target, input
        );
        self.invalidate();
        Ok(())
    }

    /// Disconnects an input. Returns the handle of the output it read from.
    ///
    /// # Errors
    ///
    /// Fails if the processor or input does not exist.
    pub fn disconnect(
        &mut self,
        target: ProcessorId,
        input: &str,
    ) -> Result<Option<PortHandle>, PipelineError> {
        let index = self.index_of(target).ok_or(PipelineError::UnknownProcessor(target))?;
        let previous = self.processors[index]
            .input_mut(input)
            .ok_or_else(|| ConnectionError::unknown_input(target, input))?
            .disconnect();
        if previous.is_some() {
            self.invalidate();
        }
        Ok(previous)
    }

    /// Replaces the ports of a processor (e.g. after reconfiguration).
    ///
    /// Ports with the same key and data type keep their identity and
    /// connections. Inputs elsewhere reading from outputs that disappeared are
    /// disconnected. The structural states of the processor and of those
    /// readers are refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownProcessor`] if the id is unknown.
    pub fn set_ports(&mut self, id: ProcessorId, ports: PortSet) -> Result<(), PipelineError> {
        let index = self.index_of(id).ok_or(PipelineError::UnknownProcessor(id))?;
        let node = &mut self.processors[index];
        let previous = node.replace_ports(ports);
        let dropped = node.ports_mut().adopt_from(previous);

        let mut affected = self.readers_of(&dropped);
        let disconnected = self.disconnect_readers_of(&dropped);
        if disconnected > 0 {
            warn!(
                processor = %id,
                disconnected,
                "Ports changed, dropped connections to removed outputs"
            );
        }
        self.reregister(index);
        self.invalidate();

        affected.push(id);
        self.refresh_structural_states(affected);
        Ok(())
    }

    /// Marks a processor's implementation as present or missing.
    ///
    /// Unavailable processors contribute no outputs to the output port map,
    /// so anything reading from them can no longer be staged. The structural
    /// states of the processor and its dependents are refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownProcessor`] if the id is unknown.
    pub fn set_available(&mut self, id: ProcessorId, available: bool) -> Result<(), PipelineError> {
        let index = self.index_of(id).ok_or(PipelineError::UnknownProcessor(id))?;
        if self.processors[index].is_available() != available {
            self.processors[index].set_available(available);
            self.reregister(index);
            self.invalidate();

            let mut affected = self.dependents_of(id);
            affected.push(id);
            self.refresh_structural_states(affected);
        }
        Ok(())
    }

    /// Returns the processors with an input connected to one of `id`'s
    /// outputs, in id order.
    ///
    /// Unavailable readers are included: the input port map covers every
    /// processor regardless of availability.
    #[must_use]
    pub fn dependents_of(&self, id: ProcessorId) -> Vec<ProcessorId> {
        self.processor(id)
            .map(|node| self.readers_of(&output_handles(node)))
            .unwrap_or_default()
    }

    /// Moves a processor in the editor, which may change intra-stage order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownProcessor`] if the id is unknown.
    pub fn set_position(
        &mut self,
        id: ProcessorId,
        position: LayoutPosition,
    ) -> Result<(), PipelineError> {
        let index = self.index_of(id).ok_or(PipelineError::UnknownProcessor(id))?;
        self.processors[index].set_position(position);
        self.invalidate();
        Ok(())
    }

    /// Returns the output port map.
    #[must_use]
    pub const fn output_port_map(&self) -> &PortMap {
        &self.output_ports
    }

    /// Returns the input port map.
    #[must_use]
    pub const fn input_port_map(&self) -> &PortMap {
        &self.input_ports
    }

    /// Marks the stages dirty.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Returns true if the stages need a rebuild.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuilds the stages if they are dirty. Returns true if a rebuild
    /// happened.
    pub fn ensure_fresh(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.stages = PipelineStages::build(
            &self.processors,
            &self.output_ports,
            self.layout_strategy.comparator(),
        );
        self.dirty = false;

        self.event_sink.try_emit(
            names::STAGES_REBUILT,
            Some(serde_json::json!({
                "pipeline": self.id,
                "complete": self.stages.is_complete(),
                "stages": self.stages.len(),
                "stuck": self.stages.stuck(),
            })),
        );
        true
    }

    /// Returns the current stages, rebuilding them first if dirty.
    pub fn stages(&mut self) -> &PipelineStages {
        self.ensure_fresh();
        &self.stages
    }

    /// Returns the stages if they are up to date.
    #[must_use]
    pub fn cached_stages(&self) -> Option<&PipelineStages> {
        (!self.dirty).then_some(&self.stages)
    }

    /// Returns the implied state of a stage (by number).
    pub fn stage_state(&mut self, number: u32) -> Option<ProcessorState> {
        self.ensure_fresh();
        let stage = self.stages.by_number(number)?;
        Some(stage.state(|id| self.processor(id).map(ProcessorNode::state)))
    }

    /// Sets a processor's runtime state and recomputes the pipeline state.
    ///
    /// Returns the new pipeline state, or `None` if the update was skipped
    /// because the processor is unknown or the pipeline is being released.
    pub fn set_processor_state(
        &mut self,
        id: ProcessorId,
        state: ProcessorState,
    ) -> Option<PipelineState> {
        if self.releasing {
            debug!(
                pipeline = self.id,
                processor = %id,
                "Ignoring state update during release"
            );
            return None;
        }
        let Some(index) = self.index_of(id) else {
            debug!(
                pipeline = self.id,
                processor = %id,
                "Ignoring state update for unknown processor"
            );
            return None;
        };
        let node = &mut self.processors[index];
        node.set_state(state);
        let can_auto = node.can_auto_process();
        Some(self.record_state(id, state, can_auto))
    }

    /// Re-asks a processor whether it can auto-process, keeping its state.
    ///
    /// The capability is opaque and may change while a processor sits in
    /// `Processing` (e.g. once its parameters are set).
    pub fn refresh_processor(&mut self, id: ProcessorId) -> Option<PipelineState> {
        let state = self.processor(id)?.state();
        self.set_processor_state(id, state)
    }

    /// Applies structural states: `Unavailable` for missing implementations,
    /// `Unconnected` for unwired required inputs. Processors that were held in
    /// one of those states but are now structurally sound go back to
    /// `Waiting`. Returns the number of processors whose state changed.
    pub fn update_structural_states(&mut self) -> usize {
        let ids: Vec<ProcessorId> = self.processors.iter().map(ProcessorNode::id).collect();
        self.refresh_structural_states(ids)
    }

    /// Returns the aggregate pipeline state.
    #[must_use]
    pub const fn pipeline_state(&self) -> PipelineState {
        self.aggregator.state()
    }

    /// Subscribes to pipeline state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    /// Returns true once [`release`](Self::release) has been called.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.releasing
    }

    /// Tears the pipeline down. State updates arriving during or after the
    /// release are ignored.
    pub fn release(&mut self) {
        if self.releasing {
            return;
        }
        self.releasing = true;
        debug!(pipeline = self.id, "Releasing pipeline");

        self.processors.clear();
        self.output_ports.clear();
        self.input_ports.clear();
        self.stages = PipelineStages::empty();
        self.dirty = false;
        self.aggregator.clear();
        self.state_tx.send_replace(PipelineState::None);
        self.event_sink
            .try_emit(names::RELEASED, Some(serde_json::json!({ "pipeline": self.id })));
    }

    fn index_of(&self, id: ProcessorId) -> Option<usize> {
        self.processors.iter().position(|node| node.id() == id)
    }

    fn level_max_processor_id(&mut self, id: ProcessorId) {
        if self.max_processor_id.map_or(true, |max| id.get() > max) {
            self.max_processor_id = Some(id.get());
        }
    }

    fn available_processor(&self, id: ProcessorId) -> Result<&ProcessorNode, PipelineError> {
        let node = self.processor(id).ok_or(PipelineError::UnknownProcessor(id))?;
        if !node.is_available() {
            return Err(ConnectionError::ProcessorUnavailable { processor: id }.into());
        }
        Ok(node)
    }

    fn reregister(&mut self, index: usize) {
        let node = &self.processors[index];
        self.output_ports.register_outputs(node);
        self.input_ports.register_inputs(node);
    }

    /// Applies structural states to `ids`. Returns the number changed.
    fn refresh_structural_states(&mut self, ids: Vec<ProcessorId>) -> usize {
        let changes: Vec<(ProcessorId, ProcessorState)> = ids
            .into_iter()
            .filter_map(|id| {
                let node = self.processor(id)?;
                structural_target(node).map(|state| (id, state))
            })
            .collect();

        for (id, state) in &changes {
            self.set_processor_state(*id, *state);
        }
        changes.len()
    }

    /// Resolves the owners of every input connected to one of `outputs`
    /// through the input port map.
    fn readers_of(&self, outputs: &[PortHandle]) -> Vec<ProcessorId> {
        if outputs.is_empty() {
            return Vec::new();
        }
        let mut readers: Vec<ProcessorId> = self
            .processors
            .iter()
            .flat_map(|node| node.ports().inputs().values())
            .filter(|input| input.connection().is_some_and(|c| outputs.contains(&c)))
            .filter_map(|input| self.input_ports.get(&input.handle()))
            .map(|entry| entry.processor)
            .collect();
        readers.sort_unstable();
        readers.dedup();
        readers
    }

    /// Disconnects every input reading from one of `outputs`.
    fn disconnect_readers_of(&mut self, outputs: &[PortHandle]) -> usize {
        if outputs.is_empty() {
            return 0;
        }
        let mut count = 0;
        for node in &mut self.processors {
            for input in node.inputs_mut() {
                if input.connection().is_some_and(|c| outputs.contains(&c)) {
                    input.disconnect();
                    count += 1;
                }
            }
        }
        count
    }

    fn record_state(
        &mut self,
        id: ProcessorId,
        state: ProcessorState,
        can_auto: bool,
    ) -> PipelineState {
        let previous = self.aggregator.state();
        let current = self.aggregator.update(id, state, can_auto);
        debug!(
            processor = %id,
            state = %state,
            can_auto,
            pipeline_state = %current,
            "Processor state recorded"
        );
        self.publish(previous, current);
        current
    }

    fn publish(&self, previous: PipelineState, current: PipelineState) {
        if previous == current {
            return;
        }
        self.state_tx.send_replace(current);
        self.event_sink.try_emit(
            names::STATE_CHANGED,
            Some(serde_json::json!({
                "pipeline": self.id,
                "from": previous,
                "to": current,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
        );
    }
}

fn output_handles(node: &ProcessorNode) -> Vec<PortHandle> {
    node.ports()
        .outputs()
        .values()
        .map(OutputPort::handle)
        .collect()
}

/// The state a processor should move to for structural reasons, if any.
///
/// Processors held in `Unavailable` or `Unconnected` that are now sound go
/// back to `Waiting`.
fn structural_target(node: &ProcessorNode) -> Option<ProcessorState> {
    let target = match node.structural_state() {
        Some(state) => state,
        None if matches!(
            node.state(),
            ProcessorState::Unavailable | ProcessorState::Unconnected
        ) =>
        {
            ProcessorState::Waiting
        }
        None => return None,
    };
    (target != node.state()).then_some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use crate::graph::MockAutoProcess;

    fn filter(id: u32) -> ProcessorNode {
        ProcessorNode::new(ProcessorId(id), format!("filter{id}"))
            .with_input("image", "image/gray", true)
            .with_output("image", "image/gray")
    }

    #[test]
    fn test_new_pipeline() {
        let pipeline = Pipeline::new(1, "binarization");
        assert_eq!(pipeline.id(), 1);
        assert_eq!(pipeline.name(), "binarization");
        assert!(pipeline.is_empty());
        assert!(!pipeline.is_dirty());
        assert_eq!(pipeline.pipeline_state(), PipelineState::None);
        assert_eq!(pipeline.layout_strategy(), LayoutStrategy::LeftRight);
        assert_eq!(pipeline.version_policy(), VersionPolicy::MicroLatest);
    }

    #[test]
    fn test_with_settings() {
        let settings = PipelineSettings::new()
            .with_layout_strategy(LayoutStrategy::TopDown)
            .with_version_policy(VersionPolicy::MicroExact);
        let pipeline = Pipeline::with_settings(2, "p", &settings);

        assert_eq!(pipeline.layout_strategy(), LayoutStrategy::TopDown);
        assert_eq!(pipeline.version_policy(), VersionPolicy::MicroExact);
    }

    #[test]
    fn test_processor_ids() {
        let mut pipeline = Pipeline::new(1, "p");
        assert_eq!(pipeline.new_processor_id().unwrap(), ProcessorId(0));

        pipeline.add_processor(filter(7)).unwrap();
        assert_eq!(pipeline.new_processor_id().unwrap(), ProcessorId(8));

        pipeline.add_processor(filter(3)).unwrap();
        assert_eq!(pipeline.new_processor_id().unwrap(), ProcessorId(9));
    }

    #[test]
    fn test_processor_ids_after_max_id() {
        let mut pipeline = Pipeline::new(1, "p");
        pipeline.add_processor(filter(u32::MAX)).unwrap();
        pipeline.add_processor(filter(0)).unwrap();

        let id = pipeline.new_processor_id().unwrap();
        assert_eq!(id, ProcessorId(1));
        pipeline.add_processor(filter(id.get())).unwrap();
        assert_eq!(pipeline.new_processor_id().unwrap(), ProcessorId(2));
    }

    #[test]
    fn test_processor_ids_never_reuse_live_ids() {
        let mut pipeline = Pipeline::new(1, "p");
        for id in [u32::MAX, 0, 1, 2] {
            pipeline.add_processor(filter(id)).unwrap();
        }

        let id = pipeline.new_processor_id().unwrap();
        assert!(pipeline.processor(id).is_none());
        assert_eq!(id, ProcessorId(3));
    }

    #[test]
    fn test_duplicate_processor() {
        let mut pipeline = Pipeline::new(1, "p");
        pipeline.add_processor(filter(0)).unwrap();

        let err = pipeline.add_processor(filter(0)).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateProcessor(ProcessorId(0))));
        assert_eq!(pipeline.len(), 1);
    }

    #[test]
    fn test_add_registers_ports_and_marks_dirty() {
        let mut pipeline = Pipeline::new(1, "p");
        pipeline.add_processor(filter(0)).unwrap();

        assert!(pipeline.is_dirty());
        assert_eq!(pipeline.output_port_map().len(), 1);
        assert_eq!(pipeline.input_port_map().len(), 1);
        assert!(pipeline.cached_stages().is_none());

        assert!(pipeline.ensure_fresh());
        assert!(!pipeline.ensure_fresh());
        assert!(pipeline.cached_stages().is_some());
    }

    #[test]
    fn test_connect_errors() {
        let mut pipeline = Pipeline::new(1, "p");
        pipeline.add_processor(filter(0)).unwrap();
        pipeline.add_processor(filter(1)).unwrap();
        pipeline
            .add_processor(
                ProcessorNode::new(ProcessorId(2), "rgb").with_input("image", "image/rgb", true),
            )
            .unwrap();
        pipeline.add_processor(filter(3).unavailable()).unwrap();

        assert!(matches!(
            pipeline.connect(ProcessorId(9), "image", ProcessorId(1), "image"),
            Err(PipelineError::UnknownProcessor(ProcessorId(9)))
        ));
        assert!(matches!(
            pipeline.connect(ProcessorId(0), "mask", ProcessorId(1), "image"),
            Err(PipelineError::Connection(ConnectionError::UnknownPort {
                direction: "output",
                ..
            }))
        ));
        assert!(matches!(
            pipeline.connect(ProcessorId(0), "image", ProcessorId(1), "mask"),
            Err(PipelineError::Connection(ConnectionError::UnknownPort {
                direction: "input",
                ..
            }))
        ));
        assert!(matches!(
            pipeline.connect(ProcessorId(0), "image", ProcessorId(2), "image"),
            Err(PipelineError::Connection(ConnectionError::TypeMismatch { .. }))
        ));
        assert!(matches!(
            pipeline.connect(ProcessorId(3), "image", ProcessorId(1), "image"),
            Err(PipelineError::Connection(ConnectionError::ProcessorUnavailable { .. }))
        ));
    }

    #[test]
    fn test_connect_and_disconnect() {
        let mut pipeline = Pipeline::new(1, "p");
        pipeline.add_processor(filter(0)).unwrap();
        pipeline.add_processor(filter(1)).unwrap();
        pipeline.ensure_fresh();

        pipeline.connect(ProcessorId(0), "image", ProcessorId(1), "image").unwrap();
        assert!(pipeline.is_dirty());
        assert_eq!(pipeline.stages().len(), 2);

        let handle = pipeline.disconnect(ProcessorId(1), "image").unwrap();
        assert_eq!(
            handle,
            Some(
                pipeline
                    .processor(ProcessorId(0))
                    .unwrap()
                    .output("image")
                    .unwrap()
                    .handle()
            )
        );
        assert_eq!(pipeline.stages().len(), 1);
        assert_eq!(pipeline.disconnect(ProcessorId(1), "image").unwrap(), None);
    }

    #[test]
    fn test_set_available_changes_output_map() {
        let mut pipeline = Pipeline::new(1, "p");
        pipeline.add_processor(filter(0)).unwrap();
        pipeline.add_processor(filter(1)).unwrap();
        pipeline.connect(ProcessorId(0), "image", ProcessorId(1), "image").unwrap();
        assert!(pipeline.stages().is_complete());

        pipeline.set_available(ProcessorId(0), false).unwrap();
        assert_eq!(pipeline.output_port_map().len(), 1);
        assert_eq!(pipeline.input_port_map().len(), 2);
        assert!(!pipeline.stages().is_complete());

        pipeline.set_available(ProcessorId(0), true).unwrap();
        assert!(pipeline.stages().is_complete());
    }

    #[test]
    fn test_set_ports_keeps_surviving_connections() {
        let mut pipeline = Pipeline::new(1, "p");
        pipeline
            .add_processor(
                ProcessorNode::new(ProcessorId(0), "source")
                    .with_output("image", "image/gray")
                    .with_output("mask", "image/binary"),
            )
            .unwrap();
        pipeline.add_processor(filter(1)).unwrap();
        pipeline
            .add_processor(
                ProcessorNode::new(ProcessorId(2), "sink").with_input("mask", "image/binary", true),
            )
            .unwrap();
        pipeline.connect(ProcessorId(0), "image", ProcessorId(1), "image").unwrap();
        pipeline.connect(ProcessorId(0), "mask", ProcessorId(2), "mask").unwrap();
        pipeline.ensure_fresh();

        pipeline
            .set_ports(ProcessorId(0), PortSet::new().with_output("image", "image/gray"))
            .unwrap();

        assert!(pipeline.is_dirty());
        let input = |id: u32, key: &str| {
            pipeline
                .processor(ProcessorId(id))
                .unwrap()
                .input(key)
                .unwrap()
                .is_connected()
        };
        assert!(input(1, "image"));
        assert!(!input(2, "mask"));
        assert_eq!(pipeline.output_port_map().ports_of(ProcessorId(0)).len(), 1);
        assert_eq!(
            pipeline.processor(ProcessorId(2)).unwrap().state(),
            ProcessorState::Unconnected
        );
        assert_eq!(
            pipeline.processor(ProcessorId(1)).unwrap().state(),
            ProcessorState::Waiting
        );
        assert_eq!(pipeline.pipeline_state(), PipelineState::Error);

        let stages = pipeline.stages();
        assert!(stages.is_complete());
        assert_eq!(stages.stage_of(ProcessorId(1)), Some(2));
        assert_eq!(stages.stage_of(ProcessorId(2)), Some(1));
    }

    #[test]
    fn test_layout_strategy_orders_stage_members() {
        let mut pipeline = Pipeline::new(1, "p");
        pipeline.add_processor(filter(0).with_position(10.0, 200.0)).unwrap();
        pipeline.add_processor(filter(1).with_position(20.0, 100.0)).unwrap();

        assert_eq!(
            pipeline.stages().get(0).unwrap().processors(),
            &[ProcessorId(1), ProcessorId(0)]
        );

        pipeline.set_layout_strategy(LayoutStrategy::TopDown);
        assert!(pipeline.is_dirty());
        assert_eq!(
            pipeline.stages().get(0).unwrap().processors(),
            &[ProcessorId(0), ProcessorId(1)]
        );

        pipeline
            .set_position(ProcessorId(0), LayoutPosition::new(30.0, 0.0))
            .unwrap();
        assert_eq!(
            pipeline.stages().get(0).unwrap().processors(),
            &[ProcessorId(1), ProcessorId(0)]
        );
    }

    #[test]
    fn test_set_processor_state_uses_capability() {
        let mut mock = MockAutoProcess::new();
        mock.expect_can_auto_process().return_const(false);

        let mut pipeline = Pipeline::new(1, "p");
        pipeline
            .add_processor(filter(0).with_auto_process(Arc::new(mock)))
            .unwrap();

        assert_eq!(
            pipeline.set_processor_state(ProcessorId(0), ProcessorState::Processing),
            Some(PipelineState::Waiting)
        );
        assert_eq!(
            pipeline.processor(ProcessorId(0)).unwrap().state(),
            ProcessorState::Processing
        );
        assert_eq!(
            pipeline.set_processor_state(ProcessorId(5), ProcessorState::Error),
            None
        );
    }

    #[test]
    fn test_structural_states() {
        let mut pipeline = Pipeline::new(1, "p");
        pipeline.add_processor(filter(0)).unwrap();
        pipeline.add_processor(filter(1).unavailable()).unwrap();
        pipeline
            .add_processor(
                ProcessorNode::new(ProcessorId(2), "source").with_output("image", "image/gray"),
            )
            .unwrap();
        let state =
            |pipeline: &Pipeline, id: u32| pipeline.processor(ProcessorId(id)).unwrap().state();

        assert_eq!(pipeline.update_structural_states(), 2);
        assert_eq!(state(&pipeline, 0), ProcessorState::Unconnected);
        assert_eq!(state(&pipeline, 1), ProcessorState::Unavailable);
        assert_eq!(pipeline.pipeline_state(), PipelineState::Error);

        pipeline.connect(ProcessorId(2), "image", ProcessorId(0), "image").unwrap();
        pipeline.remove_processor(ProcessorId(1), true);
        assert_eq!(pipeline.update_structural_states(), 1);
        assert_eq!(state(&pipeline, 0), ProcessorState::Waiting);
        assert_eq!(pipeline.pipeline_state(), PipelineState::Ready);
        assert_eq!(pipeline.update_structural_states(), 0);
    }

    #[test]
    fn test_stage_state() {
        let mut pipeline = Pipeline::new(1, "p");
        pipeline.add_processor(filter(0).with_state(ProcessorState::Ready)).unwrap();
        pipeline.add_processor(filter(1).with_state(ProcessorState::Processing)).unwrap();
        pipeline.connect(ProcessorId(0), "image", ProcessorId(1), "image").unwrap();

        assert_eq!(pipeline.stage_state(1), Some(ProcessorState::Ready));
        assert_eq!(pipeline.stage_state(2), Some(ProcessorState::Processing));
        assert_eq!(pipeline.stage_state(3), None);
    }

    #[test]
    fn test_state_watch_and_events() {
        let sink = Arc::new(RecordingEventSink::new());
        let mut pipeline = Pipeline::new(1, "p").with_event_sink(sink.clone());
        let rx = pipeline.subscribe_state();

        pipeline.add_processor(filter(0)).unwrap();
        assert_eq!(*rx.borrow(), PipelineState::Ready);

        pipeline.set_processor_state(ProcessorId(0), ProcessorState::Error);
        assert_eq!(*rx.borrow(), PipelineState::Error);

        pipeline.stages();
        assert_eq!(sink.count(names::STATE_CHANGED), 2);
        let change = sink.last(names::STATE_CHANGED).unwrap();
        assert_eq!(change.field("from").unwrap(), "ready");
        assert_eq!(change.field("to").unwrap(), "error");
        assert!(change.field("timestamp").is_some());
        assert_eq!(sink.count(names::STAGES_REBUILT), 1);
    }

    #[test]
    fn test_release_guard() {
        let sink = Arc::new(RecordingEventSink::new());
        let mut pipeline = Pipeline::new(1, "p").with_event_sink(sink.clone());
        pipeline.add_processor(filter(0)).unwrap();
        pipeline.set_processor_state(ProcessorId(0), ProcessorState::Error);
        let rx = pipeline.subscribe_state();

        pipeline.release();
        assert!(pipeline.is_released());
        assert!(pipeline.is_empty());
        assert!(pipeline.output_port_map().is_empty());
        assert_eq!(pipeline.pipeline_state(), PipelineState::None);
        assert_eq!(*rx.borrow(), PipelineState::None);

        assert_eq!(
            pipeline.set_processor_state(ProcessorId(0), ProcessorState::Ready),
            None
        );
        assert!(matches!(pipeline.add_processor(filter(1)), Err(PipelineError::Released)));
        assert_eq!(sink.count(names::RELEASED), 1);

        pipeline.release();
        assert_eq!(sink.count(names::RELEASED), 1);
    }

    #[test]
    fn test_dependents_of_includes_unavailable_readers() {
        let mut pipeline = Pipeline::new(1, "p");
        pipeline
            .add_processor(
                ProcessorNode::new(ProcessorId(0), "source").with_output("image", "image/gray"),
            )
            .unwrap();
        pipeline.add_processor(filter(1)).unwrap();
        pipeline.add_processor(filter(2)).unwrap();
        pipeline.connect(ProcessorId(0), "image", ProcessorId(1), "image").unwrap();
        pipeline.connect(ProcessorId(0), "image", ProcessorId(2), "image").unwrap();

        pipeline.set_available(ProcessorId(2), false).unwrap();
        assert_eq!(pipeline.dependents_of(ProcessorId(0)), vec![ProcessorId(1), ProcessorId(2)]);
        assert_eq!(
            pipeline.processor(ProcessorId(2)).unwrap().state(),
            ProcessorState::Unavailable
        );
        assert_eq!(pipeline.dependents_of(ProcessorId(1)), Vec::<ProcessorId>::new());
        assert_eq!(pipeline.dependents_of(ProcessorId(9)), Vec::<ProcessorId>::new());

        pipeline.set_available(ProcessorId(2), true).unwrap();
        assert_eq!(
            pipeline.processor(ProcessorId(2)).unwrap().state(),
            ProcessorState::Waiting
        );
    }

    #[test]
    fn test_removal_refreshes_dependents() {
        let mut pipeline = Pipeline::new(1, "p");
        pipeline.add_processor(filter(0)).unwrap();
        pipeline.add_processor(filter(1)).unwrap();
        pipeline.add_processor(filter(2)).unwrap();
        pipeline.connect(ProcessorId(0), "image", ProcessorId(1), "image").unwrap();
        pipeline.connect(ProcessorId(0), "image", ProcessorId(2), "image").unwrap();
        pipeline.set_available(ProcessorId(2), false).unwrap();

        assert_eq!(pipeline.dependents_of(ProcessorId(0)), vec![ProcessorId(1), ProcessorId(2)]);

        pipeline.remove_processor(ProcessorId(0), true).unwrap();
        assert_eq!(
            pipeline.processor(ProcessorId(1)).unwrap().state(),
            ProcessorState::Unconnected
        );
        assert_eq!(
            pipeline.processor(ProcessorId(2)).unwrap().state(),
            ProcessorState::Unavailable
        );
        assert_eq!(pipeline.pipeline_state(), PipelineState::Error);
    }

    #[test]
    fn test_display() {
        let mut pipeline = Pipeline::new(4, "demo");
        pipeline.add_processor(filter(0)).unwrap();
        pipeline.add_processor(filter(1)).unwrap();
        assert_eq!(
            pipeline.to_string(),
            "Pipeline{id=4, name=demo, processors(2)=[filter0 (0), filter1 (1)]}"
        );
    }
}
