//! In-process driver that mimics the NPU without hardware.
//!
//! The simulated engine accepts models made of the `EBGX` magic followed by
//! a JSON description of the network's slots (see [`SimulatedModel`]). Each
//! output is produced from one input, so the bytes an engine wrote can be
//! predicted by tests. Slot bookkeeping follows the native driver: a run
//! fails unless every input and output slot is bound to a live buffer of
//! the right size.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::driver::{copy_ranges, Driver, RawAttachment, RawBuffer, RawNetwork};
use crate::error::{Result, SynapError};

/// Magic prefix of compiled network models.
pub const MODEL_MAGIC: &[u8; 4] = b"EBGX";

/// Magic prefix of legacy NBG models, which are no longer accepted.
pub const LEGACY_MODEL_MAGIC: &[u8; 4] = b"VPMN";

/// Transformation applied by a simulated network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulatedOp {
    /// Output bytes repeat the source input.
    #[default]
    Copy,
    /// Output bytes are the bitwise complement of the source input.
    Invert,
}

/// Description of a model understood by [`SimulatedDriver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedModel {
    /// Byte size of each input slot.
    pub inputs: Vec<usize>,
    /// Byte size of each output slot.
    pub outputs: Vec<usize>,
    /// How outputs are computed.
    #[serde(default)]
    pub op: SimulatedOp,
}

impl SimulatedModel {
    /// Model copying input `j % inputs.len()` into output `j`.
    pub fn new(inputs: Vec<usize>, outputs: Vec<usize>) -> Self {
        Self {
            inputs,
            outputs,
            op: SimulatedOp::Copy,
        }
    }

    /// Use `op` instead of a plain copy.
    pub fn with_op(mut self, op: SimulatedOp) -> Self {
        self.op = op;
        self
    }

    /// Serialize into the on-disk model format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = MODEL_MAGIC.to_vec();
        // Serializing plain vectors and a unit enum cannot fail.
        bytes.extend(serde_json::to_vec(self).unwrap_or_default());
        bytes
    }

    /// Parse a compiled model.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MODEL_MAGIC.len() {
            return Err(SynapError::network_creation("Invalid network model"));
        }
        let (magic, body) = bytes.split_at(MODEL_MAGIC.len());
        if magic == LEGACY_MODEL_MAGIC {
            return Err(SynapError::network_creation(
                "NBG models not supported anymore, recompile the model",
            ));
        }
        if magic != MODEL_MAGIC {
            return Err(SynapError::network_creation("Not an EBG network model"));
        }
        Ok(serde_json::from_slice(body)?)
    }

    /// Compute the outputs for the given inputs.
    fn evaluate(&self, inputs: &[Vec<u8>]) -> Vec<Vec<u8>> {
        self.outputs
            .iter()
            .enumerate()
            .map(|(j, &size)| {
                let source = if inputs.is_empty() {
                    &[][..]
                } else {
                    &inputs[j % inputs.len()][..]
                };
                (0..size)
                    .map(|k| {
                        let byte = if source.is_empty() {
                            0
                        } else {
                            source[k % source.len()]
                        };
                        match self.op {
                            SimulatedOp::Copy => byte,
                            SimulatedOp::Invert => !byte,
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

/// Counters describing the calls a [`SimulatedDriver`] has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatedStats {
    /// Successful `init` calls.
    pub inits: usize,
    /// `deinit` calls.
    pub deinits: usize,
    /// Networks created.
    pub networks_created: usize,
    /// Io buffers created.
    pub buffers_created: usize,
    /// Attachments created.
    pub attachments_created: usize,
    /// `run_network` calls, successful or not.
    pub runs: usize,
    /// Networks not yet released.
    pub live_networks: usize,
    /// Io buffers not yet released.
    pub live_buffers: usize,
    /// Attachments not yet released.
    pub live_attachments: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Input(u32),
    Output(u32),
}

#[derive(Debug)]
struct SimAttachment {
    buffer: RawBuffer,
    slot: Option<Slot>,
}

#[derive(Debug)]
struct SimNetwork {
    model: SimulatedModel,
    attachments: HashMap<RawAttachment, SimAttachment>,
}

impl SimNetwork {
    fn slot_source(&self, slot: Slot) -> Option<RawBuffer> {
        self.attachments
            .values()
            .find(|a| a.slot == Some(slot))
            .map(|a| a.buffer)
    }
}

#[derive(Debug, Default)]
struct SimState {
    initialized: bool,
    npu_locked: bool,
    networks: HashMap<RawNetwork, SimNetwork>,
    buffers: HashMap<RawBuffer, Vec<u8>>,
    next_network: RawNetwork,
    next_attachment: RawAttachment,
    next_buffer: RawBuffer,
    stats: SimulatedStats,
}

impl SimState {
    fn bind(&mut self, network: RawNetwork, attachment: RawAttachment, slot: Slot) -> bool {
        if !self.initialized {
            return false;
        }
        let Some(net) = self.networks.get_mut(&network) else {
            return false;
        };
        let Some(buffer) = net.attachments.get(&attachment).map(|a| a.buffer) else {
            return false;
        };
        let expected = match slot {
            Slot::Input(i) => net.model.inputs.get(i as usize),
            Slot::Output(i) => net.model.outputs.get(i as usize),
        };
        let Some(&expected) = expected else {
            debug!("simulated: slot {:?} out of range", slot);
            return false;
        };
        let Some(actual) = self.buffers.get(&buffer).map(Vec::len) else {
            return false;
        };
        if actual != expected {
            debug!(
                "simulated: slot {:?} expects {} bytes, buffer has {}",
                slot, expected, actual
            );
            return false;
        }

        // A slot holds one attachment and an attachment holds one slot.
        for other in net.attachments.values_mut() {
            if other.slot == Some(slot) {
                other.slot = None;
            }
        }
        if let Some(a) = net.attachments.get_mut(&attachment) {
            a.slot = Some(slot);
        }
        true
    }

    fn run(&mut self, network: RawNetwork) -> bool {
        self.stats.runs += 1;
        if !self.initialized {
            return false;
        }
        let Some(net) = self.networks.get(&network) else {
            return false;
        };

        let mut inputs = Vec::with_capacity(net.model.inputs.len());
        for i in 0..net.model.inputs.len() as u32 {
            let data = net
                .slot_source(Slot::Input(i))
                .and_then(|b| self.buffers.get(&b));
            match data {
                Some(data) => inputs.push(data.clone()),
                None => {
                    debug!("simulated: input {} not bound", i);
                    return false;
                }
            }
        }

        let mut targets = Vec::with_capacity(net.model.outputs.len());
        for i in 0..net.model.outputs.len() as u32 {
            match net
                .slot_source(Slot::Output(i))
                .filter(|b| self.buffers.contains_key(b))
            {
                Some(buffer) => targets.push(buffer),
                None => {
                    debug!("simulated: output {} not bound", i);
                    return false;
                }
            }
        }

        let results = net.model.evaluate(&inputs);
        for (buffer, data) in targets.into_iter().zip(results) {
            if let Some(mem) = self.buffers.get_mut(&buffer) {
                mem.copy_from_slice(&data);
            }
        }
        true
    }
}

/// Driver executing [`SimulatedModel`]s in process memory.
#[derive(Debug, Default)]
pub struct SimulatedDriver {
    state: Mutex<SimState>,
    fail_init: bool,
}

impl SimulatedDriver {
    /// Create a driver whose `init` succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver whose `init` always fails, as with a missing device.
    pub fn unavailable() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> SimulatedStats {
        let state = self.state.lock();
        SimulatedStats {
            live_networks: state.networks.len(),
            live_buffers: state.buffers.len(),
            live_attachments: state.networks.values().map(|n| n.attachments.len()).sum(),
            ..state.stats
        }
    }

    /// Whether the NPU inference lock is currently held.
    pub fn is_npu_locked(&self) -> bool {
        self.state.lock().npu_locked
    }
}

impl Driver for SimulatedDriver {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn init(&self) -> bool {
        if self.fail_init {
            return false;
        }
        let mut state = self.state.lock();
        if state.initialized {
            debug!("simulated: driver already initialized");
            return false;
        }
        state.initialized = true;
        state.stats.inits += 1;
        true
    }

    fn deinit(&self) {
        let mut state = self.state.lock();
        state.initialized = false;
        state.npu_locked = false;
        state.networks.clear();
        state.buffers.clear();
        state.stats.deinits += 1;
    }

    fn create_network(&self, model: &[u8]) -> Option<RawNetwork> {
        let mut state = self.state.lock();
        if !state.initialized {
            return None;
        }
        let model = match SimulatedModel::from_bytes(model) {
            Ok(model) => model,
            Err(e) => {
                debug!("simulated: {}", e);
                return None;
            }
        };
        state.next_network += 1;
        let handle = state.next_network;
        state.networks.insert(
            handle,
            SimNetwork {
                model,
                attachments: HashMap::new(),
            },
        );
        state.stats.networks_created += 1;
        Some(handle)
    }

    fn release_network(&self, network: RawNetwork) {
        self.state.lock().networks.remove(&network);
    }

    fn attach_buffer(&self, network: RawNetwork, buffer: RawBuffer) -> Option<RawAttachment> {
        let mut state = self.state.lock();
        if !state.initialized || !state.buffers.contains_key(&buffer) {
            return None;
        }
        if !state.networks.contains_key(&network) {
            return None;
        }
        state.next_attachment += 1;
        let handle = state.next_attachment;
        state
            .networks
            .get_mut(&network)?
            .attachments
            .insert(handle, SimAttachment { buffer, slot: None });
        state.stats.attachments_created += 1;
        Some(handle)
    }

    fn run_network(&self, network: RawNetwork) -> bool {
        self.state.lock().run(network)
    }

    fn release_attachment(&self, network: RawNetwork, attachment: RawAttachment) {
        if let Some(net) = self.state.lock().networks.get_mut(&network) {
            net.attachments.remove(&attachment);
        }
    }

    fn use_attachment_as_input(
        &self,
        network: RawNetwork,
        attachment: RawAttachment,
        index: u32,
    ) -> bool {
        self.state
            .lock()
            .bind(network, attachment, Slot::Input(index))
    }

    fn use_attachment_as_output(
        &self,
        network: RawNetwork,
        attachment: RawAttachment,
        index: u32,
    ) -> bool {
        self.state
            .lock()
            .bind(network, attachment, Slot::Output(index))
    }

    fn create_io_buffer(&self, size: usize) -> Option<RawBuffer> {
        let mut state = self.state.lock();
        if !state.initialized || size == 0 {
            return None;
        }
        state.next_buffer += 1;
        let handle = state.next_buffer;
        state.buffers.insert(handle, vec![0; size]);
        state.stats.buffers_created += 1;
        Some(handle)
    }

    fn release_io_buffer(&self, buffer: RawBuffer) {
        self.state.lock().buffers.remove(&buffer);
    }

    fn copy_from_io_buffer(
        &self,
        buffer: RawBuffer,
        dest: &mut [u8],
        src_offset: usize,
        dst_offset: usize,
        count: usize,
    ) -> bool {
        let state = self.state.lock();
        let Some(mem) = state.buffers.get(&buffer) else {
            return false;
        };
        let Some((src, dst)) = copy_ranges(mem.len(), dest.len(), src_offset, dst_offset, count)
        else {
            return false;
        };
        dest[dst].copy_from_slice(&mem[src]);
        true
    }

    fn copy_to_io_buffer(
        &self,
        buffer: RawBuffer,
        src: &[u8],
        src_offset: usize,
        dst_offset: usize,
        count: usize,
    ) -> bool {
        let mut state = self.state.lock();
        let Some(mem) = state.buffers.get_mut(&buffer) else {
            return false;
        };
        let Some((from, to)) = copy_ranges(src.len(), mem.len(), src_offset, dst_offset, count)
        else {
            return false;
        };
        mem[to].copy_from_slice(&src[from]);
        true
    }

    fn lock_npu(&self) -> bool {
        let mut state = self.state.lock();
        if !state.initialized || state.npu_locked {
            return false;
        }
        state.npu_locked = true;
        true
    }

    fn unlock_npu(&self) -> bool {
        let mut state = self.state.lock();
        std::mem::replace(&mut state.npu_locked, false)
    }
}
