//! One-call inference on raw byte tensors.

use std::time::Instant;

use tracing::debug;

use super::{Attachment, IoBuffer, Network, Session};
use crate::error::{Result, SynapError};

/// Timing of an [`infer`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceResult {
    /// Time spent preparing the network and binding buffers, in milliseconds.
    pub load_ms: f64,
    /// Time spent in the network run, in milliseconds.
    pub run_ms: f64,
}

/// An io buffer together with its binding. Field order matters: the
/// attachment is dropped before the buffer it refers to.
struct BoundBuffer {
    attachment: Attachment,
    buffer: IoBuffer,
}

fn slot_index(i: usize) -> Result<u32> {
    u32::try_from(i).map_err(|_| SynapError::slot_binding(format!("Slot index {} too large", i)))
}

/// A network with one io buffer bound to each of its slots.
///
/// Useful to run the same model several times without rebuilding the
/// bindings. Dropping it (or calling [`PreparedInference::release`])
/// releases the network first and the buffers after.
pub struct PreparedInference {
    network: Network,
    inputs: Vec<BoundBuffer>,
    outputs: Vec<BoundBuffer>,
}

impl PreparedInference {
    /// Load `model`, bind one buffer per input (filled with that input's
    /// bytes) and one buffer per output size.
    ///
    /// # Errors
    ///
    /// Fails with the error of the first step that fails; everything
    /// allocated up to that point is released.
    pub fn new<I: AsRef<[u8]>>(
        session: &Session,
        model: &[u8],
        inputs: &[I],
        output_sizes: &[usize],
    ) -> Result<Self> {
        let network = session.create_network(model)?;

        let mut bound_inputs = Vec::with_capacity(inputs.len());
        for (i, data) in inputs.iter().enumerate() {
            let data = data.as_ref();
            let mut buffer = session.create_io_buffer(data.len())?;
            let mut attachment = network.attach_io_buffer(&buffer)?;
            attachment.use_as_input(slot_index(i)?)?;
            buffer.copy_from_buffer(data, 0, 0, data.len())?;
            bound_inputs.push(BoundBuffer { attachment, buffer });
        }

        let mut bound_outputs = Vec::with_capacity(output_sizes.len());
        for (i, &size) in output_sizes.iter().enumerate() {
            let buffer = session.create_io_buffer(size)?;
            let mut attachment = network.attach_io_buffer(&buffer)?;
            attachment.use_as_output(slot_index(i)?)?;
            bound_outputs.push(BoundBuffer { attachment, buffer });
        }

        debug!(
            "Prepared network with {} inputs and {} outputs",
            bound_inputs.len(),
            bound_outputs.len()
        );
        Ok(Self {
            network,
            inputs: bound_inputs,
            outputs: bound_outputs,
        })
    }

    /// Number of bound inputs.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of bound outputs.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Byte size of each output buffer.
    pub fn output_sizes(&self) -> Vec<usize> {
        self.outputs.iter().map(|o| o.buffer.len()).collect()
    }

    /// Overwrite the input buffers with new data.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::Copy`] if the number of inputs differs or a
    /// copy fails.
    pub fn set_inputs<I: AsRef<[u8]>>(&mut self, inputs: &[I]) -> Result<()> {
        if inputs.len() != self.inputs.len() {
            return Err(SynapError::copy(format!(
                "Expected {} inputs, got {}",
                self.inputs.len(),
                inputs.len()
            )));
        }
        for (bound, data) in self.inputs.iter_mut().zip(inputs) {
            let data = data.as_ref();
            bound.buffer.copy_from_buffer(data, 0, 0, data.len())?;
        }
        Ok(())
    }

    /// Run the network once.
    pub fn run(&self) -> Result<()> {
        self.network.run()
    }

    /// Copy every output buffer into the matching caller array.
    ///
    /// # Errors
    ///
    /// Returns [`SynapError::Copy`] if the number of outputs differs or a
    /// copy fails.
    pub fn read_outputs<O: AsMut<[u8]>>(&self, outputs: &mut [O]) -> Result<()> {
        if outputs.len() != self.outputs.len() {
            return Err(SynapError::copy(format!(
                "Expected {} outputs, got {}",
                self.outputs.len(),
                outputs.len()
            )));
        }
        for (bound, dest) in self.outputs.iter().zip(outputs.iter_mut()) {
            let dest = dest.as_mut();
            let count = dest.len();
            bound.buffer.copy_to_buffer(dest, 0, 0, count)?;
        }
        Ok(())
    }

    /// Run the network and copy its outputs into `outputs`.
    ///
    /// `outputs` is left untouched if the run fails.
    pub fn run_into<O: AsMut<[u8]>>(&self, outputs: &mut [O]) -> Result<()> {
        self.run()?;
        self.read_outputs(outputs)
    }

    /// Release the network (and with it every attachment), then every buffer.
    pub fn release(mut self) {
        self.network.release();
        for bound in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            bound.attachment.release();
            bound.buffer.release();
        }
    }
}

/// Run `model` once on `inputs`, writing the results into `outputs`.
///
/// One io buffer is created per input and per output, sized to the
/// matching array. Outputs are written only if the run succeeds. The
/// first failing step aborts the call; resources created so far are
/// released before returning.
///
/// # Example
///
/// ```
/// use synap_rs::{infer, Backend, Session};
/// use synap_rs::device::SimulatedModel;
///
/// let session = Session::open(Backend::Simulated)?;
/// let model = SimulatedModel::new(vec![4], vec![4]).to_bytes();
/// let mut output = [0u8; 4];
/// infer(&session, &model, &[[1u8, 2, 3, 4]], &mut [&mut output[..]])?;
/// assert_eq!(output, [1, 2, 3, 4]);
/// # Ok::<(), synap_rs::SynapError>(())
/// ```
pub fn infer<I: AsRef<[u8]>, O: AsMut<[u8]>>(
    session: &Session,
    model: &[u8],
    inputs: &[I],
    outputs: &mut [O],
) -> Result<InferenceResult> {
    let output_sizes: Vec<usize> = outputs.iter_mut().map(|o| o.as_mut().len()).collect();

    let load = Instant::now();
    let prepared = PreparedInference::new(session, model, inputs, &output_sizes)?;
    let load_ms = load.elapsed().as_secs_f64() * 1e3;

    let run = Instant::now();
    prepared.run()?;
    let run_ms = run.elapsed().as_secs_f64() * 1e3;

    prepared.read_outputs(outputs)?;
    prepared.release();

    Ok(InferenceResult { load_ms, run_ms })
}
