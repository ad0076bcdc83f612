//! Handle lifecycle through the public API, against the simulated driver.

use anyhow::Result;
use std::sync::Arc;
use synap_rs::device::{SimulatedDriver, SimulatedModel};
use synap_rs::{infer, Session, SlotRole, SynapError};

fn open() -> Result<(Arc<SimulatedDriver>, Session)> {
    let driver = Arc::new(SimulatedDriver::new());
    let session = Session::with_driver(driver.clone())?;
    Ok((driver, session))
}

#[test]
fn shared_driver_cannot_tear_down_a_live_session() -> Result<()> {
    let (driver, first) = open()?;
    assert!(matches!(
        Session::with_driver(driver.clone()),
        Err(SynapError::Connection(_))
    ));

    let (other_driver, second) = open()?;
    let network = second.create_network(&SimulatedModel::new(vec![4], vec![4]).to_bytes())?;
    let buffer = second.create_io_buffer(4)?;
    drop(first);

    assert_eq!(driver.stats().deinits, 1);
    assert_eq!(other_driver.stats().deinits, 0);
    let _attachment = network.attach_io_buffer(&buffer)?;
    second.create_io_buffer(4)?;
    Ok(())
}

#[test]
fn infer_creates_one_buffer_and_attachment_per_slot() -> Result<()> {
    let (driver, session) = open()?;
    let inputs = vec![vec![1u8; 3], vec![2u8; 5], vec![3u8; 1]];
    let mut outputs = vec![vec![0u8; 2], vec![0u8; 7]];
    let model = SimulatedModel::new(vec![3, 5, 1], vec![2, 7]).to_bytes();

    infer(&session, &model, &inputs, &mut outputs)?;

    let stats = driver.stats();
    assert_eq!(stats.networks_created, 1);
    assert_eq!(stats.buffers_created, 5);
    assert_eq!(stats.attachments_created, 5);
    assert_eq!(stats.runs, 1);
    assert_eq!(stats.live_networks + stats.live_buffers + stats.live_attachments, 0);
    assert_eq!(outputs, vec![vec![1, 1], vec![2; 7]]);
    Ok(())
}

#[test]
fn manual_wiring_preserves_engine_bytes() -> Result<()> {
    let (_driver, session) = open()?;
    let mut network = session.create_network(&SimulatedModel::new(vec![4], vec![4]).to_bytes())?;

    let mut input = session.create_io_buffer(4)?;
    let mut output = session.create_io_buffer(4)?;
    let mut a_in = network.attach_io_buffer(&input)?;
    let mut a_out = network.attach_io_buffer(&output)?;
    a_in.use_as_input(0)?;
    a_out.use_as_output(0)?;
    assert_eq!(a_in.role(), Some(SlotRole::Input(0)));
    assert_eq!(a_out.role(), Some(SlotRole::Output(0)));

    input.copy_from_buffer(&[1, 2, 3, 4], 0, 0, 4)?;
    network.run()?;

    let mut result = [0u8; 4];
    output.copy_to_buffer(&mut result, 0, 0, 4)?;
    assert_eq!(result, [1, 2, 3, 4]);

    network.release();
    input.release();
    output.release();
    Ok(())
}

#[test]
fn released_network_invalidates_attachments() -> Result<()> {
    let (driver, session) = open()?;
    let mut network = session.create_network(&SimulatedModel::new(vec![4], vec![4]).to_bytes())?;
    let buffer = session.create_io_buffer(4)?;
    let mut attachment = network.attach_io_buffer(&buffer)?;

    network.release();
    network.release();

    assert_eq!(driver.stats().live_attachments, 0);
    assert!(attachment.is_released());
    for _ in 0..2 {
        assert!(matches!(
            attachment.use_as_output(0),
            Err(SynapError::Released(_))
        ));
    }
    Ok(())
}

#[test]
fn run_with_unbound_output_fails() -> Result<()> {
    let (_driver, session) = open()?;
    let network = session.create_network(&SimulatedModel::new(vec![4], vec![4]).to_bytes())?;
    let mut input = session.create_io_buffer(4)?;
    let mut attachment = network.attach_io_buffer(&input)?;
    attachment.use_as_input(0)?;
    input.copy_from_buffer(&[0; 4], 0, 0, 4)?;

    assert!(matches!(network.run(), Err(SynapError::Execution(_))));
    Ok(())
}

#[test]
fn invalid_slot_index_aborts_before_run() -> Result<()> {
    let (driver, session) = open()?;
    // Two outputs declared by the caller, one by the model.
    let model = SimulatedModel::new(vec![4], vec![4]).to_bytes();
    let mut outputs = vec![vec![0u8; 4], vec![0u8; 4]];

    let err = infer(&session, &model, &[vec![0u8; 4]], &mut outputs).unwrap_err();

    assert!(matches!(err, SynapError::SlotBinding(_)));
    assert_eq!(driver.stats().runs, 0);
    assert_eq!(driver.stats().live_buffers, 0);
    Ok(())
}

#[test]
fn resources_outlive_session_value() -> Result<()> {
    let (driver, session) = open()?;
    let network = session.create_network(&SimulatedModel::new(vec![2], vec![2]).to_bytes())?;
    let mut input = session.create_io_buffer(2)?;
    let output = session.create_io_buffer(2)?;
    drop(session);

    let mut a_in = network.attach_io_buffer(&input)?;
    let mut a_out = network.attach_io_buffer(&output)?;
    a_in.use_as_input(0)?;
    a_out.use_as_output(0)?;
    input.copy_from_buffer(&[5, 6], 0, 0, 2)?;
    network.run()?;
    assert_eq!(driver.stats().deinits, 0);

    drop((a_in, a_out, network, input, output));
    assert_eq!(driver.stats().deinits, 1);
    Ok(())
}
