use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use synap_rs::{infer, Backend, Session};

fn fixture(name: &str) -> Result<PathBuf> {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let path = manifest_dir.join("../tests/fixtures").join(name);
    if !path.exists() {
        bail!("Missing test fixture at {}", path.display());
    }
    Ok(path)
}

#[test]
fn infer_passthrough_model_outputs() -> Result<()> {
    let model = std::fs::read(fixture("passthrough_model.synap")?)?;
    let session =
        Session::open(Backend::Simulated).context("Failed to open simulated session")?;

    let mut outputs = vec![vec![0u8; 4]];
    infer(&session, &model, &[vec![1u8, 2, 3, 4]], &mut outputs)?;

    assert_eq!(outputs.len(), 1, "expected 1 output");
    assert_eq!(outputs[0], vec![1, 2, 3, 4]);
    Ok(())
}

#[test]
fn infer_invert_model_outputs() -> Result<()> {
    let model = std::fs::read(fixture("invert_model.synap")?)?;
    let session = Session::open(Backend::Simulated)?;

    let inputs = vec![vec![0x00u8, 0x01, 0x02, 0x03], vec![0xf0, 0x0f]];
    let mut outputs = vec![vec![0u8; 4], vec![0u8; 6]];
    infer(&session, &model, &inputs, &mut outputs)?;

    assert_eq!(outputs[0], vec![0xff, 0xfe, 0xfd, 0xfc]);
    assert_eq!(outputs[1], vec![0x0f, 0xf0, 0x0f, 0xf0, 0x0f, 0xf0]);
    Ok(())
}

#[test]
fn load_network_from_fixture() -> Result<()> {
    let session = Session::open(Backend::Simulated)?;
    let mut network = session.load_network(fixture("passthrough_model.synap")?)?;
    assert!(!network.is_released());
    network.release();
    assert!(network.is_released());
    Ok(())
}
