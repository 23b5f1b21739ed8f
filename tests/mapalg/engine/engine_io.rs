use std::fs;

use anyhow::Result;
use mapalg::{DataType, MapConfig, MapError, StreamDir};

use crate::common;

#[test]
fn write_then_read_back() -> Result<()> {
    let (ctx, sim) = common::context();
    let input = common::raster_from_rows(&ctx, &sim, "dem", DataType::F32, &[&[1.0, 2.0], &[3.0, 4.0]])?;
    let doubled = (&input * 2)?;

    ctx.write(&doubled, "doubled")?;
    assert_eq!(doubled.stream_dir()?, StreamDir::Out);
    let stored = sim.resource("doubled").map(|grid| grid.values().to_vec());
    assert_eq!(stored, Some(vec![2.0, 4.0, 6.0, 8.0]));

    let back = ctx.read("doubled")?;
    assert_eq!(back.stream_dir()?, StreamDir::In);
    assert_eq!(back.dtype()?, DataType::F32);
    common::assert_values(&sim, &back, &[2.0, 4.0, 6.0, 8.0])
}

#[test]
fn protected_resource_reports_status() -> Result<()> {
    let (ctx, sim) = common::context();
    sim.protect("locked");
    let zeros = ctx.zeros(&common::opts(1, 1)?)?;

    let err = match ctx.write(&zeros, "locked") {
        Ok(()) => anyhow::bail!("write to a protected resource succeeded"),
        Err(err) => err,
    };
    match mapalg::error_kind(&err) {
        Some(MapError::EngineWriteFailure { resource, status }) => {
            assert_eq!(resource, "locked");
            assert_eq!(*status, 1);
        }
        other => anyhow::bail!("unexpected error kind {other:?}"),
    }
    assert!(sim.resource("locked").is_none());
    assert_eq!(zeros.stream_dir()?, StreamDir::None);
    Ok(())
}

#[test]
fn unknown_resource_is_an_engine_fault() -> Result<()> {
    let (ctx, _sim) = common::context();
    common::expect_kind(ctx.read("missing"), |e| matches!(e, MapError::Engine(_)))
}

#[test]
fn resources_persist_in_resource_dir() -> Result<()> {
    let dir = std::env::temp_dir().join(format!("mapalg-resources-{}", std::process::id()));
    fs::create_dir_all(&dir)?;
    let config = MapConfig::default().with_resource_dir(&dir);

    let (ctx, _sim) = common::context_with(config.clone());
    let ones = ctx.ones(&common::opts(2, 2)?.with_dtype(DataType::S16))?;
    ctx.write(&ones, "saved")?;
    assert!(dir.join("saved.json").exists());

    let (fresh, fresh_sim) = common::context_with(config);
    let loaded = fresh.read("saved")?;
    assert_eq!(loaded.dtype()?, DataType::S16);
    common::assert_values(&fresh_sim, &loaded, &[1.0; 4])?;

    fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn eval_many_then_query() -> Result<()> {
    let (ctx, sim) = common::context();
    let a = ctx.full(3, &common::opts(1, 2)?)?;
    let b = (&a - 1)?;
    let c = (&a * &b)?;
    ctx.eval(&[&b, &c])?;
    common::assert_values(&sim, &b, &[2.0, 2.0])?;
    common::assert_values(&sim, &c, &[6.0, 6.0])
}
