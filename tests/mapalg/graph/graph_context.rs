use anyhow::Result;
use mapalg::{
    DataType, DeviceType, MapError, MemOrder, NumDim, RasterOptions, ScalarValue, ShapeVector,
    StreamDir,
};

use crate::common;

#[test]
fn constant_builders() -> Result<()> {
    let (ctx, sim) = common::context();
    let opts = common::opts(2, 3)?;

    let zeros = ctx.zeros(&opts)?;
    assert_eq!(zeros.dtype()?, DataType::F32);
    assert_eq!(zeros.data_size()?, ShapeVector::new(&[2, 3])?);
    common::assert_values(&sim, &zeros, &[0.0; 6])?;

    let sevens = ctx.full(7, &opts.with_dtype(DataType::U8))?;
    assert_eq!(sevens.dtype()?, DataType::U8);
    common::assert_values(&sim, &sevens, &[7.0; 6])?;

    let trues = ctx.trues(&opts)?;
    assert_eq!(trues.dtype()?, DataType::B8);
    common::assert_values(&sim, &trues, &[1.0; 6])?;
    common::assert_values(&sim, &ctx.falses(&opts)?, &[0.0; 6])?;

    let like = ctx.ones_like(&zeros, Some(DataType::S32))?;
    assert_eq!(like.dtype()?, DataType::S32);
    assert_eq!(like.data_size()?, zeros.data_size()?);
    common::assert_values(&sim, &like, &[1.0; 6])?;

    let filled = ctx.full_like(-2.5, &zeros, None)?;
    common::assert_values(&sim, &filled, &[-2.5; 6])?;
    Ok(())
}

#[test]
fn node_queries() -> Result<()> {
    let (ctx, sim) = common::context();
    let opts = common::opts(2, 2)?.with_order(MemOrder::ROW);
    let r = ctx.zeros(&opts)?;

    assert!(r.id()? > 0);
    assert!(r.name()?.starts_with("Constant"));
    assert_eq!(r.num_dim()?, NumDim::D2);
    assert_eq!(r.mem_order()?, MemOrder::ROW);
    assert!(r.block_size()?.is_unset());
    assert!(r.group_size()?.is_unset());
    assert_eq!(r.stream_dir()?, StreamDir::None);

    let read = common::raster_from_rows(&ctx, &sim, "in", DataType::F64, &[&[1.0]])?;
    assert_eq!(read.stream_dir()?, StreamDir::In);
    assert_eq!(read.mem_order()?, MemOrder::default());
    Ok(())
}

#[test]
fn seeded_rand_is_deterministic() -> Result<()> {
    let (ctx, sim) = common::context();
    let opts = common::opts(3, 3)?;
    let first = common::values(&sim, &ctx.rand(42, Some(&opts))?)?;
    let second = common::values(&sim, &ctx.rand(42, Some(&opts))?)?;
    let other = common::values(&sim, &ctx.rand(7, Some(&opts))?)?;

    assert_eq!(first, second);
    assert_ne!(first, other);
    assert!(first.iter().all(|v| (0.0..1.0).contains(v)));

    let seeds = ctx.index(&ctx.zeros(&opts)?, NumDim::D2)?;
    let dice = ctx.rand(&seeds, Some(&opts.with_dtype(DataType::U8)))?;
    assert_eq!(dice.dtype()?, DataType::U8);

    let blocked = ctx.zeros(&opts.with_dtype(DataType::F64).with_block(&[2, 2])?)?;
    let inherited = ctx.rand(&blocked, None)?;
    assert_eq!(inherited.dtype()?, DataType::F64);
    assert_eq!(inherited.data_size()?, blocked.data_size()?);
    assert_eq!(inherited.block_size()?, blocked.block_size()?);
    assert_eq!(inherited.mem_order()?, blocked.mem_order()?);

    let host = ctx.rand(ScalarValue::F64(0.5), None)?;
    assert_eq!(host.dtype()?, DataType::F64);
    Ok(())
}

#[test]
fn devices_and_ranks() -> Result<()> {
    let (ctx, sim) = common::context();
    ctx.setup_devices("host", DeviceType::CPU | DeviceType::GPU, "")?;
    let Some((platform, devices, _)) = sim.devices() else {
        anyhow::bail!("devices were not recorded");
    };
    assert_eq!(platform, "host");
    assert!(devices.contains(DeviceType::GPU));
    assert_eq!(DeviceType::CUSTOM.bits(), 1 << 4);
    assert!(!DeviceType::CUSTOM.contains(DeviceType::CPU));

    ctx.set_num_ranks(4)?;
    assert_eq!(sim.ranks(), 4);
    common::expect_kind(ctx.set_num_ranks(0), |e| matches!(e, MapError::Engine(_)))
}

#[test]
fn value_needs_zero_rank() -> Result<()> {
    let (ctx, _sim) = common::context();
    let scalar = ctx.constant(ScalarValue::U16(9), &RasterOptions::default().with_dtype(DataType::U16))?;
    assert_eq!(ctx.value(&scalar)?, ScalarValue::U16(9));

    let grid = ctx.zeros(&common::opts(2, 2)?)?;
    ctx.eval(&[&grid, &scalar])?;
    common::expect_kind(ctx.value(&grid), |e| matches!(e, MapError::InvalidShape(_)))
}
