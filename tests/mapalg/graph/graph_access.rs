use anyhow::Result;
use mapalg::{DataType, MapError, NumDim, ScalarValue};

use crate::common;

const ROWS: &[&[f64]] = &[&[1.0, 2.0], &[3.0, 4.0]];

#[test]
fn get_reads_one_cell() -> Result<()> {
    let (ctx, sim) = common::context();
    let r = common::raster_from_rows(&ctx, &sim, "r", DataType::F32, ROWS)?;
    let cell = r.get([1, 0])?;
    assert_eq!(cell.num_dim()?, NumDim::D0);
    assert_eq!(ctx.value(&cell)?, ScalarValue::F32(3.0));

    common::expect_kind(r.get([2, 0]), |e| matches!(e, MapError::InvalidShape(_)))
}

#[test]
fn set_rebinds_only_the_target() -> Result<()> {
    let (ctx, sim) = common::context();
    let r = common::raster_from_rows(&ctx, &sim, "r", DataType::F32, ROWS)?;
    let mut written = r.clone();
    written.set([0, 1], 9)?;

    assert!(!written.same_node(&r));
    assert_eq!(written.dtype()?, DataType::F32);
    common::assert_values(&sim, &written, &[1.0, 9.0, 3.0, 4.0])?;
    common::assert_values(&sim, &r, &[1.0, 2.0, 3.0, 4.0])?;
    assert_eq!(sim.ref_count(r.ptr()), Some(1));
    Ok(())
}

#[test]
fn mask_read_and_write() -> Result<()> {
    let (ctx, sim) = common::context();
    let r = common::raster_from_rows(&ctx, &sim, "r", DataType::F32, ROWS)?;
    let big = r.gt(2)?;

    let masked = r.mask(&big)?;
    common::assert_values(&sim, &masked, &[0.0, 0.0, 3.0, 4.0])?;

    let mut cleared = r.clone();
    cleared.set_where(&big, 0)?;
    common::assert_values(&sim, &cleared, &[1.0, 2.0, 0.0, 0.0])?;
    Ok(())
}

#[test]
fn neighbor_pads_with_zero() -> Result<()> {
    let (ctx, sim) = common::context();
    let r = common::raster_from_rows(&ctx, &sim, "r", DataType::F32, ROWS)?;
    let right = r.neighbor([0, 1])?;
    common::assert_values(&sim, &right, &[2.0, 0.0, 4.0, 0.0])?;
    let up = r.neighbor([-1, 0])?;
    common::assert_values(&sim, &up, &[0.0, 0.0, 1.0, 2.0])?;
    Ok(())
}

#[test]
fn index_and_bounded_neighbor() -> Result<()> {
    let (ctx, sim) = common::context();
    let r = common::raster_from_rows(&ctx, &sim, "r", DataType::F32, ROWS)?;
    let rows = ctx.index(&r, NumDim::D1)?;
    let cols = ctx.index(&r, NumDim::D2)?;
    assert_eq!(rows.dtype()?, DataType::S32);
    common::assert_values(&sim, &rows, &[0.0, 0.0, 1.0, 1.0])?;
    common::assert_values(&sim, &cols, &[0.0, 1.0, 0.0, 1.0])?;

    let shifted = (&cols + 1)?;
    let clamped = r.bounded_neighbor(&rows, &shifted)?;
    common::assert_values(&sim, &clamped, &[2.0, 2.0, 4.0, 4.0])?;

    common::expect_kind(r.bounded_neighbor(&r, &r), |e| {
        matches!(e, MapError::TypeMismatch(_))
    })?;
    let scalar = ctx.constant(1.0f32, &Default::default())?;
    common::expect_kind(ctx.index(&scalar, NumDim::D1), |e| {
        matches!(e, MapError::InvalidShape(_))
    })
}
