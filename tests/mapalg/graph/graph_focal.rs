use anyhow::Result;
use mapalg::{
    block_stats, convolve, fmax, fsum, rsum, stats, zmax, zor, zsum, DataType, Kernel, NumDim,
    ReductionOp, ScalarValue, StatsInputs,
};

use crate::common;

const NINE: &[&[f64]] = &[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], &[7.0, 8.0, 9.0]];

#[test]
fn fsum_counts_neighbourhoods() -> Result<()> {
    let (ctx, sim) = common::context();
    let ones = ctx.ones(&common::opts(3, 3)?)?;
    let sums = fsum(&ones)?;
    common::assert_values(&sim, &sums, &[4.0, 6.0, 4.0, 6.0, 9.0, 6.0, 4.0, 6.0, 4.0])?;
    Ok(())
}

#[test]
fn convolve_is_centered() -> Result<()> {
    let (ctx, sim) = common::context();
    let r = common::raster_from_rows(&ctx, &sim, "nine", DataType::F32, NINE)?;
    let kernel = Kernel::from_rows([[0, 0, 0], [0, 0, 1], [0, 0, 0]])?;
    let shifted = convolve(&r, &kernel)?;
    assert_eq!(shifted.dtype()?, DataType::F32);
    common::assert_values(&sim, &shifted, &[2.0, 3.0, 0.0, 5.0, 6.0, 0.0, 8.0, 9.0, 0.0])?;
    Ok(())
}

#[test]
fn focal_max_ignores_outside_cells() -> Result<()> {
    let (ctx, sim) = common::context();
    let r = common::raster_from_rows(&ctx, &sim, "nine", DataType::F32, NINE)?;
    let peaks = fmax(&r, &Kernel::ones(3)?)?;
    common::assert_values(&sim, &peaks, &[5.0, 6.0, 6.0, 8.0, 9.0, 9.0, 8.0, 9.0, 9.0])?;
    Ok(())
}

#[test]
fn zonal_reductions() -> Result<()> {
    let (ctx, sim) = common::context();
    let r = common::raster_from_rows(&ctx, &sim, "nine", DataType::F32, NINE)?;

    let total = zsum(&r, None)?;
    assert_eq!(total.num_dim()?, NumDim::D0);
    assert_eq!(ctx.value(&total)?, ScalarValue::F32(45.0));

    let upper = zsum(&r, Some(&r.gt(5)?))?;
    assert_eq!(ctx.value(&upper)?, ScalarValue::F32(30.0));
    assert_eq!(ctx.value(&zmax(&r)?)?, ScalarValue::F32(9.0));

    let any_big = zor(&r.gt(8)?, None)?;
    assert_eq!(ctx.value(&any_big)?, ScalarValue::Bool(true));
    Ok(())
}

#[test]
fn radial_scan_follows_lines() -> Result<()> {
    let (ctx, sim) = common::context();
    let r = common::raster_from_rows(&ctx, &sim, "nine", DataType::F32, NINE)?;
    let scanned = common::values(&sim, &rsum(&r, [0, 0])?)?;
    assert_eq!(scanned[0], 1.0);
    assert_eq!(scanned[2], 6.0);
    assert_eq!(scanned[8], 15.0);
    Ok(())
}

#[test]
fn block_statistics_per_block() -> Result<()> {
    let (ctx, sim) = common::context();
    let opts = common::opts(4, 4)?.with_block(&[2, 2])?;
    let base = ctx.zeros(&opts)?;
    let rows = ctx.index(&base, NumDim::D1)?;
    assert_eq!(rows.block_size()?.to_vec(), vec![2, 2]);

    let peaks = block_stats(&rows, ReductionOp::Max)?;
    assert_eq!(peaks.data_size()?.to_vec(), vec![2, 2]);
    common::assert_values(&sim, &peaks, &[1.0, 1.0, 3.0, 3.0])?;

    let described = stats(&rows, StatsInputs::default())?;
    assert_eq!(common::values(&sim, &described)?, common::values(&sim, &rows)?);
    let described = ctx.stats(&rows, None, Some(peaks.clone()), None, None)?;
    assert_eq!(described.dtype()?, DataType::S32);
    Ok(())
}
