use anyhow::Result;
use mapalg::{map_while, DataType, RasterOptions, ScalarValue};

use crate::common;

#[test]
fn counter_macro_matches_manual_unroll() -> Result<()> {
    let (ctx, sim) = common::context();
    let start = common::raster_from_rows(&ctx, &sim, "start", DataType::F32, &[&[0.0, 1.0], &[2.0, 5.0]])?;

    let mut unrolled = start.clone();
    for _ in 0..3 {
        unrolled = (&unrolled + 1)?;
    }

    let mut counter = start.clone();
    let loop_node = map_while!(while counter.lt(3) {
        counter = (&counter + 1)?;
    });

    assert!(loop_node.is_some());
    common::assert_close(&common::values(&sim, &counter)?, &common::values(&sim, &unrolled)?)?;
    common::assert_values(&sim, &start, &[0.0, 1.0, 2.0, 5.0])?;
    Ok(())
}

#[test]
fn host_condition_runs_natively() -> Result<()> {
    let mut total = 0;
    let mut i = 0;
    let loop_node = map_while!(while i < 4 {
        total += i;
        i += 1;
    });

    assert!(loop_node.is_none());
    assert_eq!(total, 6);
    assert_eq!(i, 4);
    Ok(())
}

#[test]
fn cell_writes_are_carried() -> Result<()> {
    let (ctx, sim) = common::context();
    let mut grid = ctx.zeros(&common::opts(1, 3)?)?;
    let mut count = ctx.zeros(&RasterOptions::default())?;

    map_while!(while count.lt(3) {
        grid.set([0, 0], &count)?;
        count = (&count + 1)?;
    });

    common::assert_values(&sim, &grid, &[2.0, 0.0, 0.0])?;
    assert_eq!(ctx.value(&count)?, ScalarValue::F32(3.0));
    Ok(())
}
