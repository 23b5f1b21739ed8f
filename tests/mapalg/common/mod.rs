#![allow(dead_code)]

use std::rc::Rc;

use anyhow::{anyhow, Result};
use mapalg::{
    error_kind, DataType, Engine, Grid, MapConfig, MapContext, MapError, Raster, RasterOptions,
    Simulator,
};

const ABS_TOL: f64 = 1e-5;

pub fn context() -> (MapContext, Rc<Simulator>) {
    context_with(MapConfig::default())
}

pub fn context_with(config: MapConfig) -> (MapContext, Rc<Simulator>) {
    let sim = Rc::new(Simulator::new(&config));
    let engine: Rc<dyn Engine> = sim.clone();
    (MapContext::new(engine, config), sim)
}

pub fn opts(rows: i32, cols: i32) -> Result<RasterOptions> {
    RasterOptions::sized(&[rows, cols])
}

/// Publishes `rows` as a named resource and reads it back as a raster.
pub fn raster_from_rows(
    ctx: &MapContext,
    sim: &Simulator,
    name: &str,
    dtype: DataType,
    rows: &[&[f64]],
) -> Result<Raster> {
    let rows: Vec<Vec<f64>> = rows.iter().map(|row| row.to_vec()).collect();
    sim.insert_resource(name, Grid::from_rows(dtype, &rows)?);
    ctx.read(name)
}

pub fn values(sim: &Simulator, raster: &Raster) -> Result<Vec<f64>> {
    Ok(sim.grid(raster.ptr())?.values().to_vec())
}

pub fn assert_close(actual: &[f64], expected: &[f64]) -> Result<()> {
    if actual.len() != expected.len() {
        return Err(anyhow!(
            "length mismatch: actual {} expected {}",
            actual.len(),
            expected.len()
        ));
    }
    for (idx, (a, b)) in actual.iter().zip(expected).enumerate() {
        if (a - b).abs() > ABS_TOL {
            return Err(anyhow!("value mismatch at index {idx}: {a} vs {b}"));
        }
    }
    Ok(())
}

pub fn assert_values(sim: &Simulator, raster: &Raster, expected: &[f64]) -> Result<()> {
    assert_close(&values(sim, raster)?, expected)
}

/// Fails unless `result` is an error of the kind matched by `check`.
pub fn expect_kind<T>(result: Result<T>, check: fn(&MapError) -> bool) -> Result<()> {
    match result {
        Ok(_) => Err(anyhow!("expected an error, got Ok")),
        Err(err) => match error_kind(&err) {
            Some(kind) if check(kind) => Ok(()),
            _ => Err(anyhow!("unexpected error: {err:#}")),
        },
    }
}
