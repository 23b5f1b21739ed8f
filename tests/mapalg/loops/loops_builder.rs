use anyhow::Result;
use mapalg::{loop_vars, take_vars, DataType, LoopLowering, MapError, RasterOptions, ScalarValue};

use crate::common;

fn scalar_opts() -> RasterOptions {
    RasterOptions::default()
}

#[test]
fn counter_matches_manual_unroll() -> Result<()> {
    let (ctx, sim) = common::context();
    let start = common::raster_from_rows(&ctx, &sim, "start", DataType::F32, &[&[0.0, 1.0], &[2.0, 5.0]])?;

    let mut unrolled = start.clone();
    for _ in 0..3 {
        unrolled = (&unrolled + 1)?;
    }

    let mut vars = loop_vars!({ counter: start.clone() });
    let loop_node = ctx.while_loop(
        &mut vars,
        |v| v.raster("counter")?.lt(3),
        |v| {
            let next = (v.raster("counter")? + 1)?;
            v.set("counter", next)
        },
    )?;

    assert!(loop_node.is_some());
    let counter = vars.raster("counter")?;
    assert!(!counter.same_node(&start));
    common::assert_values(&sim, counter, &[3.0, 4.0, 5.0, 8.0])?;
    common::assert_close(&common::values(&sim, counter)?, &common::values(&sim, &unrolled)?)?;
    assert!(!LoopLowering::is_active());
    Ok(())
}

#[test]
fn host_guard_runs_natively() -> Result<()> {
    let (ctx, sim) = common::context();
    let before = sim.live_nodes();
    let mut vars = loop_vars!({ i: 0 });

    let loop_node = ctx.while_loop(
        &mut vars,
        |v| Ok(v.host("i")?.to_f64() < 3.0),
        |v| {
            let i = v.host("i")?.read::<i32>()?;
            v.set("i", i + 1)
        },
    )?;

    assert!(loop_node.is_none());
    assert_eq!(vars.host("i")?, ScalarValue::I32(3));
    assert_eq!(sim.live_nodes(), before);
    Ok(())
}

#[test]
fn two_carried_variables() -> Result<()> {
    let (ctx, _sim) = common::context();
    let mut vars = loop_vars!({
        a: ctx.constant(0.0f32, &scalar_opts())?,
        b: ctx.constant(1.0f32, &scalar_opts())?,
    });

    ctx.while_loop(
        &mut vars,
        |v| v.raster("a")?.lt(3),
        |v| {
            let a = (v.raster("a")? + 1)?;
            let b = (v.raster("b")? * 2)?;
            v.set("a", a)?;
            v.set("b", b)
        },
    )?;

    assert_eq!(vars.assigned(), ["a".to_string(), "b".to_string()]);
    take_vars!(vars, { a, b });
    assert!(!vars.contains("a"));
    assert_eq!(ctx.value(&a)?, ScalarValue::F32(3.0));
    assert_eq!(ctx.value(&b)?, ScalarValue::F32(8.0));
    Ok(())
}

#[test]
fn invariant_variable_keeps_its_node() -> Result<()> {
    let (ctx, _sim) = common::context();
    let step = ctx.constant(2.0f32, &scalar_opts())?;
    let mut vars = loop_vars!({
        total: ctx.constant(0.0f32, &scalar_opts())?,
        step: step.clone(),
    });

    ctx.while_loop(
        &mut vars,
        |v| v.raster("total")?.lt(7),
        |v| {
            let total = (v.raster("total")? + v.raster("step")?)?;
            v.set("total", total)
        },
    )?;

    assert!(vars.raster("step")?.same_node(&step));
    assert_eq!(ctx.value(vars.raster("total")?)?, ScalarValue::F32(8.0));
    Ok(())
}

#[test]
fn false_guard_keeps_initial_value() -> Result<()> {
    let (ctx, _sim) = common::context();
    let mut vars = loop_vars!({ a: ctx.constant(5.0f32, &scalar_opts())? });

    let loop_node = ctx.while_loop(
        &mut vars,
        |v| v.raster("a")?.lt(3),
        |v| {
            let a = (v.raster("a")? + 1)?;
            v.set("a", a)
        },
    )?;

    assert!(loop_node.is_some());
    assert_eq!(ctx.value(vars.raster("a")?)?, ScalarValue::F32(5.0));
    Ok(())
}

#[test]
fn detached_condition_is_rejected() -> Result<()> {
    let (ctx, _sim) = common::context();
    let always = ctx.trues(&scalar_opts())?;
    let mut vars = loop_vars!({ a: ctx.constant(0.0f32, &scalar_opts())? });

    let result = ctx.while_loop(
        &mut vars,
        |_| Ok(always.clone()),
        |v| {
            let a = (v.raster("a")? + 1)?;
            v.set("a", a)
        },
    );
    common::expect_kind(result, |e| matches!(e, MapError::MalformedLoop(_)))?;
    assert!(!LoopLowering::is_active());

    let mut vars = loop_vars!({ a: ctx.constant(0.0f32, &scalar_opts())? });
    ctx.while_loop(
        &mut vars,
        |v| v.raster("a")?.lt(2),
        |v| {
            let a = (v.raster("a")? + 1)?;
            v.set("a", a)
        },
    )?;
    assert_eq!(ctx.value(vars.raster("a")?)?, ScalarValue::F32(2.0));
    Ok(())
}

#[test]
fn unknown_variable_is_malformed() -> Result<()> {
    let mut vars = loop_vars!({ a: 1 });
    common::expect_kind(vars.set("b", 2), |e| matches!(e, MapError::MalformedLoop(_)))
}
