use anyhow::{anyhow, Result};
use mapalg::{loop_vars, Engine, LoopLowering, MapConfig, MapError, RasterOptions, ScalarValue};

use crate::common;

#[test]
fn manual_protocol() -> Result<()> {
    let (ctx, sim) = common::context();
    let c0 = ctx.constant(0.0f32, &RasterOptions::default())?;

    let mut lowering = LoopLowering::start(&c0.lt(3)?)?;
    assert!(LoopLowering::is_active());
    let c1 = (&c0 + 1)?;
    lowering.again(&c1.lt(3)?)?;
    let c2 = (&c1 + 1)?;
    let _tail = c2.lt(3)?;

    let loop_node = lowering.assemble()?;
    let carried = lowering.carried(&loop_node)?;
    assert_eq!(carried.len(), 2);
    assert!(carried.pre_nodes().any(|pre| pre == c2.ptr()));
    let post = carried
        .post_for(c2.ptr())
        .cloned()
        .ok_or_else(|| anyhow!("no post-loop node for {}", c2.ptr()))?;
    lowering.finish()?;

    assert!(!LoopLowering::is_active());
    assert_eq!(ctx.value(&post)?, ScalarValue::F32(3.0));
    assert_eq!(ctx.value(&loop_node)?, ScalarValue::Bool(false));

    drop((c1, c2, _tail, loop_node, carried));
    assert_eq!(sim.ref_count(post.ptr()), Some(1));
    Ok(())
}

#[test]
fn nested_lowering_is_rejected() -> Result<()> {
    let (ctx, _sim) = common::context();
    let guard = ctx.trues(&RasterOptions::default())?;
    let outer = LoopLowering::start(&guard)?;

    common::expect_kind(LoopLowering::start(&guard), |e| {
        matches!(e, MapError::UnsupportedLoopContext(_))
    })?;

    let mut vars = loop_vars!({ a: ctx.constant(0.0f32, &RasterOptions::default())? });
    let nested = ctx.while_loop(
        &mut vars,
        |v| v.raster("a")?.lt(3),
        |v| {
            let a = (v.raster("a")? + 1)?;
            v.set("a", a)
        },
    );
    common::expect_kind(nested, |e| matches!(e, MapError::UnsupportedLoopContext(_)))?;

    drop(outer);
    assert!(!LoopLowering::is_active());
    Ok(())
}

#[test]
fn iteration_limit_stops_evaluation() -> Result<()> {
    let (ctx, _sim) = common::context_with(MapConfig::default().with_max_loop_iterations(10));
    let mut vars = loop_vars!({ a: ctx.constant(0.0f32, &RasterOptions::default())? });

    ctx.while_loop(
        &mut vars,
        |v| v.raster("a")?.lt(100),
        |v| {
            let a = (v.raster("a")? + 1)?;
            v.set("a", a)
        },
    )?;

    common::expect_kind(ctx.value(vars.raster("a")?), |e| matches!(e, MapError::Engine(_)))
}

#[test]
fn assemble_without_start_is_malformed() -> Result<()> {
    let (ctx, _sim) = common::context();
    let engine = ctx.engine();
    common::expect_kind(engine.loop_assemble(), |e| matches!(e, MapError::MalformedLoop(_)))?;
    common::expect_kind(engine.loop_again(), |e| matches!(e, MapError::MalformedLoop(_)))
}

#[test]
fn engine_rejects_a_second_open_loop() -> Result<()> {
    let (ctx, _sim) = common::context();
    let engine = ctx.engine();
    engine.loop_start()?;
    common::expect_kind(engine.loop_start(), |e| matches!(e, MapError::MalformedLoop(_)))?;
    engine.loop_end()?;
    engine.loop_start()?;
    engine.loop_end()
}
