use anyhow::Result;
use mapalg::{MapError, NodePtr};

use crate::common;

#[test]
fn wrap_release_pairs_are_net_zero() -> Result<()> {
    let (ctx, sim) = common::context();
    let base = ctx.zeros(&common::opts(2, 2)?)?;
    let ptr = base.ptr();
    assert_eq!(sim.ref_count(ptr), Some(1));

    let handles = (0..5).map(|_| ctx.wrap(ptr)).collect::<Result<Vec<_>>>()?;
    assert_eq!(sim.ref_count(ptr), Some(6));
    drop(handles);
    assert_eq!(sim.ref_count(ptr), Some(1));

    let copy = base.clone();
    assert!(copy.same_node(&base));
    assert_eq!(sim.ref_count(ptr), Some(2));
    drop(copy);
    assert_eq!(sim.ref_count(ptr), Some(1));
    Ok(())
}

#[test]
fn rebind_moves_one_reference() -> Result<()> {
    let (ctx, sim) = common::context();
    let opts = common::opts(2, 2)?;
    let a = ctx.zeros(&opts)?;
    let b = ctx.ones(&opts)?;

    let mut handle = a.clone();
    assert_eq!(sim.ref_count(a.ptr()), Some(2));
    handle.rebind(b.ptr())?;
    assert_eq!(sim.ref_count(a.ptr()), Some(1));
    assert_eq!(sim.ref_count(b.ptr()), Some(2));

    handle.rebind(b.ptr())?;
    assert_eq!(sim.ref_count(b.ptr()), Some(2));

    drop(handle);
    assert_eq!(sim.ref_count(a.ptr()), Some(1));
    assert_eq!(sim.ref_count(b.ptr()), Some(1));
    Ok(())
}

#[test]
fn released_graphs_are_reclaimed() -> Result<()> {
    let (ctx, sim) = common::context();
    let live = sim.live_nodes();
    {
        let a = ctx.ones(&common::opts(2, 3)?)?;
        let b = (&a + 1)?;
        let c = (&b * &a)?;
        common::assert_values(&sim, &c, &[2.0; 6])?;
        assert!(sim.live_nodes() > live);
    }
    assert_eq!(sim.live_nodes(), live);
    Ok(())
}

#[test]
fn intermediates_stay_alive_while_used() -> Result<()> {
    let (ctx, sim) = common::context();
    let a = ctx.full(4.0f32, &common::opts(1, 2)?)?;
    let sum = {
        let doubled = (&a * 2)?;
        (&doubled + 1)?
    };
    common::assert_values(&sim, &sum, &[9.0, 9.0])?;
    Ok(())
}

#[test]
fn empty_placeholder_never_touches_engine() -> Result<()> {
    let (ctx, sim) = common::context();
    let live = sim.live_nodes();
    let empty = ctx.empty();
    assert!(empty.is_empty());
    assert!(empty.ptr().is_null());
    let copy = empty.clone();
    drop(copy);
    assert_eq!(sim.live_nodes(), live);

    let null = |e: &MapError| matches!(e, MapError::NullNode(_));
    common::expect_kind(empty.dtype(), null)?;
    common::expect_kind(ctx.wrap(NodePtr::null()), null)?;
    Ok(())
}

#[test]
fn failed_broadcast_allocates_nothing() -> Result<()> {
    let (ctx, sim) = common::context();
    let mut raster = ctx.zeros(&common::opts(2, 2)?)?;
    let wide_mask = ctx.trues(&common::opts(3, 3)?)?;
    let live = sim.live_nodes();

    common::expect_kind(raster.mask(&wide_mask), |e| {
        matches!(e, MapError::InvalidShape(_))
    })?;
    assert_eq!(sim.live_nodes(), live);

    let before = raster.ptr();
    common::expect_kind(raster.set_where(&wide_mask, 1.0), |e| {
        matches!(e, MapError::InvalidShape(_))
    })?;
    assert_eq!(raster.ptr(), before);
    assert_eq!(sim.live_nodes(), live);
    Ok(())
}

#[test]
fn failed_engine_calls_keep_references_balanced() -> Result<()> {
    let (ctx, sim) = common::context();
    let mut raster = ctx.ones(&common::opts(2, 2)?)?;
    let ptr = raster.ptr();
    let live = sim.live_nodes();

    sim.protect("locked");
    common::expect_kind(ctx.write(&raster, "locked"), |e| {
        matches!(e, MapError::EngineWriteFailure { status: 1, .. })
    })?;
    assert_eq!(sim.ref_count(ptr), Some(1));

    common::expect_kind(raster.set([5, 5], 2.0), |e| {
        matches!(e, MapError::InvalidShape(_))
    })?;
    assert_eq!(raster.ptr(), ptr);
    assert_eq!(sim.ref_count(ptr), Some(1));
    assert_eq!(sim.live_nodes(), live);

    raster.set([1, 1], 2.0)?;
    assert_ne!(raster.ptr(), ptr);
    assert_eq!(sim.ref_count(raster.ptr()), Some(1));
    assert_eq!(sim.ref_count(ptr), Some(0));
    Ok(())
}
