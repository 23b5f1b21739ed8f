use anyhow::Result;
use mapalg::{
    binary, pow, select, sin, unary, BinaryOp, DataType, Operand, RasterOptions, ScalarValue,
    UnaryOp,
};

use crate::common;

#[test]
fn select_picks_branch_per_cell() -> Result<()> {
    let (ctx, sim) = common::context();
    let mask = common::raster_from_rows(&ctx, &sim, "mask", DataType::B8, &[&[1.0, 0.0]])?;
    let then = ctx.ones(&common::opts(1, 2)?)?;
    let otherwise = ctx.zeros(&common::opts(1, 2)?)?;

    let picked = select(&mask, &then, &otherwise)?.into_raster()?;
    common::assert_values(&sim, &picked, &[1.0, 0.0])?;
    Ok(())
}

#[test]
fn host_literal_matches_constant_node() -> Result<()> {
    let (ctx, sim) = common::context();
    let r = common::raster_from_rows(&ctx, &sim, "r", DataType::F32, &[&[1.5, -2.0]])?;
    let two = ctx.constant(2.0f32, &RasterOptions::default())?;

    let promoted = (&r + 2)?;
    let explicit = (&r + &two)?;
    assert_eq!(promoted.dtype()?, DataType::F32);
    assert_eq!(
        common::values(&sim, &promoted)?,
        common::values(&sim, &explicit)?
    );

    let reversed = (2 - &r)?;
    common::assert_values(&sim, &reversed, &[0.5, 4.0])?;
    Ok(())
}

#[test]
fn host_operands_use_host_arithmetic() -> Result<()> {
    let (_ctx, sim) = common::context();
    let live = sim.live_nodes();

    let product = binary(3, 4, BinaryOp::Mul)?;
    assert_eq!(product.host(), Some(ScalarValue::I32(12)));
    let sine = sin(0.0)?;
    assert_eq!(sine.host(), Some(ScalarValue::F32(0.0)));
    let cube = pow(2, 3)?;
    assert_eq!(cube.host(), Some(ScalarValue::F32(8.0)));
    let cmp = binary(ScalarValue::F64(1.0), 2, BinaryOp::Lt)?;
    assert_eq!(cmp.host(), Some(ScalarValue::Bool(true)));

    assert_eq!(sim.live_nodes(), live);
    Ok(())
}

#[test]
fn host_wide_integers_stay_exact() -> Result<()> {
    let big = (1i64 << 53) + 1;
    let sum = binary(ScalarValue::I64(big), ScalarValue::I64(0), BinaryOp::Add)?;
    assert_eq!(sum.host(), Some(ScalarValue::I64(big)));
    let edge = binary(ScalarValue::I64(i64::MAX - 1), ScalarValue::I64(1), BinaryOp::Add)?;
    assert_eq!(edge.host(), Some(ScalarValue::I64(i64::MAX)));
    let over = binary(ScalarValue::U64(u64::MAX), ScalarValue::U64(1), BinaryOp::Add)?;
    assert_eq!(over.host(), Some(ScalarValue::U64(u64::MAX)));

    let pattern = 0xF0F0_F0F0_F0F0_F0F1u64;
    let masked = binary(ScalarValue::U64(pattern), ScalarValue::U64(u64::MAX), BinaryOp::BAnd)?;
    assert_eq!(masked.host(), Some(ScalarValue::U64(pattern)));
    let flipped = binary(ScalarValue::U64(pattern), ScalarValue::U64(1), BinaryOp::BXor)?;
    assert_eq!(flipped.host(), Some(ScalarValue::U64(pattern - 1)));
    let top = binary(ScalarValue::U64((1 << 63) | 1), ScalarValue::U64(63), BinaryOp::Shr)?;
    assert_eq!(top.host(), Some(ScalarValue::U64(1)));
    let inverted = unary(ScalarValue::U64(1), UnaryOp::BNot)?;
    assert_eq!(inverted.host(), Some(ScalarValue::U64(u64::MAX - 1)));
    Ok(())
}

#[test]
fn pow_treats_exponent_as_float() -> Result<()> {
    let (ctx, sim) = common::context();
    let r = common::raster_from_rows(&ctx, &sim, "ints", DataType::S32, &[&[2.0, 3.0]])?;

    let squared = r.pow(2)?;
    assert_eq!(squared.dtype()?, DataType::F32);
    common::assert_values(&sim, &squared, &[4.0, 9.0])?;

    let powers = r.rpow(2)?;
    common::assert_values(&sim, &powers, &[4.0, 8.0])?;

    let mixed = pow(&r, Operand::from(0.5))?.into_raster()?;
    common::assert_values(&sim, &mixed, &[2f64.sqrt(), 3f64.sqrt()])?;
    Ok(())
}

#[test]
fn comparisons_yield_booleans() -> Result<()> {
    let (ctx, sim) = common::context();
    let r = common::raster_from_rows(&ctx, &sim, "r", DataType::F32, &[&[1.0, 5.0]])?;

    let below = r.lt(3)?;
    assert_eq!(below.dtype()?, DataType::B8);
    common::assert_values(&sim, &below, &[1.0, 0.0])?;

    let flipped = (!&below)?;
    common::assert_values(&sim, &flipped, &[0.0, 1.0])?;

    let both = below.and(&flipped)?;
    common::assert_values(&sim, &both, &[0.0, 0.0])?;
    Ok(())
}

#[test]
fn integer_arithmetic_truncates() -> Result<()> {
    let (ctx, sim) = common::context();
    let r = common::raster_from_rows(&ctx, &sim, "ints", DataType::S32, &[&[7.0, -7.0]])?;

    let halved = (&r / 2)?;
    assert_eq!(halved.dtype()?, DataType::S32);
    common::assert_values(&sim, &halved, &[3.0, -3.0])?;

    let cast = common::raster_from_rows(&ctx, &sim, "f", DataType::F32, &[&[1.7, -1.7]])?
        .astype(DataType::S32)?;
    common::assert_values(&sim, &cast, &[1.0, -1.0])?;
    Ok(())
}

#[test]
fn mismatched_shapes_do_not_broadcast() -> Result<()> {
    let (ctx, _sim) = common::context();
    let a = ctx.zeros(&common::opts(2, 2)?)?;
    let b = ctx.zeros(&common::opts(3, 1)?)?;
    common::expect_kind(&a + &b, |e| matches!(e, mapalg::MapError::InvalidShape(_)))
}
