use anyhow::Result;
use mapalg::{DataType, Literal, MapError, ScalarValue};

use crate::common;

#[test]
fn convert_round_trip_keeps_payload() -> Result<()> {
    let original = ScalarValue::I32(7);
    for &dtype in DataType::ALL {
        if matches!(dtype, DataType::None | DataType::B8) {
            continue;
        }
        let there = original.convert(dtype)?;
        assert_eq!(there.dtype(), dtype);
        assert_eq!(there.convert(DataType::S32)?, original);
    }

    let flag = ScalarValue::Bool(true);
    for &dtype in DataType::ALL {
        if dtype == DataType::None {
            continue;
        }
        assert_eq!(flag.convert(dtype)?.convert(DataType::B8)?, flag);
    }

    let half = ScalarValue::F64(2.5);
    assert_eq!(half.convert(DataType::F32)?.convert(DataType::F64)?, half);
    Ok(())
}

#[test]
fn convert_saturates_and_truncates() -> Result<()> {
    assert_eq!(ScalarValue::I32(300).convert(DataType::U8)?, ScalarValue::U8(255));
    assert_eq!(ScalarValue::I32(-5).convert(DataType::U16)?, ScalarValue::U16(0));
    assert_eq!(ScalarValue::F32(-3.7).convert(DataType::S8)?, ScalarValue::I8(-3));
    assert_eq!(ScalarValue::F64(f64::NAN).convert(DataType::S32)?, ScalarValue::I32(0));
    assert_eq!(ScalarValue::F64(0.25).convert(DataType::B8)?, ScalarValue::Bool(true));
    assert_eq!(ScalarValue::U64(0).convert(DataType::B8)?, ScalarValue::Bool(false));
    Ok(())
}

#[test]
fn convert_to_unset_type_is_mismatch() -> Result<()> {
    common::expect_kind(ScalarValue::F32(1.0).convert(DataType::None), |e| {
        matches!(e, MapError::TypeMismatch(_))
    })
}

#[test]
fn literal_precedence() -> Result<()> {
    assert_eq!(ScalarValue::from_literal(Literal::Float(1.5)).dtype(), DataType::F32);
    assert_eq!(ScalarValue::from_literal(Literal::Bool(true)).dtype(), DataType::B8);
    assert_eq!(ScalarValue::from_literal(Literal::Int(3)), ScalarValue::I32(3));
    assert_eq!(
        ScalarValue::from_literal(Literal::Int(1 << 40)),
        ScalarValue::I32(i32::MAX)
    );
    assert_eq!(ScalarValue::from(7u16).dtype(), DataType::U16);
    assert_eq!(ScalarValue::from(-2i64).dtype(), DataType::S64);
    Ok(())
}

#[test]
fn read_requires_matching_tag() -> Result<()> {
    let value = ScalarValue::F32(1.25);
    assert_eq!(value.read::<f32>()?, 1.25);
    common::expect_kind(value.read::<i32>(), |e| matches!(e, MapError::TypeMismatch(_)))
}

#[test]
fn enum_codes_round_trip() -> Result<()> {
    for &dtype in DataType::ALL {
        assert_eq!(DataType::from_code(dtype.code())?, dtype);
        assert_eq!(dtype.as_str().parse::<DataType>()?, dtype);
    }
    assert_eq!(DataType::S32.code(), 10);
    common::expect_kind(DataType::from_code(42), |e| matches!(e, MapError::TypeMismatch(_)))
}
