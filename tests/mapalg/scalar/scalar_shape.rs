use anyhow::Result;
use mapalg::{Coord, MapError, ShapeVector, MAX_RANK, UNSET};

use crate::common;

#[test]
fn shape_round_trips_to_list() -> Result<()> {
    let shape = ShapeVector::new(&[4, 3])?;
    assert_eq!(shape.to_vec(), vec![4, 3]);
    assert_eq!(shape.rank(), MAX_RANK);
    assert_eq!(shape.num_elements(), 12);
    assert!(!shape.is_unset());

    let (dims, len) = shape.raw();
    assert_eq!(ShapeVector::from_raw(dims, len)?, shape);
    Ok(())
}

#[test]
fn empty_list_is_unset() -> Result<()> {
    let shape = ShapeVector::new(&[])?;
    assert!(shape.is_unset());
    assert!(shape.to_vec().is_empty());
    assert_eq!(shape.raw(), ([UNSET; MAX_RANK], 0));
    assert_eq!(shape, ShapeVector::default());
    Ok(())
}

#[test]
fn wrong_rank_is_invalid_shape() -> Result<()> {
    let invalid = |e: &MapError| matches!(e, MapError::InvalidShape(_));
    common::expect_kind(ShapeVector::new(&[5]), invalid)?;
    common::expect_kind(ShapeVector::new(&[1, 2, 3]), invalid)?;
    common::expect_kind(ShapeVector::new(&[2, -1]), invalid)?;
    common::expect_kind(ShapeVector::from_raw([3, UNSET], 2), invalid)?;
    common::expect_kind(Coord::new(&[1]), invalid)?;
    Ok(())
}

#[test]
fn partial_rank_keeps_sentinel_tail() -> Result<()> {
    let shape = ShapeVector::with_rank(&[6])?;
    assert_eq!(shape.raw(), ([6, UNSET], 1));
    assert_eq!(ShapeVector::try_from(vec![2, 2])?.extents(), vec![2, 2]);
    assert_eq!(Coord::new(&[-1, 1])?.values(), [-1, 1]);
    Ok(())
}

#[test]
fn deserialized_shapes_are_validated() -> Result<()> {
    let shape: ShapeVector = serde_json::from_str(r#"{"dims":[4,3],"len":2}"#)?;
    assert_eq!(shape, ShapeVector::new(&[4, 3])?);
    let unset: ShapeVector = serde_json::from_str(&serde_json::to_string(&ShapeVector::unset())?)?;
    assert!(unset.is_unset());

    assert!(serde_json::from_str::<ShapeVector>(r#"{"dims":[3,-1],"len":2}"#).is_err());
    assert!(serde_json::from_str::<ShapeVector>(r#"{"dims":[3,-1],"len":0}"#).is_err());
    assert!(serde_json::from_str::<ShapeVector>(r#"{"dims":[3,4],"len":5}"#).is_err());
    Ok(())
}
