use std::path::PathBuf;

use anyhow::Result;
use mapalg::{MapConfig, MapError};

#[cfg(feature = "libmap")]
#[test]
fn missing_library_reports_every_path() -> Result<()> {
    use mapalg::{LibMap, MapContext};

    let paths = vec![
        PathBuf::from("/nonexistent/libmap.so"),
        PathBuf::from("/nonexistent/other/libmap.so"),
    ];
    match LibMap::load(&paths).map(|_| ()) {
        Ok(()) => anyhow::bail!("bogus library paths bound an engine"),
        Err(err) => match mapalg::error_kind(&err) {
            Some(MapError::Binding { tried, .. }) => assert_eq!(tried, &paths),
            other => anyhow::bail!("unexpected error kind {other:?}"),
        },
    }

    let config = MapConfig::default().with_library_paths(paths);
    crate::common::expect_kind(MapContext::load(config), |e| {
        matches!(e, MapError::Binding { .. })
    })
}

#[test]
fn config_from_json_keeps_defaults() -> Result<()> {
    let config = MapConfig::from_json(r#"{ "max_loop_iterations": 5 }"#)?;
    assert_eq!(config.max_loop_iterations, 5);
    assert_eq!(config.library_paths, MapConfig::default().library_paths);
    assert_eq!(config.resource_dir, None);

    let custom = MapConfig::from_json(r#"{ "library_paths": ["/opt/map/libmap.so"] }"#)?;
    assert_eq!(custom.library_paths, vec![PathBuf::from("/opt/map/libmap.so")]);
    Ok(())
}

#[test]
fn missing_config_file_fails() {
    let missing = std::env::temp_dir().join("mapalg-no-such-config.json");
    assert!(MapConfig::from_file(&missing).is_err());
    assert!(MapConfig::from_json("{ not json").is_err());
}
