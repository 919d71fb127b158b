//! Restores across engine kinds are refused before anything runs

use dbward::{
    ArtifactRef, CompressionKind, ConnectionDescriptor, DbwardError, EngineKind, MemoryLogger,
    PipelineContext, RestorePipeline, RestoreSpec, VolumeDescriptor, check_engines,
};
use rstest::rstest;

#[test]
fn test_every_pair() {
    for source in EngineKind::ALL {
        for target in EngineKind::ALL {
            let result = check_engines(source, target);
            if source == target {
                assert!(result.is_ok(), "{source} -> {target}");
            } else {
                match result {
                    Err(DbwardError::EngineMismatch {
                        source_engine,
                        target_engine,
                    }) => {
                        assert_eq!(source_engine, source);
                        assert_eq!(target_engine, target);
                    }
                    other => panic!("{source} -> {target}: {other:?}"),
                }
            }
        }
    }
}

#[rstest]
#[case(EngineKind::MySql, EngineKind::MariaDb)]
#[case(EngineKind::PostgreSql, EngineKind::MySql)]
#[case(EngineKind::Sqlite, EngineKind::PostgreSql)]
#[case(EngineKind::MongoDb, EngineKind::Redis)]
#[case(EngineKind::Firebird, EngineKind::Sqlite)]
#[tokio::test]
async fn test_pipeline_refuses_mismatch_without_side_effects(
    #[case] source: EngineKind,
    #[case] target: EngineKind,
) {
    let root = tempfile::tempdir().unwrap();
    let spool = root.path().join("spool");
    let spec = RestoreSpec {
        target: ConnectionDescriptor::new(target, "db.internal"),
        volume: VolumeDescriptor::local(
            "local",
            root.path().join("volume").to_string_lossy().into_owned(),
        ),
        artifact: ArtifactRef {
            filename: "shop.sql.gz".to_string(),
            size: 0,
            checksum: None,
        },
        compression: CompressionKind::Gzip,
        source_engine: source,
        source_database: "shop".to_string(),
        destination_schema: "shop".to_string(),
        working_dir: spool.clone(),
    };

    let logger = MemoryLogger::new();
    let err = RestorePipeline::new(PipelineContext::default())
        .run(&spec, &logger)
        .await
        .unwrap_err();

    assert!(err.to_string().contains(source.as_str()));
    assert!(err.to_string().contains(target.as_str()));
    assert!(matches!(err, DbwardError::EngineMismatch { .. }));
    assert!(!spool.exists());
    assert!(logger.records().is_empty());
}
