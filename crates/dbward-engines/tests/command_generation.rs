//! Command line generation for every engine
//!
//! These tests pin the exact shape of generated commands: flags, escaping,
//! binary selection and which operations each engine refuses.

use dbward_core::{
    ConnectionDescriptor, EngineError, EngineKind, EngineOperation, EngineSettings,
    FirebirdClient, MysqlCliFamily, redact,
};
use dbward_engines::{EngineRegistry, EngineTarget};
use rstest::rstest;
use std::path::Path;

fn registry(mysql_cli: MysqlCliFamily, firebird_client: FirebirdClient) -> EngineRegistry {
    EngineRegistry::with_defaults(&EngineSettings {
        mysql_cli,
        firebird_client,
        probe_timeout_secs: 10,
    })
}

fn default_registry() -> EngineRegistry {
    registry(MysqlCliFamily::Mariadb, FirebirdClient::Gbak)
}

fn target(engine: EngineKind, host: &str, port: u16, database: &str) -> EngineTarget {
    let conn = ConnectionDescriptor::new(engine, host)
        .with_port(port)
        .with_credentials("backup", "s3cr3t'pw");
    EngineTarget::from_connection(&conn, database)
}

#[test]
fn test_sqlite_dump_and_restore_are_exact() {
    let commands = default_registry()
        .commands_for(EngineTarget::from_connection(
            &ConnectionDescriptor::new(EngineKind::Sqlite, ""),
            "/data/app.sqlite",
        ))
        .unwrap();

    assert_eq!(
        commands.dump_command(Path::new("/tmp/out")).unwrap(),
        "cp '/data/app.sqlite' '/tmp/out'"
    );
    assert_eq!(
        commands.restore_command(Path::new("/tmp/out")).unwrap(),
        "cp '/tmp/out' '/data/app.sqlite' && chmod 0640 '/data/app.sqlite'"
    );
    assert_eq!(commands.test_command().unwrap(), "test -r '/data/app.sqlite'");
    assert_eq!(commands.dump_extension(), "db");
}

#[rstest]
#[case(MysqlCliFamily::Mariadb, "mariadb-dump", true)]
#[case(MysqlCliFamily::Mysql, "mysqldump", false)]
fn test_mysql_dump_by_cli_family(
    #[case] family: MysqlCliFamily,
    #[case] binary: &str,
    #[case] skips_ssl: bool,
) {
    let commands = registry(family, FirebirdClient::Gbak)
        .commands_for(target(EngineKind::MySql, "db-primary", 3307, "shop"))
        .unwrap();
    let cmd = commands.dump_command(Path::new("/work/shop.sql")).unwrap();

    assert!(cmd.starts_with(&format!("{} ", binary)), "{cmd}");
    assert!(cmd.contains(
        "--single-transaction --routines --complete-insert --hex-blob --add-drop-table"
    ));
    assert_eq!(cmd.contains("--skip_ssl"), skips_ssl);
    assert!(cmd.contains("--host='db-primary' --port='3307' --user='backup'"));
    assert!(cmd.contains(r"--password='s3cr3t'\''pw'"));
    assert!(cmd.ends_with("'shop' > '/work/shop.sql'"));

    let redacted = redact(&cmd);
    assert!(!redacted.contains("s3cr3t"));
    assert!(redacted.contains("--password=***"));
    assert!(redacted.contains("--host='db-primary'"));
}

#[rstest]
#[case(MysqlCliFamily::Mariadb, "mariadb --skip_ssl ")]
#[case(MysqlCliFamily::Mysql, "mysql ")]
fn test_mysql_restore_and_probe(#[case] family: MysqlCliFamily, #[case] prefix: &str) {
    let commands = registry(family, FirebirdClient::Gbak)
        .commands_for(target(EngineKind::MariaDb, "db", 3306, "shop_restore"))
        .unwrap();

    let restore = commands.restore_command(Path::new("/work/in.sql")).unwrap();
    assert!(restore.starts_with(prefix), "{restore}");
    assert!(restore.ends_with("'shop_restore' < '/work/in.sql'"));

    let probe = commands.test_command().unwrap();
    assert!(probe.starts_with(prefix));
    assert!(probe.ends_with("-e 'SELECT 1'"));
}

#[test]
fn test_mysql_extra_params_are_appended() {
    let conn = ConnectionDescriptor::new(EngineKind::MySql, "db")
        .with_extra_param("max_allowed_packet", "512M")
        .with_extra_param("skip-lock-tables", "");
    let commands = default_registry()
        .commands_for(EngineTarget::from_connection(&conn, "app"))
        .unwrap();
    let cmd = commands.dump_command(Path::new("/w/o.sql")).unwrap();
    assert!(cmd.contains(" --max_allowed_packet='512M' --skip-lock-tables 'app' > "));
}

#[test]
fn test_postgres_commands() {
    let commands = default_registry()
        .commands_for(target(EngineKind::PostgreSql, "pg.internal", 5433, "billing"))
        .unwrap();

    let dump = commands.dump_command(Path::new("/w/billing.sql")).unwrap();
    assert_eq!(
        dump,
        r"PGPASSWORD='s3cr3t'\''pw' pg_dump --clean --if-exists --no-owner --no-privileges --host='pg.internal' --port='5433' --username='backup' --dbname='billing' --file='/w/billing.sql'"
    );
    assert_eq!(
        redact(&dump),
        "PGPASSWORD=*** pg_dump --clean --if-exists --no-owner --no-privileges --host='pg.internal' --port='5433' --username='backup' --dbname='billing' --file='/w/billing.sql'"
    );

    let restore = commands.restore_command(Path::new("/w/in.sql")).unwrap();
    assert!(restore.contains("psql --quiet --set ON_ERROR_STOP=on"));
    assert!(restore.ends_with("--dbname='billing' --file='/w/in.sql'"));

    let probe = commands.test_command().unwrap();
    assert!(probe.contains("PGCONNECT_TIMEOUT=10 psql"));
    assert!(probe.ends_with("--command='SELECT 1'"));
}

#[test]
fn test_redis_commands() {
    let commands = default_registry()
        .commands_for(target(EngineKind::Redis, "cache", 6380, "0"))
        .unwrap();

    let dump = commands.dump_command(Path::new("/w/dump.rdb")).unwrap();
    assert_eq!(
        redact(&dump),
        "REDISCLI_AUTH=*** redis-cli -h 'cache' -p '6380' --user 'backup' --no-auth-warning --rdb '/w/dump.rdb'"
    );
    assert!(commands.test_command().unwrap().ends_with("--no-auth-warning ping"));

    let err = commands.restore_command(Path::new("/w/dump.rdb")).unwrap_err();
    assert!(matches!(
        err,
        EngineError::UnsupportedOperation {
            engine: EngineKind::Redis,
            operation: EngineOperation::Restore
        }
    ));
}

#[test]
fn test_mongodb_restore_remaps_namespaces() {
    let target = target(EngineKind::MongoDb, "mongo", 27017, "orders_copy")
        .with_source_database("orders");
    let commands = default_registry().commands_for(target).unwrap();

    let restore = commands.restore_command(Path::new("/w/in.archive")).unwrap();
    assert!(restore.starts_with("mongorestore --host='mongo' --port='27017'"));
    assert!(restore.contains("--authenticationDatabase='admin'"));
    assert!(restore.ends_with(
        "--archive='/w/in.archive' --nsFrom='orders.*' --nsTo='orders_copy.*' --drop"
    ));

    let dump = commands.dump_command(Path::new("/w/out.archive")).unwrap();
    assert!(dump.contains("--db='orders_copy' --archive='/w/out.archive'"));
    assert!(!redact(&dump).contains("s3cr3t"));

    let probe = commands.test_command().unwrap();
    assert!(probe.ends_with("--eval 'db.runCommand({ ping: 1 })'"));
}

#[test]
fn test_mongodb_prepare_drops_target_database() {
    let target = target(EngineKind::MongoDb, "mongo", 27017, "orders")
        .with_source_database("orders");
    let commands = default_registry().commands_for(target).unwrap();

    let prepare = commands.prepare_command("orders_copy").unwrap().unwrap();
    assert!(prepare.starts_with("mongosh --quiet --host='mongo' --port='27017'"));
    assert!(prepare.ends_with(r#"--eval 'db.getSiblingDB("orders_copy").dropDatabase()'"#));
    assert!(!redact(&prepare).contains("s3cr3t"));
}

#[rstest]
#[case(EngineKind::PostgreSql)]
#[case(EngineKind::MySql)]
#[case(EngineKind::Sqlite)]
#[case(EngineKind::Firebird)]
fn test_driver_engines_have_no_prepare_command(#[case] engine: EngineKind) {
    let commands = default_registry()
        .commands_for(target(engine, "db", 0, "/data/app.db"))
        .unwrap();
    assert!(commands.prepare_command("app").unwrap().is_none());
}

#[test]
fn test_mongodb_username_without_password() {
    let conn = ConnectionDescriptor::new(EngineKind::MongoDb, "mongo").with_credentials("reader", "");
    let commands = default_registry()
        .commands_for(EngineTarget::from_connection(&conn, "app"))
        .unwrap();
    let dump = commands.dump_command(Path::new("/w/o")).unwrap();
    assert!(dump.contains("--username='reader' --authenticationDatabase='admin'"));
    assert!(!dump.contains("--password"));

    let with_password = default_registry()
        .commands_for(target(EngineKind::MongoDb, "mongo", 27017, "app"))
        .unwrap()
        .dump_command(Path::new("/w/o"))
        .unwrap();
    assert!(with_password.contains(r"--password='s3cr3t'\''pw'"));
}

#[test]
fn test_mongodb_auth_source_param() {
    let conn = ConnectionDescriptor::new(EngineKind::MongoDb, "mongo")
        .with_credentials("u", "p")
        .with_extra_param("auth_source", "users");
    let commands = default_registry()
        .commands_for(EngineTarget::from_connection(&conn, "app"))
        .unwrap();
    let dump = commands.dump_command(Path::new("/w/o")).unwrap();
    assert!(dump.contains("--authenticationDatabase='users'"));
    assert!(!dump.contains("--auth_source"));
}

#[rstest]
#[case(FirebirdClient::Gbak, "gbak -b -g -user 'backup' -password", "fbk")]
#[case(FirebirdClient::Isql, "isql -x -user 'backup' -password", "sql")]
fn test_firebird_dump(
    #[case] client: FirebirdClient,
    #[case] prefix: &str,
    #[case] extension: &str,
) {
    let commands = registry(MysqlCliFamily::Mariadb, client)
        .commands_for(target(EngineKind::Firebird, "fb", 3050, "/db/app.fdb"))
        .unwrap();
    let dump = commands.dump_command(Path::new("/w/out")).unwrap();

    assert!(dump.starts_with(prefix), "{dump}");
    assert!(dump.contains("'fb/3050:/db/app.fdb'"));
    assert_eq!(commands.dump_extension(), extension);

    let redacted = redact(&dump);
    assert!(redacted.contains("-password ***"));
    assert!(!redacted.contains("s3cr3t"));
}

#[test]
fn test_firebird_restore_support_depends_on_client() {
    let gbak = registry(MysqlCliFamily::Mariadb, FirebirdClient::Gbak)
        .commands_for(target(EngineKind::Firebird, "fb", 3050, "/db/app.fdb"))
        .unwrap();
    let restore = gbak.restore_command(Path::new("/w/in.fbk")).unwrap();
    assert!(restore.starts_with("gbak -rep -user 'backup'"));
    assert!(restore.ends_with("'/w/in.fbk' 'fb/3050:/db/app.fdb'"));

    let isql = registry(MysqlCliFamily::Mariadb, FirebirdClient::Isql)
        .commands_for(target(EngineKind::Firebird, "fb", 3050, "/db/app.fdb"))
        .unwrap();
    assert!(matches!(
        isql.restore_command(Path::new("/w/in.sql")),
        Err(EngineError::UnsupportedOperation { .. })
    ));
}

#[rstest]
#[case(EngineKind::MySql)]
#[case(EngineKind::PostgreSql)]
#[case(EngineKind::Redis)]
#[case(EngineKind::MongoDb)]
fn test_network_engines_require_host(#[case] engine: EngineKind) {
    let commands = default_registry()
        .commands_for(EngineTarget::from_connection(
            &ConnectionDescriptor::new(engine, ""),
            "app",
        ))
        .unwrap();
    assert!(matches!(
        commands.dump_command(Path::new("/w/o")),
        Err(EngineError::InvalidTarget { .. })
    ));
}

#[test]
fn test_tunnel_endpoint_rewrite() {
    let target = target(EngineKind::PostgreSql, "10.0.3.7", 5432, "app").with_endpoint("127.0.0.1", 41234);
    let commands = default_registry().commands_for(target).unwrap();
    let dump = commands.dump_command(Path::new("/w/o")).unwrap();
    assert!(dump.contains("--host='127.0.0.1' --port='41234'"));
    assert!(!dump.contains("10.0.3.7"));
}
