use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};

use super::*;

struct TableOnly;

impl Upgrade for TableOnly {
    fn namespace(&self) -> &str {
        "Vendor\\Billing\\Upgrades\\AddInvoiceStatus"
    }

    fn is_migrated(&self) -> Result<bool> {
        Ok(true)
    }

    fn priority(&self) -> u32 {
        40
    }

    fn changed_at(&self) -> Result<DateTime<Utc>> {
        Ok(Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap())
    }

    fn table_migration(&mut self) -> Option<&mut dyn MigratesTable> {
        Some(self)
    }

    fn table_rollback(&mut self) -> Option<&mut dyn RollbackTableMigration> {
        Some(self)
    }
}

impl MigratesTable for TableOnly {
    fn migrate_table(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RollbackTableMigration for TableOnly {
    fn rollback_table_migration(&mut self) -> Result<()> {
        Ok(())
    }
}

struct Bare;

impl Upgrade for Bare {
    fn namespace(&self) -> &str {
        "App\\Upgrades\\Noop"
    }

    fn is_migrated(&self) -> Result<bool> {
        Err(anyhow::anyhow!("tracking table missing"))
    }

    fn changed_at(&self) -> Result<DateTime<Utc>> {
        Ok(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }
}

#[test]
fn package_label_for_app_upgrades_is_app() {
    assert_eq!(package_label("App\\Foo\\Bar"), "App");
    assert_eq!(package_label("App\\Upgrades\\AddColumn"), "App");
}

#[test]
fn package_label_for_vendor_upgrades_is_second_segment() {
    assert_eq!(package_label("Vendor\\SomePackage\\Foo\\Bar"), "SomePackage");
    assert_eq!(package_label("Acme\\Core\\Upgrades\\Seed"), "Core");
}

#[test]
fn package_label_treats_any_app_prefix_as_app() {
    assert_eq!(package_label("AppFoo\\Bar\\Baz"), "App");
    assert_eq!(package_label("Application\\Billing\\Upgrade"), "App");
}

#[test]
fn package_label_falls_back_to_first_segment_for_short_identities() {
    assert_eq!(package_label("Standalone"), "Standalone");
}

#[test]
fn class_label_is_last_segment() {
    assert_eq!(class_label("App\\Foo\\Bar"), "Bar");
    assert_eq!(class_label("Vendor\\SomePackage\\Foo\\Bar"), "Bar");
    assert_eq!(class_label("Bar"), "Bar");
}

#[test]
fn title_is_snake_cased_class_label() {
    assert_eq!(
        title("Vendor\\Billing\\Upgrades\\AddInvoiceStatus"),
        "add_invoice_status"
    );
}

#[test]
fn snake_case_splits_before_every_capital() {
    assert_eq!(snake_case("HTTPClient"), "h_t_t_p_client");
    assert_eq!(snake_case("MigrateV2Data"), "migrate_v2_data");
    assert_eq!(snake_case("already_snake"), "already_snake");
    assert_eq!(snake_case("Foo_Bar"), "foo__bar");
    assert_eq!(snake_case(""), "");
}

#[test]
fn capabilities_reflect_declared_phases() {
    let mut upgrade = TableOnly;
    let capabilities = Capabilities::of(&mut upgrade);
    assert_eq!(
        capabilities,
        Capabilities {
            migrates_table: true,
            migrates_data: false,
            migrates_post_data: false,
            rollbacks_table: true,
        }
    );
    assert!(!capabilities.is_empty());
    assert_eq!(capabilities.labels(), vec!["table", "rollback"]);

    assert!(Capabilities::of(&mut Bare).is_empty());
}

#[test]
fn default_priority_applies_when_not_overridden() {
    assert_eq!(Bare.priority(), DEFAULT_PRIORITY);
}

#[test]
fn status_of_reads_upgrade_metadata() {
    let status = UpgradeStatus::of(&TableOnly).expect("status should be readable");
    assert!(status.is_migrated);
    assert_eq!(status.priority, 40);
    assert_eq!(status.package(), "Billing");
    assert_eq!(status.class(), "AddInvoiceStatus");
    assert_eq!(
        status.changed_at,
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
    );
}

#[test]
fn status_of_names_upgrade_when_query_fails() {
    let err = UpgradeStatus::of(&Bare).expect_err("failing query should surface");
    assert!(
        err.to_string()
            .contains("failed to query migrated state of App\\Upgrades\\Noop"),
        "unexpected error: {err}"
    );
}

#[test]
fn parse_upgrade_manifest() {
    let content = r#"
[[upgrade]]
namespace = 'Acme\Billing\Upgrades\AddInvoiceStatus'
priority = 20
changed_at = "2026-03-14T09:30:00Z"
check = ["sh", "-c", "test -f .invoice-status"]
migrate_table = ["psql", "-f", "sql/add_invoice_status.sql"]
migrate_data = ["psql", "-f", "sql/backfill_invoice_status.sql"]
rollback_table = ["psql", "-f", "sql/drop_invoice_status.sql"]

[[upgrade]]
namespace = 'App\Upgrades\ReindexSearch'
migrate_post_data = ["./bin/reindex"]
"#;

    let manifest = UpgradeManifest::from_toml_str(content).expect("manifest should parse");
    assert_eq!(manifest.upgrades.len(), 2);

    let first = &manifest.upgrades[0];
    assert_eq!(first.namespace, "Acme\\Billing\\Upgrades\\AddInvoiceStatus");
    assert_eq!(first.priority, 20);
    assert_eq!(
        first.changed_at,
        Some(Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap())
    );
    assert_eq!(
        first.migrate_table.as_deref(),
        Some(
            &[
                "psql".to_string(),
                "-f".to_string(),
                "sql/add_invoice_status.sql".to_string()
            ][..]
        )
    );
    assert!(first.migrate_post_data.is_none());

    let second = &manifest.upgrades[1];
    assert_eq!(second.priority, DEFAULT_PRIORITY);
    assert!(second.changed_at.is_none());
    assert!(second.check.is_none());
}

#[test]
fn manifest_rejects_duplicate_namespaces() {
    let content = r#"
[[upgrade]]
namespace = 'App\Upgrades\Seed'
migrate_data = ["true"]

[[upgrade]]
namespace = 'App\Upgrades\Seed'
migrate_data = ["true"]
"#;

    let err = UpgradeManifest::from_toml_str(content).expect_err("duplicates must fail");
    assert!(err
        .to_string()
        .contains("duplicate upgrade declaration 'App\\Upgrades\\Seed'"));
}

#[test]
fn manifest_rejects_empty_namespace_segment() {
    let content = r#"
[[upgrade]]
namespace = 'App\\Seed'
migrate_data = ["true"]
"#;

    let err = UpgradeManifest::from_toml_str(content).expect_err("empty segment must fail");
    assert!(err.to_string().contains("empty segment"), "unexpected: {err}");
}

#[test]
fn manifest_rejects_empty_command() {
    let content = r#"
[[upgrade]]
namespace = 'App\Upgrades\Seed'
migrate_data = []
"#;

    let err = UpgradeManifest::from_toml_str(content).expect_err("empty argv must fail");
    assert!(err
        .to_string()
        .contains("declares an empty migrate_data command"));
}

#[test]
fn manifest_rejects_upgrade_without_phases() {
    let content = r#"
[[upgrade]]
namespace = 'App\Upgrades\Seed'
check = ["true"]
"#;

    let err = UpgradeManifest::from_toml_str(content).expect_err("phaseless upgrade must fail");
    assert!(err.to_string().contains("declares no migration phase"));
}

#[test]
fn manifest_accepts_rollback_without_table_migration() {
    let content = r#"
[[upgrade]]
namespace = 'App\Upgrades\Seed'
migrate_data = ["true"]
rollback_table = ["true"]
"#;

    let manifest = UpgradeManifest::from_toml_str(content).expect("rollback alone is allowed");
    assert_eq!(
        manifest.upgrades[0].rollback_table,
        Some(vec!["true".to_string()])
    );
}

#[test]
fn manifest_rejects_namespace_characters_outside_identifiers() {
    for namespace in ["Vendor\\Pkg\\Foo-Bar", "Vendor\\Pkg\\Foo.Bar", "App\\Up grades\\Seed"] {
        let content = format!(
            "[[upgrade]]\nnamespace = '{namespace}'\nmigrate_data = [\"true\"]\n"
        );
        let err = UpgradeManifest::from_toml_str(&content)
            .expect_err("non-identifier namespace must fail");
        assert!(
            err.to_string().contains("invalid character"),
            "unexpected: {err}"
        );
    }
}

#[test]
fn manifest_rejects_unknown_fields() {
    let content = r#"
[[upgrade]]
namespace = 'App\Upgrades\Seed'
migrate_data = ["true"]
run_manually = true
"#;

    assert!(UpgradeManifest::from_toml_str(content).is_err());
}

#[test]
fn empty_manifest_has_no_upgrades() {
    let manifest = UpgradeManifest::from_toml_str("").expect("empty manifest should parse");
    assert!(manifest.upgrades.is_empty());
}
