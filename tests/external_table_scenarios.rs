//! External table replication scenarios
//!
//! A primary with external and managed tables is dumped and loaded into a
//! replica sharing the same filesystem. These tests cover:
//! - manifest presence and contents per option set
//! - rebased replica locations for tables and partitions
//! - location changes and drops leaving data untouched

mod common;

use common::*;
use tablerepl::catalog::{Column, TableKind};
use tablerepl::coordinator::DumpKind;
use tablerepl::events::EventStore;
use tablerepl::fs::FileSystem;
use tablerepl::manifest::{bootstrap_manifest_path, incremental_manifest_path, ManifestReader};
use tablerepl::warehouse::TableDefinition;

/// t1 with two rows and t2 with three populated partitions.
fn seed_t1_t2(cluster: &Cluster) {
    cluster.primary.create_table(PRIMARY_DB, t1()).unwrap();
    cluster
        .primary
        .insert(PRIMARY_DB, "t1", None, &["1", "2"])
        .unwrap();
    cluster.primary.create_table(PRIMARY_DB, t2()).unwrap();
    for value in ["india", "us", "france"] {
        cluster
            .primary
            .insert(PRIMARY_DB, "t2", Some(country(value)), &[value])
            .unwrap();
    }
}

// =============================================================================
// Bootstrap
// =============================================================================

/// Replication disabled: no manifest, external table absent on the replica.
#[test]
fn test_disabled_bootstrap_writes_no_manifest_and_skips_external() {
    let cluster = Cluster::new();
    cluster.primary.create_table(PRIMARY_DB, t1()).unwrap();
    cluster
        .primary
        .insert(PRIMARY_DB, "t1", None, &["1", "2"])
        .unwrap();

    let options = without_external();
    let dump = cluster.dump(None, &options);
    assert_eq!(dump.kind, DumpKind::Bootstrap);
    assert_eq!(dump.manifest_entries, 0);

    let manifest = bootstrap_manifest_path(&dump.dump_location, PRIMARY_DB).unwrap();
    assert!(!cluster.exists(&manifest));

    cluster.load(&dump, &options);
    assert!(cluster.replica_table("t1").is_none());
    assert_eq!(cluster.replica_watermark(), Some(dump.last_replication_id));
}

/// Replication enabled: the manifest lists exactly the external tables and
/// every replica location is the base followed by the primary path.
#[test]
fn test_enabled_bootstrap_rebases_tables_and_partitions() {
    let cluster = Cluster::new();
    seed_t1_t2(&cluster);
    cluster
        .primary
        .create_table(
            PRIMARY_DB,
            TableDefinition::managed("m1", vec![Column::new("id", "int")]),
        )
        .unwrap();

    let options = with_external();
    let dump = cluster.dump(None, &options);
    let manifest = bootstrap_manifest_path(&dump.dump_location, PRIMARY_DB).unwrap();
    assert_eq!(
        cluster.manifest_tables(&manifest),
        Some(vec!["t1".to_string(), "t2".to_string()])
    );

    let entries = ManifestReader::new(cluster.fs.as_ref())
        .read(&manifest)
        .unwrap()
        .unwrap();
    assert_eq!(entries[1].location, loc("/ext/t2"));

    cluster.load(&dump, &options);

    let t2 = cluster.replica_table("t2").unwrap();
    assert_eq!(t2.location, loc("/replica_external_base/ext/t2"));
    for value in ["india", "us", "france"] {
        let partition = cluster.replica_partition("t2", &country(value)).unwrap();
        assert_eq!(
            partition.location.path(),
            format!("/replica_external_base/ext/t2/country={}", value)
        );
    }
    assert_eq!(
        cluster.replica_table("t1").unwrap().location,
        loc("/replica_external_base/ext/t1")
    );

    // managed tables keep their warehouse location and stay out of the manifest
    let m1 = cluster.replica_table("m1").unwrap();
    assert_eq!(m1.kind, TableKind::Managed);
    assert_eq!(m1.location, loc("/warehouse/primary_db.db/m1"));
}

/// A partition placed outside its table directory is rebased on its own path.
#[test]
fn test_custom_partition_location_is_rebased_on_its_own_path() {
    let cluster = Cluster::new();
    cluster.primary.create_table(PRIMARY_DB, t2()).unwrap();
    cluster
        .primary
        .add_partition(
            PRIMARY_DB,
            "t2",
            country("japan"),
            Some(loc("/archive/japan")),
        )
        .unwrap();

    let options = with_external();
    let watermark = cluster.cycle(None, &options);
    assert_eq!(watermark, cluster.primary.events().latest().unwrap());

    let partition = cluster.replica_partition("t2", &country("japan")).unwrap();
    assert_eq!(partition.location, loc("/replica_external_base/archive/japan"));
}

/// CREATE TABLE AS SELECT on an external table replicates like a create.
#[test]
fn test_ctas_external_table_replicates() {
    let cluster = Cluster::new();
    let options = with_external();
    let first = cluster.cycle(None, &options);

    cluster
        .primary
        .create_table_as_select(
            PRIMARY_DB,
            TableDefinition::external("t3", vec![Column::new("id", "int")])
                .located_at(loc("/ext/t3")),
            &["7", "8", "9"],
        )
        .unwrap();

    let dump = cluster.dump(Some(first), &options);
    assert_eq!(dump.kind, DumpKind::Incremental);
    let manifest = incremental_manifest_path(&dump.dump_location).unwrap();
    assert_eq!(cluster.manifest_tables(&manifest), Some(vec!["t3".to_string()]));

    cluster.load(&dump, &options);
    assert_eq!(
        cluster.replica_table("t3").unwrap().location,
        loc("/replica_external_base/ext/t3")
    );
}

// =============================================================================
// Location changes and drops
// =============================================================================

/// Moving a table to an empty directory leaves the replica reading nothing
/// while the old data stays where it was.
#[test]
fn test_alter_location_to_empty_path_reads_no_rows() {
    let cluster = Cluster::new();
    cluster.primary.create_table(PRIMARY_DB, t1()).unwrap();
    cluster
        .primary
        .insert(PRIMARY_DB, "t1", None, &["1", "2"])
        .unwrap();

    // unrebased so the replica reads the primary's files
    let options = with_external_unrebased();
    let first = cluster.cycle(None, &options);
    assert_eq!(
        cluster.replica_view.select(REPLICA_DB, "t1").unwrap(),
        vec!["1".to_string(), "2".to_string()]
    );

    cluster
        .primary
        .alter_table_location(PRIMARY_DB, "t1", loc("/ext/t1_moved"))
        .unwrap();
    cluster.cycle(Some(first), &options);

    assert_eq!(cluster.replica_table("t1").unwrap().location, loc("/ext/t1_moved"));
    assert!(cluster.replica_view.select(REPLICA_DB, "t1").unwrap().is_empty());

    let old_files = cluster.fs.list(&loc("/ext/t1")).unwrap();
    assert_eq!(old_files.len(), 1);
    let content = cluster.fs.read(&old_files[0]).unwrap();
    assert_eq!(content, b"1\n2\n");
}

/// A partition location change is rebased like the table's.
#[test]
fn test_alter_partition_location_is_rebased() {
    let cluster = Cluster::new();
    seed_t1_t2(&cluster);
    let options = with_external();
    let first = cluster.cycle(None, &options);

    cluster
        .primary
        .alter_partition_location(PRIMARY_DB, "t2", &country("us"), loc("/ext/t2_us_v2"))
        .unwrap();
    cluster.cycle(Some(first), &options);

    assert_eq!(
        cluster.replica_partition("t2", &country("us")).unwrap().location,
        loc("/replica_external_base/ext/t2_us_v2")
    );
    assert_eq!(
        cluster.replica_partition("t2", &country("india")).unwrap().location,
        loc("/replica_external_base/ext/t2/country=india")
    );
}

/// Dropping a partition removes its metadata but never its data.
#[test]
fn test_drop_partition_keeps_replica_data() {
    let cluster = Cluster::new();
    seed_t1_t2(&cluster);
    let options = with_external();
    let first = cluster.cycle(None, &options);

    // stands in for the data copy into the replica base
    let replica_dir = loc("/replica_external_base/ext/t2/country=us");
    cluster
        .fs
        .write(&replica_dir.join("part-copied").unwrap(), b"us\n")
        .unwrap();

    cluster
        .primary
        .drop_partition(PRIMARY_DB, "t2", &country("us"))
        .unwrap();
    cluster.cycle(Some(first), &options);

    assert!(cluster.replica_partition("t2", &country("us")).is_none());
    assert!(cluster.replica_partition("t2", &country("india")).is_some());
    assert!(cluster.exists(&replica_dir));
    assert!(cluster.exists(&loc("/ext/t2/country=us")));
}

/// Dropping an external table on the primary keeps its files on both sides.
#[test]
fn test_drop_external_table_keeps_data() {
    let cluster = Cluster::new();
    seed_t1_t2(&cluster);
    let options = with_external_unrebased();
    let first = cluster.cycle(None, &options);

    cluster.primary.drop_table(PRIMARY_DB, "t1").unwrap();
    cluster.cycle(Some(first), &options);

    assert!(cluster.replica_table("t1").is_none());
    assert_eq!(cluster.fs.list(&loc("/ext/t1")).unwrap().len(), 1);
}

/// With replication disabled, later external events stay off the replica
/// while managed ones still flow.
#[test]
fn test_disabled_incremental_filters_external_events() {
    let cluster = Cluster::new();
    let options = without_external();
    let first = cluster.cycle(None, &options);

    seed_t1_t2(&cluster);
    cluster
        .primary
        .create_table(
            PRIMARY_DB,
            TableDefinition::managed("m1", vec![Column::new("id", "int")]),
        )
        .unwrap();

    let dump = cluster.dump(Some(first), &options);
    assert!(!cluster.exists(&incremental_manifest_path(&dump.dump_location).unwrap()));
    cluster.load(&dump, &options);

    assert!(cluster.replica_table("t1").is_none());
    assert!(cluster.replica_table("t2").is_none());
    assert!(cluster.replica_table("m1").is_some());
    assert_eq!(cluster.replica_watermark(), Some(dump.last_replication_id));
}
