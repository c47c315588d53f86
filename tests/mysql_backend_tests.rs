//! Integration tests against a live MySQL server.
//!
//! These tests need a MySQL (or MariaDB) server and a user allowed to create
//! and drop databases. Set AUTHGUARD_TEST_DATABASE_URL to connect; without
//! it every test returns early.
//!
//! Run with: AUTHGUARD_TEST_DATABASE_URL=mysql://root@localhost cargo test --test mysql_backend_tests

use authguard::db::{AUTH_TABLE, Extra, KeyRole, MySqlPool, Nullability};
use authguard::{
    AuthBackend, CredentialStore, MySqlBackend, NonconformancePolicy, PasswordHasher,
    SchemaGuardian,
};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};

const TEST_URL_VAR: &str = "AUTHGUARD_TEST_DATABASE_URL";

/// A throwaway database, one per test so tests can run in parallel.
struct ScratchDb {
    admin: MySqlPool,
    name: String,
    backend: MySqlBackend,
}

impl ScratchDb {
    async fn create(tag: &str) -> Option<Self> {
        let Ok(url) = std::env::var(TEST_URL_VAR) else {
            eprintln!("{TEST_URL_VAR} not set; skipping");
            return None;
        };
        let options: MySqlConnectOptions = url.parse().expect("parse test database url");
        let admin = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await
            .expect("connect to test server");

        let name = format!("authguard_test_{tag}_{}", std::process::id());
        sqlx::raw_sql(&format!("DROP DATABASE IF EXISTS `{name}`"))
            .execute(&admin)
            .await
            .expect("drop stale scratch database");
        sqlx::raw_sql(&format!("CREATE DATABASE `{name}`"))
            .execute(&admin)
            .await
            .expect("create scratch database");

        let pool = MySqlPoolOptions::new()
            .max_connections(8)
            .connect_with(options.database(&name))
            .await
            .expect("connect to scratch database");
        Some(Self {
            admin,
            name,
            backend: MySqlBackend::new(pool),
        })
    }

    fn guardian(&self) -> SchemaGuardian<MySqlBackend> {
        SchemaGuardian::new(self.backend.clone(), NonconformancePolicy::Repair)
    }

    fn store(&self) -> CredentialStore<MySqlBackend> {
        CredentialStore::new(self.backend.clone(), PasswordHasher::new())
    }

    async fn destroy(self) {
        self.backend.pool().close().await;
        sqlx::raw_sql(&format!("DROP DATABASE `{}`", self.name))
            .execute(&self.admin)
            .await
            .expect("drop scratch database");
    }
}

#[tokio::test]
async fn created_table_conforms_and_reports_metadata() {
    let Some(db) = ScratchDb::create("create").await else {
        return;
    };
    let g = db.guardian();

    assert!(!g.table_exists().await.unwrap());
    assert!(!g.check_conformance().await.unwrap());

    let report = g.create_table().await.unwrap();
    assert!(report.created);
    assert_eq!(report.applied.len(), 3);

    assert!(g.table_exists().await.unwrap());
    assert!(g.check_conformance().await.unwrap());

    let columns = g.describe_columns().await.unwrap();
    let fields: Vec<&str> = columns.iter().map(|c| &*c.field).collect();
    assert_eq!(fields, vec!["order", "id", "password"]);
    assert_eq!(columns[0].key, KeyRole::Primary);
    assert_eq!(columns[0].extra, Extra::AutoIncrement);
    assert_eq!(columns[2].column_type, "mediumtext");
    assert!(columns.iter().all(|c| c.null == Nullability::No));

    db.destroy().await;
}

#[tokio::test]
async fn fix_table_adds_missing_password_column() {
    let Some(db) = ScratchDb::create("fix").await else {
        return;
    };
    sqlx::raw_sql(
        "CREATE TABLE `auth` (\
           `order` int(11) NOT NULL AUTO_INCREMENT PRIMARY KEY, \
           `id` text NOT NULL\
         ) ENGINE=InnoDB",
    )
    .execute(db.backend.pool())
    .await
    .unwrap();
    let g = db.guardian();
    assert!(!g.check_conformance().await.unwrap());

    let report = g.fix_table().await.unwrap();
    assert!(!report.created);
    assert_eq!(
        report.applied,
        vec!["ALTER TABLE `auth` ADD `password` mediumtext NOT NULL".to_string()]
    );
    assert!(g.check_conformance().await.unwrap());
    assert!(g.fix_table().await.unwrap().is_noop());

    db.destroy().await;
}

#[tokio::test]
async fn registration_is_rejected_for_taken_id() {
    let Some(db) = ScratchDb::create("register").await else {
        return;
    };
    db.guardian().create_table().await.unwrap();
    let store = db.store();

    assert!(!store.exists_id("alice").await.unwrap());
    assert!(store.create_new_pair("alice", "correct horse").await.unwrap());
    assert!(!store.create_new_pair("alice", "battery staple").await.unwrap());

    assert!(store.exists_id("alice").await.unwrap());
    assert!(store.exists_pair("alice", "correct horse").await.unwrap());
    assert!(!store.exists_pair("alice", "battery staple").await.unwrap());

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM `auth`")
        .fetch_one(db.backend.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);

    db.destroy().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_of_one_id_admit_exactly_one() {
    let Some(db) = ScratchDb::create("race_same").await else {
        return;
    };
    db.guardian().create_table().await.unwrap();
    let store = db.store();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .create_new_pair("contested", &format!("pw-{i}"))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM `auth` WHERE `id` = 'contested'")
        .fetch_one(db.backend.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);

    db.destroy().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_of_distinct_ids_all_succeed() {
    let Some(db) = ScratchDb::create("race_distinct").await else {
        return;
    };
    db.guardian().create_table().await.unwrap();
    let store = db.store();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.create_new_pair(&format!("user-{i}"), "pw").await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().expect("registration failed"));
    }
    for i in 0..16 {
        assert!(db.backend.id_exists(AUTH_TABLE, &format!("user-{i}")).await.unwrap());
    }

    db.destroy().await;
}
