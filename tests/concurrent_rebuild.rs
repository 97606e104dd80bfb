mod common;

use std::thread;

use chrono::Duration;
use common::{setup_test_env, txn, utc};
use txn_summary::{
    core::{services::RebuildReport, ReportManager},
    domain::{RebuildRequest, TenantScope},
    storage::{DocumentCollection, DocumentFilter, JsonDocumentStore},
};

const MERCHANTS: usize = 6;
const DAYS: i64 = 30;

fn merchant_id(idx: usize) -> String {
    format!("65a1b2c3d4e5f60718293a{idx:02x}")
}

#[test]
fn parallel_rebuilds_on_separate_handles_keep_every_document() {
    let env = setup_test_env();
    let start = utc(2024, 3, 25, 6);
    let records: Vec<_> = (0..MERCHANTS)
        .flat_map(|idx| {
            let id = merchant_id(idx);
            (0..DAYS).map(move |day| txn(&id, day + 1, start + Duration::days(day)))
        })
        .collect();
    env.manager.import(&records).unwrap();

    let root = env.store.root().to_path_buf();
    let scopes: Vec<TenantScope> = (0..MERCHANTS)
        .map(|idx| TenantScope::from_optional(Some(&merchant_id(idx))).unwrap())
        .chain([TenantScope::Global])
        .collect();

    let reports: Vec<RebuildReport> = thread::scope(|scope| {
        let handles: Vec<_> = scopes
            .iter()
            .map(|tenant| {
                let root = root.clone();
                let config = env.config.clone();
                scope.spawn(move || {
                    // Each job opens the store on its own, like separate CLI runs.
                    let store = JsonDocumentStore::new(root).unwrap();
                    let manager = ReportManager::new(config, &store).unwrap();
                    manager.rebuild(&RebuildRequest::all(tenant.clone())).unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    let summaries = env.store.collection(&env.config.summary_collection);
    let stored = summaries.find(&DocumentFilter::new()).unwrap();
    let requested: usize = reports.iter().map(|report| report.requested).sum();
    assert!(reports.iter().all(RebuildReport::is_complete));
    assert_eq!(stored.len(), requested);

    for report in &reports {
        let filter = match &report.scope {
            TenantScope::Global => DocumentFilter::new().exists("merchantId", false),
            TenantScope::Tenant(id) => DocumentFilter::new().eq("merchantId", id.as_str()),
        };
        assert_eq!(
            summaries.find(&filter).unwrap().len(),
            report.requested,
            "{}",
            report.scope
        );
    }
}

#[test]
fn rebuild_races_with_import_without_corrupting_the_log() {
    let env = setup_test_env();
    let root = env.store.root().to_path_buf();
    let id = merchant_id(0);
    let start = utc(2024, 3, 20, 6);

    thread::scope(|scope| {
        let writer_root = root.clone();
        let writer_config = env.config.clone();
        let writer_id = id.clone();
        scope.spawn(move || {
            let store = JsonDocumentStore::new(writer_root).unwrap();
            let manager = ReportManager::new(writer_config, &store).unwrap();
            for day in 0..DAYS {
                manager
                    .import(&[txn(&writer_id, 1, start + Duration::days(day))])
                    .unwrap();
            }
        });
        scope.spawn(|| {
            let store = JsonDocumentStore::new(root.clone()).unwrap();
            let manager = ReportManager::new(env.config.clone(), &store).unwrap();
            for _ in 0..5 {
                manager
                    .rebuild(&RebuildRequest::all(TenantScope::Global))
                    .unwrap();
            }
        });
    });

    let report = env
        .manager
        .rebuild(&RebuildRequest::all(TenantScope::Global))
        .unwrap();
    assert!(report.is_complete());
    let daily = env
        .store
        .collection(&env.config.summary_collection)
        .find(&DocumentFilter::new().eq("mode", "daily"))
        .unwrap();
    assert_eq!(daily.len(), DAYS as usize);
}
