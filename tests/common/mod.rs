#![allow(dead_code)]

use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use tempfile::TempDir;
use txn_summary::{
    config::{Config, ConfigManager},
    core::ReportManager,
    domain::{MerchantId, TransactionRecord},
    storage::JsonDocumentStore,
};

pub const MERCHANT: &str = "65a1b2c3d4e5f60718293a4b";
pub const OTHER_MERCHANT: &str = "65a1b2c3d4e5f60718293a4c";

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub struct TestEnv {
    pub manager: ReportManager,
    pub store: JsonDocumentStore,
    pub config: Config,
}

/// Creates a manager backed by a unique directory for each test.
pub fn setup_test_env() -> TestEnv {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);

    let configs = ConfigManager::with_base_dir(base).expect("config manager for temp dir");
    let config = Config::default();
    let store = JsonDocumentStore::new(configs.data_dir()).expect("json document store");
    let manager = ReportManager::new(config.clone(), &store).expect("report manager");
    TestEnv {
        manager,
        store,
        config,
    }
}

pub fn merchant(id: &str) -> MerchantId {
    MerchantId::parse(id).expect("valid merchant id")
}

pub fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn txn(id: &str, amount: i64, at: DateTime<Utc>) -> TransactionRecord {
    TransactionRecord::new(merchant(id), Decimal::from(amount), at)
}
