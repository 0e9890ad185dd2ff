use anyhow::{Context, Result};
use chrono::Local;
use models::{
    AggregatedAdPerformance, Client, ClientId, ClientSummary, LookerDataByClient, RecordsByClient,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::{fs, path::Path};
use tracing::info;
use utils::store::{TABLE_CLIENTS, TABLE_LOOKER_DATA, TABLE_PERFORMANCE_DATA};
use utils::{JsonDirBackend, Store, StoreBackend};

mod ads;
mod demographics;
mod summary;

pub use ads::{ad_group_name, aggregate_ads, CreativeFilter};
pub use demographics::demographics_for_ad;
pub use summary::{summarize_clients, WarehouseClientTotals, WarehouseTotals};

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `n / d`, or 0 when the denominator is zero.
pub fn ratio(n: f64, d: f64) -> f64 {
    if d == 0.0 || !d.is_finite() {
        0.0
    } else {
        n / d
    }
}

pub fn pct(n: f64, d: f64) -> f64 {
    ratio(n, d) * 100.0
}

#[derive(Debug, Serialize)]
pub struct DashboardMetadata {
    pub generated_at: String,
    pub clients_count: usize,
    pub records_count: usize,
}

#[derive(Debug, Serialize)]
pub struct DashboardOutput {
    pub metadata: DashboardMetadata,
    pub clients: Vec<ClientSummary>,
    pub ads: BTreeMap<ClientId, Vec<AggregatedAdPerformance>>,
}

/// Client list plus the per-ad table of every client, read from `store`.
pub fn build_dashboard<B: StoreBackend>(store: &Store<B>, filter: CreativeFilter) -> Result<DashboardOutput> {
    let clients: Vec<Client> = store.get_or_default(TABLE_CLIENTS)?;
    let records: RecordsByClient = store.get_or_default(TABLE_PERFORMANCE_DATA)?;
    let looker: LookerDataByClient = store.get_or_default(TABLE_LOOKER_DATA)?;

    let summaries = summarize_clients(&clients, &records, &looker, None);
    let empty = BTreeMap::new();
    let ads = clients
        .iter()
        .map(|c| {
            let rows = records.get(&c.id).map(Vec::as_slice).unwrap_or_default();
            let links = looker.get(&c.id).unwrap_or(&empty);
            (c.id.clone(), aggregate_ads(rows, links, filter))
        })
        .collect();

    let metadata = DashboardMetadata {
        generated_at: Local::now().to_rfc3339(),
        clients_count: clients.len(),
        records_count: records.values().map(Vec::len).sum(),
    };
    Ok(DashboardOutput {
        metadata,
        clients: summaries,
        ads,
    })
}

pub fn generate_dashboard(data_dir: &Path, filter: CreativeFilter) -> Result<DashboardOutput> {
    let store = Store::new(JsonDirBackend::new(data_dir));
    let output = build_dashboard(&store, filter)
        .with_context(|| format!("Reading store at {}", data_dir.display()))?;
    info!(
        clients = output.metadata.clients_count,
        records = output.metadata.records_count,
        "dashboard generated"
    );
    Ok(output)
}

pub fn write_dashboard_json(output: &DashboardOutput, out_path: &Path) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(output)?;
    fs::write(out_path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::PerformanceRecord;
    use tempfile::tempdir;
    use utils::MemoryBackend;

    #[test]
    fn test_ratio_guards_zero() {
        assert_eq!(ratio(5.0, 0.0), 0.0);
        assert_eq!(pct(1.0, 4.0), 25.0);
        assert_eq!(round2(2.344), 2.34);
    }

    fn seeded_store() -> Store<MemoryBackend> {
        let store = Store::new(MemoryBackend::new());
        let clients = vec![Client {
            id: "c1".into(),
            name: "Acme".into(),
            currency: "EUR".into(),
            ..Default::default()
        }];
        let mut records = RecordsByClient::new();
        records.insert(
            "c1".into(),
            vec![
                PerformanceRecord {
                    unique_id: "r1".into(),
                    ad_name: "Ad A".into(),
                    day: "2025-07-01".into(),
                    spend: 10.0,
                    purchase_value: 30.0,
                    ..Default::default()
                },
                PerformanceRecord {
                    unique_id: "r2".into(),
                    ad_name: "Ad B".into(),
                    day: "2025-07-01".into(),
                    spend: 10.0,
                    purchase_value: 50.0,
                    ..Default::default()
                },
            ],
        );
        store.set(TABLE_CLIENTS, &clients).unwrap();
        store.set(TABLE_PERFORMANCE_DATA, &records).unwrap();
        store
    }

    #[test]
    fn test_build_dashboard() {
        let store = seeded_store();
        let out = build_dashboard(&store, CreativeFilter::All).unwrap();

        assert_eq!(out.metadata.clients_count, 1);
        assert_eq!(out.metadata.records_count, 2);
        assert_eq!(out.clients[0].total_spend, 20.0);
        assert_eq!(out.clients[0].roas, 4.0);

        let ads = &out.ads["c1"];
        assert_eq!(ads.len(), 2);
        assert_eq!(ads[0].ad_name, "Ad B");
    }

    #[test]
    fn test_write_dashboard_json() {
        let store = seeded_store();
        let out = build_dashboard(&store, CreativeFilter::All).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dashboard.json");
        write_dashboard_json(&out, &path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["clients"][0]["clientName"], "Acme");
        assert!(written["ads"]["c1"].is_array());
    }
}
