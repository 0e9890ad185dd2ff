use models::{Client, ClientSummary, LookerDataByClient, RecordsByClient, SummarySource};
use std::collections::BTreeSet;
use tracing::debug;

use crate::ads::ad_group_name;
use crate::{ratio, round2};

/// Client totals held by an external analytical store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarehouseClientTotals {
    pub spend: f64,
    pub purchase_value: f64,
    pub total_ads: usize,
}

impl WarehouseClientTotals {
    pub fn is_populated(&self) -> bool {
        self.total_ads > 0 || self.spend > 0.0
    }
}

/// Alternate source of per-client totals. Implementations return `None`
/// when they hold nothing for the client.
pub trait WarehouseTotals {
    fn client_totals(&self, client: &Client) -> Option<WarehouseClientTotals>;
}

/// One row per client for the client list: total spend, ROAS, ad count and
/// how many ads have a linked creative image.
///
/// Totals come from `warehouse` when it has populated data for the client,
/// otherwise from the local record set.
pub fn summarize_clients(
    clients: &[Client],
    records: &RecordsByClient,
    looker: &LookerDataByClient,
    warehouse: Option<&dyn WarehouseTotals>,
) -> Vec<ClientSummary> {
    clients
        .iter()
        .map(|client| {
            let rows = records.get(&client.id).map(Vec::as_slice).unwrap_or_default();
            let ad_names: BTreeSet<String> = rows.iter().map(ad_group_name).collect();

            let matched_count = looker.get(&client.id).map_or(0, |links| {
                ad_names
                    .iter()
                    .filter(|name| links.get(*name).is_some_and(|c| c.has_image()))
                    .count()
            });

            let from_warehouse = warehouse
                .and_then(|w| w.client_totals(client))
                .filter(WarehouseClientTotals::is_populated);

            let (spend, value, total_ads, source) = match from_warehouse {
                Some(t) => (t.spend, t.purchase_value, t.total_ads, SummarySource::Warehouse),
                None => (
                    rows.iter().map(|r| r.spend).sum::<f64>(),
                    rows.iter().map(|r| r.purchase_value).sum::<f64>(),
                    ad_names.len(),
                    SummarySource::Records,
                ),
            };
            debug!(client_id = %client.id, ?source, "client summary");

            ClientSummary {
                client_id: client.id.clone(),
                client_name: client.name.clone(),
                currency: client.currency.clone(),
                total_spend: round2(spend),
                roas: round2(ratio(value, spend)),
                total_ads,
                matched_count,
                source,
            }
        })
        .collect()
}
