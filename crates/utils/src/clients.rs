use models::Client;
use std::collections::{BTreeSet, HashSet};

use crate::records::MergeStats;
use crate::values::normalize_name;

/// Finds the client whose account label matches `account_name` after name
/// normalization.
pub fn match_client<'a>(clients: &'a [Client], account_name: &str) -> Option<&'a Client> {
    let wanted = normalize_name(account_name);
    if wanted.is_empty() {
        return None;
    }
    clients
        .iter()
        .find(|c| normalize_name(c.account_label()) == wanted || normalize_name(&c.name) == wanted)
}

/// Distinct account names (first spelling wins, in input order) that match
/// no known client.
pub fn unknown_account_names<'a, I>(clients: &[Client], names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::new();

    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            continue;
        }
        if match_client(clients, trimmed).is_some() {
            continue;
        }
        if seen.insert(normalize_name(trimmed)) {
            out.push(trimmed.to_string());
        }
    }

    out
}

/// Merges new clients into an existing roster with duplicate detection.
/// Clients are duplicates if they share an `id` or a normalized account label.
pub fn merge_clients_with_deduplication(
    mut roster: Vec<Client>,
    new_clients: Vec<Client>,
) -> (Vec<Client>, MergeStats) {
    let mut ids: HashSet<String> = roster.iter().map(|c| c.id.clone()).collect();
    let mut labels: HashSet<String> = roster
        .iter()
        .map(|c| normalize_name(c.account_label()))
        .collect();

    let mut stats = MergeStats {
        total: new_clients.len(),
        ..Default::default()
    };

    for client in new_clients {
        let label = normalize_name(client.account_label());
        if ids.contains(&client.id) || labels.contains(&label) {
            stats.skipped += 1;
            continue;
        }
        ids.insert(client.id.clone());
        labels.insert(label);
        roster.push(client);
        stats.added += 1;
    }

    (roster, stats)
}
