pub mod clients;
pub mod headers;
pub mod identity;
pub mod records;
pub mod store;
pub mod values;

// Re-export commonly used items
pub use crate::clients::{match_client, merge_clients_with_deduplication, unknown_account_names};
pub use crate::headers::{field, header_index, map_headers, norm_header};
pub use crate::identity::{ad_id_from_name, file_hash, make_record_id, RecordKey};
pub use crate::records::{
    filter_new_records, merge_records_with_deduplication, remove_records_by_ids, MergeStats,
};
pub use crate::store::{JsonDirBackend, MemoryBackend, Store, StoreBackend};
pub use crate::values::{
    excel_serial_to_date, normalize_name, to_date_iso, to_number_es, to_pct, to_seconds, RawValue,
};
