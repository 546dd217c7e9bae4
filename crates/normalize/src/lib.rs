//! tstream - Normalize
//!
//! A library of shape-preserving transforms that run on raw device responses
//! after retrieval. Every transform is a pure function `(data, opts) -> data`
//! over `serde_json::Value`; transforms compose freely and never touch global
//! state.
//!
//! Where a value is genuinely absent, transforms that promise a value return
//! the string `"missing data"` instead of erroring, so one unpopulated stat
//! never sinks a whole poll cycle.

mod asm;
mod csv;
mod device;
mod error;
mod filter;
mod map_by_key;
mod members;
mod percent;
mod rename;
mod throughput;

pub use asm::{asm_last_change, asm_state};
pub use csv::{csv_to_json, json_to_csv};
pub use device::{MISSING_DATA, get_value, normalize_mac, restructure_host_cpu_info};
pub use error::{NormalizeError, Result};
pub use filter::{FilterOpts, filter_keys};
pub use map_by_key::{ArrayToMapOpts, array_to_map};
pub use members::restructure_member_refs;
pub use percent::{PercentOpts, percent_from_keys};
pub use rename::{RenameEntry, RenamePatterns, rename_keys, rename_keys_by_regex};
pub use throughput::{throughput_post_process, throughput_pre_process};
