//! Broker topic naming.

use sha1::{Digest, Sha1};

use crate::models::UasZonesFilter;

/// Topic name for a filter: SHA-1 hex digest of its canonical JSON.
///
/// Field order is fixed by the struct definition, so identical filters always
/// converge on the same topic, across processes and restarts.
pub fn topic_name(filter: &UasZonesFilter) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_vec(filter)?;
    Ok(format!("{:x}", Sha1::digest(&canonical)))
}
