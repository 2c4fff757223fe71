//! Correlation-id recovery.
//!
//! The gateway occasionally omits the object id from the field we persist at creation time while
//! still including it somewhere in the response body. Before failing a record as unreconcilable,
//! the reconciler digs through the cached raw snapshot looking for the id in the places the
//! gateway is known to put it.

use serde_json::Value;

use crate::db_types::{PaymentMethod, PaymentRecord};

/// Attempts to recover the gateway correlation id for a record that is missing one, by parsing
/// its cached raw-response snapshot. Returns `None` if the snapshot is absent, unparseable, or
/// holds no usable id.
pub fn recover_correlation_id(record: &PaymentRecord) -> Option<String> {
    let raw = record.raw_response.as_deref()?;
    let value: Value = serde_json::from_str(raw).ok()?;
    let paths: &[&[&str]] = match record.method {
        PaymentMethod::GatewayInvoice => &[&["id"], &["invoice", "id"], &["data", "invoice", "id"]],
        PaymentMethod::GatewayCharge => {
            &[&["id"], &["charge", "id"], &["transaction", "id"], &["data", "charge", "id"]]
        },
        _ => return None,
    };
    paths.iter().find_map(|path| {
        let mut v = &value;
        for key in *path {
            v = &v[*key];
        }
        v.as_str().filter(|s| !s.is_empty()).map(String::from)
    })
}
