//! Remote-to-local status mapping.
//!
//! The gateway reports status as a free-form string, and its vocabulary differs between charges
//! and invoices. This module owns the mapping onto local [`PaymentStatus`] values. The rule for
//! anything unlisted is deliberate: an unknown remote status maps to `Pending`, never to `Paid`
//! or `Failed`, so an unexpected vocabulary change can delay settlement but can never move money
//! or fail a customer's payment.

use crate::db_types::{PaymentMethod, PaymentStatus};

/// Maps a remote charge status onto the local payment status. Case-insensitive.
pub fn map_charge_status(remote: &str) -> PaymentStatus {
    match remote.to_ascii_lowercase().as_str() {
        "captured" | "authorized" => PaymentStatus::Paid,
        "declined" | "failed" | "cancelled" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

/// Maps a remote invoice status onto the local payment status. Case-insensitive.
pub fn map_invoice_status(remote: &str) -> PaymentStatus {
    match remote.to_ascii_lowercase().as_str() {
        "paid" | "closed" => PaymentStatus::Paid,
        "cancelled" | "expired" | "failed" | "declined" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

/// Dispatches to the correct vocabulary for the record's method. Non-gateway methods have no
/// remote vocabulary; their status never comes from this mapping.
pub fn map_remote_status(method: PaymentMethod, remote: &str) -> Option<PaymentStatus> {
    match method {
        PaymentMethod::GatewayCharge => Some(map_charge_status(remote)),
        PaymentMethod::GatewayInvoice => Some(map_invoice_status(remote)),
        _ => None,
    }
}

/// Whether a remote invoice status means the invoice is still live and payable.
pub fn invoice_still_open(remote: &str) -> bool {
    map_invoice_status(remote) == PaymentStatus::Pending
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::PaymentStatus::*;

    #[test]
    fn charge_mapping_table() {
        for (remote, expected) in [
            ("captured", Paid),
            ("authorized", Paid),
            ("declined", Failed),
            ("failed", Failed),
            ("cancelled", Failed),
            ("pending", Pending),
            ("initiated", Pending),
        ] {
            assert_eq!(map_charge_status(remote), expected, "charge status {remote}");
            assert_eq!(map_charge_status(&remote.to_uppercase()), expected, "charge status {remote} (uppercase)");
        }
    }

    #[test]
    fn invoice_mapping_table() {
        for (remote, expected) in [
            ("paid", Paid),
            ("closed", Paid),
            ("cancelled", Failed),
            ("expired", Failed),
            ("failed", Failed),
            ("declined", Failed),
            ("pending", Pending),
            ("sent", Pending),
            ("open", Pending),
        ] {
            assert_eq!(map_invoice_status(remote), expected, "invoice status {remote}");
            assert_eq!(map_invoice_status(&remote.to_uppercase()), expected, "invoice status {remote} (uppercase)");
        }
    }

    #[test]
    fn unknown_statuses_never_settle() {
        for remote in ["", "on-hold", "chargeback", "REVIEW", "weird new status"] {
            assert_eq!(map_charge_status(remote), Pending);
            assert_eq!(map_invoice_status(remote), Pending);
        }
    }

    #[test]
    fn only_gateway_methods_map() {
        assert_eq!(map_remote_status(PaymentMethod::GatewayCharge, "captured"), Some(Paid));
        assert_eq!(map_remote_status(PaymentMethod::GatewayInvoice, "expired"), Some(Failed));
        assert_eq!(map_remote_status(PaymentMethod::Wallet, "captured"), None);
        assert_eq!(map_remote_status(PaymentMethod::Cash, "paid"), None);
    }

    #[test]
    fn open_invoice_detection() {
        assert!(invoice_still_open("SENT"));
        assert!(invoice_still_open("open"));
        assert!(invoice_still_open("pending"));
        assert!(!invoice_still_open("PAID"));
        assert!(!invoice_still_open("expired"));
    }
}
