//! rankgrid Billing - Quota Ledger and Usage Recorder
//!
//! The ledger decides whether a tenant may spend credits on a remote call;
//! the recorder writes what actually happened. Both work against the
//! [`KvStore`](rankgrid_storage::KvStore) contract and an injectable clock,
//! which determines the billing period.

pub mod ledger;
pub mod period;
pub mod recorder;

pub use ledger::{CategoryUsage, QuotaLedger, Reservation, UsageSummary};
pub use period::BillingPeriod;
pub use recorder::{Settlement, UsageEvent, UsageRecorder};
