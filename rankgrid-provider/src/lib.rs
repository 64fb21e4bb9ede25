//! rankgrid Provider - Remote Data Client and Response Transformers
//!
//! The client performs one call against the remote metrics API, classifies
//! the outcome and records it through the usage recorder. Transformers turn
//! the provider's `;`-separated text into typed records from `rankgrid-core`.

pub mod client;
mod csv;
pub mod report;
pub mod transform;
pub mod transport;

pub use client::{parse_retry_after, RemoteCall, RemoteDataClient, DEFAULT_RETRY_AFTER_SECS};
pub use report::{ColumnKind, ColumnSpec, Layout, ReportSchema, ReportType};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
