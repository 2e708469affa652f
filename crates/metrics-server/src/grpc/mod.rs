//! `tonic` service mirroring the HTTP contract (SPEC_FULL.md §6). Shares
//! the scenarios layer and repository with the HTTP router; trusted-subnet
//! admission reads the `x-real-ip` metadata key instead of a header.

mod convert;
mod service;

pub use service::MetricsGrpcService;

pub mod proto {
    tonic::include_proto!("metrics");
}
