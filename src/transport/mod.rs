// Transport module
// HTTP clients for upstream broker APIs
//
// Numan Thabit 2025 Nov

pub mod management;

pub use management::{ManagementClient, ManagementSettings};
