//! # Router Module
//!
//! Regex-based matching of request paths to the operations a contract
//! declares. The [`RouteIndex`] is built once per contract and shared,
//! read-only, by the request and response pipelines.
//!
//! A lookup has three outcomes:
//!
//! - [`RouteLookup::Matched`]: the path and method are declared; path
//!   parameters are extracted and percent-decoded
//! - [`RouteLookup::MethodNotAllowed`]: the path is declared under other methods
//! - [`RouteLookup::Unmanaged`]: the contract does not describe the path and
//!   the request is left alone
//!
//! ## Example
//!
//! ```rust,ignore
//! use brrtguard::router::{RouteIndex, RouteLookup};
//! use brrtguard::spec::load_contract;
//!
//! let doc = load_contract("openapi.yaml")?;
//! let index = RouteIndex::from_contract(&doc)?;
//! if let RouteLookup::Matched(m) = index.lookup(&http::Method::GET, "/pets/123") {
//!     println!("{} {:?}", m.route.path_pattern, m.path_params);
//! }
//! ```

mod core;

pub use core::{RouteIndex, RouteLookup, RouteMatch};
