//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering the token endpoint,
//! the Data Management base URL, the client authentication preference, and provider quirks
//! (scope delimiter). `strategy` defines [`ProviderStrategy`], an HTTP-client-agnostic hook used
//! by the issuer to augment outgoing token requests and map failures into the crate's error
//! taxonomy.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
