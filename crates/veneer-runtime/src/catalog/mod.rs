//! Endpoint catalogs: data model and resolution stores.

pub mod store;
pub mod types;

pub use store::{CachingCatalogStore, CatalogStore, InMemoryCatalogStore};
pub use types::{
    CacheConfig, CacheVisibility, Catalog, Endpoint, EndpointKind, MatchCondition, ProxyConfig,
    ProxyHeaderRules, ResponseRule,
};
