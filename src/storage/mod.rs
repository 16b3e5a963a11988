// =============================================================================
// Persistence adapters — wide-column, KV, and relational tiers
// =============================================================================

pub mod cassandra;
pub mod postgres;
pub mod redis_store;

pub use cassandra::MarketStore;
pub use postgres::FundamentalsStore;
pub use redis_store::AggregateStore;
