pub mod po_cache;

pub use po_cache::PoDisplayCache;
