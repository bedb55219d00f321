// Panel Quote Engine - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod catalog;      // Products, rule tables, unit-basis vocabulary
pub mod config;       // Engine configuration (TOML + env)
pub mod db;           // Quote ledger (SQLite + audit events)
pub mod engine;       // Request → verified quote
pub mod error;        // QuoteError taxonomy
pub mod knowledge;    // Prioritized sources, snapshots, resolver
pub mod pricing;      // Line pricing and totals
pub mod quantities;   // BOM quantity derivation
pub mod quote;        // Quote model and assembler
pub mod request;      // Request types and validation
pub mod structural;   // Span validation
pub mod verification; // Independent recomputation

// Re-export commonly used types
pub use catalog::{
    Component, ComponentRule, ProductCategory, ProductRecord, StructuralLimit, UnitBasis,
};
pub use config::{EngineConfig, DEFAULT_CONFIG_FILE};
pub use db::{
    Event, QuoteSummary, StoredQuote,
    get_events_for_quote, get_quote, get_quote_by_fingerprint, insert_event, insert_quote,
    list_quotes, open_ledger, setup_database, verify_count,
};
pub use engine::QuoteEngine;
pub use error::{QuoteError, QuoteResult};
pub use knowledge::{
    KnowledgeConflict, KnowledgeResolver, KnowledgeSnapshot, KnowledgeSource, KnowledgeStore,
    LookupKey, LookupScope, ProductPattern, ProductQuery, Provenance, Record, Resolved,
    SourceSpec, load_sources,
};
pub use pricing::{
    LineItem, LinePricer, PricedLine, PricingEngine, PricingInput, Totals, round_money,
};
pub use quantities::{QuantitySet, derive_quantities, linear_pieces, rivets_for};
pub use quote::{Quote, QuoteAssembler, QuoteDraft};
pub use request::{Dimensions, ProductSelection, QuantityIntent, QuoteRequest};
pub use structural::{StructuralCheck, StructuralValidator};
pub use verification::{Discrepancy, DiscrepancyCategory, VerificationReport, Verifier};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
