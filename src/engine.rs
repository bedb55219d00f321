// 🏭 Quote Engine - Request in, verified quote out
//
// One call = one snapshot. Resolve, validate, derive, price, aggregate,
// verify, assemble. Nothing is read from disk or the network while a
// quote is being computed.

use crate::catalog::{Component, ProductCategory, ProductRecord};
use crate::config::EngineConfig;
use crate::error::{QuoteError, QuoteResult};
use crate::knowledge::{
    KnowledgeConflict, KnowledgeResolver, KnowledgeSnapshot, KnowledgeSource, KnowledgeStore,
    LookupScope, ProductQuery, Resolved,
};
use crate::pricing::{LinePricer, PricedLine, PricingEngine, PricingInput};
use crate::quantities::{derive_quantities, linear_pieces, rivets_for};
use crate::request::Dimensions;
use crate::quote::{Quote, QuoteAssembler, QuoteDraft};
use crate::request::{ProductSelection, QuantityIntent, QuoteRequest};
use crate::structural::{StructuralCheck, StructuralValidator};
use crate::verification::Verifier;
use std::sync::Arc;
use tracing::{debug, info};

pub struct QuoteEngine {
    config: EngineConfig,
    store: KnowledgeStore,
    pricer: Box<dyn LinePricer>,
    aggregator: PricingEngine,
    structural: StructuralValidator,
    verifier: Verifier,
}

/// Lines and context collected while walking a request
#[derive(Default)]
struct Sections {
    panels: Vec<PricedLine>,
    accessories: Vec<PricedLine>,
    fixings: Vec<PricedLine>,
    checks: Vec<StructuralCheck>,
    conflicts: Vec<KnowledgeConflict>,
}

impl Sections {
    /// Route by the resolved record's category, not the priced line's
    fn push(&mut self, priced: PricedLine) {
        match priced.input.record.category {
            ProductCategory::Panel => self.panels.push(priced),
            ProductCategory::Accessory => self.accessories.push(priced),
            ProductCategory::Fixing => self.fixings.push(priced),
        }
    }

    fn note_conflicts(&mut self, conflicts: &[KnowledgeConflict]) {
        for conflict in conflicts {
            if !self.conflicts.contains(conflict) {
                self.conflicts.push(conflict.clone());
            }
        }
    }
}

impl QuoteEngine {
    pub fn new(config: EngineConfig, store: KnowledgeStore) -> Self {
        QuoteEngine {
            pricer: Box::new(PricingEngine::new(config.tax_rate, config.shipping_cost)),
            aggregator: PricingEngine::new(config.tax_rate, config.shipping_cost),
            structural: StructuralValidator::new(config.safety_margin),
            verifier: Verifier::new(
                config.tax_rate,
                config.shipping_cost,
                config.rounding_tolerance,
            ),
            config,
            store,
        }
    }

    /// Swap the line pricer (verification keeps its own formulas)
    pub fn with_pricer(mut self, pricer: Box<dyn LinePricer>) -> Self {
        self.pricer = pricer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    /// Check load-time price invariants, then swap the snapshot
    pub fn reload(&self, sources: Vec<KnowledgeSource>) -> QuoteResult<Arc<KnowledgeSnapshot>> {
        for source in &sources {
            source.check_price_invariants(self.config.tax_rate, self.config.price_tolerance)?;
        }
        self.store.reload(sources)
    }

    pub fn lookup_product(&self, sku: &str) -> QuoteResult<Resolved<ProductRecord>> {
        let snapshot = self.store.snapshot();
        let resolver = snapshot.resolver(self.config.conflict_tolerance);
        resolver.resolve_product(&ProductQuery::Sku(sku.to_string()), &LookupScope::All)
    }

    pub fn conflict_report(&self) -> Vec<KnowledgeConflict> {
        let snapshot = self.store.snapshot();
        snapshot
            .resolver(self.config.conflict_tolerance)
            .conflict_report()
    }

    /// Price one line and keep what it was priced from for verification
    fn price(
        &self,
        product: &Resolved<ProductRecord>,
        quantity: u64,
        dimensions: Option<&Dimensions>,
        component: Option<Component>,
    ) -> QuoteResult<PricedLine> {
        let mut line = self.pricer.price_line_item(product, quantity, dimensions)?;
        line.component = component;
        Ok(PricedLine {
            input: PricingInput {
                record: product.value.clone(),
                quantity,
                area_m2: dimensions.map(|d| d.area_m2),
            },
            line,
        })
    }

    /// Quote against the current snapshot
    pub fn quote(&self, request: &QuoteRequest) -> QuoteResult<Quote> {
        let snapshot = self.store.snapshot();
        self.quote_with_snapshot(request, &snapshot)
    }

    /// Quote against an explicit snapshot; same inputs, same quote
    pub fn quote_with_snapshot(
        &self,
        request: &QuoteRequest,
        snapshot: &KnowledgeSnapshot,
    ) -> QuoteResult<Quote> {
        request.validate()?;

        let resolver = snapshot.resolver(self.config.conflict_tolerance);
        let scope = LookupScope::All;
        let mut sections = Sections::default();

        for (index, item) in request.items.iter().enumerate() {
            let product = resolver.resolve_product(&item.product, &scope)?;
            sections.note_conflicts(&product.conflicts);
            debug!(index, sku = %product.value.sku, "selection resolved");

            match item.intent {
                QuantityIntent::Area { .. } | QuantityIntent::Surface { .. } => {
                    self.quote_surface(&resolver, &scope, item, &product, &mut sections)?
                }
                QuantityIntent::Count { units } => {
                    sections.push(self.price(&product, units, None, None)?);
                }
                QuantityIntent::LinearRun { length_m } => {
                    let pieces = linear_pieces(&product.value, length_m)?;
                    sections.push(self.price(&product, pieces, None, None)?);
                }
            }
        }

        let totals = self.aggregator.aggregate(
            sections
                .panels
                .iter()
                .chain(sections.accessories.iter())
                .chain(sections.fixings.iter())
                .map(|priced| &priced.line),
        );

        let report = self.verifier.verify(
            &sections.panels,
            &sections.accessories,
            &sections.fixings,
            &totals,
        );
        debug!("{}", report.summary());

        let draft = QuoteDraft {
            reference: request.reference.clone(),
            panels: sections.panels,
            accessories: sections.accessories,
            fixings: sections.fixings,
            totals,
            tax_rate: self.config.tax_rate,
            currency: self.config.currency.clone(),
            structural_checks: sections.checks,
            conflicts: sections.conflicts,
            generation: snapshot.generation,
        };

        let quote = QuoteAssembler::assemble(draft, &report)?;
        info!(
            generation = quote.generation,
            lines = quote.line_count(),
            grand_total = %quote.totals.grand_total,
            fingerprint = %quote.fingerprint,
            "quote issued"
        );
        Ok(quote)
    }

    /// Panel surface: structural gate, BOM derivation, panel and component lines
    fn quote_surface(
        &self,
        resolver: &KnowledgeResolver<'_>,
        scope: &LookupScope,
        item: &ProductSelection,
        product: &Resolved<ProductRecord>,
        sections: &mut Sections,
    ) -> QuoteResult<()> {
        let record = &product.value;
        if !record.is_panel() {
            return Err(QuoteError::invalid_dimension(
                "intent",
                format!("{} is not a panel and cannot cover a surface", record.sku),
            ));
        }

        let dimensions = item
            .intent
            .dimensions()?
            .ok_or_else(|| QuoteError::invalid_dimension("intent", "surface without dimensions"))?;
        let span_m = item
            .span_m
            .ok_or_else(|| QuoteError::invalid_dimension("span_m", "required for a panel surface"))?;

        let (check, limit) =
            self.structural
                .validate(resolver, &record.family, record.thickness_mm, span_m, scope)?;
        sections.note_conflicts(&limit.conflicts);
        sections.checks.push(check);

        let quantities = derive_quantities(
            record,
            &limit.value,
            span_m,
            dimensions.width_m,
            dimensions.length_m,
        )?;
        debug!(sku = %record.sku, ?quantities, "quantities derived");

        sections.push(self.price(product, quantities.panel_count, Some(&dimensions), None)?);

        // Rivets only fasten the drip-edge pieces this surface actually gets
        let mut trim_pieces = 0u64;
        for component in Component::ALL {
            let Some(rule) = resolver.resolve_component(&record.family, component, scope)? else {
                continue;
            };
            sections.note_conflicts(&rule.conflicts);

            let quantity = match component {
                Component::Rivet => rivets_for(trim_pieces)?,
                other => quantities.for_component(other),
            };
            if quantity == 0 {
                continue;
            }

            let part = resolver.resolve_product(&ProductQuery::Sku(rule.value.sku.clone()), scope)?;
            sections.note_conflicts(&part.conflicts);

            if matches!(component, Component::FrontDripEdge | Component::LateralDripEdge) {
                trim_pieces = trim_pieces.checked_add(quantity).ok_or_else(|| {
                    QuoteError::invalid_dimension("trim_pieces", "piece count overflows")
                })?;
            }
            sections.push(self.price(&part, quantity, None, Some(component))?);
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
