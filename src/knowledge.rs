// 📚 Knowledge Resolver - Prioritized sources behind one immutable snapshot
//
// Lower priority number = more authority. The first source (in priority
// order) that defines an entity supplies the canonical value; every other
// source that disagrees is reported as a conflict, never merged.
//
// Reloads build a new snapshot and swap one Arc. A resolution call holds
// its own Arc, so it never sees two generations of data.

use crate::catalog::{Component, ComponentRule, ProductCategory, ProductRecord, RawProduct, StructuralLimit, UnitBasis};
use crate::error::{QuoteError, QuoteResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

// ============================================================================
// KNOWLEDGE SOURCE
// ============================================================================

/// One named, prioritized collection of products and rule tables
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeSource {
    pub id: String,
    pub priority: i32,
    pub version: Option<String>,
    products: Vec<ProductRecord>,
    structural_limits: Vec<StructuralLimit>,
    component_rules: Vec<ComponentRule>,
    #[serde(skip)]
    sku_index: HashMap<String, usize>,
}

/// JSON document layout of a source file
#[derive(Debug, Deserialize)]
struct SourceDocument {
    id: String,
    priority: i32,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    products: Vec<RawProduct>,
    #[serde(default)]
    structural_limits: Vec<StructuralLimit>,
    #[serde(default)]
    component_rules: Vec<ComponentRule>,
}

impl KnowledgeSource {
    /// Build a source, rejecting duplicates and malformed rule rows
    pub fn new(
        id: &str,
        priority: i32,
        version: Option<String>,
        products: Vec<ProductRecord>,
        structural_limits: Vec<StructuralLimit>,
        component_rules: Vec<ComponentRule>,
    ) -> QuoteResult<Self> {
        let invalid = |key: String, reason: String| QuoteError::InvalidRecord {
            source_id: id.to_string(),
            sku: key,
            reason,
        };

        let mut sku_index = HashMap::new();
        for (i, product) in products.iter().enumerate() {
            if sku_index.insert(product.sku.clone(), i).is_some() {
                return Err(invalid(product.sku.clone(), "duplicate SKU".to_string()));
            }
        }

        let structural_limits: Vec<StructuralLimit> = structural_limits
            .into_iter()
            .map(|mut limit| {
                limit.family = limit.family.trim().to_uppercase();
                limit
            })
            .collect();

        let mut seen_limits = HashSet::new();
        for limit in &structural_limits {
            let key = format!("{}/{}mm", limit.family, limit.thickness_mm);
            if limit.max_span_m <= Decimal::ZERO {
                return Err(invalid(key, "max span must be positive".to_string()));
            }
            if !seen_limits.insert((limit.family.clone(), limit.thickness_mm)) {
                return Err(invalid(key, "duplicate structural limit".to_string()));
            }
        }

        let component_rules: Vec<ComponentRule> = component_rules
            .into_iter()
            .map(|mut rule| {
                rule.family = rule.family.trim().to_uppercase();
                rule.sku = rule.sku.trim().to_string();
                rule
            })
            .collect();

        let mut seen_rules = HashSet::new();
        for rule in &component_rules {
            if !seen_rules.insert((rule.family.clone(), rule.component)) {
                return Err(invalid(
                    format!("{}/{}", rule.family, rule.component.as_str()),
                    "duplicate component rule".to_string(),
                ));
            }
        }

        Ok(KnowledgeSource {
            id: id.to_string(),
            priority,
            version,
            products,
            structural_limits,
            component_rules,
            sku_index,
        })
    }

    /// Parse a JSON source document
    pub fn from_json_str(content: &str, origin: &str) -> QuoteResult<Self> {
        let doc: SourceDocument =
            serde_json::from_str(content).map_err(|e| QuoteError::SourceLoad {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;

        let products = doc
            .products
            .into_iter()
            .map(|raw| raw.into_record(&doc.id))
            .collect::<QuoteResult<Vec<_>>>()?;

        Self::new(
            &doc.id,
            doc.priority,
            doc.version,
            products,
            doc.structural_limits,
            doc.component_rules,
        )
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> QuoteResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| QuoteError::SourceLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&content, &path.display().to_string())
    }

    /// Parse a CSV price list (products only; id and priority come from the caller)
    pub fn from_csv_reader<R: Read>(reader: R, id: &str, priority: i32) -> QuoteResult<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut products = Vec::new();

        for (line, result) in rdr.deserialize::<RawProduct>().enumerate() {
            let raw = result.map_err(|e| QuoteError::SourceLoad {
                path: format!("{} (row {})", id, line + 2),
                reason: e.to_string(),
            })?;
            products.push(raw.into_record(id)?);
        }

        Self::new(id, priority, None, products, Vec::new(), Vec::new())
    }

    pub fn from_csv_file<P: AsRef<Path>>(path: P, id: &str, priority: i32) -> QuoteResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| QuoteError::SourceLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_csv_reader(file, id, priority)
    }

    /// Every product must satisfy price_excl × (1 + tax) ≈ price_incl
    pub fn check_price_invariants(&self, tax_rate: Decimal, tolerance: Decimal) -> QuoteResult<()> {
        for product in &self.products {
            product
                .check_price_invariant(tax_rate, tolerance)
                .map_err(|reason| QuoteError::InvalidRecord {
                    source_id: self.id.clone(),
                    sku: product.sku.clone(),
                    reason,
                })?;
        }
        Ok(())
    }

    pub fn product(&self, sku: &str) -> Option<&ProductRecord> {
        self.sku_index.get(sku).map(|&i| &self.products[i])
    }

    pub fn products(&self) -> &[ProductRecord] {
        &self.products
    }

    pub fn find_products<'a>(&'a self, pattern: &'a ProductPattern) -> impl Iterator<Item = &'a ProductRecord> + 'a {
        self.products.iter().filter(move |p| pattern.matches(p))
    }

    pub fn structural_limit(&self, family: &str, thickness_mm: u32) -> Option<&StructuralLimit> {
        self.structural_limits
            .iter()
            .find(|l| l.family == family && l.thickness_mm == thickness_mm)
    }

    pub fn component_rule(&self, family: &str, component: Component) -> Option<&ComponentRule> {
        self.component_rules
            .iter()
            .find(|r| r.family == family && r.component == component)
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }
}

// ============================================================================
// SOURCE SPECS (command-line / config form of a source)
// ============================================================================

/// `path.json`, or `path.csv@id:priority` for a CSV price list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Json(PathBuf),
    Csv {
        path: PathBuf,
        id: String,
        priority: i32,
    },
}

impl SourceSpec {
    pub fn parse(spec: &str) -> QuoteResult<Self> {
        let spec = spec.trim();
        let invalid = |reason: &str| QuoteError::SourceLoad {
            path: spec.to_string(),
            reason: reason.to_string(),
        };

        let Some((path, label)) = spec.rsplit_once('@') else {
            if spec.is_empty() {
                return Err(invalid("empty source"));
            }
            return Ok(SourceSpec::Json(PathBuf::from(spec)));
        };

        let (id, priority) = label
            .split_once(':')
            .ok_or_else(|| invalid("expected path@id:priority"))?;
        let priority = priority
            .trim()
            .parse::<i32>()
            .map_err(|_| invalid("priority must be an integer"))?;
        if path.is_empty() || id.trim().is_empty() {
            return Err(invalid("expected path@id:priority"));
        }

        Ok(SourceSpec::Csv {
            path: PathBuf::from(path),
            id: id.trim().to_string(),
            priority,
        })
    }

    pub fn load(&self) -> QuoteResult<KnowledgeSource> {
        match self {
            SourceSpec::Json(path) => KnowledgeSource::from_json_file(path),
            SourceSpec::Csv { path, id, priority } => {
                KnowledgeSource::from_csv_file(path, id, *priority)
            }
        }
    }
}

/// Load every source named on the command line, in the order given
pub fn load_sources(specs: &[SourceSpec]) -> QuoteResult<Vec<KnowledgeSource>> {
    specs.iter().map(SourceSpec::load).collect()
}

// ============================================================================
// QUERIES
// ============================================================================

/// Structured product search: family + thickness + optional filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPattern {
    pub family: String,
    pub thickness_mm: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ProductCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_basis: Option<UnitBasis>,
}

impl ProductPattern {
    pub fn matches(&self, product: &ProductRecord) -> bool {
        product.family.eq_ignore_ascii_case(self.family.trim())
            && product.thickness_mm == self.thickness_mm
            && self.category.map_or(true, |c| product.category == c)
            && self.unit_basis.map_or(true, |b| product.unit_basis == b)
            && self.subcategory.as_ref().map_or(true, |wanted| {
                product
                    .subcategory
                    .as_ref()
                    .map_or(false, |s| s.eq_ignore_ascii_case(wanted.trim()))
            })
    }

    pub fn describe(&self) -> String {
        let mut text = format!("{}/{}mm", self.family.trim().to_uppercase(), self.thickness_mm);
        if let Some(category) = self.category {
            text.push_str(&format!("/{}", category.as_str()));
        }
        if let Some(sub) = &self.subcategory {
            text.push_str(&format!("/{}", sub));
        }
        if let Some(basis) = self.unit_basis {
            text.push_str(&format!("/{}", basis.as_str()));
        }
        text
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductQuery {
    Sku(String),
    Pattern(ProductPattern),
}

impl ProductQuery {
    pub fn describe(&self) -> String {
        match self {
            ProductQuery::Sku(sku) => format!("SKU {}", sku),
            ProductQuery::Pattern(pattern) => format!("pattern {}", pattern.describe()),
        }
    }
}

/// Anything the resolver can look up
#[derive(Debug, Clone, PartialEq)]
pub enum LookupKey {
    Product(ProductQuery),
    StructuralLimit { family: String, thickness_mm: u32 },
    Component { family: String, component: Component },
}

/// Which sources a lookup may consult
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LookupScope {
    #[default]
    All,
    Only(Vec<String>),
}

impl LookupScope {
    fn admits(&self, source: &KnowledgeSource) -> bool {
        match self {
            LookupScope::All => true,
            LookupScope::Only(ids) => ids.iter().any(|id| id == &source.id),
        }
    }
}

// ============================================================================
// RESOLUTION RESULTS
// ============================================================================

/// Which source supplied a value, and from which snapshot generation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub source_id: String,
    pub priority: i32,
    pub generation: u64,
}

/// A lower-authority source disagreeing with the canonical value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeConflict {
    /// SKU or rule key the conflict is about
    pub entity: String,
    pub field: String,
    pub canonical_source: String,
    pub canonical_value: String,
    pub source_id: String,
    pub priority: i32,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Record {
    Product(ProductRecord),
    StructuralLimit(StructuralLimit),
    Component(ComponentRule),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub provenance: Provenance,
    pub conflicts: Vec<KnowledgeConflict>,
}

impl<T> Resolved<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            provenance: self.provenance,
            conflicts: self.conflicts,
        }
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Immutable, priority-ordered view of all loaded sources
#[derive(Debug, Clone)]
pub struct KnowledgeSnapshot {
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    sources: Vec<Arc<KnowledgeSource>>,
}

impl KnowledgeSnapshot {
    /// Order sources by (priority, id); ids must be unique
    pub fn build(mut sources: Vec<KnowledgeSource>, generation: u64) -> QuoteResult<Self> {
        let mut ids = HashSet::new();
        for source in &sources {
            if !ids.insert(source.id.clone()) {
                return Err(QuoteError::SourceLoad {
                    path: source.id.clone(),
                    reason: "duplicate source id".to_string(),
                });
            }
        }

        sources.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

        Ok(KnowledgeSnapshot {
            generation,
            loaded_at: Utc::now(),
            sources: sources.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn empty() -> Self {
        KnowledgeSnapshot {
            generation: 0,
            loaded_at: Utc::now(),
            sources: Vec::new(),
        }
    }

    pub fn sources(&self) -> &[Arc<KnowledgeSource>] {
        &self.sources
    }

    pub fn resolver(&self, conflict_tolerance: Decimal) -> KnowledgeResolver<'_> {
        KnowledgeResolver {
            snapshot: self,
            conflict_tolerance,
        }
    }

    fn provenance(&self, source: &KnowledgeSource) -> Provenance {
        Provenance {
            source_id: source.id.clone(),
            priority: source.priority,
            generation: self.generation,
        }
    }
}

// ============================================================================
// STORE (copy-on-write snapshot reference)
// ============================================================================

pub struct KnowledgeStore {
    current: RwLock<Arc<KnowledgeSnapshot>>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        KnowledgeStore {
            current: RwLock::new(Arc::new(KnowledgeSnapshot::empty())),
        }
    }

    /// Sources are taken as given; price invariants are checked by `QuoteEngine::reload`
    pub fn with_sources(sources: Vec<KnowledgeSource>) -> QuoteResult<Self> {
        let store = Self::new();
        store.reload(sources)?;
        Ok(store)
    }

    /// The current snapshot; callers keep it for the whole computation
    pub fn snapshot(&self) -> Arc<KnowledgeSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace every source at once. Readers see the old or the new snapshot, never a mix.
    ///
    /// The snapshot is built before the write lock is taken; the lock only
    /// covers numbering and the pointer swap. Like `with_sources`, this does
    /// not check price invariants.
    pub fn reload(&self, sources: Vec<KnowledgeSource>) -> QuoteResult<Arc<KnowledgeSnapshot>> {
        let mut next = KnowledgeSnapshot::build(sources, 0)?;

        let next = {
            let mut guard = match self.current.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            next.generation = guard.generation + 1;
            let next = Arc::new(next);
            *guard = Arc::clone(&next);
            next
        };

        info!(
            generation = next.generation,
            sources = next.sources.len(),
            "knowledge snapshot swapped"
        );
        Ok(next)
    }
}

impl Default for KnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct KnowledgeResolver<'a> {
    snapshot: &'a KnowledgeSnapshot,
    conflict_tolerance: Decimal,
}

impl<'a> KnowledgeResolver<'a> {
    /// Generic entry point over products and rule records
    pub fn lookup(&self, key: &LookupKey, scope: &LookupScope) -> QuoteResult<Resolved<Record>> {
        match key {
            LookupKey::Product(query) => Ok(self.resolve_product(query, scope)?.map(Record::Product)),
            LookupKey::StructuralLimit {
                family,
                thickness_mm,
            } => Ok(self
                .resolve_structural_limit(family, *thickness_mm, scope)?
                .map(Record::StructuralLimit)),
            LookupKey::Component { family, component } => self
                .resolve_component(family, *component, scope)?
                .map(|r| r.map(Record::Component))
                .ok_or_else(|| {
                    QuoteError::not_found(format!(
                        "component {} for family {}",
                        component.as_str(),
                        family.trim().to_uppercase()
                    ))
                }),
        }
    }

    pub fn resolve_product(
        &self,
        query: &ProductQuery,
        scope: &LookupScope,
    ) -> QuoteResult<Resolved<ProductRecord>> {
        let (source, product) = match query {
            ProductQuery::Sku(sku) => self
                .in_scope(scope)
                .find_map(|s| s.product(sku.trim()).map(|p| (s, p)))
                .ok_or_else(|| QuoteError::not_found(query.describe()))?,
            ProductQuery::Pattern(pattern) => self.first_pattern_match(pattern, scope)?,
        };

        let mut conflicts = Vec::new();
        for other in self.in_scope(scope).filter(|s| s.id != source.id) {
            if let Some(divergent) = other.product(&product.sku) {
                self.compare_products(source, product, other, divergent, &mut conflicts);
            }
        }

        debug!(
            sku = %product.sku,
            source = %source.id,
            conflicts = conflicts.len(),
            "product resolved"
        );
        Ok(self.finish(source, product.clone(), conflicts))
    }

    pub fn resolve_structural_limit(
        &self,
        family: &str,
        thickness_mm: u32,
        scope: &LookupScope,
    ) -> QuoteResult<Resolved<StructuralLimit>> {
        let family = family.trim().to_uppercase();
        let (source, limit) = self
            .in_scope(scope)
            .find_map(|s| s.structural_limit(&family, thickness_mm).map(|l| (s, l)))
            .ok_or_else(|| QuoteError::UnknownStructuralLimit {
                family: family.clone(),
                thickness_mm,
            })?;

        let entity = format!("{}/{}mm", family, thickness_mm);
        let mut conflicts = Vec::new();
        for other in self.in_scope(scope).filter(|s| s.id != source.id) {
            if let Some(divergent) = other.structural_limit(&family, thickness_mm) {
                if divergent.max_span_m != limit.max_span_m {
                    conflicts.push(conflict(
                        &entity,
                        "max_span_m",
                        source,
                        limit.max_span_m,
                        other,
                        divergent.max_span_m,
                    ));
                }
            }
        }

        Ok(self.finish(source, limit.clone(), conflicts))
    }

    /// None when no source declares the component for the family
    pub fn resolve_component(
        &self,
        family: &str,
        component: Component,
        scope: &LookupScope,
    ) -> QuoteResult<Option<Resolved<ComponentRule>>> {
        let family = family.trim().to_uppercase();
        let Some((source, rule)) = self
            .in_scope(scope)
            .find_map(|s| s.component_rule(&family, component).map(|r| (s, r)))
        else {
            return Ok(None);
        };

        let entity = format!("{}/{}", family, component.as_str());
        let mut conflicts = Vec::new();
        for other in self.in_scope(scope).filter(|s| s.id != source.id) {
            if let Some(divergent) = other.component_rule(&family, component) {
                if divergent.sku != rule.sku {
                    conflicts.push(conflict(&entity, "sku", source, &rule.sku, other, &divergent.sku));
                }
            }
        }

        Ok(Some(self.finish(source, rule.clone(), conflicts)))
    }

    /// Every SKU defined by more than one source with divergent values
    pub fn conflict_report(&self) -> Vec<KnowledgeConflict> {
        let skus: BTreeSet<&str> = self
            .snapshot
            .sources
            .iter()
            .flat_map(|s| s.products.iter().map(|p| p.sku.as_str()))
            .collect();

        let mut conflicts = Vec::new();
        for sku in skus {
            let mut defining = self
                .snapshot
                .sources
                .iter()
                .filter_map(|s| s.product(sku).map(|p| (s.as_ref(), p)));

            if let Some((source, canonical)) = defining.next() {
                for (other, divergent) in defining {
                    self.compare_products(source, canonical, other, divergent, &mut conflicts);
                }
            }
        }
        conflicts
    }

    fn in_scope<'s>(&'s self, scope: &'s LookupScope) -> impl Iterator<Item = &'a KnowledgeSource> + 's {
        self.snapshot
            .sources
            .iter()
            .map(|s| s.as_ref())
            .filter(move |s| scope.admits(s))
    }

    fn first_pattern_match(
        &self,
        pattern: &ProductPattern,
        scope: &LookupScope,
    ) -> QuoteResult<(&'a KnowledgeSource, &'a ProductRecord)> {
        for source in self.in_scope(scope) {
            let matches: Vec<&'a ProductRecord> = source
                .products
                .iter()
                .filter(|p| pattern.matches(p))
                .collect();
            match matches.as_slice() {
                [] => continue,
                [only] => return Ok((source, *only)),
                many => {
                    return Err(QuoteError::AmbiguousMatch {
                        pattern: pattern.describe(),
                        candidates: many.iter().map(|p| p.sku.clone()).collect(),
                    })
                }
            }
        }
        Err(QuoteError::not_found(format!("pattern {}", pattern.describe())))
    }

    fn compare_products(
        &self,
        source: &KnowledgeSource,
        canonical: &ProductRecord,
        other: &KnowledgeSource,
        divergent: &ProductRecord,
        conflicts: &mut Vec<KnowledgeConflict>,
    ) {
        let sku = canonical.sku.as_str();
        let tolerance = self.conflict_tolerance;

        if (canonical.price_excl_tax - divergent.price_excl_tax).abs() > tolerance {
            conflicts.push(conflict(
                sku,
                "price_excl_tax",
                source,
                canonical.price_excl_tax,
                other,
                divergent.price_excl_tax,
            ));
        }
        if (canonical.price_incl_tax - divergent.price_incl_tax).abs() > tolerance {
            conflicts.push(conflict(
                sku,
                "price_incl_tax",
                source,
                canonical.price_incl_tax,
                other,
                divergent.price_incl_tax,
            ));
        }
        if canonical.thickness_mm != divergent.thickness_mm {
            conflicts.push(conflict(
                sku,
                "thickness_mm",
                source,
                canonical.thickness_mm,
                other,
                divergent.thickness_mm,
            ));
        }
        if canonical.unit_basis != divergent.unit_basis {
            conflicts.push(conflict(
                sku,
                "unit_basis",
                source,
                canonical.unit_basis.as_str(),
                other,
                divergent.unit_basis.as_str(),
            ));
        }
        if canonical.nominal_length_m != divergent.nominal_length_m {
            conflicts.push(conflict(
                sku,
                "nominal_length_m",
                source,
                canonical.nominal_length_m,
                other,
                divergent.nominal_length_m,
            ));
        }
        if canonical.useful_width_m != divergent.useful_width_m {
            conflicts.push(conflict(
                sku,
                "useful_width_m",
                source,
                format!("{:?}", canonical.useful_width_m),
                other,
                format!("{:?}", divergent.useful_width_m),
            ));
        }
        if canonical.category != divergent.category {
            conflicts.push(conflict(
                sku,
                "category",
                source,
                canonical.category.as_str(),
                other,
                divergent.category.as_str(),
            ));
        }
    }

    fn finish<T>(&self, source: &KnowledgeSource, value: T, conflicts: Vec<KnowledgeConflict>) -> Resolved<T> {
        for c in &conflicts {
            warn!(
                entity = %c.entity,
                field = %c.field,
                canonical_source = %c.canonical_source,
                canonical_value = %c.canonical_value,
                source = %c.source_id,
                value = %c.value,
                "knowledge conflict, keeping canonical value"
            );
        }

        Resolved {
            value,
            provenance: self.snapshot.provenance(source),
            conflicts,
        }
    }
}

fn conflict(
    entity: &str,
    field: &str,
    source: &KnowledgeSource,
    canonical_value: impl ToString,
    other: &KnowledgeSource,
    value: impl ToString,
) -> KnowledgeConflict {
    KnowledgeConflict {
        entity: entity.to_string(),
        field: field.to_string(),
        canonical_source: source.id.clone(),
        canonical_value: canonical_value.to_string(),
        source_id: other.id.clone(),
        priority: other.priority,
        value: value.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
