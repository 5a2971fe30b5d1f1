use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{normalize_name, Product, ProductCategory, ProductId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartLineId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complement {
    pub name: String,
    pub price: Decimal,
}

impl Complement {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self { name: name.into(), price }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub product: Product,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub complements: Vec<Complement>,
    pub quantity: u32,
    #[serde(default)]
    pub total: Decimal,
}

impl CartLine {
    pub fn new(id: impl Into<String>, product: Product, quantity: u32) -> Self {
        let mut line = Self {
            id: CartLineId(id.into()),
            product,
            size: None,
            complements: Vec::new(),
            quantity,
            total: Decimal::ZERO,
        };
        line.recompute_total();
        line
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn with_complements(mut self, complements: Vec<Complement>) -> Self {
        self.complements = complements;
        self.recompute_total();
        self
    }

    pub fn recompute_total(&mut self) {
        let complements: Decimal = self.complements.iter().map(|complement| complement.price).sum();
        self.total = (self.product.price + complements) * Decimal::from(self.quantity);
    }
}

/// Ordered snapshot of the cart as handed over by the cart collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn total(&self) -> Decimal {
        self.lines.iter().map(|line| line.total).sum()
    }

    pub fn contains_product(&self, product_id: &ProductId) -> bool {
        self.lines.iter().any(|line| &line.product.id == product_id)
    }

    pub fn contains_category(&self, category: ProductCategory) -> bool {
        self.lines.iter().any(|line| line.product.category == category)
    }

    pub fn contains_name(&self, pattern: &str) -> bool {
        self.lines.iter().any(|line| line.product.name_contains(pattern))
    }

    pub fn contains_complement(&self, name: &str) -> bool {
        let wanted = normalize_name(name);
        self.lines
            .iter()
            .flat_map(|line| line.complements.iter())
            .any(|complement| normalize_name(&complement.name) == wanted)
    }

    /// True when the product is already in the cart, either as a line item or
    /// as a complement selected on some line.
    pub fn already_has(&self, product: &Product) -> bool {
        self.contains_product(&product.id)
            || (product.category == ProductCategory::Complementos
                && self.contains_complement(&product.name))
    }

    /// Recomputes every line total so snapshots deserialized without totals
    /// still price correctly.
    pub fn normalize_totals(&mut self) {
        for line in &mut self.lines {
            line.recompute_total();
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for line in &self.lines {
            if line.quantity == 0 {
                return Err(DomainError::InvalidSnapshot(format!(
                    "cart line `{}` has zero quantity",
                    line.id.0
                )));
            }
            if line.product.price < Decimal::ZERO
                || line.complements.iter().any(|complement| complement.price < Decimal::ZERO)
            {
                return Err(DomainError::InvalidSnapshot(format!(
                    "cart line `{}` carries a negative price",
                    line.id.0
                )));
            }
        }
        Ok(())
    }

    pub fn fingerprint(&self) -> CartFingerprint {
        CartFingerprint::of(self)
    }
}

/// Summary of the cart contents used only to detect "nothing changed".
///
/// Separators (`:`, `|`, `+`) inside ids and complement names are escaped with
/// a backslash so distinct carts never share a fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CartFingerprint(String);

impl CartFingerprint {
    pub fn of(cart: &Cart) -> Self {
        let segments = cart
            .lines
            .iter()
            .map(|line| {
                let mut segment =
                    format!("{}:{}", escape_segment(line.product.id.as_str()), line.quantity);
                if !line.complements.is_empty() {
                    let mut names = line
                        .complements
                        .iter()
                        .map(|complement| escape_segment(&normalize_name(&complement.name)))
                        .collect::<Vec<_>>();
                    names.sort();
                    segment.push('+');
                    segment.push_str(&names.join("+"));
                }
                segment
            })
            .collect::<Vec<_>>();

        Self(segments.join("|"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn escape_segment(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | ':' | '|' | '+') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
