use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Domain tag used by rules to pair and promote products.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Acai,
    Bebidas,
    Combo,
    Milkshake,
    Complementos,
    Sorvetes,
    #[serde(other)]
    Outros,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: ProductCategory,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: ProductCategory,
        price: Decimal,
    ) -> Self {
        Self {
            id: ProductId(id.into()),
            name: name.into(),
            category,
            price,
            original_price: None,
            active: true,
        }
    }

    pub fn with_original_price(mut self, original_price: Decimal) -> Self {
        self.original_price = Some(original_price);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Builds the catalog-like stand-in for a paid complement. The id is derived
    /// from the normalized name so repeated generation yields the same product.
    pub fn virtual_complement(name: &str, price: Decimal) -> Self {
        Self::new(
            format!("complemento-{}", normalize_name(name)),
            name,
            ProductCategory::Complementos,
            price,
        )
    }

    pub fn is_discounted(&self) -> bool {
        self.original_price.is_some_and(|original| original > self.price)
    }

    pub fn name_contains(&self, pattern: &str) -> bool {
        self.name.to_lowercase().contains(&pattern.to_lowercase())
    }
}

/// Lowercases, folds Portuguese diacritics and collapses everything that is not
/// alphanumeric into single dashes: `"Leite Ninho"` becomes `"leite-ninho"`.
pub fn normalize_name(value: &str) -> String {
    let mut normalized = String::with_capacity(value.len());
    let mut pending_dash = false;

    for ch in value.chars().flat_map(char::to_lowercase) {
        let folded = match ch {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        };

        if folded.is_ascii_alphanumeric() {
            if pending_dash && !normalized.is_empty() {
                normalized.push('-');
            }
            pending_dash = false;
            normalized.push(folded);
        } else {
            pending_dash = true;
        }
    }

    normalized
}
