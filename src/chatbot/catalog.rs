//! Treatment catalog.

use serde::Deserialize;

/// One salon treatment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Treatment {
    pub key: String,
    pub name: String,
    /// How long the treatment lasts before the client should come back.
    pub duration_months: u32,
    pub price: String,
    #[serde(default)]
    pub benefits: Vec<String>,
}

/// Ordered, read-only list of treatments. Chat menus number entries from 1
/// in this order.
#[derive(Debug, Clone)]
pub struct Catalog {
    treatments: Vec<Treatment>,
}

impl Catalog {
    pub fn new(treatments: Vec<Treatment>) -> Self {
        Self { treatments }
    }

    pub fn get(&self, key: &str) -> Option<&Treatment> {
        self.treatments.iter().find(|t| t.key == key)
    }

    /// Look up by the 1-based position shown to staff.
    pub fn by_index(&self, index: usize) -> Option<&Treatment> {
        index.checked_sub(1).and_then(|i| self.treatments.get(i))
    }

    /// Parse a menu choice like "2" into a treatment.
    pub fn by_choice(&self, choice: &str) -> Option<&Treatment> {
        choice.trim().parse::<usize>().ok().and_then(|i| self.by_index(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Treatment> {
        self.treatments.iter()
    }

    pub fn len(&self) -> usize {
        self.treatments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.treatments.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(default_treatments())
    }
}

pub fn default_treatments() -> Vec<Treatment> {
    vec![
        Treatment {
            key: "keratina".to_string(),
            name: "Keratina / Alisado".to_string(),
            duration_months: 3,
            price: "$150.000 - $250.000".to_string(),
            benefits: vec![
                "Cabello liso y manejable".to_string(),
                "Brillo intenso".to_string(),
                "Reduce el frizz".to_string(),
                "Elimina el volumen".to_string(),
            ],
        },
        Treatment {
            key: "botox_capilar".to_string(),
            name: "Botox Capilar".to_string(),
            duration_months: 2,
            price: "$120.000 - $180.000".to_string(),
            benefits: vec![
                "Hidratación profunda".to_string(),
                "Reparación del cabello".to_string(),
                "Brillo y suavidad".to_string(),
                "Fortalece la fibra capilar".to_string(),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_key() {
        let catalog = Catalog::default();
        assert_eq!(catalog.get("keratina").map(|t| t.duration_months), Some(3));
        assert!(catalog.get("tinte").is_none());
    }

    #[test]
    fn test_lookup_by_choice_is_one_based() {
        let catalog = Catalog::default();
        assert_eq!(catalog.by_choice("1").map(|t| t.key.as_str()), Some("keratina"));
        assert_eq!(catalog.by_choice("2").map(|t| t.key.as_str()), Some("botox_capilar"));
        assert!(catalog.by_choice("0").is_none());
        assert!(catalog.by_choice("3").is_none());
        assert!(catalog.by_choice("uno").is_none());
    }
}
