//! Material classification of item descriptions.
//!
//! Classification is an ordered rule match: the first (category, keywords)
//! pair with a hit wins, so descriptions naming two materials resolve to the
//! category tested first. The order of each taxonomy is part of its contract.

use serde::{Deserialize, Serialize};

use crate::models::document::MaterialCategory;

/// Which category set is in force.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Taxonomy {
    /// Plastic, metal, glass and paper only; anything else is filtered out.
    #[default]
    Reduced,
    /// Every category; unmatched descriptions become `Other`.
    Full,
}

type Rule = (MaterialCategory, &'static [&'static str]);

const PLASTIC: &[&str] = &[
    "plastic", "plástic", "pet", "pvc", "pead", "pebd", "pp", "ps",
    "polietileno", "polipropileno", "poliestireno",
];

const METAL: &[&str] = &[
    "metal", "ferro", "aco", "aço", "ferroso", "inox", "inoxidavel", "inoxidável",
    "aluminio", "alumínio", "cobre", "bronze", "latao", "latão", "zinco", "chumbo",
    "sucata metalica", "sucata metálica",
];

const GLASS: &[&str] = &["vidro", "cristal", "garrafa vidro"];

const PAPER: &[&str] = &["papel", "papelao", "papelão", "cartao", "cartão"];

const OIL: &[&str] = &["oleo", "óleo", "lubrificante", "graxa"];

const ELECTRONIC: &[&str] = &[
    "eletronico", "eletrônico", "eletroeletronico", "eletroeletrônico", "placa de circuito",
    "computador", "celular", "bateria", "pilha",
];

const TEXTILE: &[&str] = &[
    "tecido", "textil", "têxtil", "algodao", "algodão", "malha", "retalho", "roupa",
];

const WOOD: &[&str] = &["madeira", "pallet", "palete", "mdf", "serragem", "compensado"];

const RUBBER: &[&str] = &["borracha", "pneu", "latex", "látex"];

const REDUCED_RULES: &[Rule] = &[
    (MaterialCategory::Plastic, PLASTIC),
    (MaterialCategory::Metal, METAL),
    (MaterialCategory::Glass, GLASS),
    (MaterialCategory::Paper, PAPER),
];

const FULL_RULES: &[Rule] = &[
    (MaterialCategory::Metal, METAL),
    (MaterialCategory::Paper, PAPER),
    (MaterialCategory::Plastic, PLASTIC),
    (MaterialCategory::Glass, GLASS),
    (MaterialCategory::Oil, OIL),
    (MaterialCategory::Electronic, ELECTRONIC),
    (MaterialCategory::Textile, TEXTILE),
    (MaterialCategory::Wood, WOOD),
    (MaterialCategory::Rubber, RUBBER),
];

/// Keyword-based material classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialClassifier {
    taxonomy: Taxonomy,
}

impl MaterialClassifier {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self { taxonomy }
    }

    pub fn taxonomy(&self) -> Taxonomy {
        self.taxonomy
    }

    fn rules(&self) -> &'static [Rule] {
        match self.taxonomy {
            Taxonomy::Reduced => REDUCED_RULES,
            Taxonomy::Full => FULL_RULES,
        }
    }

    /// Classify a description.
    ///
    /// Under the reduced taxonomy `None` means the item is filtered out; the
    /// full taxonomy always answers, with `Other` for unmatched text.
    pub fn classify(&self, description: &str) -> Option<MaterialCategory> {
        if let Some(category) = self.matched_category(description) {
            return Some(category);
        }

        match self.taxonomy {
            Taxonomy::Reduced => None,
            Taxonomy::Full if description.trim().is_empty() => None,
            Taxonomy::Full => Some(MaterialCategory::Other),
        }
    }

    /// First category whose keywords appear in the text, ignoring the
    /// `Other` fallback.
    pub fn matched_category(&self, description: &str) -> Option<MaterialCategory> {
        let lower = description.to_lowercase();
        if lower.trim().is_empty() {
            return None;
        }

        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        self.rules()
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| keyword_matches(&lower, &words, k)))
            .map(|(category, _)| *category)
    }
}

/// Short keywords (acronyms such as "pet" or "pp") must be whole words;
/// longer ones match anywhere in the text.
fn keyword_matches(text: &str, words: &[&str], keyword: &str) -> bool {
    if keyword.chars().count() <= 3 {
        words.contains(&keyword)
    } else {
        text.contains(keyword)
    }
}

/// Classify with a throwaway classifier.
pub fn classify_material(description: &str, taxonomy: Taxonomy) -> Option<MaterialCategory> {
    MaterialClassifier::new(taxonomy).classify(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduced_taxonomy() {
        let classifier = MaterialClassifier::new(Taxonomy::Reduced);
        assert_eq!(
            classifier.classify("APARAS DE PAPELAO ONDULADO"),
            Some(MaterialCategory::Paper)
        );
        assert_eq!(classifier.classify("SUCATA DE FERRO"), Some(MaterialCategory::Metal));
        assert_eq!(classifier.classify("GARRAFA DE VIDRO"), Some(MaterialCategory::Glass));
        assert_eq!(classifier.classify("FARDO PET CRISTAL"), Some(MaterialCategory::Plastic));
        assert_eq!(classifier.classify("TECIDO DE ALGODAO"), None);
        assert_eq!(classifier.classify(""), None);
    }

    #[test]
    fn test_full_taxonomy() {
        let classifier = MaterialClassifier::new(Taxonomy::Full);
        assert_eq!(classifier.classify("TECIDO DE ALGODAO"), Some(MaterialCategory::Textile));
        assert_eq!(classifier.classify("OLEO LUBRIFICANTE USADO"), Some(MaterialCategory::Oil));
        assert_eq!(classifier.classify("PNEU INSERVIVEL"), Some(MaterialCategory::Rubber));
        assert_eq!(classifier.classify("PALETE DE MADEIRA"), Some(MaterialCategory::Wood));
        assert_eq!(classifier.classify("SERVICO DE FRETE"), Some(MaterialCategory::Other));
    }

    #[test]
    fn test_priority_order_breaks_ties() {
        let text = "cabo de metal, revestido de plastico";
        assert_eq!(
            classify_material(text, Taxonomy::Full),
            Some(MaterialCategory::Metal)
        );
        assert_eq!(
            classify_material(text, Taxonomy::Reduced),
            Some(MaterialCategory::Plastic)
        );
    }

    #[test]
    fn test_short_keywords_need_whole_words() {
        let classifier = MaterialClassifier::new(Taxonomy::Full);
        // "sacola" contains "aco", "tampas" contains "ps"
        assert_eq!(classifier.classify("SACOLA PLASTICA"), Some(MaterialCategory::Plastic));
        assert_eq!(
            MaterialClassifier::new(Taxonomy::Reduced).classify("TAMPAS DIVERSAS"),
            None
        );
        assert_eq!(classifier.classify("CHAPA DE AÇO"), Some(MaterialCategory::Metal));
    }
}
