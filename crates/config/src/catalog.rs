// Unit prices for the investment table

use serde::{Deserialize, Serialize};

use formulia_engine::same_label;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicPrice {
    pub name: String,
    /// Cost of delivering the topic to one training group.
    pub unit_cost: f64,
}

pub fn default_catalog() -> Vec<TopicPrice> {
    [
        ("Conciencia fonológica", 1_850_000.0),
        ("Lectura en voz alta", 1_600_000.0),
        ("Escritura inicial", 1_750_000.0),
        ("Comprensión lectora", 1_900_000.0),
        ("Fluidez lectora", 1_600_000.0),
        ("Evaluación formativa", 1_450_000.0),
        ("Gestión de aula", 1_300_000.0),
        ("Acompañamiento in situ", 2_200_000.0),
    ]
    .into_iter()
    .map(|(name, unit_cost)| TopicPrice {
        name: name.to_string(),
        unit_cost,
    })
    .collect()
}

pub fn validate_catalog(catalog: &[TopicPrice]) -> Result<(), ConfigError> {
    for (i, entry) in catalog.iter().enumerate() {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!("catalog[{i}]: empty topic name")));
        }
        if !entry.unit_cost.is_finite() || entry.unit_cost < 0.0 {
            return Err(ConfigError::Validation(format!(
                "catalog '{}': unit_cost must be a non-negative number",
                entry.name
            )));
        }
        if catalog[..i].iter().any(|e| same_label(&e.name, &entry.name)) {
            return Err(ConfigError::Validation(format!("catalog '{}' listed twice", entry.name)));
        }
    }
    Ok(())
}

/// Price of a topic, matched case-insensitively.
pub fn price_of<'a>(catalog: &'a [TopicPrice], topic: &str) -> Option<&'a TopicPrice> {
    catalog.iter().find(|e| same_label(&e.name, topic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_valid() {
        validate_catalog(&default_catalog()).unwrap();
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let catalog = default_catalog();
        assert_eq!(price_of(&catalog, "gestión de aula").map(|p| p.unit_cost), Some(1_300_000.0));
        assert_eq!(price_of(&catalog, "GESTIÓN DE AULA").map(|p| p.unit_cost), Some(1_300_000.0));
        assert!(price_of(&catalog, "Robótica").is_none());
    }

    #[test]
    fn reject_negative_and_duplicates() {
        let mut catalog = default_catalog();
        catalog[0].unit_cost = -1.0;
        assert!(validate_catalog(&catalog).is_err());

        let mut catalog = default_catalog();
        catalog.push(TopicPrice { name: "FLUIDEZ LECTORA".into(), unit_cost: 1.0 });
        assert!(validate_catalog(&catalog).unwrap_err().to_string().contains("twice"));
    }
}
