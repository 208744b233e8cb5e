//! Model-pricing fallback used when a provider doesn't report `cost` itself
//! (§4.5 "Cost"). A cache discount is applied to `cache_read_tokens`.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct ModelPrice {
    /// USD per million input tokens.
    pub input_per_million: f64,
    /// USD per million output tokens.
    pub output_per_million: f64,
    /// USD per million cache-read tokens (typically a fraction of input price).
    pub cache_read_per_million: f64,
}

#[derive(Debug, Clone)]
pub struct PricingTable {
    models: HashMap<String, ModelPrice>,
    default: ModelPrice,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "default".to_string(),
            ModelPrice { input_per_million: 3.0, output_per_million: 15.0, cache_read_per_million: 0.3 },
        );
        Self { default: ModelPrice { input_per_million: 3.0, output_per_million: 15.0, cache_read_per_million: 0.3 }, models }
    }
}

impl PricingTable {
    pub fn with_model(mut self, model: impl Into<String>, price: ModelPrice) -> Self {
        self.models.insert(model.into(), price);
        self
    }

    pub fn price_for(&self, model: &str) -> ModelPrice {
        self.models.get(model).copied().unwrap_or(self.default)
    }

    /// Compute cost from first principles. Prefer `provider_cost` when the
    /// provider reported one (§4.5).
    pub fn compute_cost(
        &self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        cache_read_tokens: u64,
        provider_cost: Option<f64>,
    ) -> f64 {
        if let Some(cost) = provider_cost {
            return cost;
        }
        let price = self.price_for(model);
        let billable_input = input_tokens.saturating_sub(cache_read_tokens);
        billable_input as f64 / 1_000_000.0 * price.input_per_million
            + output_tokens as f64 / 1_000_000.0 * price.output_per_million
            + cache_read_tokens as f64 / 1_000_000.0 * price.cache_read_per_million
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_provider_reported_cost() {
        let table = PricingTable::default();
        assert_eq!(table.compute_cost("default", 1000, 1000, 0, Some(1.23)), 1.23);
    }

    #[test]
    fn falls_back_to_pricing_table_with_cache_discount() {
        let table = PricingTable::default();
        let cost = table.compute_cost("default", 1_000_000, 0, 500_000, None);
        // 500k billed at full input price + 500k at cache-read price.
        assert!((cost - (0.5 * 3.0 + 0.5 * 0.3)).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_uses_default_price() {
        let table = PricingTable::default().with_model("premium", ModelPrice {
            input_per_million: 10.0,
            output_per_million: 30.0,
            cache_read_per_million: 1.0,
        });
        let unknown = table.compute_cost("mystery-model", 1_000_000, 0, 0, None);
        let default = table.compute_cost("default", 1_000_000, 0, 0, None);
        assert_eq!(unknown, default);
    }
}
