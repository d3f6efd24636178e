//! LLM cost estimation, ported from `core/alerting.py::estimate_llm_cost`.
//! Prices are EUR per token, quoted by the upstream providers per-million-token.

struct ModelPricing {
    input_per_token: f64,
    output_per_token: f64,
}

const GPT4O_MINI: ModelPricing = ModelPricing {
    input_per_token: 0.15 / 1_000_000.0,
    output_per_token: 0.60 / 1_000_000.0,
};

const GPT4O: ModelPricing = ModelPricing {
    input_per_token: 2.50 / 1_000_000.0,
    output_per_token: 10.00 / 1_000_000.0,
};

fn pricing_for(model: &str) -> &'static ModelPricing {
    match model {
        "gpt-4o" => &GPT4O,
        _ => &GPT4O_MINI,
    }
}

/// Estimated EUR cost of one LLM call, unknown models falling back to the
/// gpt-4o-mini rate.
pub fn estimate_llm_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let pricing = pricing_for(model);
    input_tokens as f64 * pricing.input_per_token + output_tokens as f64 * pricing.output_per_token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_uses_its_own_rate() {
        let cost = estimate_llm_cost("gpt-4o", 1_000_000, 0);
        assert!((cost - 2.50).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_falls_back_to_mini() {
        let cost = estimate_llm_cost("some-future-model", 1_000_000, 1_000_000);
        assert!((cost - (0.15 + 0.60)).abs() < 1e-9);
    }
}
