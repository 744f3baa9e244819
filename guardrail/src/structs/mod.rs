pub mod guardrail_config;
pub mod prediction;
pub mod training_example;
