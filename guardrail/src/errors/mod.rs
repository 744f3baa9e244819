pub mod guardrail_error;
