//! Condition Evaluator (C3): a pure function over the execution context.
//!
//! `evaluate_condition_expr` in `workflow/executor.rs` is the precedent
//! for a condition stub left intentionally simplified with a `TODO` —
//! the same shape is followed here for `customExpression`, which stays
//! reserved rather than grown into a real expression engine.

use crate::context::ExecutionContext;
use crate::model::ConditionExpression;

/// Evaluates `expr` for the branch leaving `source_node_id`, consulting
/// `ctx`. Pure: never mutates `ctx`.
pub fn evaluate(expr: &ConditionExpression, source_node_id: &str, ctx: &ExecutionContext) -> bool {
    match expr {
        ConditionExpression::PreviousNodeSuccess => ctx.is_node_success(source_node_id),
        ConditionExpression::PreviousNodeFailed => ctx.is_node_failed(source_node_id),
        ConditionExpression::KeyValueMatch {
            key_path,
            expected_value,
        } => evaluate_key_value_match(key_path, expected_value, ctx),
        ConditionExpression::CustomExpression { code } => {
            tracing::warn!(
                code = %code,
                "customExpression is a reserved condition variant and is never evaluated; returning false"
            );
            false
        }
    }
}

fn evaluate_key_value_match(
    key_path: &str,
    expected_value: &serde_json::Value,
    ctx: &ExecutionContext,
) -> bool {
    let mut segments = key_path.split('.');
    let Some(node_id) = segments.next() else {
        return false;
    };
    let remaining: Vec<&str> = segments.collect();

    match ctx.get_upstream_output(node_id, &remaining) {
        Some(actual) => &actual == expected_value,
        None => false,
    }
}
