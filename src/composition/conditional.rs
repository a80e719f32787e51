//! `if` / `then` / `else`
//!
//! A restricted three-branch combinator. Branches are built like any other
//! composition branch but never merged: only one of `then` and `else` applies
//! to a given value.

use serde_json::Value;

use super::branch_node;
use crate::error::Result;
use crate::factory::{PropertyFactory, RequiredSet, SchemaScope};
use crate::model::{Conditional, PropertyHandle};
use crate::node::SchemaNode;
use crate::processor::RunContext;

/// Build the conditional of a node, `None` without `if`
///
/// `if` without `then` and `else` is a schema error.
pub fn build(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    required: &RequiredSet,
    name: &str,
    node: &SchemaNode,
    inherited: Option<&Value>,
) -> Result<Option<Conditional>> {
    if !node.has("if") {
        return Ok(None);
    }
    if !node.has("then") && !node.has("else") {
        return Err(node
            .error("Incomplete conditional composition: 'if' requires 'then' or 'else'")
            .into());
    }

    let if_branch = branch(ctx, scope, required, name, node, "if", inherited)?;
    let then_branch = match node.has("then") {
        true => Some(branch(ctx, scope, required, name, node, "then", inherited)?),
        false => None,
    };
    let else_branch = match node.has("else") {
        true => Some(branch(ctx, scope, required, name, node, "else", inherited)?),
        false => None,
    };

    Ok(Some(Conditional {
        if_branch,
        then_branch,
        else_branch,
    }))
}

fn branch(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    required: &RequiredSet,
    name: &str,
    node: &SchemaNode,
    keyword: &str,
    inherited: Option<&Value>,
) -> Result<Box<PropertyHandle>> {
    let branch = branch_node(node, &[keyword.to_string()], inherited)?;
    let mut property = PropertyFactory::create(ctx, scope, required, name, &branch)?;
    property.strip_branch_scoped();
    Ok(Box::new(property))
}
