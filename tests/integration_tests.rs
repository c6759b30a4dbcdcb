//! Integration tests across the query model and the binder.
//!
//! These follow a filter from its JSON wire form through scope shifting and
//! binding to the bound tree an evaluator would receive.
//!
//! Run with: cargo test --test integration_tests

use anyhow::Result;
use scopebind_bind::{bind, bind_where, resolve_token, BindError, ResolveError, Resolved, VarContext};
use scopebind_query::{parse_where, shift_query, CollectionQuery, FilterTree};
use serde_json::json;

// ============================================================================
// Binding scenarios
// ============================================================================

#[test]
fn test_session_and_relative_references_bind_in_a_group() -> Result<()> {
    let tree: FilterTree = serde_json::from_value(json!({
        "mod": "and",
        "filters": [["status", "=", "$session.role"], ["ownerId", "=", "$1.id"]]
    }))?;
    let ctx = VarContext::from_json(json!({
        "session": {"role": "admin"},
        "entityStack": [{"id": 42}]
    }));

    let bound = bind(&tree, &ctx)?;
    assert_eq!(
        serde_json::to_value(&bound)?,
        json!({"mod": "and", "filters": [["status", "=", "admin"], ["ownerId", "=", 42]]})
    );
    Ok(())
}

#[test]
fn test_view_broadcast_binds_to_a_set() -> Result<()> {
    let ctx = VarContext::from_json(json!({
        "view_7": [{"tag": "x"}, {"tag": "y"}, {"tag": "x"}]
    }));
    // Resolution keeps one element per view item, in view order.
    assert_eq!(
        resolve_token("$view_7.tag", &ctx)?,
        Resolved::Value(json!(["x", "y", "x"]))
    );

    let where_clause = parse_where(json!([["tag", "in", "$view_7.tag"]]))?;
    let bound = bind_where(&where_clause, &ctx)?;
    assert_eq!(serde_json::to_value(&bound)?, json!([["tag", "in", ["x", "y"]]]));
    Ok(())
}

#[test]
fn test_multi_value_attribute_from_ancestor_is_flattened() -> Result<()> {
    let ctx = VarContext::new().with_entity(json!({
        "labels": {"urgent": true, "stale": false, "todo": true}
    }));
    let ctx = ctx.with_view("labels", vec![
        json!({"labels": {"urgent": true, "stale": false}}),
        json!({"labels": {"todo": true}}),
    ]);

    // Direct reference: a single liveness map is not array-shaped, so it
    // binds unchanged.
    let direct = bind_where(&parse_where(json!([["l", "=", "$1.labels"]]))?, &ctx)?;
    assert_eq!(
        serde_json::to_value(&direct)?,
        json!([["l", "=", {"urgent": true, "stale": false, "todo": true}]])
    );

    // Broadcast over a view: each item's liveness map contributes its alive keys.
    let broadcast = bind_where(&parse_where(json!([["l", "in", "$view_labels.labels"]]))?, &ctx)?;
    assert_eq!(
        serde_json::to_value(&broadcast)?,
        json!([["l", "in", ["urgent", "todo"]]])
    );
    Ok(())
}

#[test]
fn test_errors_surface_with_their_kind() -> Result<()> {
    let ctx = VarContext::new().with_entity(json!({"ownerId": 1}));

    let out_of_bounds = parse_where(json!([["a", "=", "$2.ownerId"]]))?;
    assert!(matches!(
        bind_where(&out_of_bounds, &ctx),
        Err(BindError::Resolve(ResolveError::OutOfBoundsScope { depth: 2, stack_len: 1, .. }))
    ));

    let missing_view = parse_where(json!([["a", "in", "$view_3.id"]]))?;
    assert!(matches!(
        bind_where(&missing_view, &ctx),
        Err(BindError::Resolve(ResolveError::UndefinedView { .. }))
    ));

    // Malformed references are rejected when the filter is decoded.
    assert!(parse_where(json!([["a", "=", "$session."]])).is_err());
    Ok(())
}

// ============================================================================
// Subquery composition
// ============================================================================

#[test]
fn test_relocated_subquery_still_sees_the_same_ancestor() -> Result<()> {
    // Authored at the top level: `$1` is the parent entity.
    let query: CollectionQuery = serde_json::from_value(json!({
        "collectionName": "comments",
        "where": [
            ["postId", "=", "$1.id"],
            ["visibility", "=", "$role.visibility"],
            {"exists": {"relation": "author", "where": [["orgId", "=", "$1.orgId"]]}}
        ],
        "limit": 20
    }))?;

    // Nested one level deeper, it must look one level further up.
    let nested = shift_query(&query, 1)?;
    assert_eq!(
        serde_json::to_value(&nested)?,
        json!({
            "collectionName": "comments",
            "where": [
                ["postId", "=", "$2.id"],
                ["visibility", "=", "$role.visibility"],
                {"exists": {"relation": "author", "where": [["orgId", "=", "$2.orgId"]]}}
            ],
            "limit": 20
        })
    );

    let outer = VarContext::from_json(json!({
        "role": {"visibility": "public"},
        "entityStack": [{"id": "post-1", "orgId": "org-1"}]
    }));
    let inner = outer.clone().with_entity(json!({"id": "thread-9", "orgId": "org-x"}));

    let authored_where = query.where_clause.clone().unwrap_or_default();
    let nested_where = nested.where_clause.clone().unwrap_or_default();
    assert_eq!(bind_where(&nested_where, &inner)?, bind_where(&authored_where, &outer)?);
    Ok(())
}
