//! §4.5 PolicyEngine — merges `metadata_policy` statements walked top-down
//! (anchor to leaf) and applies the result to the leaf's declared metadata.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::model::EffectiveMetadata;
use crate::model::EntityType;
use crate::model::VerifiedChain;

/// The set of metadata-policy operators a single claim may carry, per
/// [the federation metadata-policy combination rules](
/// https://openid.net/specs/openid-federation-1_0.html) summarized in §4.5.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyOperators {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, rename = "one_of", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Value>>,
    #[serde(default, rename = "subset_of", skip_serializing_if = "Option::is_none")]
    pub subset_of: Option<Vec<Value>>,
    #[serde(default, rename = "superset_of", skip_serializing_if = "Option::is_none")]
    pub superset_of: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essential: Option<bool>,
}

/// Merge `incoming` (from a statement closer to the leaf) into `existing`
/// (accumulated from statements closer to the anchor), per claim, following
/// the combination rules in §4.5.
fn merge_operators(
    claim: &str,
    existing: &mut PolicyOperators,
    incoming: &PolicyOperators,
) -> Result<(), Error> {
    if let Some(new_value) = &incoming.value {
        match &existing.value {
            None => existing.value = Some(new_value.clone()),
            Some(old_value) if old_value == new_value => {}
            Some(_) => {
                return Err(Error::PolicyViolation {
                    claim: claim.to_string(),
                    reason: "conflicting 'value' operators along the chain".to_string(),
                })
            }
        }
    }

    if let Some(new_add) = &incoming.add {
        let entry = existing.add.get_or_insert_with(Vec::new);
        for v in new_add {
            if !entry.contains(v) {
                entry.push(v.clone());
            }
        }
    }

    if let Some(new_default) = &incoming.default {
        match &existing.default {
            None => existing.default = Some(new_default.clone()),
            Some(old_default) if old_default == new_default => {}
            Some(_) => {
                return Err(Error::PolicyViolation {
                    claim: claim.to_string(),
                    reason: "conflicting 'default' operators along the chain".to_string(),
                })
            }
        }
    }

    if let Some(new_one_of) = &incoming.one_of {
        existing.one_of = Some(match &existing.one_of {
            None => new_one_of.clone(),
            Some(old) => {
                let intersection: Vec<Value> =
                    old.iter().filter(|v| new_one_of.contains(v)).cloned().collect();
                if intersection.is_empty() {
                    return Err(Error::PolicyViolation {
                        claim: claim.to_string(),
                        reason: "'one_of' intersection along the chain is empty".to_string(),
                    });
                }
                intersection
            }
        });
    }

    if let Some(new_subset_of) = &incoming.subset_of {
        existing.subset_of = Some(match &existing.subset_of {
            None => new_subset_of.clone(),
            Some(old) => old.iter().filter(|v| new_subset_of.contains(v)).cloned().collect(),
        });
    }

    if let Some(new_superset_of) = &incoming.superset_of {
        existing.superset_of = Some(match &existing.superset_of {
            None => new_superset_of.clone(),
            Some(old) => {
                let mut union = old.clone();
                for v in new_superset_of {
                    if !union.contains(v) {
                        union.push(v.clone());
                    }
                }
                union
            }
        });
    }

    if let Some(true) = incoming.essential {
        existing.essential = Some(true);
    } else if existing.essential.is_none() {
        existing.essential = incoming.essential;
    }

    Ok(())
}

/// Union `add` values (anchor-side first, per §8 scenario 3) into whatever
/// value is already present.
fn apply_add(base: Option<Value>, add: &[Value]) -> Value {
    let mut result: Vec<Value> = Vec::new();
    for v in add {
        if !result.contains(v) {
            result.push(v.clone());
        }
    }
    match base {
        Some(Value::Array(items)) => {
            for v in items {
                if !result.contains(&v) {
                    result.push(v);
                }
            }
        }
        Some(other) => {
            if !result.contains(&other) {
                result.push(other);
            }
        }
        None => {}
    }
    Value::Array(result)
}

fn apply_operators(claim: &str, base: Option<Value>, ops: &PolicyOperators) -> Result<Option<Value>, Error> {
    let mut value = base;

    if let Some(forced) = &ops.value {
        value = Some(forced.clone());
    }

    if let Some(add) = &ops.add {
        value = Some(apply_add(value, add));
    }

    if value.is_none() {
        if let Some(default) = &ops.default {
            value = Some(default.clone());
        }
    }

    if ops.essential == Some(true) && value.is_none() {
        return Err(Error::PolicyViolation {
            claim: claim.to_string(),
            reason: "essential claim is missing".to_string(),
        });
    }

    if let (Some(one_of), Some(v)) = (&ops.one_of, &value) {
        if !one_of.contains(v) {
            return Err(Error::PolicyViolation {
                claim: claim.to_string(),
                reason: "value is not a member of 'one_of'".to_string(),
            });
        }
    }

    if let (Some(subset_of), Some(Value::Array(items))) = (&ops.subset_of, &value) {
        if items.iter().any(|v| !subset_of.contains(v)) {
            return Err(Error::PolicyViolation {
                claim: claim.to_string(),
                reason: "value is not a subset of 'subset_of'".to_string(),
            });
        }
    }

    if let (Some(superset_of), Some(Value::Array(items))) = (&ops.superset_of, &value) {
        if superset_of.iter().any(|v| !items.contains(v)) {
            return Err(Error::PolicyViolation {
                claim: claim.to_string(),
                reason: "value does not contain all of 'superset_of'".to_string(),
            });
        }
    }

    Ok(value)
}

/// Walks a verified chain top-down, merges `metadata_policy` for the
/// requested entity type, and applies the result to the leaf's declared
/// metadata.
pub struct PolicyEngine;

impl PolicyEngine {
    /// Produce the effective metadata for `entity_type` from a verified
    /// chain (§4.5).
    pub fn apply(chain: &VerifiedChain, entity_type: EntityType) -> Result<EffectiveMetadata, Error> {
        let base: EffectiveMetadata = chain
            .leaf()
            .metadata
            .as_ref()
            .and_then(|m| m.get(&entity_type))
            .cloned()
            .unwrap_or_default();

        let mut merged: HashMap<String, PolicyOperators> = HashMap::new();
        for statement in &chain.verified_chain {
            let Some(policy_for_type) = statement
                .metadata_policy
                .as_ref()
                .and_then(|p| p.get(&entity_type))
            else {
                continue;
            };

            for (claim, ops) in policy_for_type {
                let entry = merged.entry(claim.clone()).or_default();
                merge_operators(claim, entry, ops)?;
            }
        }

        let mut effective = base.clone();
        for (claim, ops) in &merged {
            match apply_operators(claim, base.get(claim).cloned(), ops)? {
                Some(value) => {
                    effective.insert(claim.clone(), value);
                }
                None => {
                    effective.remove(claim);
                }
            }
        }

        Ok(effective)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::EntityType;

    fn chain_with_policies(
        policies: Vec<HashMap<String, PolicyOperators>>,
        leaf_metadata: Value,
    ) -> VerifiedChain {
        let mut verified_chain = Vec::new();
        for (i, policy) in policies.iter().enumerate() {
            let mut statement = crate::test_support::bare_statement(
                &format!("issuer-{i}"),
                &format!("issuer-{}", i + 1),
            );
            let mut policy_map = HashMap::new();
            policy_map.insert(EntityType::OpenidRelyingParty, policy.clone());
            statement.metadata_policy = Some(policy_map);
            verified_chain.push(statement);
        }

        let last = verified_chain.len() - 1;
        let mut metadata_map = HashMap::new();
        metadata_map.insert(
            EntityType::OpenidRelyingParty,
            leaf_metadata.as_object().cloned().unwrap_or_default(),
        );
        verified_chain[last].metadata = Some(metadata_map);

        VerifiedChain {
            anchor: "issuer-0".to_string(),
            iss_path: vec!["leaf".to_string(), "issuer-0".to_string()],
            exp: crate::test_support::now_unix() + 3600,
            verified_chain,
        }
    }

    fn ops(json: Value) -> PolicyOperators {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn value_operator_forces_the_claim() {
        let mut anchor_policy = HashMap::new();
        anchor_policy.insert("contacts".to_string(), ops(json!({"value": "ops@anchor.example"})));

        let chain =
            chain_with_policies(vec![anchor_policy], json!({"contacts": "ignored@leaf.example"}));

        let effective = PolicyEngine::apply(&chain, EntityType::OpenidRelyingParty).unwrap();
        assert_eq!(effective.get("contacts").unwrap(), "ops@anchor.example");
    }

    #[test]
    fn conflicting_value_operators_are_a_merge_error() {
        let mut anchor_policy = HashMap::new();
        anchor_policy.insert("contacts".to_string(), ops(json!({"value": "a@example.com"})));
        let mut intermediate_policy = HashMap::new();
        intermediate_policy.insert("contacts".to_string(), ops(json!({"value": "b@example.com"})));

        let chain = chain_with_policies(
            vec![anchor_policy, intermediate_policy],
            json!({"contacts": "c@example.com"}),
        );

        let err = PolicyEngine::apply(&chain, EntityType::OpenidRelyingParty).unwrap_err();
        assert!(matches!(err, Error::PolicyViolation { claim, .. } if claim == "contacts"));
    }

    #[test]
    fn add_unions_anchor_side_first() {
        let mut anchor_policy = HashMap::new();
        anchor_policy.insert(
            "grant_types".to_string(),
            ops(json!({"add": ["implicit"]})),
        );

        let chain = chain_with_policies(
            vec![anchor_policy],
            json!({"grant_types": ["authorization_code", "implicit"]}),
        );

        let effective = PolicyEngine::apply(&chain, EntityType::OpenidRelyingParty).unwrap();
        assert_eq!(
            effective.get("grant_types").unwrap(),
            &json!(["implicit", "authorization_code"])
        );
    }

    #[test]
    fn default_only_applies_when_claim_is_absent() {
        let mut anchor_policy = HashMap::new();
        anchor_policy.insert(
            "token_endpoint_auth_method".to_string(),
            ops(json!({"default": "private_key_jwt"})),
        );

        let chain = chain_with_policies(vec![anchor_policy], json!({}));

        let effective = PolicyEngine::apply(&chain, EntityType::OpenidRelyingParty).unwrap();
        assert_eq!(
            effective.get("token_endpoint_auth_method").unwrap(),
            "private_key_jwt"
        );
    }

    #[test]
    fn one_of_rejects_a_value_outside_the_set() {
        let mut anchor_policy = HashMap::new();
        anchor_policy.insert(
            "subject_type".to_string(),
            ops(json!({"one_of": ["pairwise"]})),
        );

        let chain = chain_with_policies(vec![anchor_policy], json!({"subject_type": "public"}));

        let err = PolicyEngine::apply(&chain, EntityType::OpenidRelyingParty).unwrap_err();
        assert!(matches!(err, Error::PolicyViolation { claim, .. } if claim == "subject_type"));
    }

    #[test]
    fn one_of_intersection_empty_across_chain_is_an_error() {
        let mut anchor_policy = HashMap::new();
        anchor_policy.insert("subject_type".to_string(), ops(json!({"one_of": ["pairwise"]})));
        let mut intermediate_policy = HashMap::new();
        intermediate_policy.insert("subject_type".to_string(), ops(json!({"one_of": ["public"]})));

        let chain = chain_with_policies(
            vec![anchor_policy, intermediate_policy],
            json!({"subject_type": "public"}),
        );

        let err = PolicyEngine::apply(&chain, EntityType::OpenidRelyingParty).unwrap_err();
        assert!(matches!(err, Error::PolicyViolation { claim, .. } if claim == "subject_type"));
    }

    #[test]
    fn essential_missing_claim_is_rejected() {
        let mut anchor_policy = HashMap::new();
        anchor_policy.insert("contacts".to_string(), ops(json!({"essential": true})));

        let chain = chain_with_policies(vec![anchor_policy], json!({}));

        let err = PolicyEngine::apply(&chain, EntityType::OpenidRelyingParty).unwrap_err();
        assert!(matches!(err, Error::PolicyViolation { claim, .. } if claim == "contacts"));
    }

    #[test]
    fn unrelated_claims_pass_through_untouched() {
        let chain = chain_with_policies(vec![HashMap::new()], json!({"client_name": "Demo RP"}));

        let effective = PolicyEngine::apply(&chain, EntityType::OpenidRelyingParty).unwrap();
        assert_eq!(effective.get("client_name").unwrap(), "Demo RP");
    }
}
