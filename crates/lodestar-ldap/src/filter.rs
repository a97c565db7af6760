//! LDAP filter expressions and their evaluation.
//!
//! Filters arrive from the protocol bridge as nested JSON nodes and are
//! parsed into a tagged tree before evaluation. Any evaluation failure —
//! an unknown matching rule, an unsupported ordering field, a malformed
//! node — aborts the whole query; the engine never degrades to an empty
//! result set.

use std::collections::{HashMap, HashSet};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{LdapError, LdapResult};
use crate::record::DirectoryRecord;
use crate::tree::{rdn_components, DirectoryTree};

/// The one matching rule with transitive (chain-walking) semantics.
pub const MATCHING_RULE_IN_CHAIN: &str = "1.2.840.113556.1.4.1941";

/// One constraint of a substrings filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstringPart {
    /// Value must start with the fragment.
    Initial(String),
    /// Value must contain the fragment.
    Any(String),
    /// Value must end with the fragment.
    Final(String),
}

/// A parsed filter expression.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Every child must match; result order follows the first child.
    And(Vec<Filter>),
    /// Any child may match; results are de-duplicated by entry uuid.
    Or(Vec<Filter>),
    /// Complement of the child over the original candidate set.
    Not(Box<Filter>),
    /// Case-insensitive equality on a field value.
    Equality {
        /// Field name.
        field: String,
        /// Asserted value.
        value: String,
    },
    /// Substring constraints on a field value; constraints are OR'd.
    Substrings {
        /// Field name.
        field: String,
        /// Fragment constraints.
        parts: Vec<SubstringPart>,
    },
    /// Ordering comparison; matches when the field is not less than the
    /// value.
    GreaterOrEqual {
        /// Field name.
        field: String,
        /// Literal to compare against.
        value: String,
    },
    /// Extensible match, with optional matching rule and DN matching.
    ExtensibleMatch {
        /// Field name.
        field: String,
        /// Asserted value.
        value: String,
        /// Matching rule OID, when present.
        matching_rule: Option<String>,
        /// Whether to also match against the record's own RDN pairs.
        dn_attributes: bool,
    },
    /// Matches records for which the field resolves at all.
    Present(String),
}

/// Wire shape of an attribute/value assertion.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeAssertion {
    /// Field name.
    pub attribute_desc: String,
    /// Asserted value.
    pub assertion_value: String,
}

/// Wire shape of a substrings filter.
#[derive(Debug, Clone, Deserialize)]
pub struct SubstringsNode {
    /// Field name.
    #[serde(rename = "type")]
    pub field: String,
    /// Fragment constraints, each a `{kind: fragment}` object.
    pub substrings: Vec<HashMap<String, String>>,
}

/// Wire shape of an extensible match.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensibleMatchNode {
    /// Matching rule OID.
    pub matching_rule: Option<String>,
    /// Field name.
    #[serde(rename = "type")]
    pub field: Option<String>,
    /// Asserted value.
    pub match_value: String,
    /// Whether to also match against RDN pairs.
    pub dn_attributes: Option<bool>,
}

/// One node of the bridge's JSON filter encoding.
///
/// Exactly one of the variant fields is expected to be set; precedence on
/// conflicting nodes follows the declaration order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterNode {
    /// Equality assertion.
    pub equality_match: Option<AttributeAssertion>,
    /// Substring constraints.
    pub substrings: Option<SubstringsNode>,
    /// Ordering assertion.
    pub greater_or_equal: Option<AttributeAssertion>,
    /// Extensible match.
    pub extensible_match: Option<ExtensibleMatchNode>,
    /// Conjunction.
    pub and: Option<Vec<FilterNode>>,
    /// Disjunction.
    pub or: Option<Vec<FilterNode>>,
    /// Negation.
    pub not: Option<Box<FilterNode>>,
    /// Presence assertion.
    pub present: Option<String>,
}

impl FilterNode {
    /// Converts the wire node into a parsed filter.
    ///
    /// Unrecognized substring constraint keys are dropped, mirroring the
    /// bridge contract; a node with no recognized variant is an error.
    ///
    /// ## Errors
    ///
    /// Returns [`LdapError::UnsupportedFilter`] for empty or malformed
    /// nodes.
    pub fn into_filter(self) -> LdapResult<Filter> {
        if let Some(assertion) = self.equality_match {
            return Ok(Filter::Equality {
                field: assertion.attribute_desc,
                value: assertion.assertion_value,
            });
        }
        if let Some(node) = self.substrings {
            let mut parts = Vec::new();
            for constraint in node.substrings {
                for (kind, fragment) in constraint {
                    match kind.as_str() {
                        "initial" => parts.push(SubstringPart::Initial(fragment)),
                        "any" => parts.push(SubstringPart::Any(fragment)),
                        "final" => parts.push(SubstringPart::Final(fragment)),
                        _ => {}
                    }
                }
            }
            return Ok(Filter::Substrings {
                field: node.field,
                parts,
            });
        }
        if let Some(assertion) = self.greater_or_equal {
            return Ok(Filter::GreaterOrEqual {
                field: assertion.attribute_desc,
                value: assertion.assertion_value,
            });
        }
        if let Some(node) = self.extensible_match {
            let Some(field) = node.field else {
                return Err(LdapError::UnsupportedFilter(
                    "extensible match without a field".to_string(),
                ));
            };
            return Ok(Filter::ExtensibleMatch {
                field,
                value: node.match_value,
                matching_rule: node.matching_rule,
                dn_attributes: node.dn_attributes.unwrap_or(false),
            });
        }
        if let Some(children) = self.and {
            return Ok(Filter::And(
                children
                    .into_iter()
                    .map(FilterNode::into_filter)
                    .collect::<LdapResult<_>>()?,
            ));
        }
        if let Some(children) = self.or {
            return Ok(Filter::Or(
                children
                    .into_iter()
                    .map(FilterNode::into_filter)
                    .collect::<LdapResult<_>>()?,
            ));
        }
        if let Some(child) = self.not {
            return Ok(Filter::Not(Box::new(child.into_filter()?)));
        }
        if let Some(field) = self.present {
            return Ok(Filter::Present(field));
        }
        Err(LdapError::UnsupportedFilter(
            "filter node carries no recognized variant".to_string(),
        ))
    }
}

/// Maps a relationship field to its transitive counterpart for
/// chain-walking extensible matches.
fn chained_field(field: &str) -> Option<&'static str> {
    match field.to_ascii_lowercase().as_str() {
        "memberof" | "memberofbydn" => Some("flattenMemberOfByDN"),
        "member" | "memberbydn" => Some("flattenMemberByDN"),
        "nestedgroup" | "nestedgroupbydn" => Some("flattenNestedGroupByDN"),
        _ => None,
    }
}

/// Evaluates filter expressions over candidate records.
pub struct FilterEngine<'a> {
    tree: &'a DirectoryTree,
}

impl<'a> FilterEngine<'a> {
    /// Creates an engine bound to a tree.
    #[must_use]
    pub const fn new(tree: &'a DirectoryTree) -> Self {
        Self { tree }
    }

    /// Evaluates `filter` over `candidates`, returning the matching
    /// subset.
    ///
    /// ## Errors
    ///
    /// Any failing sub-expression fails the whole evaluation; callers
    /// must not fall back to partial results.
    pub async fn evaluate(
        &self,
        filter: &Filter,
        candidates: &[DirectoryRecord],
    ) -> LdapResult<Vec<DirectoryRecord>> {
        self.eval(filter, candidates).await
    }

    fn eval<'s>(
        &'s self,
        filter: &'s Filter,
        candidates: &'s [DirectoryRecord],
    ) -> BoxFuture<'s, LdapResult<Vec<DirectoryRecord>>> {
        async move {
            match filter {
                Filter::And(children) => {
                    let mut running: Option<Vec<DirectoryRecord>> = None;
                    for child in children {
                        let matched = self.eval(child, candidates).await?;
                        running = Some(match running {
                            None => matched,
                            Some(current) => {
                                let keep: HashSet<Uuid> =
                                    matched.iter().map(DirectoryRecord::entry_uuid).collect();
                                current
                                    .into_iter()
                                    .filter(|record| keep.contains(&record.entry_uuid()))
                                    .collect()
                            }
                        });
                    }
                    Ok(running.unwrap_or_default())
                }
                Filter::Or(children) => {
                    let mut seen: HashSet<Uuid> = HashSet::new();
                    let mut combined = Vec::new();
                    for child in children {
                        for record in self.eval(child, candidates).await? {
                            if seen.insert(record.entry_uuid()) {
                                combined.push(record);
                            }
                        }
                    }
                    Ok(combined)
                }
                Filter::Not(child) => {
                    let excluded: HashSet<Uuid> = self
                        .eval(child, candidates)
                        .await?
                        .iter()
                        .map(DirectoryRecord::entry_uuid)
                        .collect();
                    Ok(candidates
                        .iter()
                        .filter(|record| !excluded.contains(&record.entry_uuid()))
                        .cloned()
                        .collect())
                }
                Filter::Equality { field, value } => {
                    self.retain(candidates, |record| {
                        self.matches_equality(record, field, value)
                    })
                    .await
                }
                Filter::Substrings { field, parts } => {
                    self.retain(candidates, |record| {
                        self.matches_substrings(record, field, parts)
                    })
                    .await
                }
                Filter::GreaterOrEqual { field, value } => {
                    let mut matched = Vec::new();
                    for record in candidates {
                        if self.tree.compare(record, field, value)? != std::cmp::Ordering::Less {
                            matched.push(record.clone());
                        }
                    }
                    Ok(matched)
                }
                Filter::ExtensibleMatch {
                    field,
                    value,
                    matching_rule,
                    dn_attributes,
                } => {
                    self.retain(candidates, |record| {
                        self.matches_extensible(record, field, value, matching_rule.as_deref(), *dn_attributes)
                    })
                    .await
                }
                Filter::Present(field) => {
                    self.retain(candidates, |record| async move {
                        Ok(self.tree.values_for_field(record, field).await?.is_some())
                    })
                    .await
                }
            }
        }
        .boxed()
    }

    async fn retain<'r, F, Fut>(
        &self,
        candidates: &'r [DirectoryRecord],
        predicate: F,
    ) -> LdapResult<Vec<DirectoryRecord>>
    where
        F: Fn(&'r DirectoryRecord) -> Fut,
        Fut: std::future::Future<Output = LdapResult<bool>>,
    {
        let mut matched = Vec::new();
        for record in candidates {
            if predicate(record).await? {
                matched.push(record.clone());
            }
        }
        Ok(matched)
    }

    async fn matches_equality(
        &self,
        record: &DirectoryRecord,
        field: &str,
        value: &str,
    ) -> LdapResult<bool> {
        Ok(self
            .tree
            .values_for_field(record, field)
            .await?
            .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value))))
    }

    async fn matches_substrings(
        &self,
        record: &DirectoryRecord,
        field: &str,
        parts: &[SubstringPart],
    ) -> LdapResult<bool> {
        let Some(values) = self.tree.values_for_field(record, field).await? else {
            return Ok(false);
        };
        Ok(values.iter().any(|value| {
            let value = value.to_ascii_lowercase();
            parts.iter().any(|part| match part {
                SubstringPart::Initial(f) => value.starts_with(&f.to_ascii_lowercase()),
                SubstringPart::Any(f) => value.contains(&f.to_ascii_lowercase()),
                SubstringPart::Final(f) => value.ends_with(&f.to_ascii_lowercase()),
            })
        }))
    }

    async fn matches_extensible(
        &self,
        record: &DirectoryRecord,
        field: &str,
        value: &str,
        matching_rule: Option<&str>,
        dn_attributes: bool,
    ) -> LdapResult<bool> {
        match matching_rule {
            Some(MATCHING_RULE_IN_CHAIN) => {
                let Some(flattened) = chained_field(field) else {
                    return Err(LdapError::UnsupportedFilter(format!(
                        "field '{field}' has no transitive counterpart"
                    )));
                };
                self.matches_equality(record, flattened, value).await
            }
            Some(rule) => Err(LdapError::UnknownMatchingRule(rule.to_string())),
            None => {
                if self.matches_equality(record, field, value).await? {
                    return Ok(true);
                }
                if dn_attributes {
                    let own_dn = record.dn();
                    if own_dn.is_empty() {
                        return Ok(false);
                    }
                    let components = rdn_components(&own_dn)?;
                    return Ok(components.iter().any(|(attribute, rdn_value)| {
                        attribute.eq_ignore_ascii_case(field)
                            && rdn_value.eq_ignore_ascii_case(value)
                    }));
                }
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Filter {
        let node: FilterNode = serde_json::from_value(value).unwrap();
        node.into_filter().unwrap()
    }

    #[test]
    fn equality_node_parses() {
        let filter = parse(json!({
            "equalityMatch": {"attributeDesc": "uid", "assertionValue": "alice"}
        }));
        assert!(matches!(
            filter,
            Filter::Equality { field, value } if field == "uid" && value == "alice"
        ));
    }

    #[test]
    fn substrings_node_keeps_known_constraints_only() {
        let filter = parse(json!({
            "substrings": {
                "type": "mail",
                "substrings": [{"initial": "al"}, {"bogus": "x"}, {"final": ".com"}]
            }
        }));
        let Filter::Substrings { field, parts } = filter else {
            panic!("expected substrings filter");
        };
        assert_eq!(field, "mail");
        assert_eq!(
            parts,
            vec![
                SubstringPart::Initial("al".to_string()),
                SubstringPart::Final(".com".to_string()),
            ]
        );
    }

    #[test]
    fn nested_boolean_nodes_parse() {
        let filter = parse(json!({
            "and": [
                {"present": "mail"},
                {"not": {"equalityMatch": {"attributeDesc": "uid", "assertionValue": "bob"}}}
            ]
        }));
        let Filter::And(children) = filter else {
            panic!("expected and filter");
        };
        assert_eq!(children.len(), 2);
        assert!(matches!(&children[0], Filter::Present(field) if field == "mail"));
        assert!(matches!(&children[1], Filter::Not(_)));
    }

    #[test]
    fn extensible_match_node_parses() {
        let filter = parse(json!({
            "extensibleMatch": {
                "matchingRule": MATCHING_RULE_IN_CHAIN,
                "type": "memberOf",
                "matchValue": "entryUUID=x,cn=groups,dc=lodestar,dc=local"
            }
        }));
        assert!(matches!(
            filter,
            Filter::ExtensibleMatch { matching_rule: Some(rule), dn_attributes: false, .. }
                if rule == MATCHING_RULE_IN_CHAIN
        ));
    }

    #[test]
    fn empty_nodes_are_unsupported() {
        let node: FilterNode = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            node.into_filter(),
            Err(LdapError::UnsupportedFilter(_))
        ));
    }

    #[test]
    fn chained_fields_map_to_flattened_views() {
        assert_eq!(chained_field("memberOf"), Some("flattenMemberOfByDN"));
        assert_eq!(chained_field("MEMBER"), Some("flattenMemberByDN"));
        assert_eq!(
            chained_field("nestedGroupByDN"),
            Some("flattenNestedGroupByDN")
        );
        assert_eq!(chained_field("uid"), None);
    }
}
