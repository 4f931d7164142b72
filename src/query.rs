//! Structured query descriptions understood by local stores.
//!
//! Queries are built programmatically; there is no text syntax.

use crate::types::columns;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Filter expression tree over item members.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    Eq { member: String, value: Value },
    Ne { member: String, value: Value },
    Gt { member: String, value: Value },
    Lt { member: String, value: Value },
    /// Member equals any of the values.
    In { member: String, values: Vec<Value> },
    And { left: Box<Filter>, right: Box<Filter> },
    Or { left: Box<Filter>, right: Box<Filter> },
    Not { filter: Box<Filter> },
}

impl Filter {
    pub fn eq(member: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            member: member.into(),
            value: value.into(),
        }
    }

    pub fn ne(member: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne {
            member: member.into(),
            value: value.into(),
        }
    }

    pub fn gt(member: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt {
            member: member.into(),
            value: value.into(),
        }
    }

    pub fn lt(member: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt {
            member: member.into(),
            value: value.into(),
        }
    }

    pub fn is_in<I, V>(member: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In {
            member: member.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and(self, other: Filter) -> Self {
        Filter::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        Filter::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn not(self) -> Self {
        Filter::Not {
            filter: Box::new(self),
        }
    }

    /// `id in (<ids>)`. `None` for an empty list.
    pub fn id_in<I, S>(ids: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<Value> = ids.into_iter().map(|id| Value::String(id.into())).collect();
        if values.is_empty() {
            return None;
        }
        Some(Filter::In {
            member: columns::ID.to_string(),
            values,
        })
    }

    /// Evaluate the filter against a JSON object.
    pub fn matches(&self, item: &Value) -> bool {
        match self {
            Filter::Eq { member, value } => item.get(member).unwrap_or(&Value::Null) == value,
            Filter::Ne { member, value } => item.get(member).unwrap_or(&Value::Null) != value,
            Filter::Gt { member, value } => {
                compare(item.get(member), value) == Some(Ordering::Greater)
            }
            Filter::Lt { member, value } => compare(item.get(member), value) == Some(Ordering::Less),
            Filter::In { member, values } => {
                let actual = item.get(member).unwrap_or(&Value::Null);
                values.iter().any(|v| v == actual)
            }
            Filter::And { left, right } => left.matches(item) && right.matches(item),
            Filter::Or { left, right } => left.matches(item) || right.matches(item),
            Filter::Not { filter } => !filter.matches(item),
        }
    }
}

/// Ordering between a member value and a constant. Mixed types do not compare.
fn compare(lhs: Option<&Value>, rhs: &Value) -> Option<Ordering> {
    match (lhs?, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Sort direction for an ordering clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A query against one table of a local store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryDescription {
    pub table_name: String,
    pub filter: Option<Filter>,
    /// Members to project. Empty selects every member.
    pub selection: Vec<String>,
    pub ordering: Vec<(String, SortDirection)>,
    pub skip: Option<usize>,
    pub top: Option<usize>,
}

impl QueryDescription {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            filter: None,
            selection: Vec::new(),
            ordering: Vec::new(),
            skip: None,
            top: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn select(mut self, member: impl Into<String>) -> Self {
        self.selection.push(member.into());
        self
    }

    pub fn order_by(mut self, member: impl Into<String>, direction: SortDirection) -> Self {
        self.ordering.push((member.into(), direction));
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }

    /// Whether an item passes the filter (an absent filter matches everything).
    pub fn matches(&self, item: &Value) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(item))
    }

    /// Apply ordering, paging and projection to items that already passed the filter.
    pub fn shape(&self, mut items: Vec<Value>) -> Vec<Value> {
        if !self.ordering.is_empty() {
            items.sort_by(|a, b| {
                for (member, direction) in &self.ordering {
                    let ord = match (a.get(member), b.get(member)) {
                        (Some(x), Some(y)) => compare(Some(x), y).unwrap_or(Ordering::Equal),
                        (None, Some(_)) => Ordering::Less,
                        (Some(_), None) => Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    };
                    let ord = match direction {
                        SortDirection::Ascending => ord,
                        SortDirection::Descending => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let skip = self.skip.unwrap_or(0);
        let top = self.top.unwrap_or(usize::MAX);
        let paged = items.into_iter().skip(skip).take(top);

        if self.selection.is_empty() {
            return paged.collect();
        }

        paged
            .map(|item| {
                let projected = self
                    .selection
                    .iter()
                    .filter_map(|member| item.get(member).map(|v| (member.clone(), v.clone())))
                    .collect::<serde_json::Map<_, _>>();
                Value::Object(projected)
            })
            .collect()
    }
}
