use core::cmp::Ordering;

use serde_json::Value;

use crate::Row;

/// The active sort key: a field path plus a direction.
///
/// An empty `column_path` means "primary key order", which is the default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrderSpec {
    pub column_path: Vec<String>,
    pub descending: bool,
}

impl OrderSpec {
    pub fn new(column_path: impl IntoIterator<Item = impl Into<String>>, descending: bool) -> Self {
        Self {
            column_path: column_path.into_iter().map(Into::into).collect(),
            descending,
        }
    }

    pub fn ascending(column_path: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(column_path, false)
    }

    pub fn is_primary(&self) -> bool {
        self.column_path.is_empty()
    }

    /// Resolves an empty path to the primary key column.
    pub fn effective_path<'a>(&'a self, primary_key: Option<&'a str>) -> Vec<&'a str> {
        if self.column_path.is_empty() {
            primary_key.into_iter().collect()
        } else {
            self.column_path.iter().map(String::as_str).collect()
        }
    }

    /// Header double-activation: flips the direction on the active column, or switches to a
    /// new column ascending.
    pub fn toggled(&self, column_path: &[String], primary_key: Option<&str>) -> Self {
        let active = self.effective_path(primary_key);
        let same = active.len() == column_path.len()
            && active.iter().zip(column_path).all(|(a, b)| *a == b.as_str());
        if same {
            Self {
                column_path: self.column_path.clone(),
                descending: !self.descending,
            }
        } else {
            Self {
                column_path: column_path.to_vec(),
                descending: false,
            }
        }
    }

    /// Compares two rows under this order, falling back to the primary key for ties.
    pub fn compare_rows(&self, a: &Row, b: &Row, primary_key: Option<&str>) -> Ordering {
        let path = self.effective_path(primary_key);
        let ord = compare_values(lookup(a, &path), lookup(b, &path));
        let ord = if self.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
        match primary_key {
            Some(pk) => compare_values(lookup(a, &[pk]), lookup(b, &[pk])),
            None => Ordering::Equal,
        }
    }

    /// Compares a row's sort key against a sought value under this order.
    pub fn compare_key(&self, row: &Row, key: &Value, primary_key: Option<&str>) -> Ordering {
        let path = self.effective_path(primary_key);
        let ord = compare_values(lookup(row, &path), Some(key));
        if self.descending { ord.reverse() } else { ord }
    }
}

/// Follows a field path through nested objects.
pub fn lookup<'a, S: AsRef<str>>(row: &'a Row, path: &[S]) -> Option<&'a Value> {
    let mut cur = row;
    for field in path {
        cur = cur.as_object()?.get(field.as_ref())?;
    }
    Some(cur)
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// A total order over JSON values.
///
/// Values of different types order by type: null < bool < number < string < array < object.
/// A missing value orders like null.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare_values(Some(l), Some(r));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            // serde_json maps iterate in key order
            for ((lk, lv), (rk, rv)) in x.iter().zip(y) {
                let ord = lk
                    .cmp(rk)
                    .then_with(|| compare_values(Some(lv), Some(rv)));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn compare_numbers(x: &serde_json::Number, y: &serde_json::Number) -> Ordering {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a.cmp(&b);
    }
    let a = x.as_f64().unwrap_or(f64::NAN);
    let b = y.as_f64().unwrap_or(f64::NAN);
    a.total_cmp(&b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mixed_types_order_by_rank() {
        let vals = [json!({"a": 1}), json!([1]), json!("x"), json!(3), json!(true), json!(null)];
        let mut sorted = vals.to_vec();
        sorted.sort_by(|a, b| compare_values(Some(a), Some(b)));
        assert_eq!(
            sorted,
            vec![json!(null), json!(true), json!(3), json!("x"), json!([1]), json!({"a": 1})]
        );
    }

    #[test]
    fn missing_sorts_like_null() {
        assert_eq!(compare_values(None, Some(&json!(null))), Ordering::Equal);
        assert_eq!(compare_values(None, Some(&json!(0))), Ordering::Less);
    }

    #[test]
    fn numbers_compare_across_representations() {
        assert_eq!(
            compare_values(Some(&json!(2)), Some(&json!(2.5))),
            Ordering::Less
        );
        assert_eq!(
            compare_values(Some(&json!(-1)), Some(&json!(u64::MAX))),
            Ordering::Less
        );
    }

    #[test]
    fn nested_lookup_and_descending_ties_break_on_primary_key() {
        let order = OrderSpec::new(["meta", "rank"], true);
        let a = json!({"id": 1, "meta": {"rank": 5}});
        let b = json!({"id": 2, "meta": {"rank": 5}});
        let c = json!({"id": 3, "meta": {"rank": 9}});
        assert_eq!(order.compare_rows(&c, &a, Some("id")), Ordering::Less);
        assert_eq!(order.compare_rows(&a, &b, Some("id")), Ordering::Less);
    }

    #[test]
    fn toggling_flips_direction_on_active_column_only() {
        let pk = Some("id");
        let base = OrderSpec::default();
        let flipped = base.toggled(&["id".to_string()], pk);
        assert!(flipped.descending);
        assert!(flipped.is_primary());

        let other = flipped.toggled(&["name".to_string()], pk);
        assert_eq!(other, OrderSpec::ascending(["name"]));
    }
}
