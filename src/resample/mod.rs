//! # Resampling Across Levels
//!
//! Moves a value layer up the hierarchy (`aggregate_values`, one value per
//! ancestor reduced with a [`Statistic`]) or down it (`refine_values`,
//! children inherit or share their parent's value).

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::storage::GridGeometry;
use crate::traversal::fanout;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Mean,
    Sum,
    Min,
    Max,
    /// Number of values of any type.
    Count,
    Median,
    /// Population standard deviation.
    StdDev,
    /// Most frequent value, numeric or text. Ties go to the smallest value,
    /// numbers ordering before text.
    Mode,
}

impl Statistic {
    /// Reduce one group. `None` when the group has nothing this statistic
    /// can use (e.g. only text values for `Mean`).
    pub fn reduce(self, group: &[&Value]) -> Option<Value> {
        match self {
            Statistic::Count => return Some(Value::Numeric(group.len() as f64)),
            Statistic::Mode => return mode(group),
            _ => {}
        }
        let mut xs: Vec<f64> = group.iter().filter_map(|v| v.as_f64()).filter(|v| v.is_finite()).collect();
        if xs.is_empty() {
            return None;
        }
        let n = xs.len() as f64;
        let mean = xs.iter().sum::<f64>() / n;
        let out = match self {
            Statistic::Mean => mean,
            Statistic::Sum => xs.iter().sum(),
            Statistic::Min => xs.iter().copied().fold(f64::INFINITY, f64::min),
            Statistic::Max => xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Statistic::Median => {
                xs.sort_by(f64::total_cmp);
                let mid = xs.len() / 2;
                if xs.len() % 2 == 0 { (xs[mid - 1] + xs[mid]) / 2.0 } else { xs[mid] }
            }
            Statistic::StdDev => (xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt(),
            Statistic::Count | Statistic::Mode => return None,
        };
        Some(Value::Numeric(out))
    }
}

fn value_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Numeric(x), Value::Numeric(y)) => x.total_cmp(y),
        (Value::Numeric(_), Value::Text(_)) => Ordering::Less,
        (Value::Text(_), Value::Numeric(_)) => Ordering::Greater,
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
    }
}

fn mode(group: &[&Value]) -> Option<Value> {
    let mut sorted: Vec<&Value> = group.to_vec();
    sorted.sort_by(|a, b| value_order(a, b));

    let mut best: Option<(&Value, usize)> = None;
    let mut run_start = 0;
    for i in 1..=sorted.len() {
        if i == sorted.len() || value_order(sorted[i], sorted[run_start]) != Ordering::Equal {
            let len = i - run_start;
            if best.is_none_or(|(_, n)| len > n) {
                best = Some((sorted[run_start], len));
            }
            run_start = i;
        }
    }
    best.map(|(v, _)| v.clone())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Refinement {
    /// Every child gets the parent's value.
    #[default]
    Copy,
    /// Children share the parent's numeric value evenly.
    Split,
}

/// Group values by their ancestor `levels` up and reduce each group.
/// Cells that run out of ancestors drop out. Output is sorted by cell ID.
pub async fn aggregate_values<G>(
    geometry: &G,
    values: &[(CellId, Value)],
    levels: usize,
    statistic: Statistic,
    concurrency: usize,
) -> Result<Vec<(CellId, Value)>>
where
    G: GridGeometry + ?Sized,
{
    let mut ancestor: Vec<Option<CellId>> = values.iter().map(|(c, _)| Some(c.clone())).collect();
    for _ in 0..levels {
        let distinct: Vec<CellId> = ancestor.iter().flatten().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        if distinct.is_empty() {
            break;
        }
        let parents = fanout::ordered(&distinct, concurrency, |c| geometry.parent(c)).await?;
        let lookup: HashMap<&CellId, Option<CellId>> = distinct.iter().zip(parents).collect();
        for a in ancestor.iter_mut() {
            *a = a.as_ref().and_then(|c| lookup.get(c).cloned().flatten());
        }
    }

    let mut groups: BTreeMap<CellId, Vec<&Value>> = BTreeMap::new();
    for (a, (_, v)) in ancestor.into_iter().zip(values) {
        if let Some(a) = a {
            groups.entry(a).or_default().push(v);
        }
    }
    let out: Vec<(CellId, Value)> = groups
        .into_iter()
        .filter_map(|(cell, group)| Some((cell, statistic.reduce(&group)?)))
        .collect();

    tracing::debug!(input = values.len(), groups = out.len(), levels, ?statistic, "values aggregated");
    Ok(out)
}

/// Push values `levels` down to descendants. Childless cells drop out; a
/// child reached from several parents keeps the first parent's value under
/// `Copy` and the summed shares under `Split`.
///
/// `Split` accepts numeric values only. More than `max_cells` output cells
/// is `ResourceExhausted`.
pub async fn refine_values<G>(
    geometry: &G,
    values: &[(CellId, Value)],
    levels: usize,
    refinement: Refinement,
    max_cells: usize,
    concurrency: usize,
) -> Result<Vec<(CellId, Value)>>
where
    G: GridGeometry + ?Sized,
{
    if refinement == Refinement::Split {
        if let Some((cell, v)) = values.iter().find(|(_, v)| v.as_f64().is_none()) {
            return Err(Error::InvalidInput(format!(
                "cannot split {} value of cell {cell}",
                v.type_name()
            )));
        }
    }

    let mut current: BTreeMap<CellId, Value> = BTreeMap::new();
    for (cell, v) in values {
        current.entry(cell.clone()).or_insert_with(|| v.clone());
    }

    for _ in 0..levels {
        let cells: Vec<CellId> = current.keys().cloned().collect();
        let children = fanout::ordered(&cells, concurrency, |c| geometry.children(c)).await?;

        let mut next: BTreeMap<CellId, Value> = BTreeMap::new();
        for ((_, value), kids) in current.iter().zip(children) {
            if kids.is_empty() {
                continue;
            }
            let share = match (refinement, value) {
                (Refinement::Split, Value::Numeric(x)) => Value::Numeric(x / kids.len() as f64),
                _ => value.clone(),
            };
            for kid in kids {
                match next.entry(kid) {
                    Entry::Vacant(slot) => {
                        slot.insert(share.clone());
                    }
                    Entry::Occupied(mut slot) => {
                        if let (Refinement::Split, Value::Numeric(acc), Value::Numeric(s)) =
                            (refinement, slot.get_mut(), &share)
                        {
                            *acc += s;
                        }
                    }
                }
            }
        }
        if next.len() > max_cells {
            return Err(Error::ResourceExhausted(format!(
                "refinement produced {} cells, limit is {max_cells}",
                next.len()
            )));
        }
        current = next;
    }

    tracing::debug!(input = values.len(), cells = current.len(), levels, ?refinement, "values refined");
    Ok(current.into_iter().collect())
}
