//! Quantile filtering, categorical filtering, and group-by aggregation.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dataset::{Outcome, Table, Value};
use crate::error::{AnalyticsError, Result};
use crate::stats;

/// Message returned when a quantile percent is outside the accepted range.
pub const PERCENT_REJECTED_MESSAGE: &str = "percentage value is not accepted";

pub const MIN_PERCENT: f64 = 0.01;
pub const MAX_PERCENT: f64 = 0.99;

/// Aggregation applied to every numeric column of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggMethod {
    #[default]
    Mean,
    Median,
    Max,
    Min,
    Sum,
    Count,
}

impl AggMethod {
    pub const ALL: [AggMethod; 6] = [
        AggMethod::Mean,
        AggMethod::Median,
        AggMethod::Max,
        AggMethod::Min,
        AggMethod::Sum,
        AggMethod::Count,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggMethod::Mean => "mean",
            AggMethod::Median => "median",
            AggMethod::Max => "max",
            AggMethod::Min => "min",
            AggMethod::Sum => "sum",
            AggMethod::Count => "count",
        }
    }

    /// Aggregates the cells of one column within one group.
    fn apply(&self, cells: &[&Value]) -> Value {
        let numbers: Vec<f64> = cells.iter().filter_map(|v| v.as_f64()).collect();
        let as_float = |v: Option<f64>| v.map_or(Value::Null, Value::Float);

        match self {
            AggMethod::Count => Value::Int(numbers.len() as i64),
            AggMethod::Mean => as_float(stats::mean(&numbers)),
            AggMethod::Median => as_float(stats::median(&numbers)),
            AggMethod::Sum => sum_cells(cells),
            AggMethod::Max => extreme(cells, |a, b| a > b),
            AggMethod::Min => extreme(cells, |a, b| a < b),
        }
    }
}

impl fmt::Display for AggMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        AggMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| AnalyticsError::InvalidMethod(s.to_string()))
    }
}

/// Sums keep integer type when every cell is an integer or boolean and the
/// total fits in `i64`; otherwise the sum is a float.
fn sum_cells(cells: &[&Value]) -> Value {
    let float_sum = || Value::Float(cells.iter().filter_map(|v| v.as_f64()).sum());
    if cells.iter().any(|v| matches!(v, Value::Float(_))) {
        return float_sum();
    }

    let mut total: i64 = 0;
    for cell in cells {
        let term = match cell {
            Value::Int(i) => *i,
            Value::Bool(b) => i64::from(*b),
            _ => continue,
        };
        match total.checked_add(term) {
            Some(t) => total = t,
            None => return float_sum(),
        }
    }
    Value::Int(total)
}

/// Picks the extreme non-null cell, keeping its original type.
fn extreme(cells: &[&Value], better: impl Fn(f64, f64) -> bool) -> Value {
    let mut best: Option<(&Value, f64)> = None;
    for &cell in cells {
        if let Some(x) = cell.as_f64() {
            match best {
                Some((_, current)) if !better(x, current) => {}
                _ => best = Some((cell, x)),
            }
        }
    }
    best.map_or(Value::Null, |(v, _)| v.clone())
}

/// Fails with [`AnalyticsError::InvalidRange`] when `percent` is outside
/// `[0.01, 0.99]`.
pub fn check_percent(percent: f64) -> Result<()> {
    if (MIN_PERCENT..=MAX_PERCENT).contains(&percent) {
        Ok(())
    } else {
        Err(AnalyticsError::InvalidRange(percent))
    }
}

fn numeric_column(table: &Table, column: &str) -> Result<(usize, Vec<f64>)> {
    let idx = table.column_index(column)?;
    if !table.is_numeric(idx) {
        return Err(AnalyticsError::ParseError(format!(
            "column {column} is not numeric"
        )));
    }
    let values = table.column_values(idx).filter_map(Value::as_f64).collect();
    Ok((idx, values))
}

/// Rows strictly above the `1 - percent` quantile (`top`), or strictly
/// below the `percent` quantile.
///
/// An out-of-range `percent` is answered with an advisory message rather
/// than an error.
pub fn quantile_filter(table: &Table, column: &str, percent: f64, top: bool) -> Result<Outcome<Table>> {
    if check_percent(percent).is_err() {
        return Ok(Outcome::advisory(PERCENT_REJECTED_MESSAGE));
    }
    let (idx, values) = numeric_column(table, column)?;

    let q = if top { 1.0 - percent } else { percent };
    let Some(cut) = stats::quantile(&values, q) else {
        return Ok(Outcome::Data(table.empty_like()));
    };

    let filtered = table.filter_rows(|row| match row[idx].as_f64() {
        Some(x) if top => x > cut,
        Some(x) => x < cut,
        None => false,
    });
    Ok(Outcome::Data(filtered))
}

/// Rows whose `column` value exactly matches one of `categories`.
pub fn filter_by_categories<S: AsRef<str>>(table: &Table, column: &str, categories: &[S]) -> Result<Table> {
    let idx = table.column_index(column)?;
    if categories.is_empty() {
        return Ok(table.empty_like());
    }
    Ok(table.filter_rows(|row| {
        categories
            .iter()
            .any(|c| row[idx].matches_category(c.as_ref()))
    }))
}

/// One row per distinct `column` value, sorted by key, with every other
/// numeric column aggregated by `method`. Non-numeric columns are dropped
/// and null keys are skipped.
pub fn group_by(table: &Table, column: &str, method: AggMethod) -> Result<Table> {
    let key_idx = table.column_index(column)?;
    let value_cols: Vec<usize> = (0..table.columns().len())
        .filter(|&i| i != key_idx && table.is_numeric(i))
        .collect();

    let mut groups: HashMap<&Value, Vec<&[Value]>> = HashMap::new();
    for row in table.rows() {
        let key = &row[key_idx];
        if key.is_null() {
            continue;
        }
        groups.entry(key).or_default().push(row.as_slice());
    }

    let mut keys: Vec<&Value> = groups.keys().copied().collect();
    keys.sort_by(|a, b| a.total_cmp(b));

    let rows = keys
        .into_iter()
        .map(|key| {
            let members = &groups[key];
            let mut out = Vec::with_capacity(value_cols.len() + 1);
            out.push(key.clone());
            for &col in &value_cols {
                let cells: Vec<&Value> = members.iter().map(|r| &r[col]).collect();
                out.push(method.apply(&cells));
            }
            out
        })
        .collect();

    let mut columns = vec![table.columns()[key_idx].clone()];
    columns.extend(value_cols.iter().map(|&i| table.columns()[i].clone()));

    Table::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::LoadOptions;

    const PRICING: &str = "\
model_key,mileage,engine_power,fuel,has_gps,rental_price_per_day
Citroën,140411,100,diesel,true,106
Peugeot,13929,317,petrol,true,264
Audi,183297,120,diesel,false,101
Peugeot,128035,135,diesel,true,158
Renault,97097,160,diesel,false,
Citroën,152352,225,petrol,true,183
";

    fn pricing() -> Table {
        Table::from_reader(PRICING.as_bytes(), LoadOptions::default()).unwrap()
    }

    fn numbers(table: &Table, column: &str) -> Vec<f64> {
        let idx = table.column_index(column).unwrap();
        table.column_values(idx).filter_map(Value::as_f64).collect()
    }

    #[test]
    fn test_quantile_filter_top_is_strictly_above() {
        let table = pricing();
        let all = numbers(&table, "mileage");
        for percent in [0.01, 0.1, 0.5, 0.99] {
            let cut = stats::quantile(&all, 1.0 - percent).unwrap();
            let out = quantile_filter(&table, "mileage", percent, true)
                .unwrap()
                .data()
                .unwrap();
            for x in numbers(&out, "mileage") {
                assert!(x > cut);
            }
            let expected = all.iter().filter(|&&x| x > cut).count();
            assert_eq!(out.len(), expected);
        }
    }

    #[test]
    fn test_quantile_filter_bottom_is_strictly_below() {
        let table = pricing();
        let all = numbers(&table, "engine_power");
        let cut = stats::quantile(&all, 0.3).unwrap();

        let out = quantile_filter(&table, "engine_power", 0.3, false)
            .unwrap()
            .data()
            .unwrap();
        assert!(!out.is_empty());
        for x in numbers(&out, "engine_power") {
            assert!(x < cut);
        }
    }

    #[test]
    fn test_quantile_filter_rejects_out_of_range() {
        let table = pricing();
        for percent in [0.0, 0.009, 0.991, 1.0, -0.5] {
            let outcome = quantile_filter(&table, "mileage", percent, true).unwrap();
            assert_eq!(outcome.message(), Some(PERCENT_REJECTED_MESSAGE));
        }
        assert!(check_percent(1.5).is_err());
        assert!(check_percent(0.01).is_ok());
    }

    #[test]
    fn test_quantile_filter_skips_nulls() {
        let table = pricing();
        let out = quantile_filter(&table, "rental_price_per_day", 0.99, false)
            .unwrap()
            .data()
            .unwrap();
        assert!(out.rows().iter().all(|r| !r[5].is_null()));
    }

    #[test]
    fn test_quantile_filter_unknown_or_text_column() {
        let table = pricing();
        assert!(matches!(
            quantile_filter(&table, "price", 0.1, true),
            Err(AnalyticsError::UnknownColumn(_))
        ));
        assert!(matches!(
            quantile_filter(&table, "fuel", 0.1, true),
            Err(AnalyticsError::ParseError(_))
        ));
    }

    #[test]
    fn test_filter_by_categories() {
        let table = pricing();
        let out = filter_by_categories(&table, "model_key", &["Peugeot", "Audi"]).unwrap();
        assert_eq!(out.len(), 3);

        let out = filter_by_categories(&table, "has_gps", &["False"]).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_filter_by_empty_categories_is_empty_table() {
        let table = pricing();
        let out = filter_by_categories::<&str>(&table, "model_key", &[]).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.columns(), table.columns());
    }

    #[test]
    fn test_group_by_one_row_per_key() {
        let table = pricing();
        let distinct = table.unique_values("model_key").unwrap().len();
        for method in AggMethod::ALL {
            let grouped = group_by(&table, "model_key", method).unwrap();
            assert_eq!(grouped.len(), distinct);
        }
    }

    #[test]
    fn test_group_by_drops_text_columns_and_sorts_keys() {
        let grouped = group_by(&pricing(), "model_key", AggMethod::Mean).unwrap();
        assert_eq!(
            grouped.columns(),
            &["model_key", "mileage", "engine_power", "has_gps", "rental_price_per_day"]
        );
        let keys: Vec<_> = grouped.rows().iter().map(|r| r[0].clone()).collect();
        assert_eq!(
            keys,
            vec![
                Value::Text("Audi".into()),
                Value::Text("Citroën".into()),
                Value::Text("Peugeot".into()),
                Value::Text("Renault".into()),
            ]
        );
    }

    #[test]
    fn test_group_by_methods() {
        let table = pricing();
        let peugeot = |method| {
            let grouped = group_by(&table, "model_key", method).unwrap();
            grouped.rows()[2].clone()
        };

        assert_eq!(peugeot(AggMethod::Mean)[1], Value::Float(70_982.0));
        assert_eq!(peugeot(AggMethod::Sum)[1], Value::Int(141_964));
        assert_eq!(peugeot(AggMethod::Max)[2], Value::Int(317));
        assert_eq!(peugeot(AggMethod::Min)[2], Value::Int(135));
        assert_eq!(peugeot(AggMethod::Count)[1], Value::Int(2));
        assert_eq!(peugeot(AggMethod::Median)[4], Value::Float(211.0));
    }

    #[test]
    fn test_group_by_sum_overflow_becomes_float() {
        let csv = "k,v\na,9000000000000000000\na,9000000000000000000\nb,1\n";
        let table = Table::from_reader(csv.as_bytes(), LoadOptions::default()).unwrap();

        let out = group_by(&table, "k", AggMethod::Sum).unwrap();
        assert_eq!(out.rows()[0][1], Value::Float(1.8e19));
        assert_eq!(out.rows()[1][1], Value::Float(1.0));
    }

    #[test]
    fn test_group_by_all_null_group() {
        let grouped = group_by(&pricing(), "model_key", AggMethod::Mean).unwrap();
        let renault = &grouped.rows()[3];
        assert_eq!(renault[4], Value::Null);

        let counted = group_by(&pricing(), "model_key", AggMethod::Count).unwrap();
        assert_eq!(counted.rows()[3][4], Value::Int(0));
    }

    #[test]
    fn test_group_by_is_idempotent_on_grouped_output() {
        let once = group_by(&pricing(), "model_key", AggMethod::Mean).unwrap();
        let twice = group_by(&once, "model_key", AggMethod::Mean).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_agg_method_parsing() {
        assert_eq!("median".parse::<AggMethod>().unwrap(), AggMethod::Median);
        assert!(matches!(
            "average".parse::<AggMethod>(),
            Err(AnalyticsError::InvalidMethod(_))
        ));
        let m: AggMethod = serde_json::from_str("\"count\"").unwrap();
        assert_eq!(m, AggMethod::Count);
    }
}
