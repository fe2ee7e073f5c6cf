//! A small column-oriented table with declared dtypes and explicit absence.
//!
//! The pipeline needs a handful of frame semantics (fixed column order,
//! typed cells, absent-vs-zero distinction, key joins) and nothing else, so
//! those live here rather than behind a general dataframe dependency.
//! Dates are carried as ISO `YYYY-MM-DD` strings; lexicographic order on
//! them is chronological order.

use serde::Serialize;

use crate::PanelError;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int,
    Float,
    Bool,
    Str,
}

/// One non-absent cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Value::Int(_) => DType::Int,
            Value::Float(_) => DType::Float,
            Value::Bool(_) => DType::Bool,
            Value::Str(_) => DType::Str,
        }
    }

    /// Numeric view: ints widen to float, everything else is non-numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bool(_) | Value::Str(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Convert to `dtype`, returning `None` when the conversion is lossy or
    /// impossible. Coercion failures become explicit absences upstream.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn coerce(&self, dtype: DType) -> Option<Value> {
        match (self, dtype) {
            (Value::Int(v), DType::Int) => Some(Value::Int(*v)),
            (Value::Float(v), DType::Int) => {
                if v.is_finite() && v.fract() == 0.0 {
                    Some(Value::Int(*v as i64))
                } else {
                    None
                }
            }
            (Value::Bool(v), DType::Int) => Some(Value::Int(i64::from(*v))),
            (Value::Str(s), DType::Int) => s.trim().parse::<i64>().ok().map(Value::Int),
            (v, DType::Float) => match v {
                Value::Str(s) => s.trim().parse::<f64>().ok().map(Value::Float),
                other => other.as_f64().map(Value::Float),
            },
            (Value::Bool(v), DType::Bool) => Some(Value::Bool(*v)),
            (Value::Int(v), DType::Bool) => match v {
                0 => Some(Value::Bool(false)),
                1 => Some(Value::Bool(true)),
                _ => None,
            },
            (Value::Str(s), DType::Bool) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (Value::Float(_), DType::Bool) => None,
            (v, DType::Str) => Some(Value::Str(v.render())),
        }
    }

    /// Plain-text rendering used for CSV cells and string coercion.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Str(s) => s.clone(),
        }
    }
}

/// A named, typed column of optional cells.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub dtype: DType,
    pub values: Vec<Option<Value>>,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, dtype: DType) -> Self {
        Self {
            name: name.into(),
            dtype,
            values: Vec::new(),
        }
    }

    #[must_use]
    pub fn non_null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Column-oriented table. All columns share one length.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    columns: Vec<Column>,
    rows: usize,
}

impl Frame {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an empty frame with the given `(name, dtype)` columns.
    #[must_use]
    pub fn with_columns(specs: &[(&str, DType)]) -> Self {
        Self {
            columns: specs
                .iter()
                .map(|(name, dtype)| Column::new(*name, *dtype))
                .collect(),
            rows: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Append an empty (all-absent) column.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::DuplicateColumn`] if the name already exists.
    pub fn add_column(&mut self, name: &str, dtype: DType) -> Result<(), PanelError> {
        self.add_column_values(name, dtype, vec![None; self.rows])
    }

    /// Append a column with the given cells. The first column added to a
    /// frame with no columns sets the row count; later columns must match it.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::DuplicateColumn`] on a name clash or
    /// [`PanelError::LengthMismatch`] when `values` does not match the row count.
    pub fn add_column_values(
        &mut self,
        name: &str,
        dtype: DType,
        values: Vec<Option<Value>>,
    ) -> Result<(), PanelError> {
        if self.has_column(name) {
            return Err(PanelError::DuplicateColumn {
                name: name.to_string(),
            });
        }
        if self.columns.is_empty() {
            self.rows = values.len();
        } else if values.len() != self.rows {
            return Err(PanelError::LengthMismatch {
                name: name.to_string(),
                expected: self.rows,
                got: values.len(),
            });
        }
        self.columns.push(Column {
            name: name.to_string(),
            dtype,
            values,
        });
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) {
        if let Some(idx) = self.column_index(name) {
            self.columns.remove(idx);
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let Some(idx) = self.column_index(from) {
            self.columns[idx].name = to.to_string();
        }
    }

    /// Append one row. Cells are matched to columns positionally.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::ArityMismatch`] when the cell count is wrong.
    pub fn push_row(&mut self, cells: Vec<Option<Value>>) -> Result<(), PanelError> {
        if cells.len() != self.columns.len() {
            return Err(PanelError::ArityMismatch {
                expected: self.columns.len(),
                got: cells.len(),
            });
        }
        for (column, cell) in self.columns.iter_mut().zip(cells) {
            column.values.push(cell);
        }
        self.rows += 1;
        Ok(())
    }

    #[must_use]
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name).and_then(|c| c.values.get(row))?.as_ref()
    }

    /// Set one cell; no-op when the column does not exist.
    pub fn set(&mut self, row: usize, name: &str, value: Option<Value>) {
        if let Some(idx) = self.column_index(name) {
            if row < self.rows {
                self.columns[idx].values[row] = value;
            }
        }
    }

    /// String view of a cell (only for `Str` cells).
    #[must_use]
    pub fn get_str(&self, row: usize, name: &str) -> Option<&str> {
        self.get(row, name).and_then(Value::as_str)
    }

    /// Numeric view of a cell.
    #[must_use]
    pub fn get_f64(&self, row: usize, name: &str) -> Option<f64> {
        self.get(row, name).and_then(Value::as_f64)
    }

    /// Full numeric view of a column; absent and non-numeric cells are `None`.
    #[must_use]
    pub fn f64_column(&self, name: &str) -> Vec<Option<f64>> {
        self.column(name).map_or_else(Vec::new, |c| {
            c.values
                .iter()
                .map(|v| v.as_ref().and_then(Value::as_f64))
                .collect()
        })
    }

    /// Coerce every cell of a column to `dtype`; cells that cannot be
    /// converted become absent rather than erroring.
    pub fn coerce_column(&mut self, name: &str, dtype: DType) {
        if let Some(idx) = self.column_index(name) {
            let column = &mut self.columns[idx];
            column.dtype = dtype;
            for cell in &mut column.values {
                *cell = cell.take().and_then(|v| v.coerce(dtype));
            }
        }
    }

    /// Reorder columns to `order`, dropping columns not named. Missing names
    /// are skipped (the schema enforcer inserts them beforehand).
    pub fn reorder_columns(&mut self, order: &[&str]) {
        let mut reordered = Vec::with_capacity(order.len());
        for name in order {
            if let Some(idx) = self.column_index(name) {
                reordered.push(self.columns.remove(idx));
            }
        }
        self.columns = reordered;
    }

    /// Stable-sort rows by the given columns (absent cells sort first).
    pub fn sort_rows_by(&mut self, by: &[&str]) {
        let key_indices: Vec<usize> = by.iter().filter_map(|n| self.column_index(n)).collect();
        let mut order: Vec<usize> = (0..self.rows).collect();
        order.sort_by(|&a, &b| {
            for &k in &key_indices {
                let cmp = compare_cells(
                    self.columns[k].values[a].as_ref(),
                    self.columns[k].values[b].as_ref(),
                );
                if cmp != std::cmp::Ordering::Equal {
                    return cmp;
                }
            }
            std::cmp::Ordering::Equal
        });
        for column in &mut self.columns {
            column.values = order.iter().map(|&i| column.values[i].take()).collect();
        }
    }

    /// Rows as owned cell vectors, in column order. Used by the CSV writer.
    #[must_use]
    pub fn row(&self, index: usize) -> Vec<Option<Value>> {
        self.columns
            .iter()
            .map(|c| c.values.get(index).cloned().flatten())
            .collect()
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => match (x, y) {
            (Value::Str(s), Value::Str(t)) => s.cmp(t),
            (Value::Bool(s), Value::Bool(t)) => s.cmp(t),
            _ => {
                let (Some(fx), Some(fy)) = (x.as_f64(), y.as_f64()) else {
                    return Ordering::Equal;
                };
                fx.partial_cmp(&fy).unwrap_or(Ordering::Equal)
            }
        },
    }
}
