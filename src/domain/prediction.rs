use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A result row as returned by the prediction server: the submitted record
/// plus its prediction column.
pub type ResultRow = Map<String, Value>;

/// Body of `POST /predict`. Fields follow the required-column order:
/// cm_id, pt_id, mkt_id, mp_year, adm0_id, adm1_id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub input1: u64,
    pub input2: u64,
    pub input3: u64,
    pub input4: u64,
    pub input5: u64,
    pub input6: u64,
}

impl PredictionRequest {
    pub fn from_values(values: [u64; 6]) -> Self {
        let [input1, input2, input3, input4, input5, input6] = values;
        Self {
            input1,
            input2,
            input3,
            input4,
            input5,
            input6,
        }
    }
}

/// `predictions` may be a bare number or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Predictions {
    One(f64),
    Many(Vec<f64>),
}

impl Predictions {
    pub fn first(&self) -> Option<f64> {
        match self {
            Predictions::One(value) => Some(*value),
            Predictions::Many(values) => values.first().copied(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse {
    pub predictions: Predictions,
}

/// Error body the server sends with non-2xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of a successful `POST /batch_predict`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchPrediction {
    #[serde(default)]
    pub rows: Vec<ResultRow>,

    /// Server-rendered CSV of `rows`, offered for download as-is.
    #[serde(default)]
    pub csv: Option<String>,
}

impl BatchPrediction {
    /// CSV text when the server produced a non-empty one.
    pub fn export_csv(&self) -> Option<&str> {
        self.csv.as_deref().filter(|csv| !csv.is_empty())
    }
}

/// Rows laid out for display. Columns come from the first row; rows are
/// assumed to share that key set, and `heterogeneous` is raised when one
/// does not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub heterogeneous: bool,
}

impl ResultTable {
    pub fn from_rows(rows: &[ResultRow]) -> Self {
        let Some(first) = rows.first() else {
            return Self::default();
        };
        let headers: Vec<String> = first.keys().cloned().collect();

        let heterogeneous = rows.iter().any(|row| {
            row.len() != headers.len() || headers.iter().any(|h| !row.contains_key(h))
        });

        let rows = rows
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .map(|h| row.get(h).map(render_value).unwrap_or_default())
                    .collect()
            })
            .collect();

        Self {
            headers,
            rows,
            heterogeneous,
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
