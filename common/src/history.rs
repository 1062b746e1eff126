use serde::Serialize;
use serde_json::{Map, Value};

use crate::{error::DecodeError, types::HistoryQueryParams};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySeries {
    sensor_name: String,
    entity_name: String,
    unit: String,
    is_numeric: bool,
    timestamps: Vec<String>,
    min: Vec<f32>,
    max: Vec<f32>,
    mean: Vec<f32>,
    valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint<'a> {
    pub timestamp: &'a str,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl HistorySeries {
    pub fn sensor_name(&self) -> &str {
        &self.sensor_name
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn is_numeric(&self) -> bool {
        self.is_numeric
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[String] {
        &self.timestamps
    }

    pub fn min(&self) -> &[f32] {
        &self.min
    }

    pub fn max(&self) -> &[f32] {
        &self.max
    }

    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    pub fn min_mut(&mut self) -> &mut [f32] {
        &mut self.min
    }

    pub fn max_mut(&mut self) -> &mut [f32] {
        &mut self.max
    }

    pub fn mean_mut(&mut self) -> &mut [f32] {
        &mut self.mean
    }

    pub fn points(&self) -> impl Iterator<Item = HistoryPoint<'_>> + '_ {
        self.timestamps
            .iter()
            .zip(&self.min)
            .zip(&self.max)
            .zip(&self.mean)
            .map(|(((timestamp, min), max), mean)| HistoryPoint {
                timestamp: timestamp.as_str(),
                min: *min,
                max: *max,
                mean: *mean,
            })
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn release(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug)]
pub struct HistorySeriesBuilder {
    expected: usize,
    sensor_name: String,
    entity_name: String,
    unit: String,
    is_numeric: bool,
    timestamps: Vec<String>,
    min: Vec<f32>,
    max: Vec<f32>,
    mean: Vec<f32>,
}

impl HistorySeriesBuilder {
    pub fn with_capacity(count: usize) -> Result<Self, DecodeError> {
        let mut timestamps = Vec::new();
        let mut min = Vec::new();
        let mut max = Vec::new();
        let mut mean = Vec::new();

        timestamps
            .try_reserve_exact(count)
            .and_then(|()| min.try_reserve_exact(count))
            .and_then(|()| max.try_reserve_exact(count))
            .and_then(|()| mean.try_reserve_exact(count))
            .map_err(|_| DecodeError::Allocation(count))?;

        Ok(Self {
            expected: count,
            sensor_name: String::new(),
            entity_name: String::new(),
            unit: String::new(),
            is_numeric: true,
            timestamps,
            min,
            max,
            mean,
        })
    }

    pub fn sensor_name(mut self, sensor_name: impl Into<String>) -> Self {
        self.sensor_name = sensor_name.into();
        self
    }

    pub fn entity_name(mut self, entity_name: impl Into<String>) -> Self {
        self.entity_name = entity_name.into();
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn numeric(mut self, is_numeric: bool) -> Self {
        self.is_numeric = is_numeric;
        self
    }

    pub fn push(&mut self, timestamp: impl Into<String>, min: f32, max: f32, mean: f32) {
        self.timestamps.push(timestamp.into());
        self.min.push(min);
        self.max.push(max);
        self.mean.push(mean);
    }

    pub fn build(self) -> Result<HistorySeries, DecodeError> {
        if self.expected == 0 {
            return Err(DecodeError::EmptySeries);
        }
        if self.timestamps.len() != self.expected {
            return Err(DecodeError::LengthMismatch {
                field: "timestamps",
                expected: self.expected,
                found: self.timestamps.len(),
            });
        }

        Ok(HistorySeries {
            sensor_name: self.sensor_name,
            entity_name: self.entity_name,
            unit: self.unit,
            is_numeric: self.is_numeric,
            timestamps: self.timestamps,
            min: self.min,
            max: self.max,
            mean: self.mean,
            valid: true,
        })
    }
}

fn statistic<'a>(
    data: &'a Map<String, Value>,
    field: &'static str,
    expected: usize,
) -> Result<&'a [Value], DecodeError> {
    let values = data
        .get(field)
        .and_then(Value::as_array)
        .ok_or(DecodeError::MissingField(field))?;
    if values.len() != expected {
        return Err(DecodeError::LengthMismatch {
            field,
            expected,
            found: values.len(),
        });
    }
    Ok(values.as_slice())
}

fn sample(values: &[Value], field: &'static str, index: usize) -> Result<f32, DecodeError> {
    values
        .get(index)
        .and_then(Value::as_f64)
        .map(|value| value as f32)
        .filter(|value| value.is_finite())
        .ok_or(DecodeError::NotNumeric { field, index })
}

/// Any missing array or length disagreement rejects the whole document.
pub fn decode_history(
    body: &str,
    query: &HistoryQueryParams,
) -> Result<HistorySeries, DecodeError> {
    let document: Value = serde_json::from_str(body)?;
    let Value::Object(root) = document else {
        return Err(DecodeError::Shape("expected a history object"));
    };

    let data = root
        .get("data")
        .and_then(Value::as_object)
        .ok_or(DecodeError::MissingField("data"))?;
    let timestamps = data
        .get("timestamps")
        .and_then(Value::as_array)
        .ok_or(DecodeError::MissingField("timestamps"))?;
    let count = timestamps.len();
    if count == 0 {
        return Err(DecodeError::EmptySeries);
    }

    let min = statistic(data, "min", count)?;
    let max = statistic(data, "max", count)?;
    let mean = statistic(data, "mean", count)?;

    let entity_name = root
        .get("entity_name")
        .and_then(Value::as_str)
        .unwrap_or(query.entity_name.as_str());
    let unit = root.get("unit").and_then(Value::as_str).unwrap_or_default();
    let is_numeric = root
        .get("is_numeric")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    let mut builder = HistorySeriesBuilder::with_capacity(count)?
        .sensor_name(query.sensor_name.as_str())
        .entity_name(entity_name)
        .unit(unit)
        .numeric(is_numeric);

    for (index, timestamp) in timestamps.iter().enumerate() {
        let timestamp = timestamp
            .as_str()
            .ok_or(DecodeError::Shape("timestamps must be strings"))?;
        builder.push(
            timestamp,
            sample(min, "min", index)?,
            sample(max, "max", index)?,
            sample(mean, "mean", index)?,
        );
    }

    builder.build()
}
