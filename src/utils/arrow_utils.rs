//! Arrow column access helpers
//!
//! Small downcast helpers for reading numeric cell values out of record
//! batch columns without committing callers to a single physical type.

use arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, Int8Array, Int16Array, Int32Array,
    Int64Array, UInt8Array, UInt16Array, UInt32Array, UInt64Array,
};
use arrow::datatypes::DataType;

/// Read a cell as `f64`, widening from any supported numeric type
///
/// Returns `None` when the value is null or the column type is not numeric
/// (booleans map to 0.0/1.0).
#[must_use]
pub fn value_as_f64(array: &dyn Array, idx: usize) -> Option<f64> {
    if array.is_null(idx) {
        return None;
    }
    match array.data_type() {
        DataType::Boolean => array
            .as_any()
            .downcast_ref::<BooleanArray>()
            .map(|a| f64::from(u8::from(a.value(idx)))),
        DataType::Int8 => array
            .as_any()
            .downcast_ref::<Int8Array>()
            .map(|a| f64::from(a.value(idx))),
        DataType::Int16 => array
            .as_any()
            .downcast_ref::<Int16Array>()
            .map(|a| f64::from(a.value(idx))),
        DataType::Int32 => array
            .as_any()
            .downcast_ref::<Int32Array>()
            .map(|a| f64::from(a.value(idx))),
        DataType::Int64 => array
            .as_any()
            .downcast_ref::<Int64Array>()
            .map(|a| a.value(idx) as f64),
        DataType::UInt8 => array
            .as_any()
            .downcast_ref::<UInt8Array>()
            .map(|a| f64::from(a.value(idx))),
        DataType::UInt16 => array
            .as_any()
            .downcast_ref::<UInt16Array>()
            .map(|a| f64::from(a.value(idx))),
        DataType::UInt32 => array
            .as_any()
            .downcast_ref::<UInt32Array>()
            .map(|a| f64::from(a.value(idx))),
        DataType::UInt64 => array
            .as_any()
            .downcast_ref::<UInt64Array>()
            .map(|a| a.value(idx) as f64),
        DataType::Float32 => array
            .as_any()
            .downcast_ref::<Float32Array>()
            .map(|a| f64::from(a.value(idx))),
        DataType::Float64 => array
            .as_any()
            .downcast_ref::<Float64Array>()
            .map(|a| a.value(idx)),
        _ => None,
    }
}

/// Whether a column type can be read through [`value_as_f64`]
#[must_use]
pub fn is_supported_numeric(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Boolean) || data_type.is_numeric()
}
