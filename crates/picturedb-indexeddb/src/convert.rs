//! JS <-> Record conversion
//!
//! Records are stored as plain `{ id: number, data: string }` objects so the
//! database stays readable from JavaScript devtools and other callers.

use picturedb_core::{ImageId, Record};
use wasm_bindgen::JsValue;

use crate::error::{IndexedDbError, Result};

/// Convert a Record to a JS object for IndexedDB storage.
pub fn record_to_js(record: &Record) -> Result<JsValue> {
    let obj = js_sys::Object::new();
    set_prop(&obj, "id", &JsValue::from_f64(record.id as f64))?;
    set_prop(&obj, "data", &JsValue::from_str(&record.data))?;
    Ok(obj.into())
}

/// Convert a JS object from IndexedDB back to a Record.
pub fn js_to_record(val: &JsValue) -> Result<Record> {
    let id = to_image_id(get_number_prop(val, "id")?)?;
    let data = get_string_prop(val, "data")?;
    Ok(Record { id, data })
}

/// Convert the result of `getAll()` into Records, preserving order.
pub fn js_to_records(val: &JsValue) -> Result<Vec<Record>> {
    let array = js_sys::Array::from(val);
    let mut records = Vec::with_capacity(array.length() as usize);
    for i in 0..array.length() {
        records.push(js_to_record(&array.get(i))?);
    }
    Ok(records)
}

/// Largest integer a JS number holds exactly (`Number.MAX_SAFE_INTEGER`).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Stored ids must be integral and exactly representable.
fn to_image_id(n: f64) -> Result<ImageId> {
    if !n.is_finite() || n.fract() != 0.0 || n.abs() > MAX_SAFE_INTEGER {
        return Err(IndexedDbError::Convert(format!("{} is not a valid image id", n)));
    }
    Ok(n as ImageId)
}

/// Set a property on a JS object.
fn set_prop(obj: &js_sys::Object, key: &str, val: &JsValue) -> Result<()> {
    js_sys::Reflect::set(obj, &key.into(), val)
        .map_err(|_| IndexedDbError::Convert(format!("failed to set property: {}", key)))?;
    Ok(())
}

/// Get a string property from a JS object.
fn get_string_prop(val: &JsValue, key: &str) -> Result<String> {
    let prop = js_sys::Reflect::get(val, &key.into())
        .map_err(|_| IndexedDbError::Convert(format!("missing property: {}", key)))?;
    prop.as_string()
        .ok_or_else(|| IndexedDbError::Convert(format!("{} is not a string", key)))
}

/// Get a number property from a JS object.
fn get_number_prop(val: &JsValue, key: &str) -> Result<f64> {
    let prop = js_sys::Reflect::get(val, &key.into())
        .map_err(|_| IndexedDbError::Convert(format!("missing property: {}", key)))?;
    prop.as_f64()
        .ok_or_else(|| IndexedDbError::Convert(format!("{} is not a number", key)))
}
