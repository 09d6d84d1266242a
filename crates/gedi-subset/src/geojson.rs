//! GeoJSON output.
//!
//! Each row becomes a Point feature whose properties are the row's
//! attribute values. Columns of whole rows become JSON arrays.

use std::io::Write;

use gedi_common::Scalar;
use serde_json::{json, Map, Number, Value};

use crate::error::Result;
use crate::geoframe::GeoFrame;

fn scalar_to_json(value: Scalar) -> Value {
    match value {
        Scalar::Int(v) => Value::from(v),
        Scalar::UInt(v) => Value::from(v),
        // NaN and infinities have no JSON form.
        Scalar::Float(v) => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
        Scalar::Bool(v) => Value::Bool(v),
        Scalar::Str(v) => Value::String(v),
        Scalar::Row(values) => Value::Array(values.into_iter().map(scalar_to_json).collect()),
    }
}

/// Convert to a GeoJSON FeatureCollection.
pub fn to_feature_collection(frame: &GeoFrame) -> Value {
    let names = frame.frame().column_names();
    let features: Vec<Value> = (0..frame.nrows())
        .filter_map(|i| frame.row(i))
        .map(|(values, point)| {
            let properties: Map<String, Value> = names
                .iter()
                .map(|name| name.to_string())
                .zip(values.into_iter().map(scalar_to_json))
                .collect();
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [point.x, point.y],
                },
                "properties": properties,
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

/// Write a FeatureCollection to `writer`.
pub fn write_geojson<W: Write>(frame: &GeoFrame, writer: W) -> Result<()> {
    serde_json::to_writer(writer, &to_feature_collection(frame))?;
    Ok(())
}
