//! Bucket policy handling
//!
//! A bucket policy can be given either as a JSON object or as a string holding one
//! (the form it takes when read from the environment). Both are normalised to the
//! compact JSON text sent to the server.

use serde_json::Value;

/// Normalise a configured bucket policy into the JSON document sent to the server.
pub fn normalize_policy(policy: &Value) -> Result<String, anyhow::Error> {
    let document = match policy {
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .map_err(|e| anyhow::anyhow!("MINIO_BUCKET_POLICY is not valid JSON: {}", e))?,
        other => other.clone(),
    };

    if !document.is_object() {
        return Err(anyhow::anyhow!(
            "MINIO_BUCKET_POLICY must be a JSON object"
        ));
    }

    Ok(serde_json::to_string(&document)?)
}
