use crate::core::Result;
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const FINGERPRINT_PREFIX: &str = "sha256-";

/// Serialize `value` with object keys sorted at every level and no
/// whitespace, so equal documents give equal bytes whatever their key order.
pub fn canonical_json(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

/// Content fingerprint of a draft blob: `sha256-<hex>` of its canonical form.
pub fn fingerprint(value: &Value) -> Result<String> {
    let canonical = canonical_json(value)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(format!("{}{}", FINGERPRINT_PREFIX, hex::encode(digest)))
}
