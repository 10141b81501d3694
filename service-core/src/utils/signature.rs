use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Lowercase hex HMAC-SHA256 over the fields joined with `|`.
pub fn sign_fields(secret: &str, fields: &[&str]) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    mac.update(fields.join("|").as_bytes());
    let result = mac.finalize();

    Ok(hex::encode(result.into_bytes()))
}

/// Verify a `sign_fields` signature using constant-time comparison.
pub fn verify_fields(
    secret: &str,
    fields: &[&str],
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected_signature = sign_fields(secret, fields)?;
    Ok(constant_time_eq(&expected_signature, signature))
}

fn constant_time_eq(expected: &str, candidate: &str) -> bool {
    let expected_bytes = expected.as_bytes();
    let candidate_bytes = candidate.as_bytes();

    if expected_bytes.len() != candidate_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(candidate_bytes).into()
}
