// ── Memory vectors: BLOB codec and similarity ───────────────────────────────
//
// `memories.vector` holds the embedder's output as packed little-endian f32.
// The engine never assumes a fixed dimension: records from different
// embedders can coexist, and comparing vectors of unequal length scores 0.

use crate::atoms::error::EngineError;

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Pack a memory vector for the `vector` column.
pub(crate) fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * F32_BYTES);
    for x in vector {
        blob.extend_from_slice(&x.to_le_bytes());
    }
    blob
}

/// Unpack the `vector` column. A blob whose length is not a whole number of
/// floats is a corrupt row and fails the read instead of being truncated.
pub(crate) fn decode_vector(column: usize, blob: &[u8]) -> rusqlite::Result<Vec<f32>> {
    if blob.len() % F32_BYTES != 0 {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Blob,
            Box::new(EngineError::Other(format!("vector blob of {} bytes", blob.len()))),
        ));
    }
    Ok(blob
        .chunks_exact(F32_BYTES)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity in f64. Empty, zero-norm, mismatched or non-finite
/// inputs score 0 so a bad vector can never outrank a good one.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (dot, na, nb) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |(dot, na, nb), (&x, &y)| {
        let (x, y) = (f64::from(x), f64::from(y));
        (dot + x * y, na + x * x, nb + y * y)
    });
    let denom = (na * nb).sqrt();
    let sim = dot / denom;
    if denom < 1e-12 || !sim.is_finite() {
        0.0
    } else {
        sim
    }
}
