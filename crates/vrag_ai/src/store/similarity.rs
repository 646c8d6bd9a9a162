pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity with precomputed norms. A zero vector has no direction and
/// scores 0.0 against everything.
pub fn cosine_similarity(a: &[f32], b: &[f32], a_norm: f32, b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}

pub fn encode_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_and_orthogonal_vectors() {
        let a = [1.0, 0.0];
        let b = [2.0, 0.0];
        let c = [0.0, 3.0];
        let s = cosine_similarity(&a, &b, l2_norm(&a), l2_norm(&b));
        assert!((s - 1.0).abs() < 1e-6);
        let s = cosine_similarity(&a, &c, l2_norm(&a), l2_norm(&c));
        assert!(s.abs() < 1e-6);
    }

    #[test]
    fn zero_vector_scores_zero_instead_of_nan() {
        let a = [1.0, 0.0];
        let z = [0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &z, l2_norm(&a), l2_norm(&z)), 0.0);
        assert_eq!(cosine_similarity(&z, &z, 0.0, 0.0), 0.0);
    }

    #[test]
    fn vector_bytes_are_little_endian_f32() {
        let v = vec![0.5f32, -1.25, 3.0];
        let bytes = encode_vector(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_vector(&bytes), v);
    }
}
