//! Vector similarity helpers
//!
//! Similarities here are *normalized*: `s = (clamp(cos, -1, 1) + 1) / 2`, so
//! `s` lies in `[0, 1]` and distance is `d = 1 - s`.

/// Cosine similarity; 0.0 when either vector is empty, zero or mismatched
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Cosine mapped onto `[0, 1]`
pub fn normalized_similarity(a: &[f32], b: &[f32]) -> f64 {
    (cosine_similarity(a, b).clamp(-1.0, 1.0) + 1.0) / 2.0
}

pub fn normalized_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - normalized_similarity(a, b)
}

/// Component-wise mean of equal-length vectors
pub fn centroid<'a, I>(vectors: I) -> Vec<f32>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut sum: Vec<f64> = Vec::new();
    let mut count = 0usize;
    for v in vectors {
        if sum.is_empty() {
            sum = vec![0.0; v.len()];
        }
        if v.len() != sum.len() {
            continue;
        }
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += *x as f64;
        }
        count += 1;
    }
    if count == 0 {
        return Vec::new();
    }
    sum.into_iter().map(|x| (x / count as f64) as f32).collect()
}

/// Scale a vector to unit length in place (zero vectors stay zero)
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}

/// Symmetric matrix of normalized distances
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    pub fn build(vectors: &[&[f32]]) -> Self {
        let n = vectors.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = normalized_distance(vectors[i], vectors[j]);
                values[i * n + j] = d;
                values[j * n + i] = d;
            }
        }
        Self { n, values }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    /// Population variance over the upper triangle; 0.0 below two points
    pub fn pairwise_variance(&self) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        let mut count = 0usize;
        let mut mean = 0.0;
        let mut m2 = 0.0;
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                // Welford
                count += 1;
                let x = self.get(i, j);
                let delta = x - mean;
                mean += delta / count as f64;
                m2 += delta * (x - mean);
            }
        }
        m2 / count as f64
    }

    /// Indices within `eps` of `i`, including `i`
    pub fn neighbours(&self, i: usize, eps: f64) -> Vec<usize> {
        (0..self.n).filter(|&j| j == i || self.get(i, j) <= eps).collect()
    }
}
