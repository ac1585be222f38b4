// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Vector distance functions. Lower distance is better for every metric.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine similarity`, in `[0, 2]`
    #[default]
    Cosine,
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    pub fn distance(self, a: &[f32], b: &[f32]) -> Result<f64, EngineError> {
        if a.len() != b.len() {
            return Err(EngineError::DimensionMismatch {
                expected: a.len(),
                actual: b.len(),
            });
        }

        Ok(match self {
            Self::Cosine => 1.0 - cosine_similarity(a, b),
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = f64::from(*x) - f64::from(*y);
                    d * d
                })
                .sum::<f64>()
                .sqrt(),
            Self::Manhattan => a
                .iter()
                .zip(b)
                .map(|(x, y)| (f64::from(*x) - f64::from(*y)).abs())
                .sum(),
        })
    }

    /// Map a distance onto a similarity where higher is better.
    pub fn similarity(self, distance: f64) -> f64 {
        match self {
            Self::Cosine => 1.0 - distance,
            Self::Euclidean | Self::Manhattan => 1.0 / (1.0 + distance),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "manhattan" | "l1" => Ok(Self::Manhattan),
            other => Err(format!("unknown metric: {other}")),
        }
    }
}

/// Cosine similarity; zero vectors are orthogonal to everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_is_zero_distance() {
        let d = DistanceMetric::Cosine.distance(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        let m = DistanceMetric::Cosine;
        assert!((m.distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap() - 1.0).abs() < 1e-9);
        assert!((m.distance(&[1.0, 0.0], &[-1.0, 0.0]).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_ordering_inverse_of_similarity() {
        let q = [1.0, 0.0, 0.0];
        let near = [0.9, 0.1, 0.0];
        let far = [0.1, 0.9, 0.0];
        let m = DistanceMetric::Cosine;
        let d_near = m.distance(&q, &near).unwrap();
        let d_far = m.distance(&q, &far).unwrap();
        assert!(d_near < d_far);
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
        assert!(m.similarity(d_near) > m.similarity(d_far));
    }

    #[test]
    fn test_euclidean_and_manhattan() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert!((DistanceMetric::Euclidean.distance(&a, &b).unwrap() - 5.0).abs() < 1e-9);
        assert!((DistanceMetric::Manhattan.distance(&a, &b).unwrap() - 7.0).abs() < 1e-9);
        assert!((DistanceMetric::Euclidean.similarity(0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = DistanceMetric::Euclidean.distance(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, EngineError::DimensionMismatch { expected: 1, actual: 2 }));
    }

    #[test]
    fn test_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_parse_and_serde() {
        assert_eq!("L2".parse::<DistanceMetric>(), Ok(DistanceMetric::Euclidean));
        let m: DistanceMetric = serde_json::from_str("\"manhattan\"").unwrap();
        assert_eq!(m, DistanceMetric::Manhattan);
    }
}
