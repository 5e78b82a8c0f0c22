use std::cmp::Ordering;

use bytemuck::{cast_slice, pod_collect_to_vec};

use crate::error::{IndexError, Result};

const MAGIC: &[u8; 4] = b"DQVI";
const FORMAT_VERSION: u32 = 1;
/// Written in native order; reading it back detects a byte-order change.
const BYTE_ORDER_MARK: u32 = 0x0102_0304;
const HEADER_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Euclidean distance to the query.
    pub distance: f32,
    pub ordinal: usize,
}

/// Exact nearest-neighbour index over a flat, append-only vector buffer.
///
/// The dimension is fixed either at construction or by the first `add`, and
/// every later add or search must match it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    dimension: Option<usize>,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(IndexError::InvalidDimension(0));
        }
        Ok(Self {
            dimension: Some(dimension),
            data: Vec::new(),
        })
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        match self.dimension {
            Some(dim) => self.data.len() / dim,
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
        let dim = self.dimension?;
        let start = ordinal.checked_mul(dim)?;
        let end = start.checked_add(dim)?;
        self.data.get(start..end)
    }

    /// Keeps the first `len` vectors. The dimension is retained.
    pub fn truncate(&mut self, len: usize) {
        if let Some(dim) = self.dimension {
            self.data.truncate(len.saturating_mul(dim));
        }
    }

    /// Appends all vectors or none: widths are validated before anything is
    /// written.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let dimension = match self.dimension {
            Some(dim) => dim,
            None if first.is_empty() => return Err(IndexError::InvalidDimension(0)),
            None => first.len(),
        };
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                found: bad.len(),
            });
        }
        self.dimension = Some(dimension);
        self.data.reserve(vectors.len() * dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// The `k` closest vectors, nearest first. Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                found: query.len(),
            });
        }
        if k == 0 || self.data.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(f32, usize)> = self
            .data
            .chunks_exact(dimension)
            .enumerate()
            .map(|(ordinal, vector)| (squared_l2(query, vector), ordinal))
            .collect();
        if k < scored.len() {
            scored.select_nth_unstable_by(k, compare_hits);
            scored.truncate(k);
        }
        scored.sort_by(compare_hits);
        Ok(scored
            .into_iter()
            .map(|(squared, ordinal)| SearchHit {
                distance: squared.sqrt(),
                ordinal,
            })
            .collect())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let dimension = self.dimension.unwrap_or(0);
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&BYTE_ORDER_MARK.to_ne_bytes());
        out.extend_from_slice(&(dimension as u32).to_le_bytes());
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        out.extend_from_slice(cast_slice::<f32, u8>(&self.data));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(IndexError::Corrupt(format!(
                "vector file too short: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(IndexError::Corrupt("bad vector file magic".to_string()));
        }
        let version = read_u32_le(&bytes[4..8]);
        if version != FORMAT_VERSION {
            return Err(IndexError::Corrupt(format!(
                "unsupported vector file version {version}"
            )));
        }
        let mut mark = [0u8; 4];
        mark.copy_from_slice(&bytes[8..12]);
        if u32::from_ne_bytes(mark) != BYTE_ORDER_MARK {
            return Err(IndexError::Corrupt(
                "vector file was written with a different byte order".to_string(),
            ));
        }
        let dimension = read_u32_le(&bytes[12..16]) as usize;
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&bytes[16..24]);
        let count = u64::from_le_bytes(count_bytes) as usize;
        let payload = &bytes[HEADER_LEN..];
        let expected = count
            .checked_mul(dimension)
            .and_then(|values| values.checked_mul(4))
            .ok_or_else(|| IndexError::Corrupt("vector count overflows".to_string()))?;
        if payload.len() != expected {
            return Err(IndexError::Corrupt(format!(
                "expected {expected} payload bytes for {count} x {dimension}, found {}",
                payload.len()
            )));
        }
        if dimension == 0 {
            if count > 0 {
                return Err(IndexError::Corrupt(
                    "vectors present without a dimension".to_string(),
                ));
            }
            return Ok(Self::new());
        }
        Ok(Self {
            dimension: Some(dimension),
            data: pod_collect_to_vec::<u8, f32>(payload),
        })
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn compare_hits(a: &(f32, usize), b: &(f32, usize)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}
