use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustdct::{Dct2, DctPlanner, TransformType2And3};
use serde::{Deserialize, Serialize};

use super::frame::LumaFrame;

/// DCT 输入边长
const HASH_SIZE: usize = 32;
/// 取左上角低频块的边长
const LOW_FREQ: usize = 8;

/// 64 位感知哈希，序列化为 16 位十六进制字符串
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PerceptualHash(pub u64);

impl PerceptualHash {
    /// 汉明距离
    pub fn distance(&self, other: &PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for PerceptualHash {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(PerceptualHash)
    }
}

impl From<PerceptualHash> for String {
    fn from(hash: PerceptualHash) -> Self {
        hash.to_string()
    }
}

impl TryFrom<String> for PerceptualHash {
    type Error = std::num::ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// pHash 计算器：缩放到 32x32 灰度，二维 DCT，取 8x8 低频与中位数比较
pub struct PerceptualHasher {
    dct: Arc<dyn TransformType2And3<f64>>,
}

impl PerceptualHasher {
    pub fn new() -> Self {
        let mut planner = DctPlanner::new();
        Self {
            dct: planner.plan_dct2(HASH_SIZE),
        }
    }

    pub fn hash(&self, frame: &LumaFrame) -> PerceptualHash {
        if frame.is_empty() {
            return PerceptualHash(0);
        }

        let small = frame.resize_to(HASH_SIZE as u32, HASH_SIZE as u32);
        let mut coeffs: Vec<f64> = small.data.iter().map(|&v| v as f64).collect();

        // 行变换
        for row in coeffs.chunks_exact_mut(HASH_SIZE) {
            self.dct.process_dct2(row);
        }
        // 列变换（转置后按行处理）
        let mut transposed = transpose(&coeffs, HASH_SIZE);
        for row in transposed.chunks_exact_mut(HASH_SIZE) {
            self.dct.process_dct2(row);
        }
        let coeffs = transpose(&transposed, HASH_SIZE);

        let mut low = [0f64; LOW_FREQ * LOW_FREQ];
        for a in 0..LOW_FREQ {
            for b in 0..LOW_FREQ {
                low[a * LOW_FREQ + b] = coeffs[a * HASH_SIZE + b];
            }
        }

        let median = median(&low);
        let bits = LOW_FREQ * LOW_FREQ;
        let hash = low
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > median)
            .fold(0u64, |acc, (i, _)| acc | 1u64 << (bits - 1 - i));

        PerceptualHash(hash)
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn transpose(data: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n * n];
    for y in 0..n {
        for x in 0..n {
            out[x * n + y] = data[y * n + x];
        }
    }
    out
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 低频平滑纹理，坐标按比例取值，缩放后结构不变
    fn pattern(width: u32, height: u32, invert: bool) -> LumaFrame {
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let u = x as f64 / width as f64;
                let v = y as f64 / height as f64;
                let value = 128.0
                    + 50.0 * (u * 7.0).sin()
                    + 40.0 * (v * 5.0 + u * 2.0).cos()
                    + 25.0 * (u * v * 11.0).sin();
                let value = value.clamp(0.0, 255.0) as u8;
                data.push(if invert { 255 - value } else { value });
            }
        }
        LumaFrame::new(width, height, data)
    }

    #[test]
    fn test_hamming_distance() {
        let a = PerceptualHash(0b1010);
        let b = PerceptualHash(0b0110);
        assert_eq!(a.distance(&b), 2);
        assert_eq!(a.distance(&a), 0);
        assert_eq!(PerceptualHash(0).distance(&PerceptualHash(u64::MAX)), 64);
    }

    #[test]
    fn test_hex_roundtrip() {
        let hash = PerceptualHash(0x00ff_1234_abcd_0001);
        assert_eq!(hash.to_string(), "00ff1234abcd0001");
        assert_eq!("00ff1234abcd0001".parse::<PerceptualHash>().unwrap(), hash);

        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, "\"00ff1234abcd0001\"");
        let back: PerceptualHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_identical_frames_hash_equal() {
        let hasher = PerceptualHasher::new();
        let a = pattern(64, 48, false);
        let b = a.clone();
        assert_eq!(hasher.hash(&a), hasher.hash(&b));
    }

    #[test]
    fn test_scaled_frame_is_near() {
        let hasher = PerceptualHasher::new();
        let big = pattern(128, 96, false);
        let small = big.resize_to(64, 48);
        let d = hasher.hash(&big).distance(&hasher.hash(&small));
        assert!(d < 10, "scaled copy should be near, got {}", d);
    }

    #[test]
    fn test_inverted_frame_is_far() {
        let hasher = PerceptualHasher::new();
        let a = hasher.hash(&pattern(64, 64, false));
        let b = hasher.hash(&pattern(64, 64, true));
        assert!(a.distance(&b) >= 32, "got {}", a.distance(&b));
    }

    #[test]
    fn test_empty_frame() {
        let hasher = PerceptualHasher::new();
        assert_eq!(hasher.hash(&LumaFrame::new(0, 0, vec![])), PerceptualHash(0));
    }

    #[test]
    fn test_median_even() {
        assert_eq!(median(&[1.0, 4.0, 2.0, 3.0]), 2.5);
    }
}
