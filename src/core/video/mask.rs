use image::{DynamicImage, GenericImageView};

use crate::core::error::ProviderError;

/// 与帧同尺寸的二值前景蒙版（主体 = true）
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<bool>,
}

impl Mask {
    pub fn new(width: u32, height: u32, data: Vec<bool>) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn full(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![true; (width * height) as usize])
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![false; (width * height) as usize])
    }

    /// 值大于阈值的像素视为前景
    pub fn from_plane(width: u32, height: u32, plane: &[u8], threshold: u8) -> Self {
        Self::new(width, height, plane.iter().map(|&v| v > threshold).collect())
    }

    /// 使用 alpha 通道作为蒙版（抠图后的 RGBA 帧）
    pub fn from_alpha(image: &DynamicImage, threshold: u8) -> Result<Self, ProviderError> {
        if !image.color().has_alpha() {
            return Err(ProviderError::NoAlpha);
        }
        let (width, height) = image.dimensions();
        let rgba = image.to_rgba8();
        let data = rgba.pixels().map(|p| p.0[3] > threshold).collect();
        Ok(Self::new(width, height, data))
    }

    pub fn covered(&self) -> usize {
        self.data.iter().filter(|&&m| m).count()
    }

    pub fn is_empty(&self) -> bool {
        self.covered() == 0
    }

    /// 8 邻域连通区域的像素面积
    pub fn region_areas(&self) -> Vec<usize> {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut visited = vec![false; w * h];
        let mut areas = Vec::new();
        let mut stack = Vec::new();

        for start in 0..w * h {
            if !self.data[start] || visited[start] {
                continue;
            }

            visited[start] = true;
            stack.push(start);
            let mut area = 0usize;

            while let Some(idx) = stack.pop() {
                area += 1;
                let x = idx % w;
                let y = idx / w;

                let y_lo = y.saturating_sub(1);
                let y_hi = (y + 1).min(h - 1);
                let x_lo = x.saturating_sub(1);
                let x_hi = (x + 1).min(w - 1);

                for ny in y_lo..=y_hi {
                    for nx in x_lo..=x_hi {
                        let n = ny * w + nx;
                        if self.data[n] && !visited[n] {
                            visited[n] = true;
                            stack.push(n);
                        }
                    }
                }
            }

            areas.push(area);
        }

        areas
    }

    /// 面积超过整图 `min_area_ratio` 的独立区域数
    pub fn count_regions(&self, min_area_ratio: f64) -> usize {
        let min_area = self.data.len() as f64 * min_area_ratio;
        self.region_areas()
            .into_iter()
            .filter(|&area| area as f64 > min_area)
            .count()
    }
}
