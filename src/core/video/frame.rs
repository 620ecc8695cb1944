use image::{DynamicImage, GrayImage};

use super::mask::Mask;

/// 单通道亮度帧（Y 平面）
#[derive(Debug, Clone, PartialEq)]
pub struct LumaFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl LumaFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(width, height, vec![value; (width * height) as usize])
    }

    pub fn from_image(image: &DynamicImage) -> Self {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        Self::new(width, height, gray.into_raw())
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32) -> LumaFrame {
        let Some(img) = GrayImage::from_raw(self.width, self.height, self.data.clone()) else {
            return LumaFrame::filled(target_width, target_height, 0);
        };
        let resized = image::imageops::resize(
            &img,
            target_width,
            target_height,
            image::imageops::FilterType::Lanczos3,
        );

        LumaFrame {
            width: target_width,
            height: target_height,
            data: resized.into_raw(),
        }
    }

    /// 平均亮度；给定蒙版时只统计蒙版内像素。没有可统计像素时返回 None
    pub fn mean_luma(&self, mask: Option<&Mask>) -> Option<f64> {
        let (sum, count) = match mask {
            Some(mask) => self
                .data
                .iter()
                .zip(mask.data.iter())
                .filter(|(_, m)| **m)
                .fold((0u64, 0u64), |(s, c), (&v, _)| (s + v as u64, c + 1)),
            None => (
                self.data.iter().map(|&v| v as u64).sum::<u64>(),
                self.data.len() as u64,
            ),
        };

        if count == 0 {
            None
        } else {
            Some(sum as f64 / count as f64)
        }
    }

    /// 3x3 拉普拉斯响应 [0 1 0; 1 -4 1; 0 1 0]，边界按 reflect-101 处理
    pub fn laplacian(&self) -> Vec<f64> {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut out = vec![0.0; w * h];
        if w == 0 || h == 0 {
            return out;
        }

        for y in 0..h {
            let up = reflect_101(y as isize - 1, h) * w;
            let down = reflect_101(y as isize + 1, h) * w;
            let row = y * w;
            for x in 0..w {
                let left = reflect_101(x as isize - 1, w);
                let right = reflect_101(x as isize + 1, w);

                let center = self.data[row + x] as i32;
                let sum = self.data[up + x] as i32
                    + self.data[down + x] as i32
                    + self.data[row + left] as i32
                    + self.data[row + right] as i32
                    - 4 * center;
                out[row + x] = sum as f64;
            }
        }

        out
    }
}

fn reflect_101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let last = n as isize - 1;
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i > last {
        i = 2 * last - i;
    }
    i as usize
}

/// 亮度分：越接近理想亮度越高，下限为 0
pub fn brightness_score(mean_luma: f64, ideal: f64) -> f64 {
    (1.0 - (mean_luma - ideal).abs() / ideal).max(0.0)
}

/// 蒙版区域内拉普拉斯响应的总体方差，蒙版为空时为 0
pub fn masked_laplacian_variance(frame: &LumaFrame, mask: &Mask) -> f64 {
    if mask.covered() == 0 || frame.pixel_count() != mask.data.len() {
        return 0.0;
    }

    let laplacian = frame.laplacian();
    let values: Vec<f64> = laplacian
        .iter()
        .zip(mask.data.iter())
        .filter(|(_, m)| **m)
        .map(|(&v, _)| v)
        .collect();

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n
}
