//! 前処理モジュール - OCR前のページ画像の二値化

use anyhow::{Context, Result};
use image::GrayImage;
use std::path::{Path, PathBuf};

/// ページ画像をグレースケール化して二値化し、前処理済みPNGのパスを返す
/// 出力は同じフォルダの `<元の名前>_pre.png`
pub fn preprocess_image(image_path: impl AsRef<Path>) -> Result<PathBuf> {
    let image_path = image_path.as_ref();
    let img = image::open(image_path)
        .with_context(|| format!("ページ画像の読み込みに失敗: {:?}", image_path))?;

    let gray = img.to_luma8();
    let threshold = otsu_threshold(&gray);
    let binarized = binarize(&gray, threshold);

    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    let out_path = image_path.with_file_name(format!("{}_pre.png", stem));

    binarized
        .save(&out_path)
        .with_context(|| format!("前処理画像の保存に失敗: {:?}", out_path))?;
    Ok(out_path)
}

/// 大津の方法でしきい値を求める
fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total: u64 = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return 128;
    }

    let sum_all: u64 = histogram
        .iter()
        .enumerate()
        .map(|(v, &count)| v as u64 * count)
        .sum();

    let mut sum_bg: u64 = 0;
    let mut weight_bg: u64 = 0;
    let mut best_threshold = 128u8;
    let mut best_variance = 0.0f64;

    for t in 0..256usize {
        weight_bg += histogram[t];
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            break;
        }
        sum_bg += t as u64 * histogram[t];

        let mean_bg = sum_bg as f64 / weight_bg as f64;
        let mean_fg = (sum_all - sum_bg) as f64 / weight_fg as f64;
        let diff = mean_bg - mean_fg;
        let variance = weight_bg as f64 * weight_fg as f64 * diff * diff;

        if variance > best_variance {
            best_variance = variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

/// しきい値で白黒に分ける
fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn half_and_half() -> GrayImage {
        // 左半分が暗く右半分が明るい画像
        GrayImage::from_fn(64, 32, |x, _| {
            if x < 32 { Luma([30u8]) } else { Luma([220u8]) }
        })
    }

    #[test]
    fn otsu_separates_two_populations() {
        let t = otsu_threshold(&half_and_half());
        assert!(t >= 30 && t < 220, "threshold {} out of range", t);
    }

    #[test]
    fn binarize_produces_only_black_and_white() {
        let img = half_and_half();
        let out = binarize(&img, otsu_threshold(&img));
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn preprocess_writes_sibling_pre_png() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("page-1.png");
        half_and_half().save(&src).unwrap();

        let out = preprocess_image(&src).unwrap();
        assert_eq!(out, tmp.path().join("page-1_pre.png"));
        assert!(out.exists());
    }
}
