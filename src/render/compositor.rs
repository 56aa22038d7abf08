//! Отрисовка пузырей с репликами поверх фона
//!
//! Пузырь строится по габаритам перенесённого текста. Положение зависит от
//! стороны говорящего, медленный повтор выделяется цветом и маркером.
//! Если ни один шрифт не загрузился, используется встроенный блочный рендер.

use std::path::{Path, PathBuf};

use fontdue::{Font, FontSettings};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Pixel, Rgba, RgbaImage};

use crate::config::BubbleStyle;
use crate::error::{DialogueVideoError, Result};
use crate::models::{DialogueLine, PlaybackSegment, Speaker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

enum GlyphRenderer {
    Font(Font),
    /// Каждый непробельный символ рисуется прямоугольником фиксированной ширины
    Builtin,
}

impl GlyphRenderer {
    fn load(paths: &[PathBuf]) -> Self {
        for path in paths {
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(_) => continue,
            };
            match Font::from_bytes(bytes, FontSettings::default()) {
                Ok(font) => {
                    log::debug!("Using font {}", path.display());
                    return Self::Font(font);
                }
                Err(e) => log::warn!("Failed to parse font {}: {}", path.display(), e),
            }
        }
        log::warn!("No usable font found; falling back to built-in glyphs");
        Self::Builtin
    }

    fn line_height(&self, size: f32) -> f32 {
        match self {
            Self::Font(font) => font
                .horizontal_line_metrics(size)
                .map(|m| m.new_line_size)
                .unwrap_or(size * 1.2),
            Self::Builtin => size * 1.2,
        }
    }

    fn ascent(&self, size: f32) -> f32 {
        match self {
            Self::Font(font) => font
                .horizontal_line_metrics(size)
                .map(|m| m.ascent)
                .unwrap_or(size * 0.8),
            Self::Builtin => size * 0.8,
        }
    }

    fn text_width(&self, text: &str, size: f32) -> f32 {
        match self {
            Self::Font(font) => text
                .chars()
                .map(|c| font.metrics(c, size).advance_width)
                .sum(),
            Self::Builtin => text.chars().count() as f32 * builtin_advance(size),
        }
    }

    fn draw_line(&self, canvas: &mut RgbaImage, x: f32, top: f32, text: &str, size: f32, color: [u8; 4]) {
        let mut pen = x;
        match self {
            Self::Font(font) => {
                let baseline = top + self.ascent(size);
                for c in text.chars() {
                    let (metrics, bitmap) = font.rasterize(c, size);
                    let gx = (pen + metrics.xmin as f32).round() as i64;
                    let gy = (baseline - (metrics.height as i32 + metrics.ymin) as f32).round() as i64;
                    for row in 0..metrics.height {
                        for col in 0..metrics.width {
                            let coverage = bitmap[row * metrics.width + col];
                            if coverage == 0 {
                                continue;
                            }
                            let alpha = (u16::from(coverage) * u16::from(color[3]) / 255) as u8;
                            blend_at(
                                canvas,
                                gx + col as i64,
                                gy + row as i64,
                                [color[0], color[1], color[2], alpha],
                            );
                        }
                    }
                    pen += metrics.advance_width;
                }
            }
            Self::Builtin => {
                let advance = builtin_advance(size);
                for c in text.chars() {
                    if !c.is_whitespace() {
                        let glyph = Rect {
                            x: (pen + advance * 0.1).round() as i64,
                            y: (top + size * 0.2).round() as i64,
                            w: (advance * 0.8).round().max(1.0) as i64,
                            h: (size * 0.7).round().max(1.0) as i64,
                        };
                        fill_rounded_rect(canvas, glyph, 0, color);
                    }
                    pen += advance;
                }
            }
        }
    }
}

fn builtin_advance(size: f32) -> f32 {
    (size * 0.55).max(1.0)
}

/// Рендер кадров одного диалога
pub struct FrameCompositor {
    background: RgbaImage,
    style: BubbleStyle,
    glyphs: GlyphRenderer,
    marker: Option<RgbaImage>,
}

impl FrameCompositor {
    /// Загрузить фон и ресурсы оформления
    pub fn load(background_path: &Path, style: &BubbleStyle) -> Result<Self> {
        let background = image::open(background_path)?.to_rgba8();
        Ok(Self::from_image(background, style))
    }

    pub fn from_image(background: RgbaImage, style: &BubbleStyle) -> Self {
        let glyphs = GlyphRenderer::load(&style.font_paths);
        let marker = style.marker_path.as_deref().and_then(|path| {
            match image::open(path) {
                Ok(img) => Some(imageops::resize(
                    &img.to_rgba8(),
                    style.marker_size,
                    style.marker_size,
                    FilterType::Lanczos3,
                )),
                Err(e) => {
                    log::warn!("Could not load repeat marker {}: {}", path.display(), e);
                    None
                }
            }
        });
        Self {
            background,
            style: style.clone(),
            glyphs,
            marker,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.background.dimensions()
    }

    /// Габариты пузыря для реплики на кадре текущего размера
    pub fn bubble_rect(&self, line: &DialogueLine) -> Rect {
        let (width, height) = self.dimensions();
        let style = &self.style;
        let lines = wrap_text(&line.text, style.wrap_width);
        let text_w = lines
            .iter()
            .map(|l| self.glyphs.text_width(l, style.font_size))
            .fold(0.0f32, f32::max)
            .ceil() as i64;
        let text_h = (self.glyphs.line_height(style.font_size) * lines.len().max(1) as f32).ceil() as i64;

        let padding = i64::from(style.padding);
        let margin = i64::from(style.side_margin);
        let w = text_w + padding * 2;
        let h = text_h + padding * 2;
        let x = match line.speaker {
            Speaker::Left => margin,
            Speaker::Right => i64::from(width) - w - margin,
        };
        Rect {
            x,
            y: i64::from(height / 3),
            w,
            h,
        }
    }

    /// Прозрачный слой с пузырём размером с фон
    pub fn render_overlay(&self, line: &DialogueLine, is_repeated: bool) -> RgbaImage {
        let (width, height) = self.dimensions();
        let style = &self.style;
        let mut overlay = RgbaImage::new(width, height);

        let bubble = self.bubble_rect(line);
        let fill = if is_repeated {
            style.repeated_fill
        } else {
            style.fill
        };
        fill_rounded_rect(&mut overlay, bubble, i64::from(style.corner_radius), fill);

        let line_height = self.glyphs.line_height(style.font_size);
        let text_x = (bubble.x + i64::from(style.padding)) as f32;
        let mut text_y = (bubble.y + i64::from(style.padding)) as f32;
        for text in wrap_text(&line.text, style.wrap_width) {
            self.glyphs
                .draw_line(&mut overlay, text_x, text_y, &text, style.font_size, style.text_color);
            text_y += line_height;
        }

        if is_repeated {
            let half = i64::from(style.marker_size / 2);
            let (mx, my) = (bubble.x - half, bubble.y - half);
            match &self.marker {
                Some(marker) => imageops::overlay(&mut overlay, marker, mx, my),
                None => draw_badge(&mut overlay, mx, my, i64::from(style.marker_size)),
            }
        }

        overlay
    }

    /// Полный кадр: фон без изменений плюс слой с пузырём
    pub fn compose(&self, line: &DialogueLine, is_repeated: bool) -> RgbaImage {
        let mut frame = self.background.clone();
        imageops::overlay(&mut frame, &self.render_overlay(line, is_repeated), 0, 0);
        frame
    }

    /// Отрисовать кадр сегмента и сохранить как RGB изображение
    pub fn save_frame(&self, segment: &PlaybackSegment, path: &Path) -> Result<()> {
        save_rgb(self.compose(&segment.line, segment.is_repeated), path)
    }

    /// Сохранить чистый фон в том же формате, что и кадры
    pub fn save_background(&self, path: &Path) -> Result<()> {
        save_rgb(self.background.clone(), path)
    }
}

fn save_rgb(frame: RgbaImage, path: &Path) -> Result<()> {
    DynamicImage::ImageRgba8(frame)
        .to_rgb8()
        .save(path)
        .map_err(|e| DialogueVideoError::Rendering(format!("{}: {}", path.display(), e)))
}

/// Перенос текста по словам на заданную ширину в символах.
/// Слова длиннее ширины разрываются.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();
        while !chars.is_empty() {
            let needed = if current_len == 0 {
                chars.len()
            } else {
                current_len + 1 + chars.len()
            };
            if needed <= width {
                if current_len > 0 {
                    current.push(' ');
                    current_len += 1;
                }
                current.extend(chars.iter());
                current_len += chars.len();
                chars.clear();
            } else if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            } else {
                let rest = chars.split_off(width);
                lines.push(chars.iter().collect());
                chars = rest;
            }
        }
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

fn blend_at(canvas: &mut RgbaImage, x: i64, y: i64, color: [u8; 4]) {
    if x < 0 || y < 0 || x >= i64::from(canvas.width()) || y >= i64::from(canvas.height()) {
        return;
    }
    canvas.get_pixel_mut(x as u32, y as u32).blend(&Rgba(color));
}

fn fill_rounded_rect(canvas: &mut RgbaImage, rect: Rect, radius: i64, color: [u8; 4]) {
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = (rect.x + rect.w).min(i64::from(canvas.width()));
    let y1 = (rect.y + rect.h).min(i64::from(canvas.height()));
    let radius = radius.min(rect.w / 2).min(rect.h / 2).max(0);

    for y in y0..y1 {
        for x in x0..x1 {
            if rounded_rect_contains(x, y, rect, radius) {
                blend_at(canvas, x, y, color);
            }
        }
    }
}

fn rounded_rect_contains(x: i64, y: i64, rect: Rect, radius: i64) -> bool {
    let (left, top) = (rect.x, rect.y);
    let (right, bottom) = (rect.x + rect.w - 1, rect.y + rect.h - 1);
    if x < left || x > right || y < top || y > bottom {
        return false;
    }
    let radius = radius.min((rect.w - 1) / 2).min((rect.h - 1) / 2);
    if radius <= 0 {
        return true;
    }
    let cx = x.clamp(left + radius, right - radius);
    let cy = y.clamp(top + radius, bottom - radius);
    let (dx, dy) = (x - cx, y - cy);
    dx * dx + dy * dy <= radius * radius
}

/// Круглый значок повтора, если картинка-маркер не задана
fn draw_badge(canvas: &mut RgbaImage, x: i64, y: i64, size: i64) {
    let outer = Rect { x, y, w: size, h: size };
    fill_rounded_rect(canvas, outer, size / 2, [70, 120, 60, 255]);
    let inset = size / 5;
    let shell = Rect {
        x: x + inset,
        y: y + inset,
        w: size - inset * 2,
        h: size - inset * 2,
    };
    fill_rounded_rect(canvas, shell, shell.w / 2, [150, 200, 120, 255]);
}
