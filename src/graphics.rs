use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, Rgb, RgbImage, imageops::FilterType};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::constants::constants;
use crate::display::DisplayMode;

// --- Thumbnail Widget ---

pub struct ThumbnailWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
}

const ASCII_CHARS: [&str; 10] = [" ", ".", ":", "-", "=", "+", "*", "#", "%", "@"];

impl Widget for ThumbnailWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => render_direct(self.image, area, buf),
      DisplayMode::Ascii => render_ascii(self.image, area, buf),
    }
  }
}

fn cell(area: Rect, offset: u32, i: u32) -> u16 {
  area.x.saturating_add(offset.min(u16::MAX as u32) as u16).saturating_add(i.min(u16::MAX as u32) as u16)
}

fn row(area: Rect, offset: u32, i: u32) -> u16 {
  area.y.saturating_add(offset.min(u16::MAX as u32) as u16).saturating_add(i.min(u16::MAX as u32) as u16)
}

fn render_direct(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let pixels = image.to_rgb8();
  let img_w = pixels.width().min(area.width as u32);
  let img_h = pixels.height();
  let cell_h = img_h.div_ceil(2);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(cell_h) / 2;

  for y in 0..cell_h.min(area.height as u32) {
    for x in 0..img_w {
      let upper = pixels.get_pixel(x, y * 2);
      let fg = Color::Rgb(upper[0], upper[1], upper[2]);
      let bg = if y * 2 + 1 < img_h {
        let lower = pixels.get_pixel(x, y * 2 + 1);
        Color::Rgb(lower[0], lower[1], lower[2])
      } else {
        Color::Reset
      };
      buf.set_string(cell(area, offset_x, x), row(area, offset_y, y), "▀", Style::default().fg(fg).bg(bg));
    }
  }
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let luma = image.to_luma8();
  let img_w = luma.width().min(area.width as u32);
  let img_h = luma.height().min(area.height as u32);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(img_h) / 2;

  for y in 0..img_h {
    for x in 0..img_w {
      let pixel = luma.get_pixel(x, y)[0];
      let idx = ((pixel as f32 / 255.0) * (ASCII_CHARS.len() - 1) as f32).round() as usize;
      buf.set_string(
        cell(area, offset_x, x),
        row(area, offset_y, y),
        ASCII_CHARS[idx.min(ASCII_CHARS.len() - 1)],
        Style::default(),
      );
    }
  }
}

/// Resize to cover `area`. Half-block cells hold two pixel rows.
pub fn fit_to_area(image: &DynamicImage, area: Rect, mode: DisplayMode) -> DynamicImage {
  let target_w = area.width.max(1) as u32;
  let target_h = match mode {
    DisplayMode::Direct => area.height as u32 * 2,
    DisplayMode::Ascii => area.height as u32,
  };
  image.resize_to_fill(target_w, target_h.max(1), FilterType::Triangle)
}

// --- Thumbnail loading ---

async fn fetch_image(client: &Client, url: &str) -> Result<DynamicImage> {
  let response = client.get(url).send().await.with_context(|| format!("Failed to request {}", url))?;
  if !response.status().is_success() {
    return Err(anyhow!("Thumbnail request to {} returned {}", url, response.status()));
  }
  let bytes = response.bytes().await.with_context(|| format!("Failed to read image bytes from {}", url))?;
  image::load_from_memory(&bytes).with_context(|| format!("Failed to decode image from memory (URL: {})", url))
}

/// Download a thumbnail. On failure the configured fallback image is tried,
/// then a generated placeholder is used, so this never fails.
pub async fn load_thumbnail(client: &Client, url: &str) -> DynamicImage {
  match fetch_image(client, url).await {
    Ok(image) => return image,
    Err(e) => warn!(err = %e, "thumbnail failed, using fallback"),
  }
  match fetch_image(client, &constants().fallback_thumbnail_url).await {
    Ok(image) => image,
    Err(e) => {
      debug!(err = %e, "fallback thumbnail unavailable");
      placeholder_image()
    }
  }
}

/// A dark 16:9 frame with a centered play triangle.
pub fn placeholder_image() -> DynamicImage {
  const W: u32 = 320;
  const H: u32 = 180;
  let mut img = RgbImage::from_pixel(W, H, Rgb([39, 39, 39]));
  let (cx, cy) = (W as i64 / 2, H as i64 / 2);
  for y in 0..H {
    for x in 0..W {
      let (dx, dy) = (x as i64 - cx + 20, (y as i64 - cy).abs());
      // Right-pointing triangle 50 px wide, 60 px tall.
      if (0..50).contains(&dx) && dy * 50 <= (50 - dx) * 30 {
        img.put_pixel(x, y, Rgb([200, 200, 200]));
      }
    }
  }
  DynamicImage::ImageRgb8(img)
}

const MAX_FITTED: usize = 256;

/// Downloaded thumbnails by video id, plus copies resized for the cells they
/// were last drawn into.
pub struct ThumbCache {
  originals: HashMap<String, DynamicImage>,
  fitted: HashMap<(String, u16, u16), DynamicImage>,
  requested: HashSet<String>,
  wanted: Vec<(String, String)>,
  tx: mpsc::UnboundedSender<(String, DynamicImage)>,
  rx: mpsc::UnboundedReceiver<(String, DynamicImage)>,
}

impl Default for ThumbCache {
  fn default() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      originals: HashMap::new(),
      fitted: HashMap::new(),
      requested: HashSet::new(),
      wanted: Vec::new(),
      tx,
      rx,
    }
  }
}

impl ThumbCache {
  /// The thumbnail for `video_id` sized for `area`, or `None` while it is
  /// still downloading. The first miss queues a download of `url`.
  pub fn fitted(&mut self, video_id: &str, url: &str, area: Rect, mode: DisplayMode) -> Option<&DynamicImage> {
    let Some(original) = self.originals.get(video_id) else {
      if self.requested.insert(video_id.to_string()) {
        self.wanted.push((video_id.to_string(), url.to_string()));
      }
      return None;
    };
    let key = (video_id.to_string(), area.width, area.height);
    if !self.fitted.contains_key(&key) {
      if self.fitted.len() >= MAX_FITTED {
        self.fitted.clear();
      }
      let resized = fit_to_area(original, area, mode);
      self.fitted.insert(key.clone(), resized);
    }
    self.fitted.get(&key)
  }

  /// Start downloads queued by [`ThumbCache::fitted`].
  pub fn spawn_wanted(&mut self, client: &Client) {
    for (video_id, url) in self.wanted.drain(..) {
      let (tx, client) = (self.tx.clone(), client.clone());
      tokio::spawn(async move {
        let image = load_thumbnail(&client, &url).await;
        let _ = tx.send((video_id, image));
      });
    }
  }

  /// Store finished downloads.
  pub fn drain(&mut self) {
    while let Ok((video_id, image)) = self.rx.try_recv() {
      self.originals.insert(video_id, image);
    }
  }

  #[cfg(test)]
  pub fn queued_urls(&self) -> Vec<&str> {
    self.wanted.iter().map(|(_, url)| url.as_str()).collect()
  }

  #[cfg(test)]
  pub fn insert(&mut self, key: &str, image: DynamicImage) {
    self.originals.insert(key.to_string(), image);
  }

  pub fn clear(&mut self) {
    self.originals.clear();
    self.fitted.clear();
    self.requested.clear();
    self.wanted.clear();
  }
}
