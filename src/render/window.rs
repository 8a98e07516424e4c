use anyhow::Result;
use image::RgbaImage;
use minifb::{Key, Window, WindowOptions};

/// minifbで合成済みキャンバスを表示する
pub struct MinifbPresenter {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
    title: String,
}

impl MinifbPresenter {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        Ok(Self {
            window,
            buffer: vec![0u32; width * height],
            width,
            height,
            title: title.to_string(),
        })
    }

    /// ウィンドウが開いているか
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, minifb::KeyRepeat::No)
    }

    /// タイトルバーにステータスを出す
    pub fn set_status(&mut self, status: &str) {
        let title = format!("{} - {}", self.title, status);
        self.window.set_title(&title);
    }

    /// RGBA キャンバスを 0RGB バッファに詰め替えて表示
    pub fn present(&mut self, canvas: &RgbaImage) -> Result<()> {
        let (w, h) = (canvas.width() as usize, canvas.height() as usize);
        if (w, h) != (self.width, self.height) {
            self.width = w;
            self.height = h;
            self.buffer.resize(w * h, 0);
        }
        for (dst, p) in self.buffer.iter_mut().zip(canvas.pixels()) {
            *dst = ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32;
        }
        self.window.update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }
}
