use crate::render::{draw_popup, View};
use std::io::Write;

const HALF_BLOCK: char = '\u{2580}';

/// Two pixels per cell: the upper half is the foreground colour, the lower half the background.
#[derive(Default)]
pub struct HalfBlockRenderer {
    last_fg: Option<[u8; 3]>,
    last_bg: Option<[u8; 3]>,
}

impl HalfBlockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &View<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let cols = view.term_cols as usize;
        let rows = view.visual_rows as usize;
        let img = view.image;
        if cols == 0 || rows == 0 || img.width() != cols || img.height() != rows * 2 {
            return Ok(());
        }

        if view.sync_updates {
            out.write_all(b"\x1b[?2026h")?;
        }
        // Home, reset, autowrap off so full-width rows do not spill.
        out.write_all(b"\x1b[H\x1b[0m\x1b[?7l")?;
        self.last_fg = None;
        self.last_bg = None;

        for row in 0..rows {
            for x in 0..cols {
                let top = img.pixel(x, row * 2);
                let bot = img.pixel(x, row * 2 + 1);
                if self.last_fg != Some(top) {
                    write!(out, "\x1b[38;2;{};{};{}m", top[0], top[1], top[2])?;
                    self.last_fg = Some(top);
                }
                if self.last_bg != Some(bot) {
                    write!(out, "\x1b[48;2;{};{};{}m", bot[0], bot[1], bot[2])?;
                    self.last_bg = Some(bot);
                }
                write!(out, "{HALF_BLOCK}")?;
            }
            out.write_all(b"\r\n")?;
        }

        let mut hud = view.hud.lines();
        for i in 0..view.hud_rows as usize {
            write!(out, "\x1b[{};1H\x1b[0m\x1b[2K", rows + i + 1)?;
            if let Some(line) = hud.next() {
                let clipped = line.chars().take(cols).collect::<String>();
                write!(out, "{clipped}")?;
            }
        }

        if let Some(text) = view.popup {
            draw_popup(out, view.term_cols, view.term_rows, text)?;
        }

        out.write_all(b"\x1b[?7h")?;
        if view.sync_updates {
            out.write_all(b"\x1b[?2026l")?;
        }
        out.flush()?;
        Ok(())
    }
}
