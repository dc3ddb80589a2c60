use crate::render::preview_pixels;
use anyhow::Context;
use crossterm::{
    cursor,
    terminal::{self, ClearType},
    QueueableCommand,
};
use std::io::{stdout, BufWriter, Stdout, Write};

/// Where the preview image and HUD go for one terminal size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreviewLayout {
    pub cols: u16,
    pub rows: u16,
    pub hud_rows: u16,
    pub visual_rows: u16,
    pub px_w: usize,
    pub px_h: usize,
}

impl PreviewLayout {
    /// Up to two HUD rows when shown; at least one row is left for the image.
    pub fn for_size(size: (u16, u16), show_hud: bool) -> Self {
        let hud_rows = if show_hud { size.1.saturating_sub(1).min(2) } else { 0 };
        let (px_w, px_h, visual_rows) = preview_pixels(size, hud_rows);
        Self {
            cols: size.0,
            rows: size.1,
            hud_rows,
            visual_rows,
            px_w,
            px_h,
        }
    }
}

/// The preview's hold on the terminal: raw mode, alternate screen, hidden cursor and a
/// buffered stdout. Everything is undone on drop.
pub struct PreviewTerminal {
    out: BufWriter<Stdout>,
    last_size: Option<(u16, u16)>,
}

impl PreviewTerminal {
    pub fn enter() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        // Drop restores raw mode if a later step fails.
        let mut term = Self {
            out: BufWriter::new(stdout()),
            last_size: None,
        };
        term.out
            .queue(terminal::EnterAlternateScreen)?
            .queue(terminal::Clear(ClearType::All))?
            .queue(cursor::Hide)?;
        term.out.flush().context("enter alternate screen")?;
        Ok(term)
    }

    /// Layout for the current size. A resize clears the screen so no stale rows remain
    /// below a shrunken image.
    pub fn layout(&mut self, show_hud: bool) -> anyhow::Result<PreviewLayout> {
        let size = terminal::size().context("query terminal size")?;
        if self.last_size.is_some_and(|s| s != size) {
            tracing::debug!(cols = size.0, rows = size.1, "terminal resized");
            self.out.queue(terminal::Clear(ClearType::All))?;
        }
        self.last_size = Some(size);
        Ok(PreviewLayout::for_size(size, show_hud))
    }

    pub fn out(&mut self) -> &mut BufWriter<Stdout> {
        &mut self.out
    }
}

impl Drop for PreviewTerminal {
    fn drop(&mut self) {
        // Sync output off, autowrap on, colours reset.
        let _ = self.out.write_all(b"\x1b[?2026l\x1b[?7h\x1b[0m");
        let _ = self.out.queue(cursor::Show);
        let _ = self.out.queue(terminal::LeaveAlternateScreen);
        let _ = self.out.flush();
        let _ = terminal::disable_raw_mode();
    }
}
