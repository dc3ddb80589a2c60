mod halfblock;

pub use halfblock::HalfBlockRenderer;

use crate::frame::Frame;
use std::io::Write;

/// One terminal repaint: the downscaled image plus text chrome.
pub struct View<'a> {
    pub term_cols: u16,
    pub term_rows: u16,
    pub visual_rows: u16,
    /// Exactly `term_cols` x `2 * visual_rows` pixels.
    pub image: &'a Frame,
    pub hud: &'a str,
    pub hud_rows: u16,
    pub popup: Option<&'a str>,
    pub sync_updates: bool,
}

/// Pixel size of the preview for a terminal of `size` cells with `hud_rows` reserved.
pub fn preview_pixels(size: (u16, u16), hud_rows: u16) -> (usize, usize, u16) {
    let (cols, rows) = size;
    let visual_rows = rows.saturating_sub(hud_rows).max(1);
    (cols as usize, visual_rows as usize * 2, visual_rows)
}

/// Centred text box over a dimmed backdrop. The first line is drawn as a title.
pub fn draw_popup(out: &mut dyn Write, term_cols: u16, term_rows: u16, text: &str) -> anyhow::Result<()> {
    let cols = term_cols as usize;
    let rows = term_rows as usize;
    if text.trim().is_empty() || cols < 8 || rows < 4 {
        return Ok(());
    }

    let max_inner = cols.saturating_sub(6).max(1);
    let lines = text
        .lines()
        .flat_map(|l| wrap(l, max_inner))
        .collect::<Vec<_>>();
    let inner_w = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(1, max_inner);
    let box_w = (inner_w + 4).min(cols.saturating_sub(2));
    let body_h = lines.len().min(rows.saturating_sub(3).max(1));
    let box_h = body_h + 2;
    let col0 = cols.saturating_sub(box_w) / 2 + 1;
    let row0 = rows.saturating_sub(box_h) / 2 + 1;
    let edge = "-".repeat(box_w.saturating_sub(2));
    let blank = " ".repeat(box_w.saturating_sub(4));

    out.write_all(b"\x1b[0m\x1b[38;2;226;232;244m\x1b[48;2;8;10;18m")?;
    write!(out, "\x1b[{row0};{col0}H+{edge}+")?;
    for (i, line) in lines.iter().take(body_h).enumerate() {
        let row = row0 + 1 + i;
        write!(out, "\x1b[{row};{col0}H| {blank} |")?;
        if i == 0 {
            write!(out, "\x1b[{row};{}H\x1b[1m{line}\x1b[22m", col0 + 2)?;
        } else {
            write!(out, "\x1b[{row};{}H{line}", col0 + 2)?;
        }
    }
    write!(out, "\x1b[{};{col0}H+{edge}+", row0 + box_h - 1)?;
    out.write_all(b"\x1b[0m")?;
    Ok(())
}

fn wrap(line: &str, width: usize) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }
    let chars = line.chars().collect::<Vec<_>>();
    chars.chunks(width.max(1)).map(|c| c.iter().collect()).collect()
}
