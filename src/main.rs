use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cfg = beatfx::config::Config::parse();
    if cfg.list_devices {
        beatfx::audio::list_input_devices()?;
        return Ok(());
    }
    if cfg.list_effects {
        beatfx::app::list_effects()?;
        return Ok(());
    }

    beatfx::app::run(cfg)
}
