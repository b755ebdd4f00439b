//! Renders a configuration set into the footswitch's `[section]` /
//! `key = [value]` text format.

use crate::keyconfig::ConfigSet;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Location of the exported page, relative to the chosen output directory.
pub const EXPORT_DIR: &str = "supersetup";
pub const EXPORT_FILE: &str = "page0.txt";

/// Device-wide defaults. Not derived from the key configuration.
pub const GLOBAL_SETUP: &str = "\
[globalsetup]
# Global settings
ledbright = [30]
screenbright = [80]
dark_fonts = [off]
wallpaper = [wp1]
long_press_timing = [1]

";

/// Expression pedal and encoder bindings for the page.
pub const PAGE_SETUP: &str = "\
[PAGE]
page_name = [MIDI]
exp1_CH = [1]
exp1_CC = [1]
exp2_CH = [1]
exp2_CC = [2]
encoder_CC = [90]
encoder_NAME = [MYCC]
midithrough = [on]
display_number_ABC = [123]
group_number = [3]
display_pc_offset = [1]
display_bank_offset = [1]

";

pub fn render(configs: &ConfigSet) -> String {
    let mut out = String::with_capacity(GLOBAL_SETUP.len() + PAGE_SETUP.len() + 256 * configs.len());
    out.push_str(GLOBAL_SETUP);
    out.push_str(PAGE_SETUP);

    // Writing into a String cannot fail.
    for (key, config) in configs.iter() {
        let _ = writeln!(out, "[{}]", key);
        let _ = writeln!(out, "keytimes = [{}]", config.press_count);
        let _ = writeln!(out, "ledmode = [{}]", config.led_mode);

        for (idx, press) in config.presses.iter().enumerate() {
            let n = idx + 1;
            let [c1, c2, c3] = &press.led_colors;
            let _ = writeln!(out, "ledcolor{} = [{}][{}][{}]", n, c1, c2, c3);

            for (trigger, commands) in press.active_triggers() {
                let encoded: Vec<String> = commands.iter().map(|c| c.encode()).collect();
                let _ = writeln!(out, "{}{} = {}", trigger, n, encoded.join(" "));
            }
        }

        out.push('\n');
    }

    out
}

/// Writes `<dir>/supersetup/page0.txt` and returns its path.
pub fn write_export(configs: &ConfigSet, dir: &Path) -> Result<PathBuf> {
    let target_dir = dir.join(EXPORT_DIR);
    fs::create_dir_all(&target_dir)
        .with_context(|| format!("Failed to create export directory {}", target_dir.display()))?;

    let path = target_dir.join(EXPORT_FILE);
    fs::write(&path, render(configs))
        .with_context(|| format!("Failed to write {}", path.display()))?;

    log::info!("exported {} key(s) to {}", configs.len(), path.display());
    Ok(path)
}
