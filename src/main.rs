mod command;
mod export;
mod keyconfig;
mod presets;
mod session;
mod validate;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use rich_rust::markup;
use rich_rust::prelude::*;
use rich_rust::r#box::ROUNDED;
use std::io::Write;
use std::path::{Path, PathBuf};

use command::CommandKind;
use keyconfig::{KeyConfig, LedColor, LedMode, Trigger};
use presets::{Pattern, COLOR_PRESETS, COMMAND_PRESETS};
use session::{ColorEdit, CommandEdit, Session};
use validate::{validate_all, Finding, Severity};

#[derive(Parser)]
#[command(name = "supersetup")]
#[command(version)]
#[command(about = "Footswitch configuration editor: LED colors, press triggers and MIDI/HID commands")]
#[command(
    long_about = "Edit the per-key setup of a MIDI/HID footswitch and export it as the supersetup/page0.txt file read by the device.\n\nEvery edit is stored in a session file, so a configuration can be built up over several invocations and exported when ready."
)]
struct Cli {
    /// Session file holding the configuration being edited
    #[arg(long, global = true, value_name = "PATH")]
    session: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a fresh session holding one default key
    New {
        /// Replace an existing session
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration of one key, or of every key
    Show {
        /// Key to show (key0-key9); all keys when omitted
        key: Option<String>,
    },

    /// Select the key that later edits apply to
    Select {
        /// Key identifier (key0-key9)
        key: String,
    },

    /// Set how many presses the key cycles through (1-9)
    Keytimes {
        count: u32,

        /// Key to edit (defaults to the selected key)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Set the LED display mode
    Ledmode {
        #[arg(value_enum)]
        mode: LedMode,

        /// Key to edit (defaults to the selected key)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Set one LED segment color (hex like 0xff0000, or a preset name)
    Color {
        /// Press number (1-based)
        #[arg(value_parser = clap::value_parser!(u64).range(1..=9))]
        press: u64,

        /// LED segment (1-3)
        #[arg(value_parser = clap::value_parser!(u64).range(1..=3))]
        segment: u64,

        value: String,

        /// Key to edit (defaults to the selected key)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Apply an LED quick pattern to a press
    Pattern {
        /// Press number (1-based)
        #[arg(value_parser = clap::value_parser!(u64).range(1..=9))]
        press: u64,

        #[arg(value_enum)]
        pattern: Pattern,

        /// Key to edit (defaults to the selected key)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Append a command (or a preset sequence) to a trigger timing
    AddCommand {
        /// Press number (1-based)
        #[arg(value_parser = clap::value_parser!(u64).range(1..=9))]
        press: u64,

        #[arg(value_enum)]
        timing: Trigger,

        /// Command preset to append instead of a default Program Change
        #[arg(long)]
        preset: Option<String>,

        /// Key to edit (defaults to the selected key)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Edit one command of a trigger timing
    SetCommand {
        /// Press number (1-based)
        #[arg(value_parser = clap::value_parser!(u64).range(1..=9))]
        press: u64,

        #[arg(value_enum)]
        timing: Trigger,

        /// Command number within the timing (1-based)
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        index: u64,

        /// Command type; switching type resets the other fields
        #[arg(long, value_enum)]
        kind: Option<CommandKind>,

        /// MIDI channel (1-16)
        #[arg(long)]
        channel: Option<String>,

        /// Value (0-127, a PC token like inc1/random/auto, or an HID action)
        #[arg(long)]
        value: Option<String>,

        /// Parameter (0-127, '-', an HID key/modifier, or a delay in ms)
        #[arg(long)]
        param: Option<String>,

        /// Key to edit (defaults to the selected key)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Remove one command from a trigger timing
    DeleteCommand {
        /// Press number (1-based)
        #[arg(value_parser = clap::value_parser!(u64).range(1..=9))]
        press: u64,

        #[arg(value_enum)]
        timing: Trigger,

        /// Command number within the timing (1-based)
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        index: u64,

        /// Key to edit (defaults to the selected key)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Check every key against the device's ranges
    Validate {
        /// Exit with an error status when any error is found
        #[arg(long)]
        strict: bool,
    },

    /// Write supersetup/page0.txt for the device
    Export {
        /// Directory that receives the supersetup/ folder
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Print the file to stdout instead of writing it
        #[arg(long)]
        stdout: bool,
    },

    /// List color presets, command presets and quick patterns
    Presets,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

struct Supersetup {
    console: Console,
    session_path: PathBuf,
}

impl Supersetup {
    fn new(session_path: PathBuf) -> Self {
        Self {
            console: Console::new(),
            session_path,
        }
    }

    fn load(&self) -> Result<Session> {
        Session::load(&self.session_path)
    }

    fn save(&self, session: &mut Session) -> Result<()> {
        session.save(&self.session_path)
    }

    fn print_header(&self, title: &str) {
        self.console.print("");
        self.console.print(
            "[bold #3498db]┌─────────────────────────────────────────────────────────────────┐[/]",
        );
        self.console.print(&format!(
            "[bold #3498db]│[/]  [bold #f39c12]◆[/] [bold white]{:<60}[/][bold #3498db]│[/]",
            title
        ));
        self.console.print(
            "[bold #3498db]└─────────────────────────────────────────────────────────────────┘[/]",
        );
        self.console.print("");
    }

    /// Findings carry user-typed text, so they bypass markup and wrapping.
    fn print_findings(&self, findings: &[Finding]) {
        for finding in findings {
            let symbol = match finding.severity {
                Severity::Error => "✗",
                Severity::Warning => "⚠",
                Severity::Info => "ℹ",
            };
            println!("  {} {}", symbol, finding);
        }
    }

    /// Inline feedback after an edit: only speaks up when something is off.
    fn report_after_edit(&self, session: &Session) {
        let findings = validate_all(&session.keys);
        if !findings.is_empty() {
            self.console.print("");
            self.print_findings(&findings);
        }
    }

    fn new_session(&self, force: bool) -> Result<()> {
        if self.session_path.exists() && !force {
            bail!(
                "Session already exists at {} (pass --force to start over)",
                self.session_path.display()
            );
        }
        let mut session = Session::new();
        self.save(&mut session)?;
        self.console.print(&format!(
            "  [bold #2ecc71]✓[/] New session with [bold]{}[/] at [#95a5a6]{}[/]",
            session.selected_key,
            self.session_path.display()
        ));
        Ok(())
    }

    fn show(&self, key: Option<&str>) -> Result<()> {
        let session = self.load()?;

        let wanted;
        let keys: Vec<(&str, &KeyConfig)> = match key {
            Some(key) => {
                wanted = keyconfig::parse_key_id(key)?;
                let config = session
                    .keys
                    .get(&wanted)
                    .with_context(|| format!("{} is not configured yet", wanted))?;
                vec![(wanted.as_str(), config)]
            }
            None => session.keys.iter().collect(),
        };

        self.print_header("FOOTSWITCH CONFIGURATION");
        if keys.is_empty() {
            self.console.print("  [#95a5a6]No keys are configured.[/]");
        }

        for (id, config) in keys {
            let selected = if id == session.selected_key {
                " [bold #2ecc71](selected)[/]"
            } else {
                ""
            };
            self.console.print(&format!(
                "  [bold #f1c40f]{}[/]{}  [dim]keytimes[/] [bold]{}[/]  [dim]ledmode[/] [bold]{}[/]",
                id, selected, config.press_count, config.led_mode
            ));

            let mut table = Table::new()
                .box_style(&ROUNDED)
                .header_style(Style::parse("bold #f1c40f").unwrap_or_default())
                .border_style(Style::parse("#3498db").unwrap_or_default())
                .with_column(Column::new("Press"))
                .with_column(Column::new("LED 1"))
                .with_column(Column::new("LED 2"))
                .with_column(Column::new("LED 3"))
                .with_column(Column::new("Triggers"));

            for (idx, press) in config.presses.iter().enumerate() {
                let [c1, c2, c3] = &press.led_colors;
                let triggers: Vec<String> = press
                    .active_triggers()
                    .map(|(trigger, commands)| {
                        let described: Vec<String> =
                            commands.iter().map(|c| c.describe()).collect();
                        markup::escape(&format!("{}: {}", trigger, described.join(", ")))
                    })
                    .collect();
                let triggers = if triggers.is_empty() {
                    "[dim]none[/]".to_string()
                } else {
                    triggers.join("  ·  ")
                };
                table.add_row_cells([
                    markup::render_or_plain(&(idx + 1).to_string()),
                    markup::render_or_plain(&color_cell(c1)),
                    markup::render_or_plain(&color_cell(c2)),
                    markup::render_or_plain(&color_cell(c3)),
                    markup::render_or_plain(&triggers),
                ]);
            }

            self.console.print_renderable(&table);
            self.console.print("");
        }

        if let Some(saved_at) = &session.saved_at {
            self.console
                .print(&format!("  [dim]Last saved {}[/]", saved_at));
        }
        self.console.print("");
        Ok(())
    }

    fn select(&self, key: &str) -> Result<()> {
        let mut session = self.load()?;
        session.select_key(key)?;
        self.save(&mut session)?;
        self.console.print(&format!(
            "  [bold #2ecc71]✓[/] Editing [bold #f1c40f]{}[/]",
            session.selected_key
        ));
        Ok(())
    }

    fn keytimes(&self, key: Option<&str>, count: u32) -> Result<()> {
        let mut session = self.load()?;
        let key = target_key(&session, key);
        let applied = session.set_press_count(&key, count)?;
        self.save(&mut session)?;
        self.console.print(&format!(
            "  [bold #2ecc71]✓[/] [bold #f1c40f]{}[/] keytimes = [bold]{}[/]",
            key, applied
        ));
        if applied as u32 != count {
            self.console.print(&format!(
                "  [#f39c12]⚠[/] [#95a5a6]{} is outside 1-9, clamped to {}[/]",
                count, applied
            ));
        }
        self.report_after_edit(&session);
        Ok(())
    }

    fn ledmode(&self, key: Option<&str>, mode: LedMode) -> Result<()> {
        let mut session = self.load()?;
        let key = target_key(&session, key);
        session.set_led_mode(&key, mode)?;
        self.save(&mut session)?;
        self.console.print(&format!(
            "  [bold #2ecc71]✓[/] [bold #f1c40f]{}[/] ledmode = [bold]{}[/]",
            key, mode
        ));
        Ok(())
    }

    fn color(&self, key: Option<&str>, press: u64, segment: u64, value: &str) -> Result<()> {
        let mut session = self.load()?;
        let key = target_key(&session, key);
        let input = presets::color_preset(value)
            .map(|c| c.as_str().to_string())
            .unwrap_or_else(|| value.to_string());

        match session.set_led_color(&key, to_index(press), to_index(segment), &input)? {
            ColorEdit::Applied(color) => {
                self.save(&mut session)?;
                self.console.print(&format!(
                    "  [bold #2ecc71]✓[/] [bold #f1c40f]{}[/] press {} segment {} = {}",
                    key,
                    press,
                    segment,
                    color_cell(&color)
                ));
                self.report_after_edit(&session);
            }
            ColorEdit::Rejected { kept } => {
                self.console.print(&format!(
                    "  [#f39c12]⚠[/] [#95a5a6]Not a color (use 0x + 6 hex digits); segment keeps[/] {}",
                    color_cell(&kept)
                ));
            }
        }
        Ok(())
    }

    fn pattern(&self, key: Option<&str>, press: u64, pattern: Pattern) -> Result<()> {
        let mut session = self.load()?;
        let key = target_key(&session, key);
        if session.apply_pattern(&key, to_index(press), pattern)? {
            self.save(&mut session)?;
            self.console.print(&format!(
                "  [bold #2ecc71]✓[/] [bold #f1c40f]{}[/] press {} colors updated",
                key, press
            ));
        } else {
            self.console.print(
                "  [#f39c12]⚠[/] [#95a5a6]Segment 1 holds no valid color; nothing copied[/]",
            );
        }
        Ok(())
    }

    fn add_command(
        &self,
        key: Option<&str>,
        press: u64,
        timing: Trigger,
        preset: Option<&str>,
    ) -> Result<()> {
        let mut session = self.load()?;
        let key = target_key(&session, key);
        let press_idx = to_index(press);
        let added = match preset {
            Some(preset) => session.apply_preset(&key, press_idx, timing, preset)?,
            None => {
                session.add_command(&key, press_idx, timing)?;
                1
            }
        };
        self.save(&mut session)?;
        self.console.print(&format!(
            "  [bold #2ecc71]✓[/] Added {} command(s) to [bold #f1c40f]{}[/] press {} {}",
            added, key, press, timing
        ));
        self.report_after_edit(&session);
        Ok(())
    }

    fn set_command(
        &self,
        key: Option<&str>,
        press: u64,
        timing: Trigger,
        index: u64,
        edit: &CommandEdit<'_>,
    ) -> Result<()> {
        let mut session = self.load()?;
        let key = target_key(&session, key);
        let (press_idx, command_idx) = (to_index(press), to_index(index));
        let updated = match edit.kind {
            Some(kind) if !edit.has_fields() => {
                session.change_command_kind(&key, press_idx, timing, command_idx, kind)?
            }
            _ => session.edit_command(&key, press_idx, timing, command_idx, edit)?,
        };
        self.save(&mut session)?;
        self.console.print(&format!(
            "  [bold #2ecc71]✓[/] [bold #f1c40f]{}[/] press {} {} command {}: [bold]{}[/]",
            key,
            press,
            timing,
            index,
            markup::escape(&updated.describe())
        ));
        self.report_after_edit(&session);
        Ok(())
    }

    fn delete_command(&self, key: Option<&str>, press: u64, timing: Trigger, index: u64) -> Result<()> {
        let mut session = self.load()?;
        let key = target_key(&session, key);
        let removed = session.delete_command(&key, to_index(press), timing, to_index(index))?;
        self.save(&mut session)?;
        self.console.print(&format!(
            "  [bold #2ecc71]✓[/] Removed [bold]{}[/] from [bold #f1c40f]{}[/] press {} {}",
            markup::escape(&removed.describe()),
            key,
            press,
            timing
        ));
        Ok(())
    }

    fn validate(&self, strict: bool) -> Result<()> {
        let session = self.load()?;
        let findings = validate_all(&session.keys);
        let errors = validate::error_count(&findings);

        self.print_header("VALIDATION");
        if findings.is_empty() {
            self.console.print(&format!(
                "  [bold #2ecc71]✓[/] All {} key(s) look good",
                session.keys.len()
            ));
        } else {
            self.print_findings(&findings);
        }
        self.console.print("");

        if strict && errors > 0 {
            bail!("{} error(s) found", errors);
        }
        Ok(())
    }

    fn export(&self, out: &Path, to_stdout: bool) -> Result<()> {
        let session = self.load()?;
        let findings = validate_all(&session.keys);

        if to_stdout {
            for finding in &findings {
                log::warn!("{}", finding);
            }
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(export::render(&session.keys).as_bytes())
                .context("Failed to write configuration to stdout")?;
            stdout.flush()?;
            return Ok(());
        }

        let path = export::write_export(&session.keys, out)?;
        if !findings.is_empty() {
            self.console.print(
                "  [#f39c12]⚠[/] [#95a5a6]Exported anyway; the device may reject these values:[/]",
            );
            self.print_findings(&findings);
            self.console.print("");
        }
        println!("  ✓ Wrote {} ({} key(s))", path.display(), session.keys.len());
        self.console
            .print("  [#95a5a6]Copy the supersetup folder onto the footswitch to load it.[/]");
        Ok(())
    }

    fn presets(&self) {
        self.print_header("PRESETS");

        let mut colors = Table::new()
            .box_style(&ROUNDED)
            .header_style(Style::parse("bold #f1c40f").unwrap_or_default())
            .border_style(Style::parse("#3498db").unwrap_or_default())
            .with_column(Column::new("Color"))
            .with_column(Column::new("Value"));
        for (name, hex) in COLOR_PRESETS {
            let swatch = LedColor::parse(hex)
                .map(|c| color_cell(&c))
                .unwrap_or_else(|| hex.to_string());
            colors.add_row_cells([
                markup::render_or_plain(name),
                markup::render_or_plain(&swatch),
            ]);
        }
        self.console.print_renderable(&colors);
        self.console.print("");

        let mut commands = Table::new()
            .box_style(&ROUNDED)
            .header_style(Style::parse("bold #f1c40f").unwrap_or_default())
            .border_style(Style::parse("#3498db").unwrap_or_default())
            .with_column(Column::new("Preset"))
            .with_column(Column::new("Name"))
            .with_column(Column::new("Commands"));
        for (id, name) in COMMAND_PRESETS {
            let described: Vec<String> = presets::command_preset(id)
                .unwrap_or_default()
                .iter()
                .map(|c| c.describe())
                .collect();
            commands.add_row_cells([
                markup::render_or_plain(id),
                markup::render_or_plain(name),
                markup::render_or_plain(&described.join(", ")),
            ]);
        }
        self.console.print_renderable(&commands);
        self.console.print("");

        self.console
            .print("  [bold #f39c12]Quick patterns:[/] [bold]same[/] [#95a5a6](copy segment 1 to 2 and 3)[/], [bold]default[/] [#95a5a6](dim white, dim white, red)[/]");
        self.console.print("");
    }
}

/// Colored dot followed by the color text. Malformed colors print as-is.
fn color_cell(color: &LedColor) -> String {
    match color.as_str().strip_prefix("0x") {
        Some(digits) if color.is_valid() => format!("[#{}]●[/] {}", digits, color),
        _ => format!("[#e74c3c]{}[/]", markup::escape(color.as_str())),
    }
}

fn target_key(session: &Session, key: Option<&str>) -> String {
    key.map(str::to_string)
        .unwrap_or_else(|| session.selected_key.clone())
}

/// One-based CLI numbers to zero-based indexes; clap guarantees `n >= 1`.
fn to_index(n: u64) -> usize {
    n.saturating_sub(1) as usize
}

fn init_logging(verbose: u8) -> Result<()> {
    use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let config = ConfigBuilder::new().set_time_level(LevelFilter::Off).build();
    TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto)
        .context("Failed to initialize logging")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let session_path = cli.session.clone().unwrap_or_else(Session::default_path);
    log::debug!("session file: {}", session_path.display());
    let app = Supersetup::new(session_path);

    match cli.command {
        Commands::New { force } => {
            app.new_session(force)?;
        }
        Commands::Show { key } => {
            app.show(key.as_deref())?;
        }
        Commands::Select { key } => {
            app.select(&key)?;
        }
        Commands::Keytimes { count, key } => {
            app.keytimes(key.as_deref(), count)?;
        }
        Commands::Ledmode { mode, key } => {
            app.ledmode(key.as_deref(), mode)?;
        }
        Commands::Color {
            press,
            segment,
            value,
            key,
        } => {
            app.color(key.as_deref(), press, segment, &value)?;
        }
        Commands::Pattern {
            press,
            pattern,
            key,
        } => {
            app.pattern(key.as_deref(), press, pattern)?;
        }
        Commands::AddCommand {
            press,
            timing,
            preset,
            key,
        } => {
            app.add_command(key.as_deref(), press, timing, preset.as_deref())?;
        }
        Commands::SetCommand {
            press,
            timing,
            index,
            kind,
            channel,
            value,
            param,
            key,
        } => {
            let edit = CommandEdit {
                kind,
                channel: channel.as_deref(),
                value: value.as_deref(),
                param: param.as_deref(),
            };
            app.set_command(key.as_deref(), press, timing, index, &edit)?;
        }
        Commands::DeleteCommand {
            press,
            timing,
            index,
            key,
        } => {
            app.delete_command(key.as_deref(), press, timing, index)?;
        }
        Commands::Validate { strict } => {
            app.validate(strict)?;
        }
        Commands::Export { out, stdout } => {
            app.export(&out, stdout)?;
        }
        Commands::Presets => {
            app.presets();
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "supersetup",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
