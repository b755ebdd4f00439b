//! The editing session: the configuration set being built, the key the
//! user is working on, and every form mutation applied to them.
//!
//! Press, segment and command indexes are zero-based here; the console layer
//! converts from the one-based numbers users type.

use crate::command::{Command, CommandKind};
use crate::keyconfig::{
    parse_key_id, ConfigSet, KeyConfig, LedColor, LedMode, Press, Trigger, DEFAULT_KEY,
    LED_SEGMENTS, MIN_PRESS_COUNT,
};
use crate::presets::{command_preset, Pattern, COMMAND_PRESETS};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SESSION_FILE: &str = "session.json";
const FALLBACK_SESSION_FILE: &str = "supersetup-session.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub selected_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
    pub keys: ConfigSet,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            selected_key: DEFAULT_KEY.to_string(),
            saved_at: None,
            keys: ConfigSet::with_default_key(),
        }
    }
}

/// Fields typed into the command editor; `None` leaves a field as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandEdit<'a> {
    pub kind: Option<CommandKind>,
    pub channel: Option<&'a str>,
    pub value: Option<&'a str>,
    pub param: Option<&'a str>,
}

impl CommandEdit<'_> {
    /// True when any text field was typed, as opposed to a bare kind switch.
    pub fn has_fields(&self) -> bool {
        self.channel.is_some() || self.value.is_some() || self.param.is_some()
    }
}

/// Outcome of a color edit. Malformed input never raises an error; the prior
/// value simply stays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorEdit {
    Applied(LedColor),
    Rejected { kept: LedColor },
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<data dir>/supersetup/session.json`, or a file in the working
    /// directory when the platform has no data dir.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join("supersetup").join(SESSION_FILE))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_SESSION_FILE))
    }

    /// A missing file yields a fresh session.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no session at {}, starting fresh", path.display());
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        let session: Session = serde_json::from_str(&text)
            .with_context(|| format!("Session file {} is corrupt", path.display()))?;
        log::debug!(
            "loaded session from {} ({} key(s))",
            path.display(),
            session.keys.len()
        );
        Ok(session)
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        self.saved_at = Some(chrono::Local::now().to_rfc3339());
        let json = serde_json::to_string_pretty(self).context("Failed to encode session")?;
        fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write session file {}", path.display()))?;
        log::debug!("saved session to {}", path.display());
        Ok(())
    }

    /// Creates the key with defaults on first reference and selects it.
    pub fn select_key(&mut self, key: &str) -> Result<()> {
        let key = parse_key_id(key)?;
        self.keys.entry(&key);
        self.selected_key = key;
        Ok(())
    }

    pub fn key_mut(&mut self, key: &str) -> Result<&mut KeyConfig> {
        let key = parse_key_id(key)?;
        if !self.keys.contains(&key) {
            log::info!("adding {} with default settings", key);
        }
        Ok(self.keys.entry(&key))
    }

    pub fn set_press_count(&mut self, key: &str, count: u32) -> Result<u8> {
        let applied = self.key_mut(key)?.set_press_count(count);
        if applied as u32 != count {
            log::warn!("press count {} clamped to {}", count, applied);
        }
        Ok(applied)
    }

    pub fn set_led_mode(&mut self, key: &str, mode: LedMode) -> Result<()> {
        self.key_mut(key)?.led_mode = mode;
        Ok(())
    }

    pub fn set_led_color(
        &mut self,
        key: &str,
        press: usize,
        segment: usize,
        input: &str,
    ) -> Result<ColorEdit> {
        if segment >= LED_SEGMENTS {
            bail!(
                "Segment {} does not exist (LEDs have {} segments)",
                segment + 1,
                LED_SEGMENTS
            );
        }
        let slot = &mut self.press_mut(key, press)?.led_colors[segment];
        match LedColor::from_input(input) {
            Some(color) => {
                *slot = color.clone();
                Ok(ColorEdit::Applied(color))
            }
            None => {
                log::info!("rejected color input '{}', keeping {}", input, slot);
                Ok(ColorEdit::Rejected { kept: slot.clone() })
            }
        }
    }

    /// Returns false when the pattern could not be applied.
    pub fn apply_pattern(&mut self, key: &str, press: usize, pattern: Pattern) -> Result<bool> {
        Ok(pattern.apply(self.press_mut(key, press)?))
    }

    /// Appends the default command and returns its index.
    pub fn add_command(&mut self, key: &str, press: usize, trigger: Trigger) -> Result<usize> {
        let press = self.press_mut(key, press)?;
        press.push_command(trigger, Command::default());
        Ok(press.commands(trigger).len() - 1)
    }

    /// Appends every command of a preset; returns how many were added.
    pub fn apply_preset(
        &mut self,
        key: &str,
        press: usize,
        trigger: Trigger,
        preset: &str,
    ) -> Result<usize> {
        let commands = command_preset(preset).ok_or_else(|| {
            let known: Vec<&str> = COMMAND_PRESETS.iter().map(|(id, _)| *id).collect();
            anyhow!(
                "Unknown command preset: {} (expected one of: {})",
                preset,
                known.join(", ")
            )
        })?;
        let count = commands.len();
        let press = self.press_mut(key, press)?;
        for command in commands {
            press.push_command(trigger, command);
        }
        Ok(count)
    }

    pub fn update_command(
        &mut self,
        key: &str,
        press: usize,
        trigger: Trigger,
        index: usize,
        command: Command,
    ) -> Result<()> {
        *self.command_mut(key, press, trigger, index)? = command;
        Ok(())
    }

    /// Switches a command to another kind, resetting its fields. Keeping the
    /// same kind leaves it untouched.
    pub fn change_command_kind(
        &mut self,
        key: &str,
        press: usize,
        trigger: Trigger,
        index: usize,
        kind: CommandKind,
    ) -> Result<Command> {
        let command = self.command_mut(key, press, trigger, index)?;
        if command.kind() != kind {
            *command = Command::for_kind(kind);
        }
        Ok(command.clone())
    }

    /// Applies a form edit to one command: an optional kind switch (which
    /// resets the fields) followed by whichever text fields were given.
    /// Nothing is written unless the whole edit succeeds.
    pub fn edit_command(
        &mut self,
        key: &str,
        press: usize,
        trigger: Trigger,
        index: usize,
        edit: &CommandEdit<'_>,
    ) -> Result<Command> {
        let current = self.command_mut(key, press, trigger, index)?.clone();
        let base = match edit.kind {
            Some(kind) if kind != current.kind() => Command::for_kind(kind),
            _ => current,
        };
        let updated = base.with_fields(edit.channel, edit.value, edit.param)?;
        self.update_command(key, press, trigger, index, updated.clone())?;
        Ok(updated)
    }

    pub fn delete_command(
        &mut self,
        key: &str,
        press: usize,
        trigger: Trigger,
        index: usize,
    ) -> Result<Command> {
        self.check_command(key, press, trigger, index)?;
        let press_ref = self.press_mut(key, press)?;
        let available = press_ref.commands(trigger).len();
        press_ref
            .remove_command(trigger, index)
            .ok_or_else(|| missing_command(press, trigger, index, available))
    }

    /// Bounds-checks a press without adding its key to the set. A key that
    /// does not exist yet is checked against the defaults it would get.
    fn existing_press(&self, key: &str, press: usize) -> Result<Option<&Press>> {
        let id = parse_key_id(key)?;
        let config = self.keys.get(&id);
        let count = config.map_or(MIN_PRESS_COUNT as usize, |c| c.presses.len());
        if press >= count {
            return Err(missing_press(&id, press, count));
        }
        Ok(config.and_then(|c| c.presses.get(press)))
    }

    fn check_command(&self, key: &str, press: usize, trigger: Trigger, index: usize) -> Result<()> {
        let available = self
            .existing_press(key, press)?
            .map_or(0, |p| p.commands(trigger).len());
        if index >= available {
            return Err(missing_command(press, trigger, index, available));
        }
        Ok(())
    }

    fn press_mut(&mut self, key: &str, press: usize) -> Result<&mut Press> {
        self.existing_press(key, press)?;
        let config = self.key_mut(key)?;
        let count = config.presses.len();
        config
            .presses
            .get_mut(press)
            .ok_or_else(|| missing_press(key.trim(), press, count))
    }

    fn command_mut(
        &mut self,
        key: &str,
        press: usize,
        trigger: Trigger,
        index: usize,
    ) -> Result<&mut Command> {
        self.check_command(key, press, trigger, index)?;
        let press_ref = self.press_mut(key, press)?;
        let available = press_ref.commands(trigger).len();
        press_ref
            .command_mut(trigger, index)
            .ok_or_else(|| missing_command(press, trigger, index, available))
    }
}

fn missing_press(key: &str, press: usize, count: usize) -> anyhow::Error {
    anyhow!(
        "Press {} does not exist ({} has {} press(es); raise keytimes first)",
        press + 1,
        key,
        count
    )
}

fn missing_command(press: usize, trigger: Trigger, index: usize, available: usize) -> anyhow::Error {
    anyhow!(
        "Command {} does not exist (press {} {} has {} command(s))",
        index + 1,
        press + 1,
        trigger,
        available
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::HidAction;

    #[test]
    fn new_session_has_one_default_key() {
        let session = Session::new();
        assert_eq!(session.selected_key, "key0");
        assert_eq!(session.keys.len(), 1);
        assert_eq!(session.keys.get("key0"), Some(&KeyConfig::default()));
    }

    #[test]
    fn select_key_creates_on_first_reference() {
        let mut session = Session::new();
        session.select_key("key5").unwrap();
        assert_eq!(session.selected_key, "key5");
        assert!(session.keys.contains("key5"));
        assert!(session.select_key("key11").is_err());
        assert_eq!(session.selected_key, "key5");
    }

    #[test]
    fn color_edit_gate() {
        let mut session = Session::new();
        let applied = session.set_led_color("key0", 0, 2, "ff0000").unwrap();
        assert_eq!(applied, ColorEdit::Applied(LedColor::parse("0xff0000").unwrap()));

        let rejected = session.set_led_color("key0", 0, 2, "0xff").unwrap();
        assert_eq!(
            rejected,
            ColorEdit::Rejected {
                kept: LedColor::parse("0xff0000").unwrap()
            }
        );
        let key = session.keys.get("key0").unwrap();
        assert_eq!(key.presses[0].led_colors[2].as_str(), "0xff0000");
    }

    #[test]
    fn color_edit_bounds() {
        let mut session = Session::new();
        assert!(session.set_led_color("key0", 0, 3, "0x000000").is_err());
        let err = session.set_led_color("key0", 1, 0, "0x000000").unwrap_err();
        assert!(err.to_string().contains("Press 2 does not exist"));
    }

    #[test]
    fn command_lifecycle() {
        let mut session = Session::new();
        assert_eq!(session.add_command("key0", 0, Trigger::Long).unwrap(), 0);
        assert_eq!(
            session
                .apply_preset("key0", 0, Trigger::Long, "note-on-off")
                .unwrap(),
            2
        );

        let kind = session
            .change_command_kind("key0", 0, Trigger::Long, 0, CommandKind::Hid)
            .unwrap()
            .kind();
        assert_eq!(kind, CommandKind::Hid);

        let delay = Command::Hid {
            action: HidAction::Delay,
            param: "200".to_string(),
        };
        session
            .update_command("key0", 0, Trigger::Long, 1, delay.clone())
            .unwrap();

        let press = &session.keys.get("key0").unwrap().presses[0];
        let encoded: Vec<String> = press.commands(Trigger::Long).iter().map(Command::encode).collect();
        assert_eq!(
            encoded,
            ["[send][HID][-][A]", "[delay][HID][-][200]", "[1][NT][60][0]"]
        );

        assert_eq!(
            session.delete_command("key0", 0, Trigger::Long, 1).unwrap(),
            delay
        );
        let err = session
            .delete_command("key0", 0, Trigger::Long, 7)
            .unwrap_err();
        assert!(err.to_string().contains("has 2 command(s)"));
    }

    #[test]
    fn edit_command_switches_kind_then_applies_fields() {
        let mut session = Session::new();
        session.add_command("key0", 0, Trigger::ShortDown).unwrap();

        let edit = CommandEdit {
            kind: Some(CommandKind::ControlChange),
            channel: Some("2"),
            param: Some("127"),
            ..Default::default()
        };
        let updated = session
            .edit_command("key0", 0, Trigger::ShortDown, 0, &edit)
            .unwrap();
        assert_eq!(updated.encode(), "[2][CC][1][127]");

        let value_only = CommandEdit {
            value: Some("64"),
            ..Default::default()
        };
        let updated = session
            .edit_command("key0", 0, Trigger::ShortDown, 0, &value_only)
            .unwrap();
        assert_eq!(updated.encode(), "[2][CC][64][127]");

        let bad = CommandEdit {
            kind: Some(CommandKind::Hid),
            channel: Some("1"),
            ..Default::default()
        };
        let before = session.clone();
        assert!(session
            .edit_command("key0", 0, Trigger::ShortDown, 0, &bad)
            .is_err());
        assert_eq!(session, before);
    }

    #[test]
    fn rejected_kind_switch_keeps_the_command() {
        let mut session = Session::new();
        session.add_command("key0", 0, Trigger::ShortDown).unwrap();
        let before = session.clone();

        let edit = CommandEdit {
            kind: Some(CommandKind::Hid),
            channel: Some("1"),
            ..Default::default()
        };
        let err = session
            .edit_command("key0", 0, Trigger::ShortDown, 0, &edit)
            .unwrap_err();
        assert!(err.to_string().contains("no MIDI channel"));
        assert_eq!(session, before);
        let press = &session.keys.get("key0").unwrap().presses[0];
        assert_eq!(press.commands(Trigger::ShortDown)[0].encode(), "[1][PC][0][-]");
    }

    #[test]
    fn failed_edits_do_not_create_keys() {
        let mut session = Session::new();
        let before = session.clone();

        let err = session.set_led_color("key4", 3, 0, "0xff0000").unwrap_err();
        assert!(err.to_string().contains("Press 4 does not exist (key4 has 1 press(es)"));
        assert!(session.apply_pattern("key4", 2, Pattern::Same).is_err());
        assert!(session.add_command("key5", 1, Trigger::Long).is_err());
        assert!(session.delete_command("key6", 0, Trigger::Long, 0).is_err());
        assert!(session
            .edit_command("key7", 0, Trigger::Long, 0, &CommandEdit::default())
            .is_err());

        assert_eq!(session, before);
        assert_eq!(session.keys.len(), 1);
    }

    #[test]
    fn first_press_of_a_new_key_is_editable() {
        let mut session = Session::new();
        session.add_command("key3", 0, Trigger::ShortUp).unwrap();
        assert!(session.keys.contains("key3"));
    }

    #[test]
    fn unknown_preset_lists_choices() {
        let mut session = Session::new();
        let err = session
            .apply_preset("key0", 0, Trigger::ShortDown, "laser")
            .unwrap_err();
        assert!(err.to_string().contains("toggle-cc"));
        assert!(session.keys.get("key0").unwrap().presses[0]
            .commands(Trigger::ShortDown)
            .is_empty());
    }

    #[test]
    fn press_count_on_new_key() {
        let mut session = Session::new();
        assert_eq!(session.set_press_count("key2", 12).unwrap(), 9);
        assert_eq!(session.keys.get("key2").unwrap().presses.len(), 9);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut session = Session::new();
        session.set_led_mode("key0", LedMode::Select).unwrap();
        session.add_command("key0", 0, Trigger::ShortUp).unwrap();
        session.save(&path).unwrap();
        assert!(session.saved_at.is_some());

        let loaded = Session::load(&path).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn load_missing_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Session::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Session::new());
    }

    #[test]
    fn load_corrupt_file_fails_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();
        let err = Session::load(&path).unwrap_err();
        assert!(err.to_string().contains("corrupt"));
    }
}
