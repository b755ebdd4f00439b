//! Per-key configuration: LED colors, LED mode, press repetitions and the
//! command lists fired at each trigger timing.

use crate::command::Command;
use anyhow::{bail, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const MIN_PRESS_COUNT: u8 = 1;
pub const MAX_PRESS_COUNT: u8 = 9;
pub const LED_SEGMENTS: usize = 3;
pub const KEY_COUNT: u8 = 10;
pub const DEFAULT_KEY: &str = "key0";
pub const DEFAULT_LED_COLOR: &str = "0x666666";

/// Text of a 24-bit RGB color, canonically `0x` followed by six hex digits.
///
/// Case is kept exactly as typed. A value loaded from disk may be malformed;
/// [`LedColor::is_valid`] tells, and the validator reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedColor(String);

impl LedColor {
    /// Accepts only canonical text.
    pub fn parse(text: &str) -> Option<Self> {
        is_canonical_color(text).then(|| LedColor(text.to_string()))
    }

    /// Normalizes raw editor input. Without a `0x` prefix, non-hex characters
    /// are dropped and the prefix is added. The result must be canonical or
    /// the edit is refused.
    pub fn from_input(input: &str) -> Option<Self> {
        let input = input.trim();
        let normalized = if input.starts_with("0x") {
            input.to_string()
        } else {
            let digits: String = input.chars().filter(char::is_ascii_hexdigit).collect();
            format!("0x{}", digits)
        };
        Self::parse(&normalized)
    }

    pub fn is_valid(&self) -> bool {
        is_canonical_color(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LedColor {
    fn default() -> Self {
        LedColor(DEFAULT_LED_COLOR.to_string())
    }
}

impl fmt::Display for LedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_canonical_color(text: &str) -> bool {
    match text.strip_prefix("0x") {
        Some(digits) => digits.len() == 6 && hex::decode(digits).is_ok(),
        None => false,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LedMode {
    #[default]
    Normal,
    Select,
    Tap,
}

impl LedMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LedMode::Normal => "normal",
            LedMode::Select => "select",
            LedMode::Tap => "tap",
        }
    }
}

impl fmt::Display for LedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moment in a press lifecycle at which a command list fires. Declaration
/// order is the order used by the validator and the exported file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
pub enum Trigger {
    #[serde(rename = "short_dw")]
    #[value(name = "short_dw", alias = "short-down")]
    ShortDown,
    #[serde(rename = "short_up")]
    #[value(name = "short_up", alias = "short-up")]
    ShortUp,
    #[serde(rename = "long")]
    #[value(name = "long")]
    Long,
    #[serde(rename = "long_up")]
    #[value(name = "long_up", alias = "long-up")]
    LongUp,
}

impl Trigger {
    pub const ALL: [Trigger; 4] = [
        Trigger::ShortDown,
        Trigger::ShortUp,
        Trigger::Long,
        Trigger::LongUp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Trigger::ShortDown => "short_dw",
            Trigger::ShortUp => "short_up",
            Trigger::Long => "long",
            Trigger::LongUp => "long_up",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One repetition of a key action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Press {
    #[serde(rename = "ledcolor")]
    pub led_colors: [LedColor; LED_SEGMENTS],
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    triggers: BTreeMap<Trigger, Vec<Command>>,
}

impl Default for Press {
    fn default() -> Self {
        Self::with_colors(Default::default())
    }
}

impl Press {
    pub fn with_colors(led_colors: [LedColor; LED_SEGMENTS]) -> Self {
        Self {
            led_colors,
            triggers: BTreeMap::new(),
        }
    }

    /// Commands for a timing; an absent timing reads as empty.
    pub fn commands(&self, trigger: Trigger) -> &[Command] {
        self.triggers.get(&trigger).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Timings holding at least one command, in fixed order.
    pub fn active_triggers(&self) -> impl Iterator<Item = (Trigger, &[Command])> + '_ {
        Trigger::ALL
            .into_iter()
            .map(move |t| (t, self.commands(t)))
            .filter(|(_, cmds)| !cmds.is_empty())
    }

    pub fn push_command(&mut self, trigger: Trigger, command: Command) {
        self.triggers.entry(trigger).or_default().push(command);
    }

    pub fn command_mut(&mut self, trigger: Trigger, index: usize) -> Option<&mut Command> {
        self.triggers.get_mut(&trigger)?.get_mut(index)
    }

    /// Removes one command. A timing left with no commands is dropped.
    pub fn remove_command(&mut self, trigger: Trigger, index: usize) -> Option<Command> {
        let cmds = self.triggers.get_mut(&trigger)?;
        if index >= cmds.len() {
            return None;
        }
        let removed = cmds.remove(index);
        if cmds.is_empty() {
            self.triggers.remove(&trigger);
        }
        Some(removed)
    }
}

/// Full configuration of one physical key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(rename = "keytimes")]
    pub press_count: u8,
    #[serde(rename = "ledmode", default)]
    pub led_mode: LedMode,
    pub presses: Vec<Press>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            press_count: MIN_PRESS_COUNT,
            led_mode: LedMode::Normal,
            presses: vec![Press::default()],
        }
    }
}

impl KeyConfig {
    /// Clamps `count` to 1..=9 and resizes `presses` to match, keeping
    /// existing presses and padding with defaults. Returns the applied count.
    pub fn set_press_count(&mut self, count: u32) -> u8 {
        let count = count.clamp(MIN_PRESS_COUNT as u32, MAX_PRESS_COUNT as u32) as u8;
        self.presses.resize_with(count as usize, Press::default);
        self.press_count = count;
        count
    }
}

/// Key identifiers offered by the device: `key0` through `key9`.
pub fn parse_key_id(text: &str) -> Result<String> {
    let text = text.trim();
    let valid = text
        .strip_prefix("key")
        .and_then(|n| n.parse::<u8>().ok().filter(|_| n.len() == 1))
        .is_some_and(|n| n < KEY_COUNT);
    if !valid {
        bail!(
            "Unknown key '{}' (expected key0 through key{})",
            text,
            KEY_COUNT - 1
        );
    }
    Ok(text.to_string())
}

/// Every configured key, iterated in identifier order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSet(BTreeMap<String, KeyConfig>);

impl ConfigSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_key() -> Self {
        let mut set = Self::new();
        set.insert(DEFAULT_KEY, KeyConfig::default());
        set
    }

    pub fn insert(&mut self, key: &str, config: KeyConfig) {
        self.0.insert(key.to_string(), config);
    }

    pub fn get(&self, key: &str) -> Option<&KeyConfig> {
        self.0.get(key)
    }

    /// Entry for `key`, created with defaults on first reference.
    pub fn entry(&mut self, key: &str) -> &mut KeyConfig {
        self.0.entry(key.to_string()).or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyConfig)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;

    fn color(s: &str) -> LedColor {
        LedColor::parse(s).unwrap()
    }

    #[test]
    fn canonical_color_rules() {
        assert!(is_canonical_color("0x000000"));
        assert!(is_canonical_color("0xFFaa00"));
        assert!(!is_canonical_color("0xfffff"));
        assert!(!is_canonical_color("0xfffffff"));
        assert!(!is_canonical_color("ffffff"));
        assert!(!is_canonical_color("0xgggggg"));
        assert!(!is_canonical_color("0Xffffff"));
    }

    #[test]
    fn color_input_normalization() {
        assert_eq!(LedColor::from_input("ff0000").unwrap().as_str(), "0xff0000");
        assert_eq!(LedColor::from_input("#00FF00").unwrap().as_str(), "0x00FF00");
        assert_eq!(LedColor::from_input("0xAbCdEf").unwrap().as_str(), "0xAbCdEf");
        assert!(LedColor::from_input("0xff00").is_none());
        assert!(LedColor::from_input("0xff00000").is_none());
        assert!(LedColor::from_input("red").is_none());
    }

    #[test]
    fn default_press_is_gray_without_triggers() {
        let press = Press::default();
        assert!(press.led_colors.iter().all(|c| c.as_str() == "0x666666"));
        assert_eq!(press.active_triggers().count(), 0);
    }

    #[test]
    fn press_count_grow_preserves_and_pads() {
        let mut key = KeyConfig::default();
        key.presses[0].led_colors[2] = color("0xff0000");
        assert_eq!(key.set_press_count(4), 4);
        assert_eq!(key.presses.len(), 4);
        assert_eq!(key.presses[0].led_colors[2].as_str(), "0xff0000");
        assert!(key.presses[1..].iter().all(|p| *p == Press::default()));
    }

    #[test]
    fn press_count_shrink_keeps_prefix() {
        let mut key = KeyConfig::default();
        key.set_press_count(5);
        for (i, press) in key.presses.iter_mut().enumerate() {
            press.led_colors[0] = color(&format!("0x00000{}", i));
        }
        let before = key.presses.clone();
        assert_eq!(key.set_press_count(2), 2);
        assert_eq!(key.presses, before[..2]);
        assert_eq!(key.press_count, 2);
    }

    #[test]
    fn press_count_is_clamped() {
        let mut key = KeyConfig::default();
        assert_eq!(key.set_press_count(0), 1);
        assert_eq!(key.presses.len(), 1);
        assert_eq!(key.set_press_count(42), 9);
        assert_eq!(key.presses.len(), 9);
    }

    #[test]
    fn removing_last_command_drops_timing() {
        let mut press = Press::default();
        press.push_command(Trigger::Long, Command::default());
        press.push_command(Trigger::Long, Command::for_kind(CommandKind::Hid));
        assert_eq!(press.commands(Trigger::Long).len(), 2);

        assert!(press.remove_command(Trigger::Long, 5).is_none());
        press.remove_command(Trigger::Long, 0).unwrap();
        assert_eq!(press.commands(Trigger::Long)[0].kind(), CommandKind::Hid);
        press.remove_command(Trigger::Long, 0).unwrap();
        assert!(press.commands(Trigger::Long).is_empty());
        assert_eq!(press.active_triggers().count(), 0);
    }

    #[test]
    fn active_triggers_follow_fixed_order() {
        let mut press = Press::default();
        press.push_command(Trigger::LongUp, Command::default());
        press.push_command(Trigger::ShortDown, Command::default());
        press.push_command(Trigger::Long, Command::default());
        let order: Vec<_> = press.active_triggers().map(|(t, _)| t.name()).collect();
        assert_eq!(order, ["short_dw", "long", "long_up"]);
    }

    #[test]
    fn key_ids() {
        assert_eq!(parse_key_id("key0").unwrap(), "key0");
        assert_eq!(parse_key_id(" key9 ").unwrap(), "key9");
        assert!(parse_key_id("key10").is_err());
        assert!(parse_key_id("key").is_err());
        assert!(parse_key_id("pedal1").is_err());
        assert!(parse_key_id("key+1").is_err());
    }

    #[test]
    fn config_set_entry_creates_default_once() {
        let mut set = ConfigSet::new();
        assert!(set.is_empty());
        set.entry("key3").led_mode = LedMode::Tap;
        assert_eq!(set.entry("key3").led_mode, LedMode::Tap);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn serde_uses_device_field_names() {
        let json = serde_json::to_value(ConfigSet::with_default_key()).unwrap();
        assert_eq!(json["key0"]["keytimes"], 1);
        assert_eq!(json["key0"]["ledmode"], "normal");
        assert_eq!(json["key0"]["presses"][0]["ledcolor"][1], "0x666666");
        assert!(json["key0"]["presses"][0].get("triggers").is_none());
    }
}
