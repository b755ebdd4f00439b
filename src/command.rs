//! Device actions: MIDI Program Change / Control Change / Note and HID
//! keyboard/mouse emulation, plus their bracketed wire encoding.

use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_CHANNEL: i64 = 1;
pub const MAX_CHANNEL: i64 = 16;
pub const MIN_DATA: i64 = 0;
pub const MAX_DATA: i64 = 127;

/// Token used in the param slot of a Program Change that carries no parameter.
pub const NO_PARAM: &str = "-";

// Tokens understood by the footswitch firmware for HID emulation.
pub mod hid_tokens {
    pub const KEYS: &[&str] = &[
        "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R",
        "S", "T", "U", "V", "W", "X", "Y", "Z", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
        "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12", "Mouse_L",
        "Mouse_R", "Space", "Esc", "Caps", "Right", "Left", "Up", "Down", "End", "Del", "PageUp",
        "PageDown", "Enter", "Pause", "Table", "BackSpace", "Home", "Ins", "PrintS",
    ];

    pub const MODIFIERS: &[&str] = &["Ctrl", "Shift", "Alt", "Option", "Windows"];

    pub const DELAY_STEP_MS: u16 = 50;
    pub const MAX_DELAY_MS: u16 = 950;

    pub fn is_key_or_modifier(token: &str) -> bool {
        KEYS.contains(&token) || MODIFIERS.contains(&token)
    }

    /// Delays are offered in 50 ms steps from 0 to 950 ms.
    pub fn parse_delay(token: &str) -> Option<u16> {
        let ms: u16 = token.parse().ok()?;
        (ms <= MAX_DELAY_MS && ms % DELAY_STEP_MS == 0).then_some(ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum CommandKind {
    #[value(name = "pc", alias = "program-change")]
    ProgramChange,
    #[value(name = "cc", alias = "control-change")]
    ControlChange,
    #[value(name = "nt", alias = "note")]
    Note,
    #[value(name = "hid")]
    Hid,
}

impl CommandKind {
    /// Type-slot token in the encoded command.
    pub fn code(self) -> &'static str {
        match self {
            CommandKind::ProgramChange => "PC",
            CommandKind::ControlChange => "CC",
            CommandKind::Note => "NT",
            CommandKind::Hid => "HID",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Value slot of a Program Change: a program number or a relative/special step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PcValue {
    Program(i64),
    Inc(u8),
    Dec(u8),
    Random,
    Auto,
}

impl PcValue {
    pub const SPECIAL: [&'static str; 12] = [
        "inc1", "inc2", "inc3", "inc4", "inc5", "dec1", "dec2", "dec3", "dec4", "dec5", "random",
        "auto",
    ];
}

impl fmt::Display for PcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PcValue::Program(n) => write!(f, "{}", n),
            PcValue::Inc(n) => write!(f, "inc{}", n),
            PcValue::Dec(n) => write!(f, "dec{}", n),
            PcValue::Random => f.write_str("random"),
            PcValue::Auto => f.write_str("auto"),
        }
    }
}

impl FromStr for PcValue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let step = |rest: &str| rest.parse::<u8>().ok().filter(|n| (1..=5).contains(n));
        if let Some(n) = s.strip_prefix("inc").and_then(step) {
            return Ok(PcValue::Inc(n));
        }
        if let Some(n) = s.strip_prefix("dec").and_then(step) {
            return Ok(PcValue::Dec(n));
        }
        match s {
            "random" => Ok(PcValue::Random),
            "auto" => Ok(PcValue::Auto),
            _ => s.parse::<i64>().map(PcValue::Program).map_err(|_| {
                anyhow!(
                    "Invalid program change value '{}' (expected 0-127 or one of: {})",
                    s,
                    PcValue::SPECIAL.join(", ")
                )
            }),
        }
    }
}

impl TryFrom<String> for PcValue {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<PcValue> for String {
    fn from(value: PcValue) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HidAction {
    // quick press and release
    Send,
    Press,
    Release,
    Delay,
}

impl HidAction {
    pub fn as_str(self) -> &'static str {
        match self {
            HidAction::Send => "send",
            HidAction::Press => "press",
            HidAction::Release => "release",
            HidAction::Delay => "delay",
        }
    }
}

impl fmt::Display for HidAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HidAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "send" => Ok(HidAction::Send),
            "press" => Ok(HidAction::Press),
            "release" => Ok(HidAction::Release),
            "delay" => Ok(HidAction::Delay),
            other => Err(anyhow!(
                "Unknown HID action: {} (expected send, press, release or delay)",
                other
            )),
        }
    }
}

/// One device action. MIDI variants carry a channel; HID never does.
///
/// Numeric fields hold any integer; out-of-range input is kept until
/// [`crate::validate`] reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    ProgramChange {
        channel: i64,
        value: PcValue,
        param: String,
    },
    ControlChange {
        channel: i64,
        value: i64,
        param: i64,
    },
    Note {
        channel: i64,
        value: i64,
        param: i64,
    },
    Hid {
        action: HidAction,
        param: String,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::ProgramChange {
            channel: 1,
            value: PcValue::Program(0),
            param: NO_PARAM.to_string(),
        }
    }
}

impl Command {
    /// Fresh command of the given kind, as produced when the type selector changes.
    pub fn for_kind(kind: CommandKind) -> Self {
        match kind {
            CommandKind::ProgramChange => Command::ProgramChange {
                channel: 1,
                value: PcValue::Program(1),
                param: "0".to_string(),
            },
            CommandKind::ControlChange => Command::ControlChange {
                channel: 1,
                value: 1,
                param: 0,
            },
            CommandKind::Note => Command::Note {
                channel: 1,
                value: 1,
                param: 0,
            },
            CommandKind::Hid => Command::Hid {
                action: HidAction::Send,
                param: hid_tokens::KEYS[0].to_string(),
            },
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::ProgramChange { .. } => CommandKind::ProgramChange,
            Command::ControlChange { .. } => CommandKind::ControlChange,
            Command::Note { .. } => CommandKind::Note,
            Command::Hid { .. } => CommandKind::Hid,
        }
    }

    pub fn channel(&self) -> Option<i64> {
        match self {
            Command::ProgramChange { channel, .. }
            | Command::ControlChange { channel, .. }
            | Command::Note { channel, .. } => Some(*channel),
            Command::Hid { .. } => None,
        }
    }

    /// Canonical encoding: `[channel][PC|CC|NT][value][param]`, or
    /// `[action][HID][-][param]` for HID. The `-` channel slot is what the
    /// firmware loader expects; keep it.
    pub fn encode(&self) -> String {
        match self {
            Command::Hid { action, param } => format!("[{}][HID][-][{}]", action, param),
            Command::ProgramChange {
                channel,
                value,
                param,
            } => format!("[{}][PC][{}][{}]", channel, value, param),
            Command::ControlChange {
                channel,
                value,
                param,
            }
            | Command::Note {
                channel,
                value,
                param,
            } => format!("[{}][{}][{}][{}]", channel, self.kind(), value, param),
        }
    }

    /// Short human label, e.g. `PC ch1 0 -` or `HID send A`.
    pub fn describe(&self) -> String {
        match self {
            Command::Hid { action, param } => format!("HID {} {}", action, param),
            Command::ProgramChange {
                channel,
                value,
                param,
            } => format!("PC ch{} {} {}", channel, value, param),
            Command::ControlChange {
                channel,
                value,
                param,
            }
            | Command::Note {
                channel,
                value,
                param,
            } => format!("{} ch{} {} {}", self.kind(), channel, value, param),
        }
    }

    /// Returns a copy with the given text fields replaced. Fields left as
    /// `None` keep their current value.
    pub fn with_fields(
        &self,
        channel: Option<&str>,
        value: Option<&str>,
        param: Option<&str>,
    ) -> Result<Self> {
        let mut updated = self.clone();
        match &mut updated {
            Command::Hid {
                action,
                param: hid_param,
            } => {
                if channel.is_some() {
                    bail!("HID commands have no MIDI channel");
                }
                if let Some(v) = value {
                    *action = v.parse()?;
                }
                if let Some(p) = param {
                    *hid_param = non_empty(p, "HID parameter")?;
                }
            }
            Command::ProgramChange {
                channel: ch,
                value: pc,
                param: pc_param,
            } => {
                if let Some(c) = channel {
                    *ch = parse_number(c, "channel")?;
                }
                if let Some(v) = value {
                    *pc = v.parse()?;
                }
                if let Some(p) = param {
                    *pc_param = non_empty(p, "program change parameter")?;
                }
            }
            Command::ControlChange {
                channel: ch,
                value: v_slot,
                param: p_slot,
            }
            | Command::Note {
                channel: ch,
                value: v_slot,
                param: p_slot,
            } => {
                if let Some(c) = channel {
                    *ch = parse_number(c, "channel")?;
                }
                if let Some(v) = value {
                    *v_slot = parse_number(v, "value")?;
                }
                if let Some(p) = param {
                    *p_slot = parse_number(p, "parameter")?;
                }
            }
        }
        Ok(updated)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn parse_number(text: &str, field: &str) -> Result<i64> {
    text.trim()
        .parse::<i64>()
        .with_context(|| format!("Invalid {} '{}' (expected an integer)", field, text))
}

fn non_empty(text: &str, field: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        bail!("{} cannot be empty", field);
    }
    Ok(text.to_string())
}
