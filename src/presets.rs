//! Named colors, canned command sequences and LED quick patterns.

use crate::command::{Command, CommandKind, HidAction, PcValue};
use crate::keyconfig::{LedColor, Press};
use clap::ValueEnum;

pub const COLOR_PRESETS: [(&str, &str); 12] = [
    ("Off", "0x000000"),
    ("White", "0xffffff"),
    ("Dim White", "0x666666"),
    ("Red", "0xff0000"),
    ("Green", "0x00ff00"),
    ("Blue", "0x0000ff"),
    ("Yellow", "0xffff00"),
    ("Purple", "0xff00ff"),
    ("Cyan", "0x00ffff"),
    ("Orange", "0xff8800"),
    ("Pink", "0xff66ff"),
    ("Lime", "0x88ff00"),
];

/// Case-insensitive; `dim-white` and `dim_white` match "Dim White".
pub fn color_preset(name: &str) -> Option<LedColor> {
    let wanted = name.trim().to_lowercase().replace(['-', '_'], " ");
    COLOR_PRESETS
        .iter()
        .find(|(preset, _)| preset.to_lowercase() == wanted)
        .and_then(|(_, hex)| LedColor::parse(hex))
}

/// (id, display name)
pub const COMMAND_PRESETS: [(&str, &str); 6] = [
    ("program-change", "Program Change"),
    ("toggle-cc", "Toggle CC (0/127)"),
    ("note-on-off", "Note On/Off"),
    ("key-press", "Keyboard Press"),
    ("mouse-click", "Mouse Click"),
    ("bank-increment", "Bank Increment"),
];

pub fn command_preset(id: &str) -> Option<Vec<Command>> {
    let commands = match id.trim().to_lowercase().as_str() {
        "program-change" => vec![Command::default()],
        "toggle-cc" => vec![Command::ControlChange {
            channel: 1,
            value: 64,
            param: 127,
        }],
        "note-on-off" => vec![
            Command::Note {
                channel: 1,
                value: 60,
                param: 127,
            },
            Command::Note {
                channel: 1,
                value: 60,
                param: 0,
            },
        ],
        "key-press" => vec![Command::for_kind(CommandKind::Hid)],
        "mouse-click" => vec![Command::Hid {
            action: HidAction::Send,
            param: "Mouse_L".to_string(),
        }],
        "bank-increment" => vec![Command::ProgramChange {
            channel: 1,
            value: PcValue::Auto,
            param: "bank_inc".to_string(),
        }],
        _ => return None,
    };
    Some(commands)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Pattern {
    /// Copy segment 1 to segments 2 and 3
    Same,
    /// Dim white, dim white, red
    Default,
}

impl Pattern {
    /// Returns false, leaving the press untouched, when segment 1 holds a
    /// malformed color that cannot be copied.
    pub fn apply(self, press: &mut Press) -> bool {
        match self {
            Pattern::Same => {
                let first = press.led_colors[0].clone();
                if !first.is_valid() {
                    return false;
                }
                press.led_colors[1] = first.clone();
                press.led_colors[2] = first;
            }
            Pattern::Default => {
                press.led_colors = [
                    LedColor::default(),
                    LedColor::default(),
                    LedColor::parse("0xff0000").unwrap_or_default(),
                ];
            }
        }
        true
    }
}
