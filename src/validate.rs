//! Advisory range and shape checks. Nothing here mutates or aborts; the
//! caller decides what to do with the findings.

use crate::command::{
    hid_tokens, Command, HidAction, PcValue, MAX_CHANNEL, MAX_DATA, MIN_CHANNEL, MIN_DATA,
};
use crate::keyconfig::{ConfigSet, KeyConfig, Trigger, MAX_PRESS_COUNT, MIN_PRESS_COUNT};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    #[allow(dead_code)]
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    fn error(message: String) -> Self {
        Self {
            severity: Severity::Error,
            message,
        }
    }

    fn prefixed(self, prefix: &str) -> Self {
        Self {
            severity: self.severity,
            message: format!("{}: {}", prefix, self.message),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity.as_str(), self.message)
    }
}

pub fn error_count(findings: &[Finding]) -> usize {
    findings
        .iter()
        .filter(|f| f.severity == Severity::Error)
        .count()
}

pub fn validate_command(command: &Command) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let Some(channel) = command.channel() {
        if !(MIN_CHANNEL..=MAX_CHANNEL).contains(&channel) {
            findings.push(Finding::error(format!(
                "MIDI channel must be between {} and {}, got: {}",
                MIN_CHANNEL, MAX_CHANNEL, channel
            )));
        }
    }

    match command {
        Command::ControlChange { value, param, .. } | Command::Note { value, param, .. } => {
            let kind = command.kind();
            if !(MIN_DATA..=MAX_DATA).contains(value) {
                findings.push(Finding::error(format!(
                    "{} value must be between {} and {}, got: {}",
                    kind, MIN_DATA, MAX_DATA, value
                )));
            }
            if !(MIN_DATA..=MAX_DATA).contains(param) {
                findings.push(Finding::error(format!(
                    "{} parameter must be between {} and {}, got: {}",
                    kind, MIN_DATA, MAX_DATA, param
                )));
            }
        }
        Command::ProgramChange {
            value: PcValue::Program(program),
            ..
        } if !(MIN_DATA..=MAX_DATA).contains(program) => {
            findings.push(Finding::error(format!(
                "PC value must be between {} and {}, got: {}",
                MIN_DATA, MAX_DATA, program
            )));
        }
        Command::Hid {
            action: HidAction::Delay,
            param,
        } => {
            if hid_tokens::parse_delay(param).is_none() {
                findings.push(Finding::error(format!(
                    "HID delay must be a multiple of {} ms between 0 and {}, got: {}",
                    hid_tokens::DELAY_STEP_MS,
                    hid_tokens::MAX_DELAY_MS,
                    param
                )));
            }
        }
        Command::Hid { action, param } => {
            if !hid_tokens::is_key_or_modifier(param) {
                findings.push(Finding::error(format!(
                    "HID {} needs a key or modifier, got: {}",
                    action, param
                )));
            }
        }
        _ => {}
    }

    findings
}

pub fn validate_key_config(config: &KeyConfig) -> Vec<Finding> {
    let mut findings = Vec::new();

    if !(MIN_PRESS_COUNT..=MAX_PRESS_COUNT).contains(&config.press_count) {
        findings.push(Finding::error(format!(
            "Keytimes must be between {} and {}, got: {}",
            MIN_PRESS_COUNT, MAX_PRESS_COUNT, config.press_count
        )));
    }

    if config.presses.len() != config.press_count as usize {
        findings.push(Finding::error(format!(
            "Number of presses ({}) doesn't match keytimes ({})",
            config.presses.len(),
            config.press_count
        )));
    }

    for (press_idx, press) in config.presses.iter().enumerate() {
        for (segment_idx, color) in press.led_colors.iter().enumerate() {
            if !color.is_valid() {
                findings.push(Finding::error(format!(
                    "Invalid LED color format for press {}, segment {}: {}",
                    press_idx + 1,
                    segment_idx + 1,
                    color
                )));
            }
        }

        for trigger in Trigger::ALL {
            for (cmd_idx, command) in press.commands(trigger).iter().enumerate() {
                let prefix = format!("Press {}, {} command {}", press_idx + 1, trigger, cmd_idx + 1);
                findings.extend(
                    validate_command(command)
                        .into_iter()
                        .map(|f| f.prefixed(&prefix)),
                );
            }
        }
    }

    findings
}

pub fn validate_all(configs: &ConfigSet) -> Vec<Finding> {
    if configs.is_empty() {
        return vec![Finding {
            severity: Severity::Warning,
            message: "No keys are configured".to_string(),
        }];
    }

    configs
        .iter()
        .flat_map(|(key, config)| {
            validate_key_config(config)
                .into_iter()
                .map(move |f| f.prefixed(key))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;
    use crate::keyconfig::{LedColor, Press};

    fn cc(channel: i64, value: i64, param: i64) -> Command {
        Command::ControlChange {
            channel,
            value,
            param,
        }
    }

    fn only_error(findings: &[Finding]) -> &Finding {
        assert_eq!(findings.len(), 1, "findings: {:?}", findings);
        assert_eq!(findings[0].severity, Severity::Error);
        &findings[0]
    }

    #[test]
    fn valid_commands_have_no_findings() {
        assert!(validate_command(&Command::default()).is_empty());
        assert!(validate_command(&cc(16, 127, 0)).is_empty());
        assert!(validate_command(&Command::for_kind(CommandKind::Hid)).is_empty());
    }

    #[test]
    fn channel_out_of_range() {
        for channel in [0, 17] {
            let findings = validate_command(&cc(channel, 1, 1));
            assert!(only_error(&findings).message.contains("between 1 and 16"));
        }
    }

    #[test]
    fn note_value_out_of_range() {
        let note = Command::Note {
            channel: 1,
            value: 200,
            param: 0,
        };
        let findings = validate_command(&note);
        let finding = only_error(&findings);
        assert!(finding.message.contains("value must be between 0 and 127"));
        assert!(finding.message.contains("200"));
    }

    #[test]
    fn negative_numbers_are_reported_not_rejected() {
        let findings = validate_command(&cc(-1, -1, 0));
        assert_eq!(error_count(&findings), 2);
        assert!(findings[0].message.contains("got: -1"));
        assert!(findings[1].message.contains("CC value must be between 0 and 127, got: -1"));

        let pc = Command::default().with_fields(None, Some("-1"), None).unwrap();
        assert!(only_error(&validate_command(&pc)).message.contains("PC value"));
    }

    #[test]
    fn one_finding_per_bad_field() {
        let findings = validate_command(&cc(0, 128, 300));
        assert_eq!(error_count(&findings), 3);
        assert!(findings[0].message.contains("channel"));
        assert!(findings[1].message.contains("CC value"));
        assert!(findings[2].message.contains("CC parameter"));
    }

    #[test]
    fn program_change_number_range() {
        let pc = Command::for_kind(CommandKind::ProgramChange)
            .with_fields(None, Some("128"), None)
            .unwrap();
        assert!(only_error(&validate_command(&pc)).message.contains("PC value"));

        let special = Command::for_kind(CommandKind::ProgramChange)
            .with_fields(None, Some("random"), None)
            .unwrap();
        assert!(validate_command(&special).is_empty());
    }

    #[test]
    fn hid_param_must_match_action() {
        let delay_with_key = Command::Hid {
            action: HidAction::Delay,
            param: "A".to_string(),
        };
        assert!(only_error(&validate_command(&delay_with_key))
            .message
            .contains("delay"));

        let send_with_delay = Command::Hid {
            action: HidAction::Send,
            param: "150".to_string(),
        };
        assert!(only_error(&validate_command(&send_with_delay))
            .message
            .contains("key or modifier"));

        let delay = Command::Hid {
            action: HidAction::Delay,
            param: "150".to_string(),
        };
        assert!(validate_command(&delay).is_empty());
    }

    #[test]
    fn key_config_press_count_rules() {
        let mut config = KeyConfig::default();
        config.press_count = 0;
        let findings = validate_key_config(&config);
        assert_eq!(findings.len(), 2);
        assert!(findings[0].message.contains("Keytimes must be between 1 and 9"));
        assert!(findings[1].message.contains("Number of presses (1)"));
        assert!(findings[1].message.contains("keytimes (0)"));
    }

    #[test]
    fn key_config_reports_color_and_command_positions() {
        let mut config = KeyConfig::default();
        config.set_press_count(2);
        config.presses[1] = Press::with_colors([
            LedColor::default(),
            LedColor::default(),
            serde_json::from_str("\"0xzz0000\"").unwrap(),
        ]);
        config.presses[1].push_command(Trigger::ShortUp, Command::default());
        config.presses[1].push_command(Trigger::ShortUp, cc(17, 0, 0));

        let findings = validate_key_config(&config);
        assert_eq!(findings.len(), 2);
        assert_eq!(
            findings[0].message,
            "Invalid LED color format for press 2, segment 3: 0xzz0000"
        );
        assert_eq!(
            findings[1].message,
            "Press 2, short_up command 2: MIDI channel must be between 1 and 16, got: 17"
        );
    }

    #[test]
    fn empty_set_is_a_single_warning() {
        let findings = validate_all(&ConfigSet::new());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(error_count(&findings), 0);
    }

    #[test]
    fn set_findings_are_prefixed_by_key() {
        let mut set = ConfigSet::with_default_key();
        set.entry("key4").presses[0].push_command(Trigger::Long, cc(1, 1, 999));
        let findings = validate_all(&set);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.starts_with("key4: Press 1, long command 1: "));
    }
}
