//! Outbound input slots for one session.
//!
//! Text commands are "latest wins": a new command overwrites an
//! undelivered one. Control bytes live in their own slot and are always
//! delivered before text.

/// Control characters with a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    /// `^C`
    Interrupt,
    /// `^D`
    Eof,
    /// `^Z`
    Suspend,
}

impl ControlKey {
    pub fn byte(self) -> u8 {
        match self {
            ControlKey::Interrupt => 0x03,
            ControlKey::Eof => 0x04,
            ControlKey::Suspend => 0x1a,
        }
    }
}

impl From<ControlKey> for u8 {
    fn from(key: ControlKey) -> u8 {
        key.byte()
    }
}

/// Next thing to write to the PTY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingInput {
    Control(u8),
    Command(String),
}

impl PendingInput {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            PendingInput::Control(byte) => vec![byte],
            PendingInput::Command(text) => text.into_bytes(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CommandDispatcher {
    pending_command: Option<String>,
    pending_control: Option<u8>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `text` (with exactly one trailing newline added if missing)
    /// as the pending command. Returns `true` if it replaced an
    /// undelivered command.
    pub fn send_command(&mut self, text: &str) -> bool {
        let mut command = text.to_string();
        if !command.ends_with('\n') {
            command.push('\n');
        }
        self.pending_command.replace(command).is_some()
    }

    pub fn pending_command(&self) -> Option<&str> {
        self.pending_command.as_deref()
    }

    pub fn take_command(&mut self) -> Option<String> {
        self.pending_command.take()
    }

    pub fn send_control_character(&mut self, byte: u8) {
        self.pending_control = Some(byte);
    }

    pub fn pending_control(&self) -> Option<u8> {
        self.pending_control
    }

    pub fn take_control(&mut self) -> Option<u8> {
        self.pending_control.take()
    }

    /// Control byte first, then the text command.
    pub fn take_next(&mut self) -> Option<PendingInput> {
        if let Some(byte) = self.take_control() {
            return Some(PendingInput::Control(byte));
        }
        self.take_command().map(PendingInput::Command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_command_wins() {
        let mut d = CommandDispatcher::new();
        assert!(!d.send_command("ls"));
        assert!(d.send_command("pwd"));
        assert_eq!(d.pending_command(), Some("pwd\n"));
        assert_eq!(d.take_command().as_deref(), Some("pwd\n"));
        assert_eq!(d.take_command(), None);
    }

    #[test]
    fn newline_is_not_doubled() {
        let mut d = CommandDispatcher::new();
        d.send_command("make\n");
        assert_eq!(d.pending_command(), Some("make\n"));
        d.send_command("");
        assert_eq!(d.pending_command(), Some("\n"));
    }

    #[test]
    fn control_is_delivered_ahead_of_pending_command() {
        let mut d = CommandDispatcher::new();
        d.send_command("sleep 100");
        d.send_control_character(ControlKey::Interrupt.into());

        assert_eq!(d.take_next(), Some(PendingInput::Control(0x03)));
        assert_eq!(
            d.take_next(),
            Some(PendingInput::Command("sleep 100\n".into()))
        );
        assert_eq!(d.take_next(), None);
        assert!(d.pending_command().is_none() && d.pending_control().is_none());
    }

    #[test]
    fn command_does_not_clobber_control_slot() {
        let mut d = CommandDispatcher::new();
        d.send_control_character(ControlKey::Eof.byte());
        d.send_command("a");
        d.send_command("b");
        assert_eq!(d.pending_control(), Some(0x04));
        assert_eq!(d.take_control(), Some(0x04));
        assert_eq!(d.pending_command(), Some("b\n"));
    }

    #[test]
    fn control_key_bytes() {
        assert_eq!(ControlKey::Interrupt.byte(), 0x03);
        assert_eq!(ControlKey::Eof.byte(), 0x04);
        assert_eq!(ControlKey::Suspend.byte(), 0x1a);
    }
}
