//! The textual command protocol.
//!
//! Commands are NUL- or newline-terminated:
//!
//! - `PROGRESS <n>`: show `n` percent, `-100..=100`. Negative values fill
//!   from the right. Anything that is not a number reads as 0.
//! - `MSG <text>`: replace the message line.
//! - `QUIT`: exit.
//!
//! Unknown commands are ignored.

use log::debug;

/// Size of the accumulation buffer for partially received commands.
pub const COMMAND_BUFFER_SIZE: usize = 2048;

/// Largest magnitude a progress value is clamped to.
pub const PROGRESS_MAX: i32 = 100;

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set the progress bar, in percent.
    Progress(i32),
    /// Show a message.
    Msg(String),
    /// Stop the daemon.
    Quit,
}

impl Command {
    /// Parses one command without its terminator.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_start_matches(' ');
        let (name, arg) = line.split_once(' ').unwrap_or((line, ""));
        match name {
            "PROGRESS" => Some(Self::Progress(
                atoi(arg).clamp(-PROGRESS_MAX, PROGRESS_MAX),
            )),
            "MSG" => Some(Self::Msg(arg.to_string())),
            "QUIT" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// C-style integer parse: leading whitespace, an optional sign, then as many
/// digits as follow. No digits yields 0; overflow saturates.
fn atoi(s: &str) -> i32 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            (acc * 10 + i64::from(d - b'0')).min(i64::from(i32::MAX) + 1)
        });
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).unwrap_or(if negative { i32::MIN } else { i32::MAX })
}

/// Accumulates bytes from the FIFO and splits them into commands.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    pending: Vec<u8>,
}

impl CommandBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(COMMAND_BUFFER_SIZE),
        }
    }

    /// Appends `bytes` and returns every command completed by them, in order.
    ///
    /// A partial command longer than [`COMMAND_BUFFER_SIZE`] is discarded.
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<Command> {
        self.pending.extend_from_slice(bytes);

        let mut commands = Vec::new();
        let mut consumed = 0;
        while let Some(end) = self.pending[consumed..]
            .iter()
            .position(|&b| b == 0 || b == b'\n')
        {
            let raw = &self.pending[consumed..consumed + end];
            consumed += end + 1;
            if raw.is_empty() {
                continue;
            }
            let line = String::from_utf8_lossy(raw);
            debug!("got command {line:?}");
            match Command::parse(&line) {
                Some(command) => commands.push(command),
                None => debug!("ignoring unknown command {line:?}"),
            }
        }
        self.pending.drain(..consumed);

        if self.pending.len() > COMMAND_BUFFER_SIZE {
            debug!("dropping {} bytes of oversized command", self.pending.len());
            self.pending.clear();
        }
        commands
    }

    /// Bytes of the incomplete command held back.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_commands() {
        assert_eq!(Command::parse("PROGRESS 42"), Some(Command::Progress(42)));
        assert_eq!(Command::parse("PROGRESS -30"), Some(Command::Progress(-30)));
        assert_eq!(
            Command::parse("MSG Starting network"),
            Some(Command::Msg("Starting network".into()))
        );
        assert_eq!(Command::parse("QUIT"), Some(Command::Quit));
        assert_eq!(Command::parse("  QUIT"), Some(Command::Quit));
    }

    #[test]
    fn parse_ignores_unknown() {
        assert_eq!(Command::parse("REBOOT"), None);
        assert_eq!(Command::parse("progress 10"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn progress_is_lenient_and_clamped() {
        assert_eq!(Command::parse("PROGRESS"), Some(Command::Progress(0)));
        assert_eq!(Command::parse("PROGRESS abc"), Some(Command::Progress(0)));
        assert_eq!(Command::parse("PROGRESS  12%"), Some(Command::Progress(12)));
        assert_eq!(Command::parse("PROGRESS 250"), Some(Command::Progress(100)));
        assert_eq!(Command::parse("PROGRESS -99999999999"), Some(Command::Progress(-100)));
    }

    #[test]
    fn atoi_matches_c() {
        assert_eq!(atoi(" +7x"), 7);
        assert_eq!(atoi("-"), 0);
        assert_eq!(atoi("99999999999"), i32::MAX);
        assert_eq!(atoi("-2147483648"), i32::MIN);
    }

    #[test]
    fn message_keeps_inner_spaces() {
        assert_eq!(Command::parse("MSG"), Some(Command::Msg(String::new())));
        assert_eq!(Command::parse("MSG  a  b"), Some(Command::Msg(" a  b".into())));
    }

    #[test]
    fn buffer_splits_on_both_terminators() {
        let mut buffer = CommandBuffer::new();
        let commands = buffer.extend(b"PROGRESS 10\0MSG hi\nBOGUS\0QUIT\0");
        assert_eq!(
            commands,
            [
                Command::Progress(10),
                Command::Msg("hi".into()),
                Command::Quit
            ]
        );
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn buffer_joins_partial_reads() {
        let mut buffer = CommandBuffer::new();
        assert!(buffer.extend(b"PROG").is_empty());
        assert!(buffer.extend(b"RESS 5").is_empty());
        assert_eq!(buffer.pending(), 10);
        assert_eq!(buffer.extend(b"0\0MS"), [Command::Progress(50)]);
        assert_eq!(buffer.extend(b"G x\n"), [Command::Msg("x".into())]);
    }

    #[test]
    fn oversized_command_is_dropped() {
        let mut buffer = CommandBuffer::new();
        assert!(buffer.extend(&[b'A'; COMMAND_BUFFER_SIZE + 1]).is_empty());
        assert_eq!(buffer.pending(), 0);
        assert_eq!(buffer.extend(b"QUIT\0"), [Command::Quit]);
    }
}
