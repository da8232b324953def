//! External command lines and their printable form

use std::fmt;

/// What an external command acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Virtualization control-plane invocation (recorded in the transcript)
    ControlPlane,
    /// Local host tool such as `wget` or `qemu-img`
    Host,
}

/// A program and its arguments
///
/// `Display` renders a POSIX shell line that re-runs the command verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub kind: CommandKind,
}

impl CommandLine {
    /// Create a host command
    pub fn host(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            kind: CommandKind::Host,
        }
    }

    /// Create a control-plane command
    pub fn control_plane(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            kind: CommandKind::ControlPlane,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn is_control_plane(&self) -> bool {
        self.kind == CommandKind::ControlPlane
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

/// Quote a word for a POSIX shell
///
/// Words made only of characters with no shell meaning are left bare;
/// everything else is single-quoted.
pub fn quote(word: &str) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "_-./:=,@%+".contains(c);

    if !word.is_empty() && word.chars().all(is_safe) {
        return word.to_string();
    }

    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('\'');
    for c in word.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote("qm"), "qm");
        assert_eq!(quote("local-lvm:vm-100-disk-1,discard=on"), "local-lvm:vm-100-disk-1,discard=on");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("two words"), "'two words'");
        assert_eq!(quote("a;b"), "'a;b'");
        assert_eq!(quote("it's"), "'it'\\''s'");
        assert_eq!(quote("$HOME"), "'$HOME'");
    }

    #[test]
    fn test_display_is_replayable() {
        let cmd = CommandLine::control_plane("qm")
            .arg("set")
            .arg("100")
            .args(["--tags", "cloud;ubuntu"]);
        assert_eq!(cmd.to_string(), "qm set 100 --tags 'cloud;ubuntu'");
        assert!(cmd.is_control_plane());

        let cmd = CommandLine::host("wget").args(["-q", "-O", "/tmp/a b.img"]);
        assert_eq!(cmd.to_string(), "wget -q -O '/tmp/a b.img'");
        assert!(!cmd.is_control_plane());
    }
}
