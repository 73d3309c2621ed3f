//! Single-line operator commands read from stdin.

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// `p` — pause or resume speech.
    TogglePause,
    /// `q` — quit.
    Quit,
    /// Empty line; ignored.
    Blank,
    /// Anything else, lower-cased.
    Unknown(String),
}

impl OperatorCommand {
    /// Parse one input line.  Case and surrounding whitespace are ignored.
    ///
    /// ```
    /// use yt_liveread::pipeline::OperatorCommand;
    ///
    /// assert_eq!(OperatorCommand::parse(" P \n"), OperatorCommand::TogglePause);
    /// assert_eq!(OperatorCommand::parse("q"), OperatorCommand::Quit);
    /// assert_eq!(OperatorCommand::parse(""), OperatorCommand::Blank);
    /// ```
    pub fn parse(line: &str) -> Self {
        let cmd = line.trim().to_lowercase();
        match cmd.as_str() {
            "p" => OperatorCommand::TogglePause,
            "q" => OperatorCommand::Quit,
            "" => OperatorCommand::Blank,
            _ => OperatorCommand::Unknown(cmd),
        }
    }
}
