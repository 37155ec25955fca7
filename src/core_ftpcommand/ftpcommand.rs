use crate::constants::MAX_COMMAND_LINE;

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum FtpCommand {
    USER,
    PASS,
    QUIT,
    NOOP,
    SYST,
    FEAT,
    AUTH,
    PBSZ,
    PROT,
    PWD,
    CWD,
    CDUP,
    TYPE,
    MODE,
    PASV,
    PORT,
    LIST,
    NLST,
    RETR,
    STOR,
    APPE,
    REST,
    SIZE,
    MDTM,
    ALLO,
    DELE,
    MKD,
    RMD,
    RNFR,
    RNTO,
}

impl FtpCommand {
    pub fn from_verb(verb: &str) -> Option<FtpCommand> {
        match verb {
            "USER" => Some(FtpCommand::USER),
            "PASS" => Some(FtpCommand::PASS),
            "QUIT" => Some(FtpCommand::QUIT),
            "NOOP" => Some(FtpCommand::NOOP),
            "SYST" => Some(FtpCommand::SYST),
            "FEAT" => Some(FtpCommand::FEAT),
            "AUTH" => Some(FtpCommand::AUTH),
            "PBSZ" => Some(FtpCommand::PBSZ),
            "PROT" => Some(FtpCommand::PROT),
            "PWD" | "XPWD" => Some(FtpCommand::PWD),
            "CWD" | "XCWD" => Some(FtpCommand::CWD),
            "CDUP" => Some(FtpCommand::CDUP),
            "TYPE" => Some(FtpCommand::TYPE),
            "MODE" => Some(FtpCommand::MODE),
            "PASV" => Some(FtpCommand::PASV),
            "PORT" => Some(FtpCommand::PORT),
            "LIST" => Some(FtpCommand::LIST),
            "NLST" => Some(FtpCommand::NLST),
            "RETR" => Some(FtpCommand::RETR),
            "STOR" => Some(FtpCommand::STOR),
            "APPE" => Some(FtpCommand::APPE),
            "REST" => Some(FtpCommand::REST),
            "SIZE" => Some(FtpCommand::SIZE),
            "MDTM" => Some(FtpCommand::MDTM),
            "ALLO" => Some(FtpCommand::ALLO),
            "DELE" => Some(FtpCommand::DELE),
            "MKD" | "XMKD" => Some(FtpCommand::MKD),
            "RMD" | "XRMD" => Some(FtpCommand::RMD),
            "RNFR" => Some(FtpCommand::RNFR),
            "RNTO" => Some(FtpCommand::RNTO),
            _ => None,
        }
    }

    /// Commands admissible before authentication completes.
    pub fn allowed_before_login(&self) -> bool {
        matches!(
            self,
            FtpCommand::USER
                | FtpCommand::PASS
                | FtpCommand::QUIT
                | FtpCommand::NOOP
                | FtpCommand::SYST
                | FtpCommand::FEAT
                | FtpCommand::AUTH
                | FtpCommand::PBSZ
                | FtpCommand::PROT
        )
    }
}

/// Splits a control line into an uppercased verb and its argument.
///
/// The argument is everything after the first run of whitespace, trimmed.
/// Lines longer than the protocol limit arrive here already truncated by
/// the session's line reader.
pub fn parse_line(line: &str) -> (String, String) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb.to_ascii_uppercase(), rest.trim().to_string()),
        None => (line.to_ascii_uppercase(), String::new()),
    }
}

/// Clips a raw line to the protocol maximum, discarding the excess.
pub fn clip_line(line: &mut String) {
    if line.len() > MAX_COMMAND_LINE {
        line.truncate(MAX_COMMAND_LINE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_is_uppercased_and_argument_trimmed() {
        assert_eq!(
            parse_line("retr  some file.txt "),
            (String::from("RETR"), String::from("some file.txt"))
        );
        assert_eq!(parse_line("PASV"), (String::from("PASV"), String::new()));
        assert_eq!(parse_line("  noop  "), (String::from("NOOP"), String::new()));
    }

    #[test]
    fn argument_may_contain_spaces() {
        let (verb, arg) = parse_line("STOR a file with spaces.bin");
        assert_eq!(verb, "STOR");
        assert_eq!(arg, "a file with spaces.bin");
    }

    #[test]
    fn unknown_verbs_do_not_parse() {
        assert!(FtpCommand::from_verb("EPSV").is_none());
        assert!(FtpCommand::from_verb("MLSD").is_none());
        assert!(FtpCommand::from_verb("").is_none());
    }

    #[test]
    fn x_aliases_map_to_their_base_commands() {
        assert_eq!(FtpCommand::from_verb("XPWD"), Some(FtpCommand::PWD));
        assert_eq!(FtpCommand::from_verb("XMKD"), Some(FtpCommand::MKD));
    }

    #[test]
    fn clip_keeps_1024_bytes_and_drops_the_rest() {
        let mut line = "A".repeat(1024);
        clip_line(&mut line);
        assert_eq!(line.len(), 1024);

        let mut line = "A".repeat(1025);
        clip_line(&mut line);
        assert_eq!(line.len(), 1024);
    }

    #[test]
    fn pre_login_allowlist_matches_the_state_machine() {
        assert!(FtpCommand::AUTH.allowed_before_login());
        assert!(FtpCommand::FEAT.allowed_before_login());
        assert!(!FtpCommand::PWD.allowed_before_login());
        assert!(!FtpCommand::RETR.allowed_before_login());
    }
}
