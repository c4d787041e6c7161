
use std::process::Command;

use crate::config::SU_BIN;

fn sh_escape_single_quotes(s: &str) -> String {
    s.replace('\'', r#"'\''"#)
}

/// Post a user-visible notification through the shell UID (2000); root
/// itself is not allowed to post.
pub fn post_notification(message: &str) {
    let msg = sh_escape_single_quotes(message);

    let cmd = format!(
        "cmd notification post \
         -S messaging --conversation 'Unleashed' --message 'Unleashed: {msg}' \
         -t 'Unleashed' 'Tag' 'unleashed_mode' >/dev/null 2>&1",
        msg = msg
    );

    let _ = Command::new(SU_BIN).args(["-lp", "2000", "-c", &cmd]).status();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_quotes_are_escaped() {
        assert_eq!(sh_escape_single_quotes("mode 'x'"), r#"mode '\''x'\''"#);
        assert_eq!(sh_escape_single_quotes("plain"), "plain");
    }
}
