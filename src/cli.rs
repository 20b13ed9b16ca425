//! Minimal CLI parsing for one-off admin commands.

use std::env;

#[derive(Debug, Default, PartialEq)]
pub struct CliOptions {
    /// Create this user, print a fresh login token and exit.
    pub create_user: Option<String>,
    pub email: Option<String>,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--create-user" => options.create_user = args.next(),
                "--email" => options.email = args.next(),
                _ if arg.starts_with("--create-user=") => {
                    options.create_user = arg.split_once('=').map(|(_, v)| v.to_string());
                }
                _ if arg.starts_with("--email=") => {
                    options.email = arg.split_once('=').map(|(_, v)| v.to_string());
                }
                _ => {}
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliOptions {
        CliOptions::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse(&[]), CliOptions::default());
        assert_eq!(
            parse(&["--create-user", "alice", "--email=a@example.com"]),
            CliOptions {
                create_user: Some("alice".into()),
                email: Some("a@example.com".into()),
            }
        );
        assert_eq!(parse(&["--create-user=bob"]).create_user.as_deref(), Some("bob"));
        assert_eq!(parse(&["--verbose"]), CliOptions::default());
    }
}
