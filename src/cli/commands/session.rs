use anyhow::bail;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let secret = matches.get_one::<String>(ARG_JWT_SECRET).cloned();
        let secret = match secret {
            Some(value) if !value.trim().is_empty() => value,
            _ => bail!("missing required argument: --{ARG_JWT_SECRET}"),
        };

        Ok(Self {
            jwt_secret: SecretString::from(secret),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_JWT_SECRET)
            .long(ARG_JWT_SECRET)
            .help("HMAC secret used to sign session tokens")
            .long_help(
                "HMAC secret used to sign and verify the HS256 session tokens carried in the `auth-token` cookie.\n\nRotating it invalidates every issued session.",
            )
            .env("COOP_JWT_SECRET")
            .hide_env_values(true)
            .required(true),
    )
}
