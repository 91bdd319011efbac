use crate::config::ConnConfig;
use crate::ssh::{SshAuth, SshSettings};
use crate::types::AppResult;
use anyhow::anyhow;
use clap::{ArgAction, Parser};
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const PASSWORD_ENV: &str = "CHCONN_PASSWORD";
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Parser, Debug)]
#[clap(name="chconn", about = "Bridge stdin/stdout to a TCP target through an SSH channel", author, version, long_about = None)]
pub struct AppArgs {
    #[clap(long, short = 'H', action=ArgAction::Set, help = "SSH server host")]
    pub host: String,
    #[clap(long, short = 'p', action=ArgAction::Set, default_value_t = DEFAULT_SSH_PORT, help = "SSH server port")]
    pub port: u16,
    #[clap(long, short = 'u', action=ArgAction::Set, help = "SSH user")]
    pub user: String,
    #[clap(long, short = 'i', action=ArgAction::Set, help = "Private key file, the password is read from CHCONN_PASSWORD otherwise")]
    pub identity: Option<PathBuf>,
    #[clap(long, action=ArgAction::SetTrue, help = "Accept host keys missing from known_hosts")]
    pub accept_unknown_host_key: bool,
    #[clap(long, short = 't', action=ArgAction::Set, help = "Give up after this many seconds without data from the target")]
    pub idle_timeout: Option<u64>,
    #[clap(long, short = 'c', action=ArgAction::Set, help = "Connection config file (JSON)")]
    pub config: Option<PathBuf>,
    #[clap(long, short = 's', action=ArgAction::SetTrue, help = "Keep the SSH connection open when the channel closes")]
    pub shared: bool,
    #[clap(long, action=ArgAction::Set, default_value_t = LevelFilter::Info, help = "Log level")]
    pub log_level: LevelFilter,
    #[clap(action=ArgAction::Set, help = "Host the SSH server connects to")]
    pub target_host: String,
    #[clap(action=ArgAction::Set, help = "Port the SSH server connects to")]
    pub target_port: u16,
}

impl AppArgs {
    /// The channel is the only user of the SSH connection unless `--shared`
    /// is given, so it is exclusive by default.
    pub fn conn_config(&self) -> AppResult<ConnConfig> {
        let mut config = match self.config.as_ref() {
            Some(path) => ConnConfig::from_json_file(path)?,
            None => ConnConfig::exclusive(),
        };
        if self.shared {
            config.exclusive = false;
        }
        Ok(config)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout.map(Duration::from_secs)
    }

    pub fn ssh_settings(&self) -> AppResult<SshSettings> {
        let auth = match self.identity.as_ref() {
            Some(path) => SshAuth::Key {
                path: path.clone(),
                passphrase: std::env::var(PASSWORD_ENV).ok(),
            },
            None => SshAuth::Password(
                std::env::var(PASSWORD_ENV)
                    .map_err(|_| anyhow!("either --identity or {PASSWORD_ENV} is required"))?,
            ),
        };

        Ok(SshSettings {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            auth,
            accept_unknown_host_key: self.accept_unknown_host_key,
            inactivity_timeout: Some(INACTIVITY_TIMEOUT),
        })
    }
}

#[cfg(test)]
mod test {
    use super::{AppArgs, DEFAULT_SSH_PORT};
    use crate::ssh::SshAuth;
    use crate::types::AppResult;
    use clap::Parser;
    use log::LevelFilter;
    use std::time::Duration;

    #[test]
    fn test_defaults() -> AppResult<()> {
        let args = AppArgs::try_parse_from([
            "chconn", "--host", "bastion", "--user", "ops", "db.internal", "5432",
        ])?;

        assert_eq!(args.port, DEFAULT_SSH_PORT);
        assert_eq!(args.target_host, "db.internal");
        assert_eq!(args.target_port, 5432);
        assert_eq!(args.log_level, LevelFilter::Info);
        assert!(args.idle_timeout().is_none());
        assert!(args.conn_config()?.exclusive);
        Ok(())
    }

    #[test]
    fn test_shared_and_idle_timeout() -> AppResult<()> {
        let args = AppArgs::try_parse_from([
            "chconn",
            "-H",
            "bastion",
            "-u",
            "ops",
            "--shared",
            "-t",
            "30",
            "--log-level",
            "debug",
            "db.internal",
            "5432",
        ])?;

        assert!(!args.conn_config()?.exclusive);
        assert_eq!(args.idle_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(args.log_level, LevelFilter::Debug);
        Ok(())
    }

    #[test]
    fn test_identity_selects_key_auth() -> AppResult<()> {
        let args = AppArgs::try_parse_from([
            "chconn",
            "-H",
            "bastion",
            "-u",
            "ops",
            "-i",
            "/home/ops/.ssh/id_ed25519",
            "db.internal",
            "5432",
        ])?;

        let settings = args.ssh_settings()?;
        assert!(matches!(settings.auth, SshAuth::Key { .. }));
        assert_eq!(settings.host, "bastion");
        Ok(())
    }

    #[test]
    fn test_missing_target_is_rejected() {
        let args = AppArgs::try_parse_from(["chconn", "-H", "bastion", "-u", "ops"]);
        assert!(args.is_err());
    }
}
