//! Command line flags, applied on top of the loaded configuration

use clap::{ArgGroup, Parser};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "kata-server")]
#[command(about = "Teaching REST server: users, products, tasks, auth and challenges", long_about = None)]
#[command(group(ArgGroup::new("profile").args(["dev", "qa", "production"])))]
pub struct Cli {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Development profile, port 3000
    #[arg(long)]
    pub dev: bool,

    /// QA profile, port 3001
    #[arg(long)]
    pub qa: bool,

    /// Production profile, port 3002
    #[arg(long)]
    pub production: bool,

    /// Listen port; wins over the profile
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Length of the password served by /generatePassword
    #[arg(long, value_name = "LENGTH")]
    pub generate_password: Option<usize>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub dump_config: bool,
}

impl Cli {
    /// Port implied by the selected profile flag
    pub const fn profile_port(&self) -> Option<u16> {
        if self.dev {
            Some(3000)
        } else if self.qa {
            Some(3001)
        } else if self.production {
            Some(3002)
        } else {
            None
        }
    }

    pub fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port.or_else(|| self.profile_port()) {
            config.server.port = port;
        }
        if let Some(length) = self.generate_password {
            config.generator.password_length = Some(length);
        }
    }
}
