mod command;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use env_logger::Env;

use device_coap::constants::{defaults, envvars};
use device_coap::helpers::load_dotenv;

const CMD_RUN: &str = "run";
const CMD_CHECK_REGISTRY: &str = "check-registry";

const HELP: &str = "\
device-coap: receive sensor readings pushed over CoAP

USAGE:
  device-coap [run] [--registry PATH]
  device-coap check-registry [--registry PATH]

OPTIONS:
  --registry PATH  Device registry file [default: $DEVICE_REGISTRY or $DATA_DIR/devices.json]
  -h, --help       Print help
";

fn main() -> Result<()> {
    load_dotenv();
    env_logger::Builder::from_env(
        Env::default().filter_or(envvars::LOG_LEVEL, defaults::LOG_LEVEL),
    )
    .init();

    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }
    let registry: Option<PathBuf> = args.opt_value_from_str("--registry")?;
    let subcommand = args.subcommand()?;

    let remaining = args.finish();
    if !remaining.is_empty() {
        return Err(anyhow!("Unrecognised arguments: {remaining:?}"));
    }

    match subcommand.as_deref() {
        None | Some(CMD_RUN) => command::run(registry),
        Some(CMD_CHECK_REGISTRY) => command::check_registry(registry),
        Some(other) => Err(anyhow!(
            "Subcommand must be one of 'run', 'check-registry'; got '{other}'"
        )),
    }
}
