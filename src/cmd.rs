use std::path::PathBuf;

use argh::FromArgs;
use memory_scan::{Address, ValueType};

#[derive(FromArgs)]
#[argh(description = "Inspect, scan and patch the memory of a running process.")]
pub struct Commands {
    #[argh(option, short = 'c', description = "config file path (default config.toml)")]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub cmds: CommandEnum,
}

#[derive(FromArgs)]
#[argh(subcommand)]
pub enum CommandEnum {
    Regions(SubCommandRegions),
    Scan(SubCommandScan),
    Read(SubCommandRead),
    Write(SubCommandWrite),
    Suspend(SubCommandSuspend),
    Resume(SubCommandResume),
    Kill(SubCommandKill),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "regions", description = "list memory regions")]
pub struct SubCommandRegions {
    #[argh(positional, description = "process id or executable name")]
    pub target: String,

    #[argh(switch, description = "include system modules and unreadable regions")]
    pub all: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "scan", description = "search memory for a byte signature")]
pub struct SubCommandScan {
    #[argh(positional, description = "process id or executable name")]
    pub target: String,

    #[argh(positional, description = "hex pattern, e.g. \"48 8B ?? 05\"")]
    pub pattern: String,

    #[argh(option, short = 'm', description = "mask, 'x' exact and '?' wildcard per byte")]
    pub mask: Option<String>,

    #[argh(switch, short = 'a', description = "record every match instead of the first")]
    pub all: bool,

    #[argh(option, description = "largest chunk read at once")]
    pub chunk_size: Option<usize>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "read", description = "read a typed value")]
pub struct SubCommandRead {
    #[argh(positional, description = "process id or executable name")]
    pub target: String,

    #[argh(positional, description = "address, hex with 0x prefix or decimal")]
    pub address: Address,

    #[argh(positional, description = "value kind: i8..u64, f32, f64, bytes, string")]
    pub kind: ValueType,

    #[argh(option, short = 'l', default = "0", description = "length for bytes and strings")]
    pub length: usize,

    #[argh(switch, short = 'u', description = "strings are UTF-16")]
    pub unicode: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "write", description = "write a typed value")]
pub struct SubCommandWrite {
    #[argh(positional, description = "process id or executable name")]
    pub target: String,

    #[argh(positional, description = "address, hex with 0x prefix or decimal")]
    pub address: Address,

    #[argh(positional, description = "value kind: i8..u64, f32, f64, bytes, string")]
    pub kind: ValueType,

    #[argh(positional, description = "value in its canonical text form")]
    pub value: String,

    #[argh(switch, short = 'u', description = "strings are UTF-16")]
    pub unicode: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "suspend", description = "suspend every thread")]
pub struct SubCommandSuspend {
    #[argh(positional, description = "process id or executable name")]
    pub target: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "resume", description = "resume every thread")]
pub struct SubCommandResume {
    #[argh(positional, description = "process id or executable name")]
    pub target: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "kill", description = "terminate the process")]
pub struct SubCommandKill {
    #[argh(positional, description = "process id or executable name")]
    pub target: String,
}
