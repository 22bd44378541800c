use rand::prelude::*;
use std::{
    error::Error,
    fmt, fs,
    io::{self, Read, Write},
    num::{NonZeroU64, ParseIntError},
    path::PathBuf,
    str::FromStr,
};

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use bstr::ByteSlice;
use clap::Parser;
use gadget_table::{
    dex::interp,
    generate_table,
    placement::PlacementConfig,
    render::{ByteTable, Header, JumpTable},
    AsEscape, TableConfig,
};
use rand_chacha::ChaCha20Rng;
use tracing::Level;

#[derive(Parser)]
#[clap(version = "0.1.0")]
struct Opts {
    /// Set a seed for the RNG
    #[clap(short, long)]
    rand: Option<RandState>,

    /// Table size in bytes
    #[clap(short, long, default_value = "65536")]
    capacity: u64,

    /// XOR key, decimal or 0x-prefixed hex
    #[clap(short, long, default_value = "0x42", parse(try_from_str = parse_int))]
    key: i64,

    /// Is this binary or an escaped string?
    /// We currently only accept \x00 style escapes
    #[clap(long = "bin")]
    binary: bool,

    /// Give up on a gadget after this many candidate offsets
    #[clap(long)]
    max_attempts: Option<NonZeroU64>,

    /// Write the tables to a C header
    #[clap(short, long, parse(from_os_str))]
    out: Option<PathBuf>,

    /// Read the secret from a file
    #[clap(short, parse(from_os_str))]
    inp: Option<PathBuf>,

    /// Run the table through the reference interpreter
    #[clap(long)]
    verify: bool,

    /// Log placement details
    #[clap(short, long)]
    verbose: bool,

    /// The secret, or - for stdin
    secret: Option<String>,
}

#[derive(Debug)]
struct RandStateErr(Option<ParseIntError>);
impl fmt::Display for RandStateErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.0 {
            Some(e) => e.fmt(f),
            None => write!(f, "Random state should be 64 hex characters"),
        }
    }
}
impl Error for RandStateErr {}

#[derive(Clone)]
struct RandState([u8; 32]);
impl FromStr for RandState {
    type Err = RandStateErr;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 || !s.is_ascii() {
            return Err(RandStateErr(None));
        }
        let mut ret = [0; 32];
        for (i, r) in ret.iter_mut().enumerate() {
            *r = u8::from_str_radix(&s[2 * i..2 * i + 2], 16).map_err(|e| RandStateErr(Some(e)))?;
        }
        Ok(Self(ret))
    }
}

impl fmt::Debug for RandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RandState(*b\"")?;
        for b in &self.0 {
            if b.is_ascii_alphanumeric() {
                write!(f, "{}", *b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        write!(f, "\")")
    }
}

impl fmt::Display for RandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

fn parse_int(s: &str) -> Result<i64, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let opts = Opts::parse();

    tracing_subscriber::fmt()
        .with_max_level(if opts.verbose {
            Level::DEBUG
        } else {
            Level::WARN
        })
        .with_writer(io::stderr)
        .init();

    let secret = if let Some(file_name) = &opts.inp {
        eprintln!("Reading from file {}", file_name.display());
        fs::read(file_name)?
    } else {
        match opts.secret {
            Some(s) => {
                if s == "-" {
                    eprintln!("Reading from stdin");
                    let mut ret = vec![];
                    let _ = io::stdin()
                        .lock()
                        .read_to_end(&mut ret)
                        .map_err(|e| format!("Could not read from stdin: {}", e))?;
                    ret
                } else if opts.binary {
                    s.into_bytes()
                } else {
                    unescape(&s)?
                }
            }
            None => {
                eprintln!("Choosing default secret");
                TableConfig::default().secret
            }
        }
    };

    eprintln!("Your secret: {}", AsEscape(&secret));
    eprintln!("Your key: 0x{:02x}", opts.key);

    let RandState(seed) = opts.rand.unwrap_or_else(|| RandState(random()));
    eprintln!("RNG state: {}", RandState(seed));
    let mut rng = ChaCha20Rng::from_seed(seed);

    let config = TableConfig {
        secret,
        key: opts.key,
        placement: PlacementConfig {
            max_attempts: opts.max_attempts,
        },
    };
    let generated = generate_table(&mut rng, opts.capacity, &config)?;

    eprintln!(
        "Placed {} gadgets in {} bytes",
        generated.allocations.len(),
        generated.table.len()
    );

    if opts.verify {
        let offsets = generated.offsets().map(|o| o as usize);
        let recovered = interp::run_dispatch(&generated.table, offsets)?;
        eprintln!("Recovered secret: {}", recovered.as_bstr());
        if recovered != config.secret {
            return Err("Recovered secret does not match".into());
        }
    }

    if let Some(file_name) = opts.out {
        eprintln!("Writing to file {}", file_name.display());
        let mut f = fs::File::create(file_name)?;
        write!(f, "{}", Header(&generated))?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", JumpTable(&generated.allocations))?;
    writeln!(out, "{}", ByteTable(&generated.table))?;

    Ok(())
}

fn unescape(s: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut ret = vec![];
    let mut part = None;

    for b in s.bytes() {
        match part {
            None => {
                if b == b'\\' {
                    part = Some(vec![])
                } else {
                    ret.push(b)
                }
            }
            Some(ref mut p) => {
                p.push(b);
                if p.len() >= 3 {
                    if p[0] != b'x' {
                        return Err("Error parsing input: Missing x".into());
                    }
                    let s = std::str::from_utf8(&p[1..])
                        .map_err(|e| format!("Error parsing input: {}", e))?;
                    let t = u8::from_str_radix(s, 16)
                        .map_err(|e| format!("Error parsing input: {}", e))?;
                    part = None;
                    ret.push(t);
                }
            }
        }
    }
    if part.is_some() {
        return Err("Error parsing input: Truncated escape".into());
    }
    Ok(ret)
}
