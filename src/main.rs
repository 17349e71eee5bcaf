use std::io::{self, Write};
use std::str::FromStr;

use clap::{Parser, Subcommand};

use mirage_ac::capture::{Capture, CaptureFormat};
use mirage_ac::mirage::frame::Frame;
use mirage_ac::mirage::{ClimateState, Decoded, FanSpeed, Mode, Phy, SwingMode};
use mirage_ac::smartir;

#[derive(Parser, Debug)]
#[command(name = "mirage-ac", about = "Encode, decode and export Mirage A/C infrared commands")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read captures from stdin, one per line, and print the decoded state
    Decode {
        #[arg(short, long, default_value = "hex", value_parser = CaptureFormat::from_str)]
        format: CaptureFormat,
    },

    /// Encode a state and print it as a capture
    Encode {
        /// Encode the power-off command instead of a powered state
        #[arg(long)]
        off: bool,

        #[arg(long, default_value = "cool", value_parser = Mode::from_str)]
        mode: Mode,

        /// Target temperature in Celsius (16-32)
        #[arg(long, default_value_t = 24)]
        temperature: u8,

        #[arg(long, default_value = "auto", value_parser = FanSpeed::from_str)]
        fan: FanSpeed,

        #[arg(long, default_value = "off", value_parser = SwingMode::from_str)]
        swing: SwingMode,

        #[arg(short, long, default_value = "hex", value_parser = CaptureFormat::from_str)]
        format: CaptureFormat,
    },

    /// Print a SmartIR code file covering every reachable state
    Smartir,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    match Cli::parse().command {
        Command::Decode { format } => decode(format),
        Command::Encode {
            off,
            mode,
            temperature,
            fan,
            swing,
            format,
        } => encode(off, mode, temperature, fan, swing, format),
        Command::Smartir => {
            let file = smartir::code_file()?;
            println!("{}", serde_json::to_string_pretty(&file)?);
            Ok(())
        }
    }
}

fn decode(format: CaptureFormat) -> anyhow::Result<()> {
    let phy = Phy::new();

    for line in io::stdin().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let capture = format.decode(line)?;
        match phy.decode(&capture.sequence) {
            Ok(Decoded::Frame(frame)) => {
                println!("{:?}", frame);
                match ClimateState::try_from(&frame) {
                    Ok(state) => println!("{:?}", state),
                    Err(e) => println!("undecodable fields: {}", e),
                }
            }
            Ok(Decoded::Repeat) => println!("repeat frame"),
            Err(e) => println!("decode failed: {}", e),
        }
        io::stdout().flush()?;
    }

    Ok(())
}

fn encode(
    off: bool,
    mode: Mode,
    temperature: u8,
    fan: FanSpeed,
    swing: SwingMode,
    format: CaptureFormat,
) -> anyhow::Result<()> {
    let state = ClimateState {
        power: !off,
        mode,
        temperature,
        fan,
        swing,
    };
    let frame = Frame::try_from(&state)?;
    let capture = Capture::new_ir(Phy::new().encode(&frame));
    println!("{}", format.encode(&capture)?);
    Ok(())
}
