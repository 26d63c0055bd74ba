use anyhow::{anyhow, Context, Result};
use clap::Parser;
use focus_hotkeys::{focus, Hotkey, HotkeyService};
use log::info;
use std::time::Duration;

const DEFAULT_BINDINGS: &[&str] = &[
    "Alt+1=chrome.exe",
    "Alt+2=rider64.exe",
    "Alt+3=WindowsTerminal.exe",
];

/// Focus a program's main window with a global hotkey.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Hotkey binding as `<hotkey>=<program.exe>`, e.g. `Alt+1=chrome.exe`.
    /// Repeat for several bindings.
    #[arg(short, long = "bind", value_name = "BINDING", value_parser = parse_binding)]
    bindings: Vec<(Hotkey, String)>,

    /// Milliseconds the listener sleeps between polls.
    #[arg(long, value_name = "MS", default_value_t = 1)]
    poll_interval_ms: u64,
}

fn parse_binding(s: &str) -> Result<(Hotkey, String)> {
    let (hotkey, program) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected <hotkey>=<program>, got {:?}", s))?;
    let program = program.trim();
    if program.is_empty() {
        return Err(anyhow!("Missing program name in {:?}", s));
    }
    Ok((hotkey.parse::<Hotkey>()?, program.to_string()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let bindings = if args.bindings.is_empty() {
        DEFAULT_BINDINGS
            .iter()
            .map(|s| parse_binding(s))
            .collect::<Result<Vec<_>>>()?
    } else {
        args.bindings
    };

    let service = HotkeyService::builder()
        .poll_interval(Duration::from_millis(args.poll_interval_ms))
        .start()
        .context("Failed to start hotkey service")?;

    for (hotkey, program) in bindings {
        let id = service.register(hotkey, focus::focus_action(program.clone()))?;
        info!("{} -> {} ({})", hotkey, program, id);
    }

    println!("Listening for hotkeys. Press Enter to exit.");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    service.shutdown();
    Ok(())
}
