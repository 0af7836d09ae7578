use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "clockctl")]
#[command(about = "Command-line client for the clock generator panel", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://192.168.4.1")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show Morse playback and output status
    Status,
    /// Program frequency and drive strength
    Signal {
        /// Output frequency in Hz
        #[arg(short, long)]
        frequency: u64,
        /// Drive strength in mA (2, 4, 6 or 8)
        #[arg(short, long, default_value_t = 4)]
        drive: u8,
    },
    /// Toggle the clock output
    Toggle,
    /// Play a Morse message
    Morse {
        #[arg(short, long)]
        text: String,
        #[arg(short, long, default_value_t = 15)]
        wpm: u16,
        /// Farnsworth character speed
        #[arg(long)]
        fwpm: Option<u16>,
    },
    /// Stop Morse playback
    Stop,
    /// Lock or release the output for Morse use
    Hold {
        #[arg(value_enum)]
        state: HoldState,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum HoldState {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/morse/status", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Signal { frequency, drive } => {
            let form = [("frequency", frequency.to_string()), ("drive", drive.to_string())];
            let res = client.post(format!("{}/signal", base)).form(&form).send().await?;
            print_banner(res).await?;
        }
        Commands::Toggle => {
            let res = client
                .post(format!("{}/signal", base))
                .form(&[("action", "toggle-output")])
                .send()
                .await?;
            print_banner(res).await?;
        }
        Commands::Morse { text, wpm, fwpm } => {
            let form = [
                ("text", text),
                ("wpm", wpm.to_string()),
                ("fwpm", fwpm.map(|f| f.to_string()).unwrap_or_default()),
            ];
            let res = client.post(format!("{}/morse", base)).form(&form).send().await?;
            print_banner(res).await?;
        }
        Commands::Stop => {
            let res = client.post(format!("{}/morse/stop", base)).body("").send().await?;
            print_banner(res).await?;
        }
        Commands::Hold { state } => {
            let active = match state {
                HoldState::On => "1",
                HoldState::Off => "0",
            };
            let res = client
                .post(format!("{}/morse/hold", base))
                .form(&[("active", active)])
                .send()
                .await?;
            print_banner(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: panel returned status {}", status);
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Print the status banner from a rendered control page.
async fn print_banner(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: panel returned status {}", status);
        return Ok(());
    }

    let page = res.text().await?;
    match extract_banner(&page) {
        Some((message, true)) => {
            eprintln!("{}", message);
            std::process::exit(1);
        }
        Some((message, false)) => println!("{}", message),
        None => println!("(no status banner in response)"),
    }
    Ok(())
}

fn extract_banner(page: &str) -> Option<(String, bool)> {
    let start = page.find("<div class=\"status ")?;
    let rest = &page[start + "<div class=\"status ".len()..];
    let is_error = rest.starts_with("error");
    let text_start = rest.find("<span>")? + "<span>".len();
    let text_end = rest[text_start..].find("</span>")? + text_start;
    let message = rest[text_start..text_end]
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    Some((message, is_error))
}
