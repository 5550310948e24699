use clap::Parser;

/// Vela — a real-time conversational agent orchestrator.
#[derive(Parser, Debug)]
#[command(name = "vela", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Transcript WebSocket bind address override.
    #[arg(long)]
    pub bind: Option<String>,

    /// Session id for console input.
    #[arg(long, default_value = "console")]
    pub session: String,
}

pub fn parse() -> Args {
    Args::parse()
}
